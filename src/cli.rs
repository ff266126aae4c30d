use clap::Parser;
use std::{env, fmt, path::Path};

use sse_relay::{DEFAULT_CHANNEL_ENDPOINT, DEFAULT_MAX_LINE_LEN};

/// Environment variable holding the channel to subscribe to.
pub const SOURCE_VAR: &str = "SMEE_SOURCE";

const DEFAULT_ENV_FILE: &str = ".env";

#[derive(Debug, Parser)]
#[command(name = "sse-relay", version)]
#[command(about = "Relay webhook deliveries from a hosted event stream channel")]
pub struct Cli {
    /// Channel URL to subscribe to. Falls back to SMEE_SOURCE, then to a newly created channel
    pub url: Option<String>,

    /// .env file to load before reading the environment. Pass an empty value to skip
    #[arg(short, long, default_value = DEFAULT_ENV_FILE)]
    pub env_file: String,

    /// Endpoint used to create a channel when none is given
    #[arg(long, default_value = DEFAULT_CHANNEL_ENDPOINT)]
    pub channel_endpoint: String,

    /// Skip comment and retry lines instead of treating them as errors
    #[arg(long)]
    pub lenient: bool,

    /// Longest accepted line, in bytes
    #[arg(long, default_value_t = DEFAULT_MAX_LINE_LEN)]
    pub max_line_length: usize,

    /// Emit logs as JSON
    #[arg(long)]
    pub log_json: bool,
}

impl Cli {
    /// Loads the configured .env file. A missing default file is not an error.
    pub fn load_env_file(&self) -> Result<(), dotenvy::Error> {
        if self.env_file.is_empty() {
            return Ok(());
        }

        match dotenvy::from_path(Path::new(&self.env_file)) {
            Err(err) if err.not_found() && self.env_file == DEFAULT_ENV_FILE => Ok(()),
            result => result,
        }
    }
}

/// Where the channel URL came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Origin {
    CommandLine,
    Environment,
    Created,
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Origin::CommandLine => write!(f, "from command line"),
            Origin::Environment => write!(f, "from {} env var", SOURCE_VAR),
            Origin::Created => write!(f, "newly created"),
        }
    }
}

/// Picks the flag value, then the environment. `None` means a channel has to
/// be created.
pub fn flag_or_env(flag: Option<&str>, var: &str) -> Option<(String, Origin)> {
    if let Some(flag) = flag.filter(|value| !value.is_empty()) {
        return Some((flag.to_owned(), Origin::CommandLine));
    }

    env::var(var)
        .ok()
        .filter(|value| !value.is_empty())
        .map(|value| (value, Origin::Environment))
}
