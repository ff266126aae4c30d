use clap::Parser;
use sse_relay::{Client, ErrorKind, Grammar, Shutdown};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod cli;

use cli::{Cli, Origin, SOURCE_VAR};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + 'static>> {
    let cli = Cli::parse();
    cli.load_env_file()?;
    init_tracing("sse_relay=info", cli.log_json);

    let grammar = if cli.lenient {
        Grammar::Lenient
    } else {
        Grammar::Strict
    };
    let client = Client::builder()
        .grammar(grammar)
        .max_line_len(cli.max_line_length)
        .channel_endpoint(cli.channel_endpoint.as_str())
        .build()?;

    let (source, origin) = match cli::flag_or_env(cli.url.as_deref(), SOURCE_VAR) {
        Some(found) => found,
        None => (client.create_channel().await?, Origin::Created),
    };
    println!("Subscribing to channel ({}): {}", origin, source);

    let cancel = CancellationToken::new();
    tokio::spawn(cancel_on_signal(cancel.clone()));

    let mut subscription = match client.subscribe(&source, &cancel).await {
        Ok(subscription) => subscription,
        Err(err) if err.kind() == &ErrorKind::Cancelled => return Ok(()),
        Err(err) => return Err(err.into()),
    };
    while let Some(event) = subscription.recv().await {
        println!(
            "Received event: id={}, name={}, payload={}",
            event.id,
            event.name,
            event.text()
        );
    }

    match subscription.finish().await? {
        Shutdown::Drained => tracing::info!("channel closed by remote"),
        Shutdown::Stopped => tracing::info!("stopped"),
    }

    Ok(())
}

/// Installs the global subscriber. `RUST_LOG` overrides `default_filter`.
fn init_tracing(default_filter: &str, log_json: bool) {
    let env_filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| default_filter.into()),
    );
    if log_json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

async fn cancel_on_signal(cancel: CancellationToken) {
    if let Err(err) = shutdown_signal().await {
        tracing::warn!(error = %err, "cannot listen for shutdown signals");
        return;
    }

    tracing::info!("shutdown requested");
    cancel.cancel();
}

/// Resolves on SIGINT or SIGTERM. Fails if a handler cannot be registered.
#[cfg(unix)]
async fn shutdown_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate())?;
    tokio::select! {
        interrupted = tokio::signal::ctrl_c() => interrupted,
        _ = terminate.recv() => Ok(()),
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}
