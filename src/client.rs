use reqwest::redirect::Policy;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::{
    channel::{self, DEFAULT_CHANNEL_ENDPOINT},
    connect,
    parser::{Grammar, DEFAULT_MAX_LINE_LEN},
    relay, Error, Source, Subscription,
};

/// Entry point for opening and relaying event streams.
///
/// ```no_run
/// # async fn run() -> Result<(), sse_relay::Error> {
/// use tokio_util::sync::CancellationToken;
///
/// let client = sse_relay::Client::new()?;
/// let url = client.create_channel().await?;
/// let mut subscription = client.subscribe(&url, &CancellationToken::new()).await?;
/// while let Some(event) = subscription.recv().await {
///     println!("{} {}", event.name, event.text());
/// }
/// subscription.finish().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct Client {
    http: reqwest::Client,
    bootstrap: reqwest::Client,
    channel_endpoint: String,
    grammar: Grammar,
    max_line_len: usize,
}

#[derive(Debug)]
pub struct ClientBuilder {
    channel_endpoint: String,
    grammar: Grammar,
    max_line_len: usize,
    connect_timeout: Option<Duration>,
    user_agent: Option<String>,
}

impl Client {
    pub fn new() -> Result<Self, Error> {
        Self::builder().build()
    }

    pub fn builder() -> ClientBuilder {
        ClientBuilder::default()
    }

    /// Opens `url` as an event stream without reading from it.
    ///
    /// Fails if `cancel` fires before the response arrives.
    pub async fn open(&self, url: &str, cancel: &CancellationToken) -> Result<Source, Error> {
        connect::open(&self.http, url, cancel, self.grammar, self.max_line_len).await
    }

    /// Opens `url` and relays its events on a background task.
    ///
    /// Cancelling `cancel` stops the relay just like
    /// [`Subscription::stop`] does.
    pub async fn subscribe(
        &self,
        url: &str,
        cancel: &CancellationToken,
    ) -> Result<Subscription, Error> {
        let source = self.open(url, cancel).await?;
        Ok(relay::spawn(source.into_body(), cancel.child_token()))
    }

    /// Creates a new channel on the configured endpoint and returns its URL.
    pub async fn create_channel(&self) -> Result<String, Error> {
        channel::create(&self.bootstrap, &self.channel_endpoint).await
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self {
            channel_endpoint: DEFAULT_CHANNEL_ENDPOINT.to_owned(),
            grammar: Grammar::default(),
            max_line_len: DEFAULT_MAX_LINE_LEN,
            connect_timeout: None,
            user_agent: None,
        }
    }
}

impl ClientBuilder {
    pub fn grammar(mut self, grammar: Grammar) -> Self {
        self.grammar = grammar;
        self
    }

    pub fn max_line_len(mut self, max_line_len: usize) -> Self {
        self.max_line_len = max_line_len;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    pub fn channel_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.channel_endpoint = endpoint.into();
        self
    }

    pub fn build(self) -> Result<Client, Error> {
        // No overall request timeout: the stream is meant to stay open.
        let http = self.http_builder().build().map_err(Error::transport)?;
        let bootstrap = self
            .http_builder()
            .redirect(Policy::none())
            .build()
            .map_err(Error::transport)?;

        Ok(Client {
            http,
            bootstrap,
            channel_endpoint: self.channel_endpoint,
            grammar: self.grammar,
            max_line_len: self.max_line_len,
        })
    }

    fn http_builder(&self) -> reqwest::ClientBuilder {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = self.connect_timeout {
            builder = builder.connect_timeout(timeout);
        }
        if let Some(user_agent) = &self.user_agent {
            builder = builder.user_agent(user_agent.as_str());
        }
        builder
    }
}
