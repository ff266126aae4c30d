//! Opening an event stream over HTTP.

use bytes::Bytes;
use futures_core::Stream;
use reqwest::{
    header::{ACCEPT, CONTENT_TYPE},
    StatusCode,
};
use std::pin::Pin;
use tokio_util::sync::CancellationToken;

use crate::{parser::Grammar, Body, Error};

pub(crate) const EVENT_STREAM: &str = "text/event-stream";

/// Response body of an open stream, as byte chunks.
pub type ByteStream = Pin<Box<dyn Stream<Item = reqwest::Result<Bytes>> + Send>>;

/// An open event stream whose body has not been read yet.
#[derive(Debug)]
pub struct Source {
    response: reqwest::Response,
    grammar: Grammar,
    max_line_len: usize,
}

impl Source {
    pub fn url(&self) -> &reqwest::Url {
        self.response.url()
    }

    /// Hands the body over to a decoder.
    pub fn into_body(self) -> Body<ByteStream> {
        let chunks: ByteStream = Box::pin(self.response.bytes_stream());
        Body::new(chunks, self.grammar, self.max_line_len)
    }
}

/// Sends `GET url` asking for an event stream and checks the response.
///
/// Only a `200 OK` answered with exactly `text/event-stream` is accepted.
/// Nothing is retried.
pub(crate) async fn open(
    http: &reqwest::Client,
    url: &str,
    cancel: &CancellationToken,
    grammar: Grammar,
    max_line_len: usize,
) -> Result<Source, Error> {
    tracing::debug!(%url, "opening event stream");

    let request = http.get(url).header(ACCEPT, EVENT_STREAM).send();
    let response = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(Error::cancelled()),
        response = request => response.map_err(Error::transport)?,
    };

    let status = response.status();
    if status != StatusCode::OK {
        tracing::warn!(%url, status = status.as_u16(), "event stream refused");
        return Err(Error::unexpected_status(status.as_u16()));
    }

    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned())
        .unwrap_or_default();
    if content_type != EVENT_STREAM {
        tracing::warn!(%url, %content_type, "response is not an event stream");
        return Err(Error::protocol_mismatch(content_type));
    }

    Ok(Source {
        response,
        grammar,
        max_line_len,
    })
}
