//! Relays events from a hosted Server-Sent Events channel to a local consumer.
//!
//! [`Client::subscribe`] opens the stream, checks that the remote really
//! answered with an event stream, and relays every decoded [`Event`] on a
//! background task. The returned [`Subscription`] yields the events and
//! reports how the relay ended: the remote closed the stream, it was
//! stopped, or it failed with an [`Error`].
//!
//! The decoder is also usable on its own over any stream of byte chunks,
//! see [`SseBody`].

mod body;
mod channel;
mod client;
mod connect;
mod error;
mod event;
mod parser;
mod relay;
mod subscription;

pub use {
    body::{Body, SseBody},
    channel::DEFAULT_CHANNEL_ENDPOINT,
    client::{Client, ClientBuilder},
    connect::{ByteStream, Source},
    error::{Error, ErrorKind},
    event::Event,
    parser::{Grammar, DEFAULT_MAX_LINE_LEN},
    relay::{spawn, Shutdown},
    subscription::{StopHandle, Subscription},
};
