use bytes::Buf;
use futures_core::{ready, Stream};
use std::{
    error::Error as StdError,
    pin::Pin,
    task::{Context, Poll},
};

use crate::{
    parser::{Grammar, Parser, DEFAULT_MAX_LINE_LEN},
    Error, Event,
};

/// Decodes a stream of byte chunks into a stream of [`Event`]s.
///
/// The first error ends the stream. An event that is still missing its
/// terminating blank line when the input ends is never yielded.
pub struct Body<S> {
    inner: S,

    parser: Parser,

    done: bool,
}

impl<S> Body<S> {
    pub fn new(inner: S, grammar: Grammar, max_line_len: usize) -> Self {
        Self {
            inner,
            parser: Parser::new(grammar, max_line_len),
            done: false,
        }
    }
}

impl<S, B, E> Stream for Body<S>
where
    S: Stream<Item = Result<B, E>> + Unpin,
    B: Buf,
    E: Into<Box<dyn StdError + Send + Sync>>,
{
    type Item = Result<Event, Error>;

    fn poll_next(mut self: Pin<&mut Self>, ctx: &mut Context) -> Poll<Option<Self::Item>> {
        if self.done {
            return Poll::Ready(None);
        }

        // Lines already buffered are drained before the inner stream is
        // polled again.
        loop {
            match self.parser.next() {
                Some(Ok(ev)) => return Poll::Ready(Some(Ok(ev))),
                Some(Err(err)) => {
                    self.done = true;
                    return Poll::Ready(Some(Err(Error::parser(err))));
                }
                None => (),
            }

            match ready!(Pin::new(&mut self.inner).poll_next(ctx)) {
                Some(Ok(bs)) => self.parser.put(bs),
                Some(Err(err)) => {
                    self.done = true;
                    return Poll::Ready(Some(Err(Error::transport(err))));
                }
                None => {
                    self.done = true;
                    let tail = self.parser.finish().map_err(Error::parser);
                    return Poll::Ready(tail.err().map(Err));
                }
            }
        }
    }
}

impl<S, B, E> From<S> for Body<S>
where
    S: Stream<Item = Result<B, E>> + Unpin,
    B: Buf,
    E: Into<Box<dyn StdError + Send + Sync>>,
{
    fn from(inner: S) -> Self {
        Self::new(inner, Grammar::default(), DEFAULT_MAX_LINE_LEN)
    }
}

/// Turns any stream of byte chunks into an event stream.
pub trait SseBody: Sized {
    fn into_sse(self) -> Body<Self>;
}

impl<S, B, E> SseBody for S
where
    S: Stream<Item = Result<B, E>> + Unpin,
    B: Buf,
    E: Into<Box<dyn StdError + Send + Sync>>,
{
    fn into_sse(self) -> Body<Self> {
        Body::from(self)
    }
}
