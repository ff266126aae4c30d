use futures_core::Stream;
use std::{
    pin::Pin,
    task::{Context, Poll},
};
use tokio::{sync::mpsc, task::JoinHandle};
use tokio_util::sync::{CancellationToken, DropGuard};

use crate::{Error, Event, Shutdown};

/// A running relay.
///
/// Events are received with [`recv`](Subscription::recv) or through the
/// [`Stream`] impl, in the order the stream delivered them. Once the relay
/// ends, `recv` returns `None` and [`finish`](Subscription::finish) tells
/// why. Dropping the subscription stops the relay.
#[derive(Debug)]
pub struct Subscription {
    events: mpsc::Receiver<Event>,
    stop: CancellationToken,
    task: JoinHandle<Result<Shutdown, Error>>,
    _guard: DropGuard,
}

/// Stops a [`Subscription`] from elsewhere. Cheap to clone.
#[derive(Clone, Debug)]
pub struct StopHandle(CancellationToken);

impl StopHandle {
    pub fn stop(&self) {
        self.0.cancel()
    }
}

impl Subscription {
    pub(crate) fn new(
        events: mpsc::Receiver<Event>,
        stop: CancellationToken,
        task: JoinHandle<Result<Shutdown, Error>>,
    ) -> Self {
        Self {
            _guard: stop.clone().drop_guard(),
            events,
            stop,
            task,
        }
    }

    /// Next event, or `None` once the relay has ended.
    pub async fn recv(&mut self) -> Option<Event> {
        self.events.recv().await
    }

    /// Asks the relay to stop. Calling it again has no effect.
    pub fn stop(&self) {
        self.stop.cancel()
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle(self.stop.clone())
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.is_cancelled()
    }

    /// Waits for the relay to end and returns how it ended.
    ///
    /// Events not yet received are discarded. After `recv` returned `None`
    /// this resolves immediately.
    pub async fn finish(self) -> Result<Shutdown, Error> {
        let Subscription {
            events,
            task,
            _guard,
            ..
        } = self;
        drop(events);

        task.await.map_err(Error::task_failed)?
    }
}

impl Stream for Subscription {
    type Item = Event;

    fn poll_next(mut self: Pin<&mut Self>, ctx: &mut Context) -> Poll<Option<Self::Item>> {
        self.events.poll_recv(ctx)
    }
}
