//! The background task moving decoded events to a consumer.

use futures_core::Stream;
use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::{Error, Event, Subscription};

/// How a relay ended when nothing went wrong.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Shutdown {
    /// The remote closed the stream.
    Drained,
    /// A stop was requested, the cancellation token fired, or the consumer
    /// went away.
    Stopped,
}

/// Relays `body` on a new task until it ends, fails, or `cancel` fires.
///
/// Must be called from within a tokio runtime.
pub fn spawn<S>(body: S, cancel: CancellationToken) -> Subscription
where
    S: Stream<Item = Result<Event, Error>> + Send + Unpin + 'static,
{
    // Capacity one plus the wait in `handoff` makes every send a rendezvous.
    let (events, receiver) = mpsc::channel(1);
    let task = tokio::spawn(run(body, events, cancel.clone()));
    Subscription::new(receiver, cancel, task)
}

async fn run<S>(
    mut body: S,
    events: mpsc::Sender<Event>,
    cancel: CancellationToken,
) -> Result<Shutdown, Error>
where
    S: Stream<Item = Result<Event, Error>> + Unpin,
{
    let mut relayed = 0u64;

    let outcome = loop {
        // Dropping the pending read aborts it, so an idle connection does
        // not keep a stopped relay alive.
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => break Ok(Shutdown::Stopped),
            _ = events.closed() => break Ok(Shutdown::Stopped),
            next = body.next() => next,
        };

        match next {
            None => break Ok(Shutdown::Drained),
            Some(Err(err)) => break Err(err),
            Some(Ok(event)) => {
                tracing::debug!(
                    id = %event.id,
                    name = %event.name,
                    len = event.data.len(),
                    "relaying event"
                );
                if !handoff(&events, event, &cancel).await {
                    break Ok(Shutdown::Stopped);
                }
                relayed += 1;
            }
        }
    };

    match &outcome {
        Ok(shutdown) => tracing::info!(?shutdown, relayed, "relay finished"),
        Err(err) => tracing::warn!(error = %err, relayed, "relay failed"),
    }

    // `body` and `events` drop here, closing the connection and the channel.
    outcome
}

/// Sends `event` and waits until the consumer has taken it. Returns false if
/// the relay should stop instead.
async fn handoff(events: &mpsc::Sender<Event>, event: Event, cancel: &CancellationToken) -> bool {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => false,
        taken = async {
            events.send(event).await.is_ok() && events.reserve().await.is_ok()
        } => taken,
    }
}
