//! Runs a [`MessageHandler`] over a bus subscription.
//!
//! Every inbound message gets its own task, so a slow lookup never holds
//! up the next request. Nothing is shared between requests.

use anyhow::Result;
use futures::StreamExt;
use futures::stream::FuturesUnordered;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::broadcast::{
    self,
    error::{RecvError, TryRecvError},
};
use tokio::task::JoinHandle;

use crate::bus::{BusMessage, MessageHandler};

/// What happened while serving.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServeStats {
    /// Messages taken off the subscription.
    pub received: u64,
    /// Handled without a fault.
    pub answered: u64,
    /// Abandoned by a fault (lookup failure, publish failure, panic).
    pub failed: u64,
    /// Dropped because the subscription fell behind.
    pub skipped: u64,
}

/// Handle messages from `inbox` until `shutdown` resolves or the
/// subscription closes, then wait for the requests still in flight.
///
/// Messages already queued when `shutdown` resolves are still handled.
/// Subscribe before anything is published: messages sent earlier are
/// never seen.
pub async fn serve<F>(
    mut inbox: broadcast::Receiver<BusMessage>,
    handler: Arc<dyn MessageHandler>,
    shutdown: F,
) -> Result<ServeStats>
where
    F: Future<Output = ()> + Send,
{
    let mut stats = ServeStats::default();
    let mut in_flight = FuturesUnordered::new();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                let queued = drain(&mut inbox, &handler, &mut in_flight, &mut stats);
                log::info!(
                    "shutdown requested, {} request(s) in flight ({queued} taken from the queue)",
                    in_flight.len()
                );
                break;
            }
            Some(done) = in_flight.next(), if !in_flight.is_empty() => {
                stats.record(done);
            }
            received = inbox.recv() => match received {
                Ok(message) => {
                    stats.received += 1;
                    in_flight.push(dispatch(&handler, message));
                }
                Err(RecvError::Lagged(n)) => {
                    log::warn!("fell behind, skipped {n} message(s)");
                    stats.skipped += n;
                }
                Err(RecvError::Closed) => {
                    log::info!("subscription closed");
                    break;
                }
            }
        }
    }

    while let Some(done) = in_flight.next().await {
        stats.record(done);
    }

    Ok(stats)
}

type Outcome = (String, Result<()>);
type Done = std::result::Result<Outcome, tokio::task::JoinError>;

fn dispatch(handler: &Arc<dyn MessageHandler>, message: BusMessage) -> JoinHandle<Outcome> {
    log::debug!("[{}] received on {}", message.id, message.topic);
    let handler = Arc::clone(handler);
    tokio::spawn(async move {
        let id = message.id.clone();
        (id, handler.handle(message).await)
    })
}

/// Take everything already queued on `inbox` without waiting.
fn drain(
    inbox: &mut broadcast::Receiver<BusMessage>,
    handler: &Arc<dyn MessageHandler>,
    in_flight: &mut FuturesUnordered<JoinHandle<Outcome>>,
    stats: &mut ServeStats,
) -> u64 {
    let mut taken = 0;
    loop {
        match inbox.try_recv() {
            Ok(message) => {
                stats.received += 1;
                taken += 1;
                in_flight.push(dispatch(handler, message));
            }
            Err(TryRecvError::Lagged(n)) => {
                log::warn!("fell behind, skipped {n} message(s)");
                stats.skipped += n;
            }
            Err(TryRecvError::Empty | TryRecvError::Closed) => return taken,
        }
    }
}

impl ServeStats {
    fn record(&mut self, done: Done) {
        match done {
            Ok((_, Ok(()))) => self.answered += 1,
            Ok((id, Err(e))) => {
                log::error!("[{id}] {e:#}");
                self.failed += 1;
            }
            Err(e) => {
                log::error!("handler task died: {e}");
                self.failed += 1;
            }
        }
    }
}
