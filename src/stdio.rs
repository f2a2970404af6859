//! Terminal bridge to the bus: stdin lines in, responses out.

use anyhow::Result;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::broadcast::{
    self,
    error::{RecvError, TryRecvError},
};

use crate::bus::{Bus, BusMessage, MessageHandler};

/// Publish every non-empty line of `reader` on `topic`. Returns the
/// number of requests sent once the reader hits EOF.
pub async fn pump<R>(reader: R, bus: Arc<dyn Bus>, topic: &str) -> Result<usize>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut sent = 0;

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let message = BusMessage::new(topic, line);
        log::debug!("[{}] sending {}", message.id, line);
        bus.publish(message).await?;
        sent += 1;
    }

    Ok(sent)
}

/// Write the body of every response seen on `monitor`, one per line,
/// until the bus goes away. Returns how many were written.
pub async fn print_responses<W>(
    mut monitor: broadcast::Receiver<BusMessage>,
    writer: &mut W,
) -> Result<usize>
where
    W: AsyncWrite + Unpin,
{
    let mut printed = 0;
    loop {
        match monitor.recv().await {
            Ok(message) if message.is_response() => {
                writer.write_all(message.content.as_bytes()).await?;
                writer.write_all(b"\n").await?;
                writer.flush().await?;
                printed += 1;
            }
            Ok(_) => {}
            Err(RecvError::Lagged(n)) => log::warn!("output fell behind, lost {n} message(s)"),
            Err(RecvError::Closed) => return Ok(printed),
        }
    }
}

/// Handle `request` to completion and return the replies it produced.
///
/// `monitor` must be subscribed before the call. Replies are published
/// before the handler returns, so nothing is waited for afterwards, even
/// when the handler gave up after an error reply.
pub async fn run_once(
    handler: &dyn MessageHandler,
    monitor: &mut broadcast::Receiver<BusMessage>,
    request: BusMessage,
) -> Vec<BusMessage> {
    let id = request.id.clone();
    if let Err(e) = handler.handle(request).await {
        log::warn!("[{id}] {e:#}");
    }

    let mut replies = Vec::new();
    loop {
        match monitor.try_recv() {
            Ok(message) if message.is_response() && message.id == id => replies.push(message),
            Ok(_) => {}
            Err(TryRecvError::Lagged(n)) => log::warn!("lost {n} message(s) while collecting"),
            Err(TryRecvError::Empty | TryRecvError::Closed) => return replies,
        }
    }
}
