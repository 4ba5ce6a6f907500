use super::{TaskEnd, TaskResult};
use crate::cancel::CancelToken;
use crate::chunk::OutboundChunk;
use crate::remote::RemoteSession;
use crossbeam_channel::{select, Receiver};

/// Drain the outbound queue into the remote session, one chunk at a time, in
/// queue order. Owns the session handle, so the connection closes when this
/// returns.
pub(super) fn run(
    mut session: Box<dyn RemoteSession>,
    queue: &Receiver<OutboundChunk>,
    cancel: &CancelToken,
) -> TaskResult {
    let mut sent = 0u64;
    loop {
        select! {
            recv(queue) -> chunk => match chunk {
                Ok(chunk) => {
                    tracing::trace!(kind = chunk.kind(), bytes = chunk.payload_len(), "forwarding");
                    session.send(chunk)?;
                    sent += 1;
                }
                Err(_) => {
                    // Every producer has ended. Keep the session open so the
                    // model can still answer, until the group is cancelled.
                    tracing::info!(sent, "outbound queue closed");
                    let _ = cancel.receiver().recv();
                    return Ok(TaskEnd::Finished);
                }
            },
            recv(cancel.receiver()) -> _ => {
                // Chunks accepted before cancellation still go out.
                for chunk in queue.try_iter() {
                    if let Err(err) = session.send(chunk) {
                        tracing::debug!(%err, "send failed while draining");
                        break;
                    }
                    sent += 1;
                }
                tracing::debug!(sent, "forwarder stopped");
                return Ok(TaskEnd::Cancelled);
            }
        }
    }
}
