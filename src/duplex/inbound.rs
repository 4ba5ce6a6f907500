use super::{PurgePolicy, TaskEnd, TaskResult};
use crate::cancel::CancelToken;
use crate::chunk::InboundEvent;
use crate::console::Transcript;
use crate::queue::PlaybackQueue;
use crate::remote::InboundStream;
use crossbeam_channel::select;

/// Demultiplex the remote's inbound stream.
///
/// Text is written to the transcript as soon as it arrives. Audio is queued
/// for playback, or discarded when playback is disabled. A turn boundary
/// purges whatever audio is still queued, subject to `policy`.
pub(super) fn run(
    stream: &InboundStream,
    playback: Option<&PlaybackQueue>,
    policy: PurgePolicy,
    transcript: &Transcript,
    cancel: &CancelToken,
    log_content: bool,
) -> TaskResult {
    let mut turns = 0u64;
    loop {
        let event = select! {
            recv(stream) -> event => match event {
                Ok(Ok(event)) => event,
                Ok(Err(err)) => return Err(err),
                Err(_) => return Ok(TaskEnd::RemoteClosed),
            },
            recv(cancel.receiver()) -> _ => return Ok(TaskEnd::Cancelled),
        };
        match event {
            InboundEvent::Text(text) => {
                if log_content {
                    tracing::debug!(text = %text, "model text");
                }
                transcript.model_text(&text);
            }
            InboundEvent::Audio(pcm) => {
                if let Some(queue) = playback {
                    queue.push(pcm);
                }
            }
            InboundEvent::TurnBoundary { interrupted } => {
                turns += 1;
                if let Some(queue) = playback.filter(|_| policy.purges(interrupted)) {
                    let purged = queue.purge();
                    if purged > 0 {
                        tracing::info!(purged, interrupted, "purged stale playback audio");
                    }
                }
                tracing::debug!(turns, interrupted, "turn boundary");
                transcript.end_turn();
            }
        }
    }
}
