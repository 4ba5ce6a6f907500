use super::{TaskEnd, TaskResult};
use crate::cancel::CancelToken;
use crate::device::DeviceProvider;
use crate::error::SessionError;
use crossbeam_channel::{select, Receiver};

/// Play queued fragments in arrival order. A failed write ends the session.
pub(super) fn run(
    devices: &dyn DeviceProvider,
    queue: &Receiver<Vec<u8>>,
    cancel: &CancelToken,
) -> TaskResult {
    let mut speaker = devices
        .open_speaker()
        .map_err(|err| err.into_open_failure("speaker"))?;
    let mut played = 0u64;
    loop {
        let fragment = select! {
            recv(queue) -> fragment => match fragment {
                Ok(fragment) => fragment,
                Err(_) => return Ok(TaskEnd::Finished),
            },
            recv(cancel.receiver()) -> _ => {
                tracing::debug!(played, "playback stopped");
                return Ok(TaskEnd::Cancelled);
            }
        };
        speaker
            .write(&fragment)
            .map_err(|err| SessionError::Playback(err.to_string()))?;
        played += 1;
    }
}
