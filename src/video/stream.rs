use super::mjpeg::MjpegSplitter;
use super::{stall_timeout, FIRST_FRAME_TIMEOUT};
use crate::error::DeviceError;
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use std::io::Read;
use std::process::{Child, ChildStdout, Command, Stdio};
use std::thread;
use std::time::Duration;

const READ_BUF_BYTES: usize = 64 * 1024;

/// Camera backed by a persistent `ffmpeg` child writing MJPEG to a pipe.
///
/// A reader thread drains the pipe and keeps only the newest frame, so a
/// slow consumer always gets a fresh image instead of a backlog.
pub(super) struct StreamCamera {
    child: Child,
    frames: Receiver<Vec<u8>>,
    reader: Option<thread::JoinHandle<()>>,
    primed: Option<Vec<u8>>,
    stall_timeout: Duration,
}

impl StreamCamera {
    pub(super) fn open(
        ffmpeg_cmd: &str,
        input_format: &str,
        device: &str,
        interval: Duration,
    ) -> Result<Self, DeviceError> {
        let fps = 1000.0 / interval.as_millis().max(1) as f64;
        let mut child = Command::new(ffmpeg_cmd)
            .args(["-hide_banner", "-loglevel", "error", "-f", input_format, "-i", device])
            .arg("-vf")
            .arg(format!("fps={fps:.3}"))
            .args(["-f", "image2pipe", "-c:v", "mjpeg", "-q:v", "5", "-"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|err| DeviceError::unavailable(device, format!("failed to start {ffmpeg_cmd}: {err}")))?;

        let Some(stdout) = child.stdout.take() else {
            let _ = child.kill();
            let _ = child.wait();
            return Err(DeviceError::unavailable(device, "ffmpeg stdout not captured"));
        };
        let (sender, frames) = bounded(1);
        let reader = thread::Builder::new()
            .name("voxlink-camera-pipe".to_string())
            .spawn({
                let latest = frames.clone();
                move || pump_frames(stdout, sender, latest)
            })
            .map_err(|err| DeviceError::unavailable(device, err))?;

        let mut camera = Self {
            child,
            frames,
            reader: Some(reader),
            primed: None,
            stall_timeout: stall_timeout(interval),
        };
        match camera.frames.recv_timeout(FIRST_FRAME_TIMEOUT) {
            Ok(frame) => {
                camera.primed = Some(frame);
                Ok(camera)
            }
            Err(err) => {
                let reason = camera.stop_and_collect_stderr();
                let reason = if reason.is_empty() {
                    match err {
                        RecvTimeoutError::Timeout => "no frame within 5s".to_string(),
                        RecvTimeoutError::Disconnected => "ffmpeg exited".to_string(),
                    }
                } else {
                    reason
                };
                Err(DeviceError::unavailable(device, reason))
            }
        }
    }

    pub(super) fn read_frame(&mut self) -> Result<Option<Vec<u8>>, DeviceError> {
        if let Some(frame) = self.primed.take() {
            return Ok(Some(frame));
        }
        match self.frames.recv_timeout(self.stall_timeout) {
            Ok(frame) => Ok(Some(frame)),
            Err(RecvTimeoutError::Timeout) => {
                Err(DeviceError::Stalled(self.stall_timeout.as_millis() as u64))
            }
            Err(RecvTimeoutError::Disconnected) => Ok(None),
        }
    }

    /// Kill the child and return whatever it wrote to stderr.
    fn stop_and_collect_stderr(&mut self) -> String {
        self.stop();
        let mut stderr = String::new();
        if let Some(mut pipe) = self.child.stderr.take() {
            let _ = pipe.read_to_string(&mut stderr);
        }
        stderr.trim().to_string()
    }

    fn stop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
        if let Some(reader) = self.reader.take() {
            let _ = reader.join();
        }
    }
}

impl Drop for StreamCamera {
    fn drop(&mut self) {
        self.stop();
    }
}

fn pump_frames(mut stdout: ChildStdout, sender: Sender<Vec<u8>>, latest: Receiver<Vec<u8>>) {
    let mut splitter = MjpegSplitter::new();
    let mut buf = vec![0u8; READ_BUF_BYTES];
    loop {
        let read = match stdout.read(&mut buf) {
            Ok(0) | Err(_) => break,
            Ok(read) => read,
        };
        for mut frame in splitter.push(&buf[..read]) {
            loop {
                match sender.try_send(frame) {
                    Ok(()) => break,
                    Err(TrySendError::Full(rejected)) => {
                        // Replace the stale frame nobody picked up yet.
                        let _ = latest.try_recv();
                        frame = rejected;
                    }
                    Err(TrySendError::Disconnected(_)) => return,
                }
            }
        }
    }
    tracing::debug!("camera pipe closed");
}
