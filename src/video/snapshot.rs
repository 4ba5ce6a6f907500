use crate::error::DeviceError;
use crossbeam_channel::{bounded, Receiver};
use std::io::{self, Read};
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

const EXIT_POLL: Duration = Duration::from_millis(20);

/// Camera backed by a one-shot capture command (e.g. `libcamera-still -o -`).
///
/// Each capture must finish within `stall_timeout`; a command that hangs is
/// killed and the read fails with [`DeviceError::Stalled`].
pub(super) struct SnapshotCamera {
    program: String,
    args: Vec<String>,
    stall_timeout: Duration,
    primed: Option<Vec<u8>>,
}

impl SnapshotCamera {
    pub(super) fn open(
        program: &str,
        args: &[String],
        stall_timeout: Duration,
    ) -> Result<Self, DeviceError> {
        let mut camera = Self {
            program: program.to_string(),
            args: args.to_vec(),
            stall_timeout,
            primed: None,
        };
        let first = camera
            .capture()
            .map_err(|err| DeviceError::unavailable(program, err))?;
        camera.primed = Some(first);
        Ok(camera)
    }

    pub(super) fn read_frame(&mut self) -> Result<Option<Vec<u8>>, DeviceError> {
        if let Some(frame) = self.primed.take() {
            return Ok(Some(frame));
        }
        self.capture().map(Some)
    }

    fn capture(&self) -> Result<Vec<u8>, DeviceError> {
        let deadline = Instant::now() + self.stall_timeout;
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|err| DeviceError::Read(format!("failed to run {}: {err}", self.program)))?;

        let (stdout, stderr) = match collect_pipes(&mut child) {
            Ok(pipes) => pipes,
            Err(err) => {
                stop(&mut child);
                return Err(DeviceError::Read(format!(
                    "cannot read {} output: {err}",
                    self.program
                )));
            }
        };

        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) if Instant::now() >= deadline => {
                    stop(&mut child);
                    tracing::warn!(program = %self.program, "snapshot command hung; killed it");
                    return Err(self.stalled());
                }
                Ok(None) => thread::sleep(EXIT_POLL),
                Err(err) => {
                    stop(&mut child);
                    return Err(DeviceError::Read(format!(
                        "failed to wait for {}: {err}",
                        self.program
                    )));
                }
            }
        };

        // A background process the command left behind may still hold the pipes.
        let remaining = deadline
            .saturating_duration_since(Instant::now())
            .max(EXIT_POLL);
        let image = stdout.recv_timeout(remaining).map_err(|_| self.stalled())?;
        if !status.success() {
            let stderr = stderr.recv_timeout(remaining).unwrap_or_default();
            return Err(DeviceError::Read(format!(
                "{} exited with {}: {}",
                self.program,
                status,
                String::from_utf8_lossy(&stderr).trim()
            )));
        }
        if image.is_empty() {
            return Err(DeviceError::Read(format!("{} produced no image", self.program)));
        }
        Ok(image)
    }

    fn stalled(&self) -> DeviceError {
        DeviceError::Stalled(self.stall_timeout.as_millis() as u64)
    }
}

fn stop(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

/// Read stdout and stderr to the end on detached threads.
///
/// The threads are never joined; each exits once its pipe closes.
fn collect_pipes(child: &mut Child) -> io::Result<(Receiver<Vec<u8>>, Receiver<Vec<u8>>)> {
    let stdout = read_to_end(child.stdout.take())?;
    let stderr = read_to_end(child.stderr.take())?;
    Ok((stdout, stderr))
}

fn read_to_end<R>(pipe: Option<R>) -> io::Result<Receiver<Vec<u8>>>
where
    R: Read + Send + 'static,
{
    let (tx, rx) = bounded(1);
    if let Some(mut pipe) = pipe {
        thread::Builder::new()
            .name("voxlink-snapshot-pipe".to_string())
            .spawn(move || {
                let mut bytes = Vec::new();
                let _ = pipe.read_to_end(&mut bytes);
                let _ = tx.send(bytes);
            })?;
    }
    Ok(rx)
}
