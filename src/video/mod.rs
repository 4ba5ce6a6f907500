//! Camera capture for the video producer.
//!
//! Two capture backends exist and the choice is made once, when the
//! [`VideoSource`] is built from config. The capture loop only ever sees a
//! [`Camera`] through the `ImageInput` trait.

mod encode;
mod mjpeg;
mod snapshot;
mod stream;

pub use encode::fit_jpeg;
pub use mjpeg::MjpegSplitter;

use crate::device::ImageInput;
use crate::error::DeviceError;
use snapshot::SnapshotCamera;
use std::time::Duration;
use stream::StreamCamera;

/// Longest wait for the first frame when a camera opens.
const FIRST_FRAME_TIMEOUT: Duration = Duration::from_secs(5);

/// How long a capture may go without a frame before it counts as stalled.
fn stall_timeout(interval: Duration) -> Duration {
    interval.saturating_mul(3).max(FIRST_FRAME_TIMEOUT)
}

/// Where camera frames come from.
#[derive(Debug, Clone, PartialEq)]
pub enum VideoSource {
    /// A long-running `ffmpeg` process reading a camera device and emitting MJPEG.
    Stream {
        ffmpeg_cmd: String,
        input_format: String,
        device: String,
        interval: Duration,
    },
    /// A command run once per frame that writes one encoded image to stdout.
    Snapshot {
        program: String,
        args: Vec<String>,
        interval: Duration,
    },
}

impl VideoSource {
    pub fn label(&self) -> &'static str {
        match self {
            VideoSource::Stream { .. } => "ffmpeg stream",
            VideoSource::Snapshot { .. } => "snapshot command",
        }
    }
}

enum Backend {
    Stream(StreamCamera),
    Snapshot(SnapshotCamera),
}

/// An open camera. Dropping it stops any capture process it owns.
pub struct Camera {
    backend: Backend,
}

impl Camera {
    /// Start the configured backend and wait for a first frame, so a missing
    /// or busy camera fails here rather than inside the capture loop.
    pub fn open(source: &VideoSource) -> Result<Self, DeviceError> {
        let backend = match source {
            VideoSource::Stream {
                ffmpeg_cmd,
                input_format,
                device,
                interval,
            } => Backend::Stream(StreamCamera::open(
                ffmpeg_cmd,
                input_format,
                device,
                *interval,
            )?),
            VideoSource::Snapshot {
                program,
                args,
                interval,
            } => Backend::Snapshot(SnapshotCamera::open(
                program,
                args,
                stall_timeout(*interval),
            )?),
        };
        tracing::info!(backend = source.label(), "camera opened");
        Ok(Self { backend })
    }
}

impl ImageInput for Camera {
    fn read_frame(&mut self) -> Result<Option<Vec<u8>>, DeviceError> {
        match &mut self.backend {
            Backend::Stream(camera) => camera.read_frame(),
            Backend::Snapshot(camera) => camera.read_frame(),
        }
    }
}

impl Drop for Camera {
    fn drop(&mut self) {
        tracing::info!("camera released");
    }
}
