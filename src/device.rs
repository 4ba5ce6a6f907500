//! Local device seams used by the session tasks.
//!
//! Each task opens its own device on its own thread and holds the handle for
//! the rest of the task. Handles release their hardware in `Drop`, so every
//! exit path closes them exactly once, cancellation included. Handles are not
//! `Send`: CPAL streams must stay on the thread that built them.

use crate::audio::{Microphone, MicrophoneConfig, Speaker, SpeakerConfig};
use crate::error::DeviceError;
use crate::video::{Camera, VideoSource};

/// One captured block of microphone audio.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioFrame {
    /// 16-bit little-endian PCM.
    pub pcm: Vec<u8>,
    pub sample_rate: u32,
    pub channels: u16,
    /// RMS level of the frame in dBFS.
    pub level_db: f32,
}

/// A capture device producing audio frames.
pub trait AudioInput {
    /// Block for the next frame. `Ok(None)` means the device reached end of stream.
    fn read_frame(&mut self) -> Result<Option<AudioFrame>, DeviceError>;
}

/// A capture device producing encoded still images.
pub trait ImageInput {
    /// Block for the next image. `Ok(None)` means the device reached end of stream.
    fn read_frame(&mut self) -> Result<Option<Vec<u8>>, DeviceError>;
}

/// An audio output device.
pub trait AudioOutput {
    /// Play 16-bit little-endian PCM, blocking until the device accepts it.
    fn write(&mut self, pcm: &[u8]) -> Result<(), DeviceError>;
}

/// Opens devices on behalf of session tasks.
pub trait DeviceProvider: Send + Sync {
    fn open_microphone(&self) -> Result<Box<dyn AudioInput>, DeviceError>;
    fn open_camera(&self) -> Result<Box<dyn ImageInput>, DeviceError>;
    fn open_speaker(&self) -> Result<Box<dyn AudioOutput>, DeviceError>;
}

/// Settings the system provider needs to open real hardware.
#[derive(Debug, Clone)]
pub struct DeviceSettings {
    pub microphone: MicrophoneConfig,
    pub speaker: SpeakerConfig,
    pub video: Option<VideoSource>,
}

/// Opens the host's real microphone, camera and speaker.
#[derive(Debug, Clone)]
pub struct SystemDevices {
    settings: DeviceSettings,
}

impl SystemDevices {
    pub fn new(settings: DeviceSettings) -> Self {
        Self { settings }
    }
}

impl DeviceProvider for SystemDevices {
    fn open_microphone(&self) -> Result<Box<dyn AudioInput>, DeviceError> {
        Ok(Box::new(Microphone::open(&self.settings.microphone)?))
    }

    fn open_camera(&self) -> Result<Box<dyn ImageInput>, DeviceError> {
        let source = self
            .settings
            .video
            .as_ref()
            .ok_or_else(|| DeviceError::unavailable("camera", "no video source configured"))?;
        Ok(Box::new(Camera::open(source)?))
    }

    fn open_speaker(&self) -> Result<Box<dyn AudioOutput>, DeviceError> {
        Ok(Box::new(Speaker::open(&self.settings.speaker)?))
    }
}
