//! Microphone capture via CPAL.
//!
//! The CPAL callback slices device audio into fixed frames and hands them to
//! a bounded channel. [`Microphone::read_frame`] blocks on that channel and
//! runs every block through one resampler for the life of the stream, then
//! cuts the result into frames of exactly `frame_samples` and packs 16-bit PCM.

use super::dispatch::FrameDispatcher;
use super::meter::rms_db;
use super::pcm::f32_to_pcm16;
use super::resample::StreamResampler;
use super::{device_label, select_device, DEFAULT_FRAME_SAMPLES, DEFAULT_SEND_RATE};
use crate::device::{AudioFrame, AudioInput};
use crate::error::DeviceError;
use anyhow::{Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, StreamConfig};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// How to open the capture device and shape its frames.
#[derive(Debug, Clone)]
pub struct MicrophoneConfig {
    pub device: Option<String>,
    pub sample_rate: u32,
    pub frame_samples: usize,
    /// Frames buffered between the CPAL callback and the capture task.
    pub channel_capacity: usize,
    /// A read that waits longer than this fails with [`DeviceError::Stalled`].
    pub stall_timeout: Duration,
}

impl Default for MicrophoneConfig {
    fn default() -> Self {
        Self {
            device: None,
            sample_rate: DEFAULT_SEND_RATE,
            frame_samples: DEFAULT_FRAME_SAMPLES,
            channel_capacity: 32,
            stall_timeout: Duration::from_secs(2),
        }
    }
}

/// List microphone names so the CLI can expose a selector.
pub fn list_input_devices() -> Result<Vec<String>> {
    let host = cpal::default_host();
    let devices = host.input_devices().context("no input devices available")?;
    Ok(devices.filter_map(|device| device.name().ok()).collect())
}

/// An open capture stream. Dropping it stops the stream.
pub struct Microphone {
    stream: cpal::Stream,
    frames: Receiver<Vec<f32>>,
    name: String,
    resampler: StreamResampler,
    /// Resampled audio not yet handed out as a frame.
    pending: Vec<f32>,
    target_rate: u32,
    frame_samples: usize,
    stall_timeout: Duration,
    dropped: Arc<AtomicUsize>,
    stream_error: Arc<Mutex<Option<String>>>,
}

impl Microphone {
    pub fn open(config: &MicrophoneConfig) -> Result<Self, DeviceError> {
        let device = select_device(config.device.as_deref(), true)
            .map_err(|err| DeviceError::unavailable("microphone", format!("{err:#}")))?;
        let name = device_label(&device);
        let default_config = device
            .default_input_config()
            .map_err(|err| DeviceError::unavailable(name.clone(), err))?;
        let format = default_config.sample_format();
        let stream_config: StreamConfig = default_config.into();
        let device_rate = stream_config.sample_rate.0;
        let channels = usize::from(stream_config.channels.max(1));
        let frame_samples = config.frame_samples.max(1);
        let device_frame_samples =
            ((frame_samples as u64 * device_rate as u64) / config.sample_rate.max(1) as u64)
                .max(1) as usize;

        tracing::debug!(
            device = %name,
            ?format,
            device_rate,
            channels,
            device_frame_samples,
            "opening microphone"
        );

        let (sender, frames) = bounded::<Vec<f32>>(config.channel_capacity.max(1));
        let dropped = Arc::new(AtomicUsize::new(0));
        let dispatcher = Arc::new(Mutex::new(FrameDispatcher::new(
            device_frame_samples,
            sender,
            dropped.clone(),
        )));
        let stream_error = Arc::new(Mutex::new(None));
        let err_fn = {
            let stream_error = stream_error.clone();
            move |err: cpal::StreamError| {
                tracing::warn!(%err, "microphone stream error");
                *crate::lock_or_recover(&stream_error, "microphone error slot") =
                    Some(err.to_string());
            }
        };

        let stream = match format {
            SampleFormat::F32 => {
                let dispatcher = dispatcher.clone();
                let dropped = dropped.clone();
                device.build_input_stream(
                    &stream_config,
                    move |data: &[f32], _| {
                        if let Ok(mut pump) = dispatcher.try_lock() {
                            pump.push(data, channels, |sample| sample);
                        } else {
                            dropped.fetch_add(1, Ordering::Relaxed);
                        }
                    },
                    err_fn,
                    None,
                )
            }
            SampleFormat::I16 => {
                let dispatcher = dispatcher.clone();
                let dropped = dropped.clone();
                device.build_input_stream(
                    &stream_config,
                    move |data: &[i16], _| {
                        if let Ok(mut pump) = dispatcher.try_lock() {
                            pump.push(data, channels, |sample| sample as f32 / 32_768.0);
                        } else {
                            dropped.fetch_add(1, Ordering::Relaxed);
                        }
                    },
                    err_fn,
                    None,
                )
            }
            SampleFormat::U16 => {
                let dispatcher = dispatcher.clone();
                let dropped = dropped.clone();
                device.build_input_stream(
                    &stream_config,
                    move |data: &[u16], _| {
                        if let Ok(mut pump) = dispatcher.try_lock() {
                            pump.push(data, channels, |sample| {
                                (sample as f32 - 32_768.0) / 32_768.0
                            });
                        } else {
                            dropped.fetch_add(1, Ordering::Relaxed);
                        }
                    },
                    err_fn,
                    None,
                )
            }
            other => {
                return Err(DeviceError::unavailable(
                    name,
                    format!("unsupported sample format: {other:?}"),
                ))
            }
        }
        .map_err(|err| DeviceError::unavailable(name.clone(), err))?;

        stream
            .play()
            .map_err(|err| DeviceError::unavailable(name.clone(), err))?;
        tracing::info!(device = %name, "microphone opened");

        Ok(Self {
            stream,
            frames,
            name,
            resampler: StreamResampler::new(device_rate, config.sample_rate),
            pending: Vec::with_capacity(frame_samples * 2),
            target_rate: config.sample_rate,
            frame_samples,
            stall_timeout: config.stall_timeout,
            dropped,
            stream_error,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Frames lost because the capture task fell behind the callback.
    pub fn dropped_frames(&self) -> usize {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl AudioInput for Microphone {
    fn read_frame(&mut self) -> Result<Option<AudioFrame>, DeviceError> {
        if let Some(err) = crate::lock_or_recover(&self.stream_error, "microphone error slot").take()
        {
            return Err(DeviceError::Read(err));
        }
        while self.pending.len() < self.frame_samples {
            let raw = match self.frames.recv_timeout(self.stall_timeout) {
                Ok(raw) => raw,
                Err(RecvTimeoutError::Timeout) => {
                    return Err(DeviceError::Stalled(self.stall_timeout.as_millis() as u64))
                }
                Err(RecvTimeoutError::Disconnected) => return Ok(None),
            };
            let resampled = self.resampler.process(&raw);
            self.pending.extend_from_slice(&resampled);
        }
        let samples: Vec<f32> = self.pending.drain(..self.frame_samples).collect();
        Ok(Some(AudioFrame {
            level_db: rms_db(&samples),
            pcm: f32_to_pcm16(&samples),
            sample_rate: self.target_rate,
            channels: 1,
        }))
    }
}

impl Drop for Microphone {
    fn drop(&mut self) {
        if let Err(err) = self.stream.pause() {
            tracing::debug!(%err, "failed to pause microphone stream");
        }
        tracing::info!(
            device = %self.name,
            dropped_frames = self.dropped_frames(),
            "microphone released"
        );
    }
}
