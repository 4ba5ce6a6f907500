//! Speaker playback via CPAL.
//!
//! The output callback pulls mono samples from a shared buffer and copies
//! each one to every device channel. [`Speaker::write`] tops the buffer up
//! and then waits until it drains below a small high-water mark, which makes
//! writes pace like a blocking device write and keeps the amount of audio a
//! purge cannot reach to a fraction of a second.

use super::pcm::pcm16_to_f32;
use super::resample::StreamResampler;
use super::{device_label, select_device, DEFAULT_RECEIVE_RATE};
use crate::device::AudioOutput;
use crate::error::DeviceError;
use anyhow::{Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, SampleFormat, SizedSample, StreamConfig};
use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

const DRAIN_POLL: Duration = Duration::from_millis(20);

#[derive(Debug, Clone)]
pub struct SpeakerConfig {
    pub device: Option<String>,
    /// Rate of the PCM handed to `write`.
    pub sample_rate: u32,
    /// Audio allowed to sit in the device buffer before `write` blocks.
    pub buffer_ms: u64,
    /// `write` fails if the device consumes nothing for this long.
    pub stall_timeout: Duration,
}

impl Default for SpeakerConfig {
    fn default() -> Self {
        Self {
            device: None,
            sample_rate: DEFAULT_RECEIVE_RATE,
            buffer_ms: 200,
            stall_timeout: Duration::from_secs(2),
        }
    }
}

pub fn list_output_devices() -> Result<Vec<String>> {
    let host = cpal::default_host();
    let devices = host
        .output_devices()
        .context("no output devices available")?;
    Ok(devices.filter_map(|device| device.name().ok()).collect())
}

struct SharedBuffer {
    samples: Mutex<VecDeque<f32>>,
    drained: Condvar,
}

/// An open playback stream. Dropping it stops the stream.
pub struct Speaker {
    stream: cpal::Stream,
    shared: Arc<SharedBuffer>,
    name: String,
    resampler: StreamResampler,
    high_water: usize,
    stall_timeout: Duration,
    stream_error: Arc<Mutex<Option<String>>>,
}

impl Speaker {
    pub fn open(config: &SpeakerConfig) -> Result<Self, DeviceError> {
        let device = select_device(config.device.as_deref(), false)
            .map_err(|err| DeviceError::unavailable("speaker", format!("{err:#}")))?;
        let name = device_label(&device);
        let default_config = device
            .default_output_config()
            .map_err(|err| DeviceError::unavailable(name.clone(), err))?;
        let format = default_config.sample_format();
        let stream_config: StreamConfig = default_config.into();
        let device_rate = stream_config.sample_rate.0;
        let channels = usize::from(stream_config.channels.max(1));

        let shared = Arc::new(SharedBuffer {
            samples: Mutex::new(VecDeque::new()),
            drained: Condvar::new(),
        });
        let stream_error = Arc::new(Mutex::new(None));

        let stream = match format {
            SampleFormat::F32 => build_output::<f32>(
                &device,
                &stream_config,
                channels,
                shared.clone(),
                stream_error.clone(),
            ),
            SampleFormat::I16 => build_output::<i16>(
                &device,
                &stream_config,
                channels,
                shared.clone(),
                stream_error.clone(),
            ),
            SampleFormat::U16 => build_output::<u16>(
                &device,
                &stream_config,
                channels,
                shared.clone(),
                stream_error.clone(),
            ),
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
        tracing::info!(device = %name, device_rate, channels, "speaker opened");

        let high_water = ((device_rate as u64 * config.buffer_ms) / 1000).max(1) as usize;
        Ok(Self {
            stream,
            shared,
            name,
            resampler: StreamResampler::new(config.sample_rate, device_rate),
            high_water,
            stall_timeout: config.stall_timeout,
            stream_error,
        })
    }

    fn take_stream_error(&self) -> Option<String> {
        crate::lock_or_recover(&self.stream_error, "speaker error slot").take()
    }
}

fn build_output<T>(
    device: &cpal::Device,
    config: &StreamConfig,
    channels: usize,
    shared: Arc<SharedBuffer>,
    stream_error: Arc<Mutex<Option<String>>>,
) -> Result<cpal::Stream, cpal::BuildStreamError>
where
    T: SizedSample + FromSample<f32>,
{
    device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            // Never block the audio thread; output silence if the writer holds the lock.
            let Ok(mut samples) = shared.samples.try_lock() else {
                data.fill(T::from_sample(0.0f32));
                return;
            };
            for frame in data.chunks_mut(channels) {
                let value = T::from_sample(samples.pop_front().unwrap_or(0.0));
                frame.fill(value);
            }
            drop(samples);
            shared.drained.notify_all();
        },
        move |err| {
            tracing::warn!(%err, "speaker stream error");
            *crate::lock_or_recover(&stream_error, "speaker error slot") = Some(err.to_string());
        },
        None,
    )
}

impl AudioOutput for Speaker {
    fn write(&mut self, pcm: &[u8]) -> Result<(), DeviceError> {
        if let Some(err) = self.take_stream_error() {
            return Err(DeviceError::Write(err));
        }
        let samples = self.resampler.process(&pcm16_to_f32(pcm));

        let mut buffer = crate::lock_or_recover(&self.shared.samples, "speaker buffer");
        buffer.extend(samples);

        let mut last_len = buffer.len();
        let mut last_progress = Instant::now();
        while buffer.len() > self.high_water {
            let (guard, _) = self
                .shared
                .drained
                .wait_timeout(buffer, DRAIN_POLL)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            buffer = guard;

            if buffer.len() < last_len {
                last_len = buffer.len();
                last_progress = Instant::now();
            } else if last_progress.elapsed() >= self.stall_timeout {
                buffer.clear();
                return Err(DeviceError::Write(format!(
                    "{} stopped consuming audio",
                    self.name
                )));
            }
            if let Some(err) = self.take_stream_error() {
                return Err(DeviceError::Write(err));
            }
        }
        Ok(())
    }
}

impl Drop for Speaker {
    fn drop(&mut self) {
        if let Err(err) = self.stream.pause() {
            tracing::debug!(%err, "failed to pause speaker stream");
        }
        tracing::info!(device = %self.name, "speaker released");
    }
}
