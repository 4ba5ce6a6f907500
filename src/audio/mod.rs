//! Live microphone capture and speaker playback.
//!
//! Capture runs through CPAL at the device's native format. Frames are
//! downmixed to mono, resampled to the send rate and packed as 16-bit PCM
//! before they leave this module. Playback goes the other way: 16-bit PCM at
//! the receive rate is expanded to whatever the output device wants.

/// Sample rate the remote session expects for user audio.
pub const DEFAULT_SEND_RATE: u32 = 16_000;

/// Sample rate of model audio coming back from the remote session.
pub const DEFAULT_RECEIVE_RATE: u32 = 24_000;

/// Samples per outbound audio frame at the send rate.
pub const DEFAULT_FRAME_SAMPLES: usize = 1024;

mod dispatch;
mod gate;
mod meter;
mod microphone;
mod pcm;
mod resample;
mod speaker;
#[cfg(test)]
mod tests;

pub use gate::{EnergyGate, GateConfig};
pub use meter::{rms_db, SILENCE_FLOOR_DB};
pub use microphone::{list_input_devices, Microphone, MicrophoneConfig};
pub use pcm::{f32_to_pcm16, pcm16_to_f32};
pub use speaker::{list_output_devices, Speaker, SpeakerConfig};

use anyhow::{anyhow, Context, Result};
use cpal::traits::{DeviceTrait, HostTrait};

/// Resolve a device by exact name, or the host default when no name is given.
fn select_device(preferred: Option<&str>, input: bool) -> Result<cpal::Device> {
    let host = cpal::default_host();
    let direction = if input { "input" } else { "output" };
    match preferred {
        Some(name) => {
            let mut devices = if input {
                host.input_devices()
                    .with_context(|| format!("no {direction} devices available"))?
            } else {
                host.output_devices()
                    .with_context(|| format!("no {direction} devices available"))?
            };
            devices
                .find(|d| d.name().map(|n| n == name).unwrap_or(false))
                .ok_or_else(|| anyhow!("{direction} device '{name}' not found"))
        }
        None => {
            let device = if input {
                host.default_input_device()
            } else {
                host.default_output_device()
            };
            device.with_context(|| format!("no default {direction} device available"))
        }
    }
}

fn device_label(device: &cpal::Device) -> String {
    device
        .name()
        .unwrap_or_else(|_| "unknown device".to_string())
}
