//! Capture producers: console text, microphone audio and camera frames.
//!
//! Opening a device is the only fatal step here. Once a producer is running,
//! a failed read ends that producer as if its input had run dry, and the rest
//! of the session keeps going.

use super::{TaskEnd, TaskResult};
use crate::audio::{EnergyGate, GateConfig};
use crate::cancel::CancelToken;
use crate::chunk::{OutboundChunk, JPEG_MIME};
use crate::console::Transcript;
use crate::device::DeviceProvider;
use crate::queue::OutboundProducer;
use crate::video::fit_jpeg;
use crossbeam_channel::{select, Receiver};
use std::time::Duration;

pub(super) fn run_text(
    console: Receiver<String>,
    exit_command: &str,
    producer: &OutboundProducer,
    cancel: &CancelToken,
    transcript: &Transcript,
    log_content: bool,
) -> TaskResult {
    let mut sent = 0u64;
    loop {
        transcript.prompt();
        let line = select! {
            recv(console) -> line => match line {
                Ok(line) => line,
                Err(_) => {
                    tracing::info!(sent, "console closed");
                    return Ok(TaskEnd::Finished);
                }
            },
            recv(cancel.receiver()) -> _ => return Ok(TaskEnd::Cancelled),
        };
        transcript.line_entered();
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line.eq_ignore_ascii_case(exit_command) {
            return Ok(TaskEnd::UserExit);
        }
        if log_content {
            tracing::debug!(text = line, "user turn");
        } else {
            tracing::debug!(chars = line.chars().count(), "user turn");
        }
        if producer.put(OutboundChunk::user_turn(line), cancel).is_err() {
            return Ok(TaskEnd::Cancelled);
        }
        sent += 1;
    }
}

pub(super) fn run_audio(
    devices: &dyn DeviceProvider,
    gate: GateConfig,
    producer: &OutboundProducer,
    cancel: &CancelToken,
) -> TaskResult {
    let mut microphone = devices
        .open_microphone()
        .map_err(|err| err.into_open_failure("microphone"))?;
    let mut gate = EnergyGate::new(gate);
    let mut sent = 0u64;

    let end = loop {
        if cancel.is_cancelled() {
            break TaskEnd::Cancelled;
        }
        let frame = match microphone.read_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => break TaskEnd::Finished,
            Err(err) => {
                tracing::warn!(%err, "microphone read failed; stopping audio capture");
                break TaskEnd::Finished;
            }
        };
        if !gate.admit(frame.level_db) {
            continue;
        }
        let chunk = OutboundChunk::Audio {
            pcm: frame.pcm,
            sample_rate: frame.sample_rate,
            channels: frame.channels,
        };
        if producer.put(chunk, cancel).is_err() {
            break TaskEnd::Cancelled;
        }
        sent += 1;
    };
    tracing::info!(sent, suppressed = gate.suppressed(), "audio capture stopped");
    Ok(end)
}

#[derive(Debug, Clone, Copy)]
pub(super) struct VideoSettings {
    pub(super) interval: Duration,
    pub(super) max_dim: u32,
    pub(super) quality: u8,
}

pub(super) fn run_video(
    devices: &dyn DeviceProvider,
    settings: VideoSettings,
    producer: &OutboundProducer,
    cancel: &CancelToken,
) -> TaskResult {
    let mut camera = devices
        .open_camera()
        .map_err(|err| err.into_open_failure("camera"))?;
    let mut sent = 0u64;

    let end = loop {
        if cancel.is_cancelled() {
            break TaskEnd::Cancelled;
        }
        let raw = match camera.read_frame() {
            Ok(Some(raw)) => raw,
            Ok(None) => break TaskEnd::Finished,
            Err(err) => {
                tracing::warn!(%err, "camera read failed; stopping video capture");
                break TaskEnd::Finished;
            }
        };
        match fit_jpeg(&raw, settings.max_dim, settings.quality) {
            Ok(data) => {
                let chunk = OutboundChunk::Image {
                    data,
                    mime_type: JPEG_MIME.to_string(),
                };
                if producer.put(chunk, cancel).is_err() {
                    break TaskEnd::Cancelled;
                }
                sent += 1;
            }
            Err(err) => tracing::warn!(%err, bytes = raw.len(), "dropping undecodable camera frame"),
        }
        if cancel.sleep(settings.interval) {
            break TaskEnd::Cancelled;
        }
    };
    tracing::info!(sent, "video capture stopped");
    Ok(end)
}
