use super::defaults::{
    API_KEY_PUNCTUATION, CONNECT_TIMEOUT_RANGE_MS, FORBIDDEN_DEVICE_CHARS, FRAME_SAMPLES_RANGE, GATE_DB_RANGE,
    IMAGE_DIM_RANGE, MAX_GATE_HANGOVER_FRAMES, OUTBOUND_CAPACITY_RANGE, SAMPLE_RATE_RANGE,
    VIDEO_INTERVAL_RANGE_MS,
};
use super::{AppConfig, VideoMode};
use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;

impl AppConfig {
    /// Parse CLI arguments and validate them right away.
    pub fn parse_args() -> Result<Self> {
        let mut config = Self::parse();
        config.validate()?;
        Ok(config)
    }

    /// Check CLI values and normalize free-form strings.
    pub fn validate(&mut self) -> Result<()> {
        for (flag, rate) in [
            ("--send-sample-rate", self.send_sample_rate),
            ("--receive-sample-rate", self.receive_sample_rate),
        ] {
            if !SAMPLE_RATE_RANGE.contains(&rate) {
                bail!(
                    "{flag} must be between {} and {} Hz, got {rate}",
                    SAMPLE_RATE_RANGE.start(),
                    SAMPLE_RATE_RANGE.end()
                );
            }
        }
        if !FRAME_SAMPLES_RANGE.contains(&self.audio_frame_samples) {
            bail!(
                "--audio-frame-samples must be between {} and {}, got {}",
                FRAME_SAMPLES_RANGE.start(),
                FRAME_SAMPLES_RANGE.end(),
                self.audio_frame_samples
            );
        }
        if let Some(gate_db) = self.audio_gate_db {
            if !gate_db.is_finite() || !GATE_DB_RANGE.contains(&gate_db) {
                bail!(
                    "--audio-gate-db must be between {} and {} dBFS, got {gate_db}",
                    GATE_DB_RANGE.start(),
                    GATE_DB_RANGE.end()
                );
            }
        }
        if self.audio_gate_hangover_frames > MAX_GATE_HANGOVER_FRAMES {
            bail!(
                "--audio-gate-hangover-frames must be at most {MAX_GATE_HANGOVER_FRAMES}, got {}",
                self.audio_gate_hangover_frames
            );
        }
        if !OUTBOUND_CAPACITY_RANGE.contains(&self.outbound_capacity) {
            bail!(
                "--outbound-capacity must be between {} and {}, got {}",
                OUTBOUND_CAPACITY_RANGE.start(),
                OUTBOUND_CAPACITY_RANGE.end(),
                self.outbound_capacity
            );
        }
        if !VIDEO_INTERVAL_RANGE_MS.contains(&self.video_interval_ms) {
            bail!(
                "--video-interval-ms must be between {} and {} ms, got {}",
                VIDEO_INTERVAL_RANGE_MS.start(),
                VIDEO_INTERVAL_RANGE_MS.end(),
                self.video_interval_ms
            );
        }
        if !IMAGE_DIM_RANGE.contains(&self.image_max_dim) {
            bail!(
                "--image-max-dim must be between {} and {} pixels, got {}",
                IMAGE_DIM_RANGE.start(),
                IMAGE_DIM_RANGE.end(),
                self.image_max_dim
            );
        }
        if !(1..=100).contains(&self.jpeg_quality) {
            bail!(
                "--jpeg-quality must be between 1 and 100, got {}",
                self.jpeg_quality
            );
        }
        if !CONNECT_TIMEOUT_RANGE_MS.contains(&self.connect_timeout_ms) {
            bail!(
                "--connect-timeout-ms must be between {} and {} ms, got {}",
                CONNECT_TIMEOUT_RANGE_MS.start(),
                CONNECT_TIMEOUT_RANGE_MS.end(),
                self.connect_timeout_ms
            );
        }

        let exit_command = self.exit_command.trim();
        if exit_command.is_empty() || exit_command.chars().any(char::is_whitespace) {
            bail!("--exit-command must be a single non-empty word");
        }
        self.exit_command = exit_command.to_string();

        let endpoint = self.endpoint.trim();
        if !(endpoint.starts_with("wss://") || endpoint.starts_with("ws://")) {
            bail!("--endpoint must be a ws:// or wss:// URL, got '{endpoint}'");
        }
        if endpoint.contains('?') {
            bail!("--endpoint must not carry a query string; the API key is appended automatically");
        }
        self.endpoint = endpoint.to_string();

        if let Some(key) = self.api_key.as_deref() {
            let key = key.trim().to_string();
            if !key.is_empty() {
                check_api_key(&key)?;
            }
            self.api_key = Some(key);
        }

        let model = self.model.trim();
        if model.is_empty() {
            bail!("--model must not be empty");
        }
        self.model = model.to_string();

        if let Some(device) = self.input_device.as_deref() {
            check_device_name("--input-device", device)?;
        }
        if let Some(device) = self.output_device.as_deref() {
            check_device_name("--output-device", device)?;
        }

        match self.video_mode {
            VideoMode::None => {}
            VideoMode::Camera => {
                check_device_name("--camera-device", &self.camera_device)?;
                self.ffmpeg_cmd = sanitize_binary(&self.ffmpeg_cmd, "--ffmpeg-cmd")?;
                if self.camera_format.trim().is_empty() {
                    bail!("--camera-format must not be empty");
                }
            }
            VideoMode::Snapshot => {
                let command = self
                    .snapshot_command
                    .as_deref()
                    .ok_or_else(|| anyhow!("--video-mode snapshot requires --snapshot-command"))?;
                split_command(command)?;
            }
        }
        Ok(())
    }
}

fn check_device_name(flag: &str, name: &str) -> Result<()> {
    if name.trim().is_empty() {
        bail!("{flag} must not be empty");
    }
    if name.contains(FORBIDDEN_DEVICE_CHARS) {
        bail!("{flag} contains control characters");
    }
    Ok(())
}

/// The key rides in the connection URL's query string unencoded.
pub(super) fn check_api_key(key: &str) -> Result<()> {
    let url_safe = |c: char| c.is_ascii_alphanumeric() || API_KEY_PUNCTUATION.contains(c);
    if !key.chars().all(url_safe) {
        bail!("API key may only contain letters, digits and '{API_KEY_PUNCTUATION}'");
    }
    Ok(())
}

/// Reject helper binary names that could smuggle in extra arguments.
pub(super) fn sanitize_binary(value: &str, flag: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        bail!("{flag} must not be empty");
    }
    if trimmed.contains(FORBIDDEN_DEVICE_CHARS) || trimmed.chars().any(char::is_whitespace) {
        bail!("{flag} must be a single program name or path, got '{trimmed}'");
    }
    Ok(trimmed.to_string())
}

/// Split a shell-style command line into program and arguments.
pub(super) fn split_command(command: &str) -> Result<(String, Vec<String>)> {
    let mut words = shell_words::split(command)
        .with_context(|| format!("cannot parse --snapshot-command '{command}'"))?
        .into_iter();
    let program = words
        .next()
        .ok_or_else(|| anyhow!("--snapshot-command must not be empty"))?;
    Ok((program, words.collect()))
}
