//! Command-line parsing and validation helpers.

mod defaults;
#[cfg(test)]
mod tests;
mod validation;

use clap::{Parser, ValueEnum};
use std::time::Duration;

pub use defaults::{
    DEFAULT_AUDIO_FRAME_SAMPLES, DEFAULT_CAMERA_DEVICE, DEFAULT_CAMERA_FORMAT,
    DEFAULT_CONNECT_TIMEOUT_MS, DEFAULT_EXIT_COMMAND, DEFAULT_GATE_HANGOVER_FRAMES,
    DEFAULT_IMAGE_MAX_DIM, DEFAULT_JPEG_QUALITY, DEFAULT_MODEL, DEFAULT_OUTBOUND_CAPACITY,
    DEFAULT_RECEIVE_SAMPLE_RATE, DEFAULT_SEND_SAMPLE_RATE, DEFAULT_VIDEO_INTERVAL_MS,
};

use crate::audio::{GateConfig, MicrophoneConfig, SpeakerConfig};
use crate::device::DeviceSettings;
use crate::duplex::{PurgePolicy, SessionConfig};
use crate::remote::{LiveConfig, SetupOptions, DEFAULT_ENDPOINT};
use crate::video::VideoSource;

/// CLI options for voxlink. Validated values keep downstream subprocesses safe.
#[derive(Debug, Parser, Clone)]
#[command(
    about = "Talk to a live multimodal model with your microphone, camera and keyboard",
    author,
    version
)]
pub struct AppConfig {
    /// Model identifier sent in the session setup
    #[arg(long, env = "VOXLINK_MODEL", default_value = DEFAULT_MODEL)]
    pub model: String,

    /// API key for the live endpoint
    #[arg(long = "api-key", env = "GEMINI_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Websocket URL of the bidirectional live endpoint
    #[arg(long, env = "VOXLINK_ENDPOINT", default_value = DEFAULT_ENDPOINT)]
    pub endpoint: String,

    /// What the model answers with
    #[arg(long = "response-modality", value_enum, default_value_t = ResponseModality::Audio)]
    pub response_modality: ResponseModality,

    /// Prebuilt voice used for spoken answers
    #[arg(long)]
    pub voice: Option<String>,

    /// System instruction sent with the session setup
    #[arg(long = "system-prompt")]
    pub system_prompt: Option<String>,

    /// Time allowed for connecting and completing the session setup (milliseconds)
    #[arg(long = "connect-timeout-ms", default_value_t = DEFAULT_CONNECT_TIMEOUT_MS)]
    pub connect_timeout_ms: u64,

    /// Preferred audio input device name
    #[arg(long)]
    pub input_device: Option<String>,

    /// Preferred audio output device name
    #[arg(long)]
    pub output_device: Option<String>,

    /// Print detected audio input devices and exit
    #[arg(long = "list-input-devices", default_value_t = false)]
    pub list_input_devices: bool,

    /// Print detected audio output devices and exit
    #[arg(long = "list-output-devices", default_value_t = false)]
    pub list_output_devices: bool,

    /// Sample rate of microphone audio sent upstream (Hz)
    #[arg(long = "send-sample-rate", default_value_t = DEFAULT_SEND_SAMPLE_RATE)]
    pub send_sample_rate: u32,

    /// Sample rate of model audio received for playback (Hz)
    #[arg(long = "receive-sample-rate", default_value_t = DEFAULT_RECEIVE_SAMPLE_RATE)]
    pub receive_sample_rate: u32,

    /// Samples per outbound microphone frame
    #[arg(long = "audio-frame-samples", default_value_t = DEFAULT_AUDIO_FRAME_SAMPLES)]
    pub audio_frame_samples: usize,

    /// Hold back microphone frames quieter than this level (dBFS); off when unset
    #[arg(long = "audio-gate-db", allow_negative_numbers = true)]
    pub audio_gate_db: Option<f32>,

    /// Frames kept open after speech drops below the gate level
    #[arg(
        long = "audio-gate-hangover-frames",
        default_value_t = DEFAULT_GATE_HANGOVER_FRAMES
    )]
    pub audio_gate_hangover_frames: usize,

    /// Do not capture microphone audio
    #[arg(long = "no-mic", default_value_t = false)]
    pub no_mic: bool,

    /// Do not play model audio
    #[arg(long = "no-playback", default_value_t = false)]
    pub no_playback: bool,

    /// Camera capture backend
    #[arg(long = "video-mode", value_enum, default_value_t = VideoMode::None)]
    pub video_mode: VideoMode,

    /// Camera device handed to ffmpeg
    #[arg(long = "camera-device", default_value = DEFAULT_CAMERA_DEVICE)]
    pub camera_device: String,

    /// ffmpeg input format for the camera device
    #[arg(long = "camera-format", default_value = DEFAULT_CAMERA_FORMAT)]
    pub camera_format: String,

    /// FFmpeg binary location
    #[arg(long = "ffmpeg-cmd", default_value = "ffmpeg")]
    pub ffmpeg_cmd: String,

    /// Command that prints one image to stdout (snapshot mode)
    #[arg(long = "snapshot-command")]
    pub snapshot_command: Option<String>,

    /// Pause between camera frames (milliseconds)
    #[arg(long = "video-interval-ms", default_value_t = DEFAULT_VIDEO_INTERVAL_MS)]
    pub video_interval_ms: u64,

    /// Longest side of images sent upstream (pixels)
    #[arg(long = "image-max-dim", default_value_t = DEFAULT_IMAGE_MAX_DIM)]
    pub image_max_dim: u32,

    /// JPEG quality for images sent upstream (1-100)
    #[arg(long = "jpeg-quality", default_value_t = DEFAULT_JPEG_QUALITY)]
    pub jpeg_quality: u8,

    /// Outbound chunks buffered before capture blocks
    #[arg(long = "outbound-capacity", default_value_t = DEFAULT_OUTBOUND_CAPACITY)]
    pub outbound_capacity: usize,

    /// Console line that ends the session (case-insensitive)
    #[arg(long = "exit-command", default_value = DEFAULT_EXIT_COMMAND)]
    pub exit_command: String,

    /// When queued model audio is discarded
    #[arg(long = "purge-policy", value_enum, default_value_t = PurgePolicy::Always)]
    pub purge_policy: PurgePolicy,

    /// Enable file logging (debug)
    #[arg(long = "logs", env = "VOXLINK_LOGS", default_value_t = false)]
    pub logs: bool,

    /// Disable all file logging (overrides --logs and log env vars)
    #[arg(long = "no-logs", env = "VOXLINK_NO_LOGS", default_value_t = false)]
    pub no_logs: bool,

    /// Allow logging user and model text (debug log only)
    #[arg(
        long = "log-content",
        env = "VOXLINK_LOG_CONTENT",
        default_value_t = false
    )]
    pub log_content: bool,

    /// Most verbose level written to the log file
    #[arg(long = "log-level", value_enum, default_value_t = LogLevel::Info)]
    pub log_level: LogLevel,
}

/// Modalities the model may answer with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ResponseModality {
    Audio,
    Text,
}

impl ResponseModality {
    /// Name used on the wire.
    pub fn wire_name(self) -> &'static str {
        match self {
            ResponseModality::Audio => "AUDIO",
            ResponseModality::Text => "TEXT",
        }
    }
}

/// Camera capture backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum VideoMode {
    None,
    Camera,
    Snapshot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_tracing(self) -> tracing::Level {
        match self {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}

impl AppConfig {
    /// Task-group settings for the session supervisor.
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            outbound_capacity: self.outbound_capacity,
            exit_command: self.exit_command.clone(),
            audio_enabled: !self.no_mic,
            video_enabled: self.video_mode != VideoMode::None,
            playback_enabled: !self.no_playback,
            video_interval: Duration::from_millis(self.video_interval_ms),
            image_max_dim: self.image_max_dim,
            jpeg_quality: self.jpeg_quality,
            gate: GateConfig {
                threshold_db: self.audio_gate_db,
                hangover_frames: self.audio_gate_hangover_frames,
            },
            purge_policy: self.purge_policy,
            log_content: self.log_content,
        }
    }

    /// Hardware settings for the system device provider.
    pub fn device_settings(&self) -> anyhow::Result<DeviceSettings> {
        Ok(DeviceSettings {
            microphone: MicrophoneConfig {
                device: self.input_device.clone(),
                sample_rate: self.send_sample_rate,
                frame_samples: self.audio_frame_samples,
                ..MicrophoneConfig::default()
            },
            speaker: SpeakerConfig {
                device: self.output_device.clone(),
                sample_rate: self.receive_sample_rate,
                ..SpeakerConfig::default()
            },
            video: self.video_source()?,
        })
    }

    pub fn video_source(&self) -> anyhow::Result<Option<VideoSource>> {
        let source = match self.video_mode {
            VideoMode::None => None,
            VideoMode::Camera => Some(VideoSource::Stream {
                ffmpeg_cmd: self.ffmpeg_cmd.clone(),
                input_format: self.camera_format.clone(),
                device: self.camera_device.clone(),
                interval: Duration::from_millis(self.video_interval_ms),
            }),
            VideoMode::Snapshot => {
                let (program, args) = validation::split_command(
                    self.snapshot_command.as_deref().unwrap_or_default(),
                )?;
                Some(VideoSource::Snapshot {
                    program,
                    args,
                    interval: Duration::from_millis(self.video_interval_ms),
                })
            }
        };
        Ok(source)
    }

    /// Connection settings. Fails when no usable API key was given.
    pub fn live_config(&self) -> anyhow::Result<LiveConfig> {
        let api_key = self
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .ok_or_else(|| anyhow::anyhow!("no API key: pass --api-key or set GEMINI_API_KEY"))?
            .to_string();
        validation::check_api_key(&api_key)?;
        Ok(LiveConfig {
            endpoint: self.endpoint.clone(),
            api_key,
            setup: SetupOptions {
                model: self.model.clone(),
                response_modality: self.response_modality.wire_name().to_string(),
                voice: self.voice.clone(),
                system_prompt: self.system_prompt.clone(),
            },
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
        })
    }
}
