pub const DEFAULT_MODEL: &str = "models/gemini-2.0-flash-exp";
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 10_000;

pub const DEFAULT_SEND_SAMPLE_RATE: u32 = crate::audio::DEFAULT_SEND_RATE;
pub const DEFAULT_RECEIVE_SAMPLE_RATE: u32 = crate::audio::DEFAULT_RECEIVE_RATE;
pub const DEFAULT_AUDIO_FRAME_SAMPLES: usize = crate::audio::DEFAULT_FRAME_SAMPLES;
pub const DEFAULT_GATE_HANGOVER_FRAMES: usize = 8;

pub const DEFAULT_CAMERA_DEVICE: &str = "/dev/video0";
pub const DEFAULT_CAMERA_FORMAT: &str = "v4l2";
pub const DEFAULT_VIDEO_INTERVAL_MS: u64 = 1000;
pub const DEFAULT_IMAGE_MAX_DIM: u32 = 1024;
pub const DEFAULT_JPEG_QUALITY: u8 = 80;

pub const DEFAULT_OUTBOUND_CAPACITY: usize = 5;
pub const DEFAULT_EXIT_COMMAND: &str = "exit";

pub(super) const SAMPLE_RATE_RANGE: std::ops::RangeInclusive<u32> = 8_000..=96_000;
pub(super) const FRAME_SAMPLES_RANGE: std::ops::RangeInclusive<usize> = 128..=16_384;
pub(super) const OUTBOUND_CAPACITY_RANGE: std::ops::RangeInclusive<usize> = 1..=256;
pub(super) const VIDEO_INTERVAL_RANGE_MS: std::ops::RangeInclusive<u64> = 200..=60_000;
pub(super) const IMAGE_DIM_RANGE: std::ops::RangeInclusive<u32> = 64..=4096;
pub(super) const GATE_DB_RANGE: std::ops::RangeInclusive<f32> = -120.0..=0.0;
pub(super) const CONNECT_TIMEOUT_RANGE_MS: std::ops::RangeInclusive<u64> = 500..=120_000;
pub(super) const MAX_GATE_HANGOVER_FRAMES: usize = 1000;

/// Characters rejected in device names and helper command names.
pub(super) const FORBIDDEN_DEVICE_CHARS: &[char] = &['\n', '\r', '\0'];

/// Punctuation allowed in an API key besides ASCII letters and digits.
pub(super) const API_KEY_PUNCTUATION: &str = "-._~";
