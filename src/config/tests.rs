use super::validation::{sanitize_binary, split_command};
use super::{AppConfig, LogLevel, ResponseModality, VideoMode};
use crate::duplex::PurgePolicy;
use crate::video::VideoSource;
use clap::Parser;
use std::time::Duration;

fn parse(args: &[&str]) -> AppConfig {
    let mut argv = vec!["test-app"];
    argv.extend_from_slice(args);
    AppConfig::parse_from(argv)
}

fn validated(args: &[&str]) -> anyhow::Result<AppConfig> {
    let mut cfg = parse(args);
    cfg.validate()?;
    Ok(cfg)
}

#[test]
fn defaults_validate() {
    let cfg = validated(&[]).expect("defaults are valid");
    assert_eq!(cfg.model, "models/gemini-2.0-flash-exp");
    assert_eq!(cfg.send_sample_rate, 16_000);
    assert_eq!(cfg.receive_sample_rate, 24_000);
    assert_eq!(cfg.audio_frame_samples, 1024);
    assert_eq!(cfg.outbound_capacity, 5);
    assert_eq!(cfg.exit_command, "exit");
    assert_eq!(cfg.video_mode, VideoMode::None);
    assert_eq!(cfg.purge_policy, PurgePolicy::Always);
    assert_eq!(cfg.response_modality, ResponseModality::Audio);
    assert_eq!(cfg.log_level, LogLevel::Info);
    assert!(cfg.endpoint.starts_with("wss://"));
}

#[test]
fn rejects_sample_rates_out_of_bounds() {
    assert!(validated(&["--send-sample-rate", "4000"]).is_err());
    assert!(validated(&["--receive-sample-rate", "192000"]).is_err());
    assert!(validated(&["--send-sample-rate", "8000"]).is_ok());
    assert!(validated(&["--receive-sample-rate", "96000"]).is_ok());
}

#[test]
fn rejects_frame_sizes_out_of_bounds() {
    assert!(validated(&["--audio-frame-samples", "64"]).is_err());
    assert!(validated(&["--audio-frame-samples", "20000"]).is_err());
    assert!(validated(&["--audio-frame-samples", "128"]).is_ok());
}

#[test]
fn outbound_capacity_bounds() {
    assert!(validated(&["--outbound-capacity", "0"]).is_err());
    assert!(validated(&["--outbound-capacity", "257"]).is_err());
    assert!(validated(&["--outbound-capacity", "1"]).is_ok());
    assert!(validated(&["--outbound-capacity", "256"]).is_ok());
}

#[test]
fn video_interval_and_image_bounds() {
    assert!(validated(&["--video-interval-ms", "100"]).is_err());
    assert!(validated(&["--video-interval-ms", "60001"]).is_err());
    assert!(validated(&["--image-max-dim", "32"]).is_err());
    assert!(validated(&["--image-max-dim", "5000"]).is_err());
    assert!(validated(&["--jpeg-quality", "0"]).is_err());
    assert!(validated(&["--jpeg-quality", "100"]).is_ok());
}

#[test]
fn gate_threshold_accepts_negative_levels() {
    let cfg = validated(&["--audio-gate-db", "-45"]).expect("valid gate");
    assert_eq!(cfg.audio_gate_db, Some(-45.0));
    assert_eq!(cfg.session_config().gate.threshold_db, Some(-45.0));

    assert!(validated(&["--audio-gate-db", "3"]).is_err());
    assert!(validated(&["--audio-gate-db", "-121"]).is_err());
}

#[test]
fn exit_command_must_be_one_word() {
    assert!(validated(&["--exit-command", ""]).is_err());
    assert!(validated(&["--exit-command", "good bye"]).is_err());
    let cfg = validated(&["--exit-command", " /quit "]).expect("trimmed");
    assert_eq!(cfg.exit_command, "/quit");
}

#[test]
fn endpoint_must_be_websocket() {
    assert!(validated(&["--endpoint", "https://example.com/live"]).is_err());
    assert!(validated(&["--endpoint", "wss://example.com/live?key=abc"]).is_err());
    assert!(validated(&["--endpoint", "ws://127.0.0.1:9000/live"]).is_ok());
}

#[test]
fn snapshot_mode_requires_command() {
    assert!(validated(&["--video-mode", "snapshot"]).is_err());
    assert!(validated(&["--video-mode", "snapshot", "--snapshot-command", "'unterminated"]).is_err());

    let cfg = validated(&[
        "--video-mode",
        "snapshot",
        "--snapshot-command",
        "libcamera-still -n -o - --width 640",
        "--video-interval-ms",
        "2500",
    ])
    .expect("valid snapshot config");
    assert_eq!(
        cfg.video_source().unwrap(),
        Some(VideoSource::Snapshot {
            program: "libcamera-still".to_string(),
            args: ["-n", "-o", "-", "--width", "640"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            interval: Duration::from_millis(2500),
        })
    );
}

#[test]
fn camera_mode_builds_stream_source() {
    let cfg = validated(&[
        "--video-mode",
        "camera",
        "--camera-device",
        "/dev/video2",
        "--video-interval-ms",
        "2000",
    ])
    .expect("valid camera config");
    assert_eq!(
        cfg.video_source().unwrap(),
        Some(VideoSource::Stream {
            ffmpeg_cmd: "ffmpeg".to_string(),
            input_format: "v4l2".to_string(),
            device: "/dev/video2".to_string(),
            interval: Duration::from_millis(2000),
        })
    );
    assert!(cfg.session_config().video_enabled);
}

#[test]
fn camera_mode_rejects_ffmpeg_with_arguments() {
    assert!(validated(&["--video-mode", "camera", "--ffmpeg-cmd", "ffmpeg -y"]).is_err());
}

#[test]
fn session_config_reflects_switches() {
    let cfg = validated(&[
        "--no-mic",
        "--no-playback",
        "--purge-policy",
        "interrupted",
        "--outbound-capacity",
        "9",
    ])
    .unwrap();
    let session = cfg.session_config();
    assert!(!session.audio_enabled);
    assert!(!session.playback_enabled);
    assert!(!session.video_enabled);
    assert_eq!(session.purge_policy, PurgePolicy::Interrupted);
    assert_eq!(session.outbound_capacity, 9);
}

#[test]
fn device_settings_carry_rates_and_devices() {
    let cfg = validated(&[
        "--input-device",
        "USB Mic",
        "--output-device",
        "Headphones",
        "--send-sample-rate",
        "22050",
    ])
    .unwrap();
    let settings = cfg.device_settings().unwrap();
    assert_eq!(settings.microphone.device.as_deref(), Some("USB Mic"));
    assert_eq!(settings.microphone.sample_rate, 22_050);
    assert_eq!(settings.speaker.device.as_deref(), Some("Headphones"));
    assert_eq!(settings.speaker.sample_rate, 24_000);
    assert!(settings.video.is_none());
}

#[test]
fn live_config_requires_api_key() {
    let cfg = parse(&["--api-key", "  "]);
    assert!(cfg.live_config().is_err());

    let cfg = parse(&[
        "--api-key",
        "secret",
        "--response-modality",
        "text",
        "--voice",
        "Kore",
    ]);
    let live = cfg.live_config().unwrap();
    assert_eq!(live.api_key, "secret");
    assert_eq!(live.setup.response_modality, "TEXT");
    assert_eq!(live.setup.voice.as_deref(), Some("Kore"));
    assert_eq!(live.connect_timeout, Duration::from_millis(10_000));
}

#[test]
fn api_key_must_be_safe_in_a_query_string() {
    let cfg = validated(&["--api-key", " AIza-Sy_0.9~x "]).expect("url-safe key");
    assert_eq!(cfg.api_key.as_deref(), Some("AIza-Sy_0.9~x"));
    assert_eq!(cfg.live_config().unwrap().api_key, "AIza-Sy_0.9~x");

    for key in ["abc&alt=sse", "abc#frag", "a b", "key%20", "k\u{e9}y"] {
        assert!(validated(&["--api-key", key]).is_err(), "accepted {key:?}");
        assert!(parse(&["--api-key", key]).live_config().is_err(), "accepted {key:?}");
    }
}

#[test]
fn split_command_handles_quotes() {
    let (program, args) = split_command("sh -c 'printf frame'").unwrap();
    assert_eq!(program, "sh");
    assert_eq!(args, vec!["-c".to_string(), "printf frame".to_string()]);
    assert!(split_command("   ").is_err());
}

#[test]
fn sanitize_binary_trims_and_rejects_spaces() {
    assert_eq!(sanitize_binary(" ffmpeg ", "--ffmpeg-cmd").unwrap(), "ffmpeg");
    assert!(sanitize_binary("", "--ffmpeg-cmd").is_err());
    assert!(sanitize_binary("ffmpeg\n", "--ffmpeg-cmd").is_ok());
    assert!(sanitize_binary("ff mpeg", "--ffmpeg-cmd").is_err());
}

#[test]
fn log_levels_map_to_tracing() {
    assert_eq!(LogLevel::Debug.as_tracing(), tracing::Level::DEBUG);
    assert_eq!(LogLevel::Error.as_tracing(), tracing::Level::ERROR);
}
