use std::process::Command;

fn combined_output(output: &std::process::Output) -> String {
    let mut combined = String::new();
    combined.push_str(&String::from_utf8_lossy(&output.stdout));
    combined.push_str(&String::from_utf8_lossy(&output.stderr));
    combined
}

fn voxlink_bin() -> &'static str {
    option_env!("CARGO_BIN_EXE_voxlink").expect("voxlink test binary not built")
}

#[test]
fn voxlink_help_lists_session_options() {
    let output = Command::new(voxlink_bin())
        .arg("--help")
        .output()
        .expect("run voxlink --help");
    assert!(output.status.success());
    let combined = combined_output(&output);
    assert!(combined.contains("--exit-command"));
    assert!(combined.contains("--outbound-capacity"));
    assert!(combined.contains("--video-mode"));
}

#[test]
fn voxlink_list_input_devices_uses_override() {
    let output = Command::new(voxlink_bin())
        .arg("--list-input-devices")
        .env("VOXLINK_TEST_INPUT_DEVICES", "Desk Mic, Headset")
        .output()
        .expect("run voxlink --list-input-devices");
    assert!(output.status.success());
    let combined = combined_output(&output);
    assert!(combined.contains("Available audio input devices:"));
    assert!(combined.contains("  - Desk Mic"));
    assert!(combined.contains("  - Headset"));
}

#[test]
fn voxlink_rejects_invalid_capacity() {
    let output = Command::new(voxlink_bin())
        .args(["--outbound-capacity", "0"])
        .output()
        .expect("run voxlink with bad capacity");
    assert!(!output.status.success());
    assert!(combined_output(&output).contains("--outbound-capacity"));
}

#[test]
fn voxlink_requires_api_key() {
    let output = Command::new(voxlink_bin())
        .env_remove("GEMINI_API_KEY")
        .env("VOXLINK_NO_LOGS", "1")
        .output()
        .expect("run voxlink without key");
    assert!(!output.status.success());
    assert!(combined_output(&output).contains("API key"));
}
