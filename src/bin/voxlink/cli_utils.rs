use anyhow::Result;
use voxlink::audio;

/// Direction of an audio device listing.
#[derive(Debug, Clone, Copy)]
pub(crate) enum DeviceKind {
    Input,
    Output,
}

impl DeviceKind {
    fn label(self) -> &'static str {
        match self {
            DeviceKind::Input => "input",
            DeviceKind::Output => "output",
        }
    }

    fn test_env(self) -> &'static str {
        match self {
            DeviceKind::Input => "VOXLINK_TEST_INPUT_DEVICES",
            DeviceKind::Output => "VOXLINK_TEST_OUTPUT_DEVICES",
        }
    }
}

pub(crate) fn list_devices(kind: DeviceKind) -> Result<()> {
    let label = kind.label();
    // Comma-separated override so listing can be tested without audio hardware.
    let devices = if let Ok(raw) = std::env::var(kind.test_env()) {
        parse_device_list(&raw)
    } else {
        let listed = match kind {
            DeviceKind::Input => audio::list_input_devices(),
            DeviceKind::Output => audio::list_output_devices(),
        };
        listed.unwrap_or_else(|err| {
            eprintln!("Failed to list audio {label} devices: {err}");
            Vec::new()
        })
    };

    if devices.is_empty() {
        println!("No audio {label} devices detected.");
    } else {
        println!("Available audio {label} devices:");
        for name in devices {
            println!("  - {name}");
        }
    }
    Ok(())
}

fn parse_device_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect()
}
