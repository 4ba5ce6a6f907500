//! voxlink entrypoint: one live session from connect to teardown.
//!
//! The console, capture devices and speaker all run on their own threads
//! under the session supervisor; `main` only wires them together and turns
//! the session outcome into an exit status.

mod cli_utils;

use anyhow::{Context, Result};
use std::process::ExitCode;
use std::sync::Arc;
use voxlink::config::AppConfig;
use voxlink::console::{spawn_stdin_reader, Transcript};
use voxlink::device::SystemDevices;
use voxlink::remote::LiveSession;
use voxlink::telemetry::{init_tracing, tracing_log_path};
use voxlink::{SessionOutcome, Supervisor};

use crate::cli_utils::{list_devices, DeviceKind};

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("voxlink: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<ExitCode> {
    let config = AppConfig::parse_args()?;
    if config.list_input_devices || config.list_output_devices {
        if config.list_input_devices {
            list_devices(DeviceKind::Input)?;
        }
        if config.list_output_devices {
            list_devices(DeviceKind::Output)?;
        }
        return Ok(ExitCode::SUCCESS);
    }

    init_tracing(&config);
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        log_path = %tracing_log_path().display(),
        "voxlink starting"
    );

    let live = config.live_config()?;
    let devices = Arc::new(SystemDevices::new(config.device_settings()?));
    let session = LiveSession::connect(&live)
        .with_context(|| format!("cannot open a session with {}", live.setup.model))?;
    let console = spawn_stdin_reader().context("failed to start console reader")?;

    let supervisor = Supervisor::new(
        config.session_config(),
        devices,
        console,
        Transcript::stdout(),
    );
    match supervisor.run(Box::new(session)) {
        SessionOutcome::Completed | SessionOutcome::InterruptedByUser => Ok(ExitCode::SUCCESS),
        SessionOutcome::Failure(failure) => {
            eprintln!("voxlink: {failure}");
            Ok(ExitCode::FAILURE)
        }
    }
}
