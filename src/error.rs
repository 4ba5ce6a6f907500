//! Error taxonomy for the duplex session.
//!
//! Every variant of [`SessionError`] is fatal for the session that raised it:
//! the supervisor cancels the whole task group and reports the first one.
//! A user exit is not an error and never travels through this type.

use crate::duplex::TaskRole;

/// Fatal errors raised by a session task.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// A capture or playback device could not be opened.
    #[error("device unavailable: {device}: {reason}")]
    DeviceUnavailable { device: String, reason: String },

    /// The remote session can no longer send or receive.
    #[error("transport error: {0}")]
    Transport(String),

    /// Writing to the audio output device failed.
    #[error("playback error: {0}")]
    Playback(String),

    /// The OS refused to start a task thread.
    #[error("failed to start {role} task: {reason}")]
    TaskSpawn { role: TaskRole, reason: String },

    /// A task thread panicked before reporting.
    #[error("{0} task panicked")]
    TaskPanicked(TaskRole),
}

impl SessionError {
    pub fn transport(err: impl std::fmt::Display) -> Self {
        SessionError::Transport(err.to_string())
    }

    /// Short machine-friendly label used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            SessionError::DeviceUnavailable { .. } => "device_unavailable",
            SessionError::Transport(_) => "transport",
            SessionError::Playback(_) => "playback",
            SessionError::TaskSpawn { .. } => "task_spawn",
            SessionError::TaskPanicked(_) => "task_panicked",
        }
    }
}

/// Errors raised by local capture and playback devices.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeviceError {
    #[error("{device} unavailable: {reason}")]
    Unavailable { device: String, reason: String },

    #[error("read failed: {0}")]
    Read(String),

    #[error("no data from device for {0} ms")]
    Stalled(u64),

    #[error("write failed: {0}")]
    Write(String),
}

impl DeviceError {
    pub fn unavailable(device: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        DeviceError::Unavailable {
            device: device.into(),
            reason: reason.to_string(),
        }
    }

    /// Map an open failure onto the session taxonomy.
    pub(crate) fn into_open_failure(self, device: &str) -> SessionError {
        match self {
            DeviceError::Unavailable { device, reason } => {
                SessionError::DeviceUnavailable { device, reason }
            }
            other => SessionError::DeviceUnavailable {
                device: device.to_string(),
                reason: other.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_failure_keeps_device_name() {
        let err = DeviceError::unavailable("microphone", "no default input device")
            .into_open_failure("ignored");
        assert_eq!(
            err,
            SessionError::DeviceUnavailable {
                device: "microphone".to_string(),
                reason: "no default input device".to_string(),
            }
        );
    }

    #[test]
    fn non_open_errors_are_attributed_to_caller_device() {
        let err = DeviceError::Stalled(2000).into_open_failure("camera");
        match err {
            SessionError::DeviceUnavailable { device, reason } => {
                assert_eq!(device, "camera");
                assert!(reason.contains("2000"));
            }
            other => panic!("expected device failure, got {other:?}"),
        }
    }

    #[test]
    fn kinds_are_stable() {
        assert_eq!(SessionError::transport("closed").kind(), "transport");
        assert_eq!(SessionError::Playback("x".into()).kind(), "playback");
    }
}
