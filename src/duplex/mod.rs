//! The duplex session loop.
//!
//! One supervisor owns a group of task threads for the lifetime of one remote
//! session:
//!
//! ```text
//! text / audio / video producers -> outbound queue -> forwarder -> remote
//! remote -> inbound consumer -> playback queue -> playback -> speaker
//! ```
//!
//! Tasks share nothing but the two queues and the group's cancel token. Each
//! task reports exactly once how it ended; the first report that ends the
//! session fires the token and every other task unwinds at its next blocking
//! point.

mod forwarder;
mod inbound;
mod playback;
mod producers;
mod supervisor;

pub use supervisor::{SessionFailure, SessionOutcome, Supervisor};

use crate::audio::GateConfig;
use crate::error::SessionError;
use clap::ValueEnum;
use crossbeam_channel::Sender;
use std::fmt;
use std::time::Duration;

/// The task roles in a session group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskRole {
    Text,
    Audio,
    Video,
    Forwarder,
    Inbound,
    Playback,
}

impl TaskRole {
    pub fn label(self) -> &'static str {
        match self {
            TaskRole::Text => "text",
            TaskRole::Audio => "audio",
            TaskRole::Video => "video",
            TaskRole::Forwarder => "forwarder",
            TaskRole::Inbound => "inbound",
            TaskRole::Playback => "playback",
        }
    }
}

impl fmt::Display for TaskRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// When the inbound consumer discards queued playback audio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum PurgePolicy {
    /// On every turn boundary.
    #[default]
    Always,
    /// Only when the remote reports the turn was interrupted.
    Interrupted,
}

impl PurgePolicy {
    pub fn purges(self, interrupted: bool) -> bool {
        match self {
            PurgePolicy::Always => true,
            PurgePolicy::Interrupted => interrupted,
        }
    }
}

/// Per-session settings for the task group.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub outbound_capacity: usize,
    /// Console line that ends the session, matched case-insensitively.
    pub exit_command: String,
    pub audio_enabled: bool,
    pub video_enabled: bool,
    pub playback_enabled: bool,
    /// Pause between captured camera frames.
    pub video_interval: Duration,
    pub image_max_dim: u32,
    pub jpeg_quality: u8,
    pub gate: GateConfig,
    pub purge_policy: PurgePolicy,
    /// Allow user and model text in log records.
    pub log_content: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            outbound_capacity: 5,
            exit_command: "exit".to_string(),
            audio_enabled: true,
            video_enabled: false,
            playback_enabled: true,
            video_interval: Duration::from_millis(1000),
            image_max_dim: 1024,
            jpeg_quality: 80,
            gate: GateConfig::default(),
            purge_policy: PurgePolicy::Always,
            log_content: false,
        }
    }
}

/// How a task ended without a fatal error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TaskEnd {
    /// The task's input reached end of stream. The session carries on.
    Finished,
    /// The group was cancelled while the task was running.
    Cancelled,
    /// The user typed the exit command.
    UserExit,
    /// The remote side closed the session.
    RemoteClosed,
}

pub(crate) type TaskResult = Result<TaskEnd, SessionError>;

#[derive(Debug)]
pub(crate) struct TaskReport {
    pub(crate) role: TaskRole,
    pub(crate) result: TaskResult,
}

/// Sends a task's report when it finishes, or `TaskPanicked` if the task
/// thread unwinds before it could.
pub(crate) struct ReportGuard {
    role: TaskRole,
    reports: Sender<TaskReport>,
    reported: bool,
}

impl ReportGuard {
    pub(crate) fn new(role: TaskRole, reports: Sender<TaskReport>) -> Self {
        Self {
            role,
            reports,
            reported: false,
        }
    }

    pub(crate) fn finish(mut self, result: TaskResult) {
        self.reported = true;
        let _ = self.reports.send(TaskReport {
            role: self.role,
            result,
        });
    }
}

impl Drop for ReportGuard {
    fn drop(&mut self) {
        if !self.reported {
            tracing::error!(role = %self.role, "task thread panicked");
            let _ = self.reports.send(TaskReport {
                role: self.role,
                result: Err(SessionError::TaskPanicked(self.role)),
            });
        }
    }
}
