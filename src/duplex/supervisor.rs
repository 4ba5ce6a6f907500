use super::{
    forwarder, inbound, playback, producers, ReportGuard, SessionConfig, TaskEnd, TaskReport,
    TaskResult, TaskRole,
};
use crate::cancel::CancelSource;
use crate::console::Transcript;
use crate::device::DeviceProvider;
use crate::error::SessionError;
use crate::queue::{OutboundQueue, PlaybackQueue};
use crate::remote::RemoteSession;
use crossbeam_channel::{unbounded, Receiver, Sender};
use std::fmt;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

/// How a session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    /// The remote closed the session, or every task ran out of input.
    Completed,
    /// The user typed the exit command.
    InterruptedByUser,
    /// A task hit a fatal error. Only the first one is kept.
    Failure(SessionFailure),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionFailure {
    pub role: TaskRole,
    pub error: SessionError,
}

impl fmt::Display for SessionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failed: {}", self.role, self.error)
    }
}

/// Owns one session's queues, tasks and teardown.
pub struct Supervisor {
    config: SessionConfig,
    devices: Arc<dyn DeviceProvider>,
    console: Receiver<String>,
    transcript: Transcript,
}

impl Supervisor {
    pub fn new(
        config: SessionConfig,
        devices: Arc<dyn DeviceProvider>,
        console: Receiver<String>,
        transcript: Transcript,
    ) -> Self {
        Self {
            config,
            devices,
            console,
            transcript,
        }
    }

    /// Run the session to its end. Every task thread has exited and every
    /// device it opened has been released by the time this returns.
    pub fn run(self, session: Box<dyn RemoteSession>) -> SessionOutcome {
        let started = Instant::now();
        let Supervisor {
            config,
            devices,
            console,
            transcript,
        } = self;
        tracing::info!(
            remote = session.name(),
            audio = config.audio_enabled,
            video = config.video_enabled,
            playback = config.playback_enabled,
            capacity = config.outbound_capacity,
            "session starting"
        );

        let cancel = CancelSource::new();
        let outbound = OutboundQueue::new(config.outbound_capacity);
        let playback_queue = config.playback_enabled.then(PlaybackQueue::new);
        let inbound_stream = session.inbound();
        let (reports, report_rx) = unbounded();
        let mut group = TaskGroup {
            reports,
            handles: Vec::new(),
            spawn_failure: None,
        };

        {
            let producer = outbound.producer();
            let token = cancel.token();
            let transcript = transcript.clone();
            let exit_command = config.exit_command.clone();
            let log_content = config.log_content;
            group.spawn(TaskRole::Text, move || {
                producers::run_text(
                    console,
                    &exit_command,
                    &producer,
                    &token,
                    &transcript,
                    log_content,
                )
            });
        }
        if config.audio_enabled {
            let producer = outbound.producer();
            let token = cancel.token();
            let devices = devices.clone();
            let gate = config.gate;
            group.spawn(TaskRole::Audio, move || {
                producers::run_audio(devices.as_ref(), gate, &producer, &token)
            });
        }
        if config.video_enabled {
            let producer = outbound.producer();
            let token = cancel.token();
            let devices = devices.clone();
            let settings = producers::VideoSettings {
                interval: config.video_interval,
                max_dim: config.image_max_dim,
                quality: config.jpeg_quality,
            };
            group.spawn(TaskRole::Video, move || {
                producers::run_video(devices.as_ref(), settings, &producer, &token)
            });
        }
        {
            let queue = outbound.consumer();
            let token = cancel.token();
            group.spawn(TaskRole::Forwarder, move || {
                forwarder::run(session, &queue, &token)
            });
        }
        {
            let playback_queue = playback_queue.clone();
            let token = cancel.token();
            let transcript = transcript.clone();
            let policy = config.purge_policy;
            let log_content = config.log_content;
            group.spawn(TaskRole::Inbound, move || {
                inbound::run(
                    &inbound_stream,
                    playback_queue.as_ref(),
                    policy,
                    &transcript,
                    &token,
                    log_content,
                )
            });
        }
        if let Some(queue) = playback_queue {
            let token = cancel.token();
            let devices = devices.clone();
            group.spawn(TaskRole::Playback, move || {
                playback::run(devices.as_ref(), &queue.consumer(), &token)
            });
        }

        // The forwarder must see the queue disconnect once every producer is gone.
        drop(outbound);

        let mut outcome = None;
        if let Some(failure) = group.spawn_failure.take() {
            tracing::error!(role = %failure.role, error = %failure.error, "task spawn failed");
            cancel.fire();
            outcome = Some(SessionOutcome::Failure(failure));
        }

        let TaskGroup {
            reports, handles, ..
        } = group;
        drop(reports);

        // Ends once every task thread has dropped its report sender.
        for report in report_rx.iter() {
            let TaskReport { role, result } = report;
            let ends_session = match &result {
                Ok(TaskEnd::Finished) => {
                    tracing::info!(%role, "task reached end of input");
                    None
                }
                Ok(TaskEnd::Cancelled) => {
                    tracing::debug!(%role, "task cancelled");
                    None
                }
                Ok(TaskEnd::UserExit) => {
                    tracing::info!(%role, "user ended the session");
                    Some(SessionOutcome::InterruptedByUser)
                }
                Ok(TaskEnd::RemoteClosed) => {
                    tracing::info!(%role, "remote closed the session");
                    Some(SessionOutcome::Completed)
                }
                Err(error) => {
                    tracing::error!(%role, kind = error.kind(), %error, "task failed");
                    Some(SessionOutcome::Failure(SessionFailure {
                        role,
                        error: error.clone(),
                    }))
                }
            };
            if let Some(ended) = ends_session {
                if cancel.fire() {
                    tracing::debug!(%role, "cancelling task group");
                }
                outcome.get_or_insert(ended);
            }
        }

        for handle in handles {
            let _ = handle.join();
        }
        transcript.finish();

        let outcome = outcome.unwrap_or(SessionOutcome::Completed);
        tracing::info!(
            outcome = ?outcome,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "session ended"
        );
        outcome
    }
}

struct TaskGroup {
    reports: Sender<TaskReport>,
    handles: Vec<JoinHandle<()>>,
    spawn_failure: Option<SessionFailure>,
}

impl TaskGroup {
    /// Start `body` on its own named thread. The first spawn failure is kept
    /// and later spawns are skipped.
    fn spawn<F>(&mut self, role: TaskRole, body: F)
    where
        F: FnOnce() -> TaskResult + Send + 'static,
    {
        if self.spawn_failure.is_some() {
            return;
        }
        let reports = self.reports.clone();
        let spawned = thread::Builder::new()
            .name(format!("voxlink-{role}"))
            .spawn(move || {
                let guard = ReportGuard::new(role, reports);
                let result = body();
                guard.finish(result);
            });
        match spawned {
            Ok(handle) => {
                tracing::debug!(%role, "task started");
                self.handles.push(handle);
            }
            Err(err) => {
                self.spawn_failure = Some(SessionFailure {
                    role,
                    error: SessionError::TaskSpawn {
                        role,
                        reason: err.to_string(),
                    },
                });
            }
        }
    }
}
