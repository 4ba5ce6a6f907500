//! One-shot cancellation shared by every task in a session group.
//!
//! The source holds the only sender of a channel that never carries a value.
//! Firing drops that sender, which disconnects every token at once, so a
//! token can sit in a `select!` next to any queue operation and wake it.

use crossbeam_channel::{bounded, Receiver, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Owner side of a cancellation group.
pub struct CancelSource {
    sender: Mutex<Option<Sender<()>>>,
    fired: Arc<AtomicBool>,
    token: CancelToken,
}

/// Cloneable view handed to each task.
#[derive(Clone, Debug)]
pub struct CancelToken {
    receiver: Receiver<()>,
    fired: Arc<AtomicBool>,
}

impl CancelSource {
    pub fn new() -> Self {
        let (sender, receiver) = bounded(0);
        let fired = Arc::new(AtomicBool::new(false));
        Self {
            sender: Mutex::new(Some(sender)),
            fired: fired.clone(),
            token: CancelToken { receiver, fired },
        }
    }

    pub fn token(&self) -> CancelToken {
        self.token.clone()
    }

    /// Cancel the group. Returns `true` only for the call that actually fired.
    pub fn fire(&self) -> bool {
        let sender = crate::lock_or_recover(&self.sender, "cancel source").take();
        match sender {
            Some(sender) => {
                self.fired.store(true, Ordering::Release);
                drop(sender);
                true
            }
            None => false,
        }
    }
}

impl Default for CancelSource {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelToken {
    pub fn is_cancelled(&self) -> bool {
        self.fired.load(Ordering::Acquire)
    }

    /// Selectable receiver; becomes ready (disconnected) once the group is cancelled.
    pub fn receiver(&self) -> &Receiver<()> {
        &self.receiver
    }

    /// Sleep for `duration` unless cancelled first. Returns `true` when cancelled.
    pub fn sleep(&self, duration: Duration) -> bool {
        if self.is_cancelled() {
            return true;
        }
        // Nothing is ever sent, so any completed recv means disconnection.
        self.receiver.recv_timeout(duration).is_err() && self.is_cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::select;
    use std::thread;
    use std::time::Instant;

    #[test]
    fn fire_is_single_shot() {
        let source = CancelSource::new();
        let token = source.token();
        assert!(!token.is_cancelled());
        assert!(source.fire());
        assert!(!source.fire());
        assert!(token.is_cancelled());
        assert!(source.token().is_cancelled());
    }

    #[test]
    fn sleep_returns_early_when_cancelled() {
        let source = CancelSource::new();
        let token = source.token();
        let handle = thread::spawn(move || {
            let start = Instant::now();
            let cancelled = token.sleep(Duration::from_secs(10));
            (cancelled, start.elapsed())
        });
        thread::sleep(Duration::from_millis(20));
        source.fire();
        let (cancelled, elapsed) = handle.join().expect("sleeper thread");
        assert!(cancelled);
        assert!(elapsed < Duration::from_secs(5));
    }

    #[test]
    fn sleep_runs_to_completion_without_cancel() {
        let source = CancelSource::new();
        assert!(!source.token().sleep(Duration::from_millis(5)));
    }

    #[test]
    fn token_wakes_blocked_select() {
        let source = CancelSource::new();
        let token = source.token();
        let (_tx, rx) = crossbeam_channel::unbounded::<u32>();
        let handle = thread::spawn(move || {
            select! {
                recv(rx) -> _ => "value",
                recv(token.receiver()) -> _ => "cancelled",
            }
        });
        source.fire();
        assert_eq!(handle.join().expect("select thread"), "cancelled");
    }
}
