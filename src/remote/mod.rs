//! The remote interactive session the duplex loop talks to.

mod live;
pub mod protocol;

pub use live::{LiveConfig, LiveSession, DEFAULT_ENDPOINT};
pub use protocol::SetupOptions;

use crate::chunk::{InboundEvent, OutboundChunk};
use crate::error::SessionError;
use crossbeam_channel::Receiver;

/// Inbound side of a session. Disconnection means the remote closed the session.
pub type InboundStream = Receiver<Result<InboundEvent, SessionError>>;

/// A connected remote session.
///
/// The supervisor owns the handle for the session's lifetime. It hands the
/// inbound stream to the inbound consumer and moves the handle itself into
/// the outbound forwarder, which is the only caller of `send`.
pub trait RemoteSession: Send {
    /// Transmit one chunk. Any error is fatal for the session.
    fn send(&mut self, chunk: OutboundChunk) -> Result<(), SessionError>;

    /// Events pushed by the session's receive task, in arrival order.
    fn inbound(&self) -> InboundStream;

    /// Name used in diagnostics.
    fn name(&self) -> &str {
        "remote session"
    }
}
