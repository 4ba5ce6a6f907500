pub mod audio;
pub mod cancel;
pub mod chunk;
pub mod config;
pub mod console;
pub mod device;
pub mod duplex;
pub mod error;
mod lock;
pub mod queue;
pub mod remote;
pub mod telemetry;
pub mod video;

pub(crate) use lock::lock_or_recover;
pub use chunk::{InboundEvent, OutboundChunk};
pub use duplex::{SessionConfig, SessionFailure, SessionOutcome, Supervisor, TaskRole};
pub use error::{DeviceError, SessionError};
