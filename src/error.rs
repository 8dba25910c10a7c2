use thiserror::Error;

use crate::{
    device::{AtError, DriverError},
    runtime::ClockError,
};

/// errno value reported when a bounded queue has no room left
pub const ENOMSG: i32 = 42;

/// I/O errno value, used for host side failures
pub const EIO: i32 = 5;

/// Code published in [crate::OutputEvent::Error] when the output
/// (or inbound) queue overflowed.
pub const NO_MESSAGE_SPACE: i32 = -ENOMSG;

#[derive(Debug, Error)]
pub enum Error {
    #[error("hardware toggle \"{command}\" failed: {source}")]
    Toggle { command: String, source: AtError },

    #[error("receiver handler registration failed: {0}")]
    Registration(DriverError),

    #[error("clock error: {0}")]
    Clock(#[from] ClockError),

    #[error("invalid settings: {0}")]
    Settings(String),

    #[error("inbound queue closed")]
    Closed,

    #[error("inbound queue full")]
    NoMessageSpace,

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("recording error: {0}")]
    Json(#[from] serde_json::Error),
}
