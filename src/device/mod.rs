//! Receiver peripheral and hardware toggle abstractions.
//!
//! [Gnss] is the driver contract the [crate::controller::Controller]
//! sequences. Notifications travel through a single registered [Handler],
//! payloads are then pulled with [Gnss::read].
use std::{str::FromStr, sync::Arc};

use bitflags::bitflags;
use itertools::Itertools;
use thiserror::Error;

use crate::{event::ReceiverEvent, nmea::NmeaError};

pub mod frame;
pub mod interface;
pub mod replay;

#[cfg(test)]
pub mod mock;

pub use frame::{AgpsFrame, Datetime, NMEA_MAX_LEN, NmeaFrame, Payload, PvtFlags, PvtFrame};

/// errno reported when stopping an idle receiver
const EPERM: i32 = 1;

/// errno reported when no payload is available
const ENODATA: i32 = 61;

/// Receiver notification callback. Invoked from the peripheral
/// execution context: it must not block.
pub type Handler = Arc<dyn Fn(ReceiverEvent) + Send + Sync>;

/// Token returned by [Gnss::register_handler]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct Registration(pub u32);

/// Payload kinds [Gnss::read] can deliver
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum DataKind {
    Pvt,
    Nmea,
    Agps,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Error)]
pub enum DriverError {
    /// Returned by [Gnss::stop] on an idle receiver
    #[error("receiver is not running")]
    NotRunning,

    #[error("no payload available")]
    NoData,

    #[error("driver error code {0}")]
    Code(i32),
}

impl DriverError {
    pub fn code(&self) -> i32 {
        match self {
            Self::NotRunning => -EPERM,
            Self::NoData => -ENODATA,
            Self::Code(code) => *code,
        }
    }
}

#[derive(Debug, Error)]
pub enum AtError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("command rejected: {0}")]
    Rejected(String),

    #[error("no response")]
    Timeout,
}

bitflags! {
    /// NMEA sentence selection bits
    #[derive(Debug, Copy, Clone, PartialEq, Eq)]
    pub struct NmeaMask: u16 {
        const GGA = 0x01;
        const GLL = 0x02;
        const GSA = 0x04;
        const GSV = 0x08;
        const RMC = 0x10;
    }
}

impl Default for NmeaMask {
    fn default() -> Self {
        Self::empty()
    }
}

impl std::fmt::Display for NmeaMask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.iter_names().map(|(name, _)| name).join(","))
    }
}

impl FromStr for NmeaMask {
    type Err = NmeaError;

    /// Parses a comma separated list of sentence types, like "gga,rmc"
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut mask = Self::empty();

        for item in s.split(',').map(str::trim).filter(|item| !item.is_empty()) {
            let bit = Self::from_name(&item.to_ascii_uppercase())
                .ok_or_else(|| NmeaError::UnknownSentence(item.to_string()))?;

            mask |= bit;
        }

        Ok(mask)
    }
}

/// GNSS receiver peripheral
pub trait Gnss: Send {
    /// Installs the single notification [Handler].
    fn register_handler(&mut self, handler: Handler) -> Result<Registration, DriverError>;

    /// Releases a previous [Registration].
    fn release_handler(&mut self, registration: Registration) -> Result<(), DriverError>;

    /// Stops acquisition. Returns [DriverError::NotRunning] when idle.
    fn stop(&mut self) -> Result<(), DriverError>;

    /// Applies fix interval (s, 0 = single-shot), fix retry timeout (s)
    /// and NMEA sentence selection.
    fn configure(
        &mut self,
        fix_interval: u16,
        fix_retry: u16,
        nmea_mask: NmeaMask,
    ) -> Result<(), DriverError>;

    fn start(&mut self) -> Result<(), DriverError>;

    /// Reads the payload attached to the latest notification of this kind.
    fn read(&mut self, kind: DataKind) -> Result<Payload, DriverError>;
}

/// Fire-and-forget modem configuration commands
pub trait AtCommands: Send {
    fn write(&mut self, command: &str) -> Result<(), AtError>;
}
