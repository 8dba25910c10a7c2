use std::str::FromStr;

use crate::{Error, device::NmeaMask, event::DataFormat};

/// Board profile, selects the antenna / coexistence toggles
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub enum Board {
    /// nRF9160 development kit
    #[default]
    Nrf9160Dk,

    /// Thingy:91 prototyping platform
    Thingy91,

    /// No hardware toggle
    Generic,
}

impl Board {
    /// AT commands issued once at start-up
    pub fn toggles(&self) -> &'static [&'static str] {
        match self {
            Self::Nrf9160Dk => &[
                "AT%XMAGPIO=1,0,0,1,1,1574,1577",
                "AT%XCOEX0=1,1,1565,1586",
            ],
            Self::Thingy91 => &[
                "AT%XMAGPIO=1,1,1,7,1,746,803,2,698,748,2,1710,2200,3,824,894,4,880,960,5,791,849,7,1565,1586",
                "AT%XCOEX0=1,1,1565,1586",
            ],
            Self::Generic => &[],
        }
    }
}

impl FromStr for Board {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "nrf9160dk" | "nrf9160-dk" | "dk" => Ok(Self::Nrf9160Dk),
            "thingy91" | "thingy:91" => Ok(Self::Thingy91),
            "generic" | "none" => Ok(Self::Generic),
            other => Err(Error::Settings(format!("unknown board \"{}\"", other))),
        }
    }
}

impl std::fmt::Display for Board {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Nrf9160Dk => write!(f, "nRF9160 DK"),
            Self::Thingy91 => write!(f, "Thingy:91"),
            Self::Generic => write!(f, "generic"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// Fix interval in seconds, 0 = single-shot
    pub fix_interval: u16,

    /// Fix retry timeout in seconds
    pub fix_retry: u16,

    /// NMEA sentences the receiver should produce
    pub nmea_mask: NmeaMask,

    /// [DataFormat] of published position data
    pub format: DataFormat,

    /// Output queue capacity
    pub queue_capacity: usize,

    /// Inbound (lifecycle + receiver) queue capacity
    pub inbound_capacity: usize,

    pub board: Board,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            fix_interval: 0,
            fix_retry: 60,
            nmea_mask: NmeaMask::GGA,
            format: DataFormat::Nmea,
            queue_capacity: 5,
            inbound_capacity: 16,
            board: Board::default(),
        }
    }
}

impl Settings {
    pub fn validate(&self) -> Result<(), Error> {
        // one slot is kept for the overflow report
        if self.queue_capacity < 2 {
            return Err(Error::Settings(format!(
                "output queue capacity must be at least 2 (got {})",
                self.queue_capacity
            )));
        }

        if self.inbound_capacity == 0 {
            return Err(Error::Settings(
                "inbound queue capacity must not be null".to_string(),
            ));
        }

        Ok(())
    }
}
