//! Raw payloads as read from the receiver, before any conversion.
use bitflags::bitflags;

use serde::{Deserialize, Serialize};

use super::DataKind;

/// Size of the receiver NMEA buffer, including the terminating NUL
pub const NMEA_MAX_LEN: usize = 83;

/// Receiver calendar fields. `month` is 1..=12.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Datetime {
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub seconds: u8,
    pub ms: u16,
}

bitflags! {
    /// PVT frame status bits
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
    pub struct PvtFlags: u8 {
        const FIX_VALID = 0x01;
        const LEAP_SECOND_VALID = 0x02;
        const SLEEP_BETWEEN_PVT = 0x04;
        const DEADLINE_MISSED = 0x08;
        const INSUFFICIENT_TIME_WINDOW = 0x10;
        const VELOCITY_VALID = 0x20;
    }
}

impl Default for PvtFlags {
    fn default() -> Self {
        Self::empty()
    }
}

/// Position, velocity and time frame
#[derive(Debug, Default, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PvtFrame {
    /// Latitude in degrees
    pub latitude: f64,
    /// Longitude in degrees
    pub longitude: f64,
    /// Altitude above WGS-84 ellipsoid in meters
    pub altitude: f32,
    /// Horizontal accuracy in meters
    pub accuracy: f32,
    /// Horizontal speed in m/s
    pub speed: f32,
    /// Heading of user movement in degrees
    pub heading: f32,
    pub datetime: Datetime,
    pub flags: PvtFlags,
}

/// NUL terminated NMEA buffer
#[derive(Copy, Clone, PartialEq, Eq)]
pub struct NmeaFrame([u8; NMEA_MAX_LEN]);

impl Default for NmeaFrame {
    fn default() -> Self {
        Self([0; NMEA_MAX_LEN])
    }
}

impl std::fmt::Debug for NmeaFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let end = self.0.iter().position(|b| *b == 0).unwrap_or(NMEA_MAX_LEN);
        write!(f, "NmeaFrame({:?})", String::from_utf8_lossy(&self.0[..end]))
    }
}

impl NmeaFrame {
    /// Copies `sentence` into a new frame, truncated so the
    /// terminating NUL always fits.
    pub fn new(sentence: &str) -> Self {
        let mut buf = [0; NMEA_MAX_LEN];
        let len = sentence.len().min(NMEA_MAX_LEN - 1);
        buf[..len].copy_from_slice(&sentence.as_bytes()[..len]);
        Self(buf)
    }

    pub fn as_bytes(&self) -> &[u8; NMEA_MAX_LEN] {
        &self.0
    }
}

/// A-GPS data request frame
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgpsFrame {
    /// Satellites needing new ephemerides
    pub sv_mask_ephe: u64,
    /// Satellites needing new almanacs
    pub sv_mask_alm: u64,
    pub data_flags: u32,
}

/// Payload returned by [super::Gnss::read]
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Pvt(PvtFrame),
    Nmea(NmeaFrame),
    Agps(AgpsFrame),
}

impl Payload {
    pub fn kind(&self) -> DataKind {
        match self {
            Self::Pvt(_) => DataKind::Pvt,
            Self::Nmea(_) => DataKind::Nmea,
            Self::Agps(_) => DataKind::Agps,
        }
    }
}
