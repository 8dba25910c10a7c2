//! Fix data conversion: receiver calendar fields to broken-down time,
//! UTC [Epoch] and [FixRecord].
use hifitime::prelude::{Epoch, TimeScale};

use serde::Serialize;

use crate::{
    device::{Datetime, PvtFlags, PvtFrame},
    runtime::ClockError,
    utils::serialize_epoch,
};

/// Offset of [CalendarTime::year]
pub const TM_YEAR_OFFSET: i32 = 1900;

/// Broken-down calendar time, as consumed by the clock collaborator.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct CalendarTime {
    /// Years since 1900
    pub year: i32,
    /// Months since January (0..=11)
    pub month: u8,
    /// Day of month (1..=31)
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
    pub millisecond: u16,
}

impl CalendarTime {
    /// Converts to a UTC [Epoch]
    pub fn to_epoch(&self) -> Result<Epoch, ClockError> {
        let nanos = u32::from(self.millisecond)
            .checked_mul(1_000_000)
            .filter(|nanos| *nanos < 1_000_000_000)
            .ok_or_else(|| {
                ClockError::InvalidDate(format!("{} ms out of range", self.millisecond))
            })?;

        Epoch::maybe_from_gregorian(
            self.year + TM_YEAR_OFFSET,
            self.month + 1,
            self.day,
            self.hour,
            self.minute,
            self.second,
            nanos,
            TimeScale::UTC,
        )
        .map_err(|e| ClockError::InvalidDate(e.to_string()))
    }
}

/// Maps receiver calendar fields (1-based month) to [CalendarTime].
/// Returns None when a field is out of range. A 60th second is accepted.
pub fn to_calendar_time(datetime: &Datetime) -> Option<CalendarTime> {
    if !(1..=12).contains(&datetime.month)
        || !(1..=31).contains(&datetime.day)
        || datetime.hour > 23
        || datetime.minute > 59
        || datetime.seconds > 60
        || datetime.ms > 999
    {
        return None;
    }

    Some(CalendarTime {
        year: datetime.year as i32 - TM_YEAR_OFFSET,
        month: datetime.month - 1,
        day: datetime.day,
        hour: datetime.hour,
        minute: datetime.minute,
        second: datetime.seconds,
        millisecond: datetime.ms,
    })
}

/// Position solution, as published in PVT format
#[derive(Debug, Default, Copy, Clone, PartialEq, Serialize)]
pub struct FixRecord {
    /// Latitude in degrees
    pub latitude: f64,
    /// Longitude in degrees
    pub longitude: f64,
    /// Altitude in meters
    pub altitude: f64,
    /// Horizontal accuracy in meters
    pub accuracy: f64,
    /// Speed in m/s
    pub speed: f64,
    /// Heading in degrees
    pub heading: f64,
    /// Fix time, when the calendar fields form a valid date
    #[serde(serialize_with = "serialize_epoch")]
    pub utc_timestamp: Option<Epoch>,
    pub valid: bool,
}

impl FixRecord {
    pub fn from_frame(frame: &PvtFrame) -> Self {
        let utc_timestamp = to_calendar_time(&frame.datetime)
            .and_then(|calendar| calendar.to_epoch().ok());

        Self {
            latitude: frame.latitude,
            longitude: frame.longitude,
            altitude: frame.altitude as f64,
            accuracy: frame.accuracy as f64,
            speed: frame.speed as f64,
            heading: frame.heading as f64,
            utc_timestamp,
            valid: frame.flags.contains(PvtFlags::FIX_VALID),
        }
    }
}

impl From<&PvtFrame> for FixRecord {
    fn from(frame: &PvtFrame) -> Self {
        Self::from_frame(frame)
    }
}

impl std::fmt::Display for FixRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "lat={:.6} lon={:.6} alt={:.2}m acc={:.2}m",
            self.latitude, self.longitude, self.altitude, self.accuracy
        )?;

        if let Some(t) = self.utc_timestamp {
            write!(f, " t={}", t)?;
        }

        Ok(())
    }
}
