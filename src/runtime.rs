use hifitime::prelude::{Duration, Epoch, TimeScale};

use log::{debug, info};

use thiserror::Error;

use crate::fix::CalendarTime;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ClockError {
    #[error("invalid date: {0}")]
    InvalidDate(String),

    #[error("host clock error: {0}")]
    HostClock(String),
}

/// Clock synchronization collaborator
pub trait Clock: Send {
    /// Pushes the time of a valid fix. Best effort.
    fn set_time(&mut self, time: &CalendarTime) -> Result<(), ClockError>;
}

#[derive(Debug)]
pub struct Runtime {
    /// Latest synchronized [Epoch]
    pub epoch: Option<Epoch>,

    /// Epoch of deployment
    deploy_time: Epoch,

    /// Latest offset between receiver and host clock
    pub offset: Duration,

    /// Uptime as [Duration], at latest synchronization
    pub uptime: Duration,

    /// Number of synchronizations
    pub syncs: usize,
}

impl Runtime {
    pub fn new(deploy_time: Epoch) -> Self {
        Self {
            epoch: None,
            deploy_time,
            offset: Duration::ZERO,
            uptime: Duration::ZERO,
            syncs: 0,
        }
    }

    /// Returns current host time in [TimeScale::UTC]
    pub fn host_time() -> Result<Epoch, ClockError> {
        Epoch::now()
            .map(|t| t.to_time_scale(TimeScale::UTC))
            .map_err(|e| ClockError::HostClock(e.to_string()))
    }

    /// Latches a new synchronization [Epoch], observed at host time `host`.
    pub fn new_epoch(&mut self, epoch: Epoch, host: Epoch) {
        self.epoch = Some(epoch);
        self.offset = epoch - host;
        self.uptime = epoch - self.deploy_time;
        self.syncs += 1;
    }
}

impl Clock for Runtime {
    fn set_time(&mut self, time: &CalendarTime) -> Result<(), ClockError> {
        let epoch = time.to_epoch()?;
        let host = Self::host_time()?;

        self.new_epoch(epoch, host);

        if self.syncs == 1 {
            info!("{} - clock synchronized (offset {})", epoch, self.offset);
        } else {
            debug!("{} - clock synchronized (offset {})", epoch, self.offset);
        }

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_new_epoch() {
        let deploy = Epoch::from_gregorian_utc_at_midnight(2021, 8, 25);
        let mut rtm = Runtime::new(deploy);
        assert!(rtm.epoch.is_none());

        let t = Epoch::from_gregorian_utc_hms(2021, 8, 25, 14, 58, 42);
        let host = t - Duration::from_seconds(2.0);

        rtm.new_epoch(t, host);
        assert_eq!(rtm.epoch, Some(t));
        assert_eq!(rtm.offset, Duration::from_seconds(2.0));
        assert_eq!(rtm.uptime, t - deploy);
        assert_eq!(rtm.syncs, 1);
    }

    #[test]
    fn test_set_time() {
        let mut rtm = Runtime::new(Epoch::from_gregorian_utc_at_midnight(2021, 8, 25));

        let time = CalendarTime {
            year: 121,
            month: 7,
            day: 25,
            hour: 14,
            minute: 58,
            second: 42,
            millisecond: 5,
        };

        rtm.set_time(&time).unwrap();
        assert_eq!(rtm.syncs, 1);

        let invalid = CalendarTime {
            month: 1,
            day: 30,
            ..time
        };

        assert!(rtm.set_time(&invalid).is_err());
        assert_eq!(rtm.syncs, 1);
    }
}
