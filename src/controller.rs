//! Receiver configuration and session sequencing.
use log::{debug, error, info};

use crate::{
    device::{DataKind, DriverError, Gnss, Handler, NmeaMask, Payload, Registration},
    event::OutputEvent,
    publisher::Publisher,
    settings::Settings,
};

/// [Controller] owns the [Gnss] peripheral and sequences its sessions.
pub struct Controller<D: Gnss> {
    driver: D,

    /// Fix interval (s), 0 = single-shot
    fix_interval: u16,

    /// Fix retry timeout (s)
    fix_retry: u16,

    nmea_mask: NmeaMask,

    publisher: Publisher,

    /// True between a successful [Controller::start_session]
    /// and the conclusion of the session
    active: bool,
}

impl<D: Gnss> Controller<D> {
    pub fn new(driver: D, settings: &Settings, publisher: Publisher) -> Self {
        Self {
            driver,
            fix_interval: settings.fix_interval,
            fix_retry: settings.fix_retry,
            nmea_mask: settings.nmea_mask,
            publisher,
            active: false,
        }
    }

    /// Stops the receiver, "not running" being a nominal outcome.
    fn idle(&mut self) -> Result<(), DriverError> {
        match self.driver.stop() {
            Ok(_) | Err(DriverError::NotRunning) => Ok(()),
            Err(e) => Err(e),
        }
    }

    fn try_start(&mut self) -> Result<(), DriverError> {
        self.idle()?;

        self.driver
            .configure(self.fix_interval, self.fix_retry, self.nmea_mask)?;

        self.driver.start()
    }

    /// (Re)starts an acquisition session.
    /// Publishes [OutputEvent::Active] on success, [OutputEvent::Error] otherwise.
    pub fn start_session(&mut self) -> Result<(), DriverError> {
        match self.try_start() {
            Ok(_) => {
                info!(
                    "session started: interval={}s retry={}s nmea=[{}]",
                    self.fix_interval, self.fix_retry, self.nmea_mask
                );

                self.active = true;
                self.publisher.publish(OutputEvent::Active);
                Ok(())
            },
            Err(e) => {
                error!("failed to start session: {}", e);

                self.active = false;
                self.publisher.publish(OutputEvent::Error(e.code()));
                Err(e)
            },
        }
    }

    /// Stops the receiver. Stopping an idle receiver is not an error.
    pub fn stop_session(&mut self) -> Result<(), DriverError> {
        let was_active = std::mem::replace(&mut self.active, false);
        self.idle()?;

        if was_active {
            debug!("session stopped");
        }

        Ok(())
    }

    /// Marks the session as concluded, returns whether one was active.
    pub fn conclude_session(&mut self) -> bool {
        std::mem::replace(&mut self.active, false)
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn register_handler(&mut self, handler: Handler) -> Result<Registration, DriverError> {
        self.driver.register_handler(handler)
    }

    pub fn release_handler(&mut self, registration: Registration) -> Result<(), DriverError> {
        self.driver.release_handler(registration)
    }

    pub fn read(&mut self, kind: DataKind) -> Result<Payload, DriverError> {
        self.driver.read(kind)
    }
}
