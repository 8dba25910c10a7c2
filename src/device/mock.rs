//! Recording test doubles
use std::sync::{Arc, Mutex};

use super::{
    AgpsFrame, AtCommands, AtError, DataKind, Datetime, DriverError, Gnss, Handler, NmeaFrame,
    NmeaMask, Payload, PvtFlags, PvtFrame, Registration,
};

use crate::{
    event::ReceiverEvent,
    fix::CalendarTime,
    runtime::{Clock, ClockError},
};

pub const EXP_NMEA: &str =
    "$GPGGA,134658.00,5106.9792,N,11402.3003,W,2,09,1.0,1048.47,M,-16.27,M,08,AAAA*60";

/// Valid fix at lat 60.0, lon 25.0
pub fn fixture_pvt() -> PvtFrame {
    PvtFrame {
        latitude: 60.0,
        longitude: 25.0,
        altitude: 100.0,
        accuracy: 5.0,
        speed: 0.1,
        heading: 90.0,
        datetime: Datetime {
            year: 2021,
            month: 8,
            day: 25,
            hour: 14,
            minute: 58,
            seconds: 42,
            ms: 5,
        },
        flags: PvtFlags::FIX_VALID,
    }
}

pub fn fixture_agps() -> AgpsFrame {
    AgpsFrame {
        sv_mask_ephe: 0xabbaabba,
        sv_mask_alm: 0xdeaddead,
        data_flags: 0x01 | 0x04 | 0x10,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Register,
    Release(Registration),
    Stop,
    Configure {
        fix_interval: u16,
        fix_retry: u16,
        nmea_mask: NmeaMask,
    },
    Start,
    Read(DataKind),
}

#[derive(Default)]
struct Shared {
    calls: Vec<Call>,
    handler: Option<Handler>,
    running: bool,
    registrations: u32,
    register_error: Option<DriverError>,
    configure_error: Option<DriverError>,
    start_error: Option<DriverError>,
    read_error: Option<DriverError>,
    pvt: Option<PvtFrame>,
    nmea: Option<NmeaFrame>,
    agps: Option<AgpsFrame>,
}

/// [Gnss] double. Clones share the same state.
#[derive(Clone, Default)]
pub struct MockGnss {
    shared: Arc<Mutex<Shared>>,
}

impl MockGnss {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads the reference payloads
    pub fn with_fixtures() -> Self {
        let mock = Self::new();
        mock.set_pvt(fixture_pvt());
        mock.set_nmea(EXP_NMEA);
        mock.set_agps(fixture_agps());
        mock
    }

    pub fn calls(&self) -> Vec<Call> {
        self.shared.lock().unwrap().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.shared.lock().unwrap().calls.clear();
    }

    pub fn is_registered(&self) -> bool {
        self.shared.lock().unwrap().handler.is_some()
    }

    pub fn is_running(&self) -> bool {
        self.shared.lock().unwrap().running
    }

    pub fn set_pvt(&self, pvt: PvtFrame) {
        self.shared.lock().unwrap().pvt = Some(pvt);
    }

    pub fn set_nmea(&self, sentence: &str) {
        self.shared.lock().unwrap().nmea = Some(NmeaFrame::new(sentence));
    }

    pub fn set_agps(&self, agps: AgpsFrame) {
        self.shared.lock().unwrap().agps = Some(agps);
    }

    pub fn fail_register(&self, error: Option<DriverError>) {
        self.shared.lock().unwrap().register_error = error;
    }

    pub fn fail_configure(&self, error: Option<DriverError>) {
        self.shared.lock().unwrap().configure_error = error;
    }

    pub fn fail_start(&self, error: Option<DriverError>) {
        self.shared.lock().unwrap().start_error = error;
    }

    pub fn fail_read(&self, error: Option<DriverError>) {
        self.shared.lock().unwrap().read_error = error;
    }

    /// Invokes the registered handler, as the peripheral would.
    /// Returns false when no handler is registered.
    pub fn notify(&self, event: ReceiverEvent) -> bool {
        let handler = self.shared.lock().unwrap().handler.clone();

        match handler {
            Some(handler) => {
                handler(event);
                true
            },
            None => false,
        }
    }
}

impl Gnss for MockGnss {
    fn register_handler(&mut self, handler: Handler) -> Result<Registration, DriverError> {
        let mut shared = self.shared.lock().unwrap();
        shared.calls.push(Call::Register);

        if let Some(error) = shared.register_error {
            return Err(error);
        }

        shared.registrations += 1;
        shared.handler = Some(handler);
        Ok(Registration(shared.registrations))
    }

    fn release_handler(&mut self, registration: Registration) -> Result<(), DriverError> {
        let mut shared = self.shared.lock().unwrap();
        shared.calls.push(Call::Release(registration));
        shared.handler = None;
        Ok(())
    }

    fn stop(&mut self) -> Result<(), DriverError> {
        let mut shared = self.shared.lock().unwrap();
        shared.calls.push(Call::Stop);

        if shared.running {
            shared.running = false;
            Ok(())
        } else {
            Err(DriverError::NotRunning)
        }
    }

    fn configure(
        &mut self,
        fix_interval: u16,
        fix_retry: u16,
        nmea_mask: NmeaMask,
    ) -> Result<(), DriverError> {
        let mut shared = self.shared.lock().unwrap();

        shared.calls.push(Call::Configure {
            fix_interval,
            fix_retry,
            nmea_mask,
        });

        match shared.configure_error {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn start(&mut self) -> Result<(), DriverError> {
        let mut shared = self.shared.lock().unwrap();
        shared.calls.push(Call::Start);

        if let Some(error) = shared.start_error {
            return Err(error);
        }

        shared.running = true;
        Ok(())
    }

    fn read(&mut self, kind: DataKind) -> Result<Payload, DriverError> {
        let mut shared = self.shared.lock().unwrap();
        shared.calls.push(Call::Read(kind));

        if let Some(error) = shared.read_error {
            return Err(error);
        }

        let payload = match kind {
            DataKind::Pvt => shared.pvt.map(Payload::Pvt),
            DataKind::Nmea => shared.nmea.map(Payload::Nmea),
            DataKind::Agps => shared.agps.map(Payload::Agps),
        };

        payload.ok_or(DriverError::NoData)
    }
}

/// [AtCommands] double
#[derive(Clone, Default)]
pub struct MockAt {
    commands: Arc<Mutex<Vec<String>>>,
    reject: Arc<Mutex<bool>>,
}

impl MockAt {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rejecting() -> Self {
        let mock = Self::default();
        *mock.reject.lock().unwrap() = true;
        mock
    }

    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }
}

impl AtCommands for MockAt {
    fn write(&mut self, command: &str) -> Result<(), AtError> {
        self.commands.lock().unwrap().push(command.to_string());

        if *self.reject.lock().unwrap() {
            Err(AtError::Rejected("ERROR".to_string()))
        } else {
            Ok(())
        }
    }
}

/// [Clock] double
#[derive(Clone, Default)]
pub struct MockClock {
    times: Arc<Mutex<Vec<CalendarTime>>>,
    fail: Arc<Mutex<bool>>,
}

impl MockClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        let mock = Self::default();
        *mock.fail.lock().unwrap() = true;
        mock
    }

    pub fn times(&self) -> Vec<CalendarTime> {
        self.times.lock().unwrap().clone()
    }
}

impl Clock for MockClock {
    fn set_time(&mut self, time: &CalendarTime) -> Result<(), ClockError> {
        if *self.fail.lock().unwrap() {
            return Err(ClockError::HostClock("unavailable".to_string()));
        }

        self.times.lock().unwrap().push(*time);
        Ok(())
    }
}
