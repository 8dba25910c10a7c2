//! Recorded receiver sessions, played back as a [Gnss] peripheral.
//!
//! A recording is a JSON-lines file (optionally gzip compressed, `.gz`),
//! one notification per line:
//!
//! ```text
//! {"event":"fix","delay_ms":1000,"pvt":{"latitude":60.0,"longitude":25.0,"flags":"FIX_VALID"}}
//! {"event":"nmea","sentence":"$GPGGA,134658.00,5106.9792,N,11402.3003,W,2,09,1.0,1048.47,M,-16.27,M,08,AAAA*60"}
//! {"event":"agps","request":{"sv_mask_ephe":2881137594,"sv_mask_alm":3735936685,"data_flags":21}}
//! {"event":"blocked"}
//! ```
//!
//! Blank lines and lines starting with `#` are skipped.
use flate2::read::GzDecoder;

use log::{debug, trace};

use serde::Deserialize;

use std::{
    fs::File,
    io::{BufRead, BufReader, Read},
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
    },
    thread::JoinHandle,
    time::{Duration, Instant},
};

use super::{
    AgpsFrame, DataKind, DriverError, Gnss, Handler, NmeaFrame, NmeaMask, Payload, PvtFrame,
    Registration,
};

use crate::{Error, event::ReceiverEvent};

/// errno reported when starting twice
const EALREADY: i32 = 114;

/// Cancellation polling granularity of the playback thread
const TICK: Duration = Duration::from_millis(20);

/// Recorded receiver notification
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Notification {
    Fix { pvt: PvtFrame },
    Nmea { sentence: String },
    Agps { request: AgpsFrame },
    Blocked,
    Unblocked,
    Timeout,
}

/// One [Notification] of the recording
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Step {
    /// Dead time before the notification, in milliseconds
    #[serde(default)]
    pub delay_ms: u64,

    #[serde(flatten)]
    pub notification: Notification,
}

/// Latest payload of each kind
#[derive(Debug, Default)]
struct Slots {
    pvt: Option<PvtFrame>,
    nmea: Option<NmeaFrame>,
    agps: Option<AgpsFrame>,
}

struct Player {
    cancel: Arc<AtomicBool>,
    thread: JoinHandle<()>,
}

pub struct Replay {
    /// Recorded [Step]s
    steps: Arc<Vec<Step>>,

    /// Payloads exposed to [Gnss::read]
    slots: Arc<Mutex<Slots>>,

    /// Registered [Handler]
    handler: Option<(Registration, Handler)>,

    /// Registration counter
    registrations: u32,

    /// Fix interval, 0 = play the recording once
    fix_interval: u16,

    /// Active playback
    player: Option<Player>,
}

impl Replay {
    pub fn new(steps: Vec<Step>) -> Self {
        Self {
            steps: Arc::new(steps),
            slots: Default::default(),
            handler: None,
            registrations: 0,
            fix_interval: 0,
            player: None,
        }
    }

    /// Loads a recording. Gzip files must be terminated with '.gz'.
    pub fn open_file(fullpath: &str) -> Result<Self, Error> {
        let handle = File::open(fullpath)?;

        let replay = if fullpath.ends_with(".gz") {
            Self::from_reader(GzDecoder::new(handle))?
        } else {
            Self::from_reader(handle)?
        };

        debug!("{} - {} recorded notifications", fullpath, replay.len());
        Ok(replay)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, Error> {
        let mut steps = Vec::new();

        for line in BufReader::new(reader).lines() {
            let line = line?;
            let line = line.trim();

            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            steps.push(serde_json::from_str::<Step>(line)?);
        }

        Ok(Self::new(steps))
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// True while the recording is being played
    pub fn is_playing(&self) -> bool {
        self.player
            .as_ref()
            .is_some_and(|player| !player.thread.is_finished())
    }

    fn cancel(&mut self) -> bool {
        let Some(player) = self.player.take() else {
            return false;
        };

        let was_playing = !player.thread.is_finished();
        player.cancel.store(true, Ordering::Release);
        let _ = player.thread.join();
        was_playing
    }
}

impl Drop for Replay {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Sleeps for `duration`, returns false when cancelled meanwhile
fn wait(duration: Duration, cancel: &AtomicBool) -> bool {
    let deadline = Instant::now() + duration;

    loop {
        if cancel.load(Ordering::Acquire) {
            return false;
        }

        let now = Instant::now();
        if now >= deadline {
            return true;
        }

        std::thread::sleep(TICK.min(deadline - now));
    }
}

fn play(
    steps: Arc<Vec<Step>>,
    slots: Arc<Mutex<Slots>>,
    handler: Option<Handler>,
    cancel: Arc<AtomicBool>,
    period: Option<Duration>,
) {
    loop {
        for step in steps.iter() {
            if !wait(Duration::from_millis(step.delay_ms), &cancel) {
                return;
            }

            let event = {
                let mut slots = slots.lock().unwrap_or_else(|e| e.into_inner());

                match &step.notification {
                    Notification::Fix { pvt } => {
                        slots.pvt = Some(*pvt);
                        ReceiverEvent::FixReady
                    },
                    Notification::Nmea { sentence } => {
                        slots.nmea = Some(NmeaFrame::new(sentence));
                        ReceiverEvent::SentenceReady
                    },
                    Notification::Agps { request } => {
                        slots.agps = Some(*request);
                        ReceiverEvent::AssistanceDataNeeded
                    },
                    Notification::Blocked => ReceiverEvent::SignalBlocked,
                    Notification::Unblocked => ReceiverEvent::SignalUnblocked,
                    Notification::Timeout => ReceiverEvent::SleepAfterTimeout,
                }
            };

            trace!("replay: {:?}", event);

            if let Some(handler) = &handler {
                handler(event);
            }
        }

        match period {
            Some(period) => {
                if !wait(period, &cancel) {
                    return;
                }
            },
            None => return,
        }
    }
}

impl Gnss for Replay {
    fn register_handler(&mut self, handler: Handler) -> Result<Registration, DriverError> {
        self.registrations += 1;
        let registration = Registration(self.registrations);
        self.handler = Some((registration, handler));
        Ok(registration)
    }

    fn release_handler(&mut self, registration: Registration) -> Result<(), DriverError> {
        match &self.handler {
            Some((registered, _)) if *registered == registration => {
                self.handler = None;
                Ok(())
            },
            _ => Err(DriverError::NoData),
        }
    }

    fn stop(&mut self) -> Result<(), DriverError> {
        if self.cancel() {
            debug!("replay stopped");
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
        debug!(
            "replay configured: interval={}s retry={}s nmea=[{}]",
            fix_interval, fix_retry, nmea_mask
        );

        self.fix_interval = fix_interval;
        Ok(())
    }

    fn start(&mut self) -> Result<(), DriverError> {
        if self.is_playing() {
            return Err(DriverError::Code(-EALREADY));
        }

        let cancel = Arc::new(AtomicBool::new(false));

        let period = match self.fix_interval {
            0 => None,
            secs => Some(Duration::from_secs(secs as u64)),
        };

        let steps = Arc::clone(&self.steps);
        let slots = Arc::clone(&self.slots);
        let handler = self.handler.as_ref().map(|(_, handler)| Arc::clone(handler));
        let thread_cancel = Arc::clone(&cancel);

        let thread = std::thread::Builder::new()
            .name("gnss-replay".to_string())
            .spawn(move || play(steps, slots, handler, thread_cancel, period))
            .map_err(|_| DriverError::Code(-crate::error::EIO))?;

        self.player = Some(Player { cancel, thread });
        Ok(())
    }

    fn read(&mut self, kind: DataKind) -> Result<Payload, DriverError> {
        let slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());

        let payload = match kind {
            DataKind::Pvt => slots.pvt.map(Payload::Pvt),
            DataKind::Nmea => slots.nmea.map(Payload::Nmea),
            DataKind::Agps => slots.agps.map(Payload::Agps),
        };

        payload.ok_or(DriverError::NoData)
    }
}
