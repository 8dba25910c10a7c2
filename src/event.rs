//! Inbound lifecycle / receiver events and outbound results.
use hifitime::prelude::Epoch;

use serde::{Deserialize, Serialize};

use std::str::FromStr;

use crate::{agps::AssistanceRequest, fix::FixRecord, nmea::NmeaSentence, utils::serialize_epoch};

/// Data kinds an application may request
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum AppDataKind {
    Gnss,
    Modem,
    Battery,
    Environmental,
    Movement,
}

/// Application and modem lifecycle notifications
#[derive(Debug, Clone, PartialEq)]
pub enum LifecycleEvent {
    AppStarted,
    ModemInitialized,
    DataRequested(Vec<AppDataKind>),
    ShutdownRequested,
}

/// Receiver notifications, as delivered to the registered handler
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ReceiverEvent {
    FixReady,
    SentenceReady,
    AssistanceDataNeeded,
    SignalBlocked,
    SignalUnblocked,
    /// Retry timeout expired without a fix
    SleepAfterTimeout,
}

/// Inbound queue item
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Lifecycle(LifecycleEvent),
    Receiver(ReceiverEvent),
}

impl From<LifecycleEvent> for Message {
    fn from(event: LifecycleEvent) -> Self {
        Self::Lifecycle(event)
    }
}

impl From<ReceiverEvent> for Message {
    fn from(event: ReceiverEvent) -> Self {
        Self::Receiver(event)
    }
}

/// [GpsData] publication format
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataFormat {
    #[default]
    Nmea,
    Pvt,
}

impl FromStr for DataFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "nmea" => Ok(Self::Nmea),
            "pvt" => Ok(Self::Pvt),
            other => Err(format!("unknown data format \"{}\"", other)),
        }
    }
}

impl std::fmt::Display for DataFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Nmea => write!(f, "NMEA"),
            Self::Pvt => write!(f, "PVT"),
        }
    }
}

/// Position data attached to [OutputEvent::DataReady]
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "format", rename_all = "lowercase")]
pub enum GpsData {
    Nmea {
        sentence: NmeaSentence,
        /// Time of the fix this sentence belongs to
        #[serde(serialize_with = "serialize_epoch")]
        timestamp: Option<Epoch>,
    },
    Pvt(FixRecord),
}

impl GpsData {
    pub fn format(&self) -> DataFormat {
        match self {
            Self::Nmea { .. } => DataFormat::Nmea,
            Self::Pvt(_) => DataFormat::Pvt,
        }
    }
}

/// Events published on the output bus
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum OutputEvent {
    /// An acquisition session started
    Active,
    /// The acquisition session concluded
    Inactive,
    DataReady(GpsData),
    AssistanceNeeded(AssistanceRequest),
    /// Session expired without fix
    Timeout,
    Blocked,
    Unblocked,
    /// Receiver released after a shutdown request
    ShutdownReady,
    /// Negative errno style code
    Error(i32),
}

impl std::fmt::Display for OutputEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Inactive => write!(f, "inactive"),
            Self::DataReady(GpsData::Nmea { sentence, .. }) => {
                write!(f, "data ready (NMEA): {}", sentence)
            },
            Self::DataReady(GpsData::Pvt(record)) => write!(f, "data ready (PVT): {}", record),
            Self::AssistanceNeeded(request) => write!(f, "assistance needed: {}", request),
            Self::Timeout => write!(f, "timeout"),
            Self::Blocked => write!(f, "blocked"),
            Self::Unblocked => write!(f, "unblocked"),
            Self::ShutdownReady => write!(f, "shutdown ready"),
            Self::Error(code) => write!(f, "error {}", code),
        }
    }
}
