#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_cfg))]

/*
 * gnss-module: GNSS positioning module controller.
 * This framework is shipped under Mozilla Public V2 license.
 */

pub mod agps;
pub mod controller;
pub mod device;
pub mod dispatcher;
pub mod error;
pub mod event;
pub mod fix;
pub mod module;
pub mod nmea;
pub mod publisher;
pub mod runtime;
pub mod settings;

mod utils;

pub use crate::{
    error::{Error, NO_MESSAGE_SPACE},
    event::{AppDataKind, DataFormat, GpsData, LifecycleEvent, Message, OutputEvent, ReceiverEvent},
    module::{LifecycleBus, Module, State},
    settings::{Board, Settings},
};

pub mod prelude {
    pub use crate::{
        agps::{AgpsFlags, AssistanceRequest},
        device::{AtCommands, DataKind, DriverError, Gnss, Handler, NmeaMask, Payload, Registration},
        error::{Error, NO_MESSAGE_SPACE},
        event::{
            AppDataKind, DataFormat, GpsData, LifecycleEvent, Message, OutputEvent, ReceiverEvent,
        },
        fix::{CalendarTime, FixRecord},
        module::{LifecycleBus, Module, State},
        nmea::NmeaSentence,
        runtime::{Clock, Runtime},
        settings::{Board, Settings},
    };
}
