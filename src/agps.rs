//! Assistance data requests, forwarded as is.
use bitflags::bitflags;

use itertools::Itertools;

use serde::Serialize;

use crate::device::AgpsFrame;

bitflags! {
    /// Requested assistance data types
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
    pub struct AgpsFlags: u32 {
        const GPS_UTC = 0x01;
        const KLOBUCHAR = 0x02;
        const NEQUICK = 0x04;
        const SYS_TIME_AND_SV_TOW = 0x08;
        const POSITION = 0x10;
        const INTEGRITY = 0x20;
    }
}

impl Default for AgpsFlags {
    fn default() -> Self {
        Self::empty()
    }
}

impl std::fmt::Display for AgpsFlags {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_empty() {
            write!(f, "none")
        } else {
            write!(f, "{}", self.iter_names().map(|(name, _)| name).join("|"))
        }
    }
}

/// [AssistanceRequest] as published on the output bus
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Serialize)]
pub struct AssistanceRequest {
    /// Satellites needing new ephemerides
    pub ephemeris_mask: u64,
    /// Satellites needing new almanacs
    pub almanac_mask: u64,
    pub data_flags: AgpsFlags,
}

impl From<&AgpsFrame> for AssistanceRequest {
    fn from(frame: &AgpsFrame) -> Self {
        Self {
            ephemeris_mask: frame.sv_mask_ephe,
            almanac_mask: frame.sv_mask_alm,
            // unknown bits are forwarded untouched
            data_flags: AgpsFlags::from_bits_retain(frame.data_flags),
        }
    }
}

impl std::fmt::Display for AssistanceRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "ephemeris={:#x} almanac={:#x} data={}",
            self.ephemeris_mask, self.almanac_mask, self.data_flags
        )
    }
}
