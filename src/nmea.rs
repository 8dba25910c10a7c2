//! NMEA sentence extraction and validation.
use log::warn;

use nmea0183::Parser;

use serde::Serialize;

use std::str::FromStr;

use thiserror::Error;

use crate::device::{NMEA_MAX_LEN, NmeaFrame};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum NmeaError {
    #[error("empty sentence")]
    Empty,

    #[error("missing '$' delimiter")]
    MissingDelimiter,

    #[error("sentence too long ({0} bytes)")]
    TooLong(usize),

    #[error("non printable character")]
    InvalidCharacter,

    #[error("unknown sentence type \"{0}\"")]
    UnknownSentence(String),

    #[error("rejected by parser: {0}")]
    Rejected(String),
}

/// Validated NMEA sentence, at most [NMEA_MAX_LEN] - 1 characters,
/// without line terminator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct NmeaSentence(String);

impl NmeaSentence {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Talker + sentence identifier, like "GPGGA"
    pub fn sentence_type(&self) -> &str {
        let body = &self.0[1..];
        body.split([',', '*']).next().unwrap_or(body)
    }

    /// Returns the transmitted checksum, if any
    pub fn checksum(&self) -> Option<u8> {
        let (_, checksum) = self.0.rsplit_once('*')?;
        u8::from_str_radix(checksum.get(..2)?, 16).ok()
    }

    /// Runs the sentence through the [nmea0183] parser, which checks
    /// framing and checksum and decodes the sentence types it supports.
    pub fn verify(&self) -> Result<(), NmeaError> {
        let mut parser = Parser::new();

        self.0
            .bytes()
            .chain(*b"\r\n")
            .find_map(|byte| parser.parse_from_byte(byte))
            .unwrap_or(Err("incomplete sentence"))
            .map(|_| ())
            .map_err(|e| NmeaError::Rejected(e.to_string()))
    }
}

impl FromStr for NmeaSentence {
    type Err = NmeaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim_end_matches(['\r', '\n']);

        if s.is_empty() {
            return Err(NmeaError::Empty);
        }

        if !s.starts_with('$') {
            return Err(NmeaError::MissingDelimiter);
        }

        if s.len() > NMEA_MAX_LEN - 1 {
            return Err(NmeaError::TooLong(s.len()));
        }

        if !s.bytes().all(|b| b.is_ascii_graphic() || b == b' ') {
            return Err(NmeaError::InvalidCharacter);
        }

        let sentence = Self(s.to_string());

        if let Err(e) = sentence.verify() {
            warn!("{} - {}", sentence, e);
        }

        Ok(sentence)
    }
}

impl TryFrom<&NmeaFrame> for NmeaSentence {
    type Error = NmeaError;

    /// Extracts the sentence up to the first NUL
    fn try_from(frame: &NmeaFrame) -> Result<Self, Self::Error> {
        let bytes = frame.as_bytes();
        let end = bytes.iter().position(|b| *b == 0).unwrap_or(bytes.len());

        let s = std::str::from_utf8(&bytes[..end]).map_err(|_| NmeaError::InvalidCharacter)?;
        Self::from_str(s)
    }
}

impl std::fmt::Display for NmeaSentence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
