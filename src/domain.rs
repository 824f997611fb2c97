//! ==============================================================================
//! domain.rs - sensor records as the backend reports them
//! ==============================================================================
//!
//! purpose:
//!     the record model shared by every other module. a record's kind decides
//!     both its value representation and the backend resource it lives under.
//!
//! representation:
//!     - SensorKind: tagged variant {temperature, luminosity} -> resource segment
//!     - SensorValue: temperature in tenths (one fractional digit, always),
//!       luminosity as a whole number
//!     - RecordId: server-assigned id (string or integer on the wire)
//!     - Uid: client-allocated external id, increasing across both kinds
//!
//! ==============================================================================

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::ConsoleError;

/// editor representation of a timestamp (minute precision, no zone)
pub const EDITOR_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SensorKind {
    Temperature,
    Luminosity,
}

impl SensorKind {
    pub const ALL: [SensorKind; 2] = [SensorKind::Temperature, SensorKind::Luminosity];

    /// resource segment under `/sensors`
    pub fn segment(self) -> &'static str {
        match self {
            SensorKind::Temperature => "temperature",
            SensorKind::Luminosity => "luminosity",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SensorKind::Temperature => "Temperature",
            SensorKind::Luminosity => "Luminosity",
        }
    }

    pub fn unit(self) -> &'static str {
        match self {
            SensorKind::Temperature => "ºC",
            SensorKind::Luminosity => "lx",
        }
    }

    /// Coerce user input into this kind's value representation.
    ///
    /// Temperature rounds to one fractional digit (half away from zero),
    /// luminosity truncates toward zero. Empty or non-numeric input is a
    /// validation failure.
    pub fn coerce(self, input: &str) -> Result<SensorValue, ConsoleError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(ConsoleError::ValidationFailed("value is required".to_string()));
        }
        let number: f64 = trimmed.parse().map_err(|_| {
            ConsoleError::ValidationFailed(format!("'{}' is not a number", trimmed))
        })?;
        if !number.is_finite() {
            return Err(ConsoleError::ValidationFailed(format!(
                "'{}' is not a finite number",
                trimmed
            )));
        }
        Ok(self.value_from(number))
    }

    /// Coerce a raw number (as read from the wire) into this kind's representation.
    pub fn value_from(self, number: f64) -> SensorValue {
        match self {
            SensorKind::Temperature => SensorValue::Temperature {
                tenths: (number * 10.0).round() as i64,
            },
            SensorKind::Luminosity => SensorValue::Luminosity(number.trunc() as i64),
        }
    }
}

impl fmt::Display for SensorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.segment())
    }
}

impl FromStr for SensorKind {
    type Err = ConsoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "temperature" => Ok(SensorKind::Temperature),
            "luminosity" => Ok(SensorKind::Luminosity),
            other => Err(ConsoleError::ValidationFailed(format!(
                "unknown sensor type '{}'",
                other
            ))),
        }
    }
}

/// A reading, already in the representation its kind dictates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SensorValue {
    /// degrees celsius, in tenths
    Temperature { tenths: i64 },
    /// lux
    Luminosity(i64),
}

impl SensorValue {
    pub fn kind(&self) -> SensorKind {
        match self {
            SensorValue::Temperature { .. } => SensorKind::Temperature,
            SensorValue::Luminosity(_) => SensorKind::Luminosity,
        }
    }

    pub fn as_f64(&self) -> f64 {
        match *self {
            SensorValue::Temperature { tenths } => tenths as f64 / 10.0,
            SensorValue::Luminosity(lux) => lux as f64,
        }
    }

    /// value without unit: `21.5`, `120`
    pub fn plain(&self) -> String {
        match *self {
            SensorValue::Temperature { tenths } => format!("{:.1}", tenths as f64 / 10.0),
            SensorValue::Luminosity(lux) => lux.to_string(),
        }
    }
}

impl fmt::Display for SensorValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.plain(), self.kind().unit())
    }
}

impl Serialize for SensorValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match *self {
            SensorValue::Temperature { .. } => serializer.serialize_f64(self.as_f64()),
            SensorValue::Luminosity(lux) => serializer.serialize_i64(lux),
        }
    }
}

/// Backend record id. Held as text whatever the backend sends.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

impl<'de> Deserialize<'de> for RecordId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Text(String),
            Number(i64),
        }

        Ok(match RawId::deserialize(deserializer)? {
            RawId::Text(text) => RecordId(text),
            RawId::Number(number) => RecordId(number.to_string()),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Uid(pub u64);

impl Uid {
    /// `None` once the uid space is exhausted
    pub fn next(self) -> Option<Uid> {
        self.0.checked_add(1).map(Uid)
    }
}

impl fmt::Display for Uid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RecordWire")]
pub struct SensorRecord {
    pub id: RecordId,
    #[serde(rename = "type")]
    pub kind: SensorKind,
    pub value: SensorValue,
    pub timestamp: DateTime<Utc>,
    pub uid: Uid,
}

impl SensorRecord {
    /// timestamp in the editor's `YYYY-MM-DDTHH:MM` form
    pub fn editor_timestamp(&self) -> String {
        self.timestamp.format(EDITOR_TIMESTAMP_FORMAT).to_string()
    }
}

// the wire carries a bare number; the kind decides how it is held
#[derive(Deserialize)]
struct RecordWire {
    id: RecordId,
    #[serde(rename = "type")]
    kind: SensorKind,
    value: f64,
    #[serde(deserialize_with = "deserialize_timestamp")]
    timestamp: DateTime<Utc>,
    uid: Uid,
}

impl From<RecordWire> for SensorRecord {
    fn from(wire: RecordWire) -> Self {
        SensorRecord {
            id: wire.id,
            kind: wire.kind,
            value: wire.kind.value_from(wire.value),
            timestamp: wire.timestamp,
            uid: wire.uid,
        }
    }
}

/// RFC 3339, or a zone-less ISO timestamp taken as UTC.
fn deserialize_timestamp<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
    let text = String::deserialize(deserializer)?;
    parse_timestamp(&text).ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp '{}'", text)))
}

pub fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Some(parsed.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", EDITOR_TIMESTAMP_FORMAT]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .map(|naive| Utc.from_utc_datetime(&naive))
}
