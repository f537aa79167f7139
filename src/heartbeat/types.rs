//! Heartbeat value type.
//!
//! A heartbeat is one observed editor activity instant. It is built once by an
//! event producer and never mutated afterwards.

use chrono::Utc;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::value::RawValue;
use std::fmt;
use std::num::NonZeroU32;
use std::str::FromStr;

/// Seconds since the Unix epoch with exactly four fractional digits.
///
/// Stored as an integer count of ten-thousandths of a second so the value
/// printed on the reporter command line is exact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp {
    ticks: u64,
}

impl Timestamp {
    /// Ticks per second.
    pub const SCALE: u64 = 10_000;

    /// The current wall-clock time.
    pub fn now() -> Self {
        Self::from_millis(Utc::now().timestamp_millis())
    }

    /// Build from milliseconds since the epoch. Pre-epoch values clamp to zero.
    pub fn from_millis(millis: i64) -> Self {
        Self {
            ticks: u64::try_from(millis).unwrap_or(0).saturating_mul(10),
        }
    }

    pub fn from_ticks(ticks: u64) -> Self {
        Self { ticks }
    }

    /// Build from fractional seconds, rounding half-up to four digits.
    ///
    /// Returns `None` for negative or non-finite input.
    pub fn from_secs_f64(secs: f64) -> Option<Self> {
        if !secs.is_finite() || secs < 0.0 {
            return None;
        }
        let ticks = (secs * Self::SCALE as f64).round();
        if ticks > u64::MAX as f64 {
            return None;
        }
        Some(Self {
            ticks: ticks as u64,
        })
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn as_secs_f64(&self) -> f64 {
        self.ticks as f64 / Self::SCALE as f64
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{:04}",
            self.ticks / Self::SCALE,
            self.ticks % Self::SCALE
        )
    }
}

impl FromStr for Timestamp {
    type Err = HeartbeatError;

    /// Parse a plain decimal such as `100.5` or `1700000000.1234`.
    ///
    /// Digits past the fourth fractional place are rounded half-up.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || HeartbeatError::InvalidTimestamp(s.to_string());
        let (whole, frac) = s.trim().split_once('.').unwrap_or((s.trim(), ""));
        if whole.is_empty() || !whole.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        if !frac.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }

        let whole: u64 = whole.parse().map_err(|_| invalid())?;
        let mut digits = frac.bytes().map(|b| u64::from(b - b'0'));
        let mut fraction = 0u64;
        for _ in 0..4 {
            fraction = fraction * 10 + digits.next().unwrap_or(0);
        }
        if digits.next().is_some_and(|d| d >= 5) {
            fraction += 1;
        }

        whole
            .checked_mul(Self::SCALE)
            .and_then(|t| t.checked_add(fraction))
            .map(Self::from_ticks)
            .ok_or_else(invalid)
    }
}

/// Written as a JSON number with exactly four fractional digits, e.g.
/// `100.5000`.
impl Serialize for Timestamp {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let number = RawValue::from_string(self.to_string()).map_err(serde::ser::Error::custom)?;
        number.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = f64::deserialize(deserializer)?;
        Timestamp::from_secs_f64(secs)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp {secs}")))
    }
}

/// Errors raised while constructing heartbeats.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HeartbeatError {
    #[error("heartbeat entity must not be empty")]
    EmptyEntity,

    #[error("heartbeat entity must be an absolute path: {0}")]
    RelativeEntity(String),

    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),
}

/// One timestamped record of editor activity on a file.
///
/// Serialises with camelCase field names; absent optional fields are omitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Heartbeat {
    #[serde(deserialize_with = "non_empty_entity")]
    entity: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    line_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    line_number: Option<NonZeroU32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    cursor_position: Option<u64>,
    timestamp: Timestamp,
    #[serde(default)]
    is_write: bool,
    #[serde(default)]
    is_unsaved_file: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    project: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    language: Option<String>,
    #[serde(default)]
    is_building: bool,
}

fn non_empty_entity<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let entity = String::deserialize(deserializer)?;
    if entity.is_empty() {
        return Err(serde::de::Error::custom(HeartbeatError::EmptyEntity));
    }
    Ok(entity)
}

impl Heartbeat {
    /// Create a heartbeat for `entity` at `timestamp` with every optional field
    /// absent and every flag false.
    pub fn new(entity: impl Into<String>, timestamp: Timestamp) -> Result<Self, HeartbeatError> {
        let entity = entity.into();
        if entity.is_empty() {
            return Err(HeartbeatError::EmptyEntity);
        }
        Ok(Self {
            entity,
            line_count: None,
            line_number: None,
            cursor_position: None,
            timestamp,
            is_write: false,
            is_unsaved_file: false,
            project: None,
            language: None,
            is_building: false,
        })
    }

    /// Create a heartbeat stamped with the current time.
    pub fn now(entity: impl Into<String>) -> Result<Self, HeartbeatError> {
        Self::new(entity, Timestamp::now())
    }

    pub fn with_line_count(mut self, line_count: u32) -> Self {
        self.line_count = Some(line_count);
        self
    }

    pub fn with_line_number(mut self, line_number: NonZeroU32) -> Self {
        self.line_number = Some(line_number);
        self
    }

    pub fn with_cursor_position(mut self, cursor_position: u64) -> Self {
        self.cursor_position = Some(cursor_position);
        self
    }

    pub fn with_write(mut self, is_write: bool) -> Self {
        self.is_write = is_write;
        self
    }

    pub fn with_unsaved_file(mut self, is_unsaved_file: bool) -> Self {
        self.is_unsaved_file = is_unsaved_file;
        self
    }

    pub fn with_project(mut self, project: impl Into<String>) -> Self {
        self.project = Some(project.into());
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn with_building(mut self, is_building: bool) -> Self {
        self.is_building = is_building;
        self
    }

    pub fn entity(&self) -> &str {
        &self.entity
    }

    pub fn line_count(&self) -> Option<u32> {
        self.line_count
    }

    pub fn line_number(&self) -> Option<NonZeroU32> {
        self.line_number
    }

    pub fn cursor_position(&self) -> Option<u64> {
        self.cursor_position
    }

    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    pub fn is_write(&self) -> bool {
        self.is_write
    }

    pub fn is_unsaved_file(&self) -> bool {
        self.is_unsaved_file
    }

    pub fn project(&self) -> Option<&str> {
        self.project.as_deref()
    }

    pub fn language(&self) -> Option<&str> {
        self.language.as_deref()
    }

    pub fn is_building(&self) -> bool {
        self.is_building
    }
}
