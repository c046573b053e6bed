use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::LokiError;

const NANOS_PER_SECOND: i128 = 1_000_000_000;

/// An instant with nanosecond precision, as Loki stores log entries.
///
/// Loki is not consistent about how it puts timestamps on the wire: depending on the endpoint
/// they are seconds since epoch as a float, nanoseconds since epoch as an integer (often inside
/// a string) or an RFC3339 string. [LokiTimestamp::parse_wire] accepts all three.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LokiTimestamp(DateTime<Utc>);

impl LokiTimestamp {
    pub fn now() -> Self {
        LokiTimestamp(Utc::now())
    }

    pub fn from_datetime(datetime: DateTime<Utc>) -> Self {
        LokiTimestamp(datetime)
    }

    pub fn from_epoch_seconds(seconds: i64) -> Option<Self> {
        DateTime::from_timestamp(seconds, 0).map(LokiTimestamp)
    }

    pub fn from_epoch_millis(millis: i64) -> Option<Self> {
        DateTime::from_timestamp_millis(millis).map(LokiTimestamp)
    }

    pub fn from_epoch_nanos(nanos: i128) -> Option<Self> {
        let seconds = i64::try_from(nanos.div_euclid(NANOS_PER_SECOND)).ok()?;
        let subsec_nanos = nanos.rem_euclid(NANOS_PER_SECOND) as u32;
        DateTime::from_timestamp(seconds, subsec_nanos).map(LokiTimestamp)
    }

    /// Sub-nanosecond digits of `seconds` are rounded away.
    pub fn from_epoch_seconds_f64(seconds: f64) -> Option<Self> {
        if !seconds.is_finite() || seconds.abs() >= i64::MAX as f64 {
            return None;
        }
        let whole = seconds.floor();
        let mut subsec_nanos = ((seconds - whole) * 1e9).round() as i128;
        let mut whole = whole as i128;
        if subsec_nanos >= NANOS_PER_SECOND {
            whole += 1;
            subsec_nanos -= NANOS_PER_SECOND;
        }
        Self::from_epoch_nanos(whole.checked_mul(NANOS_PER_SECOND)?.checked_add(subsec_nanos)?)
    }

    pub fn datetime(&self) -> DateTime<Utc> {
        self.0
    }

    pub fn epoch_nanos(&self) -> i128 {
        self.0.timestamp() as i128 * NANOS_PER_SECOND + self.0.timestamp_subsec_nanos() as i128
    }

    /// Seconds and the 9 digit zero padded nanosecond remainder without separator, the format
    /// of Loki's `start`, `end` and `time` query parameters.
    pub fn to_epoch_nanos_string(&self) -> String {
        self.epoch_nanos().to_string()
    }

    /// Lossy below a microsecond for current dates, f64 has only ~16 significant digits.
    pub fn to_epoch_seconds_f64(&self) -> f64 {
        self.0.timestamp() as f64 + self.0.timestamp_subsec_nanos() as f64 / 1e9
    }

    pub fn to_rfc3339(&self) -> String {
        self.0.to_rfc3339_opts(SecondsFormat::AutoSi, true)
    }

    pub fn minus(&self, duration: Duration) -> Option<Self> {
        self.0.checked_sub_signed(duration).map(LokiTimestamp)
    }

    /// Integers are taken as epoch nanoseconds, other numbers as epoch seconds, everything
    /// else has to be RFC3339.
    pub fn parse_wire_str(value: &str) -> Result<Self, LokiError> {
        let trimmed = value.trim();
        let parsed = if let Ok(nanos) = trimmed.parse::<i128>() {
            Self::from_epoch_nanos(nanos)
        } else if let Some(seconds) = trimmed.parse::<f64>().ok().filter(|seconds| seconds.is_finite()) {
            Self::from_epoch_seconds_f64(seconds)
        } else {
            DateTime::parse_from_rfc3339(trimmed)
                .ok()
                .map(|datetime| LokiTimestamp(datetime.with_timezone(&Utc)))
        };
        parsed.ok_or_else(|| LokiError::MalformedTimestamp(value.to_string()))
    }

    pub fn parse_wire(value: &Value) -> Result<Self, LokiError> {
        let parsed = match value {
            Value::String(text) => return Self::parse_wire_str(text),
            Value::Number(number) => {
                if let Some(nanos) = number.as_i64() {
                    Self::from_epoch_nanos(nanos as i128)
                } else if let Some(nanos) = number.as_u64() {
                    Self::from_epoch_nanos(nanos as i128)
                } else {
                    number.as_f64().and_then(Self::from_epoch_seconds_f64)
                }
            }
            _ => None,
        };
        parsed.ok_or_else(|| LokiError::MalformedTimestamp(value.to_string()))
    }

    /// Reads a value that is always epoch seconds, integral or not, like the times of delete
    /// requests.
    pub fn parse_epoch_seconds(value: &Value) -> Result<Self, LokiError> {
        let seconds = match value {
            Value::Number(number) => number.as_f64(),
            Value::String(text) => text.trim().parse::<f64>().ok(),
            _ => None,
        };
        seconds
            .and_then(Self::from_epoch_seconds_f64)
            .ok_or_else(|| LokiError::MalformedTimestamp(value.to_string()))
    }
}

impl From<DateTime<Utc>> for LokiTimestamp {
    fn from(datetime: DateTime<Utc>) -> Self {
        LokiTimestamp(datetime)
    }
}

impl FromStr for LokiTimestamp {
    type Err = LokiError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse_wire_str(value)
    }
}

impl fmt::Display for LokiTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_rfc3339())
    }
}

impl Serialize for LokiTimestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_epoch_nanos_string())
    }
}

impl<'de> Deserialize<'de> for LokiTimestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        LokiTimestamp::parse_wire(&value).map_err(D::Error::custom)
    }
}

pub(crate) fn deserialize_epoch_seconds<'de, D: Deserializer<'de>>(deserializer: D) -> Result<LokiTimestamp, D::Error> {
    let value = Value::deserialize(deserializer)?;
    LokiTimestamp::parse_epoch_seconds(&value).map_err(D::Error::custom)
}

pub(crate) fn serialize_epoch_seconds<S: Serializer>(timestamp: &LokiTimestamp, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(timestamp.to_epoch_seconds_f64())
}
