use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use serde::{Deserialize, Serialize};

use crate::LokiError;

#[derive(Deserialize, Serialize, Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum PrometheusDurationUnit {
    #[serde(alias = "s")]
    Seconds,
    #[serde(alias = "m")]
    Minutes,
    #[serde(alias = "h")]
    Hours,
    #[serde(alias = "d")]
    Days,
}

impl PrometheusDurationUnit {
    pub fn letter(&self) -> &'static str {
        match self {
            PrometheusDurationUnit::Seconds => "s",
            PrometheusDurationUnit::Minutes => "m",
            PrometheusDurationUnit::Hours => "h",
            PrometheusDurationUnit::Days => "d",
        }
    }

    pub fn seconds(&self) -> i64 {
        match self {
            PrometheusDurationUnit::Seconds => 1,
            PrometheusDurationUnit::Minutes => 60,
            PrometheusDurationUnit::Hours => 60 * 60,
            PrometheusDurationUnit::Days => 24 * 60 * 60,
        }
    }
}

/// A relative time window like `30d` or `5m`, used for `since`, `step` and `interval`.
///
/// The magnitude is not validated, zero and negative values are sent as they are.
#[derive(Deserialize, Serialize, Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct PrometheusDuration {
    pub magnitude: i64,
    pub unit: PrometheusDurationUnit,
}

impl PrometheusDuration {
    /// The largest time span Loki scans in one label or series request.
    pub const SINCE_MAX_VALUE: PrometheusDuration = PrometheusDuration::days(30);

    pub const fn new(magnitude: i64, unit: PrometheusDurationUnit) -> Self {
        PrometheusDuration { magnitude, unit }
    }

    pub const fn seconds(magnitude: i64) -> Self {
        Self::new(magnitude, PrometheusDurationUnit::Seconds)
    }

    pub const fn minutes(magnitude: i64) -> Self {
        Self::new(magnitude, PrometheusDurationUnit::Minutes)
    }

    pub const fn hours(magnitude: i64) -> Self {
        Self::new(magnitude, PrometheusDurationUnit::Hours)
    }

    pub const fn days(magnitude: i64) -> Self {
        Self::new(magnitude, PrometheusDurationUnit::Days)
    }

    pub fn to_chrono(&self) -> chrono::Duration {
        let millis = self.magnitude.saturating_mul(self.unit.seconds()).saturating_mul(1000);
        chrono::Duration::milliseconds(millis.max(-i64::MAX))
    }
}

pub fn format_duration(magnitude: i64, unit: PrometheusDurationUnit) -> String {
    format!("{}{}", magnitude, unit.letter())
}

impl fmt::Display for PrometheusDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_duration(self.magnitude, self.unit))
    }
}

impl FromStr for PrometheusDuration {
    type Err = LokiError;

    /// Reads the shorthand [fmt::Display] writes, like `30d` or `-5m`.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let invalid = || LokiError::Other(anyhow!("Not a duration like 30d, 6h, 5m or 15s: '{}'", value));
        let value = value.trim();
        let unit = match value.chars().last() {
            Some('s') => PrometheusDurationUnit::Seconds,
            Some('m') => PrometheusDurationUnit::Minutes,
            Some('h') => PrometheusDurationUnit::Hours,
            Some('d') => PrometheusDurationUnit::Days,
            _ => return Err(invalid()),
        };
        let magnitude = value[..value.len() - 1].parse::<i64>().map_err(|_| invalid())?;
        Ok(PrometheusDuration::new(magnitude, unit))
    }
}
