//! Inactivity threshold configuration.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Months, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors returned when parsing an inactivity threshold.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InactivityThresholdParseError {
    #[error("inactivity threshold cannot be empty")]
    Empty,
    #[error("inactivity threshold '{0}' must use one of the units mo, w, d, h (e.g. 1mo, 30d)")]
    UnknownUnit(String),
    #[error("inactivity threshold '{0}' must start with a positive integer")]
    InvalidAmount(String),
}

/// How long a channel must stay quiet before it becomes an archival candidate.
///
/// Month thresholds are calendar months, so `1mo` from March 31 lands on the
/// last day of February.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "unit", content = "amount", rename_all = "snake_case")]
pub enum InactivityThreshold {
    Months(u32),
    Weeks(u32),
    Days(u32),
    Hours(u32),
}

impl Default for InactivityThreshold {
    fn default() -> Self {
        Self::Months(1)
    }
}

impl InactivityThreshold {
    /// Returns the instant `threshold` before `now`, or `None` when it
    /// underflows the representable range.
    pub fn cutoff(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match *self {
            Self::Months(amount) => now.checked_sub_months(Months::new(amount)),
            Self::Weeks(amount) => {
                now.checked_sub_signed(TimeDelta::try_weeks(i64::from(amount))?)
            }
            Self::Days(amount) => now.checked_sub_signed(TimeDelta::try_days(i64::from(amount))?),
            Self::Hours(amount) => {
                now.checked_sub_signed(TimeDelta::try_hours(i64::from(amount))?)
            }
        }
    }

    /// Human-readable form for notices, e.g. `1 month` or `30 days`.
    pub fn describe(&self) -> String {
        let (amount, unit) = match *self {
            Self::Months(amount) => (amount, "month"),
            Self::Weeks(amount) => (amount, "week"),
            Self::Days(amount) => (amount, "day"),
            Self::Hours(amount) => (amount, "hour"),
        };
        if amount == 1 {
            format!("1 {unit}")
        } else {
            format!("{amount} {unit}s")
        }
    }
}

impl fmt::Display for InactivityThreshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Months(amount) => write!(f, "{amount}mo"),
            Self::Weeks(amount) => write!(f, "{amount}w"),
            Self::Days(amount) => write!(f, "{amount}d"),
            Self::Hours(amount) => write!(f, "{amount}h"),
        }
    }
}

impl FromStr for InactivityThreshold {
    type Err = InactivityThresholdParseError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let normalized = raw.trim().to_ascii_lowercase();
        if normalized.is_empty() {
            return Err(InactivityThresholdParseError::Empty);
        }
        let split_at = normalized
            .find(|ch: char| !ch.is_ascii_digit())
            .ok_or_else(|| InactivityThresholdParseError::UnknownUnit(raw.trim().to_string()))?;
        let (amount_raw, unit) = normalized.split_at(split_at);
        let amount = amount_raw
            .parse::<u32>()
            .ok()
            .filter(|amount| *amount > 0)
            .ok_or_else(|| InactivityThresholdParseError::InvalidAmount(raw.trim().to_string()))?;
        match unit.trim() {
            "mo" | "month" | "months" => Ok(Self::Months(amount)),
            "w" | "week" | "weeks" => Ok(Self::Weeks(amount)),
            "d" | "day" | "days" => Ok(Self::Days(amount)),
            "h" | "hour" | "hours" => Ok(Self::Hours(amount)),
            _ => Err(InactivityThresholdParseError::UnknownUnit(
                raw.trim().to_string(),
            )),
        }
    }
}
