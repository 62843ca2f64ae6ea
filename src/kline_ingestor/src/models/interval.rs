//! Fixed-length bar intervals.
//!
//! An [`Interval`] pairs a non-zero amount with an [`IntervalUnit`] and is written
//! in the compact notation exchanges use for kline intervals (`1s`, `30m`, `4h`,
//! `1d`, `1w`). Calendar months (`1M`) are rejected: pagination advances the
//! cursor by an exact number of milliseconds, which a month does not have.
//!
//! ```
//! use kline_ingestor::models::interval::{Interval, IntervalUnit};
//!
//! let iv: Interval = "30m".parse().unwrap();
//! assert_eq!(iv.unit(), IntervalUnit::Minute);
//! assert_eq!(iv.as_millis(), 30 * 60 * 1000);
//! assert_eq!(iv.to_string(), "30m");
//! ```

use std::{fmt, num::NonZeroU32, str::FromStr};

use chrono::Duration;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IntervalError {
    #[error("Invalid amount for {unit:?}: {message}")]
    InvalidAmount { unit: IntervalUnit, message: String },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntervalUnit {
    Second,
    Minute,
    Hour,
    Day,
    /// Seven days, no calendar alignment implied.
    Week,
}

impl IntervalUnit {
    const fn millis(self) -> i64 {
        match self {
            IntervalUnit::Second => 1_000,
            IntervalUnit::Minute => 60 * 1_000,
            IntervalUnit::Hour => 60 * 60 * 1_000,
            IntervalUnit::Day => 24 * 60 * 60 * 1_000,
            IntervalUnit::Week => 7 * 24 * 60 * 60 * 1_000,
        }
    }

    const fn suffix(self) -> char {
        match self {
            IntervalUnit::Second => 's',
            IntervalUnit::Minute => 'm',
            IntervalUnit::Hour => 'h',
            IntervalUnit::Day => 'd',
            IntervalUnit::Week => 'w',
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Interval {
    amount: NonZeroU32,
    unit: IntervalUnit,
}

impl Interval {
    pub fn new(amount: u32, unit: IntervalUnit) -> Result<Self, IntervalError> {
        let amount = NonZeroU32::new(amount).ok_or_else(|| IntervalError::InvalidAmount {
            unit,
            message: "amount must be at least 1".into(),
        })?;
        Ok(Self { amount, unit })
    }

    pub fn minutes(amount: u32) -> Result<Self, IntervalError> {
        Self::new(amount, IntervalUnit::Minute)
    }

    pub fn hours(amount: u32) -> Result<Self, IntervalError> {
        Self::new(amount, IntervalUnit::Hour)
    }

    pub fn days(amount: u32) -> Result<Self, IntervalError> {
        Self::new(amount, IntervalUnit::Day)
    }

    pub const fn amount(&self) -> NonZeroU32 {
        self.amount
    }

    pub const fn unit(&self) -> IntervalUnit {
        self.unit
    }

    /// Exact length in milliseconds.
    pub const fn as_millis(&self) -> i64 {
        self.amount.get() as i64 * self.unit.millis()
    }

    pub fn duration(&self) -> Duration {
        Duration::milliseconds(self.as_millis())
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.amount, self.unit.suffix())
    }
}

impl FromStr for Interval {
    type Err = IntervalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let split = s
            .find(|c: char| !c.is_ascii_digit())
            .ok_or_else(|| IntervalError::InvalidInput {
                message: format!("missing unit in interval {s:?}"),
            })?;
        let (digits, suffix) = s.split_at(split);
        let amount: u32 = digits.parse().map_err(|_| IntervalError::InvalidInput {
            message: format!("missing or oversized amount in interval {s:?}"),
        })?;
        // Case matters: `m` is minutes, `M` is the unsupported calendar month.
        let unit = match suffix {
            "s" => IntervalUnit::Second,
            "m" => IntervalUnit::Minute,
            "h" => IntervalUnit::Hour,
            "d" => IntervalUnit::Day,
            "w" => IntervalUnit::Week,
            "M" => {
                return Err(IntervalError::InvalidInput {
                    message: "calendar-month intervals have no fixed length".into(),
                });
            }
            other => {
                return Err(IntervalError::InvalidInput {
                    message: format!("unknown interval unit {other:?}"),
                });
            }
        };
        Self::new(amount, unit)
    }
}

impl TryFrom<String> for Interval {
    type Error = IntervalError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Interval> for String {
    fn from(value: Interval) -> Self {
        value.to_string()
    }
}
