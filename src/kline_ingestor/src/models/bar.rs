//! Canonical in-memory representation of a time-series bar (OHLCV).
//!
//! This struct is the standard output for every [`BarSource`](crate::providers::BarSource)
//! implementation. Prices and volume are [`Decimal`]s so that nothing downstream
//! ever sums floats.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use thiserror::Error;

/// A bar whose fields break the OHLCV relations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BarError {
    #[error("high {high} is below max(open, close) = {body_high} at {timestamp}")]
    HighBelowBody {
        timestamp: DateTime<Utc>,
        high: Decimal,
        body_high: Decimal,
    },

    #[error("low {low} is above min(open, close) = {body_low} at {timestamp}")]
    LowAboveBody {
        timestamp: DateTime<Utc>,
        low: Decimal,
        body_low: Decimal,
    },

    #[error("negative volume {volume} at {timestamp}")]
    NegativeVolume {
        timestamp: DateTime<Utc>,
        volume: Decimal,
    },

    #[error("timestamp {timestamp} is finer than millisecond precision")]
    SubMillisecond { timestamp: DateTime<Utc> },
}

/// A single time-series bar (OHLCV) for a given timestamp.
///
/// Construction goes through [`Bar::new`], which enforces
/// `high >= max(open, close) >= min(open, close) >= low` and `volume >= 0`.
/// Fields are read-only afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bar {
    timestamp: DateTime<Utc>,
    open: Decimal,
    high: Decimal,
    low: Decimal,
    close: Decimal,
    volume: Decimal,
}

impl Bar {
    pub fn new(
        timestamp: DateTime<Utc>,
        open: Decimal,
        high: Decimal,
        low: Decimal,
        close: Decimal,
        volume: Decimal,
    ) -> Result<Self, BarError> {
        if timestamp.timestamp_subsec_nanos() % 1_000_000 != 0 {
            return Err(BarError::SubMillisecond { timestamp });
        }
        let body_high = open.max(close);
        let body_low = open.min(close);
        if high < body_high {
            return Err(BarError::HighBelowBody {
                timestamp,
                high,
                body_high,
            });
        }
        if low > body_low {
            return Err(BarError::LowAboveBody {
                timestamp,
                low,
                body_low,
            });
        }
        if volume < Decimal::ZERO {
            return Err(BarError::NegativeVolume { timestamp, volume });
        }

        Ok(Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        })
    }

    /// Opening instant of the bar interval (UTC).
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn timestamp_millis(&self) -> i64 {
        self.timestamp.timestamp_millis()
    }

    pub fn open(&self) -> Decimal {
        self.open
    }

    pub fn high(&self) -> Decimal {
        self.high
    }

    pub fn low(&self) -> Decimal {
        self.low
    }

    pub fn close(&self) -> Decimal {
        self.close
    }

    pub fn volume(&self) -> Decimal {
        self.volume
    }
}
