//! A collection of time-series bars for a specific symbol and interval.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::models::{bar::Bar, interval::Interval};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SeriesError {
    #[error("bar at {next} does not come after the last bar at {last}")]
    OutOfOrder {
        last: DateTime<Utc>,
        next: DateTime<Utc>,
    },
}

/// A discontinuity between two consecutive bars.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeriesGap {
    /// Timestamp of the last bar before the hole.
    pub after: DateTime<Utc>,
    /// Timestamp of the first bar after the hole.
    pub before: DateTime<Utc>,
    /// Whole intervals missing between the two.
    pub missing: i64,
}

/// Represents a complete set of time-series data for a single symbol.
///
/// Bars are strictly increasing by timestamp; every way of building or
/// extending a series checks this, so slices handed out by [`BarSeries::bars`]
/// and [`BarSeries::between`] can be searched without re-sorting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BarSeries {
    symbol: String,
    interval: Interval,
    bars: Vec<Bar>,
}

impl BarSeries {
    pub fn new(symbol: impl Into<String>, interval: Interval) -> Self {
        Self {
            symbol: symbol.into(),
            interval,
            bars: Vec::new(),
        }
    }

    pub fn from_bars(
        symbol: impl Into<String>,
        interval: Interval,
        bars: Vec<Bar>,
    ) -> Result<Self, SeriesError> {
        if let Some(pair) = bars
            .windows(2)
            .find(|pair| pair[1].timestamp() <= pair[0].timestamp())
        {
            return Err(SeriesError::OutOfOrder {
                last: pair[0].timestamp(),
                next: pair[1].timestamp(),
            });
        }
        Ok(Self {
            symbol: symbol.into(),
            interval,
            bars,
        })
    }

    /// Appends a bar strictly after the current last bar.
    pub fn push(&mut self, bar: Bar) -> Result<(), SeriesError> {
        if let Some(last) = self.bars.last() {
            if bar.timestamp() <= last.timestamp() {
                return Err(SeriesError::OutOfOrder {
                    last: last.timestamp(),
                    next: bar.timestamp(),
                });
            }
        }
        self.bars.push(bar);
        Ok(())
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn interval(&self) -> Interval {
        self.interval
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn first(&self) -> Option<&Bar> {
        self.bars.first()
    }

    pub fn last(&self) -> Option<&Bar> {
        self.bars.last()
    }

    pub fn into_bars(self) -> Vec<Bar> {
        self.bars
    }

    /// The contiguous run of bars with `start <= timestamp <= end`.
    pub fn between(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> &[Bar] {
        let lo = self.bars.partition_point(|b| b.timestamp() < start);
        let hi = self.bars.partition_point(|b| b.timestamp() <= end);
        if lo >= hi { &[] } else { &self.bars[lo..hi] }
    }

    /// Consecutive bars further apart than one interval.
    pub fn gaps(&self) -> Vec<SeriesGap> {
        let step = self.interval.as_millis();
        self.bars
            .windows(2)
            .filter_map(|pair| {
                let delta = pair[1].timestamp_millis() - pair[0].timestamp_millis();
                (delta > step).then(|| SeriesGap {
                    after: pair[0].timestamp(),
                    before: pair[1].timestamp(),
                    missing: delta / step - 1 + i64::from(delta % step != 0),
                })
            })
            .collect()
    }
}
