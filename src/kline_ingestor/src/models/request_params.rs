use chrono::{DateTime, Utc};

use crate::models::interval::Interval;

/// One bounded page request against a [`BarSource`](crate::providers::BarSource).
///
/// Sources should return bars with `start <= timestamp <= end`, ascending,
/// and at most `limit` of them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PageQuery {
    /// Symbol as the source spells it (e.g. `"BTCUSDT"`).
    pub symbol: String,

    pub interval: Interval,

    /// Start of the requested page (inclusive, UTC).
    pub start: DateTime<Utc>,

    /// End of the whole range being fetched (inclusive, UTC).
    pub end: DateTime<Utc>,

    /// Maximum number of bars the page may hold.
    pub limit: u32,
}

impl PageQuery {
    pub fn start_ms(&self) -> i64 {
        self.start.timestamp_millis()
    }

    pub fn end_ms(&self) -> i64 {
        self.end.timestamp_millis()
    }
}

/// A full `[start, end]` range to reconstruct from pages of `page_limit` bars.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RangeRequest {
    pub symbol: String,
    pub interval: Interval,
    /// Inclusive, UTC.
    pub start: DateTime<Utc>,
    /// Inclusive, UTC.
    pub end: DateTime<Utc>,
    pub page_limit: u32,
}

impl RangeRequest {
    /// The page query that starts at `cursor`.
    pub fn page_at(&self, cursor: DateTime<Utc>) -> PageQuery {
        PageQuery {
            symbol: self.symbol.clone(),
            interval: self.interval,
            start: cursor,
            end: self.end,
            limit: self.page_limit,
        }
    }
}
