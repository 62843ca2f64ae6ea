//! Reference-timezone helpers.
//!
//! What this module provides:
//! - [`parse_tz`]: Parse an IANA zone name (e.g. "America/New_York") into a [`Tz`].
//! - [`to_utc`]: Convert a naive local timestamp in a zone to UTC, with a [`DstPolicy`]
//!   deciding what happens in DST gaps (spring-forward) and ambiguities (fall-back).
//! - [`local_date`]: Project a UTC instant into a zone and truncate to the calendar date.
//! - [`to_local`]: Project a UTC instant into a zone as a naive wall-clock timestamp.
//!
//! Notes:
//! - Ambiguous local times happen during “fall back” when a wall time occurs twice.
//! - Nonexistent local times happen during “spring forward” when a wall time is skipped.
//! - All stored instants are UTC. Local times only exist at the edges: configuration,
//!   session boundaries and tabular output.
//!
//! Examples
//! - New York winter: 2024-01-15 09:30 local -> 14:30Z
//! - New York “fall back” ambiguity (2024-11-03 01:30 occurs twice):
//!   earliest -> 05:30Z, latest -> 06:30Z.

use chrono::{DateTime, Duration, LocalResult, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use thiserror::Error;

/// Upper bound for [`GapPolicy::ShiftForward`]; no zone skips more than this.
const MAX_GAP_SHIFT_MINUTES: u32 = 120;

/// Errors raised while mapping local wall-clock times to UTC.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TzError {
    /// The zone name is not in the IANA database.
    #[error("unknown time zone: {0}")]
    UnknownZone(String),

    /// The wall time occurs twice and the policy refused to pick one.
    #[error("ambiguous local time {local} in {tz}")]
    Ambiguous { local: NaiveDateTime, tz: Tz },

    /// The wall time is skipped by a DST transition.
    #[error("nonexistent local time {local} in {tz}")]
    Nonexistent { local: NaiveDateTime, tz: Tz },
}

/// How to resolve a wall time that maps to two instants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AmbiguityPolicy {
    /// Error out.
    Reject,
    /// Pick the earlier instant (typically the DST occurrence).
    Earliest,
    /// Pick the later instant (typically the standard-time occurrence).
    Latest,
}

/// How to resolve a wall time skipped by a spring-forward transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GapPolicy {
    /// Error out.
    Reject,
    /// Step forward one minute at a time until a valid instant is found.
    ShiftForward,
}

/// Policy for handling DST edge cases when converting local naive timestamps to UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DstPolicy {
    pub ambiguous: AmbiguityPolicy,
    pub gap: GapPolicy,
}

impl DstPolicy {
    /// Error on every DST edge case.
    pub const STRICT: Self = Self {
        ambiguous: AmbiguityPolicy::Reject,
        gap: GapPolicy::Reject,
    };

    /// Resolve towards the earliest valid instant; used for the opening edge of a window.
    pub const OPENING: Self = Self {
        ambiguous: AmbiguityPolicy::Earliest,
        gap: GapPolicy::ShiftForward,
    };

    /// Resolve towards the latest valid instant; used for the closing edge of a window.
    pub const CLOSING: Self = Self {
        ambiguous: AmbiguityPolicy::Latest,
        gap: GapPolicy::ShiftForward,
    };
}

/// Parse an IANA time zone name.
pub fn parse_tz(name: &str) -> Result<Tz, TzError> {
    name.trim()
        .parse::<Tz>()
        .map_err(|_| TzError::UnknownZone(name.to_string()))
}

/// Convert a naive local timestamp to UTC using a specific zone and DST policy.
///
/// Behavior:
/// - If the local time maps to a single instant, that instant is returned.
/// - If the local time is ambiguous, `policy.ambiguous` picks a side or errors.
/// - If the local time is nonexistent, `policy.gap` either steps forward
///   minute-by-minute (max 2 hours) or errors.
pub fn to_utc(naive: NaiveDateTime, tz: Tz, policy: DstPolicy) -> Result<DateTime<Utc>, TzError> {
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => Ok(dt.with_timezone(&Utc)),
        LocalResult::Ambiguous(earliest, latest) => match policy.ambiguous {
            AmbiguityPolicy::Earliest => Ok(earliest.with_timezone(&Utc)),
            AmbiguityPolicy::Latest => Ok(latest.with_timezone(&Utc)),
            AmbiguityPolicy::Reject => Err(TzError::Ambiguous { local: naive, tz }),
        },
        LocalResult::None => match policy.gap {
            GapPolicy::ShiftForward => {
                let mut t = naive;
                for _ in 0..MAX_GAP_SHIFT_MINUTES {
                    t += Duration::minutes(1);
                    if let LocalResult::Single(dt) = tz.from_local_datetime(&t) {
                        return Ok(dt.with_timezone(&Utc));
                    }
                }
                Err(TzError::Nonexistent { local: naive, tz })
            }
            GapPolicy::Reject => Err(TzError::Nonexistent { local: naive, tz }),
        },
    }
}

/// Every UTC instant a local wall time can denote, earliest first.
///
/// Empty for wall times inside a spring-forward gap.
pub fn candidates(naive: NaiveDateTime, tz: Tz) -> Vec<DateTime<Utc>> {
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => vec![dt.with_timezone(&Utc)],
        LocalResult::Ambiguous(a, b) => vec![a.with_timezone(&Utc), b.with_timezone(&Utc)],
        LocalResult::None => Vec::new(),
    }
}

/// Wall-clock reading of `ts` in `tz`.
pub fn to_local(ts: DateTime<Utc>, tz: Tz) -> NaiveDateTime {
    ts.with_timezone(&tz).naive_local()
}

/// Calendar date of `ts` in `tz`.
pub fn local_date(ts: DateTime<Utc>, tz: Tz) -> NaiveDate {
    to_local(ts, tz).date()
}
