//! Per-day session windows.
//!
//! A [`SessionCalendar`] knows the session's wall-clock bounds and the
//! reference timezone. [`SessionCalendar::sessions`] walks an ordered
//! [`BarSeries`] and yields one [`SessionWindow`] for every distinct local date
//! among its bars, oldest first. Dates without bars never appear.
//!
//! DST handling (see [`DstPolicy::OPENING`] / [`DstPolicy::CLOSING`]):
//! - a bound inside a spring-forward gap moves to the first valid local instant;
//! - an ambiguous start takes the earlier instant, an ambiguous end the later one,
//!   so a window is never shortened by a fall-back hour.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use chrono_tz::Tz;
use kline_ingestor::models::{bar::Bar, bar_series::BarSeries};
use shared_utils::tz::{DstPolicy, TzError, local_date, to_utc};
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CalendarError {
    #[error("session start {start} must be before session end {end}")]
    EmptySession { start: NaiveTime, end: NaiveTime },

    #[error(transparent)]
    Tz(#[from] TzError),
}

/// `[start, end]` of one session, both inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionWindow {
    pub date: NaiveDate,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionCalendar {
    start_time: NaiveTime,
    end_time: NaiveTime,
    tz: Tz,
}

impl SessionCalendar {
    /// Same-day sessions only: `start_time` must be strictly before `end_time`.
    pub fn new(start_time: NaiveTime, end_time: NaiveTime, tz: Tz) -> Result<Self, CalendarError> {
        if start_time >= end_time {
            return Err(CalendarError::EmptySession {
                start: start_time,
                end: end_time,
            });
        }
        Ok(Self {
            start_time,
            end_time,
            tz,
        })
    }

    pub fn start_time(&self) -> NaiveTime {
        self.start_time
    }

    pub fn end_time(&self) -> NaiveTime {
        self.end_time
    }

    pub fn tz(&self) -> Tz {
        self.tz
    }

    /// The session window for a local `date`.
    pub fn window(&self, date: NaiveDate) -> Result<SessionWindow, CalendarError> {
        let start = to_utc(date.and_time(self.start_time), self.tz, DstPolicy::OPENING)?;
        let end = to_utc(date.and_time(self.end_time), self.tz, DstPolicy::CLOSING)?;
        Ok(SessionWindow { date, start, end })
    }

    /// Lazily yields the windows of every local date present in `series`.
    ///
    /// Calling it again restarts from the first bar.
    pub fn sessions<'a>(&self, series: &'a BarSeries) -> Sessions<'a> {
        Sessions {
            calendar: *self,
            bars: series.bars().iter(),
            last: None,
        }
    }
}

/// Shorthand for building a calendar and walking `series` in one go.
pub fn enumerate_sessions(
    series: &BarSeries,
    start_time: NaiveTime,
    end_time: NaiveTime,
    tz: Tz,
) -> Result<Sessions<'_>, CalendarError> {
    Ok(SessionCalendar::new(start_time, end_time, tz)?.sessions(series))
}

/// Iterator returned by [`SessionCalendar::sessions`].
#[derive(Debug, Clone)]
pub struct Sessions<'a> {
    calendar: SessionCalendar,
    bars: std::slice::Iter<'a, Bar>,
    last: Option<NaiveDate>,
}

impl Iterator for Sessions<'_> {
    type Item = SessionWindow;

    fn next(&mut self) -> Option<SessionWindow> {
        let tz = self.calendar.tz;
        for bar in self.bars.by_ref() {
            let date = local_date(bar.timestamp(), tz);
            // Bars are ascending, so local dates are non-decreasing.
            if self.last.is_some_and(|last| date <= last) {
                continue;
            }
            self.last = Some(date);
            match self.calendar.window(date) {
                Ok(window) => return Some(window),
                Err(err) => warn!(%date, error = %err, "no session window for date"),
            }
        }
        None
    }
}
