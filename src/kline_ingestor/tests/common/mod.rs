#![allow(dead_code)]

use std::{
    collections::VecDeque,
    str::FromStr,
    sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration as StdDuration,
};

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use kline_ingestor::{
    models::{bar::Bar, interval::Interval, request_params::PageQuery},
    providers::{BarSource, MalformedSnafu, RateLimitedSnafu, SourceError, UnavailableSnafu},
};
use rust_decimal::Decimal;

pub fn d(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap()
}

pub fn thirty_minutes() -> Interval {
    Interval::minutes(30).unwrap()
}

/// A flat bar whose price encodes its index, so mix-ups are visible.
pub fn bar_at(ts: DateTime<Utc>, i: i64) -> Bar {
    let p = Decimal::from(100 + i);
    Bar::new(ts, p, p + Decimal::ONE, p - Decimal::ONE, p, Decimal::ONE).unwrap()
}

/// `n` consecutive bars one `interval` apart starting at `start`.
pub fn ladder(start: DateTime<Utc>, interval: Interval, n: usize) -> Vec<Bar> {
    let step = interval.duration();
    (0..n as i64)
        .map(|i| bar_at(start + step * i as i32, i))
        .collect()
}

/// Serves pages out of a fixed history, the way a well-behaved exchange would.
///
/// `overlap` re-sends that many bars from before `query.start`, which a
/// lenient source might do when it rounds the cursor down.
pub struct HistorySource {
    bars: Vec<Bar>,
    overlap: usize,
    calls: AtomicUsize,
}

impl HistorySource {
    pub fn new(bars: Vec<Bar>) -> Self {
        Self::with_overlap(bars, 0)
    }

    pub fn with_overlap(bars: Vec<Bar>, overlap: usize) -> Self {
        Self {
            bars,
            overlap,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BarSource for HistorySource {
    async fn query(&self, query: &PageQuery) -> Result<Vec<Bar>, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let first = self
            .bars
            .partition_point(|b| b.timestamp() < query.start)
            .saturating_sub(self.overlap);
        Ok(self.bars[first..]
            .iter()
            .filter(|b| b.timestamp() <= query.end)
            .take(query.limit as usize)
            .cloned()
            .collect())
    }
}

/// One scripted answer.
pub enum Step {
    Page(Vec<Bar>),
    RateLimited(Option<StdDuration>),
    Unavailable,
    Malformed,
}

/// Answers each call with the next scripted step; an empty script yields empty pages.
pub struct ScriptedSource {
    steps: Mutex<VecDeque<Step>>,
    queries: Mutex<Vec<PageQuery>>,
}

impl ScriptedSource {
    pub fn new(steps: Vec<Step>) -> Self {
        Self {
            steps: Mutex::new(steps.into()),
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn queries(&self) -> Vec<PageQuery> {
        self.queries.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.queries.lock().unwrap().len()
    }
}

#[async_trait]
impl BarSource for ScriptedSource {
    async fn query(&self, query: &PageQuery) -> Result<Vec<Bar>, SourceError> {
        self.queries.lock().unwrap().push(query.clone());
        let step = self.steps.lock().unwrap().pop_front();
        match step {
            None => Ok(Vec::new()),
            Some(Step::Page(bars)) => Ok(bars),
            Some(Step::RateLimited(retry_after)) => RateLimitedSnafu { retry_after }.fail(),
            Some(Step::Unavailable) => UnavailableSnafu {
                message: "HTTP 503 Service Unavailable",
            }
            .fail(),
            Some(Step::Malformed) => MalformedSnafu {
                message: "row 0 has 3 columns",
            }
            .fail(),
        }
    }
}

pub fn minutes(m: i64) -> Duration {
    Duration::minutes(m)
}
