#![allow(dead_code)]

use std::{
    str::FromStr,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use kline_ingestor::{
    io::{DataSink, OhlcvRow, SinkError},
    models::{bar::Bar, request_params::PageQuery},
    providers::{BarSource, SourceError, UnavailableSnafu},
};
use rust_decimal::Decimal;

pub fn d(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

pub fn bar(ts: DateTime<Utc>, o: &str, h: &str, l: &str, c: &str, v: &str) -> Bar {
    Bar::new(ts, d(o), d(h), d(l), d(c), d(v)).unwrap()
}

/// `count` flat 30-minute bars from `start`, price 100, volume 1.
pub fn half_hours(start: DateTime<Utc>, count: i64) -> Vec<Bar> {
    (0..count)
        .map(|i| bar(start + Duration::minutes(30 * i), "100", "100", "100", "100", "1"))
        .collect()
}

pub fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
}

/// Serves bars out of a fixed history and remembers every query.
pub struct HistorySource {
    bars: Vec<Bar>,
    queries: Mutex<Vec<PageQuery>>,
    fail: bool,
}

impl HistorySource {
    pub fn new(bars: Vec<Bar>) -> Self {
        Self {
            bars,
            queries: Mutex::new(Vec::new()),
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new(Vec::new())
        }
    }

    pub fn queries(&self) -> Vec<PageQuery> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl BarSource for HistorySource {
    async fn query(&self, query: &PageQuery) -> Result<Vec<Bar>, SourceError> {
        self.queries.lock().unwrap().push(query.clone());
        if self.fail {
            return UnavailableSnafu {
                message: "connection reset",
            }
            .fail();
        }
        Ok(self
            .bars
            .iter()
            .filter(|b| b.timestamp() >= query.start && b.timestamp() <= query.end)
            .take(query.limit as usize)
            .cloned()
            .collect())
    }
}

/// Collects written rows; clones share the same buffer.
#[derive(Clone, Default)]
pub struct MemorySink {
    rows: Arc<Mutex<Vec<OhlcvRow>>>,
    writes: Arc<AtomicUsize>,
}

impl MemorySink {
    pub fn rows(&self) -> Vec<OhlcvRow> {
        self.rows.lock().unwrap().clone()
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DataSink for MemorySink {
    async fn write(&self, rows: &[OhlcvRow]) -> Result<usize, SinkError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.rows.lock().unwrap().extend_from_slice(rows);
        Ok(rows.len())
    }
}
