//! Delimited-text output and the matching reader.
//!
//! Layout: a `Date,Open,High,Low,Close,Volume` header, then one row per
//! record. Dates are local wall time in the reference timezone
//! (`DD/MM/YYYY` for session days, `DD/MM/YYYY HH:MM:SS` for bars) and every
//! number is written with its exact decimal digits.

use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use chrono_tz::Tz;
use rust_decimal::Decimal;
use shared_utils::tz::candidates;
use snafu::ResultExt;
use thiserror::Error;
use tracing::debug;

use crate::{
    io::{
        row::OhlcvRow,
        sink::{CsvSnafu, DataSink, IoSnafu, JoinSnafu, SinkError},
    },
    models::{
        bar::{Bar, BarError},
        bar_series::{BarSeries, SeriesError},
        interval::Interval,
    },
};

pub const HEADER: [&str; 6] = ["Date", "Open", "High", "Low", "Close", "Volume"];
const BAR_DATETIME: &str = "%d/%m/%Y %H:%M:%S";

/// Writes rows to a CSV file, replacing whatever was there.
#[derive(Debug, Clone)]
pub struct CsvSink {
    path: PathBuf,
}

impl CsvSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_sync(&self, rows: &[OhlcvRow]) -> Result<usize, SinkError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).context(IoSnafu {
                path: parent.display().to_string(),
            })?;
        }

        let mut writer = csv::Writer::from_path(&self.path).context(CsvSnafu)?;
        writer.write_record(HEADER).context(CsvSnafu)?;
        for row in rows {
            writer
                .write_record([
                    row.stamp.tabular(),
                    row.open.to_string(),
                    row.high.to_string(),
                    row.low.to_string(),
                    row.close.to_string(),
                    row.volume.to_string(),
                ])
                .context(CsvSnafu)?;
        }
        writer.flush().context(IoSnafu {
            path: self.path.display().to_string(),
        })?;

        debug!(path = %self.path.display(), rows = rows.len(), "csv written");
        Ok(rows.len())
    }
}

#[async_trait]
impl DataSink for CsvSink {
    async fn write(&self, rows: &[OhlcvRow]) -> Result<usize, SinkError> {
        let sink = self.clone();
        let rows = rows.to_vec();
        tokio::task::spawn_blocking(move || sink.write_sync(&rows))
            .await
            .context(JoinSnafu)?
    }
}

#[derive(Debug, Error)]
pub enum ReadError {
    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error("unexpected header {found:?}, expected {expected:?}")]
    Header { found: Vec<String>, expected: Vec<String> },

    #[error("line {line}: expected 6 columns, found {found}")]
    Columns { line: u64, found: usize },

    #[error("line {line}: cannot parse date {value:?}")]
    Date { line: u64, value: String },

    #[error("line {line}: local time {local} does not exist in {tz}")]
    Nonexistent { line: u64, local: NaiveDateTime, tz: Tz },

    #[error("line {line}: {column} {value:?} is not a decimal")]
    Decimal {
        line: u64,
        column: &'static str,
        value: String,
    },

    #[error("line {line}: {source}")]
    Bar {
        line: u64,
        #[source]
        source: BarError,
    },

    #[error("line {line}: {source}")]
    Order {
        line: u64,
        #[source]
        source: SeriesError,
    },
}

/// Reads a bar file written by [`CsvSink`] back into a [`BarSeries`].
///
/// Dates are local wall times in `tz`. A wall time that occurs twice (the
/// fall-back hour) resolves to the earliest instant after the previous bar, so
/// both passes through the repeated hour come back as distinct instants.
pub fn read_bars(
    path: impl AsRef<Path>,
    symbol: &str,
    interval: Interval,
    tz: Tz,
) -> Result<BarSeries, ReadError> {
    let mut reader = csv::Reader::from_path(path.as_ref())?;

    let found: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    if found != HEADER {
        return Err(ReadError::Header {
            found,
            expected: HEADER.iter().map(|h| h.to_string()).collect(),
        });
    }

    let mut series = BarSeries::new(symbol, interval);
    for record in reader.records() {
        let record = record?;
        let line = record.position().map_or(0, |p| p.line());
        if record.len() != HEADER.len() {
            return Err(ReadError::Columns {
                line,
                found: record.len(),
            });
        }

        let local = NaiveDateTime::parse_from_str(&record[0], BAR_DATETIME).map_err(|_| {
            ReadError::Date {
                line,
                value: record[0].to_string(),
            }
        })?;
        let previous = series.last().map(Bar::timestamp);
        let timestamp = resolve(local, tz, previous).ok_or(ReadError::Nonexistent {
            line,
            local,
            tz,
        })?;

        let mut values = [Decimal::ZERO; 5];
        for (slot, column) in values.iter_mut().zip(1..HEADER.len()) {
            *slot = Decimal::from_str(&record[column]).map_err(|_| ReadError::Decimal {
                line,
                column: HEADER[column],
                value: record[column].to_string(),
            })?;
        }
        let [open, high, low, close, volume] = values;

        let bar = Bar::new(timestamp, open, high, low, close, volume)
            .map_err(|source| ReadError::Bar { line, source })?;
        series
            .push(bar)
            .map_err(|source| ReadError::Order { line, source })?;
    }

    debug!(path = %path.as_ref().display(), bars = series.len(), "bars read");
    Ok(series)
}

fn resolve(local: NaiveDateTime, tz: Tz, previous: Option<DateTime<Utc>>) -> Option<DateTime<Utc>> {
    let options = candidates(local, tz);
    match previous {
        Some(prev) => options
            .iter()
            .copied()
            .find(|ts| *ts > prev)
            .or_else(|| options.first().copied()),
        None => options.first().copied(),
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, TimeZone};
    use chrono_tz::America::New_York;

    use super::*;

    fn local(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 11, 3)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    #[test]
    fn repeated_wall_time_moves_past_previous_bar() {
        let first = Utc.with_ymd_and_hms(2024, 11, 3, 5, 30, 0).unwrap();
        let second = Utc.with_ymd_and_hms(2024, 11, 3, 6, 30, 0).unwrap();

        assert_eq!(resolve(local(1, 30), New_York, None), Some(first));
        assert_eq!(resolve(local(1, 30), New_York, Some(first)), Some(second));
    }

    #[test]
    fn skipped_wall_time_is_unresolvable() {
        let gap = NaiveDate::from_ymd_opt(2024, 3, 10)
            .unwrap()
            .and_hms_opt(2, 30, 0)
            .unwrap();
        assert_eq!(resolve(gap, New_York, None), None);
    }
}
