//! Pipeline driver: fetch, persist, aggregate, persist.
//!
//! The driver holds no aggregation logic. It resolves the UTC range to fetch,
//! hands the raw series to the raw sinks, runs [`aggregate_all`] and hands the
//! daily bars to the daily sinks. Fetch errors abort before anything is
//! written, and an empty series leaves existing outputs untouched.

use std::path::Path;

use chrono::{DateTime, Days, NaiveDateTime, Utc};
use chrono_tz::Tz;
use kline_ingestor::{
    fetch::{Coverage, FetchError, RangeFetcher, RequestPacer},
    io::{CsvSink, DataSink, OhlcvRow, ReadError, SinkError, SqliteSink, read_bars, rows},
    models::{
        bar_series::{BarSeries, SeriesGap},
        interval::Interval,
        request_params::RangeRequest,
    },
    providers::BarSource,
};
use shared_utils::tz::{DstPolicy, TzError, local_date, to_utc};
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::{
    aggregate::aggregate_all,
    calendar::{CalendarError, SessionCalendar},
    config::Config,
    daily_bar::DailyBar,
};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("start {start} is after end {end}; nothing to fetch")]
    InvalidRange {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    #[error(transparent)]
    Calendar(#[from] CalendarError),

    #[error(transparent)]
    Tz(#[from] TzError),

    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("sink failed: {0}")]
    Sink(#[from] SinkError),

    #[error("cannot read raw bars: {0}")]
    Read(#[from] ReadError),
}

/// What one run produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub bars: usize,
    pub daily_bars: usize,
    pub gaps: Vec<SeriesGap>,
    pub coverage: Coverage,
    pub requests: usize,
}

pub struct Pipeline<S> {
    fetcher: RangeFetcher<S>,
    symbol: String,
    interval: Interval,
    page_limit: u32,
    start_local: NaiveDateTime,
    calendar: SessionCalendar,
    raw_sinks: Vec<Box<dyn DataSink>>,
    daily_sinks: Vec<Box<dyn DataSink>>,
}

impl<S: BarSource> Pipeline<S> {
    /// Builds the pipeline and every sink named in `config.output`.
    pub fn new(config: &Config, source: S) -> Result<Self, PipelineError> {
        let calendar = SessionCalendar::new(config.session_start, config.session_end, config.tz)?;
        let fetcher = RangeFetcher::new(
            source,
            RequestPacer::new(config.min_request_interval),
            config.retry.clone(),
        );

        let mut pipeline = Self {
            fetcher,
            symbol: config.symbol.clone(),
            interval: config.interval,
            page_limit: config.page_limit,
            start_local: config.start_date,
            calendar,
            raw_sinks: Vec::new(),
            daily_sinks: Vec::new(),
        };

        let output = &config.output;
        if let Some(path) = &output.raw_csv {
            pipeline = pipeline.with_raw_sink(CsvSink::new(path));
        }
        if let Some(path) = &output.daily_csv {
            pipeline = pipeline.with_daily_sink(CsvSink::new(path));
        }
        if let Some(sqlite) = &output.sqlite {
            if let Some(table) = &sqlite.raw_table {
                pipeline = pipeline.with_raw_sink(SqliteSink::bars(
                    &sqlite.database_url,
                    table,
                    sqlite.mode,
                )?);
            }
            pipeline = pipeline.with_daily_sink(SqliteSink::new(
                &sqlite.database_url,
                &sqlite.daily_table,
                sqlite.mode,
            )?);
        }
        Ok(pipeline)
    }

    pub fn with_raw_sink(mut self, sink: impl DataSink + 'static) -> Self {
        self.raw_sinks.push(Box::new(sink));
        self
    }

    pub fn with_daily_sink(mut self, sink: impl DataSink + 'static) -> Self {
        self.daily_sinks.push(Box::new(sink));
        self
    }

    pub fn calendar(&self) -> &SessionCalendar {
        &self.calendar
    }

    pub fn tz(&self) -> Tz {
        self.calendar.tz()
    }

    /// The range a run at `now` fetches.
    ///
    /// `start` is the configured start in the reference timezone; `end` is the
    /// session close of the local day before `now`.
    pub fn resolve_range(&self, now: DateTime<Utc>) -> Result<RangeRequest, PipelineError> {
        let tz = self.tz();
        let start = to_utc(self.start_local, tz, DstPolicy::OPENING)?;

        let today = local_date(now, tz);
        let yesterday = today.checked_sub_days(Days::new(1)).unwrap_or(today);
        let end = to_utc(
            yesterday.and_time(self.calendar.end_time()),
            tz,
            DstPolicy::CLOSING,
        )?;

        if start > end {
            return Err(PipelineError::InvalidRange { start, end });
        }
        Ok(RangeRequest {
            symbol: self.symbol.clone(),
            interval: self.interval,
            start,
            end,
            page_limit: self.page_limit,
        })
    }

    /// Fetches, persists and aggregates everything up to yesterday's close.
    #[instrument(skip(self), fields(symbol = %self.symbol))]
    pub async fn run(&self, now: DateTime<Utc>) -> Result<RunReport, PipelineError> {
        let request = self.resolve_range(now)?;
        info!(start = %request.start, end = %request.end, "fetching range");

        let outcome = self.fetcher.fetch_range(&request).await?;
        if let Coverage::Exhausted { covered_until } = &outcome.coverage {
            warn!(
                covered_until = ?covered_until,
                end = %request.end,
                "source ran out early; aggregating the partial series"
            );
        }

        let daily = if outcome.series.is_empty() {
            warn!(end = %request.end, "no bars fetched; leaving outputs as they are");
            Vec::new()
        } else {
            if !self.raw_sinks.is_empty() {
                let raw = rows(outcome.series.bars(), self.tz());
                write_all(&self.raw_sinks, &raw).await?;
            }
            self.aggregate_and_write(&outcome.series).await?
        };

        let report = RunReport {
            bars: outcome.series.len(),
            daily_bars: daily.len(),
            gaps: outcome.gaps,
            coverage: outcome.coverage,
            requests: outcome.requests,
        };
        info!(
            bars = report.bars,
            daily_bars = report.daily_bars,
            gaps = report.gaps.len(),
            requests = report.requests,
            "run complete"
        );
        Ok(report)
    }

    /// Rebuilds the daily output from an already persisted raw series.
    pub async fn aggregate_only(&self, series: &BarSeries) -> Result<RunReport, PipelineError> {
        let daily = if series.is_empty() {
            warn!("no bars to aggregate; leaving outputs as they are");
            Vec::new()
        } else {
            self.aggregate_and_write(series).await?
        };
        info!(bars = series.len(), daily_bars = daily.len(), "aggregation complete");
        Ok(RunReport {
            bars: series.len(),
            daily_bars: daily.len(),
            gaps: series.gaps(),
            coverage: Coverage::Complete,
            requests: 0,
        })
    }

    /// [`Pipeline::aggregate_only`] over a raw file written by the raw CSV sink.
    pub async fn aggregate_file(
        &self,
        path: impl AsRef<Path>,
    ) -> Result<RunReport, PipelineError> {
        let series = read_bars(path, &self.symbol, self.interval, self.tz())?;
        self.aggregate_only(&series).await
    }

    async fn aggregate_and_write(
        &self,
        series: &BarSeries,
    ) -> Result<Vec<DailyBar>, PipelineError> {
        let daily = aggregate_all(series, &self.calendar);
        write_all(&self.daily_sinks, &rows(&daily, self.tz())).await?;
        Ok(daily)
    }
}

async fn write_all(sinks: &[Box<dyn DataSink>], rows: &[OhlcvRow]) -> Result<(), SinkError> {
    for sink in sinks {
        sink.write(rows).await?;
    }
    Ok(())
}
