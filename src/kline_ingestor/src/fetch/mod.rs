//! Range reconstruction from a paginated source.
//!
//! [`RangeFetcher::fetch_range`] walks a `[start, end]` range page by page:
//!
//! 1. ask the source for at most `page_limit` bars starting at the cursor;
//! 2. append them, skipping a bar that repeats the series' last timestamp;
//! 3. stop once the page's last bar reaches `end` (or the next cursor would
//!    pass it), otherwise move the cursor to `last + interval` and repeat.
//!
//! The cursor strictly advances on every accepted page, and a page that does
//! not advance it is rejected, so the loop cannot spin. Requests are spaced by a
//! [`RequestPacer`]; rate-limit answers are retried under a [`RetryPolicy`].

pub mod pacing;
pub mod retry;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::{
    models::{
        bar::Bar,
        bar_series::{BarSeries, SeriesGap},
        request_params::{PageQuery, RangeRequest},
    },
    providers::{BarSource, SourceError},
};

pub use pacing::RequestPacer;
pub use retry::RetryPolicy;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid range request: {message}")]
    InvalidRequest { message: String },

    /// Network/auth failure, or a rate limit that outlasted the retry budget.
    #[error("source unavailable: {message}")]
    SourceUnavailable {
        message: String,
        #[source]
        source: Option<SourceError>,
    },

    #[error("malformed page #{page}: {message}")]
    MalformedPage { page: usize, message: String },
}

impl FetchError {
    /// True when the failure is an exhausted rate-limit retry budget.
    pub fn is_rate_limited(&self) -> bool {
        matches!(
            self,
            FetchError::SourceUnavailable { source: Some(err), .. } if err.is_rate_limited()
        )
    }

    fn from_source(err: SourceError, page: usize) -> Self {
        match err {
            SourceError::Malformed { message, .. } => FetchError::MalformedPage { page, message },
            SourceError::Validation { message, .. } => FetchError::InvalidRequest { message },
            other => FetchError::SourceUnavailable {
                message: other.to_string(),
                source: Some(other),
            },
        }
    }
}

/// How much of the requested range the fetched series covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Coverage {
    /// The series reaches `end` at interval granularity.
    Complete,
    /// The source returned an empty page before `end`; the series stops at
    /// `covered_until` (`None` when nothing at all came back).
    Exhausted { covered_until: Option<DateTime<Utc>> },
}

#[derive(Debug, Clone)]
pub struct FetchOutcome {
    pub series: BarSeries,
    /// Discontinuities inside the series. Reported, never filled.
    pub gaps: Vec<SeriesGap>,
    pub coverage: Coverage,
    /// Every call made to the source, retries included.
    pub requests: usize,
}

impl FetchOutcome {
    pub fn is_complete(&self) -> bool {
        self.coverage == Coverage::Complete
    }
}

pub struct RangeFetcher<S> {
    source: S,
    pacer: RequestPacer,
    retry: RetryPolicy,
}

impl<S: BarSource> RangeFetcher<S> {
    pub fn new(source: S, pacer: RequestPacer, retry: RetryPolicy) -> Self {
        Self {
            source,
            pacer,
            retry,
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Reconstructs the bar series covering `[request.start, request.end]`.
    ///
    /// # Errors
    ///
    /// * [`FetchError::InvalidRequest`] - empty symbol, zero `page_limit` or `start > end`.
    /// * [`FetchError::SourceUnavailable`] - transport/auth failure, or rate
    ///   limiting that persisted past `max_retries`.
    /// * [`FetchError::MalformedPage`] - undecodable data, a page that is not
    ///   strictly increasing, overlaps the series, exceeds the limit or does not
    ///   advance the cursor.
    #[instrument(skip(self, request), fields(symbol = %request.symbol, interval = %request.interval))]
    pub async fn fetch_range(&self, request: &RangeRequest) -> Result<FetchOutcome, FetchError> {
        validate(request)?;

        let step = request.interval.duration();
        let mut series = BarSeries::new(request.symbol.clone(), request.interval);
        let mut cursor = request.start;
        let mut pages = 0usize;
        let mut requests = 0usize;

        let coverage = loop {
            pages += 1;
            let query = request.page_at(cursor);
            let page = self.query_page(&query, pages, &mut requests).await?;
            debug!(page = pages, cursor = %cursor, bars = page.len(), "page received");

            check_page(&page, request.page_limit, pages)?;

            let Some(last) = page.last().map(Bar::timestamp) else {
                let covered_until = series.last().map(Bar::timestamp);
                warn!(
                    cursor = %cursor,
                    end = %request.end,
                    covered_until = ?covered_until,
                    "source exhausted before the end of the range"
                );
                break Coverage::Exhausted { covered_until };
            };

            if last < cursor {
                return Err(FetchError::MalformedPage {
                    page: pages,
                    message: format!("page ends at {last}, before the requested start {cursor}"),
                });
            }

            append_page(&mut series, page, request, pages)?;

            if last >= request.end {
                break Coverage::Complete;
            }
            let next = last + step;
            if next > request.end {
                break Coverage::Complete;
            }
            cursor = next;
        };

        let gaps = series.gaps();
        for gap in &gaps {
            warn!(
                after = %gap.after,
                before = %gap.before,
                missing = gap.missing,
                "gap in fetched series"
            );
        }

        info!(
            bars = series.len(),
            pages,
            requests,
            gaps = gaps.len(),
            complete = coverage == Coverage::Complete,
            "range fetched"
        );

        Ok(FetchOutcome {
            series,
            gaps,
            coverage,
            requests,
        })
    }

    async fn query_page(
        &self,
        query: &PageQuery,
        page: usize,
        requests: &mut usize,
    ) -> Result<Vec<Bar>, FetchError> {
        let mut attempt = 0u32;
        loop {
            self.pacer.ready().await;
            *requests += 1;

            match self.source.query(query).await {
                Ok(bars) => return Ok(bars),
                Err(err) if err.is_rate_limited() => {
                    if attempt >= self.retry.max_retries {
                        return Err(FetchError::SourceUnavailable {
                            message: format!(
                                "still rate limited after {attempt} retries on page #{page}"
                            ),
                            source: Some(err),
                        });
                    }
                    let delay = self.retry.delay_for(attempt, err.retry_after());
                    warn!(
                        page,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "rate limited, backing off"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(FetchError::from_source(err, page)),
            }
        }
    }
}

fn validate(request: &RangeRequest) -> Result<(), FetchError> {
    let message = if request.symbol.trim().is_empty() {
        "symbol is empty".to_string()
    } else if request.page_limit == 0 {
        "page_limit must be at least 1".to_string()
    } else if request.start > request.end {
        format!("start {} is after end {}", request.start, request.end)
    } else {
        return Ok(());
    };
    Err(FetchError::InvalidRequest { message })
}

fn check_page(page: &[Bar], limit: u32, index: usize) -> Result<(), FetchError> {
    if page.len() > limit as usize {
        return Err(FetchError::MalformedPage {
            page: index,
            message: format!("{} bars returned for a limit of {limit}", page.len()),
        });
    }
    if let Some(pair) = page
        .windows(2)
        .find(|pair| pair[1].timestamp() <= pair[0].timestamp())
    {
        return Err(FetchError::MalformedPage {
            page: index,
            message: format!(
                "bars out of order: {} followed by {}",
                pair[0].timestamp(),
                pair[1].timestamp()
            ),
        });
    }
    Ok(())
}

fn append_page(
    series: &mut BarSeries,
    page: Vec<Bar>,
    request: &RangeRequest,
    index: usize,
) -> Result<(), FetchError> {
    for bar in page {
        let ts = bar.timestamp();
        if ts < request.start || ts > request.end {
            debug!(timestamp = %ts, "dropping bar outside the requested range");
            continue;
        }
        if series.last().is_some_and(|last| last.timestamp() == ts) {
            continue;
        }
        series
            .push(bar)
            .map_err(|e| FetchError::MalformedPage {
                page: index,
                message: e.to_string(),
            })?;
    }
    Ok(())
}
