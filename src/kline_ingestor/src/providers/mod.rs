//! Source abstraction for market data.
//!
//! This module defines the [`BarSource`] trait, the one seam between the range
//! fetcher and a vendor's paginated kline endpoint. A source answers a single
//! bounded [`PageQuery`]; stitching pages together, pacing requests and retrying
//! rate limits is the job of [`RangeFetcher`](crate::fetch::RangeFetcher).
//!
//! The trait is async and object safe, so sources can be chosen at runtime.
//!
//! # Example
//!
//! ```rust
//! use async_trait::async_trait;
//! use kline_ingestor::models::{bar::Bar, request_params::PageQuery};
//! use kline_ingestor::providers::{BarSource, SourceError};
//!
//! struct EmptySource;
//!
//! #[async_trait]
//! impl BarSource for EmptySource {
//!     async fn query(&self, _query: &PageQuery) -> Result<Vec<Bar>, SourceError> {
//!         Ok(vec![])
//!     }
//! }
//! ```

pub mod binance_rest;

use std::time::Duration;

use async_trait::async_trait;
use shared_utils::env::MissingEnvVarError;
use snafu::{Backtrace, Snafu};

use crate::models::{bar::Bar, request_params::PageQuery};

/// A paginated time-series query capability.
#[async_trait]
pub trait BarSource: Send + Sync {
    /// Fetches one page of bars.
    ///
    /// # Returns
    ///
    /// * `Ok(Vec<Bar>)` - Bars in ascending timestamp order, at most `query.limit` of them.
    ///   An empty page means the source has nothing at or after `query.start`.
    /// * `Err(SourceError)` - Transport, availability, rate-limit or decoding failure.
    async fn query(&self, query: &PageQuery) -> Result<Vec<Bar>, SourceError>;
}

#[async_trait]
impl<T: BarSource + ?Sized> BarSource for Box<T> {
    async fn query(&self, query: &PageQuery) -> Result<Vec<Bar>, SourceError> {
        (**self).query(query).await
    }
}

/// Failures while building a [`BarSource`], before any request is sent.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum SourceInitError {
    /// A variable of the API key pair is missing or blank.
    #[snafu(display("Incomplete API credentials: {source}"))]
    IncompleteCredentials {
        source: MissingEnvVarError,
        backtrace: Backtrace,
    },

    /// TLS backend or timeout settings were rejected by reqwest.
    #[snafu(display("Cannot build the HTTP client: {source}"))]
    HttpClient {
        source: reqwest::Error,
        backtrace: Backtrace,
    },

    /// The API key cannot travel as an HTTP header value.
    #[snafu(display("API key is not a valid header value: {source}"))]
    ApiKeyHeader {
        source: reqwest::header::InvalidHeaderValue,
        backtrace: Backtrace,
    },
}

/// Errors that can occur within a `BarSource` implementation.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum SourceError {
    /// The request never got an answer (DNS, TLS, timeout, reset).
    #[snafu(display("API request failed: {source}"))]
    Transport {
        source: reqwest::Error,
        backtrace: Backtrace,
    },

    /// The source answered with a failure status (bad credentials, 5xx, unknown symbol).
    #[snafu(display("Source unavailable: {message}"))]
    Unavailable {
        message: String,
        backtrace: Backtrace,
    },

    /// The source asked us to slow down.
    #[snafu(display("Rate limited by source (retry after {retry_after:?})"))]
    RateLimited {
        retry_after: Option<Duration>,
        backtrace: Backtrace,
    },

    /// The source answered, but the payload does not decode into valid bars.
    #[snafu(display("Malformed page: {message}"))]
    Malformed {
        message: String,
        backtrace: Backtrace,
    },

    /// The query cannot be expressed against this source.
    #[snafu(display("Invalid parameters for source: {message}"))]
    Validation {
        message: String,
        backtrace: Backtrace,
    },
}

impl SourceError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, SourceError::RateLimited { .. })
    }

    /// Server-suggested wait, when the source supplied one.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            SourceError::RateLimited { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}
