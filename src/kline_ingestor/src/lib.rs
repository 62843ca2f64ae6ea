//! Paginated OHLCV bar ingestion.
//!
//! - [`models`]: the vendor-agnostic [`Bar`](models::bar::Bar), the ordered
//!   [`BarSeries`](models::bar_series::BarSeries) and bar [`Interval`](models::interval::Interval)s.
//! - [`providers`]: the [`BarSource`](providers::BarSource) seam and the Binance futures source.
//! - [`fetch`]: the [`RangeFetcher`](fetch::RangeFetcher) that stitches pages into a series.
//! - [`io`]: tabular and SQLite sinks, and the tabular reader.

pub mod fetch;
pub mod io;
pub mod models;
pub mod providers;
