//! Daily regular-trading-hours bars from an intraday kline history.
//!
//! The flow is [`pipeline::Pipeline`]: fetch the raw series with
//! [`kline_ingestor::fetch::RangeFetcher`], optionally persist it, split it into
//! per-day [`calendar::SessionWindow`]s and reduce each window to a
//! [`daily_bar::DailyBar`] with [`aggregate::aggregate`].

pub mod aggregate;
pub mod calendar;
pub mod config;
pub mod daily_bar;
pub mod pipeline;
