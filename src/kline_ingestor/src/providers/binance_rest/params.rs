use snafu::ensure;

use crate::{
    models::{interval::Interval, request_params::PageQuery},
    providers::{SourceError, ValidationSnafu},
};

/// Largest `limit` the futures klines endpoint accepts.
pub const MAX_PAGE_LIMIT: u32 = 1500;

/// Intervals the futures klines endpoint serves.
const SUPPORTED_INTERVALS: &[&str] = &[
    "1m", "3m", "5m", "15m", "30m", "1h", "2h", "4h", "6h", "8h", "12h", "1d", "3d", "1w",
];

pub fn validate_interval(interval: &Interval) -> Result<(), SourceError> {
    let text = interval.to_string();
    ensure!(
        SUPPORTED_INTERVALS.contains(&text.as_str()),
        ValidationSnafu {
            message: format!("interval {text} is not served by Binance futures klines"),
        }
    );
    Ok(())
}

pub fn validate_limit(limit: u32) -> Result<(), SourceError> {
    ensure!(
        (1..=MAX_PAGE_LIMIT).contains(&limit),
        ValidationSnafu {
            message: format!("limit {limit} is outside 1..={MAX_PAGE_LIMIT}"),
        }
    );
    Ok(())
}

/// Query-string pairs for one klines page.
pub fn construct_params(query: &PageQuery) -> Vec<(&'static str, String)> {
    vec![
        ("symbol", query.symbol.to_uppercase()),
        ("interval", query.interval.to_string()),
        ("startTime", query.start_ms().to_string()),
        ("endTime", query.end_ms().to_string()),
        ("limit", query.limit.to_string()),
    ]
}
