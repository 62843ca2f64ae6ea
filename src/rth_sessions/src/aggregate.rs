//! Session aggregation.
//!
//! Pure functions over an ordered [`BarSeries`]: the bars of a window are found
//! by binary search, never by re-sorting or scanning the whole series.

use kline_ingestor::models::bar_series::BarSeries;
use rust_decimal::Decimal;

use crate::{
    calendar::{SessionCalendar, SessionWindow},
    daily_bar::DailyBar,
};

/// Collapses the bars inside `window` into one [`DailyBar`].
///
/// Open is the first bar's open, close the last bar's close, high/low the
/// extremes and volume the exact sum. Returns `None` when the window holds no
/// bar. Missing bars are not interpolated.
pub fn aggregate(series: &BarSeries, window: &SessionWindow) -> Option<DailyBar> {
    let bars = series.between(window.start, window.end);
    let first = bars.first()?;
    let last = bars.last()?;

    let (high, low, volume) = bars.iter().fold(
        (first.high(), first.low(), Decimal::ZERO),
        |(high, low, volume), bar| {
            (
                high.max(bar.high()),
                low.min(bar.low()),
                volume + bar.volume(),
            )
        },
    );

    Some(DailyBar::new(
        window.date,
        first.open(),
        high,
        low,
        last.close(),
        volume,
    ))
}

/// Every session of `series`, oldest first. Days with no in-session bar are skipped.
pub fn aggregate_all(series: &BarSeries, calendar: &SessionCalendar) -> Vec<DailyBar> {
    calendar
        .sessions(series)
        .filter_map(|window| aggregate(series, &window))
        .collect()
}
