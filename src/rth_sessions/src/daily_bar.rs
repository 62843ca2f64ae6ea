use chrono::NaiveDate;
use chrono_tz::Tz;
use kline_ingestor::io::{OhlcvRow, RowStamp, ToRow};
use rust_decimal::Decimal;

/// One session's summary. Only built by the aggregator, read-only afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DailyBar {
    date: NaiveDate,
    open: Decimal,
    high: Decimal,
    low: Decimal,
    close: Decimal,
    volume: Decimal,
}

impl DailyBar {
    pub(crate) fn new(
        date: NaiveDate,
        open: Decimal,
        high: Decimal,
        low: Decimal,
        close: Decimal,
        volume: Decimal,
    ) -> Self {
        Self {
            date,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// Session date in the reference timezone.
    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn open(&self) -> Decimal {
        self.open
    }

    pub fn high(&self) -> Decimal {
        self.high
    }

    pub fn low(&self) -> Decimal {
        self.low
    }

    pub fn close(&self) -> Decimal {
        self.close
    }

    pub fn volume(&self) -> Decimal {
        self.volume
    }
}

impl ToRow for DailyBar {
    // The date is already local.
    fn to_row(&self, _tz: Tz) -> OhlcvRow {
        OhlcvRow {
            stamp: RowStamp::Date(self.date),
            open: self.open,
            high: self.high,
            low: self.low,
            close: self.close,
            volume: self.volume,
        }
    }
}
