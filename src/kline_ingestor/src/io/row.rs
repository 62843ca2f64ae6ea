use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use chrono_tz::Tz;
use rust_decimal::Decimal;
use shared_utils::tz::to_local;

use crate::models::bar::Bar;

const TABULAR_DATE: &str = "%d/%m/%Y";
const TABULAR_DATETIME: &str = "%d/%m/%Y %H:%M:%S";
const ISO_DATE: &str = "%Y-%m-%d";
const ISO_DATETIME: &str = "%Y-%m-%d %H:%M:%S";

/// Local timestamp of an output row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RowStamp {
    /// A whole session day.
    Date(NaiveDate),
    /// A single bar's open time: wall clock for display, `utc` to tell the
    /// two passes through a fall-back hour apart.
    Instant {
        local: NaiveDateTime,
        utc: DateTime<Utc>,
    },
}

impl RowStamp {
    /// `DD/MM/YYYY` or `DD/MM/YYYY HH:MM:SS`.
    pub fn tabular(&self) -> String {
        match self {
            RowStamp::Date(d) => d.format(TABULAR_DATE).to_string(),
            RowStamp::Instant { local, .. } => local.format(TABULAR_DATETIME).to_string(),
        }
    }

    /// `YYYY-MM-DD` or `YYYY-MM-DD HH:MM:SS`; sorts lexically in time order.
    pub fn iso(&self) -> String {
        match self {
            RowStamp::Date(d) => d.format(ISO_DATE).to_string(),
            RowStamp::Instant { local, .. } => local.format(ISO_DATETIME).to_string(),
        }
    }

    /// The exact instant, when the stamp has one.
    pub fn utc(&self) -> Option<DateTime<Utc>> {
        match self {
            RowStamp::Date(_) => None,
            RowStamp::Instant { utc, .. } => Some(*utc),
        }
    }
}

/// One OHLCV record ready for a sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OhlcvRow {
    pub stamp: RowStamp,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
}

/// Projection of a record into the reference timezone.
pub trait ToRow {
    fn to_row(&self, tz: Tz) -> OhlcvRow;
}

impl ToRow for Bar {
    fn to_row(&self, tz: Tz) -> OhlcvRow {
        OhlcvRow {
            stamp: RowStamp::Instant {
                local: to_local(self.timestamp(), tz),
                utc: self.timestamp(),
            },
            open: self.open(),
            high: self.high(),
            low: self.low(),
            close: self.close(),
            volume: self.volume(),
        }
    }
}

pub fn rows<T: ToRow>(items: &[T], tz: Tz) -> Vec<OhlcvRow> {
    items.iter().map(|item| item.to_row(tz)).collect()
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use chrono::{TimeZone, Utc};
    use chrono_tz::America::New_York;

    use super::*;

    #[test]
    fn bar_rows_use_local_wall_time() {
        let bar = Bar::new(
            Utc.with_ymd_and_hms(2024, 1, 15, 14, 30, 0).unwrap(),
            Decimal::from_str("100.5").unwrap(),
            Decimal::from_str("101").unwrap(),
            Decimal::from_str("99.25").unwrap(),
            Decimal::from_str("100").unwrap(),
            Decimal::from_str("12.345").unwrap(),
        )
        .unwrap();

        let row = bar.to_row(New_York);
        assert_eq!(row.stamp.tabular(), "15/01/2024 09:30:00");
        assert_eq!(row.stamp.iso(), "2024-01-15 09:30:00");
        assert_eq!(row.volume.to_string(), "12.345");
        assert_eq!(row.stamp.utc(), Some(bar.timestamp()));
    }

    #[test]
    fn date_stamps_have_no_time_part() {
        let stamp = RowStamp::Date(NaiveDate::from_ymd_opt(2019, 9, 9).unwrap());
        assert_eq!(stamp.tabular(), "09/09/2019");
        assert_eq!(stamp.iso(), "2019-09-09");
        assert_eq!(stamp.utc(), None);
    }
}
