//! Decoding of kline rows.
//!
//! The endpoint answers with an array of positional arrays:
//! `[openTime, "open", "high", "low", "close", "volume", closeTime, ...]`.
//! Only the first six columns are used. Prices and volume arrive as decimal
//! strings and are parsed straight into [`Decimal`] without a float round trip.

use std::str::FromStr;

use chrono::DateTime;
use rust_decimal::Decimal;
use serde_json::Value;

use crate::{
    models::bar::Bar,
    providers::{MalformedSnafu, SourceError},
};

const COLUMNS: [&str; 6] = ["open_time", "open", "high", "low", "close", "volume"];

pub fn parse_klines(body: &str) -> Result<Vec<Bar>, SourceError> {
    let rows: Vec<Vec<Value>> = serde_json::from_str(body).map_err(|e| {
        MalformedSnafu {
            message: format!("response is not an array of kline rows: {e}"),
        }
        .build()
    })?;

    rows.iter()
        .enumerate()
        .map(|(i, row)| parse_row(i, row))
        .collect()
}

fn parse_row(index: usize, row: &[Value]) -> Result<Bar, SourceError> {
    if row.len() < COLUMNS.len() {
        return MalformedSnafu {
            message: format!("row {index} has {} columns, expected at least 6", row.len()),
        }
        .fail();
    }

    let open_ms = row[0].as_i64().ok_or_else(|| {
        MalformedSnafu {
            message: format!("row {index}: open_time {} is not an integer", row[0]),
        }
        .build()
    })?;
    let timestamp = DateTime::from_timestamp_millis(open_ms).ok_or_else(|| {
        MalformedSnafu {
            message: format!("row {index}: open_time {open_ms} is out of range"),
        }
        .build()
    })?;

    let mut values = [Decimal::ZERO; 5];
    for (slot, column) in values.iter_mut().zip(1..COLUMNS.len()) {
        *slot = decimal_at(index, row, column)?;
    }
    let [open, high, low, close, volume] = values;

    Bar::new(timestamp, open, high, low, close, volume).map_err(|e| {
        MalformedSnafu {
            message: format!("row {index}: {e}"),
        }
        .build()
    })
}

fn decimal_at(index: usize, row: &[Value], column: usize) -> Result<Decimal, SourceError> {
    let parsed = match &row[column] {
        Value::String(s) => Decimal::from_str(s).ok(),
        Value::Number(n) => Decimal::from_str(&n.to_string()).ok(),
        _ => None,
    };
    parsed.ok_or_else(|| {
        MalformedSnafu {
            message: format!(
                "row {index}: {} {} is not a decimal",
                COLUMNS[column], row[column]
            ),
        }
        .build()
    })
}
