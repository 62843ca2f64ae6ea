mod common;

use chrono::{Duration, NaiveDate, TimeZone, Utc};
use chrono_tz::America::New_York;
use common::*;
use diesel::{
    prelude::*,
    sql_query,
    sql_types::{BigInt, Text},
};
use kline_ingestor::{
    io::{
        CsvSink, DataSink, OhlcvRow, ReadError, RowStamp, SinkError, SqliteSink, WriteMode,
        read_bars, rows,
        sqlite::connect_sqlite,
    },
    models::{bar::Bar, bar_series::BarSeries},
};
use tempfile::TempDir;

#[derive(QueryableByName, Debug, PartialEq)]
struct StoredRow {
    #[diesel(sql_type = Text)]
    date: String,
    #[diesel(sql_type = Text)]
    close: String,
    #[diesel(sql_type = Text)]
    volume: String,
}

#[derive(QueryableByName, Debug, PartialEq)]
struct StoredBar {
    #[diesel(sql_type = BigInt)]
    ts_ms: i64,
    #[diesel(sql_type = Text)]
    date: String,
}

fn daily(day: u32, close: &str, volume: &str) -> OhlcvRow {
    OhlcvRow {
        stamp: RowStamp::Date(NaiveDate::from_ymd_opt(2019, 9, day).unwrap()),
        open: d("10"),
        high: d("13"),
        low: d("9"),
        close: d(close),
        volume: d(volume),
    }
}

fn stored(database_url: &str, table: &str) -> Vec<StoredRow> {
    let mut conn = connect_sqlite(database_url).unwrap();
    sql_query(format!("SELECT date, close, volume FROM {table} ORDER BY date"))
        .load(&mut conn)
        .unwrap()
}

fn stored_bars(database_url: &str, table: &str) -> Vec<StoredBar> {
    let mut conn = connect_sqlite(database_url).unwrap();
    sql_query(format!("SELECT ts_ms, date FROM {table} ORDER BY ts_ms"))
        .load(&mut conn)
        .unwrap()
}

#[tokio::test]
async fn csv_sink_writes_header_and_exact_decimals() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("out").join("rth.csv");
    let sink = CsvSink::new(&path);

    let written = sink
        .write(&[daily(9, "12", "12.000001"), daily(10, "11.5", "0")])
        .await
        .unwrap();

    assert_eq!(written, 2);
    let text = std::fs::read_to_string(&path).unwrap();
    assert_eq!(
        text,
        "Date,Open,High,Low,Close,Volume\n\
         09/09/2019,10,13,9,12,12.000001\n\
         10/09/2019,10,13,9,11.5,0\n"
    );
}

#[tokio::test]
async fn raw_bars_round_trip_through_csv() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("raw.csv");

    let start = Utc.with_ymd_and_hms(2024, 1, 15, 13, 30, 0).unwrap();
    let bars = ladder(start, thirty_minutes(), 5);
    let series = BarSeries::from_bars("BTCUSDT", thirty_minutes(), bars).unwrap();

    CsvSink::new(&path)
        .write(&rows(series.bars(), New_York))
        .await
        .unwrap();

    let text = std::fs::read_to_string(&path).unwrap();
    assert!(text.lines().nth(1).unwrap().starts_with("15/01/2024 08:30:00,"));

    let back = read_bars(&path, "BTCUSDT", thirty_minutes(), New_York).unwrap();
    assert_eq!(back, series);
}

#[tokio::test]
async fn reader_keeps_both_passes_through_the_fall_back_hour() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("fall_back.csv");

    // 04:30Z..07:00Z on 2024-11-03 reads 00:30, 01:00, 01:30, 01:00, 01:30, 02:00 locally.
    let start = Utc.with_ymd_and_hms(2024, 11, 3, 4, 30, 0).unwrap();
    let bars = ladder(start, thirty_minutes(), 6);
    let series = BarSeries::from_bars("BTCUSDT", thirty_minutes(), bars).unwrap();

    CsvSink::new(&path)
        .write(&rows(series.bars(), New_York))
        .await
        .unwrap();

    let back = read_bars(&path, "BTCUSDT", thirty_minutes(), New_York).unwrap();
    let got: Vec<_> = back.bars().iter().map(Bar::timestamp).collect();
    let want: Vec<_> = (0..6).map(|i| start + Duration::minutes(30 * i)).collect();
    assert_eq!(got, want);
}

#[test]
fn reader_rejects_foreign_headers_and_bad_cells() {
    let dir = TempDir::new().unwrap();

    let header = dir.path().join("header.csv");
    std::fs::write(&header, "date,open,high,low,close,volume\n").unwrap();
    let err = read_bars(&header, "BTCUSDT", thirty_minutes(), New_York).unwrap_err();
    assert!(matches!(err, ReadError::Header { .. }), "{err:?}");

    let cell = dir.path().join("cell.csv");
    std::fs::write(
        &cell,
        "Date,Open,High,Low,Close,Volume\n15/01/2024 08:30:00,10,11,9,ten,1\n",
    )
    .unwrap();
    let err = read_bars(&cell, "BTCUSDT", thirty_minutes(), New_York).unwrap_err();
    assert!(
        matches!(err, ReadError::Decimal { line: 2, column: "Close", .. }),
        "{err:?}"
    );

    let skipped = dir.path().join("skipped.csv");
    std::fs::write(
        &skipped,
        "Date,Open,High,Low,Close,Volume\n10/03/2024 02:30:00,10,11,9,10,1\n",
    )
    .unwrap();
    let err = read_bars(&skipped, "BTCUSDT", thirty_minutes(), New_York).unwrap_err();
    assert!(matches!(err, ReadError::Nonexistent { .. }), "{err:?}");
}

#[tokio::test]
async fn sqlite_replace_mode_rewrites_the_table() {
    let dir = TempDir::new().unwrap();
    let url = dir.path().join("market.db").display().to_string();
    let sink = SqliteSink::new(&url, "market_data_rth", WriteMode::Replace).unwrap();

    sink.write(&[daily(9, "12", "12"), daily(10, "11", "3")])
        .await
        .unwrap();
    let written = sink.write(&[daily(11, "14", "7.5")]).await.unwrap();

    assert_eq!(written, 1);
    assert_eq!(
        stored(&url, "market_data_rth"),
        vec![StoredRow {
            date: "2019-09-11".into(),
            close: "14".into(),
            volume: "7.5".into()
        }]
    );
}

#[tokio::test]
async fn sqlite_upsert_mode_merges_on_date() {
    let dir = TempDir::new().unwrap();
    let url = dir.path().join("market.db").display().to_string();
    let sink = SqliteSink::new(&url, "market_data_rth", WriteMode::Upsert).unwrap();

    sink.write(&[daily(9, "12", "12"), daily(10, "11", "3")])
        .await
        .unwrap();
    sink.write(&[daily(10, "11.25", "4"), daily(11, "14", "7.5")])
        .await
        .unwrap();

    let got: Vec<_> = stored(&url, "market_data_rth")
        .into_iter()
        .map(|r| (r.date, r.close, r.volume))
        .collect();
    assert_eq!(
        got,
        vec![
            ("2019-09-09".to_string(), "12".to_string(), "12".to_string()),
            ("2019-09-10".to_string(), "11.25".to_string(), "4".to_string()),
            ("2019-09-11".to_string(), "14".to_string(), "7.5".to_string()),
        ]
    );
}

#[tokio::test]
async fn sqlite_bar_rows_keep_utc_key_and_local_date() {
    let dir = TempDir::new().unwrap();
    let url = dir.path().join("market.db").display().to_string();
    let sink = SqliteSink::bars(&url, "market_data", WriteMode::Replace).unwrap();

    let start = Utc.with_ymd_and_hms(2024, 1, 15, 13, 30, 0).unwrap();
    sink.write(&rows(&ladder(start, thirty_minutes(), 2), New_York))
        .await
        .unwrap();

    assert_eq!(
        stored_bars(&url, "market_data"),
        vec![
            StoredBar {
                ts_ms: start.timestamp_millis(),
                date: "2024-01-15 08:30:00".into()
            },
            StoredBar {
                ts_ms: (start + Duration::minutes(30)).timestamp_millis(),
                date: "2024-01-15 09:00:00".into()
            },
        ]
    );
}

#[tokio::test]
async fn sqlite_bar_table_keeps_both_passes_through_the_fall_back_hour() {
    let dir = TempDir::new().unwrap();
    let url = dir.path().join("market.db").display().to_string();
    let sink = SqliteSink::bars(&url, "market_data", WriteMode::Replace).unwrap();

    // 00:00 EDT through 02:30 EST: 01:00 and 01:30 each happen twice.
    let start = Utc.with_ymd_and_hms(2024, 11, 3, 4, 0, 0).unwrap();
    let bars = ladder(start, thirty_minutes(), 8);

    let written = sink.write(&rows(&bars, New_York)).await.unwrap();

    assert_eq!(written, 8);
    let stored = stored_bars(&url, "market_data");
    assert_eq!(stored.len(), 8);
    let dates: Vec<_> = stored.iter().map(|r| r.date.as_str()).collect();
    assert_eq!(
        dates,
        vec![
            "2024-11-03 00:00:00",
            "2024-11-03 00:30:00",
            "2024-11-03 01:00:00",
            "2024-11-03 01:30:00",
            "2024-11-03 01:00:00",
            "2024-11-03 01:30:00",
            "2024-11-03 02:00:00",
            "2024-11-03 02:30:00",
        ]
    );

    // Upserting the same bars again changes nothing.
    let upsert = SqliteSink::bars(&url, "market_data", WriteMode::Upsert).unwrap();
    upsert.write(&rows(&bars, New_York)).await.unwrap();
    assert_eq!(stored_bars(&url, "market_data").len(), 8);
}

#[tokio::test]
async fn sqlite_bar_table_rejects_date_only_rows() {
    let dir = TempDir::new().unwrap();
    let url = dir.path().join("market.db").display().to_string();
    let sink = SqliteSink::bars(&url, "market_data", WriteMode::Replace).unwrap();

    let err = sink.write(&[daily(9, "12", "12")]).await.unwrap_err();

    assert!(matches!(err, SinkError::Unkeyed { .. }), "{err:?}");
}
