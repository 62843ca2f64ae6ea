//! SQLite output via diesel.
//!
//! Session tables are keyed on the local date:
//! `(date TEXT PRIMARY KEY, open TEXT, high TEXT, low TEXT, close TEXT, volume TEXT)`.
//! Bar tables are keyed on the UTC open time in milliseconds, with the local
//! wall time kept alongside for reading:
//! `(ts_ms INTEGER PRIMARY KEY, date TEXT, open TEXT, ...)`.
//! A wall time repeats in the fall-back hour, an instant never does.
//! Numbers are kept as decimal text so no digits are lost to REAL.

use async_trait::async_trait;
use diesel::{
    connection::SimpleConnection,
    prelude::*,
    sql_query,
    sql_types::{BigInt, Text},
    sqlite::{Sqlite, SqliteConnection},
};
use serde::{Deserialize, Serialize};
use snafu::{OptionExt, ResultExt, ensure};
use tracing::debug;

use crate::io::{
    row::OhlcvRow,
    sink::{
        ConnectionSnafu, DataSink, DatabaseSnafu, InvalidTableSnafu, JoinSnafu, SinkError,
        UnkeyedSnafu,
    },
};

/// What to do with rows already in the table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteMode {
    /// Drop and recreate the table, then insert.
    #[default]
    Replace,
    /// Insert new keys, overwrite existing ones.
    Upsert,
}

/// The column that identifies a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowKey {
    /// Local session date; one row per day.
    Date,
    /// UTC open time; one row per bar.
    Instant,
}

#[derive(Debug, Clone)]
pub struct SqliteSink {
    database_url: String,
    table: String,
    mode: WriteMode,
    key: RowKey,
}

impl SqliteSink {
    /// A table of session rows keyed on their date.
    pub fn new(
        database_url: impl Into<String>,
        table: impl Into<String>,
        mode: WriteMode,
    ) -> Result<Self, SinkError> {
        Self::keyed(database_url, table, mode, RowKey::Date)
    }

    /// A table of bar rows keyed on their UTC open time.
    pub fn bars(
        database_url: impl Into<String>,
        table: impl Into<String>,
        mode: WriteMode,
    ) -> Result<Self, SinkError> {
        Self::keyed(database_url, table, mode, RowKey::Instant)
    }

    fn keyed(
        database_url: impl Into<String>,
        table: impl Into<String>,
        mode: WriteMode,
        key: RowKey,
    ) -> Result<Self, SinkError> {
        let table = table.into();
        ensure!(
            is_identifier(&table),
            InvalidTableSnafu {
                name: table.clone()
            }
        );
        Ok(Self {
            database_url: database_url.into(),
            table,
            mode,
            key,
        })
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn mode(&self) -> WriteMode {
        self.mode
    }

    pub fn key(&self) -> RowKey {
        self.key
    }

    fn write_sync(&self, rows: &[OhlcvRow]) -> Result<usize, SinkError> {
        let keys = match self.key {
            RowKey::Date => Vec::new(),
            RowKey::Instant => rows
                .iter()
                .map(|row| {
                    row.stamp
                        .utc()
                        .map(|ts| ts.timestamp_millis())
                        .context(UnkeyedSnafu {
                            table: self.table.clone(),
                            stamp: row.stamp.iso(),
                        })
                })
                .collect::<Result<Vec<i64>, _>>()?,
        };

        let mut conn = connect_sqlite(&self.database_url)?;
        let table = &self.table;
        let (create, insert) = statements(table, self.key);

        let written = conn
            .transaction::<usize, diesel::result::Error, _>(|conn| {
                if self.mode == WriteMode::Replace {
                    conn.batch_execute(&format!("DROP TABLE IF EXISTS {table};"))?;
                }
                conn.batch_execute(&create)?;

                let mut written = 0;
                for (i, row) in rows.iter().enumerate() {
                    let mut query = sql_query(insert.as_str()).into_boxed::<Sqlite>();
                    if let Some(ts_ms) = keys.get(i) {
                        query = query.bind::<BigInt, _>(*ts_ms);
                    }
                    written += query
                        .bind::<Text, _>(row.stamp.iso())
                        .bind::<Text, _>(row.open.to_string())
                        .bind::<Text, _>(row.high.to_string())
                        .bind::<Text, _>(row.low.to_string())
                        .bind::<Text, _>(row.close.to_string())
                        .bind::<Text, _>(row.volume.to_string())
                        .execute(conn)?;
                }
                Ok(written)
            })
            .context(DatabaseSnafu)?;

        debug!(table = %self.table, mode = ?self.mode, rows = written, "sqlite written");
        Ok(written)
    }
}

#[async_trait]
impl DataSink for SqliteSink {
    async fn write(&self, rows: &[OhlcvRow]) -> Result<usize, SinkError> {
        let sink = self.clone();
        let rows = rows.to_vec();
        tokio::task::spawn_blocking(move || sink.write_sync(&rows))
            .await
            .context(JoinSnafu)?
    }
}

fn statements(table: &str, key: RowKey) -> (String, String) {
    const VALUES: &str = "open   TEXT NOT NULL,
                          high   TEXT NOT NULL,
                          low    TEXT NOT NULL,
                          close  TEXT NOT NULL,
                          volume TEXT NOT NULL";
    const UPDATE: &str = "open = excluded.open,
                          high = excluded.high,
                          low = excluded.low,
                          close = excluded.close,
                          volume = excluded.volume";
    match key {
        RowKey::Date => (
            format!(
                "CREATE TABLE IF NOT EXISTS {table} (
                    date   TEXT PRIMARY KEY NOT NULL,
                    {VALUES}
                );"
            ),
            format!(
                "INSERT INTO {table} (date, open, high, low, close, volume)
                 VALUES (?, ?, ?, ?, ?, ?)
                 ON CONFLICT(date) DO UPDATE SET {UPDATE}"
            ),
        ),
        RowKey::Instant => (
            format!(
                "CREATE TABLE IF NOT EXISTS {table} (
                    ts_ms  INTEGER PRIMARY KEY NOT NULL,
                    date   TEXT NOT NULL,
                    {VALUES}
                );"
            ),
            format!(
                "INSERT INTO {table} (ts_ms, date, open, high, low, close, volume)
                 VALUES (?, ?, ?, ?, ?, ?, ?)
                 ON CONFLICT(ts_ms) DO UPDATE SET date = excluded.date, {UPDATE}"
            ),
        ),
    }
}

/// Opens a connection with the pragmas every writer uses.
pub fn connect_sqlite(database_url: &str) -> Result<SqliteConnection, SinkError> {
    let mut conn = SqliteConnection::establish(database_url).context(ConnectionSnafu {
        database_url: database_url.to_string(),
    })?;

    conn.batch_execute("PRAGMA journal_mode=WAL; PRAGMA busy_timeout=5000;")
        .context(DatabaseSnafu)?;
    Ok(conn)
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_names_must_be_identifiers() {
        assert!(SqliteSink::new(":memory:", "market_data_rth", WriteMode::Replace).is_ok());
        assert!(SqliteSink::new(":memory:", "_t1", WriteMode::Upsert).is_ok());

        for bad in ["", "1table", "rth; DROP TABLE x", "market-data", "a b"] {
            let err = SqliteSink::new(":memory:", bad, WriteMode::Replace).unwrap_err();
            assert!(matches!(err, SinkError::InvalidTable { .. }), "{bad}");
        }
    }

    #[test]
    fn write_mode_is_lowercase_in_config() {
        #[derive(Deserialize)]
        struct Holder {
            mode: WriteMode,
        }
        let h: Holder = serde_json::from_str(r#"{"mode":"upsert"}"#).unwrap();
        assert_eq!(h.mode, WriteMode::Upsert);
        assert!(serde_json::from_str::<Holder>(r#"{"mode":"append"}"#).is_err());
    }
}
