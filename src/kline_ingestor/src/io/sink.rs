use async_trait::async_trait;
use snafu::{Backtrace, Snafu};

use crate::io::row::OhlcvRow;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum SinkError {
    /// A generic I/O error.
    #[snafu(display("I/O error on {path}: {source}"))]
    Io {
        path: String,
        source: std::io::Error,
        backtrace: Backtrace,
    },

    /// The CSV writer refused a record or could not open its file.
    #[snafu(display("CSV error: {source}"))]
    Csv {
        source: csv::Error,
        backtrace: Backtrace,
    },

    /// The database could not be opened.
    #[snafu(display("Failed to connect to {database_url}: {source}"))]
    Connection {
        database_url: String,
        source: diesel::ConnectionError,
        backtrace: Backtrace,
    },

    /// A statement failed; the surrounding transaction was rolled back.
    #[snafu(display("Database error: {source}"))]
    Database {
        source: diesel::result::Error,
        backtrace: Backtrace,
    },

    /// Table names are spliced into SQL and must be plain identifiers.
    #[snafu(display("Invalid table name: {name:?}"))]
    InvalidTable { name: String, backtrace: Backtrace },

    /// A bar table needs the row's instant; a date-only row has none.
    #[snafu(display("Row {stamp} has no instant to key table {table} on"))]
    Unkeyed {
        table: String,
        stamp: String,
        backtrace: Backtrace,
    },

    /// The blocking writer task panicked or was cancelled.
    #[snafu(display("Writer task failed: {source}"))]
    Join {
        source: tokio::task::JoinError,
        backtrace: Backtrace,
    },
}

#[async_trait]
pub trait DataSink: Send + Sync {
    /// Writes `rows` to the destination.
    ///
    /// File and database IO runs on tokio's blocking pool.
    ///
    /// # Returns
    /// The number of rows written.
    async fn write(&self, rows: &[OhlcvRow]) -> Result<usize, SinkError>;
}

#[async_trait]
impl<T: DataSink + ?Sized> DataSink for Box<T> {
    async fn write(&self, rows: &[OhlcvRow]) -> Result<usize, SinkError> {
        (**self).write(rows).await
    }
}
