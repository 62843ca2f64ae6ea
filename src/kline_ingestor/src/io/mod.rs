//! Persistence of bars and session summaries.
//!
//! Everything written out goes through [`OhlcvRow`], which carries the row's
//! timestamp already projected into the reference timezone. Sinks never see a
//! UTC instant and never convert one.

pub mod row;
pub mod sink;
pub mod sqlite;
pub mod tabular;

pub use row::{OhlcvRow, RowStamp, ToRow, rows};
pub use sink::{DataSink, SinkError};
pub use sqlite::{RowKey, SqliteSink, WriteMode};
pub use tabular::{CsvSink, ReadError, read_bars};
