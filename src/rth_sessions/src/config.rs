//! Run configuration: parsing and validation.
//!
//! The TOML file is deserialized into a raw shape that mirrors the file
//! (unknown keys rejected), then checked and converted into [`Config`], whose
//! fields are already typed (zone, interval, durations, paths).
//!
//! ```toml
//! symbol = "BTCUSDT"
//! interval = "30m"
//! reference_timezone = "America/New_York"
//! session_start = "08:30:00"
//! session_end = "15:30:00"
//! start_date = "2019-09-08T00:00:00"
//!
//! [output]
//! daily_csv = "binancefutures_btcusdtp_rth.csv"
//! ```
//!
//! Entrypoints: [`Config::load`] for a file, [`Config::from_toml_str`] for a string.

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use chrono::{NaiveDateTime, NaiveTime};
use chrono_tz::Tz;
use kline_ingestor::{
    fetch::RetryPolicy, io::WriteMode, models::interval::Interval,
    providers::binance_rest::SourceSettings,
};
use serde::Deserialize;
use shared_utils::tz::parse_tz;
use thiserror::Error;

const DEFAULT_PAGE_LIMIT: u32 = 1000;
const DEFAULT_MIN_REQUEST_INTERVAL_MS: u64 = 1000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("{field}: {message}")]
    Invalid { field: &'static str, message: String },
}

fn invalid(field: &'static str, message: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        message: message.into(),
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    symbol: String,
    interval: Interval,
    reference_timezone: String,
    session_start: NaiveTime,
    session_end: NaiveTime,
    page_limit: Option<u32>,
    min_request_interval_ms: Option<u64>,
    start_date: NaiveDateTime,
    #[serde(default)]
    retry: RawRetry,
    #[serde(default)]
    source: RawSource,
    output: RawOutput,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawRetry {
    max_retries: Option<u32>,
    base_delay_ms: Option<u64>,
    max_delay_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawSource {
    base_url: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawOutput {
    raw_csv: Option<PathBuf>,
    daily_csv: Option<PathBuf>,
    sqlite: Option<RawSqlite>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawSqlite {
    database_url: String,
    raw_table: Option<String>,
    daily_table: String,
    #[serde(default)]
    mode: WriteMode,
}

/// Validated configuration for one pipeline.
#[derive(Debug, Clone)]
pub struct Config {
    pub symbol: String,
    pub interval: Interval,
    pub tz: Tz,
    /// Local wall time, inclusive.
    pub session_start: NaiveTime,
    /// Local wall time, inclusive.
    pub session_end: NaiveTime,
    pub page_limit: u32,
    pub min_request_interval: Duration,
    /// First instant to fetch, as local wall time in `tz`.
    pub start_date: NaiveDateTime,
    pub retry: RetryPolicy,
    pub source: SourceSettings,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutputConfig {
    pub raw_csv: Option<PathBuf>,
    pub daily_csv: Option<PathBuf>,
    pub sqlite: Option<SqliteOutput>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqliteOutput {
    pub database_url: String,
    pub raw_table: Option<String>,
    pub daily_table: String,
    pub mode: WriteMode,
}

impl Config {
    /// Reads and validates the TOML file at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig = toml::from_str(text)?;
        Self::validate(raw)
    }

    fn validate(raw: RawConfig) -> Result<Self, ConfigError> {
        let symbol = raw.symbol.trim().to_string();
        if symbol.is_empty() {
            return Err(invalid("symbol", "cannot be empty"));
        }

        let tz = parse_tz(&raw.reference_timezone)
            .map_err(|e| invalid("reference_timezone", e.to_string()))?;

        if raw.session_start >= raw.session_end {
            return Err(invalid(
                "session_start",
                format!(
                    "{} must be before session_end {}",
                    raw.session_start, raw.session_end
                ),
            ));
        }

        let page_limit = raw.page_limit.unwrap_or(DEFAULT_PAGE_LIMIT);
        if page_limit == 0 {
            return Err(invalid("page_limit", "must be at least 1"));
        }

        let defaults = RetryPolicy::default();
        let retry = RetryPolicy {
            max_retries: raw.retry.max_retries.unwrap_or(defaults.max_retries),
            base_delay: raw
                .retry
                .base_delay_ms
                .map_or(defaults.base_delay, Duration::from_millis),
            max_delay: raw
                .retry
                .max_delay_ms
                .map_or(defaults.max_delay, Duration::from_millis),
        };
        if retry.base_delay > retry.max_delay {
            return Err(invalid("retry", "base_delay_ms exceeds max_delay_ms"));
        }

        let mut source = SourceSettings::default();
        if let Some(url) = raw.source.base_url {
            if url.trim().is_empty() {
                return Err(invalid("source.base_url", "cannot be empty"));
            }
            source.base_url = url;
        }
        if let Some(secs) = raw.source.timeout_secs {
            if secs == 0 {
                return Err(invalid("source.timeout_secs", "must be at least 1"));
            }
            source.timeout = Duration::from_secs(secs);
        }

        let output = OutputConfig {
            raw_csv: raw.output.raw_csv,
            daily_csv: raw.output.daily_csv,
            sqlite: raw.output.sqlite.map(|s| SqliteOutput {
                database_url: s.database_url,
                raw_table: s.raw_table,
                daily_table: s.daily_table,
                mode: s.mode,
            }),
        };
        if output.daily_csv.is_none() && output.sqlite.is_none() {
            return Err(invalid(
                "output",
                "configure daily_csv or [output.sqlite] for the daily bars",
            ));
        }

        Ok(Config {
            symbol,
            interval: raw.interval,
            tz,
            session_start: raw.session_start,
            session_end: raw.session_end,
            page_limit,
            min_request_interval: Duration::from_millis(
                raw.min_request_interval_ms
                    .unwrap_or(DEFAULT_MIN_REQUEST_INTERVAL_MS),
            ),
            start_date: raw.start_date,
            retry,
            source,
            output,
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    const FULL: &str = r#"
symbol = "BTCUSDT"
interval = "30m"
reference_timezone = "America/New_York"
session_start = "08:30:00"
session_end = "15:30:00"
page_limit = 500
min_request_interval_ms = 250
start_date = "2019-09-08T00:00:00"

[retry]
max_retries = 3
base_delay_ms = 500

[source]
base_url = "http://localhost:8080"
timeout_secs = 5

[output]
raw_csv = "raw.csv"
daily_csv = "rth.csv"

[output.sqlite]
database_url = "market_data.db"
raw_table = "market_data"
daily_table = "market_data_rth"
mode = "upsert"
"#;

    fn minimal(extra: &str) -> String {
        format!(
            r#"
symbol = "BTCUSDT"
interval = "30m"
reference_timezone = "America/New_York"
session_start = "08:30:00"
session_end = "15:30:00"
start_date = "2019-09-08T00:00:00"
{extra}
[output]
daily_csv = "rth.csv"
"#
        )
    }

    #[test]
    fn full_config_is_typed() {
        let cfg = Config::from_toml_str(FULL).unwrap();

        assert_eq!(cfg.symbol, "BTCUSDT");
        assert_eq!(cfg.interval, Interval::minutes(30).unwrap());
        assert_eq!(cfg.tz, chrono_tz::America::New_York);
        assert_eq!(cfg.session_start, NaiveTime::from_hms_opt(8, 30, 0).unwrap());
        assert_eq!(cfg.page_limit, 500);
        assert_eq!(cfg.min_request_interval, Duration::from_millis(250));
        assert_eq!(
            cfg.start_date,
            NaiveDate::from_ymd_opt(2019, 9, 8)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap()
        );
        assert_eq!(cfg.retry.max_retries, 3);
        assert_eq!(cfg.retry.base_delay, Duration::from_millis(500));
        assert_eq!(cfg.retry.max_delay, RetryPolicy::default().max_delay);
        assert_eq!(cfg.source.base_url, "http://localhost:8080");
        assert_eq!(cfg.source.timeout, Duration::from_secs(5));

        let sqlite = cfg.output.sqlite.unwrap();
        assert_eq!(sqlite.mode, WriteMode::Upsert);
        assert_eq!(sqlite.raw_table.as_deref(), Some("market_data"));
        assert_eq!(cfg.output.raw_csv, Some(PathBuf::from("raw.csv")));
    }

    #[test]
    fn defaults_fill_optional_keys() {
        let cfg = Config::from_toml_str(&minimal("")).unwrap();

        assert_eq!(cfg.page_limit, DEFAULT_PAGE_LIMIT);
        assert_eq!(cfg.min_request_interval, Duration::from_secs(1));
        assert_eq!(cfg.retry, RetryPolicy::default());
        assert_eq!(cfg.source.base_url, SourceSettings::default().base_url);
        assert_eq!(cfg.output.raw_csv, None);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = Config::from_toml_str(&minimal("sesion_end = \"16:00:00\"")).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)), "{err}");
    }

    #[test]
    fn session_bounds_must_be_ordered() {
        let text = minimal("").replace("\"15:30:00\"", "\"08:00:00\"");
        let err = Config::from_toml_str(&text).unwrap_err();
        assert!(
            matches!(err, ConfigError::Invalid { field: "session_start", .. }),
            "{err}"
        );
    }

    #[test]
    fn zone_must_exist() {
        let text = minimal("").replace("America/New_York", "America/Gotham");
        let err = Config::from_toml_str(&text).unwrap_err();
        assert!(
            matches!(err, ConfigError::Invalid { field: "reference_timezone", .. }),
            "{err}"
        );
    }

    #[test]
    fn monthly_interval_is_rejected() {
        let text = minimal("").replace("\"30m\"", "\"1M\"");
        assert!(Config::from_toml_str(&text).is_err());
    }

    #[test]
    fn zero_page_limit_is_rejected() {
        let err = Config::from_toml_str(&minimal("page_limit = 0")).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "page_limit", .. }));
    }

    #[test]
    fn a_daily_output_is_required() {
        let text = minimal("").replace("daily_csv = \"rth.csv\"", "raw_csv = \"raw.csv\"");
        let err = Config::from_toml_str(&text).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "output", .. }));
    }

    #[test]
    fn missing_file_names_the_path() {
        let err = Config::load("/definitely/not/here.toml").unwrap_err();
        assert!(err.to_string().contains("/definitely/not/here.toml"));
    }
}
