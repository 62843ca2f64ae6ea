use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode, header};
use secrecy::{ExposeSecret, SecretString};
use shared_utils::env::{get_env_var, get_optional_env_var};
use snafu::ResultExt;
use tracing::debug;

use crate::{
    models::{bar::Bar, request_params::PageQuery},
    providers::{
        ApiKeyHeaderSnafu, BarSource, HttpClientSnafu, IncompleteCredentialsSnafu, RateLimitedSnafu,
        SourceError, SourceInitError, TransportSnafu, UnavailableSnafu,
        binance_rest::{
            params::{construct_params, validate_interval, validate_limit},
            response::parse_klines,
        },
    },
};

pub const DEFAULT_BASE_URL: &str = "https://fapi.binance.com";
const KLINES_PATH: &str = "/fapi/v1/klines";
/// Binance answers 418 once an IP keeps ignoring 429s.
const IM_A_TEAPOT: u16 = 418;

/// API key pair. Klines are public, so these are optional for this source.
#[derive(Debug)]
pub struct BinanceCredentials {
    pub api_key: SecretString,
    pub secret_key: SecretString,
}

impl BinanceCredentials {
    /// Reads the key pair from `BINANCE_API_KEY` and `BINANCE_SECRET_KEY`.
    pub fn from_env() -> Result<Self, SourceInitError> {
        let api_key = get_env_var("BINANCE_API_KEY").context(IncompleteCredentialsSnafu)?;
        let secret_key = get_env_var("BINANCE_SECRET_KEY").context(IncompleteCredentialsSnafu)?;
        Ok(Self {
            api_key: SecretString::from(api_key),
            secret_key: SecretString::from(secret_key),
        })
    }

    /// Like [`BinanceCredentials::from_env`], but `Ok(None)` when no API key is set.
    ///
    /// A key without its secret is still an error.
    pub fn from_env_if_present() -> Result<Option<Self>, SourceInitError> {
        if get_optional_env_var("BINANCE_API_KEY").is_none() {
            return Ok(None);
        }
        Self::from_env().map(Some)
    }
}

/// Transport settings for [`BinanceFuturesSource`].
#[derive(Debug, Clone)]
pub struct SourceSettings {
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

pub struct BinanceFuturesSource {
    client: Client,
    klines_url: String,
    _credentials: Option<BinanceCredentials>,
}

impl BinanceFuturesSource {
    /// Creates a new Binance futures source.
    ///
    /// When credentials are given the API key travels as the `X-MBX-APIKEY`
    /// header on every request.
    pub fn new(
        settings: SourceSettings,
        credentials: Option<BinanceCredentials>,
    ) -> Result<Self, SourceInitError> {
        let mut headers = header::HeaderMap::new();
        if let Some(creds) = &credentials {
            let mut value = header::HeaderValue::from_str(creds.api_key.expose_secret())
                .context(ApiKeyHeaderSnafu)?;
            value.set_sensitive(true);
            headers.insert("X-MBX-APIKEY", value);
        }

        let client = Client::builder()
            .default_headers(headers)
            .timeout(settings.timeout)
            .build()
            .context(HttpClientSnafu)?;

        Ok(Self {
            client,
            klines_url: format!("{}{}", settings.base_url.trim_end_matches('/'), KLINES_PATH),
            _credentials: credentials,
        })
    }
}

#[async_trait]
impl BarSource for BinanceFuturesSource {
    async fn query(&self, query: &PageQuery) -> Result<Vec<Bar>, SourceError> {
        validate_interval(&query.interval)?;
        validate_limit(query.limit)?;

        let response = self
            .client
            .get(&self.klines_url)
            .query(&construct_params(query))
            .send()
            .await
            .context(TransportSnafu)?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS || status.as_u16() == IM_A_TEAPOT {
            let retry_after = response
                .headers()
                .get(header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_secs);
            return RateLimitedSnafu { retry_after }.fail();
        }

        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown API error".to_string());
            return UnavailableSnafu {
                message: format!("HTTP {status}: {body}"),
            }
            .fail();
        }

        let body = response.text().await.context(TransportSnafu)?;
        let bars = parse_klines(&body)?;
        debug!(
            symbol = %query.symbol,
            start_ms = query.start_ms(),
            returned = bars.len(),
            "klines page decoded"
        );
        Ok(bars)
    }
}
