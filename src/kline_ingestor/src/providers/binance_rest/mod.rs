//! Binance USDⓈ-M futures klines (`GET /fapi/v1/klines`).

pub mod params;
pub mod provider;
pub mod response;

pub use provider::{BinanceCredentials, BinanceFuturesSource, SourceSettings};
