//! Small helpers shared by the ingestion and session crates.

pub mod env;
pub mod tz;
