use chrono::Local;
use serde::{Deserialize, Serialize};

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One observed gas price, as stored in the history log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceRecord {
    pub timestamp: String,
    pub price_gwei: f64,
}

impl PriceRecord {
    /// Stamps `price_gwei` with the current local wall-clock time.
    pub fn now(price_gwei: f64) -> Self {
        Self {
            timestamp: Local::now().format(TIMESTAMP_FORMAT).to_string(),
            price_gwei,
        }
    }
}
