//! Runtime configuration
//!
//! Upstream locations and timing knobs. Defaults point at the production
//! wiki and API; tests and mirrors override the base URLs.

use std::time::Duration;

use crate::cache::CLEANUP_INTERVAL;
use crate::data::account::API_BASE_URL;
use crate::data::wiki::WIKI_BASE_URL;
use crate::data::REQUEST_TIMEOUT;

/// Configuration for building an `App`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Root of the wiki (page URLs and `api.php` are derived from it)
    pub wiki_base_url: String,
    /// Root of the account API (`/v2/...` is appended)
    pub api_base_url: String,
    /// Upper bound on every outbound request
    pub request_timeout: Duration,
    /// Interval between background cache sweeps
    pub sweep_interval: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            wiki_base_url: WIKI_BASE_URL.to_string(),
            api_base_url: API_BASE_URL.to_string(),
            request_timeout: REQUEST_TIMEOUT,
            sweep_interval: CLEANUP_INTERVAL,
        }
    }
}
