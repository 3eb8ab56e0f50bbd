//! Core data models and upstream clients
//!
//! This module contains the result types returned to callers along with the
//! wiki and account API clients that produce them.

pub mod account;
pub mod wiki;

pub use account::{AccountClient, AccountError};
pub use wiki::{clean_snippet, WikiClient, WikiError};

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};

/// Identifier sent with every outbound request
pub const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Upper bound on any single outbound request
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Longest upstream body kept in a status error
const ERROR_BODY_LIMIT: usize = 512;

/// Builds the HTTP client shared by all fetchers
pub fn http_client(timeout: Duration) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .build()
}

/// Appends path segments to a base URL, percent-encoding each one
///
/// `endpoint("https://wiki.guildwars2.com", &["wiki", "Dragon Bash"])` yields
/// `https://wiki.guildwars2.com/wiki/Dragon%20Bash`.
pub(crate) fn endpoint(base: &Url, segments: &[&str]) -> Url {
    let mut url = base.clone();
    // Only fails for cannot-be-a-base URLs, which are rejected at startup
    if let Ok(mut path) = url.path_segments_mut() {
        path.pop_if_empty().extend(segments);
    }
    url
}

/// Truncates an upstream error body on a char boundary
pub(crate) fn body_snippet(body: &str) -> String {
    match body.char_indices().nth(ERROR_BODY_LIMIT) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}

/// A single wiki search hit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    /// Page title
    pub title: String,
    /// Wiki page identifier
    #[serde(rename = "pageid")]
    pub page_id: u64,
    /// Page size in bytes
    pub size: u64,
    /// Number of words on the page
    #[serde(rename = "wordcount")]
    pub word_count: u64,
    /// Matching text with highlighting removed
    pub snippet: String,
    /// Last edit timestamp as reported by the wiki
    pub timestamp: String,
    /// Canonical page URL
    pub url: String,
    /// Plain-text introduction, empty when it could not be fetched
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub extract: String,
}

/// A complete wiki search response, as cached and returned
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    /// The query as given by the caller
    pub query: String,
    /// Results in the wiki's ranking order
    pub results: Vec<SearchResult>,
    /// Number of results
    pub total: usize,
    /// When the results were fetched
    pub searched_at: DateTime<Utc>,
}

/// A Guild Wars 2 currency
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Currency {
    pub id: u32,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub icon: String,
    #[serde(default)]
    pub order: i32,
}

/// A set of currencies
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrencyData {
    pub currencies: Vec<Currency>,
    pub total: usize,
    pub fetched_at: DateTime<Utc>,
}

/// One currency balance in a wallet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalletEntry {
    /// Currency id
    pub id: u32,
    /// Amount held
    pub value: u64,
    /// Currency name, when currency details were available
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

/// An account's wallet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalletData {
    pub currencies: Vec<WalletEntry>,
    pub total_currencies: usize,
    pub fetched_at: DateTime<Utc>,
}
