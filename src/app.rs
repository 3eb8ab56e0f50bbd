//! Orchestration facade
//!
//! `App` owns the shared cache and both fetchers, and exposes the named
//! operations the tool layer calls. It holds no caching or HTTP logic of its
//! own: it delegates, races operations against cancellation, and serializes
//! results (or error messages) back to text.

use reqwest::Url;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::cache::{CacheManager, SweeperHandle};
use crate::config::Config;
use crate::data::{
    http_client, AccountClient, AccountError, CurrencyData, SearchResponse, WalletData, WikiClient,
    WikiError,
};

/// Results returned when the caller does not give a limit
pub const DEFAULT_SEARCH_LIMIT: u32 = 5;

/// Largest limit passed to the wiki
pub const MAX_SEARCH_LIMIT: u32 = 50;

/// URI of the currency list resource
pub const CURRENCIES_RESOURCE_URI: &str = "gw2://currencies";

/// Errors surfaced by facade operations
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Wiki(#[from] WikiError),

    #[error(transparent)]
    Account(#[from] AccountError),

    /// The caller cancelled the operation before it completed
    #[error("operation cancelled")]
    Cancelled,

    #[error("unknown resource: {0}")]
    UnknownResource(String),

    #[error("Failed to format result: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("invalid base URL {url:?}: {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

/// A named operation with its arguments, as sent by the tool layer
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "operation", rename_all = "snake_case")]
pub enum Operation {
    /// Full-text wiki search
    #[serde(alias = "wiki_search")]
    Search {
        query: String,
        #[serde(default = "default_limit")]
        limit: u32,
    },
    /// Wallet balances for an account
    GetWallet { api_key: String },
    /// Currency details; all currencies when `ids` is absent or empty
    GetCurrencies {
        #[serde(default)]
        ids: Option<Vec<u32>>,
    },
    /// Read a resource by URI
    ReadResource { uri: String },
}

fn default_limit() -> u32 {
    DEFAULT_SEARCH_LIMIT
}

impl Operation {
    /// Prefix for error messages from this operation
    fn failure_label(&self) -> &'static str {
        match self {
            Operation::Search { .. } => "Wiki search failed",
            Operation::GetWallet { .. } => "Failed to get wallet",
            Operation::GetCurrencies { .. } => "Failed to get currencies",
            Operation::ReadResource { .. } => "Failed to read resource",
        }
    }
}

/// Text result of a dispatched operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolOutput {
    /// Whether `text` is an error message rather than a JSON result
    pub is_error: bool,
    pub text: String,
}

impl ToolOutput {
    fn success(text: String) -> Self {
        Self {
            is_error: false,
            text,
        }
    }

    fn error(text: String) -> Self {
        Self {
            is_error: true,
            text,
        }
    }
}

/// Contents of a readable resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceContents {
    pub uri: String,
    pub mime_type: String,
    pub text: String,
}

/// The facade over the cache and both fetchers
#[derive(Debug, Clone)]
pub struct App {
    cache: CacheManager,
    wiki: WikiClient,
    account: AccountClient,
    config: Config,
}

impl App {
    /// Builds an app with a fresh cache
    pub fn new(config: Config) -> Result<Self, AppError> {
        Self::with_cache(config, CacheManager::new())
    }

    /// Builds an app around an existing cache
    ///
    /// Both fetchers share `cache` and a single HTTP client.
    pub fn with_cache(config: Config, cache: CacheManager) -> Result<Self, AppError> {
        let wiki_url = parse_base_url(&config.wiki_base_url)?;
        let api_url = parse_base_url(&config.api_base_url)?;
        let client = http_client(config.request_timeout)?;

        Ok(Self {
            wiki: WikiClient::new(client.clone(), cache.clone(), wiki_url),
            account: AccountClient::new(client, cache.clone(), api_url),
            cache,
            config,
        })
    }

    /// The shared cache, for administration
    pub fn cache(&self) -> &CacheManager {
        &self.cache
    }

    /// Starts the background cache sweep at the configured interval
    pub fn spawn_sweeper(&self) -> SweeperHandle {
        self.cache.spawn_sweeper(self.config.sweep_interval)
    }

    /// Searches the wiki; `limit` is clamped to `1..=MAX_SEARCH_LIMIT`
    pub async fn search(&self, query: &str, limit: u32) -> Result<SearchResponse, AppError> {
        let limit = limit.clamp(1, MAX_SEARCH_LIMIT);
        log::debug!("Wiki search request: query={query:?} limit={limit}");
        Ok(self.wiki.search(query, limit).await?)
    }

    /// Fetches an account's wallet
    pub async fn get_wallet(&self, api_key: &str) -> Result<WalletData, AppError> {
        log::debug!("Wallet request: api_key_length={}", api_key.len());
        Ok(self.account.get_wallet(api_key).await?)
    }

    /// Fetches currencies, all of them when `ids` is `None` or empty
    pub async fn get_currencies(&self, ids: Option<&[u32]>) -> Result<CurrencyData, AppError> {
        log::debug!("Currency request: ids={ids:?}");
        Ok(self.account.get_currencies(ids).await?)
    }

    /// Reads a resource; only `gw2://currencies` exists
    pub async fn read_resource(&self, uri: &str) -> Result<ResourceContents, AppError> {
        if uri != CURRENCIES_RESOURCE_URI {
            return Err(AppError::UnknownResource(uri.to_string()));
        }

        let currencies = self.get_currencies(None).await?;
        Ok(ResourceContents {
            uri: uri.to_string(),
            mime_type: "application/json".to_string(),
            text: serde_json::to_string_pretty(&currencies)?,
        })
    }

    /// Runs an operation and renders its result as text
    ///
    /// If `cancel` fires first, the in-flight operation is dropped (aborting
    /// its upstream requests) and an error output is returned.
    pub async fn dispatch(&self, operation: Operation, cancel: &CancellationToken) -> ToolOutput {
        let label = operation.failure_label();

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(AppError::Cancelled),
            result = self.run(operation) => result,
        };

        match result {
            Ok(text) => ToolOutput::success(text),
            Err(e) => {
                log::debug!("{label}: {e}");
                ToolOutput::error(format!("{label}: {e}"))
            }
        }
    }

    async fn run(&self, operation: Operation) -> Result<String, AppError> {
        let text = match operation {
            Operation::Search { query, limit } => {
                serde_json::to_string_pretty(&self.search(&query, limit).await?)?
            }
            Operation::GetWallet { api_key } => {
                serde_json::to_string_pretty(&self.get_wallet(&api_key).await?)?
            }
            Operation::GetCurrencies { ids } => {
                serde_json::to_string_pretty(&self.get_currencies(ids.as_deref()).await?)?
            }
            Operation::ReadResource { uri } => self.read_resource(&uri).await?.text,
        };
        Ok(text)
    }
}

fn parse_base_url(url: &str) -> Result<Url, AppError> {
    let parsed = Url::parse(url).map_err(|e| AppError::InvalidBaseUrl {
        url: url.to_string(),
        reason: e.to_string(),
    })?;

    if parsed.cannot_be_a_base() {
        return Err(AppError::InvalidBaseUrl {
            url: url.to_string(),
            reason: "URL cannot be used as a base".to_string(),
        });
    }

    Ok(parsed)
}
