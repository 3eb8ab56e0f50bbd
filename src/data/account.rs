//! Guild Wars 2 account API client
//!
//! Fetches currency metadata and account wallets from the official API.
//! Currencies are static reference data and cached for a long time, both as a
//! full list and per id; wallets are per-account and cached for minutes under
//! a hash of the API key.

use chrono::Utc;
use reqwest::{Client, RequestBuilder, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashMap;
use thiserror::Error;

use super::{body_snippet, endpoint, Currency, CurrencyData, WalletData, WalletEntry};
use crate::cache::{keys, CacheManager, STATIC_DATA_TTL, WALLET_DATA_TTL};

/// Base URL of the official Guild Wars 2 API
pub const API_BASE_URL: &str = "https://api.guildwars2.com";

/// Errors that can occur when querying the account API
#[derive(Debug, Error)]
pub enum AccountError {
    /// No API key was supplied
    #[error("an API key is required")]
    MissingApiKey,

    /// HTTP request failed (network, timeout, aborted)
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    /// The API answered with a non-success status
    #[error("GW2 API request failed with status {status}: {body}")]
    Status { status: u16, body: String },

    /// Failed to parse JSON response
    #[error("Failed to parse JSON response: {0}")]
    ParseError(#[from] serde_json::Error),
}

/// A wallet balance as returned by `/v2/account/wallet`
#[derive(Debug, Deserialize)]
struct WalletRecord {
    id: u32,
    value: u64,
}

/// Client for the account and currency endpoints
#[derive(Debug, Clone)]
pub struct AccountClient {
    /// HTTP client shared with the other fetchers
    http_client: Client,
    /// Cache shared with the other fetchers
    cache: CacheManager,
    wallet_url: Url,
    currencies_url: Url,
}

impl AccountClient {
    /// Creates a new AccountClient for the API rooted at `base_url`
    pub fn new(http_client: Client, cache: CacheManager, base_url: Url) -> Self {
        Self {
            http_client,
            cache,
            wallet_url: endpoint(&base_url, &["v2", "account", "wallet"]),
            currencies_url: endpoint(&base_url, &["v2", "currencies"]),
        }
    }

    /// Fetches currency details
    ///
    /// # Arguments
    /// * `ids` - Currencies to fetch; `None` or an empty slice fetches all of them
    ///
    /// # Returns
    /// * With ids: the known currencies in the requested order, duplicates
    ///   removed and ids unknown upstream skipped
    /// * Without ids: every currency, sorted by the API's display order
    pub async fn get_currencies(&self, ids: Option<&[u32]>) -> Result<CurrencyData, AccountError> {
        match ids {
            Some(ids) if !ids.is_empty() => self.currencies_by_id(ids).await,
            _ => self.all_currencies().await,
        }
    }

    /// Fetches an account's wallet, with currency details where available
    ///
    /// # Behavior
    /// - Cached for five minutes under a hash of the API key
    /// - The wallet and the currency list are fetched concurrently; if the
    ///   currency list fails, balances are returned without details
    pub async fn get_wallet(&self, api_key: &str) -> Result<WalletData, AccountError> {
        let api_key = api_key.trim();
        if api_key.is_empty() {
            return Err(AccountError::MissingApiKey);
        }

        let cache_key = keys::wallet_key(api_key);
        if let Some(cached) = self.cache.get_json::<WalletData>(&cache_key) {
            log::debug!("Wallet cache hit");
            return Ok(cached);
        }

        log::debug!("Wallet cache miss, fetching from API");

        let (records, currencies) =
            futures::join!(self.fetch_wallet(api_key), self.all_currencies());
        let records = records?;

        let details: HashMap<u32, Currency> = match currencies {
            Ok(data) => data.currencies.into_iter().map(|c| (c.id, c)).collect(),
            Err(e) => {
                log::warn!("Failed to get currency details for wallet: {e}");
                HashMap::new()
            }
        };

        let currencies: Vec<WalletEntry> = records
            .into_iter()
            .map(|record| {
                let detail = details.get(&record.id);
                WalletEntry {
                    id: record.id,
                    value: record.value,
                    name: detail.map(|c| c.name.clone()),
                    description: detail.map(|c| c.description.clone()),
                    icon: detail.map(|c| c.icon.clone()),
                }
            })
            .collect();

        let wallet = WalletData {
            total_currencies: currencies.len(),
            currencies,
            fetched_at: Utc::now(),
        };

        if let Err(e) = self.cache.set_json(cache_key, &wallet, WALLET_DATA_TTL) {
            log::warn!("Failed to cache wallet: {e}");
        }

        Ok(wallet)
    }

    async fn all_currencies(&self) -> Result<CurrencyData, AccountError> {
        let cache_key = keys::currency_list_key();
        if let Some(cached) = self.cache.get_json::<CurrencyData>(&cache_key) {
            log::debug!("Currency list cache hit");
            return Ok(cached);
        }

        log::debug!("Currency list cache miss, fetching from API");

        let mut currencies = self.fetch_currencies("all").await?;
        currencies.sort_by_key(|c| (c.order, c.id));
        self.cache_details(&currencies);

        let data = CurrencyData {
            total: currencies.len(),
            currencies,
            fetched_at: Utc::now(),
        };

        if let Err(e) = self.cache.set_json(cache_key, &data, STATIC_DATA_TTL) {
            log::warn!("Failed to cache currency list: {e}");
        }

        Ok(data)
    }

    async fn currencies_by_id(&self, ids: &[u32]) -> Result<CurrencyData, AccountError> {
        let mut requested: Vec<u32> = Vec::with_capacity(ids.len());
        for id in ids {
            if !requested.contains(id) {
                requested.push(*id);
            }
        }

        let mut found: HashMap<u32, Currency> = HashMap::new();
        let mut missing: Vec<u32> = Vec::new();
        for id in &requested {
            match self.cache.get_json::<Currency>(&keys::currency_detail_key(*id)) {
                Some(currency) => {
                    found.insert(*id, currency);
                }
                None => missing.push(*id),
            }
        }

        if !missing.is_empty() {
            log::debug!("Fetching {} uncached currencies from API", missing.len());
            let joined = missing
                .iter()
                .map(u32::to_string)
                .collect::<Vec<_>>()
                .join(",");
            let fetched = self.fetch_currencies(&joined).await?;
            self.cache_details(&fetched);
            found.extend(fetched.into_iter().map(|c| (c.id, c)));
        }

        let currencies: Vec<Currency> = requested
            .iter()
            .filter_map(|id| found.remove(id))
            .collect();

        Ok(CurrencyData {
            total: currencies.len(),
            currencies,
            fetched_at: Utc::now(),
        })
    }

    fn cache_details(&self, currencies: &[Currency]) {
        for currency in currencies {
            let key = keys::currency_detail_key(currency.id);
            if let Err(e) = self.cache.set_json(key, currency, STATIC_DATA_TTL) {
                log::warn!("Failed to cache currency {}: {e}", currency.id);
            }
        }
    }

    async fn fetch_currencies(&self, ids: &str) -> Result<Vec<Currency>, AccountError> {
        let request = self
            .http_client
            .get(self.currencies_url.clone())
            .query(&[("ids", ids)]);
        fetch_json(request).await
    }

    async fn fetch_wallet(&self, api_key: &str) -> Result<Vec<WalletRecord>, AccountError> {
        let request = self
            .http_client
            .get(self.wallet_url.clone())
            .bearer_auth(api_key);
        fetch_json(request).await
    }
}

/// Sends a request and decodes a JSON body
///
/// 206 Partial Content (some requested ids unknown) counts as success.
async fn fetch_json<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, AccountError> {
    let response = request.send().await?;
    let status = response.status();
    let text = response.text().await?;

    if !status.is_success() {
        return Err(AccountError::Status {
            status: status.as_u16(),
            body: body_snippet(&text),
        });
    }

    Ok(serde_json::from_str(&text)?)
}
