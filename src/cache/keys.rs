//! Cache key builders, one per data category
//!
//! Every key is `<category prefix>:<identifier>`. Prefixes are distinct, so
//! identifiers from different categories can never collide.

use sha2::{Digest, Sha256};

/// Key for the full list of currencies
pub const CURRENCY_LIST_KEY: &str = "currencies:list";

const CURRENCY_DETAIL_PREFIX: &str = "currency:detail";
const WIKI_SEARCH_PREFIX: &str = "wiki:search";
const WIKI_PAGE_PREFIX: &str = "wiki:page";
const WALLET_PREFIX: &str = "wallet";

/// Normalizes a free-text search query: trims, collapses inner whitespace
/// runs to one space and lowercases.
pub fn normalize_query(query: &str) -> String {
    query
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Returns the cache key for the currency list
pub fn currency_list_key() -> String {
    CURRENCY_LIST_KEY.to_string()
}

/// Returns the cache key for a single currency
pub fn currency_detail_key(id: u32) -> String {
    format!("{CURRENCY_DETAIL_PREFIX}:{id}")
}

/// Returns the cache key for wiki search results
///
/// The query is normalized, so `" Dragon  Bash "` and `"dragon bash"` share a key.
pub fn wiki_search_key(query: &str) -> String {
    format!("{WIKI_SEARCH_PREFIX}:{}", normalize_query(query))
}

/// Returns the cache key for a wiki page extract
///
/// Titles are case-sensitive on the wiki and are used as-is.
pub fn wiki_page_key(title: &str) -> String {
    format!("{WIKI_PAGE_PREFIX}:{title}")
}

/// Returns the cache key for an account's wallet
///
/// The API key is hashed so the credential itself is never stored.
pub fn wallet_key(api_key: &str) -> String {
    format!("{WALLET_PREFIX}:{}", hash_api_key(api_key))
}

/// Hex-encoded SHA-256 of an API key
pub fn hash_api_key(api_key: &str) -> String {
    format!("{:x}", Sha256::digest(api_key.as_bytes()))
}
