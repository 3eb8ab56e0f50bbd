//! Guild Wars 2 wiki API client
//!
//! Runs MediaWiki full-text searches, enriches each hit with a short
//! plain-text extract of its page, and caches both the whole response and
//! every extract.

use chrono::Utc;
use reqwest::{Client, RequestBuilder, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::BTreeMap;
use thiserror::Error;

use super::{body_snippet, endpoint, SearchResponse, SearchResult};
use crate::cache::{keys, CacheManager, WIKI_DATA_TTL};

/// Base URL of the Guild Wars 2 wiki
pub const WIKI_BASE_URL: &str = "https://wiki.guildwars2.com";

/// Maximum extract length requested from the wiki, in characters
const EXTRACT_CHARS: &str = "500";

/// Opening tag the wiki wraps around matched terms in snippets
const SEARCH_MATCH_OPEN: &str = "<span class=\"searchmatch\">";
const SEARCH_MATCH_CLOSE: &str = "</span>";

/// Errors that can occur when querying the wiki
#[derive(Debug, Error)]
pub enum WikiError {
    /// HTTP request failed (network, timeout, aborted)
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    /// The wiki answered with a non-success status
    #[error("wiki API request failed with status {status}: {body}")]
    Status { status: u16, body: String },

    /// The wiki answered 200 with an error envelope
    #[error("wiki API error {code}: {info}")]
    Api { code: String, info: String },

    /// Failed to parse JSON response
    #[error("Failed to parse JSON response: {0}")]
    ParseError(#[from] serde_json::Error),
}

/// MediaWiki error envelope, sent with status 200
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    code: String,
    #[serde(default)]
    info: String,
}

/// Search API response
#[derive(Debug, Deserialize)]
struct SearchEnvelope {
    #[serde(default)]
    error: Option<ApiErrorBody>,
    #[serde(default)]
    query: SearchQuery,
}

#[derive(Debug, Default, Deserialize)]
struct SearchQuery {
    #[serde(default)]
    search: Vec<SearchHit>,
    #[serde(default, rename = "searchinfo")]
    search_info: SearchInfo,
}

#[derive(Debug, Default, Deserialize)]
struct SearchInfo {
    #[serde(default, rename = "totalhits")]
    total_hits: u64,
}

/// A single hit in `query.search`
#[derive(Debug, Deserialize)]
struct SearchHit {
    #[allow(dead_code)]
    #[serde(default)]
    ns: i64,
    title: String,
    #[serde(default)]
    pageid: u64,
    #[serde(default)]
    size: u64,
    #[serde(default)]
    wordcount: u64,
    #[serde(default)]
    snippet: String,
    #[serde(default)]
    timestamp: String,
}

/// Extracts API response
#[derive(Debug, Deserialize)]
struct ExtractEnvelope {
    #[serde(default)]
    error: Option<ApiErrorBody>,
    #[serde(default)]
    query: ExtractQuery,
}

#[derive(Debug, Default, Deserialize)]
struct ExtractQuery {
    /// Keyed by page id; missing pages get negative ids
    #[serde(default)]
    pages: BTreeMap<String, ExtractPage>,
}

#[derive(Debug, Deserialize)]
struct ExtractPage {
    #[serde(default)]
    extract: String,
}

/// Client for searching the Guild Wars 2 wiki
#[derive(Debug, Clone)]
pub struct WikiClient {
    /// HTTP client shared with the other fetchers
    http_client: Client,
    /// Cache shared with the other fetchers
    cache: CacheManager,
    /// Wiki root, used for page URLs
    base_url: Url,
    /// `api.php` under the wiki root
    api_url: Url,
}

impl WikiClient {
    /// Creates a new WikiClient for the wiki rooted at `base_url`
    pub fn new(http_client: Client, cache: CacheManager, base_url: Url) -> Self {
        let api_url = endpoint(&base_url, &["api.php"]);
        Self {
            http_client,
            cache,
            base_url,
            api_url,
        }
    }

    /// Searches the wiki, returning cached results when available
    ///
    /// # Arguments
    /// * `query` - Free-text search terms
    /// * `limit` - Maximum number of results requested from the wiki
    ///
    /// # Behavior
    /// - A cached response for the normalized query is returned as-is
    /// - Otherwise the wiki is searched with the query as given
    /// - Each hit is enriched with its page extract; extract failures are
    ///   logged and leave that hit's extract empty
    /// - The assembled response is cached for a day
    pub async fn search(&self, query: &str, limit: u32) -> Result<SearchResponse, WikiError> {
        let cache_key = keys::wiki_search_key(query);

        if let Some(cached) = self.cache.get_json::<SearchResponse>(&cache_key) {
            log::debug!("Wiki search cache hit for {query:?}");
            return Ok(cached);
        }

        log::debug!("Wiki search cache miss for {query:?}, fetching from API");

        let mut results = self.perform_search(query, limit).await?;

        for result in &mut results {
            match self.page_extract(&result.title).await {
                Ok(extract) => result.extract = extract,
                Err(e) => {
                    log::warn!("Failed to get page extract for {:?}: {e}", result.title);
                }
            }
            result.url = self.page_url(&result.title);
        }

        let response = SearchResponse {
            query: query.to_string(),
            total: results.len(),
            results,
            searched_at: Utc::now(),
        };

        if let Err(e) = self.cache.set_json(cache_key, &response, WIKI_DATA_TTL) {
            log::warn!("Failed to cache search results: {e}");
        }

        Ok(response)
    }

    /// Fetches a short plain-text extract of a page's introduction
    ///
    /// Cached per title. Errors are returned to the caller, which decides
    /// whether they are fatal.
    pub async fn page_extract(&self, title: &str) -> Result<String, WikiError> {
        let cache_key = keys::wiki_page_key(title);

        if let Some(extract) = self.cache.get_string(&cache_key) {
            return Ok(extract);
        }

        let request = self.http_client.get(self.api_url.clone()).query(&[
            ("action", "query"),
            ("format", "json"),
            ("prop", "extracts"),
            ("titles", title),
            ("exintro", "true"),
            ("explaintext", "true"),
            ("exsectionformat", "plain"),
            ("exchars", EXTRACT_CHARS),
        ]);

        let envelope: ExtractEnvelope = fetch_json(request).await?;
        if let Some(error) = envelope.error {
            return Err(WikiError::Api {
                code: error.code,
                info: error.info,
            });
        }

        // A single title yields a single page; take the first if there are more
        let extract = envelope
            .query
            .pages
            .into_values()
            .next()
            .map(|page| page.extract)
            .unwrap_or_default();

        self.cache.set_string(cache_key, extract.clone(), WIKI_DATA_TTL);

        Ok(extract)
    }

    /// Canonical URL of a wiki page
    pub fn page_url(&self, title: &str) -> String {
        endpoint(&self.base_url, &["wiki", title]).to_string()
    }

    /// Runs the search request and converts hits into results
    async fn perform_search(&self, query: &str, limit: u32) -> Result<Vec<SearchResult>, WikiError> {
        let limit = limit.to_string();
        let request = self.http_client.get(self.api_url.clone()).query(&[
            ("action", "query"),
            ("format", "json"),
            ("list", "search"),
            ("srsearch", query),
            ("srlimit", limit.as_str()),
            ("srprop", "size|wordcount|timestamp|snippet"),
        ]);

        let envelope: SearchEnvelope = fetch_json(request).await?;
        if let Some(error) = envelope.error {
            return Err(WikiError::Api {
                code: error.code,
                info: error.info,
            });
        }

        log::debug!(
            "Wiki search for {query:?} returned {} of {} hits",
            envelope.query.search.len(),
            envelope.query.search_info.total_hits
        );

        Ok(envelope
            .query
            .search
            .into_iter()
            .map(|hit| SearchResult {
                title: hit.title,
                page_id: hit.pageid,
                size: hit.size,
                word_count: hit.wordcount,
                snippet: clean_snippet(&hit.snippet),
                timestamp: hit.timestamp,
                url: String::new(),
                extract: String::new(),
            })
            .collect())
    }
}

/// Sends a request and decodes a JSON body, keeping status and parse failures apart
async fn fetch_json<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, WikiError> {
    let response = request.send().await?;
    let status = response.status();
    let text = response.text().await?;

    if !status.is_success() {
        return Err(WikiError::Status {
            status: status.as_u16(),
            body: body_snippet(&text),
        });
    }

    Ok(serde_json::from_str(&text)?)
}

/// Cleans a search snippet for display
///
/// Removes the wiki's match highlighting, decodes `&quot;`, `&amp;`, `&lt;`
/// and `&gt;`, collapses whitespace runs into single spaces and trims.
/// Applying it twice gives the same result as applying it once.
pub fn clean_snippet(snippet: &str) -> String {
    let mut current = clean_once(snippet);
    loop {
        // Decoding can expose new entities or tags (`&amp;lt;`); run to a fixpoint
        let next = clean_once(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}

fn clean_once(snippet: &str) -> String {
    let decoded = snippet
        .replace(SEARCH_MATCH_OPEN, "")
        .replace(SEARCH_MATCH_CLOSE, "")
        .replace("&quot;", "\"")
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">");

    decoded.split_whitespace().collect::<Vec<_>>().join(" ")
}
