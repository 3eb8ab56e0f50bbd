//! Mock wiki and account API shared by the integration tests
//!
//! Spawns an axum server on a random local port that mimics the MediaWiki
//! search/extract API and the GW2 wallet/currency endpoints, counting every
//! request so tests can prove when the cache short-circuits upstream calls.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use tokio::net::TcpListener;

use gw2ctx::{App, CacheManager, Config};

/// API key the mock wallet endpoint accepts
pub const VALID_API_KEY: &str = "VALID-KEY-0000";

/// Behaviour of the mock upstream
#[derive(Debug, Clone)]
pub struct MockOptions {
    /// `(title, snippet)` pairs returned by every search
    pub search_hits: Vec<(String, String)>,
    /// Titles whose extract request fails with a 500
    pub failing_extracts: Vec<String>,
    /// Status and raw body to answer searches with instead of hits
    pub search_override: Option<(u16, String)>,
    /// Delay before answering a search
    pub search_delay: Option<Duration>,
    /// Status to answer currency requests with instead of data
    pub currencies_status: Option<u16>,
}

impl Default for MockOptions {
    fn default() -> Self {
        Self {
            search_hits: vec![(
                "Dragon Bash".to_string(),
                "<span class=\"searchmatch\">Dragon</span> Bash is a festival".to_string(),
            )],
            failing_extracts: Vec::new(),
            search_override: None,
            search_delay: None,
            currencies_status: None,
        }
    }
}

/// Request counters and captured parameters
#[derive(Debug, Default)]
pub struct Hits {
    pub search: AtomicUsize,
    pub extract: AtomicUsize,
    pub wallet: AtomicUsize,
    pub currencies: AtomicUsize,
    pub search_params: Mutex<Vec<HashMap<String, String>>>,
    pub extract_titles: Mutex<Vec<String>>,
    pub currency_ids: Mutex<Vec<String>>,
    pub user_agents: Mutex<Vec<String>>,
}

impl Hits {
    pub fn searches(&self) -> usize {
        self.search.load(Ordering::SeqCst)
    }

    pub fn extracts(&self) -> usize {
        self.extract.load(Ordering::SeqCst)
    }

    pub fn wallets(&self) -> usize {
        self.wallet.load(Ordering::SeqCst)
    }

    pub fn currency_requests(&self) -> usize {
        self.currencies.load(Ordering::SeqCst)
    }
}

struct MockState {
    options: MockOptions,
    hits: Arc<Hits>,
}

/// A running mock upstream
pub struct MockUpstream {
    pub base_url: String,
    pub hits: Arc<Hits>,
}

impl MockUpstream {
    /// Spawns the mock on an available port
    pub async fn start(options: MockOptions) -> Self {
        let hits = Arc::new(Hits::default());
        let state = Arc::new(MockState {
            options,
            hits: Arc::clone(&hits),
        });

        let app = Router::new()
            .route("/api.php", get(wiki_api))
            .route("/v2/account/wallet", get(wallet))
            .route("/v2/currencies", get(currencies))
            .with_state(state);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{}", addr),
            hits,
        }
    }

    /// Config pointing both upstreams at this mock
    pub fn config(&self) -> Config {
        Config {
            wiki_base_url: self.base_url.clone(),
            api_base_url: self.base_url.clone(),
            request_timeout: Duration::from_secs(5),
            ..Config::default()
        }
    }

    /// An app wired to this mock, sharing `cache`
    pub fn app(&self, cache: CacheManager) -> App {
        App::with_cache(self.config(), cache).unwrap()
    }
}

fn record_user_agent(state: &MockState, headers: &HeaderMap) {
    if let Some(agent) = headers.get(header::USER_AGENT).and_then(|v| v.to_str().ok()) {
        state.hits.user_agents.lock().unwrap().push(agent.to_string());
    }
}

async fn wiki_api(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    record_user_agent(&state, &headers);

    if params.get("list").map(String::as_str) == Some("search") {
        state.hits.search.fetch_add(1, Ordering::SeqCst);
        state.hits.search_params.lock().unwrap().push(params.clone());

        if let Some(delay) = state.options.search_delay {
            tokio::time::sleep(delay).await;
        }

        if let Some((status, body)) = &state.options.search_override {
            let status = StatusCode::from_u16(*status).unwrap();
            return (status, body.clone()).into_response();
        }

        let search: Vec<Value> = state
            .options
            .search_hits
            .iter()
            .enumerate()
            .map(|(i, (title, snippet))| {
                json!({
                    "ns": 0,
                    "title": title,
                    "pageid": 1000 + i,
                    "size": 5000,
                    "wordcount": 800,
                    "snippet": snippet,
                    "timestamp": "2023-07-01T12:00:00Z"
                })
            })
            .collect();

        return Json(json!({
            "batchcomplete": "",
            "query": {
                "searchinfo": { "totalhits": search.len() },
                "search": search
            }
        }))
        .into_response();
    }

    if params.get("prop").map(String::as_str) == Some("extracts") {
        state.hits.extract.fetch_add(1, Ordering::SeqCst);
        let title = params.get("titles").cloned().unwrap_or_default();
        state.hits.extract_titles.lock().unwrap().push(title.clone());

        if state.options.failing_extracts.contains(&title) {
            return (StatusCode::INTERNAL_SERVER_ERROR, "extract backend down").into_response();
        }

        return Json(json!({
            "batchcomplete": "",
            "query": {
                "pages": {
                    "4242": {
                        "pageid": 4242,
                        "ns": 0,
                        "title": title,
                        "extract": format!("{title} is described here.")
                    }
                }
            }
        }))
        .into_response();
    }

    (StatusCode::BAD_REQUEST, "unsupported action").into_response()
}

fn all_currencies() -> Vec<Value> {
    vec![
        json!({"id": 2, "name": "Karma", "description": "Earned everywhere.", "order": 102, "icon": "karma.png"}),
        json!({"id": 1, "name": "Coin", "description": "The primary currency.", "order": 101, "icon": "coin.png"}),
        json!({"id": 4, "name": "Gem", "description": "Premium currency.", "order": 103, "icon": "gem.png"}),
    ]
}

async fn currencies(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    record_user_agent(&state, &headers);
    state.hits.currencies.fetch_add(1, Ordering::SeqCst);

    let ids = params.get("ids").cloned().unwrap_or_default();
    state.hits.currency_ids.lock().unwrap().push(ids.clone());

    if let Some(status) = state.options.currencies_status {
        let status = StatusCode::from_u16(status).unwrap();
        return (status, Json(json!({"text": "API not active"}))).into_response();
    }

    if ids == "all" {
        return Json(Value::Array(all_currencies())).into_response();
    }

    let wanted: Vec<u64> = ids.split(',').filter_map(|id| id.parse().ok()).collect();
    let matching: Vec<Value> = all_currencies()
        .into_iter()
        .filter(|c| wanted.contains(&c["id"].as_u64().unwrap_or_default()))
        .collect();

    if matching.is_empty() {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({"text": "all ids provided are invalid"})),
        )
            .into_response();
    }

    let status = if matching.len() < wanted.len() {
        StatusCode::PARTIAL_CONTENT
    } else {
        StatusCode::OK
    };
    (status, Json(Value::Array(matching))).into_response()
}

async fn wallet(State(state): State<Arc<MockState>>, headers: HeaderMap) -> Response {
    record_user_agent(&state, &headers);
    state.hits.wallet.fetch_add(1, Ordering::SeqCst);

    let authorized = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(|v| v == format!("Bearer {VALID_API_KEY}"))
        .unwrap_or(false);

    if !authorized {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"text": "Invalid access token"})),
        )
            .into_response();
    }

    Json(json!([
        {"id": 1, "value": 1234567},
        {"id": 2, "value": 89000},
        {"id": 77, "value": 3}
    ]))
    .into_response()
}
