//! Cache module for sharing upstream responses across requests
//!
//! This module provides a process-wide, in-memory cache manager with per-entry
//! TTL (time-to-live) values. Each data category (currencies, wiki search, wiki
//! pages, wallets) has its own key builder and TTL. Expired entries are never
//! returned, and a background sweeper bounds memory by purging them periodically.

pub mod keys;
mod manager;
mod sweeper;

pub use manager::{CacheError, CacheManager, CacheValue};
pub use sweeper::SweeperHandle;

use std::time::Duration;

/// TTL for static reference data (currency list and details): one year
pub const STATIC_DATA_TTL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// TTL for wiki search results and page extracts: one day
pub const WIKI_DATA_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// TTL for per-account wallet data: five minutes
pub const WALLET_DATA_TTL: Duration = Duration::from_secs(5 * 60);

/// Default interval between expiry sweeps
pub const CLEANUP_INTERVAL: Duration = Duration::from_secs(10 * 60);
