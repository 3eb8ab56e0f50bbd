//! gw2ctx library
//!
//! Guild Wars 2 wiki search and account data for language models. The cache,
//! fetchers and facade are exposed for the binary and for integration tests.

pub mod app;
pub mod cache;
pub mod cli;
pub mod config;
pub mod data;
pub mod server;

pub use app::{App, AppError, Operation, ToolOutput};
pub use cache::CacheManager;
pub use config::Config;
