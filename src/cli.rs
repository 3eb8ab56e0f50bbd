//! Command-line interface parsing for gw2ctx
//!
//! This module handles parsing of CLI arguments using clap: global upstream
//! and logging options plus one subcommand per facade operation, and `serve`
//! for the line-delimited JSON loop.

use clap::{Parser, Subcommand};
use std::time::Duration;

use crate::app::{Operation, DEFAULT_SEARCH_LIMIT};
use crate::config::Config;
use crate::data::account::API_BASE_URL;
use crate::data::wiki::WIKI_BASE_URL;

/// gw2ctx - Guild Wars 2 wiki and account data for language models
#[derive(Parser, Debug)]
#[command(name = "gw2ctx")]
#[command(about = "Guild Wars 2 wiki search and account data, behind a shared cache")]
#[command(version)]
pub struct Cli {
    /// Enable debug logging on stderr
    #[arg(long, global = true)]
    pub debug: bool,

    /// Root URL of the wiki
    #[arg(long, global = true, env = "GW2CTX_WIKI_URL", default_value = WIKI_BASE_URL)]
    pub wiki_url: String,

    /// Root URL of the account API
    #[arg(long, global = true, env = "GW2CTX_API_URL", default_value = API_BASE_URL)]
    pub api_url: String,

    /// Timeout for each upstream request, in seconds
    #[arg(
        long,
        global = true,
        default_value_t = 30,
        value_parser = clap::value_parser!(u64).range(1..=60)
    )]
    pub timeout_secs: u64,

    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Search the wiki
    ///
    /// Examples:
    ///   gw2ctx search Dragon Bash
    ///   gw2ctx search --limit 3 "mystic coin"
    Search {
        /// Search terms
        #[arg(required = true, num_args = 1..)]
        query: Vec<String>,

        /// Maximum number of results
        #[arg(short, long, default_value_t = DEFAULT_SEARCH_LIMIT)]
        limit: u32,
    },

    /// Show an account's wallet
    Wallet {
        /// API key with the `wallet` permission
        #[arg(long, env = "GW2_API_KEY", hide_env_values = true)]
        api_key: String,
    },

    /// Show currency details, all currencies when no ids are given
    Currencies {
        /// Comma-separated currency ids
        #[arg(long, value_delimiter = ',')]
        ids: Vec<u32>,
    },

    /// Answer line-delimited JSON requests on stdin until EOF or Ctrl-C
    Serve,
}

impl Command {
    /// The facade operation for a one-shot subcommand; `None` for `serve`
    pub fn operation(&self) -> Option<Operation> {
        match self {
            Command::Search { query, limit } => Some(Operation::Search {
                query: query.join(" "),
                limit: *limit,
            }),
            Command::Wallet { api_key } => Some(Operation::GetWallet {
                api_key: api_key.clone(),
            }),
            Command::Currencies { ids } => Some(Operation::GetCurrencies {
                ids: if ids.is_empty() { None } else { Some(ids.clone()) },
            }),
            Command::Serve => None,
        }
    }
}

impl Config {
    /// Creates a Config from parsed CLI arguments
    pub fn from_cli(cli: &Cli) -> Self {
        Config {
            wiki_base_url: cli.wiki_url.clone(),
            api_base_url: cli.api_url.clone(),
            request_timeout: Duration::from_secs(cli.timeout_secs),
            ..Config::default()
        }
    }
}
