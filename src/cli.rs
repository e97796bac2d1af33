//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and environment fallbacks.

use crate::aggregate::CountPolicy;
use clap::Parser;
use std::path::PathBuf;

/// attr-ratings - rating and review aggregation service
///
/// Accepts per-attribute ratings and written reviews over HTTP and folds
/// them into aggregates stored on the item in a remote field store.
///
/// Examples:
///   attr-ratings --shop example.myshopify.com
///   attr-ratings --memory-store --port 8080 --verbose
///   attr-ratings --config ./attr-ratings.toml
///   attr-ratings --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Path to configuration file
    ///
    /// If not specified, looks for attr-ratings.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Interface to bind the HTTP server to
    #[arg(long, value_name = "ADDR")]
    pub bind: Option<String>,

    /// Port to listen on
    #[arg(short, long, env = "PORT", value_name = "PORT")]
    pub port: Option<u16>,

    /// Shop domain hosting the field store (e.g. example.myshopify.com)
    #[arg(long, env = "SHOP", value_name = "DOMAIN")]
    pub shop: Option<String>,

    /// Admin API access token for the field store
    #[arg(long, env = "SHOPIFY_ADMIN_TOKEN", hide_env_values = true, value_name = "TOKEN")]
    pub access_token: Option<String>,

    /// Admin API version (e.g. 2024-04)
    #[arg(long, value_name = "VERSION")]
    pub api_version: Option<String>,

    /// Full GraphQL endpoint URL, overriding --shop and --api-version
    #[arg(long, env = "STORE_ENDPOINT", value_name = "URL")]
    pub store_endpoint: Option<String>,

    /// Store request timeout in seconds (no timeout by default)
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Keep aggregates in process memory instead of the remote store
    ///
    /// Useful for local testing. Data is lost on exit.
    #[arg(long)]
    pub memory_store: bool,

    /// Disable per-item serialization of read-modify-write cycles
    #[arg(long)]
    pub no_serialize: bool,

    /// When to increment total_submissions
    #[arg(long, value_name = "POLICY")]
    pub count_policy: Option<CountPolicyArg>,

    /// Treat a rating of 0 as "not rated" instead of averaging it in
    #[arg(long)]
    pub skip_zero: bool,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (errors only)
    #[arg(short, long)]
    pub quiet: bool,

    /// Generate a default attr-ratings.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Values accepted by --count-policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum CountPolicyArg {
    /// Count every rating submission
    EverySubmission,
    /// Count only submissions carrying at least one accepted value
    WithValuesOnly,
}

impl From<CountPolicyArg> for CountPolicy {
    fn from(arg: CountPolicyArg) -> Self {
        match arg {
            CountPolicyArg::EverySubmission => CountPolicy::EverySubmission,
            CountPolicyArg::WithValuesOnly => CountPolicy::WithValuesOnly,
        }
    }
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if self.port == Some(0) {
            return Err("Port must be between 1 and 65535".to_string());
        }

        if let Some(timeout) = self.timeout {
            if timeout == 0 {
                return Err("Timeout must be at least 1 second".to_string());
            }
        }

        if let Some(ref endpoint) = self.store_endpoint {
            if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
                return Err("Store endpoint must start with 'http://' or 'https://'".to_string());
            }
        }

        if !self.memory_store {
            let has_token = self
                .access_token
                .as_deref()
                .is_some_and(|token| !token.trim().is_empty());
            if !has_token {
                return Err(
                    "An access token is required (--access-token or SHOPIFY_ADMIN_TOKEN) unless --memory-store is used"
                        .to_string(),
                );
            }
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}
