//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `attr-ratings.toml` files. Credentials never live here; the access token
//! is passed to the store client separately.

use crate::aggregate::CountPolicy;
use crate::store::FieldRef;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default configuration file name, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "attr-ratings.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Remote store settings.
    #[serde(default)]
    pub store: StoreConfig,

    /// Field addresses for the two aggregates.
    #[serde(default)]
    pub fields: FieldsConfig,

    /// Aggregation behavior.
    #[serde(default)]
    pub aggregation: AggregationConfig,
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Interface to bind.
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Path of the submission endpoint.
    #[serde(default = "default_path")]
    pub path: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
            path: default_path(),
        }
    }
}

fn default_bind() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_path() -> String {
    "/submit-attr-ratings".to_string()
}

/// Remote store connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Shop domain, e.g. `example.myshopify.com`.
    #[serde(default)]
    pub shop: String,

    /// Admin API version segment of the endpoint.
    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// Prefix turning an item id into an owner global id.
    #[serde(default = "default_owner_prefix")]
    pub owner_prefix: String,

    /// Full GraphQL endpoint; overrides `shop` and `api_version` when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    /// Request timeout in seconds. Unset means no timeout.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<u64>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            shop: String::new(),
            api_version: default_api_version(),
            owner_prefix: default_owner_prefix(),
            endpoint: None,
            timeout_seconds: None,
        }
    }
}

fn default_api_version() -> String {
    "2024-04".to_string()
}

fn default_owner_prefix() -> String {
    "gid://shopify/Product/".to_string()
}

impl StoreConfig {
    /// The GraphQL endpoint this configuration points at.
    pub fn endpoint_url(&self) -> String {
        match &self.endpoint {
            Some(endpoint) => endpoint.clone(),
            None => format!(
                "https://{}/admin/api/{}/graphql.json",
                self.shop, self.api_version
            ),
        }
    }
}

/// Namespace and keys of the stored aggregates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldsConfig {
    #[serde(default = "default_namespace")]
    pub namespace: String,

    #[serde(default = "default_ratings_key")]
    pub ratings_key: String,

    #[serde(default = "default_reviews_key")]
    pub reviews_key: String,
}

impl Default for FieldsConfig {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            ratings_key: default_ratings_key(),
            reviews_key: default_reviews_key(),
        }
    }
}

fn default_namespace() -> String {
    "custom".to_string()
}

fn default_ratings_key() -> String {
    "custom_ratings".to_string()
}

fn default_reviews_key() -> String {
    "custom_reviews".to_string()
}

impl FieldsConfig {
    pub fn ratings_field(&self) -> FieldRef {
        FieldRef::new(&self.namespace, &self.ratings_key)
    }

    pub fn reviews_field(&self) -> FieldRef {
        FieldRef::new(&self.namespace, &self.reviews_key)
    }
}

/// Aggregation behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregationConfig {
    /// Serialize read-modify-write cycles per item within this process.
    #[serde(default = "default_true")]
    pub serialize_per_item: bool,

    /// When `total_submissions` is incremented.
    #[serde(default)]
    pub count_policy: CountPolicy,

    /// Treat a rating of 0 as "not rated" and leave it out of the mean.
    #[serde(default)]
    pub skip_zero_values: bool,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            serialize_per_item: true,
            count_policy: CountPolicy::default(),
            skip_zero_values: false,
        }
    }
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(DEFAULT_CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings, but only
    /// when they were actually provided.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref bind) = args.bind {
            self.server.bind = bind.clone();
        }
        if let Some(port) = args.port {
            self.server.port = port;
        }

        if let Some(ref shop) = args.shop {
            self.store.shop = shop.clone();
        }
        if let Some(ref api_version) = args.api_version {
            self.store.api_version = api_version.clone();
        }
        if let Some(ref endpoint) = args.store_endpoint {
            self.store.endpoint = Some(endpoint.clone());
        }
        if let Some(timeout) = args.timeout {
            self.store.timeout_seconds = Some(timeout);
        }

        if args.no_serialize {
            self.aggregation.serialize_per_item = false;
        }
        if let Some(policy) = args.count_policy {
            self.aggregation.count_policy = policy.into();
        }
        if args.skip_zero {
            self.aggregation.skip_zero_values = true;
        }
    }

    /// Check that a remote store can be reached with these settings.
    pub fn validate_remote_store(&self) -> Result<()> {
        if self.store.endpoint.is_none() && self.store.shop.trim().is_empty() {
            bail!("No store configured: set --shop / SHOP or --store-endpoint, or use --memory-store");
        }
        let endpoint = self.store.endpoint_url();
        if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
            bail!("Store endpoint must start with 'http://' or 'https://': {}", endpoint);
        }
        Ok(())
    }

    /// Address the server binds to.
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.server.bind, self.server.port)
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.server.path, "/submit-attr-ratings");
        assert_eq!(config.store.api_version, "2024-04");
        assert_eq!(config.fields.ratings_field(), FieldRef::new("custom", "custom_ratings"));
        assert_eq!(config.fields.reviews_field(), FieldRef::new("custom", "custom_reviews"));
        assert!(config.aggregation.serialize_per_item);
        assert_eq!(config.aggregation.count_policy, CountPolicy::EverySubmission);
        assert!(!config.aggregation.skip_zero_values);
    }

    #[test]
    fn test_parse_config() {
        let toml_content = r#"
[server]
port = 8080

[store]
shop = "example.myshopify.com"
timeout_seconds = 15

[fields]
ratings_key = "attr_ratings"

[aggregation]
serialize_per_item = false
count_policy = "with_values_only"
skip_zero_values = true
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.bind, "0.0.0.0");
        assert_eq!(config.store.timeout_seconds, Some(15));
        assert_eq!(
            config.store.endpoint_url(),
            "https://example.myshopify.com/admin/api/2024-04/graphql.json"
        );
        assert_eq!(config.fields.ratings_key, "attr_ratings");
        assert_eq!(config.fields.reviews_key, "custom_reviews");
        assert!(!config.aggregation.serialize_per_item);
        assert_eq!(config.aggregation.count_policy, CountPolicy::WithValuesOnly);
        assert!(config.aggregation.skip_zero_values);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[store]\nendpoint = \"http://127.0.0.1:9000/graphql\"").unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.store.endpoint_url(), "http://127.0.0.1:9000/graphql");
        assert!(config.validate_remote_store().is_ok());
    }

    #[test]
    fn test_load_rejects_bad_toml() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[server\nport = ").unwrap();
        assert!(Config::load(file.path()).is_err());
    }

    #[test]
    fn test_remote_store_requires_shop_or_endpoint() {
        let config = Config::default();
        assert!(config.validate_remote_store().is_err());

        let mut config = Config::default();
        config.store.endpoint = Some("ftp://nope".to_string());
        assert!(config.validate_remote_store().is_err());
    }

    #[test]
    fn test_default_toml_generation() {
        let toml_str = Config::default_toml();
        assert!(!toml_str.is_empty());
        assert!(toml_str.contains("[server]"));
        assert!(toml_str.contains("[store]"));
        assert!(toml_str.contains("[fields]"));
        assert!(toml_str.contains("[aggregation]"));
        assert!(!toml_str.contains("token"));

        let reparsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(reparsed.server.port, 3000);
    }
}
