//! GraphQL metafield store.
//!
//! Reads and writes item fields through the admin GraphQL API:
//! - read: `product(id) { metafield(namespace, key) { value } }`
//! - write: `metafieldsSet` with a `json` typed metafield

use super::{FieldRef, FieldStore, WriteAck};
use crate::config::StoreConfig;
use crate::error::{FieldError, StoreError};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info};

/// Header carrying the admin access token.
pub const ACCESS_TOKEN_HEADER: &str = "X-Shopify-Access-Token";

const READ_QUERY: &str = r#"query ReadField($id: ID!, $namespace: String!, $key: String!) {
  product(id: $id) {
    metafield(namespace: $namespace, key: $key) {
      value
    }
  }
}"#;

const WRITE_MUTATION: &str = r#"mutation WriteField($metafields: [MetafieldsSetInput!]!) {
  metafieldsSet(metafields: $metafields) {
    metafields {
      value
    }
    userErrors {
      field
      message
      code
    }
  }
}"#;

#[derive(Debug, Deserialize)]
struct GraphqlResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Option<Vec<GraphqlError>>,
}

#[derive(Debug, Deserialize)]
struct GraphqlError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct ReadData {
    product: Option<ProductNode>,
}

#[derive(Debug, Deserialize)]
struct ProductNode {
    metafield: Option<MetafieldNode>,
}

#[derive(Debug, Deserialize)]
struct MetafieldNode {
    value: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WriteData {
    #[serde(rename = "metafieldsSet")]
    metafields_set: Option<MetafieldsSetPayload>,
}

#[derive(Debug, Deserialize)]
struct MetafieldsSetPayload {
    #[serde(default)]
    metafields: Option<Vec<MetafieldNode>>,
    #[serde(rename = "userErrors", default)]
    user_errors: Option<Vec<FieldError>>,
}

/// Map an item id to the owner id the API expects.
///
/// Ids that are already global ids pass through unchanged.
pub fn owner_gid(prefix: &str, owner: &str) -> String {
    if owner.starts_with("gid://") {
        owner.to_string()
    } else {
        format!("{}{}", prefix, owner)
    }
}

fn decode<T: DeserializeOwned>(body: Value) -> Result<GraphqlResponse<T>, StoreError> {
    let response: GraphqlResponse<T> =
        serde_json::from_value(body).map_err(|e| StoreError::Decode(e.to_string()))?;

    match &response.errors {
        Some(errors) if !errors.is_empty() => {
            let messages: Vec<&str> = errors.iter().map(|e| e.message.as_str()).collect();
            Err(StoreError::Remote(messages.join("; ")))
        }
        _ => Ok(response),
    }
}

/// Extract the field value from a read response body.
pub fn parse_read_response(body: Value) -> Result<Option<String>, StoreError> {
    let response = decode::<ReadData>(body)?;
    Ok(response
        .data
        .and_then(|data| data.product)
        .and_then(|product| product.metafield)
        .and_then(|metafield| metafield.value))
}

/// Extract the acknowledgment from a write response body.
///
/// A body without a `metafieldsSet` result is reported as `Ok(None)`.
pub fn parse_write_response(body: Value) -> Result<Option<WriteAck>, StoreError> {
    let response = decode::<WriteData>(body)?;
    let Some(payload) = response.data.and_then(|data| data.metafields_set) else {
        return Ok(None);
    };

    let written_value = payload
        .metafields
        .and_then(|metafields| metafields.into_iter().next())
        .and_then(|metafield| metafield.value);

    Ok(Some(WriteAck {
        written_value,
        field_errors: payload.user_errors.unwrap_or_default(),
    }))
}

/// Field store talking to the admin GraphQL endpoint.
pub struct GraphqlFieldStore {
    http_client: reqwest::Client,
    endpoint: String,
    access_token: String,
    owner_prefix: String,
    timeout_seconds: Option<u64>,
}

impl GraphqlFieldStore {
    /// Build a client from injected configuration and credentials.
    pub fn new(config: &StoreConfig, access_token: impl Into<String>) -> Result<Self, StoreError> {
        let endpoint = config.endpoint_url();
        info!("Using GraphQL field store at {}", endpoint);

        let mut builder = reqwest::Client::builder();
        if let Some(seconds) = config.timeout_seconds {
            builder = builder.timeout(Duration::from_secs(seconds));
        }
        let http_client = builder
            .build()
            .map_err(|e| StoreError::Transport(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            endpoint,
            access_token: access_token.into(),
            owner_prefix: config.owner_prefix.clone(),
            timeout_seconds: config.timeout_seconds,
        })
    }

    /// The resolved GraphQL endpoint.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn post(&self, query: &str, variables: Value) -> Result<Value, StoreError> {
        let response = self
            .http_client
            .post(&self.endpoint)
            .header(ACCESS_TOKEN_HEADER, &self.access_token)
            .json(&json!({ "query": query, "variables": variables }))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    StoreError::Timeout(self.timeout_seconds.unwrap_or_default())
                } else if e.is_connect() {
                    StoreError::Connect(self.endpoint.clone())
                } else {
                    StoreError::Transport(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Status { status, body });
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| StoreError::Decode(e.to_string()))
    }
}

#[async_trait]
impl FieldStore for GraphqlFieldStore {
    async fn read_field(
        &self,
        owner: &str,
        field: &FieldRef,
    ) -> Result<Option<String>, StoreError> {
        let id = owner_gid(&self.owner_prefix, owner);
        debug!("Reading {} on {}", field, id);

        let body = self
            .post(
                READ_QUERY,
                json!({ "id": id, "namespace": field.namespace, "key": field.key }),
            )
            .await?;
        parse_read_response(body)
    }

    async fn write_field(
        &self,
        owner: &str,
        field: &FieldRef,
        value: &str,
    ) -> Result<Option<WriteAck>, StoreError> {
        let id = owner_gid(&self.owner_prefix, owner);
        debug!("Writing {} on {} ({} bytes)", field, id, value.len());

        let body = self
            .post(
                WRITE_MUTATION,
                json!({
                    "metafields": [{
                        "ownerId": id,
                        "namespace": field.namespace,
                        "key": field.key,
                        "type": "json",
                        "value": value,
                    }]
                }),
            )
            .await?;
        debug!("Write response: {}", body);
        parse_write_response(body)
    }
}
