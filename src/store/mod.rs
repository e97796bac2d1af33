//! Remote field store access.
//!
//! The store is an opaque key/value API: a raw JSON string lives under
//! `owner + namespace + key`. Implementations:
//! - [`GraphqlFieldStore`]: admin GraphQL metafield API over HTTP
//! - [`InMemoryFieldStore`]: process-local store for local runs and tests

mod graphql;
mod lock;
mod memory;

pub use graphql::{owner_gid, parse_read_response, parse_write_response, GraphqlFieldStore};
pub use lock::ItemLocks;
pub use memory::InMemoryFieldStore;

use crate::error::{FieldError, StoreError};
use async_trait::async_trait;
use std::fmt;

/// Address of one field on an owner.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldRef {
    pub namespace: String,
    pub key: String,
}

impl FieldRef {
    pub fn new(namespace: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            key: key.into(),
        }
    }
}

impl fmt::Display for FieldRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.namespace, self.key)
    }
}

/// What the store returned for a write.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WriteAck {
    /// Value the store reports as written, when it echoes one.
    pub written_value: Option<String>,
    /// Field-level errors; non-empty means the write was refused.
    pub field_errors: Vec<FieldError>,
}

/// Read/write-by-key access to the remote store.
///
/// There is no compare-and-swap: a read followed by a write is not atomic.
#[async_trait]
pub trait FieldStore: Send + Sync {
    /// Read the raw value of a field. `Ok(None)` means the field is absent.
    async fn read_field(&self, owner: &str, field: &FieldRef)
        -> Result<Option<String>, StoreError>;

    /// Replace the raw value of a field.
    ///
    /// `Ok(None)` means the store answered without any result for the write,
    /// so it is unknown whether the value landed.
    async fn write_field(
        &self,
        owner: &str,
        field: &FieldRef,
        value: &str,
    ) -> Result<Option<WriteAck>, StoreError>;
}
