//! Read-modify-write against one remote field.
//!
//! Every submission runs the same sequence:
//! read current state → decode or default → apply → encode → write →
//! interpret the acknowledgment. A read failure aborts before any write.

use crate::error::SubmissionError;
use crate::store::{FieldRef, FieldStore, ItemLocks, WriteAck};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Decode a raw stored value, falling back to the empty default.
///
/// Absent, unparseable, or wrongly shaped values all yield `T::default()`;
/// the malformed cases are logged and otherwise swallowed.
pub fn decode_or_default<T, D>(raw: Option<&str>, decode: D) -> T
where
    T: Default,
    D: FnOnce(&Value) -> Option<T>,
{
    let Some(raw) = raw else {
        return T::default();
    };

    match serde_json::from_str::<Value>(raw) {
        Ok(value) => decode(&value).unwrap_or_else(|| {
            warn!("Stored value has an unexpected shape, starting from empty state");
            T::default()
        }),
        Err(e) => {
            warn!("Stored value is not valid JSON ({}), starting from empty state", e);
            T::default()
        }
    }
}

/// Turn a write acknowledgment into success or the matching error.
fn interpret_ack(ack: Option<WriteAck>) -> Result<(), SubmissionError> {
    match ack {
        None => Err(SubmissionError::WriteUnacknowledged),
        Some(ack) if !ack.field_errors.is_empty() => {
            Err(SubmissionError::WriteRejected(ack.field_errors))
        }
        Some(_) => Ok(()),
    }
}

/// Shared read-modify-write driver for both aggregators.
pub struct FieldPipeline {
    store: Arc<dyn FieldStore>,
    locks: Option<Arc<ItemLocks>>,
}

impl FieldPipeline {
    /// Without `locks`, concurrent updates to one item can overwrite each other.
    pub fn new(store: Arc<dyn FieldStore>, locks: Option<Arc<ItemLocks>>) -> Self {
        Self { store, locks }
    }

    /// Whether updates are serialized per item.
    pub fn is_serialized(&self) -> bool {
        self.locks.is_some()
    }

    /// Run one read-modify-write cycle and return the state that was written.
    pub async fn update<T, D, A>(
        &self,
        owner: &str,
        field: &FieldRef,
        decode: D,
        apply: A,
    ) -> Result<T, SubmissionError>
    where
        T: Serialize + Default + Send,
        D: FnOnce(&Value) -> Option<T> + Send,
        A: FnOnce(&mut T) -> Result<(), SubmissionError> + Send,
    {
        let _guard = match &self.locks {
            Some(locks) => Some(locks.acquire(owner, field).await),
            None => None,
        };

        let raw = self.store.read_field(owner, field).await.map_err(|e| {
            error!("Failed to read {} for {}: {}", field, owner, e);
            SubmissionError::RemoteRead(e)
        })?;

        let mut state = decode_or_default(raw.as_deref(), decode);
        apply(&mut state)?;

        let encoded = serde_json::to_string(&state)?;
        debug!("Writing {} for {}: {}", field, owner, encoded);

        let ack = self
            .store
            .write_field(owner, field, &encoded)
            .await
            .map_err(|e| {
                error!("Failed to write {} for {}: {}", field, owner, e);
                SubmissionError::RemoteWrite(e)
            })?;

        interpret_ack(ack)?;
        Ok(state)
    }
}
