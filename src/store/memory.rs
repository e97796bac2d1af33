//! In-memory field store.
//!
//! Backs `--memory-store` runs and the test suite. Besides plain storage it
//! counts calls and can inject every failure the remote store can produce.

use super::{FieldRef, FieldStore, WriteAck};
use crate::error::{FieldError, StoreError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::debug;

type FieldKey = (String, String, String);

/// Injected failure modes.
#[derive(Debug, Default, Clone)]
struct Faults {
    read_error: Option<String>,
    write_error: Option<String>,
    rejection: Option<Vec<FieldError>>,
    drop_acknowledgments: bool,
    read_latency: Option<Duration>,
}

/// Field store backed by a `HashMap`.
#[derive(Debug, Default)]
pub struct InMemoryFieldStore {
    fields: Mutex<HashMap<FieldKey, String>>,
    faults: Mutex<Faults>,
    reads: AtomicUsize,
    writes: AtomicUsize,
}

fn key_of(owner: &str, field: &FieldRef) -> FieldKey {
    (
        owner.to_string(),
        field.namespace.clone(),
        field.key.clone(),
    )
}

fn guard<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl InMemoryFieldStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a raw value directly, bypassing counters and faults.
    pub fn seed(&self, owner: &str, field: &FieldRef, raw: impl Into<String>) {
        guard(&self.fields).insert(key_of(owner, field), raw.into());
    }

    /// Current raw value of a field, bypassing counters and faults.
    pub fn get(&self, owner: &str, field: &FieldRef) -> Option<String> {
        guard(&self.fields).get(&key_of(owner, field)).cloned()
    }

    /// Number of `read_field` calls so far.
    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// Number of `write_field` calls so far.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Make every subsequent read fail.
    pub fn fail_reads(&self, message: impl Into<String>) {
        guard(&self.faults).read_error = Some(message.into());
    }

    /// Make every subsequent write fail at the transport level.
    pub fn fail_writes(&self, message: impl Into<String>) {
        guard(&self.faults).write_error = Some(message.into());
    }

    /// Refuse every subsequent write with the given field errors.
    pub fn reject_writes(&self, errors: Vec<FieldError>) {
        guard(&self.faults).rejection = Some(errors);
    }

    /// Apply subsequent writes but answer with no result.
    pub fn drop_acknowledgments(&self) {
        guard(&self.faults).drop_acknowledgments = true;
    }

    /// Delay every read, widening the read-modify-write window.
    pub fn set_read_latency(&self, latency: Duration) {
        guard(&self.faults).read_latency = Some(latency);
    }
}

#[async_trait]
impl FieldStore for InMemoryFieldStore {
    async fn read_field(
        &self,
        owner: &str,
        field: &FieldRef,
    ) -> Result<Option<String>, StoreError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let faults = guard(&self.faults).clone();

        if let Some(message) = faults.read_error {
            return Err(StoreError::Unavailable(message));
        }

        // Snapshot before sleeping so a slow read observes stale state.
        let value = self.get(owner, field);
        if let Some(latency) = faults.read_latency {
            tokio::time::sleep(latency).await;
        }

        debug!("memory read {} {} -> {:?}", owner, field, value);
        Ok(value)
    }

    async fn write_field(
        &self,
        owner: &str,
        field: &FieldRef,
        value: &str,
    ) -> Result<Option<WriteAck>, StoreError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        let faults = guard(&self.faults).clone();

        if let Some(message) = faults.write_error {
            return Err(StoreError::Unavailable(message));
        }
        if let Some(errors) = faults.rejection {
            return Ok(Some(WriteAck {
                written_value: None,
                field_errors: errors,
            }));
        }

        self.seed(owner, field, value);
        debug!("memory write {} {} ({} bytes)", owner, field, value.len());

        if faults.drop_acknowledgments {
            return Ok(None);
        }

        Ok(Some(WriteAck {
            written_value: Some(value.to_string()),
            field_errors: Vec::new(),
        }))
    }
}
