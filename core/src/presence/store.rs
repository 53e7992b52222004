//! Presence store backends
//!
//! The registry talks to an injected [`PresenceStore`] so the relay can run
//! against an external document store in production and an in-memory map in
//! tests. Each operation is a single read or write of one user's document;
//! the store's own per-document atomicity is all the relay relies on.

use super::PresenceRecord;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Presence store error types
#[derive(Debug, Error)]
pub enum PresenceStoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),
    #[error("Corrupt presence record: {0}")]
    Corrupt(String),
}

/// Document store keyed by user id, one presence record per user.
#[async_trait]
pub trait PresenceStore: Send + Sync {
    /// Fetch the record for `user_id`, if one was ever written.
    async fn get(&self, user_id: &str) -> Result<Option<PresenceRecord>, PresenceStoreError>;

    /// Upsert the record for `user_id`.
    async fn put(&self, user_id: &str, record: PresenceRecord) -> Result<(), PresenceStoreError>;
}

/// In-memory store useful for testing and single-run deployments.
#[derive(Clone, Default)]
pub struct MemoryPresenceStore {
    records: Arc<RwLock<HashMap<String, PresenceRecord>>>,
}

impl MemoryPresenceStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PresenceStore for MemoryPresenceStore {
    async fn get(&self, user_id: &str) -> Result<Option<PresenceRecord>, PresenceStoreError> {
        Ok(self.records.read().get(user_id).cloned())
    }

    async fn put(&self, user_id: &str, record: PresenceRecord) -> Result<(), PresenceStoreError> {
        self.records.write().insert(user_id.to_string(), record);
        Ok(())
    }
}

/// Durable store backed by a local sled tree, records as JSON documents.
pub struct SledPresenceStore {
    db: sled::Db,
}

impl SledPresenceStore {
    pub fn open(path: &str) -> Result<Self, PresenceStoreError> {
        let db = sled::open(path).map_err(|e| PresenceStoreError::Unavailable(e.to_string()))?;
        Ok(Self { db })
    }
}

#[async_trait]
impl PresenceStore for SledPresenceStore {
    async fn get(&self, user_id: &str) -> Result<Option<PresenceRecord>, PresenceStoreError> {
        let value = self
            .db
            .get(user_id.as_bytes())
            .map_err(|e| PresenceStoreError::Unavailable(e.to_string()))?;
        match value {
            None => Ok(None),
            Some(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|e| PresenceStoreError::Corrupt(format!("{}: {}", user_id, e))),
        }
    }

    async fn put(&self, user_id: &str, record: PresenceRecord) -> Result<(), PresenceStoreError> {
        let bytes = serde_json::to_vec(&record)
            .map_err(|e| PresenceStoreError::Corrupt(e.to_string()))?;
        self.db
            .insert(user_id.as_bytes(), bytes)
            .map_err(|e| PresenceStoreError::Unavailable(e.to_string()))?;
        Ok(())
    }
}
