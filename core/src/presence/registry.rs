//! Presence registry: the sole writer of presence records
//!
//! Reconciles each connected transport endpoint with the persisted record
//! for its user. Store failures on the write paths are logged and swallowed
//! so one user's flaky presence never takes down signaling for everyone
//! else; the record simply keeps its previous state.

use super::store::{PresenceStore, PresenceStoreError};
use super::{now_millis, PresenceRecord, PresenceStatus};
use std::sync::Arc;
use tracing::{debug, warn};

pub struct PresenceRegistry {
    store: Arc<dyn PresenceStore>,
}

impl PresenceRegistry {
    pub fn new(store: Arc<dyn PresenceStore>) -> Self {
        Self { store }
    }

    /// Idempotent upsert binding `user_id` to a live endpoint.
    ///
    /// When the stored record already names this exact endpoint the write is
    /// skipped. A previously stored push token survives unless the client
    /// supplied a non-empty replacement.
    ///
    /// Returns `true` when the registration is in effect (written now or
    /// already current), so the caller knows whether to bind the session.
    pub async fn register(
        &self,
        user_id: &str,
        endpoint_id: &str,
        push_token: Option<&str>,
    ) -> bool {
        match self.try_register(user_id, endpoint_id, push_token).await {
            Ok(()) => true,
            Err(e) => {
                warn!("Register for {} failed: {}", user_id, e);
                false
            }
        }
    }

    async fn try_register(
        &self,
        user_id: &str,
        endpoint_id: &str,
        push_token: Option<&str>,
    ) -> Result<(), PresenceStoreError> {
        let existing = self.store.get(user_id).await?;

        if let Some(existing) = &existing {
            if existing.endpoint_id.as_deref() == Some(endpoint_id) {
                // Already registered with this endpoint, skip the write
                debug!("{} already registered with endpoint {}", user_id, endpoint_id);
                return Ok(());
            }
        }

        let push_token = match push_token {
            Some(token) if !token.is_empty() => Some(token.to_string()),
            _ => existing.and_then(|r| r.push_token),
        };

        let record = PresenceRecord {
            endpoint_id: Some(endpoint_id.to_string()),
            push_token,
            status: PresenceStatus::Online,
            last_seen: now_millis(),
        };
        self.store.put(user_id, record).await
    }

    /// Read-only fetch, always through the store so routing reflects the
    /// latest registration even across relay restarts sharing one store.
    pub async fn lookup(
        &self,
        user_id: &str,
    ) -> Result<Option<PresenceRecord>, PresenceStoreError> {
        self.store.get(user_id).await
    }

    /// Clears the endpoint binding after a teardown.
    ///
    /// Unknown user ids are a no-op; a store failure leaves the previous
    /// record in place.
    pub async fn mark_offline(&self, user_id: &str) {
        if let Err(e) = self.try_mark_offline(user_id).await {
            warn!("Mark-offline for {} failed: {}", user_id, e);
        }
    }

    async fn try_mark_offline(&self, user_id: &str) -> Result<(), PresenceStoreError> {
        let Some(existing) = self.store.get(user_id).await? else {
            return Ok(());
        };
        let record = PresenceRecord {
            endpoint_id: None,
            push_token: existing.push_token,
            status: PresenceStatus::Offline,
            last_seen: now_millis(),
        };
        self.store.put(user_id, record).await
    }
}
