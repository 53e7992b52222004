//! Presence: persisted reachability state per user id
//!
//! A presence record says whether a user currently has a live signaling
//! connection, which endpoint it is, and which push token can wake the user
//! up when there is none.

pub mod registry;
pub mod store;

pub use registry::PresenceRegistry;
pub use store::{MemoryPresenceStore, PresenceStore, PresenceStoreError, SledPresenceStore};

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Whether a user currently has a live signaling connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresenceStatus {
    Online,
    Offline,
}

/// Persisted reachability record for one user id.
///
/// Invariant: `Online` implies `endpoint_id` is set; `Offline` implies it is
/// cleared, never stale. The record is created on first registration and
/// mutated in place from then on, never deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceRecord {
    /// Identifier of the attached transport connection, if online
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint_id: Option<String>,
    /// Device token for push wakeups, if the client ever supplied one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub push_token: Option<String>,
    pub status: PresenceStatus,
    /// Unix timestamp in milliseconds, updated on register and disconnect
    pub last_seen: u64,
}

impl PresenceRecord {
    /// Endpoint id when the record shows a live attachment.
    pub fn live_endpoint(&self) -> Option<&str> {
        match self.status {
            PresenceStatus::Online => self.endpoint_id.as_deref(),
            PresenceStatus::Offline => None,
        }
    }

    /// Push token usable for a wakeup. Empty tokens count as absent.
    pub fn usable_push_token(&self) -> Option<&str> {
        self.push_token.as_deref().filter(|t| !t.is_empty())
    }
}

/// Current wall-clock time as unix milliseconds.
pub(crate) fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
