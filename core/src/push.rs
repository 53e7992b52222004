//! Push wakeup delivery
//!
//! When a callee has no live endpoint, the router hands a small data-only
//! payload to a [`PushNotifier`] so the callee's device can reconnect and
//! answer. Delivery is best-effort: failures are logged, never surfaced to
//! the caller, and call setup never blocks on the outcome.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tracing::debug;

/// Data-only wakeup payload delivered to a device token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WakeupPush {
    /// Always `incoming_call`
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(rename = "callerId")]
    pub caller_id: String,
    /// Fresh correlation id per offer attempt
    #[serde(rename = "callUUID")]
    pub call_uuid: String,
}

impl WakeupPush {
    /// Build the payload for one offer attempt with a fresh correlation id.
    pub fn incoming_call(caller_id: &str) -> Self {
        Self {
            kind: "incoming_call".to_string(),
            caller_id: caller_id.to_string(),
            call_uuid: new_call_uuid(),
        }
    }
}

/// Correlation id unique per offer attempt.
///
/// Wall-clock millis plus a random suffix: two offers in the same
/// millisecond stay distinguishable, which is all the call rate needs.
pub fn new_call_uuid() -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();
    let suffix: u32 = rand::random();
    format!("call-{}-{:08x}", millis, suffix)
}

/// Push error types
#[derive(Debug, Error)]
pub enum PushError {
    #[error("Push endpoint rejected the wakeup: {0}")]
    Rejected(String),
    #[error("Push transport error: {0}")]
    Transport(String),
}

/// Fire-and-forget wakeup sender.
#[async_trait]
pub trait PushNotifier: Send + Sync {
    async fn send_wakeup(&self, token: &str, push: WakeupPush) -> Result<(), PushError>;
}

/// Notifier used when no push credentials are configured: logs and drops.
pub struct NullNotifier;

#[async_trait]
impl PushNotifier for NullNotifier {
    async fn send_wakeup(&self, token: &str, push: WakeupPush) -> Result<(), PushError> {
        debug!(
            "Push disabled, dropping wakeup for token {}: caller {}",
            token, push.caller_id
        );
        Ok(())
    }
}

/// HTTP notifier speaking an FCM-style legacy endpoint.
///
/// Posts `{"to": <token>, "data": <payload>}` with a server-key
/// authorization header. The blocking HTTP call runs on the blocking pool so
/// the connection tasks never stall on it.
pub struct FcmNotifier {
    endpoint: String,
    server_key: String,
}

impl FcmNotifier {
    pub fn new(endpoint: impl Into<String>, server_key: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            server_key: server_key.into(),
        }
    }
}

#[async_trait]
impl PushNotifier for FcmNotifier {
    async fn send_wakeup(&self, token: &str, push: WakeupPush) -> Result<(), PushError> {
        let body = serde_json::json!({ "to": token, "data": push });
        let endpoint = self.endpoint.clone();
        let auth = format!("key={}", self.server_key);

        let outcome = tokio::task::spawn_blocking(move || {
            ureq::post(&endpoint)
                .set("Authorization", &auth)
                .send_json(body)
        })
        .await
        .map_err(|e| PushError::Transport(e.to_string()))?;

        match outcome {
            Ok(_) => Ok(()),
            Err(ureq::Error::Status(code, _)) => {
                Err(PushError::Rejected(format!("status {}", code)))
            }
            Err(e) => Err(PushError::Transport(e.to_string())),
        }
    }
}
