//! Signal routing: deliver call-establishment events or wake the callee
//!
//! For every signaling message the router resolves the destination user
//! through the presence store and picks one of three outcomes, in order:
//! relay to the live endpoint, push wakeup (offers only), or an error back
//! to the origin (offers only; everything else drops silently).

use crate::presence::PresenceRegistry;
use crate::protocol::ServerEvent;
use crate::push::{PushNotifier, WakeupPush};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};

/// Live connections: endpoint id to outbound event sender.
///
/// Shared by the accept loop (insert/remove) and the router (send). Sending
/// to an id that is gone, or whose channel already closed, is a silent
/// no-op: stale presence is the store's problem, not a routing error.
#[derive(Clone, Default)]
pub struct EndpointTable {
    endpoints: Arc<RwLock<HashMap<String, UnboundedSender<ServerEvent>>>>,
}

impl EndpointTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, endpoint_id: &str, sender: UnboundedSender<ServerEvent>) {
        self.endpoints
            .write()
            .insert(endpoint_id.to_string(), sender);
    }

    pub fn remove(&self, endpoint_id: &str) {
        self.endpoints.write().remove(endpoint_id);
    }

    /// Number of currently connected endpoints.
    pub fn len(&self) -> usize {
        self.endpoints.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.read().is_empty()
    }

    /// Deliver one event to one endpoint, best-effort.
    pub fn send(&self, endpoint_id: &str, event: ServerEvent) {
        if let Some(sender) = self.endpoints.read().get(endpoint_id) {
            let _ = sender.send(event);
        }
    }

    /// Deliver one event to every endpoint except `sender_id`.
    pub fn broadcast_except(&self, sender_id: &str, event: &ServerEvent) {
        for (endpoint_id, sender) in self.endpoints.read().iter() {
            if endpoint_id != sender_id {
                let _ = sender.send(event.clone());
            }
        }
    }
}

/// Routes signaling messages between endpoints. Reads presence, never
/// writes it.
pub struct SignalRouter {
    registry: Arc<PresenceRegistry>,
    endpoints: EndpointTable,
    notifier: Arc<dyn PushNotifier>,
}

impl SignalRouter {
    pub fn new(
        registry: Arc<PresenceRegistry>,
        endpoints: EndpointTable,
        notifier: Arc<dyn PushNotifier>,
    ) -> Self {
        Self {
            registry,
            endpoints,
            notifier,
        }
    }

    /// Route an offer from `from` to `to`.
    ///
    /// `origin_id` is the sender's own endpoint id, used for error replies.
    /// Precedence: live endpoint, then push wakeup, then an error back to
    /// the origin. The push send is spawned fire-and-forget so call setup
    /// never blocks on notification delivery.
    pub async fn route_offer(
        &self,
        origin_id: &str,
        offer: serde_json::Value,
        from: &str,
        to: &str,
    ) {
        let recipient = match self.registry.lookup(to).await {
            Ok(recipient) => recipient,
            Err(e) => {
                warn!("Offer {} -> {}: presence lookup failed: {}", from, to, e);
                return;
            }
        };

        let Some(recipient) = recipient else {
            self.endpoints
                .send(origin_id, ServerEvent::Error(format!("User {} not found", to)));
            return;
        };

        if let Some(endpoint_id) = recipient.live_endpoint() {
            debug!("Relaying offer {} -> {} at endpoint {}", from, to, endpoint_id);
            self.endpoints.send(
                endpoint_id,
                ServerEvent::Offer {
                    offer,
                    from: from.to_string(),
                },
            );
        } else if let Some(token) = recipient.usable_push_token() {
            let push = WakeupPush::incoming_call(from);
            info!("Waking {} for call from {} ({})", to, from, push.call_uuid);

            let notifier = Arc::clone(&self.notifier);
            let token = token.to_string();
            let to = to.to_string();
            tokio::spawn(async move {
                if let Err(e) = notifier.send_wakeup(&token, push).await {
                    warn!("Push wakeup for {} failed: {}", to, e);
                }
            });
        } else {
            self.endpoints.send(
                origin_id,
                ServerEvent::Error(format!("User {} is unreachable", to)),
            );
        }
    }

    /// Relay an answer back to the caller. Undeliverable answers drop
    /// silently: only initial call setup can wake a sleeping peer.
    pub async fn route_answer(&self, answer: serde_json::Value, from: &str, to: &str) {
        debug!("Answer {} -> {}", from, to);
        self.relay_or_drop(to, ServerEvent::Answer { answer }, "answer")
            .await;
    }

    /// Relay a network path candidate, or drop it silently.
    pub async fn route_candidate(&self, candidate: serde_json::Value, to: &str) {
        self.relay_or_drop(to, ServerEvent::IceCandidate { candidate }, "ice-candidate")
            .await;
    }

    /// Relay a call teardown, or drop it silently.
    pub async fn route_end_call(&self, to: &str) {
        self.relay_or_drop(to, ServerEvent::EndCall, "end-call").await;
    }

    async fn relay_or_drop(&self, to: &str, event: ServerEvent, kind: &str) {
        let record = match self.registry.lookup(to).await {
            Ok(Some(record)) => record,
            Ok(None) => {
                debug!("Dropping {} for unknown user {}", kind, to);
                return;
            }
            Err(e) => {
                warn!("{} to {}: presence lookup failed: {}", kind, to, e);
                return;
            }
        };
        match record.live_endpoint() {
            Some(endpoint_id) => self.endpoints.send(endpoint_id, event),
            None => debug!("Dropping {} to offline user {}", kind, to),
        }
    }
}
