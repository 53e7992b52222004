//! Per-connection session task
//!
//! Each connected endpoint gets one reader loop plus one writer task. The
//! session record makes the user binding's lifetime explicit: created at
//! connect, set by a completed `register`, read once at disconnect.

use super::ServerContext;
use crate::keywords::KeywordFilter;
use crate::protocol::{self, ClientEvent, ServerEvent};
use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Per-connection state owned by this connection's task.
struct Session {
    /// Ephemeral id naming this transport connection
    endpoint_id: String,
    /// User identity bound by a completed `register`, if any
    bound_user_id: Option<String>,
}

pub(crate) async fn handle_connection(stream: TcpStream, peer: SocketAddr, ctx: ServerContext) {
    let ws = match accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            warn!("WebSocket handshake with {} failed: {}", peer, e);
            return;
        }
    };

    let endpoint_id = Uuid::new_v4().to_string();
    info!("Endpoint connected: {} ({})", endpoint_id, peer);

    let (mut sink, mut stream) = ws.split();
    let (sender, mut outbound) = mpsc::unbounded_channel::<ServerEvent>();
    ctx.endpoints.insert(&endpoint_id, sender);

    // Writer task: serialize queued events onto the socket until the
    // channel closes or the peer goes away.
    let writer = tokio::spawn(async move {
        while let Some(event) = outbound.recv().await {
            match protocol::encode_server(&event) {
                Ok(text) => {
                    if sink.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
                Err(e) => warn!("Failed to encode outbound event: {}", e),
            }
        }
        let _ = sink.close().await;
    });

    let mut session = Session {
        endpoint_id,
        bound_user_id: None,
    };

    while let Some(frame) = stream.next().await {
        match frame {
            Ok(Message::Text(text)) => handle_event(&text, &mut session, &ctx).await,
            Ok(Message::Close(_)) => break,
            Ok(_) => {} // ping/pong/binary: nothing to route
            Err(e) => {
                debug!("Socket error on {}: {}", session.endpoint_id, e);
                break;
            }
        }
    }

    // Teardown: drop the live sender first so nothing routes here anymore,
    // then flip presence for whoever was bound.
    ctx.endpoints.remove(&session.endpoint_id);
    if let Some(user_id) = session.bound_user_id.take() {
        ctx.registry.mark_offline(&user_id).await;
    }
    writer.abort();
    info!("Endpoint disconnected: {}", session.endpoint_id);
}

/// Dispatch one inbound frame. Handler failures are per-message: they never
/// tear down this connection, let alone anyone else's.
async fn handle_event(text: &str, session: &mut Session, ctx: &ServerContext) {
    let event = match protocol::decode_client(text) {
        Ok(event) => event,
        Err(e) => {
            debug!("Dropping malformed frame from {}: {}", session.endpoint_id, e);
            return;
        }
    };

    match event {
        ClientEvent::Register {
            user_id,
            push_token,
        } => {
            let registered = ctx
                .registry
                .register(&user_id, &session.endpoint_id, push_token.as_deref())
                .await;
            if registered {
                info!(
                    "User {} registered with endpoint {}",
                    user_id, session.endpoint_id
                );
                // A later register replaces the binding (multi-device
                // re-registration overwrites silently)
                session.bound_user_id = Some(user_id);
            }
        }
        ClientEvent::Offer { offer, from, to } => {
            ctx.router
                .route_offer(&session.endpoint_id, offer, &from, &to)
                .await;
        }
        ClientEvent::Answer { answer, from, to } => {
            ctx.router.route_answer(answer, &from, &to).await;
        }
        ClientEvent::IceCandidate { candidate, to } => {
            ctx.router.route_candidate(candidate, &to).await;
        }
        ClientEvent::EndCall { to } => {
            ctx.router.route_end_call(&to).await;
        }
        ClientEvent::Keywords { input } => match ctx.keywords.scan(&input) {
            Ok(scan) => {
                if scan.matched {
                    let notice = ServerEvent::Message(KeywordFilter::notice(&scan));
                    ctx.endpoints
                        .broadcast_except(&session.endpoint_id, &notice);
                }
                ctx.endpoints.send(
                    &session.endpoint_id,
                    ServerEvent::KeywordsResult {
                        input: scan.input,
                        found_keywords: scan.found,
                        has_keywords: scan.matched,
                    },
                );
            }
            Err(e) => {
                ctx.endpoints
                    .send(&session.endpoint_id, ServerEvent::Error(e.to_string()));
            }
        },
    }
}
