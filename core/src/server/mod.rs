//! WebSocket relay server
//!
//! Accepts endpoint connections, runs one session task per connection, and
//! wires the presence registry, signal router, and keyword filter together.

mod session;

use crate::keywords::{KeywordFilter, DEFAULT_KEYWORDS};
use crate::presence::{PresenceRegistry, PresenceStore};
use crate::push::PushNotifier;
use crate::router::{EndpointTable, SignalRouter};
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::{info, warn};

/// Relay server configuration
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Bind address for incoming endpoint connections
    pub bind: SocketAddr,
    /// Trigger-word list for the keyword filter
    pub keywords: Vec<String>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:3000".parse().unwrap(),
            keywords: DEFAULT_KEYWORDS.iter().map(|w| w.to_string()).collect(),
        }
    }
}

/// Relay server error types
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Bind failed: {0}")]
    Bind(std::io::Error),
}

/// Shared handles every session task needs.
#[derive(Clone)]
pub(crate) struct ServerContext {
    pub registry: Arc<PresenceRegistry>,
    pub router: Arc<SignalRouter>,
    pub endpoints: EndpointTable,
    pub keywords: Arc<KeywordFilter>,
}

/// The relay server, not yet bound.
pub struct RelayServer {
    config: RelayConfig,
    ctx: ServerContext,
}

impl RelayServer {
    /// Wire a server from its two external collaborators.
    pub fn new(
        config: RelayConfig,
        store: Arc<dyn PresenceStore>,
        notifier: Arc<dyn PushNotifier>,
    ) -> Self {
        let registry = Arc::new(PresenceRegistry::new(store));
        let endpoints = EndpointTable::new();
        let router = Arc::new(SignalRouter::new(
            Arc::clone(&registry),
            endpoints.clone(),
            notifier,
        ));
        let keywords = Arc::new(KeywordFilter::new(&config.keywords));
        Self {
            config,
            ctx: ServerContext {
                registry,
                router,
                endpoints,
                keywords,
            },
        }
    }

    /// Bind the listener. Split from [`BoundRelay::run`] so callers (and
    /// tests binding port 0) can learn the actual address before serving.
    pub async fn bind(self) -> Result<BoundRelay, ServerError> {
        let listener = TcpListener::bind(self.config.bind)
            .await
            .map_err(ServerError::Bind)?;
        let local_addr = listener.local_addr().map_err(ServerError::Bind)?;
        info!("Relay listening on {}", local_addr);
        Ok(BoundRelay {
            listener,
            local_addr,
            ctx: self.ctx,
        })
    }
}

/// A bound relay serving its accept loop.
pub struct BoundRelay {
    listener: TcpListener,
    local_addr: SocketAddr,
    ctx: ServerContext,
}

impl BoundRelay {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Accept connections forever, one session task each. A failed accept
    /// is logged and the loop keeps serving the rest.
    pub async fn run(self) {
        loop {
            match self.listener.accept().await {
                Ok((stream, peer_addr)) => {
                    tokio::spawn(session::handle_connection(
                        stream,
                        peer_addr,
                        self.ctx.clone(),
                    ));
                }
                Err(e) => warn!("Accept failed: {}", e),
            }
        }
    }
}
