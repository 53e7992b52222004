//! Wire protocol: JSON events exchanged with connected endpoints
//!
//! Every frame on the socket is a JSON object of the form
//! `{"event": "<name>", "data": <payload>}`. Event names and payload field
//! names match the socket.io-style clients this relay serves, so they are
//! kebab-case and camelCase respectively regardless of Rust naming.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Events a connected endpoint may send to the relay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ClientEvent {
    /// Bind this connection to a stable user identity
    #[serde(rename_all = "camelCase")]
    Register {
        user_id: String,
        /// Device token for push wakeups; absent or empty means "keep
        /// whatever token the store already has"
        #[serde(default)]
        push_token: Option<String>,
    },
    /// Session offer initiating a call
    Offer {
        offer: serde_json::Value,
        from: String,
        to: String,
    },
    /// Session answer accepting a call
    Answer {
        answer: serde_json::Value,
        from: String,
        to: String,
    },
    /// Discovered network path candidate
    IceCandidate {
        candidate: serde_json::Value,
        to: String,
    },
    /// Tear down the call with `to`
    EndCall { to: String },
    /// Scan free text for trigger words
    Keywords { input: String },
}

/// Events the relay sends to a connected endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ServerEvent {
    /// Relayed offer; `from` tells the callee who is calling so it can reply
    Offer {
        offer: serde_json::Value,
        from: String,
    },
    /// Relayed answer. No `from`: the caller already knows the reverse path
    Answer { answer: serde_json::Value },
    /// Relayed network path candidate
    IceCandidate { candidate: serde_json::Value },
    /// Relayed call teardown
    EndCall,
    /// Human-readable failure reported back to the origin endpoint
    Error(String),
    /// Outcome of a `keywords` scan, returned to the sender
    #[serde(rename_all = "camelCase")]
    KeywordsResult {
        input: String,
        found_keywords: Vec<String>,
        has_keywords: bool,
    },
    /// Human-readable notice broadcast to other endpoints
    Message(String),
}

/// Protocol error types
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Malformed event: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Decode one inbound text frame.
pub fn decode_client(text: &str) -> Result<ClientEvent, ProtocolError> {
    Ok(serde_json::from_str(text)?)
}

/// Encode one outbound event as a text frame.
pub fn encode_server(event: &ServerEvent) -> Result<String, ProtocolError> {
    Ok(serde_json::to_string(event)?)
}
