// Ringline: call-signaling relay core
//
// Maps stable user identities to the transport endpoints currently carrying
// them, relays session negotiation between call parties, and wakes offline
// callees over push. Media never passes through here; only the metadata two
// peers need to find each other does.

pub mod keywords;
pub mod presence;
pub mod protocol;
pub mod push;
pub mod router;
pub mod server;

pub use keywords::{KeywordFilter, KeywordScan, DEFAULT_KEYWORDS};
pub use presence::{
    MemoryPresenceStore, PresenceRecord, PresenceRegistry, PresenceStatus, PresenceStore,
    SledPresenceStore,
};
pub use protocol::{ClientEvent, ServerEvent};
pub use push::{FcmNotifier, NullNotifier, PushNotifier, WakeupPush};
pub use router::{EndpointTable, SignalRouter};
pub use server::{BoundRelay, RelayConfig, RelayServer, ServerError};
