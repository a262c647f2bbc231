//! Platform-facing seam for the mirror: domain types, the RPC and event
//! source traits the engine is written against, and the Telegram Bot API
//! implementation of both.

pub mod telegram;

mod error;
mod traits;
mod types;

pub use error::TransportError;
pub use traits::{ChatRpc, EventSource};
pub use types::{
    ChatMessage, ChatProfile, Entity, ForwardOutcome, InboundEvent, PeerRef, PresenceAction,
    UserProfile,
};
