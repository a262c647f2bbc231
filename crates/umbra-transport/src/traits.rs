use async_trait::async_trait;

use crate::{ChatMessage, Entity, ForwardOutcome, InboundEvent, PeerRef, TransportError};

#[async_trait]
/// Platform RPC surface the mirror engine is written against.
pub trait ChatRpc: Send + Sync {
    /// Directory lookup for any peer id.
    async fn resolve_entity(&self, id: i64) -> Result<Entity, TransportError>;

    /// Copies an existing message into `target_chat`. A forward refused by
    /// the source chat's forwarding policy is an outcome, not an error.
    async fn forward_message(
        &self,
        target_chat: i64,
        message_id: i64,
        from_peer: PeerRef,
    ) -> Result<ForwardOutcome, TransportError>;

    /// The newest messages in `chat`, newest first, at most `limit`.
    async fn recent_messages(
        &self,
        chat: i64,
        limit: usize,
    ) -> Result<Vec<ChatMessage>, TransportError>;

    async fn send_text(&self, chat: i64, text: &str) -> Result<ChatMessage, TransportError>;

    async fn edit_text(
        &self,
        chat: i64,
        message_id: i64,
        text: &str,
    ) -> Result<ChatMessage, TransportError>;

    /// Permanent deep link to a message. Pure formatting, no RPC.
    fn message_link(&self, chat: i64, message_id: i64) -> String;
}

#[async_trait]
/// Ordered stream of inbound platform events.
pub trait EventSource: Send {
    /// Next event in arrival order, or `Ok(None)` once the source is closed.
    async fn next_event(&mut self) -> Result<Option<InboundEvent>, TransportError>;

    /// Stops delivery. Afterwards `next_event` returns `Ok(None)`.
    async fn disconnect(&mut self) -> Result<(), TransportError>;
}
