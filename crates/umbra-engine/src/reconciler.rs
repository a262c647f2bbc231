use std::sync::Arc;

use anyhow::Result;
use umbra_store::{EntityCache, MessageShadowStore, ShadowRecord};
use umbra_transport::{
    ChatMessage, ChatRpc, Entity, ForwardOutcome, InboundEvent, PeerRef, PresenceAction,
};

use crate::{audit::AuditTrail, render};

/// One handler per inbound event kind, sharing the entity cache, the
/// message shadow store, and the audit trail. Handlers run one event at a
/// time in arrival order; a handler failure is the caller's signal to drop
/// that single event.
pub struct Reconciler {
    rpc: Arc<dyn ChatRpc>,
    entities: EntityCache,
    messages: MessageShadowStore,
    audit: AuditTrail,
    shadow_chat: i64,
    journal_chat: i64,
    clock_hms: fn() -> String,
}

impl Reconciler {
    pub fn new(
        rpc: Arc<dyn ChatRpc>,
        audit: AuditTrail,
        shadow_chat: i64,
        journal_chat: i64,
    ) -> Self {
        Self {
            entities: EntityCache::new(Arc::clone(&rpc)),
            messages: MessageShadowStore::new(),
            rpc,
            audit,
            shadow_chat,
            journal_chat,
            clock_hms: umbra_core::current_clock_hms,
        }
    }

    /// Swaps the wall-clock supplier used for typing lines. Tests pin it.
    pub fn with_clock(mut self, clock_hms: fn() -> String) -> Self {
        self.clock_hms = clock_hms;
        self
    }

    pub fn load_state(&mut self, entities: Vec<Entity>, messages: Vec<ShadowRecord>) {
        self.entities.load(entities);
        self.messages.load(messages);
    }

    pub fn dump_state(&self) -> (Vec<Entity>, Vec<ShadowRecord>) {
        (self.entities.dump(), self.messages.dump())
    }

    /// Records the event in the audit trail, then dispatches to the
    /// kind-specific handler. Events in the mirror's own output channels are
    /// audited but not otherwise processed, so the service never chases its
    /// own forwards and reports.
    pub async fn handle_event(&mut self, event: InboundEvent) -> Result<()> {
        self.audit.record(&event)?;
        if self.is_own_output(&event) {
            tracing::debug!(kind = event.kind(), "skipped event in own output channel");
            return Ok(());
        }
        match event {
            InboundEvent::NewMessage { message } => self.on_new_message(message).await,
            InboundEvent::EditedMessage { message } => self.on_edited_message(message).await,
            InboundEvent::DeletedMessages { message_ids, .. } => {
                self.on_deleted_messages(message_ids).await
            }
            InboundEvent::Presence {
                user_id,
                chat_id,
                action,
            } => self.on_presence(user_id, chat_id, action).await,
            InboundEvent::Raw { .. } => Ok(()),
        }
    }

    fn is_own_output(&self, event: &InboundEvent) -> bool {
        event
            .chat()
            .map(|chat| chat.id() == self.shadow_chat || chat.id() == self.journal_chat)
            .unwrap_or(false)
    }

    async fn on_new_message(&mut self, message: ChatMessage) -> Result<()> {
        self.messages.set(&message);
        // A fresh arrival has no copy yet; any link stored under this id is
        // stale.
        self.messages.set_forward_link(&message, None);

        if let PeerRef::User(user_id) = message.chat {
            self.entities.get_user(user_id).await?;
        }

        let link = self.forward_to_shadow(&message).await?;
        self.messages.set_forward_link(&message, link);
        Ok(())
    }

    /// Forwards into the shadow channel and returns the copy's link. A
    /// policy-restricted forward adopts the newest message already in the
    /// shadow channel; under racing restricted forwards the adopted link may
    /// point at a neighbor's copy.
    async fn forward_to_shadow(&mut self, message: &ChatMessage) -> Result<Option<String>> {
        match self
            .rpc
            .forward_message(self.shadow_chat, message.id, message.chat)
            .await?
        {
            ForwardOutcome::Forwarded(copy) => {
                Ok(Some(self.rpc.message_link(self.shadow_chat, copy.id)))
            }
            ForwardOutcome::PolicyRestricted => {
                let newest = self.rpc.recent_messages(self.shadow_chat, 1).await?;
                match newest.first() {
                    Some(latest) => Ok(Some(self.rpc.message_link(self.shadow_chat, latest.id))),
                    None => {
                        tracing::warn!(
                            message_id = message.id,
                            "forward restricted and shadow channel empty; no link recorded"
                        );
                        Ok(None)
                    }
                }
            }
        }
    }

    async fn on_edited_message(&mut self, message: ChatMessage) -> Result<()> {
        let author = self.entities.get_peer(message.author_peer()).await?;
        let before_text = self
            .messages
            .get(message.id)
            .map(|previous| previous.text.clone())
            .unwrap_or_default();
        let before_link = self.messages.forward_link(message.id).map(str::to_string);

        self.messages.set(&message);

        let after_link = match self
            .rpc
            .forward_message(self.shadow_chat, message.id, message.chat)
            .await?
        {
            ForwardOutcome::Forwarded(copy) => {
                Some(self.rpc.message_link(self.shadow_chat, copy.id))
            }
            // The refreshed copy is unavailable; the stale link is not kept.
            ForwardOutcome::PolicyRestricted => None,
        };
        self.messages.set_forward_link(&message, after_link.clone());

        let report = render::edit_report(
            &render::entity_label(&author),
            &before_text,
            before_link.as_deref(),
            &message.text,
            after_link.as_deref(),
        );
        self.rpc.send_text(self.journal_chat, &report).await?;
        Ok(())
    }

    async fn on_deleted_messages(&mut self, message_ids: Vec<i64>) -> Result<()> {
        if message_ids.is_empty() {
            tracing::debug!("deletion event carried no message ids");
            return Ok(());
        }

        let rows = message_ids
            .iter()
            .map(|id| render::shadow_row(self.messages.get(*id), self.messages.forward_link(*id)))
            .collect::<Vec<_>>();

        // Attribution comes from the first deleted id alone; an unknown
        // first id leaves the whole batch unattributed.
        let first_peer = message_ids
            .first()
            .and_then(|id| self.messages.get(*id))
            .map(|message| message.chat);
        let attribution = match first_peer {
            Some(peer) => Some(render::entity_label(&self.entities.get_peer(peer).await?)),
            None => None,
        };

        let report = render::delete_report(attribution.as_deref(), &rows);
        self.rpc.send_text(self.journal_chat, &report).await?;
        Ok(())
    }

    async fn on_presence(
        &mut self,
        user_id: i64,
        chat_id: i64,
        action: PresenceAction,
    ) -> Result<()> {
        if action != PresenceAction::Composing {
            return Ok(());
        }

        let user = self.entities.get_user(user_id).await?;
        let chat = self.entities.get_chat(chat_id).await?;
        let prefix = render::typing_prefix(&user, &chat);
        let line = render::typing_line(&prefix, &(self.clock_hms)());

        // The newest journal entry is read fresh on every event; the
        // identical check runs before the prefix check so duplicate bursts
        // stay no-ops.
        let newest = self
            .rpc
            .recent_messages(self.journal_chat, 1)
            .await?
            .into_iter()
            .next();
        match newest {
            Some(previous) if previous.text == line => {}
            Some(previous) if previous.text.starts_with(&prefix) => {
                self.rpc
                    .edit_text(self.journal_chat, previous.id, &line)
                    .await?;
            }
            _ => {
                self.rpc.send_text(self.journal_chat, &line).await?;
            }
        }
        Ok(())
    }
}
