//! Telegram Bot API implementation of the transport traits.
//!
//! One `TelegramClient` serves both RPC calls and, through
//! `TelegramUpdates`, the long-polled `getUpdates` event stream. The Bot API
//! has no history read, so the client keeps a small per-chat tracker of the
//! newest messages it has seen and answers `recent_messages` from that.

use std::{
    collections::{HashMap, VecDeque},
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::{
    ChatMessage, ChatProfile, ChatRpc, Entity, EventSource, ForwardOutcome, InboundEvent, PeerRef,
    TransportError, UserProfile,
};

const RECENT_TRACK_CAP: usize = 16;
const SUPERGROUP_ID_OFFSET: u64 = 1_000_000_000_000;

const NEW_MESSAGE_KEYS: [&str; 3] = ["message", "channel_post", "business_message"];
const EDITED_MESSAGE_KEYS: [&str; 3] = [
    "edited_message",
    "edited_channel_post",
    "edited_business_message",
];

#[derive(Debug, Deserialize)]
struct ApiEnvelope {
    ok: bool,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    parameters: Option<ApiParameters>,
}

#[derive(Debug, Deserialize)]
struct ApiParameters {
    #[serde(default)]
    retry_after: Option<u64>,
}

fn retry_delay(base_delay_ms: u64, attempt: usize, retry_after_seconds: Option<u64>) -> Duration {
    if let Some(retry_after_seconds) = retry_after_seconds {
        return Duration::from_secs(retry_after_seconds);
    }
    let exponent = attempt.saturating_sub(1).min(6) as u32;
    let scale = 2_u64.pow(exponent);
    Duration::from_millis(base_delay_ms.max(1).saturating_mul(scale))
}

fn is_retryable_status(status: u16) -> bool {
    status == 429 || (500..600).contains(&status)
}

fn is_retryable_transport_error(error: &reqwest::Error) -> bool {
    error.is_timeout() || error.is_connect() || error.is_request() || error.is_body()
}

fn is_forward_restricted(detail: &str) -> bool {
    let detail = detail.to_ascii_lowercase();
    detail.contains("can't be forwarded")
        || detail.contains("forwards_restricted")
        || detail.contains("restricted message forwarding")
}

fn peer_from_chat(chat: &Value) -> Option<PeerRef> {
    let id = chat.get("id").and_then(Value::as_i64)?;
    match chat.get("type").and_then(Value::as_str) {
        Some("private") => Some(PeerRef::User(id)),
        Some("group") => Some(PeerRef::Chat(id)),
        Some("supergroup") | Some("channel") => Some(PeerRef::Channel(id)),
        _ if id < 0 => Some(PeerRef::Chat(id)),
        _ => Some(PeerRef::User(id)),
    }
}

fn message_from_value(value: &Value) -> Option<ChatMessage> {
    let id = value.get("message_id").and_then(Value::as_i64)?;
    let chat = peer_from_chat(value.get("chat")?)?;
    let sender = value
        .get("from")
        .and_then(|from| from.get("id"))
        .and_then(Value::as_i64)
        .map(PeerRef::User)
        .or_else(|| value.get("sender_chat").and_then(peer_from_chat))
        // In direct chats the conversation peer is the author.
        .filter(|sender| *sender != chat);
    let text = value
        .get("text")
        .or_else(|| value.get("caption"))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let sent_unix = value.get("date").and_then(Value::as_u64).unwrap_or_default();
    Some(ChatMessage {
        id,
        chat,
        sender,
        text,
        sent_unix,
    })
}

fn entity_from_chat_info(value: &Value) -> Result<Entity, TransportError> {
    let unusable = |detail: &str| TransportError::Payload {
        operation: "getChat",
        detail: detail.to_string(),
    };
    let id = value
        .get("id")
        .and_then(Value::as_i64)
        .ok_or_else(|| unusable("missing chat id"))?;
    let kind = value
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| unusable("missing chat type"))?;
    let text_field = |name: &str| {
        value
            .get(name)
            .and_then(Value::as_str)
            .map(str::to_string)
    };

    match kind {
        "private" => Ok(Entity::User(UserProfile {
            id,
            first_name: text_field("first_name").unwrap_or_default(),
            last_name: text_field("last_name"),
            username: text_field("username"),
        })),
        "group" => Ok(Entity::Chat(ChatProfile {
            id,
            title: text_field("title").unwrap_or_default(),
        })),
        "supergroup" | "channel" => Ok(Entity::Channel(ChatProfile {
            id,
            title: text_field("title")
                .or_else(|| text_field("username"))
                .unwrap_or_default(),
        })),
        other => Err(unusable(&format!("unknown chat type {other}"))),
    }
}

/// Maps one Bot API update to the event alphabet. Shapes with no richer
/// mapping become `Raw`, so nothing is dropped before the audit trail.
pub fn map_update(update: &Value) -> InboundEvent {
    for key in NEW_MESSAGE_KEYS {
        if let Some(message) = update.get(key).and_then(message_from_value) {
            return InboundEvent::NewMessage { message };
        }
    }
    for key in EDITED_MESSAGE_KEYS {
        if let Some(message) = update.get(key).and_then(message_from_value) {
            return InboundEvent::EditedMessage { message };
        }
    }
    if let Some(deleted) = update.get("deleted_business_messages") {
        let message_ids = deleted
            .get("message_ids")
            .and_then(Value::as_array)
            .map(|ids| ids.iter().filter_map(Value::as_i64).collect::<Vec<_>>())
            .unwrap_or_default();
        if !message_ids.is_empty() {
            return InboundEvent::DeletedMessages {
                chat: deleted.get("chat").and_then(peer_from_chat),
                message_ids,
            };
        }
    }
    InboundEvent::Raw {
        payload: update.clone(),
    }
}

/// Telegram Bot API RPC client with bounded retries.
pub struct TelegramClient {
    http: reqwest::Client,
    api_base: String,
    bot_token: String,
    retry_max_attempts: usize,
    retry_base_delay_ms: u64,
    recent: Mutex<HashMap<i64, VecDeque<ChatMessage>>>,
}

impl TelegramClient {
    pub fn new(
        api_base: String,
        bot_token: String,
        request_timeout_ms: u64,
        retry_max_attempts: usize,
        retry_base_delay_ms: u64,
    ) -> Result<Self, TransportError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(request_timeout_ms.max(1)))
            .build()?;
        Ok(Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            bot_token: bot_token.trim().to_string(),
            retry_max_attempts: retry_max_attempts.max(1),
            retry_base_delay_ms: retry_base_delay_ms.max(1),
            recent: Mutex::new(HashMap::new()),
        })
    }

    async fn call(&self, method: &'static str, payload: Value) -> Result<Value, TransportError> {
        let url = format!("{}/bot{}/{}", self.api_base, self.bot_token, method);
        let mut attempt = 0_usize;
        loop {
            attempt = attempt.saturating_add(1);
            let response = self.http.post(&url).json(&payload).send().await;
            match response {
                Ok(response) => {
                    let status = response.status().as_u16();
                    let envelope = match response.json::<ApiEnvelope>().await {
                        Ok(envelope) => envelope,
                        Err(error) => {
                            if attempt < self.retry_max_attempts && is_retryable_status(status) {
                                tokio::time::sleep(retry_delay(
                                    self.retry_base_delay_ms,
                                    attempt,
                                    None,
                                ))
                                .await;
                                continue;
                            }
                            return Err(TransportError::Payload {
                                operation: method,
                                detail: error.to_string(),
                            });
                        }
                    };

                    if envelope.ok {
                        return Ok(envelope.result.unwrap_or(Value::Null));
                    }

                    let retry_after = envelope
                        .parameters
                        .as_ref()
                        .and_then(|parameters| parameters.retry_after);
                    if attempt < self.retry_max_attempts && is_retryable_status(status) {
                        tokio::time::sleep(retry_delay(
                            self.retry_base_delay_ms,
                            attempt,
                            retry_after,
                        ))
                        .await;
                        continue;
                    }
                    return Err(TransportError::Api {
                        operation: method,
                        status,
                        detail: envelope
                            .description
                            .unwrap_or_else(|| "unknown error".to_string()),
                    });
                }
                Err(error) => {
                    if attempt < self.retry_max_attempts && is_retryable_transport_error(&error) {
                        tokio::time::sleep(retry_delay(self.retry_base_delay_ms, attempt, None))
                            .await;
                        continue;
                    }
                    return Err(TransportError::Http(error));
                }
            }
        }
    }

    fn note_message(&self, message: &ChatMessage) {
        if let Ok(mut recent) = self.recent.lock() {
            let entry = recent.entry(message.chat.id()).or_default();
            entry.retain(|existing| existing.id != message.id);
            entry.push_front(message.clone());
            entry.truncate(RECENT_TRACK_CAP);
        }
    }

    fn expect_message(
        operation: &'static str,
        result: &Value,
    ) -> Result<ChatMessage, TransportError> {
        message_from_value(result).ok_or_else(|| TransportError::Payload {
            operation,
            detail: "response is not a message".to_string(),
        })
    }
}

#[async_trait]
impl ChatRpc for TelegramClient {
    async fn resolve_entity(&self, id: i64) -> Result<Entity, TransportError> {
        let result = self.call("getChat", json!({ "chat_id": id })).await?;
        entity_from_chat_info(&result)
    }

    async fn forward_message(
        &self,
        target_chat: i64,
        message_id: i64,
        from_peer: PeerRef,
    ) -> Result<ForwardOutcome, TransportError> {
        let outcome = self
            .call(
                "forwardMessage",
                json!({
                    "chat_id": target_chat,
                    "from_chat_id": from_peer.id(),
                    "message_id": message_id,
                }),
            )
            .await;
        match outcome {
            Ok(result) => {
                let copy = Self::expect_message("forwardMessage", &result)?;
                self.note_message(&copy);
                Ok(ForwardOutcome::Forwarded(copy))
            }
            Err(TransportError::Api { detail, .. }) if is_forward_restricted(&detail) => {
                Ok(ForwardOutcome::PolicyRestricted)
            }
            Err(error) => Err(error),
        }
    }

    async fn recent_messages(
        &self,
        chat: i64,
        limit: usize,
    ) -> Result<Vec<ChatMessage>, TransportError> {
        let Ok(recent) = self.recent.lock() else {
            return Ok(Vec::new());
        };
        Ok(recent
            .get(&chat)
            .map(|messages| messages.iter().take(limit).cloned().collect())
            .unwrap_or_default())
    }

    async fn send_text(&self, chat: i64, text: &str) -> Result<ChatMessage, TransportError> {
        let result = self
            .call("sendMessage", json!({ "chat_id": chat, "text": text }))
            .await?;
        let message = Self::expect_message("sendMessage", &result)?;
        self.note_message(&message);
        Ok(message)
    }

    async fn edit_text(
        &self,
        chat: i64,
        message_id: i64,
        text: &str,
    ) -> Result<ChatMessage, TransportError> {
        let result = self
            .call(
                "editMessageText",
                json!({ "chat_id": chat, "message_id": message_id, "text": text }),
            )
            .await?;
        let message = Self::expect_message("editMessageText", &result)?;
        self.note_message(&message);
        Ok(message)
    }

    fn message_link(&self, chat: i64, message_id: i64) -> String {
        // Unsigned math: `-chat` has no i64 value when `chat == i64::MIN`.
        let absolute = chat.unsigned_abs();
        let bare = if chat < 0 {
            absolute
                .checked_sub(SUPERGROUP_ID_OFFSET)
                .unwrap_or(absolute)
        } else {
            absolute
        };
        format!("https://t.me/c/{bare}/{message_id}")
    }
}

/// Long-polled `getUpdates` stream over a shared `TelegramClient`.
pub struct TelegramUpdates {
    client: Arc<TelegramClient>,
    poll_timeout_seconds: u64,
    next_offset: Option<i64>,
    queue: VecDeque<InboundEvent>,
    closed: bool,
}

impl TelegramUpdates {
    pub fn new(client: Arc<TelegramClient>, poll_timeout_seconds: u64) -> Self {
        Self {
            client,
            poll_timeout_seconds,
            next_offset: None,
            queue: VecDeque::new(),
            closed: false,
        }
    }

    async fn poll_once(&mut self) -> Result<(), TransportError> {
        let mut payload = json!({ "timeout": self.poll_timeout_seconds });
        if let Some(offset) = self.next_offset {
            payload["offset"] = json!(offset);
        }
        let result = self.client.call("getUpdates", payload).await?;
        let updates = result.as_array().ok_or_else(|| TransportError::Payload {
            operation: "getUpdates",
            detail: "result is not an array".to_string(),
        })?;

        for update in updates {
            if let Some(update_id) = update.get("update_id").and_then(Value::as_i64) {
                let advanced = update_id.saturating_add(1);
                self.next_offset =
                    Some(self.next_offset.map_or(advanced, |current| current.max(advanced)));
            }
            let event = map_update(update);
            match &event {
                InboundEvent::NewMessage { message } | InboundEvent::EditedMessage { message } => {
                    self.client.note_message(message);
                }
                _ => {}
            }
            self.queue.push_back(event);
        }
        tracing::debug!(count = updates.len(), "polled updates");
        Ok(())
    }
}

#[async_trait]
impl EventSource for TelegramUpdates {
    async fn next_event(&mut self) -> Result<Option<InboundEvent>, TransportError> {
        loop {
            if let Some(event) = self.queue.pop_front() {
                return Ok(Some(event));
            }
            if self.closed {
                return Ok(None);
            }
            self.poll_once().await?;
        }
    }

    async fn disconnect(&mut self) -> Result<(), TransportError> {
        self.closed = true;
        self.queue.clear();
        Ok(())
    }
}
