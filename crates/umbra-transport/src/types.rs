use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Stable reference to one of the three peer kinds the platform knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum PeerRef {
    User(i64),
    Chat(i64),
    Channel(i64),
}

impl PeerRef {
    pub fn id(self) -> i64 {
        match self {
            Self::User(id) | Self::Chat(id) | Self::Channel(id) => id,
        }
    }

    pub fn is_user(self) -> bool {
        matches!(self, Self::User(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Directory record for a resolved user.
pub struct UserProfile {
    pub id: i64,
    pub first_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Directory record for a resolved group or channel.
pub struct ChatProfile {
    pub id: i64,
    pub title: String,
}

/// Resolved directory record for any peer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Entity {
    User(UserProfile),
    Chat(ChatProfile),
    Channel(ChatProfile),
}

impl Entity {
    /// The record's own reported identifier.
    pub fn id(&self) -> i64 {
        match self {
            Self::User(profile) => profile.id,
            Self::Chat(profile) | Self::Channel(profile) => profile.id,
        }
    }
}

/// One message as observed on the platform.
///
/// `sender` is present when the author is distinct from the conversation
/// peer (group and channel posts); in direct chats the conversation peer is
/// the author and `sender` stays empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: i64,
    pub chat: PeerRef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender: Option<PeerRef>,
    pub text: String,
    pub sent_unix: u64,
}

impl ChatMessage {
    /// The peer to attribute this message to: the explicit sender when
    /// present, the conversation peer otherwise.
    pub fn author_peer(&self) -> PeerRef {
        self.sender.unwrap_or(self.chat)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
/// Enumerates typing-style activity states. Only `Composing` is actionable.
pub enum PresenceAction {
    Composing,
    Cancelled,
    Other,
}

/// The engine's input alphabet. Every platform notification maps to exactly
/// one of these; shapes with no richer mapping arrive as `Raw` so the audit
/// trail still sees them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InboundEvent {
    NewMessage {
        message: ChatMessage,
    },
    EditedMessage {
        message: ChatMessage,
    },
    DeletedMessages {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        chat: Option<PeerRef>,
        message_ids: Vec<i64>,
    },
    Presence {
        user_id: i64,
        chat_id: i64,
        action: PresenceAction,
    },
    Raw {
        payload: Value,
    },
}

impl InboundEvent {
    /// Static label for logs and failure reports.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NewMessage { .. } => "new_message",
            Self::EditedMessage { .. } => "edited_message",
            Self::DeletedMessages { .. } => "deleted_messages",
            Self::Presence { .. } => "presence",
            Self::Raw { .. } => "raw",
        }
    }

    /// The conversation peer this event belongs to, when the event carries
    /// one.
    pub fn chat(&self) -> Option<PeerRef> {
        match self {
            Self::NewMessage { message } | Self::EditedMessage { message } => Some(message.chat),
            Self::DeletedMessages { chat, .. } => *chat,
            Self::Presence { chat_id, .. } => Some(PeerRef::Chat(*chat_id)),
            Self::Raw { .. } => None,
        }
    }
}

/// Result of asking the platform to copy a message into another chat.
#[derive(Debug, Clone, PartialEq)]
pub enum ForwardOutcome {
    /// The copy that now exists in the target chat.
    Forwarded(ChatMessage),
    /// The source chat forbids forwarding. Not an error.
    PolicyRestricted,
}
