use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use umbra_transport::ChatMessage;

/// One tracked message: its last known content plus the link to its
/// forwarded copy in the shadow channel, once one exists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShadowRecord {
    pub message: ChatMessage,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forward_link: Option<String>,
}

/// In-memory map from message id to its shadow record.
///
/// Content upserts never touch the forward link; clearing a link is always
/// an explicit `set_forward_link` call by a handler.
#[derive(Debug, Default)]
pub struct MessageShadowStore {
    records: HashMap<i64, ShadowRecord>,
}

impl MessageShadowStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, message_id: i64) -> Option<&ChatMessage> {
        self.records.get(&message_id).map(|record| &record.message)
    }

    pub fn forward_link(&self, message_id: i64) -> Option<&str> {
        self.records
            .get(&message_id)
            .and_then(|record| record.forward_link.as_deref())
    }

    /// Upserts the content for `message.id`, preserving any stored link.
    pub fn set(&mut self, message: &ChatMessage) {
        self.records
            .entry(message.id)
            .and_modify(|record| record.message = message.clone())
            .or_insert_with(|| ShadowRecord {
                message: message.clone(),
                forward_link: None,
            });
    }

    /// Overwrites the link for `message.id`, creating the record from
    /// `message` when none exists yet.
    pub fn set_forward_link(&mut self, message: &ChatMessage, link: Option<String>) {
        match self.records.get_mut(&message.id) {
            Some(record) => record.forward_link = link,
            None => {
                self.records.insert(
                    message.id,
                    ShadowRecord {
                        message: message.clone(),
                        forward_link: link,
                    },
                );
            }
        }
    }

    /// All records, ordered by message id for stable snapshots.
    pub fn dump(&self) -> Vec<ShadowRecord> {
        let mut records = self.records.values().cloned().collect::<Vec<_>>();
        records.sort_by_key(|record| record.message.id);
        tracing::info!(count = records.len(), "dumped message shadow store");
        records
    }

    /// Merges records into the store, last write per message id winning.
    pub fn load(&mut self, records: Vec<ShadowRecord>) {
        let count = records.len();
        for record in records {
            self.records.insert(record.message.id, record);
        }
        tracing::info!(count, "loaded message shadow store");
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
