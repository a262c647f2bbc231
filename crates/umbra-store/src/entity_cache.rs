use std::{collections::HashMap, sync::Arc};

use umbra_transport::{ChatRpc, Entity, PeerRef, TransportError};

/// Read-through cache of resolved directory records, keyed by the record's
/// own reported identifier.
pub struct EntityCache {
    rpc: Arc<dyn ChatRpc>,
    entities: HashMap<i64, Entity>,
}

impl EntityCache {
    pub fn new(rpc: Arc<dyn ChatRpc>) -> Self {
        Self {
            rpc,
            entities: HashMap::new(),
        }
    }

    /// Returns the cached record for `id`, resolving it over RPC on a miss.
    /// A resolution failure caches nothing, so the next lookup retries.
    pub async fn get(&mut self, id: i64) -> Result<Entity, TransportError> {
        if let Some(entity) = self.entities.get(&id) {
            return Ok(entity.clone());
        }
        let resolved = self.rpc.resolve_entity(id).await?;
        self.entities.insert(resolved.id(), resolved.clone());
        Ok(resolved)
    }

    pub async fn get_user(&mut self, user_id: i64) -> Result<Entity, TransportError> {
        self.get(user_id).await
    }

    pub async fn get_chat(&mut self, chat_id: i64) -> Result<Entity, TransportError> {
        self.get(chat_id).await
    }

    /// Resolves a peer reference through the kind-appropriate getter. Every
    /// peer kind has a resolution path.
    pub async fn get_peer(&mut self, peer: PeerRef) -> Result<Entity, TransportError> {
        match peer {
            PeerRef::User(id) => self.get_user(id).await,
            PeerRef::Chat(id) | PeerRef::Channel(id) => self.get_chat(id).await,
        }
    }

    /// All cached records, ordered by id for stable snapshots.
    pub fn dump(&self) -> Vec<Entity> {
        let mut entities = self.entities.values().cloned().collect::<Vec<_>>();
        entities.sort_by_key(Entity::id);
        tracing::info!(count = entities.len(), "dumped entity cache");
        entities
    }

    /// Merges records into the cache, last write per id winning.
    pub fn load(&mut self, entities: Vec<Entity>) {
        let count = entities.len();
        for entity in entities {
            self.entities.insert(entity.id(), entity);
        }
        tracing::info!(count, "loaded entity cache");
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}
