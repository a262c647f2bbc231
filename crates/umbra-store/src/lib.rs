//! Working state for the mirror: the entity cache, the message shadow
//! store, and snapshot persistence between restarts.

mod entity_cache;
mod shadow_store;
mod snapshot;

pub use entity_cache::EntityCache;
pub use shadow_store::{MessageShadowStore, ShadowRecord};
pub use snapshot::SnapshotStore;
