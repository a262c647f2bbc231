use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use umbra_cipher::CipherGate;
use umbra_core::write_text_atomic;
use umbra_transport::Entity;

use crate::ShadowRecord;

const SNAPSHOT_SCHEMA_VERSION: u32 = 1;
const SNAPSHOT_PLAINTEXT_FILE: &str = "snapshot.json";
const SNAPSHOT_SEALED_FILE: &str = "snapshot.enc";

#[derive(Debug, Serialize, Deserialize)]
struct SnapshotFile {
    schema_version: u32,
    #[serde(default)]
    entities: Vec<Entity>,
    #[serde(default)]
    messages: Vec<ShadowRecord>,
}

/// Whole-state persistence between restarts: one JSON blob through the
/// cipher gate, written atomically. The file name reflects the mode so a
/// plaintext snapshot is never mistaken for ciphertext.
pub struct SnapshotStore {
    path: PathBuf,
    cipher: CipherGate,
}

impl SnapshotStore {
    pub fn new(state_dir: &Path, cipher: CipherGate) -> Self {
        let file = if cipher.is_keyed() {
            SNAPSHOT_SEALED_FILE
        } else {
            SNAPSHOT_PLAINTEXT_FILE
        };
        Self {
            path: state_dir.join(file),
            cipher,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn save(&self, entities: Vec<Entity>, messages: Vec<ShadowRecord>) -> Result<()> {
        let snapshot = SnapshotFile {
            schema_version: SNAPSHOT_SCHEMA_VERSION,
            entities,
            messages,
        };
        let encoded = serde_json::to_string(&snapshot).context("failed to serialize snapshot")?;
        let mut payload = self
            .cipher
            .seal(&encoded)
            .context("failed to seal snapshot")?;
        payload.push('\n');
        write_text_atomic(&self.path, &payload)
            .with_context(|| format!("failed to write snapshot {}", self.path.display()))?;
        Ok(())
    }

    /// Reads the snapshot back. Never fails the startup: a missing file is
    /// simply no prior state, and an unreadable blob degrades to empty state
    /// with a warning naming the reason.
    pub fn restore(&self) -> Option<(Vec<Entity>, Vec<ShadowRecord>)> {
        if !self.path.exists() {
            tracing::info!(path = %self.path.display(), "no snapshot found; starting with empty state");
            return None;
        }
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(error) => {
                tracing::warn!(path = %self.path.display(), %error, "snapshot unreadable; starting with empty state");
                return None;
            }
        };
        let opened = match self.cipher.open(raw.trim_end()) {
            Ok(opened) => opened,
            Err(error) => {
                tracing::warn!(path = %self.path.display(), %error, "snapshot cannot be opened with the configured key; starting with empty state");
                return None;
            }
        };
        let snapshot = match serde_json::from_str::<SnapshotFile>(&opened) {
            Ok(snapshot) => snapshot,
            Err(error) => {
                tracing::warn!(path = %self.path.display(), %error, "snapshot is corrupt; starting with empty state");
                return None;
            }
        };
        if snapshot.schema_version != SNAPSHOT_SCHEMA_VERSION {
            tracing::warn!(
                expected = SNAPSHOT_SCHEMA_VERSION,
                found = snapshot.schema_version,
                "unsupported snapshot schema; starting with empty state"
            );
            return None;
        }
        Some((snapshot.entities, snapshot.messages))
    }
}
