use std::{
    fs::File,
    io::Write,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use umbra_cipher::CipherGate;
use umbra_transport::InboundEvent;

const AUDIT_PLAINTEXT_FILE: &str = "events.jsonl";
const AUDIT_SEALED_FILE: &str = "events.jsonl.enc";

/// Append-only record of every inbound event, one JSON line per event, each
/// line individually sealed so partial corruption costs single lines rather
/// than the whole trail.
pub struct AuditTrail {
    path: PathBuf,
    file: File,
    cipher: CipherGate,
}

impl AuditTrail {
    pub fn open(state_dir: &Path, cipher: CipherGate) -> Result<Self> {
        std::fs::create_dir_all(state_dir)
            .with_context(|| format!("failed to create {}", state_dir.display()))?;
        let file_name = if cipher.is_keyed() {
            AUDIT_SEALED_FILE
        } else {
            AUDIT_PLAINTEXT_FILE
        };
        let path = state_dir.join(file_name);
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("failed to open {}", path.display()))?;
        Ok(Self { path, file, cipher })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends one sealed line for `event` and flushes it.
    pub fn record(&mut self, event: &InboundEvent) -> Result<()> {
        let encoded = serde_json::to_string(event).context("failed to encode audit event")?;
        let line = self
            .cipher
            .seal(&encoded)
            .context("failed to seal audit event")?;
        writeln!(self.file, "{line}")
            .with_context(|| format!("failed to append to {}", self.path.display()))?;
        self.file
            .flush()
            .with_context(|| format!("failed to flush {}", self.path.display()))?;
        Ok(())
    }
}
