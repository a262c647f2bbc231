use std::{sync::Arc, time::Duration};

use anyhow::{bail, Context, Result};
use umbra_cipher::{CipherGate, SEALED_PREFIX};
use umbra_engine::{AuditTrail, MirrorService, Reconciler};
use umbra_store::SnapshotStore;
use umbra_transport::telegram::{TelegramClient, TelegramUpdates};

use crate::cli::{DecodeAuditArgs, OpenArgs, RunArgs, SealArgs};

pub async fn execute_run(args: RunArgs) -> Result<()> {
    let gate = CipherGate::new(args.state_key.as_deref());
    if !gate.is_keyed() {
        tracing::warn!(
            "no state key configured; snapshot and audit trail will be stored in plaintext"
        );
    }

    let bot_token = resolve_sealed(&gate, "bot-token", &args.bot_token)?;
    let mirror_chat = resolve_chat(&gate, "mirror-chat", &args.mirror_chat)?;
    let journal_chat = resolve_chat(&gate, "journal-chat", &args.journal_chat)?;
    if args.request_timeout_ms <= args.poll_timeout_seconds.saturating_mul(1_000) {
        bail!(
            "request timeout ({} ms) must exceed the poll timeout ({} s)",
            args.request_timeout_ms,
            args.poll_timeout_seconds
        );
    }

    let client = Arc::new(
        TelegramClient::new(
            args.api_base,
            bot_token,
            args.request_timeout_ms,
            args.retry_max_attempts,
            args.retry_base_delay_ms,
        )
        .context("failed to build the Telegram client")?,
    );
    let source = TelegramUpdates::new(Arc::clone(&client), args.poll_timeout_seconds);

    let audit = AuditTrail::open(&args.state_dir, gate.clone())
        .context("failed to open the audit trail")?;
    let snapshots = SnapshotStore::new(&args.state_dir, gate);
    let reconciler = Reconciler::new(client, audit, mirror_chat, journal_chat);

    MirrorService::new(
        source,
        reconciler,
        snapshots,
        Duration::from_millis(args.reconnect_delay_ms),
    )
    .run()
    .await
}

pub fn execute_keygen() -> Result<()> {
    println!("{}", CipherGate::generate_key());
    Ok(())
}

pub fn execute_seal(args: SealArgs) -> Result<()> {
    let gate = keyed_gate(&args.state_key)?;
    println!("{}", gate.seal(&args.value).context("failed to seal value")?);
    Ok(())
}

pub fn execute_open(args: OpenArgs) -> Result<()> {
    let gate = keyed_gate(&args.state_key)?;
    println!(
        "{}",
        gate.open(&args.value)
            .context("failed to open value with this state key")?
    );
    Ok(())
}

/// Reads a sealed audit trail and writes it back as plaintext JSONL.
/// Unopenable lines are skipped with a warning, so a partially corrupted
/// trail still yields everything that survives.
pub fn execute_decode_audit(args: DecodeAuditArgs) -> Result<()> {
    let gate = keyed_gate(&args.state_key)?;
    let raw = std::fs::read_to_string(&args.input)
        .with_context(|| format!("failed to read {}", args.input.display()))?;

    let mut decoded = Vec::new();
    let mut skipped = 0_usize;
    for (index, line) in raw.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match gate.open(line) {
            Ok(plain) => decoded.push(plain),
            Err(error) => {
                skipped += 1;
                tracing::warn!(line = index + 1, %error, "skipped unopenable audit line");
            }
        }
    }

    let mut plaintext = decoded.join("\n");
    if !plaintext.is_empty() {
        plaintext.push('\n');
    }
    match &args.output {
        Some(path) => umbra_core::write_text_atomic(path, &plaintext)?,
        None => print!("{plaintext}"),
    }
    if skipped > 0 {
        tracing::warn!(
            count = skipped,
            "some audit lines could not be opened with this key"
        );
    }
    tracing::info!(decoded = decoded.len(), skipped, "audit trail decoded");
    Ok(())
}

fn keyed_gate(state_key: &str) -> Result<CipherGate> {
    let gate = CipherGate::new(Some(state_key));
    if !gate.is_keyed() {
        bail!("state key is empty");
    }
    Ok(gate)
}

/// Resolves one configuration value that may arrive sealed. Plain values
/// pass through; sealed values require a keyed gate.
fn resolve_sealed(gate: &CipherGate, name: &str, value: &str) -> Result<String> {
    if !value.starts_with(SEALED_PREFIX) {
        return Ok(value.to_string());
    }
    if !gate.is_keyed() {
        bail!("{name} is sealed but no state key is configured");
    }
    gate.open(value)
        .with_context(|| format!("failed to open sealed {name}"))
}

fn resolve_chat(gate: &CipherGate, name: &str, value: &str) -> Result<i64> {
    let resolved = resolve_sealed(gate, name, value)?;
    resolved
        .trim()
        .parse::<i64>()
        .with_context(|| format!("{name} is not a numeric chat id"))
}
