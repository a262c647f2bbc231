use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "umbra",
    about = "Mirrors watched chats: forwards new messages and reports edits, deletions, and typing",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the mirror service.
    Run(RunArgs),
    /// Print a fresh base64 state key.
    Keygen,
    /// Seal one value with the state key, for sealed configuration.
    Seal(SealArgs),
    /// Open one sealed value.
    Open(OpenArgs),
    /// Decrypt a sealed audit trail into plaintext JSONL.
    DecodeAudit(DecodeAuditArgs),
}

#[derive(Debug, Args)]
pub struct RunArgs {
    #[arg(
        long,
        env = "UMBRA_API_BASE",
        default_value = "https://api.telegram.org",
        help = "Base URL for the Telegram Bot API"
    )]
    pub api_base: String,

    #[arg(
        long,
        env = "UMBRA_BOT_TOKEN",
        hide_env_values = true,
        help = "Bot token; accepts an enc:v1: payload sealed with the state key"
    )]
    pub bot_token: String,

    #[arg(
        long,
        env = "UMBRA_MIRROR_CHAT",
        allow_hyphen_values = true,
        help = "Chat id receiving forwarded copies; accepts an enc:v1: payload"
    )]
    pub mirror_chat: String,

    #[arg(
        long,
        env = "UMBRA_JOURNAL_CHAT",
        allow_hyphen_values = true,
        help = "Chat id receiving edit, deletion, and typing reports; accepts an enc:v1: payload"
    )]
    pub journal_chat: String,

    #[arg(
        long,
        env = "UMBRA_STATE_DIR",
        default_value = ".umbra",
        help = "Directory holding the snapshot and the audit trail"
    )]
    pub state_dir: PathBuf,

    #[arg(
        long,
        env = "UMBRA_STATE_KEY",
        hide_env_values = true,
        help = "Key sealing the snapshot, the audit trail, and sealed configuration values"
    )]
    pub state_key: Option<String>,

    #[arg(
        long,
        env = "UMBRA_POLL_TIMEOUT_SECONDS",
        default_value_t = 25,
        help = "Long-poll timeout for getUpdates, in seconds"
    )]
    pub poll_timeout_seconds: u64,

    #[arg(
        long,
        env = "UMBRA_REQUEST_TIMEOUT_MS",
        default_value_t = 35_000,
        help = "Per-request HTTP timeout in milliseconds; must exceed the poll timeout"
    )]
    pub request_timeout_ms: u64,

    #[arg(
        long,
        env = "UMBRA_RECONNECT_DELAY_MS",
        default_value_t = 2_000,
        help = "Delay before polling again after an event source failure"
    )]
    pub reconnect_delay_ms: u64,

    #[arg(
        long,
        env = "UMBRA_RETRY_MAX_ATTEMPTS",
        default_value_t = 3,
        help = "Attempts per API call before a transport error surfaces"
    )]
    pub retry_max_attempts: usize,

    #[arg(
        long,
        env = "UMBRA_RETRY_BASE_DELAY_MS",
        default_value_t = 250,
        help = "Base delay in milliseconds for exponential API retry backoff"
    )]
    pub retry_base_delay_ms: u64,
}

#[derive(Debug, Args)]
pub struct SealArgs {
    #[arg(long, env = "UMBRA_STATE_KEY", hide_env_values = true)]
    pub state_key: String,

    /// Value to seal.
    pub value: String,
}

#[derive(Debug, Args)]
pub struct OpenArgs {
    #[arg(long, env = "UMBRA_STATE_KEY", hide_env_values = true)]
    pub state_key: String,

    /// Sealed value to open.
    pub value: String,
}

#[derive(Debug, Args)]
pub struct DecodeAuditArgs {
    #[arg(long, env = "UMBRA_STATE_KEY", hide_env_values = true)]
    pub state_key: String,

    /// Sealed audit trail to read, typically events.jsonl.enc.
    pub input: PathBuf,

    /// Where to write plaintext JSONL; stdout when omitted.
    #[arg(long)]
    pub output: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).expect("parse")
    }

    #[test]
    fn unit_run_defaults() {
        let cli = parse(&[
            "umbra",
            "run",
            "--bot-token",
            "123:abc",
            "--mirror-chat",
            "-1001",
            "--journal-chat",
            "-1002",
        ]);
        let Command::Run(args) = cli.command else {
            panic!("expected run command");
        };
        assert_eq!(args.api_base, "https://api.telegram.org");
        assert_eq!(args.state_dir, PathBuf::from(".umbra"));
        assert_eq!(args.state_key, None);
        assert_eq!(args.poll_timeout_seconds, 25);
        assert_eq!(args.request_timeout_ms, 35_000);
        assert_eq!(args.reconnect_delay_ms, 2_000);
        assert_eq!(args.retry_max_attempts, 3);
        assert_eq!(args.retry_base_delay_ms, 250);
        assert_eq!(args.mirror_chat, "-1001");
    }

    #[test]
    fn unit_negative_chat_ids_parse_as_values() {
        let cli = parse(&[
            "umbra",
            "run",
            "--bot-token",
            "123:abc",
            "--mirror-chat",
            "-1001234",
            "--journal-chat",
            "enc:v1:AAAA",
        ]);
        let Command::Run(args) = cli.command else {
            panic!("expected run command");
        };
        assert_eq!(args.mirror_chat, "-1001234");
        assert_eq!(args.journal_chat, "enc:v1:AAAA");
    }

    #[test]
    fn unit_decode_audit_arguments() {
        let cli = parse(&[
            "umbra",
            "decode-audit",
            "--state-key",
            "k",
            ".umbra/events.jsonl.enc",
            "--output",
            "events.jsonl",
        ]);
        let Command::DecodeAudit(args) = cli.command else {
            panic!("expected decode-audit command");
        };
        assert_eq!(args.input, PathBuf::from(".umbra/events.jsonl.enc"));
        assert_eq!(args.output, Some(PathBuf::from("events.jsonl")));
    }
}
