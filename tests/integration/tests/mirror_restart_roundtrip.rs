use std::{
    collections::{HashMap, VecDeque},
    fs,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicI64, AtomicU64, Ordering},
        Arc, Mutex,
    },
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use async_trait::async_trait;
use umbra_cipher::{CipherGate, SEALED_PREFIX};
use umbra_engine::{AuditTrail, MirrorService, Reconciler};
use umbra_store::SnapshotStore;
use umbra_transport::{
    ChatMessage, ChatRpc, Entity, EventSource, ForwardOutcome, InboundEvent, PeerRef,
    PresenceAction, TransportError, UserProfile,
};

static WORKSPACE_COUNTER: AtomicU64 = AtomicU64::new(1);

const MIRROR_CHAT: i64 = -100_500;
const JOURNAL_CHAT: i64 = -100_600;
const STATE_KEY: &str = "integration-state-key";

struct IsolatedWorkspace {
    root: PathBuf,
}

impl IsolatedWorkspace {
    fn new(label: &str) -> Self {
        let tick = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock should be after unix epoch")
            .as_nanos();
        let count = WORKSPACE_COUNTER.fetch_add(1, Ordering::Relaxed);
        let root = std::env::temp_dir().join(format!(
            "umbra-it-{label}-{}-{tick}-{count}",
            std::process::id()
        ));
        fs::create_dir_all(&root).expect("must create isolated workspace root");
        Self { root }
    }

    fn root(&self) -> &Path {
        &self.root
    }
}

impl Drop for IsolatedWorkspace {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.root);
    }
}

/// In-memory platform double: records every call, tracks the newest messages
/// per chat the way the live client does, and hands out deterministic ids.
struct RecordingRpc {
    forwards: Mutex<Vec<(i64, i64)>>,
    journal: Mutex<Vec<String>>,
    resolutions: Mutex<Vec<i64>>,
    recent: Mutex<HashMap<i64, Vec<ChatMessage>>>,
    next_message_id: AtomicI64,
}

impl RecordingRpc {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            forwards: Mutex::new(Vec::new()),
            journal: Mutex::new(Vec::new()),
            resolutions: Mutex::new(Vec::new()),
            recent: Mutex::new(HashMap::new()),
            next_message_id: AtomicI64::new(100),
        })
    }

    fn note(&self, message: ChatMessage) {
        let mut recent = self.recent.lock().expect("lock");
        let entry = recent.entry(message.chat.id()).or_default();
        entry.retain(|existing| existing.id != message.id);
        entry.insert(0, message);
    }

    fn forwards(&self) -> Vec<(i64, i64)> {
        self.forwards.lock().expect("lock").clone()
    }

    fn journal_texts(&self) -> Vec<String> {
        self.journal.lock().expect("lock").clone()
    }

    fn resolutions(&self) -> Vec<i64> {
        self.resolutions.lock().expect("lock").clone()
    }
}

#[async_trait]
impl ChatRpc for RecordingRpc {
    async fn resolve_entity(&self, id: i64) -> Result<Entity, TransportError> {
        self.resolutions.lock().expect("lock").push(id);
        Ok(Entity::User(UserProfile {
            id,
            first_name: format!("User{id}"),
            last_name: None,
            username: Some(format!("u{id}")),
        }))
    }

    async fn forward_message(
        &self,
        target_chat: i64,
        message_id: i64,
        _from_peer: PeerRef,
    ) -> Result<ForwardOutcome, TransportError> {
        self.forwards
            .lock()
            .expect("lock")
            .push((target_chat, message_id));
        let copy = ChatMessage {
            id: self.next_message_id.fetch_add(1, Ordering::SeqCst),
            chat: PeerRef::Channel(target_chat),
            sender: None,
            text: format!("copy-of-{message_id}"),
            sent_unix: 0,
        };
        self.note(copy.clone());
        Ok(ForwardOutcome::Forwarded(copy))
    }

    async fn recent_messages(
        &self,
        chat: i64,
        limit: usize,
    ) -> Result<Vec<ChatMessage>, TransportError> {
        Ok(self
            .recent
            .lock()
            .expect("lock")
            .get(&chat)
            .map(|messages| messages.iter().take(limit).cloned().collect())
            .unwrap_or_default())
    }

    async fn send_text(&self, chat: i64, text: &str) -> Result<ChatMessage, TransportError> {
        if chat == JOURNAL_CHAT {
            self.journal.lock().expect("lock").push(text.to_string());
        }
        let message = ChatMessage {
            id: self.next_message_id.fetch_add(1, Ordering::SeqCst),
            chat: PeerRef::Channel(chat),
            sender: None,
            text: text.to_string(),
            sent_unix: 0,
        };
        self.note(message.clone());
        Ok(message)
    }

    async fn edit_text(
        &self,
        chat: i64,
        message_id: i64,
        text: &str,
    ) -> Result<ChatMessage, TransportError> {
        if chat == JOURNAL_CHAT {
            self.journal.lock().expect("lock").push(text.to_string());
        }
        let message = ChatMessage {
            id: message_id,
            chat: PeerRef::Channel(chat),
            sender: None,
            text: text.to_string(),
            sent_unix: 0,
        };
        self.note(message.clone());
        Ok(message)
    }

    fn message_link(&self, chat: i64, message_id: i64) -> String {
        format!("link://{chat}/{message_id}")
    }
}

struct ScriptedSource {
    events: VecDeque<InboundEvent>,
    disconnected: bool,
}

impl ScriptedSource {
    fn new(events: Vec<InboundEvent>) -> Self {
        Self {
            events: events.into_iter().collect(),
            disconnected: false,
        }
    }
}

#[async_trait]
impl EventSource for ScriptedSource {
    async fn next_event(&mut self) -> Result<Option<InboundEvent>, TransportError> {
        if self.disconnected {
            return Ok(None);
        }
        Ok(self.events.pop_front())
    }

    async fn disconnect(&mut self) -> Result<(), TransportError> {
        self.disconnected = true;
        Ok(())
    }
}

async fn run_service(
    root: &Path,
    state_key: Option<&str>,
    rpc: Arc<RecordingRpc>,
    events: Vec<InboundEvent>,
) {
    let gate = CipherGate::new(state_key);
    let audit = AuditTrail::open(root, gate.clone()).expect("audit trail must open");
    let reconciler = Reconciler::new(
        Arc::clone(&rpc) as Arc<dyn ChatRpc>,
        audit,
        MIRROR_CHAT,
        JOURNAL_CHAT,
    )
    .with_clock(|| "10:00:00".to_string());
    let snapshots = SnapshotStore::new(root, gate);
    let source = ScriptedSource::new(events);

    MirrorService::new(source, reconciler, snapshots, Duration::from_millis(1))
        .run()
        .await
        .expect("service run must succeed");
}

fn new_message(id: i64, user: i64, text: &str) -> InboundEvent {
    InboundEvent::NewMessage {
        message: ChatMessage {
            id,
            chat: PeerRef::User(user),
            sender: None,
            text: text.to_string(),
            sent_unix: 1_700_000_000,
        },
    }
}

fn edited_message(id: i64, user: i64, text: &str) -> InboundEvent {
    InboundEvent::EditedMessage {
        message: ChatMessage {
            id,
            chat: PeerRef::User(user),
            sender: None,
            text: text.to_string(),
            sent_unix: 1_700_000_100,
        },
    }
}

fn audit_kinds(gate: &CipherGate, path: &Path) -> Vec<String> {
    let raw = fs::read_to_string(path).expect("audit trail must be readable");
    raw.lines()
        .map(|line| {
            let opened = gate.open(line).expect("audit line must open");
            serde_json::from_str::<serde_json::Value>(&opened).expect("audit line must be json")
                ["kind"]
                .as_str()
                .expect("audit line must carry a kind")
                .to_string()
        })
        .collect()
}

#[tokio::test]
async fn integration_sealed_state_survives_restart() {
    let workspace = IsolatedWorkspace::new("sealed-restart");
    let root = workspace.root();
    let gate = CipherGate::new(Some(STATE_KEY));

    // First run: watch a message through its whole life.
    let first_rpc = RecordingRpc::new();
    run_service(
        root,
        Some(STATE_KEY),
        Arc::clone(&first_rpc),
        vec![
            new_message(10, 50, "original resolution"),
            InboundEvent::Presence {
                user_id: 7,
                chat_id: 50,
                action: PresenceAction::Composing,
            },
            edited_message(10, 50, "revised resolution"),
            InboundEvent::DeletedMessages {
                chat: Some(PeerRef::User(50)),
                message_ids: vec![10],
            },
        ],
    )
    .await;

    // Copy ids are allocated in event order: forward 100, typing send 101,
    // edit forward 102, then the journal sends.
    assert_eq!(first_rpc.forwards(), vec![(MIRROR_CHAT, 10), (MIRROR_CHAT, 10)]);
    assert_eq!(
        first_rpc.journal_texts(),
        vec![
            "TYPING from: User7 (@u7|7) private 10:00:00".to_string(),
            format!(
                "EDIT from: User50 (@u50|50)\n\n[before](link://{MIRROR_CHAT}/100): original resolution\n\n[after](link://{MIRROR_CHAT}/102): revised resolution"
            ),
            format!(
                "REMOVE msg from User50 (@u50|50):\n[before](link://{MIRROR_CHAT}/102): revised resolution"
            ),
        ]
    );

    // Keyed mode writes only the sealed file names, and the blobs never leak
    // message content.
    let snapshot_path = root.join("snapshot.enc");
    let audit_path = root.join("events.jsonl.enc");
    assert!(snapshot_path.exists());
    assert!(audit_path.exists());
    assert!(!root.join("snapshot.json").exists());
    assert!(!root.join("events.jsonl").exists());
    let snapshot_raw = fs::read_to_string(&snapshot_path).expect("snapshot must be readable");
    assert!(snapshot_raw.starts_with(SEALED_PREFIX));
    assert!(!snapshot_raw.contains("revised resolution"));

    assert_eq!(
        audit_kinds(&gate, &audit_path),
        vec!["new_message", "presence", "edited_message", "deleted_messages"]
    );

    // Second run: the restored stores feed the next edit report, and the
    // audit trail keeps appending.
    let second_rpc = RecordingRpc::new();
    run_service(
        root,
        Some(STATE_KEY),
        Arc::clone(&second_rpc),
        vec![edited_message(10, 50, "after the restart")],
    )
    .await;

    assert_eq!(
        second_rpc.journal_texts(),
        vec![format!(
            "EDIT from: User50 (@u50|50)\n\n[before](link://{MIRROR_CHAT}/102): revised resolution\n\n[after](link://{MIRROR_CHAT}/100): after the restart"
        )]
    );
    // Author and chat came out of the restored entity cache.
    assert_eq!(second_rpc.resolutions(), Vec::<i64>::new());
    assert_eq!(
        audit_kinds(&gate, &audit_path),
        vec![
            "new_message",
            "presence",
            "edited_message",
            "deleted_messages",
            "edited_message"
        ]
    );
}

#[tokio::test]
async fn integration_plaintext_state_round_trips_without_a_key() {
    let workspace = IsolatedWorkspace::new("plaintext-restart");
    let root = workspace.root();

    let first_rpc = RecordingRpc::new();
    run_service(
        root,
        None,
        Arc::clone(&first_rpc),
        vec![new_message(21, 60, "kept across runs")],
    )
    .await;

    // Plaintext mode uses the readable file names and plain JSONL.
    let snapshot_path = root.join("snapshot.json");
    let audit_path = root.join("events.jsonl");
    assert!(snapshot_path.exists());
    assert!(audit_path.exists());
    let snapshot_raw = fs::read_to_string(&snapshot_path).expect("snapshot must be readable");
    assert!(snapshot_raw.contains("kept across runs"));
    let audit_raw = fs::read_to_string(&audit_path).expect("audit must be readable");
    let first_line: serde_json::Value =
        serde_json::from_str(audit_raw.lines().next().expect("one audit line"))
            .expect("audit line must be json");
    assert_eq!(first_line["kind"], "new_message");

    let second_rpc = RecordingRpc::new();
    run_service(
        root,
        None,
        Arc::clone(&second_rpc),
        vec![edited_message(21, 60, "second life")],
    )
    .await;

    let reports = second_rpc.journal_texts();
    assert_eq!(reports.len(), 1);
    assert!(reports[0].contains("[before](link://-100500/100): kept across runs"));
    assert!(reports[0].contains("second life"));
}
