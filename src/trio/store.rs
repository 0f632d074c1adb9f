//! Persistence interface consumed by the orchestration core.
//!
//! [`ChatStore`] is the seam between the core and whatever database the host
//! application runs. Two implementations ship with the crate:
//!
//! - [`InMemoryStore`] keeps everything in process memory (tests, embedding).
//! - [`JsonlStore`] keeps one append-only `.jsonl` message log per chat on disk.
//!
//! # Disk Format
//!
//! ```text
//! <dir>/chat_7.json          one JSON-serialized Chat (agents included)
//! <dir>/messages_7.jsonl     one JSON-serialized Message per line, append-only
//! <dir>/completions.jsonl    one CompletionLog per line, append-only
//! ```
//!
//! # Example
//!
//! ```rust
//! use trio::model::{Agent, Chat, ChatType, Message};
//! use trio::store::{ChatStore, InMemoryStore};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), trio::TrioError> {
//! let store = InMemoryStore::new();
//! store.insert_chat(Chat::new(1, 1, "demo", ChatType::Default).with_agent(Agent::new(1, "Ada")))?;
//!
//! let saved = store.create_messages(vec![Message::from_user(1, 1, "hi")]).await?;
//! assert!(saved[0].id.is_some());
//! assert_eq!(store.load_history(1).await?.len(), 1);
//! # Ok(())
//! # }
//! ```

use crate::trio::completion::{Completion, TokenUsage};
use crate::trio::error::TrioError;
use crate::trio::model::{Chat, Message, SenderType};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// One record per completion call: what was asked, what it cost, and who asked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionLog {
    pub prompt: String,
    pub model: String,
    pub input_tokens: usize,
    pub output_tokens: usize,
    pub total_tokens: usize,
    pub sender_type: SenderType,
    pub sender_id: u64,
    pub timestamp: DateTime<Utc>,
}

impl CompletionLog {
    pub fn new(
        prompt: impl Into<String>,
        completion: &Completion,
        sender_type: SenderType,
        sender_id: u64,
    ) -> Self {
        let TokenUsage {
            input_tokens,
            output_tokens,
            total_tokens,
        } = completion.usage.clone();
        Self {
            prompt: prompt.into(),
            model: completion.model.clone(),
            input_tokens,
            output_tokens,
            total_tokens,
            sender_type,
            sender_id,
            timestamp: Utc::now(),
        }
    }
}

/// Storage operations the core needs.
#[async_trait]
pub trait ChatStore: Send + Sync {
    /// Load a chat together with its agents.
    async fn load_chat(&self, chat_id: u64) -> Result<Chat, TrioError>;

    /// All messages of a chat in canonical order: ascending creation time,
    /// ties broken by identity. Fails as a whole; never returns partial history.
    async fn load_history(&self, chat_id: u64) -> Result<Vec<Message>, TrioError>;

    /// Commit an ordered batch as a single write and return the stored
    /// messages with identities assigned. Either every message is stored or none.
    async fn create_messages(&self, batch: Vec<Message>) -> Result<Vec<Message>, TrioError>;

    /// Record usage for one completion call.
    async fn record_completion(&self, log: CompletionLog) -> Result<(), TrioError>;
}

fn sort_chronologically(messages: &mut [Message]) {
    messages.sort_by(|a, b| {
        a.created_at
            .cmp(&b.created_at)
            .then_with(|| a.id.cmp(&b.id))
    });
}

#[derive(Default)]
struct MemoryState {
    chats: HashMap<u64, Chat>,
    messages: HashMap<u64, Vec<Message>>,
    completion_logs: Vec<CompletionLog>,
    next_message_id: u64,
}

/// Process-local [`ChatStore`].
#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<MemoryState>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, MemoryState>, TrioError> {
        self.state
            .lock()
            .map_err(|_| TrioError::Storage("in-memory store lock poisoned".into()))
    }

    /// Register a chat. Messages carried on the chat are ignored; add them
    /// through [`ChatStore::create_messages`].
    pub fn insert_chat(&self, mut chat: Chat) -> Result<(), TrioError> {
        chat.validate()?;
        chat.messages.clear();
        let mut state = self.lock()?;
        state.messages.entry(chat.id).or_default();
        state.chats.insert(chat.id, chat);
        Ok(())
    }

    /// Snapshot of every completion log recorded so far.
    pub fn completion_logs(&self) -> Vec<CompletionLog> {
        self.lock()
            .map(|state| state.completion_logs.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ChatStore for InMemoryStore {
    async fn load_chat(&self, chat_id: u64) -> Result<Chat, TrioError> {
        let state = self.lock()?;
        state
            .chats
            .get(&chat_id)
            .cloned()
            .ok_or(TrioError::ChatNotFound(chat_id))
    }

    async fn load_history(&self, chat_id: u64) -> Result<Vec<Message>, TrioError> {
        let state = self.lock()?;
        let mut history = state
            .messages
            .get(&chat_id)
            .cloned()
            .ok_or(TrioError::ChatNotFound(chat_id))?;
        sort_chronologically(&mut history);
        Ok(history)
    }

    async fn create_messages(&self, batch: Vec<Message>) -> Result<Vec<Message>, TrioError> {
        let mut state = self.lock()?;
        if let Some(missing) = batch.iter().find(|m| !state.chats.contains_key(&m.chat_id)) {
            return Err(TrioError::ChatNotFound(missing.chat_id));
        }

        let mut saved = Vec::with_capacity(batch.len());
        for mut message in batch {
            state.next_message_id += 1;
            message.id = Some(state.next_message_id);
            state
                .messages
                .entry(message.chat_id)
                .or_default()
                .push(message.clone());
            saved.push(message);
        }
        Ok(saved)
    }

    async fn record_completion(&self, log: CompletionLog) -> Result<(), TrioError> {
        self.lock()?.completion_logs.push(log);
        Ok(())
    }
}

struct JsonlState {
    chats: HashMap<u64, Chat>,
    next_message_id: u64,
}

/// Directory-backed [`ChatStore`] using append-only newline-delimited JSON.
///
/// Each batch is a single append to one chat's log, so batches spanning
/// several chats are rejected. A crash in the middle of that append can still
/// leave a torn final line, which [`JsonlStore::open`] reports as a storage
/// error.
pub struct JsonlStore {
    dir: PathBuf,
    state: Mutex<JsonlState>,
}

impl JsonlStore {
    /// Open (or create) a store rooted at `dir`, reloading every chat and
    /// resuming message identities after the highest one on disk.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, TrioError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;

        let mut chats = HashMap::new();
        let mut next_message_id = 0;
        for entry in fs::read_dir(&dir)? {
            let path = entry?.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if name.starts_with("chat_") && name.ends_with(".json") {
                let chat: Chat = serde_json::from_str(&fs::read_to_string(&path)?)?;
                chats.insert(chat.id, chat);
            } else if name.starts_with("messages_") && name.ends_with(".jsonl") {
                for message in read_messages(&path)? {
                    next_message_id = next_message_id.max(message.id.unwrap_or(0));
                }
            }
        }

        log::debug!(
            "JsonlStore opened at {} with {} chats",
            dir.display(),
            chats.len()
        );

        Ok(Self {
            dir,
            state: Mutex::new(JsonlState {
                chats,
                next_message_id,
            }),
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, JsonlState>, TrioError> {
        self.state
            .lock()
            .map_err(|_| TrioError::Storage("jsonl store lock poisoned".into()))
    }

    fn chat_path(&self, chat_id: u64) -> PathBuf {
        self.dir.join(format!("chat_{}.json", chat_id))
    }

    fn messages_path(&self, chat_id: u64) -> PathBuf {
        self.dir.join(format!("messages_{}.jsonl", chat_id))
    }

    /// Register (or overwrite) a chat definition.
    pub fn insert_chat(&self, mut chat: Chat) -> Result<(), TrioError> {
        chat.validate()?;
        chat.messages.clear();
        let mut state = self.lock()?;
        fs::write(self.chat_path(chat.id), serde_json::to_string_pretty(&chat)?)?;
        state.chats.insert(chat.id, chat);
        Ok(())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

fn read_messages(path: &Path) -> Result<Vec<Message>, TrioError> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let reader = BufReader::new(fs::File::open(path)?);
    let mut messages = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        messages.push(serde_json::from_str(&line)?);
    }
    Ok(messages)
}

fn append_lines(path: &Path, payload: &str) -> Result<(), TrioError> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(payload.as_bytes())?;
    file.flush()?;
    Ok(())
}

#[async_trait]
impl ChatStore for JsonlStore {
    async fn load_chat(&self, chat_id: u64) -> Result<Chat, TrioError> {
        self.lock()?
            .chats
            .get(&chat_id)
            .cloned()
            .ok_or(TrioError::ChatNotFound(chat_id))
    }

    async fn load_history(&self, chat_id: u64) -> Result<Vec<Message>, TrioError> {
        let state = self.lock()?;
        if !state.chats.contains_key(&chat_id) {
            return Err(TrioError::ChatNotFound(chat_id));
        }
        let mut history = read_messages(&self.messages_path(chat_id))?;
        sort_chronologically(&mut history);
        Ok(history)
    }

    /// Batches must target a single chat: the whole batch lands in one
    /// append to that chat's log.
    async fn create_messages(&self, batch: Vec<Message>) -> Result<Vec<Message>, TrioError> {
        let Some(chat_id) = batch.first().map(|m| m.chat_id) else {
            return Ok(Vec::new());
        };
        if batch.iter().any(|m| m.chat_id != chat_id) {
            return Err(TrioError::Validation(
                "a message batch must target a single chat".to_string(),
            ));
        }

        let mut state = self.lock()?;
        if !state.chats.contains_key(&chat_id) {
            return Err(TrioError::ChatNotFound(chat_id));
        }

        // Serialize everything before touching disk so a bad record writes nothing.
        let mut next_id = state.next_message_id;
        let mut saved = Vec::with_capacity(batch.len());
        let mut payload = String::new();
        for mut message in batch {
            next_id += 1;
            message.id = Some(next_id);
            payload.push_str(&serde_json::to_string(&message)?);
            payload.push('\n');
            saved.push(message);
        }

        append_lines(&self.messages_path(chat_id), &payload)?;
        state.next_message_id = next_id;
        Ok(saved)
    }

    async fn record_completion(&self, log: CompletionLog) -> Result<(), TrioError> {
        let _guard = self.lock()?;
        let line = format!("{}\n", serde_json::to_string(&log)?);
        append_lines(&self.dir.join("completions.jsonl"), &line)
    }
}

/// Record `entry` if a store is attached. Failures are logged and swallowed.
pub(crate) async fn record_completion_best_effort(
    store: &Option<Arc<dyn ChatStore>>,
    entry: CompletionLog,
) {
    if let Some(store) = store {
        if let Err(err) = store.record_completion(entry).await {
            log::warn!("Failed to record completion log: {}", err);
        }
    }
}
