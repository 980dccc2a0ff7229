//! In-memory session cache with debounced write-back to one JSON file per
//! conversation.
//!
//! Appends mutate the cached [`Session`] and schedule a write. A write
//! already pending for the same conversation absorbs later appends; when
//! its timer fires it persists whatever the cache holds at that moment.
//! The cache keeps the `cache_size` most recently used conversations.
//! Evicting one first forces its pending write to disk.
//!
//! Storage location: `<data_dir>/sessions/<encoded id>.json`

use crate::session::{CompressedView, Session, SessionMessage, SessionRole};
use chrono::Utc;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use thriftbot_config::SessionConfig;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Errors from writing a session record.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Session I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Session serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Tuning knobs for the store.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub max_history: usize,
    pub cache_size: usize,
    pub debounce: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::from(&SessionConfig::default())
    }
}

impl From<&SessionConfig> for StoreConfig {
    fn from(config: &SessionConfig) -> Self {
        Self {
            max_history: config.max_history.max(1),
            cache_size: config.cache_size.max(1),
            debounce: config.debounce(),
        }
    }
}

struct CachedSession {
    session: Session,
    /// Recency stamp; higher is more recent
    touched: u64,
}

struct PendingWrite {
    generation: u64,
    handle: Option<JoinHandle<()>>,
}

#[derive(Default)]
struct State {
    sessions: HashMap<String, CachedSession>,
    pending: HashMap<String, PendingWrite>,
    clock: u64,
}

impl State {
    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }
}

struct Inner {
    dir: PathBuf,
    config: StoreConfig,
    state: Mutex<State>,
    writes: AtomicU64,
}

/// Disk-backed conversation history. Cheap to clone.
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<Inner>,
}

impl SessionStore {
    /// Create a store writing under `dir`. The directory is created lazily.
    pub fn new(dir: impl Into<PathBuf>, config: StoreConfig) -> Self {
        let dir = dir.into();
        debug!(dir = %dir.display(), cache_size = config.cache_size, "Session store opened");
        Self {
            inner: Arc::new(Inner {
                dir,
                config,
                state: Mutex::new(State::default()),
                writes: AtomicU64::new(0),
            }),
        }
    }

    /// Load a conversation. Never fails: unreadable or corrupt records
    /// degrade to an empty session.
    pub fn load(&self, id: &str) -> Session {
        let mut state = self.inner.lock();
        self.ensure_cached(&mut state, id);
        let stamp = state.tick();
        match state.sessions.get_mut(id) {
            Some(cached) => {
                cached.touched = stamp;
                cached.session.clone()
            }
            None => Session::new(),
        }
    }

    /// Append a turn, trim to `max_history` and schedule a write.
    pub fn append(&self, id: &str, role: SessionRole, content: impl Into<String>) {
        let mut state = self.inner.lock();
        self.ensure_cached(&mut state, id);
        let stamp = state.tick();
        let max_history = self.inner.config.max_history;

        if let Some(cached) = state.sessions.get_mut(id) {
            let session = &mut cached.session;
            session.messages.push(SessionMessage::new(role, content));
            if session.messages.len() > max_history {
                let excess = session.messages.len() - max_history;
                session.messages.drain(..excess);
            }
            session.last_activity = Utc::now();
            cached.touched = stamp;
        }

        self.schedule_write(&mut state, id);
    }

    /// Summary and remaining turns of a conversation.
    pub fn compressed_view(&self, id: &str) -> CompressedView {
        let session = self.load(id);
        CompressedView {
            summary: session.conversation_summary,
            messages: session.messages,
        }
    }

    /// Drop the oldest `compressed_count` turns and store `summary` in
    /// their place.
    pub fn apply_compression(&self, id: &str, compressed_count: usize, summary: impl Into<String>) {
        let mut state = self.inner.lock();
        self.ensure_cached(&mut state, id);

        if let Some(cached) = state.sessions.get_mut(id) {
            let session = &mut cached.session;
            let n = compressed_count.min(session.messages.len());
            session.messages.drain(..n);
            session.conversation_summary = Some(summary.into());
        }

        self.schedule_write(&mut state, id);
    }

    /// The last assistant turn stored for a conversation.
    pub fn last_assistant_message(&self, id: &str) -> Option<String> {
        self.load(id).last_assistant_message().map(str::to_string)
    }

    /// Forget a conversation: cancel its pending write, drop it from the
    /// cache and delete its record.
    pub fn clear(&self, id: &str) {
        let mut state = self.inner.lock();
        if let Some(pending) = state.pending.remove(id) {
            pending.abort();
        }
        state.sessions.remove(id);

        let path = self.inner.path_for(id);
        match std::fs::remove_file(&path) {
            Ok(()) => info!(conversation_id = %id, "Session cleared"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(conversation_id = %id, error = %e, "Failed to delete session record"),
        }
    }

    /// Write a conversation's pending state now. Returns whether anything
    /// was written.
    pub fn flush(&self, id: &str) -> Result<bool, SessionError> {
        let mut state = self.inner.lock();
        self.inner.flush_locked(&mut state, id)
    }

    /// Write every pending conversation. Used on shutdown.
    pub fn flush_all(&self) -> usize {
        let mut state = self.inner.lock();
        let ids: Vec<String> = state.pending.keys().cloned().collect();
        let mut flushed = 0;
        for id in ids {
            match self.inner.flush_locked(&mut state, &id) {
                Ok(true) => flushed += 1,
                Ok(false) => {}
                Err(e) => warn!(conversation_id = %id, error = %e, "Failed to flush session"),
            }
        }
        if flushed > 0 {
            info!(count = flushed, "Flushed pending sessions");
        }
        flushed
    }

    /// Number of record writes performed so far.
    pub fn write_count(&self) -> u64 {
        self.inner.writes.load(Ordering::SeqCst)
    }

    /// Number of conversations currently cached.
    pub fn cached_len(&self) -> usize {
        self.inner.lock().sessions.len()
    }

    /// Number of conversations with a write scheduled.
    pub fn pending_len(&self) -> usize {
        self.inner.lock().pending.len()
    }

    /// Where a conversation's record lives.
    pub fn path_for(&self, id: &str) -> PathBuf {
        self.inner.path_for(id)
    }

    /// Cache a conversation, persisting it again if its record was longer
    /// than `max_history`.
    fn ensure_cached(&self, state: &mut State, id: &str) {
        if self.inner.ensure_cached(state, id) {
            self.schedule_write(state, id);
        }
    }

    fn schedule_write(&self, state: &mut State, id: &str) {
        if state.pending.contains_key(id) {
            return;
        }

        let generation = state.tick();
        let handle = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                let inner = Arc::clone(&self.inner);
                let id_owned = id.to_string();
                let delay = self.inner.config.debounce;
                Some(runtime.spawn(async move {
                    tokio::time::sleep(delay).await;
                    inner.fire(&id_owned, generation);
                }))
            }
            Err(_) => None,
        };

        match handle {
            Some(handle) => {
                state.pending.insert(
                    id.to_string(),
                    PendingWrite {
                        generation,
                        handle: Some(handle),
                    },
                );
            }
            // No runtime to defer on: write through
            None => {
                if let Some(cached) = state.sessions.get(id) {
                    if let Err(e) = self.inner.write(id, &cached.session) {
                        warn!(conversation_id = %id, error = %e, "Failed to write session");
                    }
                }
            }
        }
    }
}

impl PendingWrite {
    fn abort(self) {
        if let Some(handle) = self.handle {
            handle.abort();
        }
    }
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn path_for(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", encode_id(id)))
    }

    /// Debounce timer expiry.
    fn fire(&self, id: &str, generation: u64) {
        let mut state = self.lock();
        let current = state.pending.get(id).map(|p| p.generation);
        if current != Some(generation) {
            // Flushed, cleared or rescheduled in the meantime
            return;
        }
        state.pending.remove(id);
        if let Some(cached) = state.sessions.get(id) {
            if let Err(e) = self.write(id, &cached.session) {
                warn!(conversation_id = %id, error = %e, "Debounced session write failed");
            }
        }
    }

    fn flush_locked(&self, state: &mut State, id: &str) -> Result<bool, SessionError> {
        let Some(pending) = state.pending.remove(id) else {
            return Ok(false);
        };
        pending.abort();
        match state.sessions.get(id) {
            Some(cached) => {
                self.write(id, &cached.session)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Bring a conversation into the cache, evicting others if needed.
    /// Returns whether the record on disk had to be trimmed.
    fn ensure_cached(&self, state: &mut State, id: &str) -> bool {
        if state.sessions.contains_key(id) {
            return false;
        }
        let mut session = self.read(id);
        let excess = session.messages.len().saturating_sub(self.config.max_history);
        if excess > 0 {
            session.messages.drain(..excess);
            debug!(conversation_id = %id, dropped = excess, "Stored history trimmed on load");
        }
        let touched = state.tick();
        state
            .sessions
            .insert(id.to_string(), CachedSession { session, touched });
        self.evict(state, id);
        excess > 0
    }

    fn evict(&self, state: &mut State, keep: &str) {
        while state.sessions.len() > self.config.cache_size {
            let victim = state
                .sessions
                .iter()
                .filter(|(id, _)| id.as_str() != keep)
                .min_by_key(|(_, cached)| cached.touched)
                .map(|(id, _)| id.clone());

            let Some(victim) = victim else { break };

            if let Err(e) = self.flush_locked(state, &victim) {
                warn!(conversation_id = %victim, error = %e, "Failed to flush evicted session");
            }
            state.sessions.remove(&victim);
            debug!(conversation_id = %victim, "Session evicted from cache");
        }
    }

    fn read(&self, id: &str) -> Session {
        let path = self.path_for(id);
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Session::new(),
            Err(e) => {
                warn!(conversation_id = %id, error = %e, "Unreadable session record, starting fresh");
                return Session::new();
            }
        };

        match serde_json::from_slice::<Session>(&bytes) {
            Ok(session) => session,
            Err(e) => {
                let backup = backup_path(&path);
                match std::fs::rename(&path, &backup) {
                    Ok(()) => warn!(
                        conversation_id = %id,
                        error = %e,
                        backup = %backup.display(),
                        "Corrupt session record backed up, starting fresh"
                    ),
                    Err(rename_err) => warn!(
                        conversation_id = %id,
                        error = %rename_err,
                        "Corrupt session record could not be backed up"
                    ),
                }
                Session::new()
            }
        }
    }

    fn write(&self, id: &str, session: &Session) -> Result<(), SessionError> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.path_for(id);
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_vec(session)?)?;
        std::fs::rename(&tmp, &path)?;
        self.writes.fetch_add(1, Ordering::SeqCst);
        debug!(conversation_id = %id, messages = session.messages.len(), "Session persisted");
        Ok(())
    }
}

/// Filesystem-safe file stem for a conversation id. ASCII alphanumerics,
/// `-` and `_` pass through; every other byte becomes `%XX`.
pub fn encode_id(id: &str) -> String {
    let mut out = String::with_capacity(id.len());
    for byte in id.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_' {
            out.push(byte as char);
        } else {
            out.push_str(&format!("%{byte:02X}"));
        }
    }
    out
}

fn backup_path(path: &Path) -> PathBuf {
    let stamp = Utc::now().format("%Y%m%dT%H%M%S%3fZ");
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(format!(".corrupt-{stamp}"));
    path.with_file_name(name)
}
