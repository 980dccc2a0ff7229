//! File-backed notes: facts the assistant was asked to remember.
//!
//! Each line of the file is one JSON-encoded [`Note`]. Notes are loaded on
//! open and the file is rewritten on every change.
//!
//! Storage location: `<data_dir>/notes.jsonl`

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thriftbot_core::error::ToolError;
use tokio::sync::RwLock;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub chat_id: String,
    pub fact: String,
    pub created_at: DateTime<Utc>,
}

pub struct NoteStore {
    path: PathBuf,
    notes: RwLock<Vec<Note>>,
}

impl NoteStore {
    /// Open the store at `path`. A missing file starts empty.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let notes = Self::load_from_disk(&path);
        debug!(path = %path.display(), count = notes.len(), "Notes loaded");
        Self {
            path,
            notes: RwLock::new(notes),
        }
    }

    fn load_from_disk(path: &PathBuf) -> Vec<Note> {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(_) => return Vec::new(),
        };

        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| match serde_json::from_str::<Note>(line) {
                Ok(note) => Some(note),
                Err(e) => {
                    warn!(error = %e, "Skipping corrupted note");
                    None
                }
            })
            .collect()
    }

    fn persist(&self, notes: &[Note]) -> Result<(), ToolError> {
        let failed = |reason: String| ToolError::ExecutionFailed {
            tool_name: "remember".into(),
            reason,
        };

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| failed(format!("cannot create notes directory: {e}")))?;
        }

        let mut content = String::new();
        for note in notes {
            let line = serde_json::to_string(note)
                .map_err(|e| failed(format!("cannot encode note: {e}")))?;
            content.push_str(&line);
            content.push('\n');
        }

        std::fs::write(&self.path, content).map_err(|e| failed(format!("cannot write notes: {e}")))
    }

    pub async fn remember(&self, chat_id: &str, fact: &str) -> Result<Note, ToolError> {
        let note = Note {
            chat_id: chat_id.to_string(),
            fact: fact.trim().to_string(),
            created_at: Utc::now(),
        };
        let mut notes = self.notes.write().await;
        notes.push(note.clone());
        if let Err(e) = self.persist(&notes) {
            notes.pop();
            return Err(e);
        }
        Ok(note)
    }

    /// A chat's notes sharing at least one word with `query`, best match
    /// first, newest first among equals.
    pub async fn recall(&self, chat_id: &str, query: &str, limit: usize) -> Vec<Note> {
        let words: Vec<String> = query
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| w.len() > 2)
            .map(str::to_lowercase)
            .collect();

        let notes = self.notes.read().await;
        let mut scored: Vec<(usize, &Note)> = notes
            .iter()
            .filter(|n| n.chat_id == chat_id)
            .map(|n| {
                let fact = n.fact.to_lowercase();
                (words.iter().filter(|w| fact.contains(w.as_str())).count(), n)
            })
            .filter(|(score, _)| *score > 0)
            .collect();

        scored.sort_by(|a, b| b.0.cmp(&a.0).then(b.1.created_at.cmp(&a.1.created_at)));
        scored.into_iter().take(limit).map(|(_, n)| n.clone()).collect()
    }

    pub async fn count(&self, chat_id: &str) -> usize {
        self.notes.read().await.iter().filter(|n| n.chat_id == chat_id).count()
    }
}
