//! In-process reminder registry.
//!
//! Reminders are created by the `set_reminder` tool or the quick
//! "remind me in ..." reply, and removed when the heartbeat delivers them
//! or when cancelled. They are not persisted across restarts.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reminder {
    pub id: u64,
    pub chat_id: String,
    pub message: String,
    pub due_at: DateTime<Utc>,
    pub set_at: DateTime<Utc>,
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    reminders: Vec<Reminder>,
}

/// Pending reminders for every chat.
#[derive(Default)]
pub struct ReminderRegistry {
    inner: Mutex<Registry>,
}

impl ReminderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Registry> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a reminder. Ids increase monotonically from 1.
    pub fn add(&self, chat_id: &str, message: impl Into<String>, due_at: DateTime<Utc>) -> Reminder {
        let mut registry = self.lock();
        registry.next_id += 1;
        let reminder = Reminder {
            id: registry.next_id,
            chat_id: chat_id.to_string(),
            message: message.into(),
            due_at,
            set_at: Utc::now(),
        };
        registry.reminders.push(reminder.clone());
        debug!(chat_id, id = reminder.id, due_at = %reminder.due_at, "Reminder set");
        reminder
    }

    /// Cancel one of a chat's reminders. Other chats' ids are not visible.
    pub fn cancel(&self, chat_id: &str, id: u64) -> bool {
        let mut registry = self.lock();
        let before = registry.reminders.len();
        registry
            .reminders
            .retain(|r| !(r.id == id && r.chat_id == chat_id));
        registry.reminders.len() < before
    }

    /// A chat's reminders, soonest first.
    pub fn list(&self, chat_id: &str) -> Vec<Reminder> {
        let mut list: Vec<Reminder> = self
            .lock()
            .reminders
            .iter()
            .filter(|r| r.chat_id == chat_id)
            .cloned()
            .collect();
        list.sort_by_key(|r| r.due_at);
        list
    }

    /// Remove and return every reminder due at or before `now`.
    pub fn take_due(&self, now: DateTime<Utc>) -> Vec<Reminder> {
        let mut registry = self.lock();
        let (mut due, pending): (Vec<Reminder>, Vec<Reminder>) = registry
            .reminders
            .drain(..)
            .partition(|r| r.due_at <= now);
        registry.reminders = pending;
        due.sort_by_key(|r| r.due_at);
        due
    }

    pub fn len(&self) -> usize {
        self.lock().reminders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
