//! The tool set handed to the orchestrator.

use crate::input::{MAX_REMINDER_MINUTES, ToolInput};
use crate::notes::NoteStore;
use crate::reminders::ReminderRegistry;
use async_trait::async_trait;
use chrono::{Duration, Local, Utc};
use std::sync::Arc;
use thriftbot_core::error::ToolError;
use thriftbot_core::provider::ToolDefinition;
use thriftbot_core::tool::{ToolCall, ToolExecutor};
use tracing::{info, warn};

const RECALL_LIMIT: usize = 5;

/// Reminders, notes and the clock behind the dispatch-by-name contract.
pub struct Toolbox {
    reminders: Arc<ReminderRegistry>,
    notes: Arc<NoteStore>,
}

impl Toolbox {
    pub fn new(reminders: Arc<ReminderRegistry>, notes: Arc<NoteStore>) -> Self {
        Self { reminders, notes }
    }

    async fn run(&self, chat_id: &str, input: ToolInput) -> Result<String, ToolError> {
        match input {
            ToolInput::SetReminder { minutes, message } => {
                let due_at = Utc::now() + Duration::minutes(i64::from(minutes));
                let reminder = self.reminders.add(chat_id, message, due_at);
                Ok(format!(
                    "Reminder #{} set for {} ({} min from now): {}",
                    reminder.id,
                    reminder.due_at.with_timezone(&Local).format("%H:%M"),
                    minutes,
                    reminder.message
                ))
            }
            ToolInput::ListReminders {} => {
                let list = self.reminders.list(chat_id);
                if list.is_empty() {
                    return Ok("No reminders set.".into());
                }
                let lines: Vec<String> = list
                    .iter()
                    .map(|r| {
                        format!(
                            "#{} at {}: {}",
                            r.id,
                            r.due_at.with_timezone(&Local).format("%a %H:%M"),
                            r.message
                        )
                    })
                    .collect();
                Ok(lines.join("\n"))
            }
            ToolInput::CancelReminder { id } => {
                if self.reminders.cancel(chat_id, id) {
                    Ok(format!("Reminder #{id} cancelled."))
                } else {
                    Err(ToolError::ExecutionFailed {
                        tool_name: "cancel_reminder".into(),
                        reason: format!("no reminder #{id} in this chat"),
                    })
                }
            }
            ToolInput::Remember { fact } => {
                let note = self.notes.remember(chat_id, &fact).await?;
                Ok(format!("Noted: {}", note.fact))
            }
            ToolInput::Recall { query } => {
                let found = self.notes.recall(chat_id, &query, RECALL_LIMIT).await;
                if found.is_empty() {
                    return Ok(format!("Nothing remembered about \"{query}\"."));
                }
                let lines: Vec<String> = found.iter().map(|n| format!("- {}", n.fact)).collect();
                Ok(lines.join("\n"))
            }
            ToolInput::CurrentTime {} => {
                Ok(Local::now().format("%A, %B %-d %Y, %H:%M %Z").to_string())
            }
        }
    }
}

#[async_trait]
impl ToolExecutor for Toolbox {
    fn definitions(&self) -> Vec<ToolDefinition> {
        vec![
            ToolDefinition {
                name: "set_reminder".into(),
                description: "Remind the user about something after a number of minutes.".into(),
                input_schema: serde_json::json!({
                    "type": "object",
                    "properties": {
                        "minutes": {
                            "type": "integer",
                            "minimum": 1,
                            "maximum": MAX_REMINDER_MINUTES,
                            "description": "Minutes from now"
                        },
                        "message": { "type": "string", "description": "What to remind about" }
                    },
                    "required": ["minutes", "message"]
                }),
            },
            ToolDefinition {
                name: "list_reminders".into(),
                description: "List the user's pending reminders.".into(),
                input_schema: serde_json::json!({ "type": "object", "properties": {} }),
            },
            ToolDefinition {
                name: "cancel_reminder".into(),
                description: "Cancel a pending reminder by its number.".into(),
                input_schema: serde_json::json!({
                    "type": "object",
                    "properties": { "id": { "type": "integer" } },
                    "required": ["id"]
                }),
            },
            ToolDefinition {
                name: "remember".into(),
                description: "Store a fact about the user for later conversations.".into(),
                input_schema: serde_json::json!({
                    "type": "object",
                    "properties": { "fact": { "type": "string" } },
                    "required": ["fact"]
                }),
            },
            ToolDefinition {
                name: "recall".into(),
                description: "Look up previously remembered facts by keyword.".into(),
                input_schema: serde_json::json!({
                    "type": "object",
                    "properties": { "query": { "type": "string" } },
                    "required": ["query"]
                }),
            },
            ToolDefinition {
                name: "current_time".into(),
                description: "Get the current local date and time.".into(),
                input_schema: serde_json::json!({ "type": "object", "properties": {} }),
            },
        ]
    }

    async fn execute(&self, chat_id: &str, call: &ToolCall) -> String {
        let result = match ToolInput::parse(call) {
            Ok(input) => self.run(chat_id, input).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(output) => {
                info!(chat_id, tool = %call.name, "Tool executed");
                output
            }
            Err(e) => {
                warn!(chat_id, tool = %call.name, error = %e, "Tool failed");
                format!("Error: {e}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn toolbox(dir: &TempDir) -> (Toolbox, Arc<ReminderRegistry>) {
        let reminders = Arc::new(ReminderRegistry::new());
        let notes = Arc::new(NoteStore::open(dir.path().join("notes.jsonl")));
        (Toolbox::new(reminders.clone(), notes), reminders)
    }

    fn call(name: &str, input: serde_json::Value) -> ToolCall {
        ToolCall {
            id: "toolu_1".into(),
            name: name.into(),
            input,
        }
    }

    #[test]
    fn definitions_cover_every_tool() {
        let dir = TempDir::new().unwrap();
        let (tb, _) = toolbox(&dir);
        let names: Vec<String> = tb.definitions().into_iter().map(|d| d.name).collect();
        assert_eq!(names, crate::input::TOOL_NAMES.to_vec());
    }

    #[tokio::test]
    async fn reminder_lifecycle() {
        let dir = TempDir::new().unwrap();
        let (tb, reminders) = toolbox(&dir);

        let out = tb
            .execute("c", &call("set_reminder", json!({"minutes": 10, "message": "tea"})))
            .await;
        assert!(out.starts_with("Reminder #1 set"), "{out}");
        assert_eq!(reminders.len(), 1);

        let listed = tb.execute("c", &call("list_reminders", json!({}))).await;
        assert!(listed.contains("#1") && listed.contains("tea"));

        let cancelled = tb.execute("c", &call("cancel_reminder", json!({"id": 1}))).await;
        assert_eq!(cancelled, "Reminder #1 cancelled.");
        assert_eq!(
            tb.execute("c", &call("list_reminders", json!({}))).await,
            "No reminders set."
        );
    }

    #[tokio::test]
    async fn failures_become_text() {
        let dir = TempDir::new().unwrap();
        let (tb, _) = toolbox(&dir);

        let unknown = tb.execute("c", &call("format_disk", json!({}))).await;
        assert!(unknown.starts_with("Error:"));

        let malformed = tb.execute("c", &call("set_reminder", json!({"minutes": "soon"}))).await;
        assert!(malformed.starts_with("Error:"));

        let missing = tb.execute("c", &call("cancel_reminder", json!({"id": 99}))).await;
        assert!(missing.starts_with("Error:") && missing.contains("#99"));
    }

    #[tokio::test]
    async fn remember_then_recall() {
        let dir = TempDir::new().unwrap();
        let (tb, _) = toolbox(&dir);

        tb.execute("c", &call("remember", json!({"fact": "Parks on level 3"}))).await;
        let out = tb.execute("c", &call("recall", json!({"query": "parking level"}))).await;
        assert!(out.contains("level 3"), "{out}");
    }
}
