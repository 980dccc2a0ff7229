//! Validated tool inputs, one variant per tool.
//!
//! The model's `(name, input)` pair is decoded into a [`ToolInput`] at the
//! boundary. Unknown names and malformed arguments fail here, before any
//! collaborator is touched.

use serde::Deserialize;
use thriftbot_core::error::ToolError;
use thriftbot_core::tool::ToolCall;

/// Longest reminder delay accepted from the model: one week.
pub const MAX_REMINDER_MINUTES: u32 = 7 * 24 * 60;

pub const TOOL_NAMES: [&str; 6] = [
    "set_reminder",
    "list_reminders",
    "cancel_reminder",
    "remember",
    "recall",
    "current_time",
];

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "tool", content = "input", rename_all = "snake_case")]
pub enum ToolInput {
    SetReminder { minutes: u32, message: String },
    ListReminders {},
    CancelReminder { id: u64 },
    Remember { fact: String },
    Recall { query: String },
    CurrentTime {},
}

impl ToolInput {
    pub fn parse(call: &ToolCall) -> Result<Self, ToolError> {
        if !TOOL_NAMES.contains(&call.name.as_str()) {
            return Err(ToolError::NotFound(call.name.clone()));
        }

        // Argument-less tools are sometimes called with `null`
        let input = if call.input.is_null() {
            serde_json::json!({})
        } else {
            call.input.clone()
        };

        let tagged = serde_json::json!({ "tool": call.name, "input": input });
        let parsed: ToolInput =
            serde_json::from_value(tagged).map_err(|e| invalid(&call.name, e.to_string()))?;
        parsed.validate(&call.name)?;
        Ok(parsed)
    }

    fn validate(&self, name: &str) -> Result<(), ToolError> {
        match self {
            ToolInput::SetReminder { minutes, message } => {
                if *minutes == 0 || *minutes > MAX_REMINDER_MINUTES {
                    return Err(invalid(
                        name,
                        format!("minutes must be between 1 and {MAX_REMINDER_MINUTES}"),
                    ));
                }
                if message.trim().is_empty() {
                    return Err(invalid(name, "message must not be empty"));
                }
            }
            ToolInput::Remember { fact } if fact.trim().is_empty() => {
                return Err(invalid(name, "fact must not be empty"));
            }
            ToolInput::Recall { query } if query.trim().is_empty() => {
                return Err(invalid(name, "query must not be empty"));
            }
            _ => {}
        }
        Ok(())
    }
}

fn invalid(name: &str, reason: impl Into<String>) -> ToolError {
    ToolError::InvalidArguments {
        tool_name: name.to_string(),
        reason: reason.into(),
    }
}
