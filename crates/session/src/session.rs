//! The persisted shape of one conversation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Who said a stored turn. Tool traffic is never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionRole {
    User,
    Assistant,
}

/// One stored turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionMessage {
    pub role: SessionRole,
    pub content: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
}

impl SessionMessage {
    pub fn new(role: SessionRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

/// History of a single conversation, as written to disk.
///
/// On disk: `{"messages":[{"role","content","timestamp"}],"lastActivity",
/// "conversationSummary"?}` with millisecond epoch timestamps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    #[serde(default)]
    pub messages: Vec<SessionMessage>,

    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub last_activity: DateTime<Utc>,

    /// Running digest of turns that were compressed away
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_summary: Option<String>,
}

impl Session {
    pub fn new() -> Self {
        Self {
            messages: Vec::new(),
            last_activity: Utc::now(),
            conversation_summary: None,
        }
    }

    /// The most recent `n` messages, oldest first.
    pub fn tail(&self, n: usize) -> &[SessionMessage] {
        let start = self.messages.len().saturating_sub(n);
        &self.messages[start..]
    }

    pub fn last_assistant_message(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == SessionRole::Assistant)
            .map(|m| m.content.as_str())
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

/// Summary plus remaining turns, the input to prompt assembly.
#[derive(Debug, Clone, PartialEq)]
pub struct CompressedView {
    pub summary: Option<String>,
    pub messages: Vec<SessionMessage>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_camel_case_with_millis() {
        let mut session = Session::new();
        session.messages.push(SessionMessage::new(SessionRole::User, "hi"));
        session.conversation_summary = Some("Talked about tea.".into());

        let json = serde_json::to_value(&session).unwrap();
        assert!(json["lastActivity"].is_i64());
        assert_eq!(json["conversationSummary"], "Talked about tea.");
        assert_eq!(json["messages"][0]["role"], "user");
        assert!(json["messages"][0]["timestamp"].is_i64());
    }

    #[test]
    fn summary_omitted_when_absent() {
        let json = serde_json::to_string(&Session::new()).unwrap();
        assert!(!json.contains("conversationSummary"));
        assert!(!json.contains('\n'));
    }

    #[test]
    fn parses_record_without_messages() {
        let session: Session = serde_json::from_str(r#"{"lastActivity":1700000000000}"#).unwrap();
        assert!(session.messages.is_empty());
        assert_eq!(session.last_activity.timestamp_millis(), 1_700_000_000_000);
    }

    #[test]
    fn tail_and_last_assistant() {
        let mut session = Session::new();
        for (i, role) in [SessionRole::User, SessionRole::Assistant, SessionRole::User]
            .into_iter()
            .enumerate()
        {
            session.messages.push(SessionMessage::new(role, format!("m{i}")));
        }
        assert_eq!(session.tail(2).len(), 2);
        assert_eq!(session.tail(2)[0].content, "m1");
        assert_eq!(session.tail(10).len(), 3);
        assert_eq!(session.last_assistant_message(), Some("m1"));
    }
}
