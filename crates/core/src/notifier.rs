//! Inbound message shape and the outbound notifier capability.
//!
//! The chat transport itself lives outside thriftbot. It hands the assistant
//! an [`InboundMessage`] and, at startup, injects a [`Notifier`] that the
//! background tick uses to push reminders back to a chat.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use crate::error::ChannelError;

/// A message received from the transport.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InboundMessage {
    /// The text content
    pub content: String,

    /// Human-readable sender name (if available)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_name: Option<String>,

    /// Attachments (images, files, voice, etc.)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
}

impl InboundMessage {
    /// A plain text message without attachments.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Default::default()
        }
    }

    pub fn has_attachments(&self) -> bool {
        !self.attachments.is_empty()
    }
}

/// An attachment in an inbound message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attachment {
    /// Type of attachment
    pub kind: AttachmentKind,

    /// Optional filename
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,

    /// MIME type
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttachmentKind {
    Image,
    Document,
    Audio,
    Other,
}

/// Outbound delivery to a chat, injected once at startup.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Send `text` to the chat identified by `chat_id`.
    async fn notify(&self, chat_id: &str, text: &str) -> Result<(), ChannelError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_message_has_no_attachments() {
        let msg = InboundMessage::text("hello");
        assert_eq!(msg.content, "hello");
        assert!(!msg.has_attachments());
    }

    #[test]
    fn attachment_kind_serializes_snake_case() {
        let msg = InboundMessage {
            content: "look".into(),
            sender_name: None,
            attachments: vec![Attachment {
                kind: AttachmentKind::Image,
                filename: Some("cat.jpg".into()),
                mime_type: Some("image/jpeg".into()),
            }],
        };
        assert!(msg.has_attachments());
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"image\""));
    }
}
