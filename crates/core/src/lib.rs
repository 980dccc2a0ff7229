//! # thriftbot core
//!
//! Domain types, traits, and error definitions shared by every thriftbot
//! crate. Nothing in here performs I/O; the crate only describes the
//! contracts the other crates implement against:
//!
//! - [`Provider`]: an LLM backend that completes a transcript
//! - [`ToolExecutor`]: dispatch-by-name for tools the LLM may request
//! - [`Notifier`]: outbound messages to a chat (reminders, proactive notes)

pub mod error;
pub mod message;
pub mod notifier;
pub mod provider;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use error::{Error, Result};
pub use message::{Message, MessageToolCall, Role};
pub use notifier::{Attachment, AttachmentKind, InboundMessage, Notifier};
pub use provider::{Provider, ProviderRequest, ProviderResponse, ToolDefinition, Usage};
pub use tool::{NoTools, ToolCall, ToolExecutor};
