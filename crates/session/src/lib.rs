//! Conversation history for thriftbot.
//!
//! One [`Session`] per conversation, cached in memory and written back to
//! disk on a debounce timer by the [`SessionStore`].

pub mod session;
pub mod store;

pub use session::{CompressedView, Session, SessionMessage, SessionRole};
pub use store::{SessionError, SessionStore, StoreConfig, encode_id};
