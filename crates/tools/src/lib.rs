//! Tools the thriftbot assistant can call.
//!
//! The model sees six tools: `set_reminder`, `list_reminders`,
//! `cancel_reminder`, `remember`, `recall` and `current_time`. Inputs are
//! decoded into [`ToolInput`] before anything runs, and every failure comes
//! back to the model as an `Error: ...` string.

pub mod input;
pub mod notes;
pub mod reminders;
pub mod toolbox;

pub use input::ToolInput;
pub use notes::{Note, NoteStore};
pub use reminders::{Reminder, ReminderRegistry};
pub use toolbox::Toolbox;
