//! The thriftbot message pipeline.
//!
//! For each inbound message:
//!
//! 1. **Quick replies**: greetings, the time, reminders and similar are
//!    answered from a pattern table without the LLM
//! 2. **Budget**: the daily token ladder picks model and limits, or blocks
//! 3. **Compression**: long histories are folded into a running summary
//! 4. **Tool loop**: the LLM may call tools for a bounded number of rounds
//! 5. **Bookkeeping**: mood is updated and both turns are stored
//!
//! [`Assistant::handle`] ties the steps together and always returns a reply.

pub mod assistant;
pub mod compression;
pub mod orchestrator;
pub mod quick;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;

pub use assistant::Assistant;
pub use compression::{CompressionOutcome, Compressor};
pub use orchestrator::{ConverseOutcome, Orchestrator};
pub use quick::{BUDGET_EXHAUSTED_REPLY, COOLDOWN_REPLY, Intent, QuickContext, QuickMatcher, QuickReply};
