//! Folding old history into a running summary.
//!
//! Once a conversation grows past `threshold` turns, everything except the
//! newest `keep` turns is sent to a cheap model for a short digest, chained
//! with any earlier digest. A failed summarization leaves the history
//! untouched.

use std::sync::Arc;
use thriftbot_config::AppConfig;
use thriftbot_core::message::Message;
use thriftbot_core::provider::{Provider, ProviderRequest};
use thriftbot_governor::Vitals;
use thriftbot_session::{SessionMessage, SessionRole, SessionStore};
use tracing::{debug, info, warn};

const SUMMARY_MAX_TOKENS: u32 = 300;
const SUMMARY_TEMPERATURE: f32 = 0.3;

const SUMMARIZER_PROMPT: &str = "You condense chat history for a personal assistant. \
Reply with a plain 2-3 sentence summary of the facts, decisions and open requests. \
No preamble.";

/// What a compression pass did.
#[derive(Debug, Clone, PartialEq)]
pub enum CompressionOutcome {
    /// Below the threshold
    Skipped,
    Compressed { summarized: usize, tokens: u64 },
    /// The summarizer failed or returned nothing; history is unchanged
    Failed,
}

pub struct Compressor {
    provider: Arc<dyn Provider>,
    model: String,
    threshold: usize,
    keep: usize,
    vitals: Arc<Vitals>,
}

impl Compressor {
    pub fn new(
        provider: Arc<dyn Provider>,
        model: impl Into<String>,
        threshold: usize,
        keep: usize,
        vitals: Arc<Vitals>,
    ) -> Self {
        Self {
            provider,
            model: model.into(),
            threshold,
            keep: keep.min(threshold),
            vitals,
        }
    }

    pub fn from_config(config: &AppConfig, provider: Arc<dyn Provider>, vitals: Arc<Vitals>) -> Self {
        Self::new(
            provider,
            config.models.summarizer.clone(),
            config.compression.threshold,
            config.compression.keep,
            vitals,
        )
    }

    pub async fn compress_if_needed(&self, sessions: &SessionStore, chat_id: &str) -> CompressionOutcome {
        let view = sessions.compressed_view(chat_id);
        if view.messages.len() <= self.threshold {
            return CompressionOutcome::Skipped;
        }

        let cut = view.messages.len() - self.keep;
        let older = &view.messages[..cut];
        let prompt = summary_request(view.summary.as_deref(), older);

        let mut request = ProviderRequest::new(
            self.model.clone(),
            vec![Message::system(SUMMARIZER_PROMPT), Message::user(prompt)],
        );
        request.max_tokens = Some(SUMMARY_MAX_TOKENS);
        request.temperature = SUMMARY_TEMPERATURE;

        debug!(conversation_id = %chat_id, summarizing = cut, "Compressing history");

        let response = match self.provider.complete(request).await {
            Ok(response) => response,
            Err(e) => {
                warn!(conversation_id = %chat_id, error = %e, "Summarization failed, history kept");
                return CompressionOutcome::Failed;
            }
        };

        let tokens = u64::from(response.total_tokens());
        self.vitals.record_tokens(tokens);

        let summary = response.message.content.trim();
        if summary.is_empty() {
            warn!(conversation_id = %chat_id, "Summarizer returned nothing, history kept");
            return CompressionOutcome::Failed;
        }

        sessions.apply_compression(chat_id, cut, summary);
        info!(conversation_id = %chat_id, summarized = cut, kept = self.keep, tokens, "History compressed");
        CompressionOutcome::Compressed {
            summarized: cut,
            tokens,
        }
    }
}

fn summary_request(previous: Option<&str>, messages: &[SessionMessage]) -> String {
    let mut prompt = String::new();
    if let Some(previous) = previous {
        prompt.push_str("Summary so far:\n");
        prompt.push_str(previous);
        prompt.push_str("\n\n");
    }
    prompt.push_str("Conversation:\n");
    for m in messages {
        let speaker = match m.role {
            SessionRole::User => "User",
            SessionRole::Assistant => "Assistant",
        };
        prompt.push_str(&format!("{speaker}: {}\n", m.content));
    }
    prompt.push_str("\nWrite the updated summary.");
    prompt
}
