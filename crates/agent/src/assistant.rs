//! One inbound message in, one reply out.
//!
//! Quick replies first. Otherwise the budget decides the parameters (or
//! blocks), old history is compressed, the tool loop runs, the mood is
//! updated, and both turns are stored. Every failure ends in an apology;
//! `handle` always returns text.

use crate::compression::{CompressionOutcome, Compressor};
use crate::orchestrator::Orchestrator;
use crate::quick::{BUDGET_EXHAUSTED_REPLY, QuickContext, QuickMatcher};
use chrono::Utc;
use std::sync::Arc;
use thriftbot_config::AppConfig;
use thriftbot_core::notifier::{AttachmentKind, InboundMessage};
use thriftbot_core::provider::Provider;
use thriftbot_core::tool::ToolExecutor;
use thriftbot_governor::{RequestTraits, Vitals};
use thriftbot_session::{SessionRole, SessionStore};
use thriftbot_tools::ReminderRegistry;
use tracing::{debug, error, info};

pub const APOLOGY_REPLY: &str =
    "Sorry, something went wrong on my side. Please try again in a moment.";

pub const RATE_LIMITED_REPLY: &str =
    "I'm being rate limited right now. Give me a minute and try again.";

pub const EMPTY_MESSAGE_REPLY: &str = "I didn't catch that. Could you say it again?";

/// Everything the pipeline needs, wired once at startup.
pub struct Assistant {
    sessions: SessionStore,
    vitals: Arc<Vitals>,
    reminders: Arc<ReminderRegistry>,
    quick: QuickMatcher,
    compressor: Compressor,
    orchestrator: Orchestrator,
}

impl Assistant {
    pub fn new(
        config: &AppConfig,
        provider: Arc<dyn Provider>,
        tools: Arc<dyn ToolExecutor>,
        sessions: SessionStore,
        vitals: Arc<Vitals>,
        reminders: Arc<ReminderRegistry>,
    ) -> Self {
        let orchestrator = Orchestrator::new(
            provider.clone(),
            tools,
            vitals.clone(),
            config.agent.system_prompt.clone(),
        )
        .with_max_rounds(config.agent.max_tool_rounds)
        .with_temperature(config.default_temperature);

        Self {
            compressor: Compressor::from_config(config, provider, vitals.clone()),
            orchestrator,
            quick: QuickMatcher::new(),
            sessions,
            vitals,
            reminders,
        }
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub fn vitals(&self) -> &Arc<Vitals> {
        &self.vitals
    }

    /// Produce the reply to one inbound message.
    pub async fn handle(&self, chat_id: &str, message: &InboundMessage) -> String {
        let text = message.content.trim();
        let has_attachments = message.has_attachments();
        if text.is_empty() && !has_attachments {
            return EMPTY_MESSAGE_REPLY.into();
        }

        if !has_attachments {
            let ctx = QuickContext {
                chat_id,
                sessions: &self.sessions,
                vitals: &self.vitals,
                reminders: &self.reminders,
                now: Utc::now(),
            };
            if let Some(reply) = self.quick.try_match(text, &ctx) {
                // Override replies are not conversation turns
                if reply.intent.is_some() {
                    self.vitals.mood().after_quick_response(Utc::now());
                    self.store_exchange(chat_id, text, &reply.text);
                }
                return reply.text;
            }
        }

        let params = self.vitals.params_for_request(RequestTraits {
            has_attachments,
            uses_tools: false,
        });
        if params.should_block {
            info!(conversation_id = %chat_id, "Budget exhausted, LLM not called");
            return BUDGET_EXHAUSTED_REPLY.into();
        }
        debug!(
            conversation_id = %chat_id,
            model = %params.model,
            max_tokens = params.max_tokens,
            max_history = params.max_history,
            "Budget tier selected"
        );

        if let CompressionOutcome::Compressed { summarized, .. } =
            self.compressor.compress_if_needed(&self.sessions, chat_id).await
        {
            debug!(conversation_id = %chat_id, summarized, "Compressed before reply");
        }

        let user_content = describe(message);
        let history = self.sessions.compressed_view(chat_id);

        match self
            .orchestrator
            .converse(chat_id, &history, &user_content, &params, has_attachments)
            .await
        {
            Ok(outcome) => {
                let tokens = u32::try_from(outcome.tokens_used).unwrap_or(u32::MAX);
                self.vitals.mood().after_exchange(tokens, Utc::now());
                self.store_exchange(chat_id, &user_content, &outcome.text);
                outcome.text
            }
            Err(e) => {
                error!(conversation_id = %chat_id, error = %e, "Reply failed");
                match e.as_provider() {
                    Some(pe) if pe.is_rate_limit() => RATE_LIMITED_REPLY.into(),
                    Some(_) => APOLOGY_REPLY.into(),
                    None => {
                        self.vitals.mood().processing_error();
                        APOLOGY_REPLY.into()
                    }
                }
            }
        }
    }

    fn store_exchange(&self, chat_id: &str, user: &str, assistant: &str) {
        self.sessions.append(chat_id, SessionRole::User, user);
        self.sessions.append(chat_id, SessionRole::Assistant, assistant);
    }
}

/// User text plus a line per attachment.
fn describe(message: &InboundMessage) -> String {
    let mut content = message.content.trim().to_string();
    for attachment in &message.attachments {
        let kind = match attachment.kind {
            AttachmentKind::Image => "image",
            AttachmentKind::Document => "document",
            AttachmentKind::Audio => "audio",
            AttachmentKind::Other => "file",
        };
        if !content.is_empty() {
            content.push('\n');
        }
        match &attachment.filename {
            Some(name) => content.push_str(&format!("[Attached {kind}: {name}]")),
            None => content.push_str(&format!("[Attached {kind}]")),
        }
    }
    content
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quick::COOLDOWN_REPLY;
    use crate::test_helpers::*;
    use tempfile::TempDir;
    use thriftbot_core::error::ProviderError;
    use thriftbot_core::notifier::Attachment;
    use thriftbot_core::tool::NoTools;
    use thriftbot_governor::{ModelTiers, MoodState, TokenBudget};
    use thriftbot_session::StoreConfig;

    struct Harness {
        _dir: TempDir,
        assistant: Assistant,
    }

    fn harness(provider: Arc<dyn Provider>, used: u64, stress: f64) -> Harness {
        let dir = TempDir::new().unwrap();
        let config = AppConfig::default();
        let mut budget = TokenBudget::new(10_000);
        budget.record(used);
        let vitals = Arc::new(Vitals::new(
            budget,
            MoodState::with_levels(80.0, stress, 50.0),
            ModelTiers::from_config(&config),
        ));
        let sessions = SessionStore::new(dir.path(), StoreConfig::from(&config.session));
        let assistant = Assistant::new(
            &config,
            provider,
            Arc::new(NoTools),
            sessions,
            vitals,
            Arc::new(ReminderRegistry::new()),
        );
        Harness { _dir: dir, assistant }
    }

    #[tokio::test]
    async fn quick_reply_skips_llm_and_is_stored() {
        let provider = Arc::new(SequentialMockProvider::new(Vec::new()));
        let h = harness(provider.clone(), 0, 10.0);

        let reply = h.assistant.handle("c", &InboundMessage::text("hi")).await;
        assert!(!reply.is_empty());
        assert_eq!(provider.call_count(), 0);

        let session = h.assistant.sessions().load("c");
        assert_eq!(session.messages.len(), 2);
        assert_eq!(session.messages[0].content, "hi");
        assert_eq!(h.assistant.vitals().mood().energy(), 79.0);
    }

    #[tokio::test]
    async fn llm_reply_is_billed_and_stored() {
        let provider = Arc::new(SequentialMockProvider::single_text("Rust is a language."));
        let h = harness(provider.clone(), 0, 10.0);

        let reply = h.assistant.handle("c", &InboundMessage::text("what is rust")).await;
        assert_eq!(reply, "Rust is a language.");
        assert_eq!(h.assistant.vitals().budget().used(), u64::from(MOCK_TOKENS));
        assert_eq!(h.assistant.sessions().last_assistant_message("c").as_deref(), Some("Rust is a language."));
        assert_eq!(h.assistant.vitals().mood().energy(), 79.0);
    }

    #[tokio::test]
    async fn exhausted_budget_never_calls_llm() {
        let provider = Arc::new(SequentialMockProvider::new(Vec::new()));
        let h = harness(provider.clone(), 10_000, 10.0);

        let reply = h.assistant.handle("c", &InboundMessage::text("write an essay")).await;
        assert_eq!(reply, BUDGET_EXHAUSTED_REPLY);
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn attachments_bypass_quick_replies() {
        let provider = Arc::new(SequentialMockProvider::single_text("A cat!"));
        let h = harness(provider.clone(), 0, 10.0);
        let message = InboundMessage {
            content: "hi".into(),
            sender_name: None,
            attachments: vec![Attachment {
                kind: AttachmentKind::Image,
                filename: Some("cat.jpg".into()),
                mime_type: None,
            }],
        };

        assert_eq!(h.assistant.handle("c", &message).await, "A cat!");
        let sent = &provider.requests()[0];
        let last = sent.messages.last().unwrap();
        assert_eq!(last.content, "hi\n[Attached image: cat.jpg]");
    }

    #[tokio::test]
    async fn overload_returns_cooldown() {
        let provider = Arc::new(SequentialMockProvider::new(Vec::new()));
        let h = harness(provider.clone(), 0, 90.0);

        let reply = h.assistant.handle("c", &InboundMessage::text("plan my week")).await;
        assert_eq!(reply, COOLDOWN_REPLY);
        assert_eq!(provider.call_count(), 0);
        assert_eq!(h.assistant.vitals().mood().stress(), 80.0);
        assert!(h.assistant.sessions().load("c").messages.is_empty());
    }

    #[tokio::test]
    async fn override_replies_are_not_repeated_later() {
        let provider = Arc::new(SequentialMockProvider::new(Vec::new()));
        let h = harness(provider.clone(), 10_000, 10.0);

        let blocked = h.assistant.handle("c", &InboundMessage::text("write an essay")).await;
        assert_eq!(blocked, BUDGET_EXHAUSTED_REPLY);
        assert!(h.assistant.sessions().load("c").messages.is_empty());

        let again = h.assistant.handle("c", &InboundMessage::text("what did you say?")).await;
        assert_ne!(again, BUDGET_EXHAUSTED_REPLY);
        assert_eq!(h.assistant.sessions().load("c").messages.len(), 2);
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn provider_failure_apologises_and_stores_nothing() {
        let provider = Arc::new(FailingProvider::new(ProviderError::ApiError {
            status_code: 500,
            message: "boom".into(),
        }));
        let h = harness(provider, 0, 10.0);

        let reply = h.assistant.handle("c", &InboundMessage::text("tell me a story")).await;
        assert_eq!(reply, APOLOGY_REPLY);
        assert!(h.assistant.sessions().load("c").messages.is_empty());
        assert_eq!(h.assistant.vitals().mood().stress(), 25.0);
    }

    #[tokio::test]
    async fn rate_limit_gets_its_own_reply() {
        let provider = Arc::new(FailingProvider::new(ProviderError::RateLimited {
            retry_after_secs: 10,
        }));
        let h = harness(provider, 0, 10.0);

        let reply = h.assistant.handle("c", &InboundMessage::text("tell me a story")).await;
        assert_eq!(reply, RATE_LIMITED_REPLY);
        assert_eq!(h.assistant.vitals().mood().stress(), 45.0);
    }

    #[tokio::test]
    async fn empty_message_gets_a_prompt() {
        let provider = Arc::new(SequentialMockProvider::new(Vec::new()));
        let h = harness(provider, 0, 10.0);
        assert_eq!(h.assistant.handle("c", &InboundMessage::text("   ")).await, EMPTY_MESSAGE_REPLY);
    }
}
