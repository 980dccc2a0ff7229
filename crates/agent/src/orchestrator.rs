//! The bounded tool-use loop.
//!
//! 1. **Build the transcript**: system prompt (plus running summary), the
//!    newest `max_history` stored turns (starting on a user turn), the new
//!    user turn
//! 2. **Send to the LLM** with the declared tools
//! 3. **If a tool is requested**: run the first one, append the request and
//!    its textual result, go back to 2
//! 4. **If text**: that is the answer
//!
//! Every round is billed as soon as it returns. After `max_rounds` rounds
//! the last text the model produced is returned instead of an error.

use chrono::Utc;
use std::sync::Arc;
use thriftbot_core::message::Message;
use thriftbot_core::provider::{Provider, ProviderRequest};
use thriftbot_core::tool::{ToolCall, ToolExecutor};
use thriftbot_governor::{BudgetAwareParams, RequestTraits, Vitals};
use thriftbot_session::{CompressedView, SessionRole};
use tracing::{debug, info, warn};

/// Returned when the round cap is hit before the model said anything.
pub const ROUND_CAP_REPLY: &str =
    "I went back and forth with my tools for too long without finishing. \
     Could you narrow the request down a little?";

/// Returned when the model answers with nothing at all.
pub const EMPTY_ANSWER_REPLY: &str = "Hmm, I'm not sure what to say to that.";

/// Result of one `converse` call.
#[derive(Debug, Clone, PartialEq)]
pub struct ConverseOutcome {
    pub text: String,
    pub tokens_used: u64,
    pub rounds: u32,
}

pub struct Orchestrator {
    provider: Arc<dyn Provider>,
    tools: Arc<dyn ToolExecutor>,
    vitals: Arc<Vitals>,
    system_prompt: String,
    temperature: f32,
    max_rounds: u32,
}

impl Orchestrator {
    pub fn new(
        provider: Arc<dyn Provider>,
        tools: Arc<dyn ToolExecutor>,
        vitals: Arc<Vitals>,
        system_prompt: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            tools,
            vitals,
            system_prompt: system_prompt.into(),
            temperature: 0.7,
            max_rounds: 15,
        }
    }

    pub fn with_max_rounds(mut self, max: u32) -> Self {
        self.max_rounds = max.max(1);
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    fn transcript(&self, history: &CompressedView, user_content: &str, max_history: usize) -> Vec<Message> {
        let mut system = self.system_prompt.clone();
        if let Some(summary) = &history.summary {
            system.push_str("\n\nSummary of the earlier conversation:\n");
            system.push_str(summary);
        }

        let mut start = history.messages.len().saturating_sub(max_history);
        while history.messages.get(start).is_some_and(|m| m.role != SessionRole::User) {
            start += 1;
        }
        let mut messages = Vec::with_capacity(history.messages.len() - start + 2);
        messages.push(Message::system(system));
        for m in &history.messages[start..] {
            messages.push(match m.role {
                SessionRole::User => Message::user(&m.content),
                SessionRole::Assistant => Message::assistant(&m.content),
            });
        }
        messages.push(Message::user(user_content));
        messages
    }

    /// Run the loop for one user turn.
    ///
    /// Provider failures update the mood and are returned; tool failures
    /// are fed back to the model as text.
    pub async fn converse(
        &self,
        chat_id: &str,
        history: &CompressedView,
        user_content: &str,
        params: &BudgetAwareParams,
        has_attachments: bool,
    ) -> Result<ConverseOutcome, thriftbot_core::Error> {
        let mut transcript = self.transcript(history, user_content, params.max_history);
        let tools = self.tools.definitions();
        let mut last_text = String::new();
        let mut tokens_used = 0u64;
        let mut used_tools = false;

        info!(
            conversation_id = %chat_id,
            model = %params.model,
            history = transcript.len() - 2,
            "Conversing"
        );

        for round in 1..=self.max_rounds {
            let traits = RequestTraits {
                has_attachments,
                uses_tools: used_tools,
            };
            let round_params = self.vitals.tiers().upgrade(params.clone(), traits);

            let mut request = ProviderRequest::new(round_params.model, transcript.clone());
            request.temperature = self.temperature;
            request.max_tokens = Some(round_params.max_tokens);
            request.tools = tools.clone();

            let response = match self.provider.complete(request).await {
                Ok(response) => response,
                Err(e) => {
                    self.vitals.mood().api_error(e.is_rate_limit(), Utc::now());
                    warn!(conversation_id = %chat_id, round, error = %e, "LLM call failed");
                    return Err(e.into());
                }
            };

            let tokens = u64::from(response.total_tokens());
            self.vitals.record_tokens(tokens);
            tokens_used += tokens;

            let message = response.message;
            if !message.content.trim().is_empty() {
                last_text = message.content.clone();
            }

            let Some(call) = message.tool_calls.first().cloned() else {
                debug!(conversation_id = %chat_id, round, tokens = tokens_used, "Final answer");
                let text = if last_text.is_empty() {
                    EMPTY_ANSWER_REPLY.to_string()
                } else {
                    last_text
                };
                return Ok(ConverseOutcome {
                    text,
                    tokens_used,
                    rounds: round,
                });
            };

            if round == self.max_rounds {
                // The result could never reach the model
                debug!(conversation_id = %chat_id, round, tool = %call.name, "Tool call skipped on last round");
                break;
            }

            if message.tool_calls.len() > 1 {
                debug!(
                    conversation_id = %chat_id,
                    ignored = message.tool_calls.len() - 1,
                    "Only the first tool call is executed"
                );
            }

            let result = self.tools.execute(chat_id, &ToolCall::from(&call)).await;
            debug!(conversation_id = %chat_id, round, tool = %call.name, "Tool round");

            let call_id = call.id.clone();
            transcript.push(Message::tool_request(message.content, call));
            transcript.push(Message::tool_result(call_id, result));
            used_tools = true;
        }

        warn!(
            conversation_id = %chat_id,
            rounds = self.max_rounds,
            tokens = tokens_used,
            "Tool round cap reached"
        );
        let text = if last_text.is_empty() {
            ROUND_CAP_REPLY.to_string()
        } else {
            last_text
        };
        Ok(ConverseOutcome {
            text,
            tokens_used,
            rounds: self.max_rounds,
        })
    }
}
