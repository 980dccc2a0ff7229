//! Scripted providers for pipeline tests.

use async_trait::async_trait;
use std::sync::Mutex;
use thriftbot_core::error::ProviderError;
use thriftbot_core::message::{Message, MessageToolCall};
use thriftbot_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};

/// Tokens billed by every scripted response.
pub const MOCK_TOKENS: u32 = 15;

/// Returns queued responses in order and records every request.
///
/// Panics if called more often than responses were queued.
pub struct SequentialMockProvider {
    responses: Mutex<Vec<Result<ProviderResponse, ProviderError>>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl SequentialMockProvider {
    pub fn new(responses: Vec<ProviderResponse>) -> Self {
        Self::scripted(responses.into_iter().map(Ok).collect())
    }

    /// Responses and failures in order.
    pub fn scripted(script: Vec<Result<ProviderResponse, ProviderError>>) -> Self {
        Self {
            responses: Mutex::new(script),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn single_text(text: &str) -> Self {
        Self::new(vec![make_text_response(text)])
    }

    pub fn tool_then_answer(call: MessageToolCall, thought: &str, answer: &str) -> Self {
        Self::new(vec![
            make_tool_call_response(call, thought),
            make_text_response(answer),
        ])
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// Every request received so far.
    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for SequentialMockProvider {
    fn name(&self) -> &str {
        "sequential_mock"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let mut requests = self.requests.lock().unwrap();
        let mut responses = self.responses.lock().unwrap();

        if responses.is_empty() {
            panic!(
                "SequentialMockProvider: no more responses (call #{})",
                requests.len() + 1
            );
        }

        requests.push(request);
        responses.remove(0)
    }
}

/// Fails every call with the same error.
pub struct FailingProvider {
    error: ProviderError,
    calls: Mutex<usize>,
}

impl FailingProvider {
    pub fn new(error: ProviderError) -> Self {
        Self {
            error,
            calls: Mutex::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl Provider for FailingProvider {
    fn name(&self) -> &str {
        "failing_mock"
    }

    async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        *self.calls.lock().unwrap() += 1;
        Err(self.error.clone())
    }
}

/// Asks for a tool on every call and never answers.
pub struct AlwaysToolProvider {
    tool: String,
    calls: Mutex<usize>,
}

impl AlwaysToolProvider {
    pub fn new(tool: &str) -> Self {
        Self {
            tool: tool.to_string(),
            calls: Mutex::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl Provider for AlwaysToolProvider {
    fn name(&self) -> &str {
        "always_tool_mock"
    }

    async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let mut calls = self.calls.lock().unwrap();
        *calls += 1;
        let mut call = make_tool_call(&self.tool, serde_json::json!({}));
        call.id = format!("call_{}", *calls);
        Ok(make_tool_call_response(call, &format!("Checking again ({})", *calls)))
    }
}

/// A plain text response.
pub fn make_text_response(text: &str) -> ProviderResponse {
    ProviderResponse {
        message: Message::assistant(text),
        usage: Some(Usage::new(10, MOCK_TOKENS - 10)),
        model: "mock-model".into(),
    }
}

/// A response requesting one tool call.
pub fn make_tool_call_response(call: MessageToolCall, thought: &str) -> ProviderResponse {
    ProviderResponse {
        message: Message::tool_request(thought, call),
        usage: Some(Usage::new(10, MOCK_TOKENS - 10)),
        model: "mock-model".into(),
    }
}

pub fn make_tool_call(name: &str, input: serde_json::Value) -> MessageToolCall {
    MessageToolCall {
        id: format!("call_{name}"),
        name: name.to_string(),
        input,
    }
}
