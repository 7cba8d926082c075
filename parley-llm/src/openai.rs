//! Hosted adapter for OpenAI-style chat completions.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parley_core::config::{OpenAiConfig, ProviderKind};
use parley_core::types::ChatMessage;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::info;

use crate::error::LlmError;
use crate::http::{self, send_json};
use crate::provider::ChatProvider;

const PING_MAX_TOKENS: u32 = 10;

/// OpenAI chat-completions adapter (bearer auth, system prompt as the first message).
pub struct OpenAiProvider {
    config: OpenAiConfig,
    name: String,
    max_retries: u32,
    http: Client,
    available: AtomicBool,
}

impl OpenAiProvider {
    /// Create an adapter; it is unavailable until initialized.
    #[must_use]
    pub fn new(config: OpenAiConfig, max_retries: u32) -> Self {
        Self {
            name: format!("OpenAI ({})", config.model),
            http: http::client(Duration::from_millis(config.timeout_ms)),
            config,
            max_retries,
            available: AtomicBool::new(false),
        }
    }

    fn request_body(&self, system_prompt: Option<&str>, messages: &[ChatMessage], max_tokens: u32) -> Value {
        let mut framed = Vec::with_capacity(messages.len() + 1);
        if let Some(system) = system_prompt {
            framed.push(json!({ "role": "system", "content": system }));
        }
        framed.extend(
            messages
                .iter()
                .map(|m| json!({ "role": m.role.as_str(), "content": m.content })),
        );
        json!({
            "model": self.config.model,
            "messages": framed,
            "max_tokens": max_tokens,
            "temperature": self.config.temperature,
        })
    }

    async fn post(&self, body: &Value, max_retries: u32) -> Result<Value, LlmError> {
        let url = format!("{}/v1/chat/completions", self.config.base_url.trim_end_matches('/'));
        send_json(&self.name, max_retries, Duration::from_millis(self.config.timeout_ms), || {
            self.http.post(&url).bearer_auth(&self.config.api_key).json(body)
        })
        .await
    }
}

#[async_trait]
impl ChatProvider for OpenAiProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::OpenAi
    }

    fn name(&self) -> &str {
        &self.name
    }

    async fn initialize(&self) -> Result<(), LlmError> {
        if self.config.api_key.trim().is_empty() {
            info!(provider = %self.name, "OpenAI API key not configured, skipping");
            return Err(LlmError::Config("openai api_key is not set".into()));
        }
        if self.config.model.trim().is_empty() {
            return Err(LlmError::Config("openai model is not set".into()));
        }

        let ping = self.request_body(None, &[ChatMessage::user("Hi")], PING_MAX_TOKENS);
        self.post(&ping, 0).await?;

        self.available.store(true, Ordering::Release);
        info!(provider = %self.name, "OpenAI API connection successful");
        Ok(())
    }

    async fn chat(&self, system_prompt: &str, messages: &[ChatMessage]) -> Result<String, LlmError> {
        if !self.is_available() {
            return Err(LlmError::Unavailable(self.name.clone()));
        }
        let body = self.request_body(Some(system_prompt), messages, self.config.max_tokens);
        let response = self.post(&body, self.max_retries).await?;
        http::text_at(&response, "/choices/0/message/content")
    }

    fn dispatch_timeout(&self) -> Option<Duration> {
        let per_call = Duration::from_millis(self.config.timeout_ms);
        Some(http::dispatch_budget(per_call, self.max_retries))
    }

    fn is_available(&self) -> bool {
        self.available.load(Ordering::Acquire)
    }

    fn shutdown(&self) {
        self.available.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_prompt_is_first_role_message() {
        let provider = OpenAiProvider::new(OpenAiConfig::default(), 0);
        let body = provider.request_body(Some("Be brief."), &[ChatMessage::user("Hello")], 1024);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][0]["content"], "Be brief.");
        assert_eq!(body["messages"][1]["content"], "Hello");
        assert_eq!(body["max_tokens"], 1024);
        assert!(body.get("system").is_none());
    }

    #[tokio::test]
    async fn missing_key_fails_without_network() {
        let provider = OpenAiProvider::new(OpenAiConfig::default(), 0);
        assert!(matches!(provider.initialize().await, Err(LlmError::Config(_))));
    }
}
