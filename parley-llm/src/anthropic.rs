//! Hosted adapter for the Anthropic Messages API.
//!
//! The system prompt travels in the top-level `system` field; the message
//! list carries only `user` and `assistant` turns.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parley_core::config::{AnthropicConfig, ProviderKind};
use parley_core::types::{ChatMessage, Role};
use reqwest::Client;
use serde_json::{json, Value};
use tracing::info;

use crate::error::LlmError;
use crate::http::{self, send_json};
use crate::provider::ChatProvider;

/// API version header value.
pub const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Token cap for the initialization request.
const PING_MAX_TOKENS: u32 = 10;

/// Anthropic Messages API adapter.
pub struct AnthropicProvider {
    config: AnthropicConfig,
    name: String,
    max_retries: u32,
    http: Client,
    available: AtomicBool,
}

impl AnthropicProvider {
    /// Create an adapter; it is unavailable until initialized.
    #[must_use]
    pub fn new(config: AnthropicConfig, max_retries: u32) -> Self {
        Self {
            name: format!("Anthropic ({})", config.model),
            http: http::client(Duration::from_millis(config.timeout_ms)),
            config,
            max_retries,
            available: AtomicBool::new(false),
        }
    }

    fn url(&self) -> String {
        format!("{}/v1/messages", self.config.base_url.trim_end_matches('/'))
    }

    fn timeout(&self) -> Duration {
        Duration::from_millis(self.config.timeout_ms)
    }

    fn request_body(&self, system_prompt: &str, messages: &[ChatMessage], max_tokens: u32) -> Value {
        // System turns from history are folded into the top-level field.
        let mut system = system_prompt.to_string();
        let mut turns = Vec::with_capacity(messages.len());
        for msg in messages {
            match msg.role {
                Role::System => {
                    system.push_str("\n\n");
                    system.push_str(&msg.content);
                }
                Role::User | Role::Assistant => {
                    turns.push(json!({ "role": msg.role.as_str(), "content": msg.content }));
                }
            }
        }

        let mut body = json!({
            "model": self.config.model,
            "max_tokens": max_tokens,
            "messages": turns,
        });
        if !system.is_empty() {
            body["system"] = Value::String(system);
        }
        body
    }

    async fn post(&self, body: &Value, max_retries: u32) -> Result<Value, LlmError> {
        let url = self.url();
        send_json(&self.name, max_retries, self.timeout(), || {
            self.http
                .post(&url)
                .header("x-api-key", &self.config.api_key)
                .header("anthropic-version", ANTHROPIC_VERSION)
                .json(body)
        })
        .await
    }
}

#[async_trait]
impl ChatProvider for AnthropicProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Anthropic
    }

    fn name(&self) -> &str {
        &self.name
    }

    async fn initialize(&self) -> Result<(), LlmError> {
        if self.config.api_key.trim().is_empty() {
            info!(provider = %self.name, "Anthropic API key not configured, skipping");
            return Err(LlmError::Config("anthropic api_key is not set".into()));
        }
        if self.config.model.trim().is_empty() {
            return Err(LlmError::Config("anthropic model is not set".into()));
        }

        let ping = self.request_body("", &[ChatMessage::user("Hi")], PING_MAX_TOKENS);
        self.post(&ping, 0).await?;

        self.available.store(true, Ordering::Release);
        info!(provider = %self.name, "Anthropic API connection successful");
        Ok(())
    }

    async fn chat(&self, system_prompt: &str, messages: &[ChatMessage]) -> Result<String, LlmError> {
        if !self.is_available() {
            return Err(LlmError::Unavailable(self.name.clone()));
        }
        let body = self.request_body(system_prompt, messages, self.config.max_tokens);
        let response = self.post(&body, self.max_retries).await?;
        http::text_at(&response, "/content/0/text")
    }

    fn dispatch_timeout(&self) -> Option<Duration> {
        Some(http::dispatch_budget(self.timeout(), self.max_retries))
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
    fn system_prompt_is_top_level_field() {
        let provider = AnthropicProvider::new(AnthropicConfig::default(), 0);
        let body = provider.request_body(
            "You are Eldric.",
            &[
                ChatMessage::system("A lever was pulled."),
                ChatMessage::user("Hello"),
                ChatMessage::assistant("Greetings"),
            ],
            1024,
        );

        assert_eq!(body["system"], "You are Eldric.\n\nA lever was pulled.");
        let turns = body["messages"].as_array().expect("array");
        assert_eq!(turns.len(), 2);
        assert!(turns.iter().all(|t| t["role"] != "system"));
        assert_eq!(body["max_tokens"], 1024);
    }

    #[tokio::test]
    async fn missing_key_fails_without_network() {
        let provider = AnthropicProvider::new(AnthropicConfig::default(), 0);
        assert!(matches!(provider.initialize().await, Err(LlmError::Config(_))));
        assert!(!provider.is_available());
    }
}
