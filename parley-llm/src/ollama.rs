//! Local inference adapter (Ollama API).

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parley_core::config::{OllamaConfig, ProviderKind};
use parley_core::types::ChatMessage;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::error::LlmError;
use crate::http::{self, send_json};
use crate::provider::ChatProvider;

/// Talks to an Ollama server: `GET /api/tags` as the reachability check, `POST /api/chat`
/// for replies.
pub struct OllamaProvider {
    config: OllamaConfig,
    name: String,
    max_retries: u32,
    http: Client,
    available: AtomicBool,
}

impl OllamaProvider {
    /// Create an adapter; it is unavailable until [`ChatProvider::initialize`] succeeds.
    #[must_use]
    pub fn new(config: OllamaConfig, max_retries: u32) -> Self {
        let timeout = Duration::from_millis(config.timeout_ms);
        Self {
            name: format!("Ollama ({})", config.model),
            http: http::client(timeout),
            config,
            max_retries,
            available: AtomicBool::new(false),
        }
    }

    fn endpoint(&self) -> &str {
        self.config.endpoint.trim_end_matches('/')
    }

    fn timeout(&self) -> Duration {
        Duration::from_millis(self.config.timeout_ms)
    }

    fn request_body(&self, system_prompt: &str, messages: &[ChatMessage]) -> Value {
        let mut framed = Vec::with_capacity(messages.len() + 1);
        framed.push(json!({ "role": "system", "content": system_prompt }));
        framed.extend(
            messages
                .iter()
                .map(|m| json!({ "role": m.role.as_str(), "content": m.content })),
        );

        json!({
            "model": self.config.model,
            "messages": framed,
            "stream": false,
            "options": {
                "temperature": self.config.temperature,
                "top_p": self.config.top_p,
                "repeat_penalty": self.config.repeat_penalty,
                "num_predict": self.config.num_predict,
            }
        })
    }
}

#[async_trait]
impl ChatProvider for OllamaProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Ollama
    }

    fn name(&self) -> &str {
        &self.name
    }

    async fn initialize(&self) -> Result<(), LlmError> {
        if self.config.endpoint.trim().is_empty() || self.config.model.trim().is_empty() {
            info!(provider = %self.name, "Ollama endpoint or model not configured, skipping");
            return Err(LlmError::Config("ollama endpoint and model are required".into()));
        }

        let url = format!("{}/api/tags", self.endpoint());
        let tags = send_json(&self.name, 0, self.timeout(), || self.http.get(&url)).await?;

        let base = self.config.model.split(':').next().unwrap_or_default();
        let listed = tags
            .get("models")
            .and_then(Value::as_array)
            .is_some_and(|models| {
                models
                    .iter()
                    .filter_map(|m| m.get("name").and_then(Value::as_str))
                    .any(|name| name.starts_with(base))
            });
        if !listed {
            warn!(
                model = %self.config.model,
                "Model may not be pulled on the Ollama server (run `ollama pull {}`)",
                self.config.model
            );
        }

        self.available.store(true, Ordering::Release);
        info!(endpoint = %self.endpoint(), "Ollama connection successful");
        Ok(())
    }

    async fn chat(&self, system_prompt: &str, messages: &[ChatMessage]) -> Result<String, LlmError> {
        if !self.is_available() {
            return Err(LlmError::Unavailable(self.name.clone()));
        }

        let url = format!("{}/api/chat", self.endpoint());
        let body = self.request_body(system_prompt, messages);
        let response = send_json(&self.name, self.max_retries, self.timeout(), || {
            self.http.post(&url).json(&body)
        })
        .await?;

        if let Some(error) = response.get("error").and_then(Value::as_str) {
            warn!(provider = %self.name, error, "Ollama reported an error");
            return Err(LlmError::Backend(error.to_string()));
        }
        http::text_at(&response, "/message/content")
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
