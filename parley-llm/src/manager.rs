//! Provider Manager: owns every adapter, picks the active one and routes
//! chat calls to it.
//!
//! Initialization tries the preferred adapter first. If that fails, every
//! other adapter is initialized concurrently and the first to succeed is
//! adopted; later successes stay available but never replace it.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::stream::{FuturesUnordered, StreamExt};
use parking_lot::RwLock;
use parley_core::config::{LlmConfig, ProviderKind};
use parley_core::types::ChatMessage;
use tracing::{debug, info, warn};

use crate::anthropic::AnthropicProvider;
use crate::error::LlmError;
use crate::ollama::OllamaProvider;
use crate::openai::OpenAiProvider;
use crate::provider::ChatProvider;

/// Reply when no provider is active. No backend is contacted.
pub const NO_PROVIDER_RESPONSE: &str = "[No LLM provider available. Please check your configuration.]";

/// Reply when the active provider fails or times out.
pub const LOST_IN_THOUGHT_RESPONSE: &str = "[The storyteller seems lost in thought...]";

/// Dispatch deadline for adapters that do not report their own.
pub const DEFAULT_DISPATCH_TIMEOUT: Duration = Duration::from_secs(30);

/// In-character text to show instead of a failed reply.
#[must_use]
pub fn sentinel_for(err: &LlmError) -> &'static str {
    match err {
        LlmError::NoProvider => NO_PROVIDER_RESPONSE,
        _ => LOST_IN_THOUGHT_RESPONSE,
    }
}

/// Registry of chat adapters with a single active slot.
pub struct ProviderManager {
    providers: BTreeMap<ProviderKind, Arc<dyn ChatProvider>>,
    preferred: ProviderKind,
    active: RwLock<Option<Arc<dyn ChatProvider>>>,
    fallback_timeout: Duration,
}

impl ProviderManager {
    /// Build all three adapters from configuration.
    #[must_use]
    pub fn from_config(config: &LlmConfig) -> Self {
        let providers: Vec<Arc<dyn ChatProvider>> = vec![
            Arc::new(OllamaProvider::new(config.ollama.clone(), config.max_retries)),
            Arc::new(AnthropicProvider::new(config.anthropic.clone(), config.max_retries)),
            Arc::new(OpenAiProvider::new(config.openai.clone(), config.max_retries)),
        ];
        Self::with_providers(config.provider, providers, DEFAULT_DISPATCH_TIMEOUT)
    }

    /// Build from arbitrary adapters. A later adapter of the same kind
    /// replaces an earlier one. `fallback_timeout` bounds chat calls on
    /// adapters whose [`ChatProvider::dispatch_timeout`] is `None`.
    #[must_use]
    pub fn with_providers(
        preferred: ProviderKind,
        providers: impl IntoIterator<Item = Arc<dyn ChatProvider>>,
        fallback_timeout: Duration,
    ) -> Self {
        Self {
            providers: providers.into_iter().map(|p| (p.kind(), p)).collect(),
            preferred,
            active: RwLock::new(None),
            fallback_timeout,
        }
    }

    /// Initialize the preferred adapter, falling back to the others.
    /// Returns whether a provider is active afterwards.
    pub async fn initialize(&self) -> bool {
        match self.providers.get(&self.preferred) {
            Some(preferred) => match preferred.initialize().await {
                Ok(()) => {
                    self.try_adopt(preferred);
                    info!(provider = %preferred.name(), "Chat provider initialized");
                    return true;
                }
                Err(e) => log_init_failure(preferred.name(), &e),
            },
            None => warn!(preferred = %self.preferred, "Preferred provider is not registered"),
        }

        info!("Preferred provider failed, trying fallbacks");
        let mut pending: FuturesUnordered<_> = self
            .providers
            .values()
            .filter(|p| p.kind() != self.preferred)
            .map(|p| {
                let provider = Arc::clone(p);
                async move {
                    let result = provider.initialize().await;
                    (provider, result)
                }
            })
            .collect();

        while let Some((provider, result)) = pending.next().await {
            match result {
                Ok(()) if self.try_adopt(&provider) => {
                    info!(provider = %provider.name(), "Fallback chat provider adopted");
                }
                Ok(()) => debug!(provider = %provider.name(), "Provider ready but another is already active"),
                Err(e) => log_init_failure(provider.name(), &e),
            }
        }

        let available = self.is_available();
        if !available {
            warn!("No chat provider could be initialized");
        }
        available
    }

    /// Install `provider` only if the active slot is empty.
    fn try_adopt(&self, provider: &Arc<dyn ChatProvider>) -> bool {
        let mut active = self.active.write();
        if active.is_some() {
            return false;
        }
        *active = Some(Arc::clone(provider));
        true
    }

    fn usable(&self) -> Option<Arc<dyn ChatProvider>> {
        self.active.read().as_ref().filter(|p| p.is_available()).cloned()
    }

    /// Generate a reply, degrading to sentinel text on any failure.
    pub async fn chat(&self, system_prompt: &str, messages: &[ChatMessage]) -> String {
        match self.try_chat(system_prompt, messages).await {
            Ok(text) => text,
            Err(e) => sentinel_for(&e).to_string(),
        }
    }

    /// Generate a reply, exposing the failure.
    ///
    /// # Errors
    /// `LlmError::NoProvider` when nothing is active (no network call is
    /// made); `LlmError::Timeout` when the dispatch outlives the adapter's
    /// own deadline (every attempt at its per-call timeout); otherwise the
    /// adapter's error.
    pub async fn try_chat(&self, system_prompt: &str, messages: &[ChatMessage]) -> Result<String, LlmError> {
        let Some(provider) = self.usable() else {
            debug!("Chat requested with no active provider");
            return Err(LlmError::NoProvider);
        };

        let deadline = provider.dispatch_timeout().unwrap_or(self.fallback_timeout);
        let start = Instant::now();
        let result = tokio::time::timeout(deadline, provider.chat(system_prompt, messages)).await;
        let latency_ms = start.elapsed().as_millis();

        match result {
            Ok(Ok(text)) => {
                debug!(provider = %provider.name(), latency_ms, "Chat completed");
                Ok(text)
            }
            Ok(Err(e)) => {
                warn!(provider = %provider.name(), error = %e, "Chat failed");
                Err(e)
            }
            Err(_) => {
                let timeout_ms = u64::try_from(deadline.as_millis()).unwrap_or(u64::MAX);
                warn!(provider = %provider.name(), timeout_ms, "Chat timed out");
                Err(LlmError::Timeout(timeout_ms))
            }
        }
    }

    /// Make `kind` the active provider. The current provider is kept when
    /// the new one fails to initialize.
    ///
    /// # Errors
    /// `LlmError::Config` if `kind` is not registered, otherwise the
    /// initialization error.
    pub async fn switch_provider(&self, kind: ProviderKind) -> Result<(), LlmError> {
        let next = self
            .providers
            .get(&kind)
            .cloned()
            .ok_or_else(|| LlmError::Config(format!("provider {kind} is not registered")))?;

        if let Err(e) = next.initialize().await {
            warn!(provider = %next.name(), error = %e, "Provider switch failed, keeping current provider");
            return Err(e);
        }

        let previous = self.active.write().replace(Arc::clone(&next));
        if let Some(previous) = previous {
            if previous.kind() != kind {
                previous.shutdown();
            }
        }
        info!(provider = %next.name(), "Switched chat provider");
        Ok(())
    }

    /// Shut down every adapter and clear the active slot.
    pub fn shutdown(&self) {
        for provider in self.providers.values() {
            provider.shutdown();
        }
        *self.active.write() = None;
        info!("Chat providers shut down");
    }

    /// Whether a provider is active and available.
    #[must_use]
    pub fn is_available(&self) -> bool {
        self.usable().is_some()
    }

    /// Name of the active provider.
    #[must_use]
    pub fn active_provider_name(&self) -> Option<String> {
        self.active.read().as_ref().map(|p| p.name().to_string())
    }

    /// Kind of the active provider.
    #[must_use]
    pub fn active_kind(&self) -> Option<ProviderKind> {
        self.active.read().as_ref().map(|p| p.kind())
    }

    /// The configured preference.
    #[must_use]
    pub fn preferred(&self) -> ProviderKind {
        self.preferred
    }
}

fn log_init_failure(name: &str, err: &LlmError) {
    match err {
        LlmError::Config(reason) => info!(provider = %name, %reason, "Provider not configured"),
        other => warn!(provider = %name, error = %other, "Provider unreachable"),
    }
}
