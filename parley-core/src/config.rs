//! Configuration for Parley.
//!
//! Maps directly to `parley.toml`. Every field has a default so a partial
//! (or empty) file is always valid.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ParleyError, Result};

/// Top-level Parley configuration, loadable from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParleyConfig {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,
    /// Language-model provider settings.
    #[serde(default)]
    pub llm: LlmConfig,
    /// Conversation history and rate limiting.
    #[serde(default)]
    pub conversation: ConversationConfig,
    /// Signal scanning and emission.
    #[serde(default)]
    pub bridge: BridgeConfig,
    /// Outbound webhook destinations.
    #[serde(default)]
    pub webhooks: WebhookConfig,
    /// Conversation persistence.
    #[serde(default)]
    pub persistence: PersistenceConfig,
}

impl ParleyConfig {
    /// Load configuration from a TOML string.
    ///
    /// # Errors
    /// Returns `ParleyError::Config` if the TOML is invalid or fails validation.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: Self = toml::from_str(toml_str).map_err(|e| ParleyError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Reject values that would make the system misbehave.
    ///
    /// # Errors
    /// Returns `ParleyError::Config` naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        if self.conversation.max_history == 0 {
            return Err(ParleyError::Config("conversation.max_history must be at least 1".into()));
        }
        if self.conversation.max_concurrent_requests == 0 {
            return Err(ParleyError::Config(
                "conversation.max_concurrent_requests must be at least 1".into(),
            ));
        }
        if self.bridge.scan_interval_ticks == 0 {
            return Err(ParleyError::Config("bridge.scan_interval_ticks must be at least 1".into()));
        }
        if self.bridge.detection_radius == 0 {
            return Err(ParleyError::Config("bridge.detection_radius must be at least 1".into()));
        }
        for (field, timeout_ms) in [
            ("llm.ollama.timeout_ms", self.llm.ollama.timeout_ms),
            ("llm.anthropic.timeout_ms", self.llm.anthropic.timeout_ms),
            ("llm.openai.timeout_ms", self.llm.openai.timeout_ms),
        ] {
            if timeout_ms == 0 {
                return Err(ParleyError::Config(format!("{field} must be positive")));
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// General system settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error. `RUST_LOG` overrides it.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Emit JSON log lines instead of human-readable ones.
    #[serde(default)]
    pub json_logs: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
        }
    }
}

/// Which backend family serves chat requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Local inference server (Ollama API).
    Ollama,
    /// Hosted Anthropic Messages API.
    Anthropic,
    /// Hosted OpenAI chat-completions API.
    #[serde(alias = "openai")]
    OpenAi,
}

impl ProviderKind {
    /// All known provider kinds, in registry order.
    pub const ALL: [Self; 3] = [Self::Ollama, Self::Anthropic, Self::OpenAi];

    /// Human-readable name.
    #[must_use]
    pub fn display_name(self) -> &'static str {
        match self {
            Self::Ollama => "Ollama (Local)",
            Self::Anthropic => "Anthropic",
            Self::OpenAi => "OpenAI",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for ProviderKind {
    type Err = ParleyError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            "anthropic" | "claude" => Ok(Self::Anthropic),
            "openai" => Ok(Self::OpenAi),
            other => Err(ParleyError::Config(format!("unknown provider '{other}'"))),
        }
    }
}

/// Language-model integration configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Preferred provider; others are tried if it fails to initialize.
    #[serde(default = "default_provider")]
    pub provider: ProviderKind,
    /// Extra attempts after a transport error or non-2xx response.
    #[serde(default = "default_1")]
    pub max_retries: u32,
    /// Local inference server.
    #[serde(default)]
    pub ollama: OllamaConfig,
    /// Anthropic Messages API.
    #[serde(default)]
    pub anthropic: AnthropicConfig,
    /// OpenAI chat-completions API.
    #[serde(default)]
    pub openai: OpenAiConfig,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::Ollama,
            max_retries: 1,
            ollama: OllamaConfig::default(),
            anthropic: AnthropicConfig::default(),
            openai: OpenAiConfig::default(),
        }
    }
}

/// Local inference server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaConfig {
    /// Base URL of the server.
    #[serde(default = "default_ollama_url")]
    pub endpoint: String,
    /// Model tag to chat with.
    #[serde(default = "default_ollama_model")]
    pub model: String,
    /// Per-call timeout in milliseconds.
    #[serde(default = "default_60000")]
    pub timeout_ms: u64,
    /// Sampling temperature.
    #[serde(default = "default_0_7")]
    pub temperature: f32,
    /// Nucleus sampling cutoff.
    #[serde(default = "default_0_9")]
    pub top_p: f32,
    /// Penalty for repeated tokens.
    #[serde(default = "default_1_1")]
    pub repeat_penalty: f32,
    /// Maximum tokens to generate (short, in-character replies).
    #[serde(default = "default_60")]
    pub num_predict: u32,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:11434".to_string(),
            model: "mistral:7b-instruct".to_string(),
            timeout_ms: 60_000,
            temperature: 0.7,
            top_p: 0.9,
            repeat_penalty: 1.1,
            num_predict: 60,
        }
    }
}

/// Anthropic Messages API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnthropicConfig {
    /// API key; empty disables the adapter.
    #[serde(default)]
    pub api_key: String,
    /// Model name.
    #[serde(default = "default_anthropic_model")]
    pub model: String,
    /// API base URL.
    #[serde(default = "default_anthropic_url")]
    pub base_url: String,
    /// Response token cap.
    #[serde(default = "default_1024")]
    pub max_tokens: u32,
    /// Per-call timeout in milliseconds.
    #[serde(default = "default_30000")]
    pub timeout_ms: u64,
}

impl Default for AnthropicConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: "claude-sonnet-4-20250514".to_string(),
            base_url: "https://api.anthropic.com".to_string(),
            max_tokens: 1024,
            timeout_ms: 30_000,
        }
    }
}

/// OpenAI chat-completions API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiConfig {
    /// API key; empty disables the adapter.
    #[serde(default)]
    pub api_key: String,
    /// Model name.
    #[serde(default = "default_openai_model")]
    pub model: String,
    /// API base URL.
    #[serde(default = "default_openai_url")]
    pub base_url: String,
    /// Response token cap.
    #[serde(default = "default_1024")]
    pub max_tokens: u32,
    /// Sampling temperature.
    #[serde(default = "default_0_8")]
    pub temperature: f32,
    /// Per-call timeout in milliseconds.
    #[serde(default = "default_30000")]
    pub timeout_ms: u64,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: "gpt-4o".to_string(),
            base_url: "https://api.openai.com".to_string(),
            max_tokens: 1024,
            temperature: 0.8,
            timeout_ms: 30_000,
        }
    }
}

/// Conversation history, rate limiting and orchestration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationConfig {
    /// Messages kept in memory per agent/player pair.
    #[serde(default = "default_20_usize")]
    pub max_history: usize,
    /// Minimum gap between two messages of one player to one agent (ms).
    #[serde(default = "default_1000")]
    pub min_message_gap_ms: u64,
    /// A conversation ends after this many seconds without a message.
    #[serde(default = "default_60_u64")]
    pub conversation_timeout_secs: u64,
    /// Include the world snapshot in prompts.
    #[serde(default = "default_true")]
    pub include_world_context: bool,
    /// Knowledge entries injected into a prompt.
    #[serde(default = "default_3_usize")]
    pub max_knowledge_entries: usize,
    /// Size of the background pool for provider calls.
    #[serde(default = "default_4_usize")]
    pub max_concurrent_requests: usize,
}

impl ConversationConfig {
    /// Minimum gap between messages as a `chrono` duration.
    #[must_use]
    pub fn min_message_gap(&self) -> chrono::Duration {
        chrono::Duration::milliseconds(i64::try_from(self.min_message_gap_ms).unwrap_or(i64::MAX))
    }

    /// Idle window after which a conversation ends.
    #[must_use]
    pub fn conversation_timeout(&self) -> chrono::Duration {
        chrono::Duration::seconds(i64::try_from(self.conversation_timeout_secs).unwrap_or(i64::MAX))
    }
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            max_history: 20,
            min_message_gap_ms: 1000,
            conversation_timeout_secs: 60,
            include_world_context: true,
            max_knowledge_entries: 3,
            max_concurrent_requests: 4,
        }
    }
}

/// Environmental signal bridge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Whether scanning, emission and webhooks run at all.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Run the edge scan every N ticks.
    #[serde(default = "default_1_u64")]
    pub scan_interval_ticks: u64,
    /// Half-width of the scanned cube around each agent.
    #[serde(default = "default_5_u32")]
    pub detection_radius: u32,
    /// Activations closer together than this (ticks) are dropped.
    #[serde(default = "default_40")]
    pub cooldown_ticks: u64,
    /// Agents emit output signals on story events.
    #[serde(default = "default_true")]
    pub emit_on_events: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            scan_interval_ticks: 1,
            detection_radius: 5,
            cooldown_ticks: 40,
            emit_on_events: true,
        }
    }
}

/// Outbound webhook configuration: one URL per story event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    /// Master switch.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Request timeout in milliseconds.
    #[serde(default = "default_5000")]
    pub timeout_ms: u64,
    /// Fired when a conversation starts.
    #[serde(default)]
    pub on_conversation_start: String,
    /// Fired when an agent reveals part of its secret.
    #[serde(default)]
    pub on_secret_revealed: String,
    /// Fired when an agent hands out a quest.
    #[serde(default)]
    pub on_quest_started: String,
    /// Fired when a quest is completed.
    #[serde(default)]
    pub on_quest_completed: String,
    /// Fired when an agent's mood shifts noticeably.
    #[serde(default)]
    pub on_mood_changed: String,
    /// Fired when an agent warns of danger.
    #[serde(default)]
    pub on_danger_warning: String,
}

impl WebhookConfig {
    /// Request timeout as a `Duration`.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout_ms: 5000,
            on_conversation_start: String::new(),
            on_secret_revealed: String::new(),
            on_quest_started: String::new(),
            on_quest_completed: String::new(),
            on_mood_changed: String::new(),
            on_danger_warning: String::new(),
        }
    }
}

/// Conversation persistence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// Save conversations to disk and reload them on start.
    #[serde(default = "default_true")]
    pub persist: bool,
    /// Directory holding one JSON record per agent/player pair.
    #[serde(default = "default_conversation_dir")]
    pub directory: String,
    /// Messages written per pair (may exceed `max_history`).
    #[serde(default = "default_50")]
    pub max_persisted_messages: usize,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            persist: true,
            directory: "conversations".to_string(),
            max_persisted_messages: 50,
        }
    }
}

// ---------------------------------------------------------------------------
// Serde default helpers
// ---------------------------------------------------------------------------

fn default_true() -> bool { true }
fn default_log_level() -> String { "info".to_string() }
fn default_provider() -> ProviderKind { ProviderKind::Ollama }
fn default_ollama_url() -> String { "http://localhost:11434".to_string() }
fn default_ollama_model() -> String { "mistral:7b-instruct".to_string() }
fn default_anthropic_model() -> String { "claude-sonnet-4-20250514".to_string() }
fn default_anthropic_url() -> String { "https://api.anthropic.com".to_string() }
fn default_openai_model() -> String { "gpt-4o".to_string() }
fn default_openai_url() -> String { "https://api.openai.com".to_string() }
fn default_conversation_dir() -> String { "conversations".to_string() }
fn default_0_7() -> f32 { 0.7 }
fn default_0_8() -> f32 { 0.8 }
fn default_0_9() -> f32 { 0.9 }
fn default_1_1() -> f32 { 1.1 }
fn default_1() -> u32 { 1 }
fn default_5_u32() -> u32 { 5 }
fn default_60() -> u32 { 60 }
fn default_1024() -> u32 { 1024 }
fn default_1_u64() -> u64 { 1 }
fn default_40() -> u64 { 40 }
fn default_60_u64() -> u64 { 60 }
fn default_1000() -> u64 { 1000 }
fn default_5000() -> u64 { 5000 }
fn default_30000() -> u64 { 30_000 }
fn default_60000() -> u64 { 60_000 }
fn default_3_usize() -> usize { 3 }
fn default_4_usize() -> usize { 4 }
fn default_20_usize() -> usize { 20 }
fn default_50() -> usize { 50 }

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
