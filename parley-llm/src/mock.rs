//! Scripted chat provider for tests.
//!
//! Behaviour is fixed at construction; every call is counted so tests can
//! assert exactly which adapters were touched.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use parley_core::config::ProviderKind;
use parley_core::types::ChatMessage;

use crate::error::LlmError;
use crate::provider::ChatProvider;

/// A recorded `chat` call.
#[derive(Debug, Clone)]
pub struct RecordedChat {
    /// System prompt passed in.
    pub system_prompt: String,
    /// History passed in.
    pub messages: Vec<ChatMessage>,
}

/// Deterministic [`ChatProvider`] with call counters.
pub struct ScriptedProvider {
    kind: ProviderKind,
    name: String,
    fail_init: bool,
    fail_chat: bool,
    init_delay: Duration,
    chat_delay: Duration,
    default_reply: String,
    queued_replies: Mutex<VecDeque<String>>,
    available: AtomicBool,
    init_calls: AtomicUsize,
    chat_calls: AtomicUsize,
    shutdown_calls: AtomicUsize,
    recorded: Mutex<Vec<RecordedChat>>,
}

impl ScriptedProvider {
    /// A provider that initializes and replies with `"ok"`.
    #[must_use]
    pub fn new(kind: ProviderKind) -> Self {
        Self {
            kind,
            name: format!("scripted-{kind:?}").to_lowercase(),
            fail_init: false,
            fail_chat: false,
            init_delay: Duration::ZERO,
            chat_delay: Duration::ZERO,
            default_reply: "ok".to_string(),
            queued_replies: Mutex::new(VecDeque::new()),
            available: AtomicBool::new(false),
            init_calls: AtomicUsize::new(0),
            chat_calls: AtomicUsize::new(0),
            shutdown_calls: AtomicUsize::new(0),
            recorded: Mutex::new(Vec::new()),
        }
    }

    /// Reply with `text` whenever no queued reply is left.
    #[must_use]
    pub fn replying(mut self, text: impl Into<String>) -> Self {
        self.default_reply = text.into();
        self
    }

    /// Queue replies returned in order before the default reply.
    #[must_use]
    pub fn with_replies<I, S>(self, replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.queued_replies.lock().extend(replies.into_iter().map(Into::into));
        self
    }

    /// `initialize` fails.
    #[must_use]
    pub fn failing_init(mut self) -> Self {
        self.fail_init = true;
        self
    }

    /// `chat` fails with a backend error.
    #[must_use]
    pub fn failing_chat(mut self) -> Self {
        self.fail_chat = true;
        self
    }

    /// Delay before `initialize` resolves.
    #[must_use]
    pub fn init_delay(mut self, delay: Duration) -> Self {
        self.init_delay = delay;
        self
    }

    /// Delay before `chat` resolves.
    #[must_use]
    pub fn chat_delay(mut self, delay: Duration) -> Self {
        self.chat_delay = delay;
        self
    }

    /// Times `initialize` was called.
    #[must_use]
    pub fn init_calls(&self) -> usize {
        self.init_calls.load(Ordering::SeqCst)
    }

    /// Times `chat` was called.
    #[must_use]
    pub fn chat_calls(&self) -> usize {
        self.chat_calls.load(Ordering::SeqCst)
    }

    /// Times `shutdown` was called.
    #[must_use]
    pub fn shutdown_calls(&self) -> usize {
        self.shutdown_calls.load(Ordering::SeqCst)
    }

    /// Every `chat` call so far.
    #[must_use]
    pub fn recorded(&self) -> Vec<RecordedChat> {
        self.recorded.lock().clone()
    }
}

#[async_trait]
impl ChatProvider for ScriptedProvider {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    fn name(&self) -> &str {
        &self.name
    }

    async fn initialize(&self) -> Result<(), LlmError> {
        self.init_calls.fetch_add(1, Ordering::SeqCst);
        if !self.init_delay.is_zero() {
            tokio::time::sleep(self.init_delay).await;
        }
        if self.fail_init {
            return Err(LlmError::Unavailable(format!("{} refused to start", self.name)));
        }
        self.available.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn chat(&self, system_prompt: &str, messages: &[ChatMessage]) -> Result<String, LlmError> {
        self.chat_calls.fetch_add(1, Ordering::SeqCst);
        self.recorded.lock().push(RecordedChat {
            system_prompt: system_prompt.to_string(),
            messages: messages.to_vec(),
        });
        if !self.chat_delay.is_zero() {
            tokio::time::sleep(self.chat_delay).await;
        }
        if self.fail_chat {
            return Err(LlmError::Backend("scripted failure".into()));
        }
        let next = self.queued_replies.lock().pop_front();
        Ok(next.unwrap_or_else(|| self.default_reply.clone()))
    }

    fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    fn shutdown(&self) {
        self.shutdown_calls.fetch_add(1, Ordering::SeqCst);
        self.available.store(false, Ordering::SeqCst);
    }
}
