//! Per-user conversation memory.
//!
//! Each user id owns one [`ConversationBuffer`]: a pinned persona message,
//! a running summary of older turns, and the recent turns verbatim. Once the
//! buffer grows past its token budget the oldest turns are folded into the
//! summary by a [`Summarizer`].
//!
//! Buffers are handed out as `Arc<Mutex<_>>` so the caller can hold one
//! user's buffer for a whole request while other users proceed in parallel.

use async_trait::async_trait;
use pycoach_core::error::MemoryError;
use pycoach_core::message::{Message, Role};
use pycoach_core::provider::{Provider, ProviderRequest};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};
use crate::token::estimate_messages_tokens;

/// The persona every conversation starts with.
pub const SESSION_PERSONA: &str = "You are PyCoach, a patient, Socratic AI tutor specializing in Python Programming. \
Your goal is to guide the learner to the correct answer through questions and hints, not direct answers. \
Stay conversational, curious, and adaptive.";

/// A snapshot of a conversation, ready to be placed in a prompt.
#[derive(Debug, Clone)]
pub struct History {
    pub messages: Vec<Message>,
}

impl History {
    /// Render as `Label: content` lines.
    pub fn render(&self) -> String {
        self.messages
            .iter()
            .map(|m| format!("{}: {}", m.role.label(), m.content))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Turns exchanged so far (system messages excluded).
    pub fn turn_count(&self) -> usize {
        self.messages.iter().filter(|m| m.role != Role::System).count()
    }
}

/// Condenses pruned turns into a running summary.
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, existing: Option<&str>, turns: &[Message]) -> Result<String, MemoryError>;
}

/// A [`Summarizer`] backed by a language model.
pub struct LlmSummarizer {
    provider: Arc<dyn Provider>,
    model: String,
    temperature: f32,
}

impl LlmSummarizer {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>, temperature: f32) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature,
        }
    }

    fn prompt(existing: Option<&str>, turns: &[Message]) -> String {
        let lines = History { messages: turns.to_vec() }.render();
        format!(
            "Progressively summarize the lines of conversation provided, adding onto the previous \
             summary returning a new summary.\n\nCurrent summary:\n{}\n\nNew lines of conversation:\n{}\n\nNew summary:",
            existing.unwrap_or(""),
            lines
        )
    }
}

#[async_trait]
impl Summarizer for LlmSummarizer {
    async fn summarize(&self, existing: Option<&str>, turns: &[Message]) -> Result<String, MemoryError> {
        let request = ProviderRequest {
            model: self.model.clone(),
            messages: vec![Message::user(Self::prompt(existing, turns))],
            temperature: self.temperature,
            max_tokens: None,
        };

        let response = self
            .provider
            .complete(request)
            .await
            .map_err(|e| MemoryError::Summarization(e.to_string()))?;

        Ok(response.message.content.trim().to_string())
    }
}

/// One user's rolling conversation.
#[derive(Debug)]
pub struct ConversationBuffer {
    persona: Message,
    summary: Option<String>,
    turns: Vec<Message>,
    max_tokens: usize,
}

impl ConversationBuffer {
    /// A fresh buffer seeded with the persona message.
    pub fn new(max_tokens: usize) -> Self {
        Self {
            persona: Message::system(SESSION_PERSONA),
            summary: None,
            turns: Vec::new(),
            max_tokens,
        }
    }

    /// Persona, then summary (if any), then the retained turns.
    pub fn history(&self) -> History {
        let mut messages = Vec::with_capacity(self.turns.len() + 2);
        messages.push(self.persona.clone());
        if let Some(summary) = &self.summary {
            messages.push(Message::system(summary.clone()));
        }
        messages.extend(self.turns.iter().cloned());
        History { messages }
    }

    pub fn summary(&self) -> Option<&str> {
        self.summary.as_deref()
    }

    pub fn turns(&self) -> &[Message] {
        &self.turns
    }

    /// Estimated tokens held against the budget: persona plus retained turns.
    /// The running summary is not counted.
    pub fn token_count(&self) -> usize {
        estimate_messages_tokens(std::slice::from_ref(&self.persona)) + estimate_messages_tokens(&self.turns)
    }

    /// Append a user/assistant turn pair, then prune to the token budget.
    ///
    /// Pruned turns are folded into the summary. If summarization fails the
    /// turns are kept and pruning is retried on the next save.
    pub async fn save_context(&mut self, input: &str, output: &str, summarizer: &dyn Summarizer) {
        self.turns.push(Message::user(input));
        self.turns.push(Message::assistant(output));

        if self.token_count() <= self.max_tokens {
            return;
        }

        let mut pruned = Vec::new();
        while self.token_count() > self.max_tokens && !self.turns.is_empty() {
            pruned.push(self.turns.remove(0));
        }

        debug!(pruned = pruned.len(), "Summarizing pruned turns");

        match summarizer.summarize(self.summary.as_deref(), &pruned).await {
            Ok(summary) => self.summary = Some(summary),
            Err(e) => {
                warn!(error = %e, "Summarization failed; keeping turns");
                pruned.append(&mut self.turns);
                self.turns = pruned;
            }
        }
    }
}

struct Slot {
    buffer: Arc<Mutex<ConversationBuffer>>,
    last_access: Instant,
}

/// Table of conversation buffers keyed by user id.
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Slot>>,
    max_tokens: usize,
    max_sessions: usize,
}

impl SessionStore {
    /// `max_sessions = 0` keeps every session.
    pub fn new(max_tokens: usize, max_sessions: usize) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            max_tokens,
            max_sessions,
        }
    }

    /// The user's buffer, created (and seeded with the persona) on first use.
    pub async fn get_or_create(&self, user_id: &str) -> Arc<Mutex<ConversationBuffer>> {
        let mut sessions = self.sessions.write().await;

        if let Some(slot) = sessions.get_mut(user_id) {
            slot.last_access = Instant::now();
            return slot.buffer.clone();
        }

        if self.max_sessions > 0 && sessions.len() >= self.max_sessions {
            let oldest = sessions
                .iter()
                .min_by_key(|(_, slot)| slot.last_access)
                .map(|(id, _)| id.clone());
            if let Some(evicted) = oldest {
                sessions.remove(&evicted);
                info!(user_id = %evicted, "Evicted least recently used session");
            }
        }

        let buffer = Arc::new(Mutex::new(ConversationBuffer::new(self.max_tokens)));
        sessions.insert(
            user_id.to_string(),
            Slot {
                buffer: buffer.clone(),
                last_access: Instant::now(),
            },
        );
        buffer
    }

    /// The user's conversation so far.
    pub async fn load(&self, user_id: &str) -> History {
        let buffer = self.get_or_create(user_id).await;
        let guard = buffer.lock().await;
        guard.history()
    }

    /// Record a completed turn.
    pub async fn save(&self, user_id: &str, input: &str, output: &str, summarizer: &dyn Summarizer) {
        let buffer = self.get_or_create(user_id).await;
        let mut guard = buffer.lock().await;
        guard.save_context(input, output, summarizer).await;
    }

    /// Drop the user's buffer. Returns whether one existed.
    pub async fn remove(&self, user_id: &str) -> bool {
        self.sessions.write().await.remove(user_id).is_some()
    }

    pub async fn contains(&self, user_id: &str) -> bool {
        self.sessions.read().await.contains_key(user_id)
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Summarizer that records calls and returns a fixed summary.
    struct CountingSummarizer {
        calls: AtomicUsize,
        fail: bool,
    }

    impl CountingSummarizer {
        fn ok() -> Self {
            Self { calls: AtomicUsize::new(0), fail: false }
        }

        fn failing() -> Self {
            Self { calls: AtomicUsize::new(0), fail: true }
        }
    }

    #[async_trait]
    impl Summarizer for CountingSummarizer {
        async fn summarize(&self, existing: Option<&str>, turns: &[Message]) -> Result<String, MemoryError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(MemoryError::Summarization("backend down".into()));
            }
            Ok(format!("{}+{}", existing.unwrap_or("summary"), turns.len()))
        }
    }

    #[tokio::test]
    async fn new_session_is_seeded_with_persona() {
        let store = SessionStore::new(8000, 0);
        let history = store.load("u1").await;
        assert_eq!(history.messages.len(), 1);
        assert_eq!(history.messages[0].role, Role::System);
        assert_eq!(history.messages[0].content, SESSION_PERSONA);
        assert_eq!(history.turn_count(), 0);
    }

    #[tokio::test]
    async fn save_appends_turn_pair_after_persona() {
        let store = SessionStore::new(8000, 0);
        let summarizer = CountingSummarizer::ok();
        store.save("u1", "What is a list?", "What do you already know?", &summarizer).await;

        let history = store.load("u1").await;
        assert_eq!(history.messages.len(), 3);
        assert_eq!(history.messages[0].role, Role::System);
        assert_eq!(history.messages[1].role, Role::User);
        assert_eq!(history.messages[2].role, Role::Assistant);
        assert_eq!(summarizer.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn rendered_history_uses_role_labels() {
        let store = SessionStore::new(8000, 0);
        store.save("u1", "hi", "hello", &CountingSummarizer::ok()).await;
        let rendered = store.load("u1").await.render();
        assert!(rendered.starts_with("System: You are PyCoach"));
        assert!(rendered.contains("\nHuman: hi\nAI: hello"));
    }

    #[tokio::test]
    async fn over_budget_turns_are_summarized() {
        // Persona alone is ~60 tokens; a 100-token budget fits one short exchange.
        let mut buffer = ConversationBuffer::new(100);
        let summarizer = CountingSummarizer::ok();

        let long = "x".repeat(120); // 30 tokens + overhead
        buffer.save_context(&long, &long, &summarizer).await;
        assert_eq!(summarizer.calls.load(Ordering::SeqCst), 1);
        // Only the oldest message had to go
        assert_eq!(buffer.summary(), Some("summary+1"));
        assert_eq!(buffer.turns().len(), 1);
        assert_eq!(buffer.turns()[0].role, Role::Assistant);
    }

    #[tokio::test]
    async fn large_summary_does_not_crowd_out_recent_turns() {
        struct VerboseSummarizer;

        #[async_trait]
        impl Summarizer for VerboseSummarizer {
            async fn summarize(&self, _existing: Option<&str>, _turns: &[Message]) -> Result<String, MemoryError> {
                Ok("s".repeat(2000))
            }
        }

        let mut buffer = ConversationBuffer::new(120);
        let long = "x".repeat(120);
        buffer.save_context(&long, &long, &VerboseSummarizer).await;
        assert_eq!(buffer.summary().map(str::len), Some(2000));

        buffer.save_context("next?", "ok", &VerboseSummarizer).await;
        let contents: Vec<&str> = buffer.turns().iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents.last(), Some(&"ok"));
        assert!(contents.contains(&"next?"));
    }

    #[tokio::test]
    async fn persona_is_never_pruned() {
        let mut buffer = ConversationBuffer::new(10);
        let summarizer = CountingSummarizer::ok();
        for i in 0..5 {
            buffer.save_context(&format!("question {i}"), &format!("answer {i}"), &summarizer).await;
        }
        let history = buffer.history();
        assert_eq!(history.messages[0].content, SESSION_PERSONA);
        assert!(buffer.turns().is_empty());
        assert_eq!(buffer.summary(), Some("summary+2+2+2+2+2"));
    }

    #[tokio::test]
    async fn failed_summarization_keeps_turns() {
        let mut buffer = ConversationBuffer::new(10);
        let summarizer = CountingSummarizer::failing();
        buffer.save_context("question", "answer", &summarizer).await;
        assert_eq!(summarizer.calls.load(Ordering::SeqCst), 1);
        assert_eq!(buffer.turns().len(), 2);
        assert!(buffer.summary().is_none());

        // Retried on the next save, order preserved
        buffer.save_context("second", "reply", &summarizer).await;
        assert_eq!(summarizer.calls.load(Ordering::SeqCst), 2);
        let contents: Vec<&str> = buffer.turns().iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["question", "answer", "second", "reply"]);
    }

    #[tokio::test]
    async fn one_buffer_per_user() {
        let store = SessionStore::new(8000, 0);
        let a = store.get_or_create("u1").await;
        let b = store.get_or_create("u1").await;
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn least_recently_used_session_is_evicted() {
        let store = SessionStore::new(8000, 2);
        store.get_or_create("a").await;
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        store.get_or_create("b").await;
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        store.get_or_create("a").await; // touch
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        store.get_or_create("c").await;

        assert_eq!(store.len().await, 2);
        assert!(store.contains("a").await);
        assert!(!store.contains("b").await);
        assert!(store.contains("c").await);
    }

    #[tokio::test]
    async fn remove_drops_history() {
        let store = SessionStore::new(8000, 0);
        store.save("u1", "q", "a", &CountingSummarizer::ok()).await;
        assert!(store.remove("u1").await);
        assert!(!store.remove("u1").await);
        assert_eq!(store.load("u1").await.turn_count(), 0);
    }
}
