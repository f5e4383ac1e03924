//! Generation orchestrator.
//!
//! One chat request runs through fixed stages:
//!
//! 1. Check retrieval is initialized
//! 2. Resolve the backend and its credential
//! 3. Load the profile and build the adaptive prompt
//! 4. Retrieve (and rerank) course context
//! 5. Compose the prompt with session history
//! 6. Generate, once, with no retry
//! 7. Persist the turn to session memory
//!
//! The user's session lock is held from stage 3 through stage 7, so two
//! requests for the same user run one after the other while different users
//! proceed in parallel.

use pycoach_core::error::ProviderError;
use pycoach_core::level::{AdaptiveProfile, BackendSelector, Level};
use pycoach_core::message::Message;
use pycoach_core::provider::ProviderRequest;
use pycoach_memory::{LlmSummarizer, ProfileStore, SessionStore};
use pycoach_providers::{Backend, BackendRouter};
use pycoach_retrieval::RetrievalService;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};
use crate::error::TutorError;
use crate::prompt::PromptTemplate;

/// An incoming chat turn.
#[derive(Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub user_id: String,
    pub message: String,

    /// Level selected in the client. A known level is saved to the profile;
    /// anything else applies to this request only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_level: Option<Level>,

    #[serde(default)]
    pub llm_source: BackendSelector,

    /// Per-request cloud credential
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

impl ChatRequest {
    pub fn new(user_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            message: message.into(),
            current_level: None,
            llm_source: BackendSelector::Cloud,
            api_key: None,
        }
    }

    pub fn with_level(mut self, level: Level) -> Self {
        self.current_level = Some(level);
        self
    }

    pub fn with_backend(mut self, selector: BackendSelector) -> Self {
        self.llm_source = selector;
        self
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }
}

impl fmt::Debug for ChatRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatRequest")
            .field("user_id", &self.user_id)
            .field("message", &self.message)
            .field("current_level", &self.current_level)
            .field("llm_source", &self.llm_source)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// The tutor's answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response: String,
    /// Level the answer was adapted to
    pub current_level: Level,
    /// Course files the context came from
    #[serde(default)]
    pub sources: Vec<String>,
}

/// The adaptive tutor.
pub struct Tutor {
    profiles: Arc<dyn ProfileStore>,
    sessions: Arc<SessionStore>,
    retrieval: Arc<RetrievalService>,
    router: BackendRouter,
}

impl Tutor {
    pub fn new(
        profiles: Arc<dyn ProfileStore>,
        sessions: Arc<SessionStore>,
        retrieval: Arc<RetrievalService>,
        router: BackendRouter,
    ) -> Self {
        Self {
            profiles,
            sessions,
            retrieval,
            router,
        }
    }

    pub fn profiles(&self) -> &dyn ProfileStore {
        self.profiles.as_ref()
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub fn retrieval(&self) -> &RetrievalService {
        &self.retrieval
    }

    pub fn router(&self) -> &BackendRouter {
        &self.router
    }

    /// Answer one chat turn.
    pub async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, TutorError> {
        let started = Instant::now();

        if request.user_id.trim().is_empty() {
            return Err(TutorError::InvalidRequest("user_id must not be empty".into()));
        }
        if request.message.trim().is_empty() {
            return Err(TutorError::InvalidRequest("message must not be empty".into()));
        }

        if let Some(reason) = self.retrieval.unavailable_reason() {
            warn!(user_id = %request.user_id, reason, "Rejecting chat: retrieval is not initialized");
            return Err(TutorError::RetrievalUnavailable(reason.to_string()));
        }

        let backend = self.resolve_backend(&request).await?;
        debug!(
            user_id = %request.user_id,
            backend = backend.selector.as_str(),
            model = %backend.model,
            "Backend resolved"
        );

        let buffer = self.sessions.get_or_create(&request.user_id).await;
        let mut session = buffer.lock().await;

        let level = self.resolve_level(&request.user_id, request.current_level.as_ref()).await?;
        let template = PromptTemplate::build_for_level(&level);

        let context = self
            .retrieval
            .context(&request.message)
            .await
            .map_err(|e| TutorError::RetrievalFailed(e.to_string()))?;

        let messages = template.render(&context.text, &session.history().render(), &request.message);

        let reply = generate(&backend, messages).await?;

        let summarizer = LlmSummarizer::new(backend.provider.clone(), backend.model.clone(), backend.temperature);
        session.save_context(&request.message, &reply, &summarizer).await;
        drop(session);

        info!(
            user_id = %request.user_id,
            level = %level,
            backend = backend.selector.as_str(),
            passages = context.passages.len(),
            duration_ms = started.elapsed().as_millis() as u64,
            "Chat turn answered"
        );

        Ok(ChatResponse {
            response: reply,
            current_level: level,
            sources: context.sources(),
        })
    }

    /// Pick the backend for a request. The cloud backend needs a credential;
    /// the local backend must answer a health check.
    async fn resolve_backend(&self, request: &ChatRequest) -> Result<Backend, TutorError> {
        match request.llm_source {
            BackendSelector::Cloud => self
                .router
                .cloud(request.api_key.as_deref())
                .ok_or(TutorError::CredentialMissing),
            BackendSelector::Local => {
                let backend = self.router.local();
                match backend.provider.health_check().await {
                    Ok(true) => Ok(backend),
                    Ok(false) => Err(TutorError::BackendUnreachable("local service unreachable".into())),
                    Err(e) => {
                        warn!(error = %e, "Local backend health check failed");
                        Err(TutorError::BackendUnreachable(format!("local service unreachable ({e})")))
                    }
                }
            }
        }
    }

    /// The level this request is answered at. A known asserted level is
    /// saved first; an unknown one is used without saving.
    async fn resolve_level(&self, user_id: &str, asserted: Option<&Level>) -> Result<Level, TutorError> {
        let mut profile = self.profiles.get_or_create(user_id).await.map_err(storage)?;

        let Some(level) = asserted.filter(|l| !l.label().trim().is_empty()) else {
            return Ok(profile.current_level);
        };

        if !level.is_known() {
            debug!(user_id, level = %level, "Unrecognized level; using generic teaching style");
            return Ok(level.clone());
        }

        if *level != profile.current_level {
            info!(user_id, from = %profile.current_level, to = %level, "Level changed");
            profile.set_level(level.clone());
            self.profiles.save(profile).await.map_err(storage)?;
        }
        Ok(level.clone())
    }

    /// The user's profile, created on first access.
    pub async fn profile(&self, user_id: &str) -> Result<AdaptiveProfile, TutorError> {
        self.profiles.get_or_create(user_id).await.map_err(storage)
    }

    /// Select a level for the user. Only the three known levels are accepted.
    pub async fn set_level(&self, user_id: &str, level: Level) -> Result<AdaptiveProfile, TutorError> {
        if !level.is_known() {
            return Err(TutorError::InvalidRequest(format!(
                "unknown level '{level}'; expected Beginner, Intermediate or Expert"
            )));
        }

        let mut profile = self.profiles.get_or_create(user_id).await.map_err(storage)?;
        if profile.current_level != level {
            info!(user_id, from = %profile.current_level, to = %level, "Level changed");
            profile.set_level(level);
            self.profiles.save(profile.clone()).await.map_err(storage)?;
        }
        Ok(profile)
    }

    /// Forget the user's conversation. Returns whether one existed.
    pub async fn reset_session(&self, user_id: &str) -> bool {
        let removed = self.sessions.remove(user_id).await;
        if removed {
            info!(user_id, "Session reset");
        }
        removed
    }
}

/// One backend call. Errors are classified from the structured provider
/// error, never from its text.
async fn generate(backend: &Backend, messages: Vec<Message>) -> Result<String, TutorError> {
    let request = ProviderRequest {
        model: backend.model.clone(),
        messages,
        temperature: backend.temperature,
        max_tokens: None,
    };

    match backend.provider.complete(request).await {
        Ok(response) => Ok(response.message.content),
        Err(e) => Err(classify(backend.selector, e)),
    }
}

fn classify(selector: BackendSelector, error: ProviderError) -> TutorError {
    warn!(backend = selector.as_str(), error = %error, "Generation failed");
    if let ProviderError::AuthenticationFailed(message) = error {
        return TutorError::CredentialInvalid(message);
    }
    if selector == BackendSelector::Local && error.is_connection_failure() {
        return TutorError::BackendUnreachable(error.to_string());
    }
    TutorError::GenerationFailed {
        quota: error.is_rate_limited(),
        message: error.to_string(),
    }
}

fn storage(error: pycoach_core::error::MemoryError) -> TutorError {
    TutorError::Storage(error.to_string())
}
