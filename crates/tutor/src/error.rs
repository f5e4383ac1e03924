//! Request-level failures of the tutor.

use thiserror::Error;

/// Why a chat request could not be answered.
#[derive(Debug, Error)]
pub enum TutorError {
    #[error("Gemini API Key is missing. Please enter your key in the sidebar or set GEMINI_API_KEY.")]
    CredentialMissing,

    #[error("Gemini API Key was rejected. Please check the key in the sidebar or GEMINI_API_KEY. ({0})")]
    CredentialInvalid(String),

    #[error("RAG system is not initialized. Run `pycoach index` first.")]
    RetrievalUnavailable(String),

    #[error("Local model service is unreachable: {0}")]
    BackendUnreachable(String),

    #[error("{}", generation_message(*quota, message))]
    GenerationFailed { quota: bool, message: String },

    #[error("Retrieval failed: {0}")]
    RetrievalFailed(String),

    #[error("Profile storage failed: {0}")]
    Storage(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

fn generation_message(quota: bool, message: &str) -> String {
    if quota {
        "QUOTA EXCEEDED (429): API usage limit hit. Please wait or use another key.".to_string()
    } else {
        format!("LLM Generation Failed. Error: {message}")
    }
}

impl TutorError {
    /// HTTP status the error is reported with.
    pub fn status_code(&self) -> u16 {
        match self {
            TutorError::CredentialMissing | TutorError::CredentialInvalid(_) => 401,
            TutorError::InvalidRequest(_) => 400,
            TutorError::RetrievalUnavailable(_) | TutorError::Storage(_) => 500,
            TutorError::BackendUnreachable(_)
            | TutorError::GenerationFailed { .. }
            | TutorError::RetrievalFailed(_) => 503,
        }
    }

    /// Stable machine-readable tag.
    pub fn kind(&self) -> &'static str {
        match self {
            TutorError::CredentialMissing => "credential_missing",
            TutorError::CredentialInvalid(_) => "credential_invalid",
            TutorError::RetrievalUnavailable(_) => "retrieval_unavailable",
            TutorError::BackendUnreachable(_) => "backend_unreachable",
            TutorError::GenerationFailed { quota: true, .. } => "quota_exceeded",
            TutorError::GenerationFailed { quota: false, .. } => "generation_failed",
            TutorError::RetrievalFailed(_) => "retrieval_failed",
            TutorError::Storage(_) => "storage_failed",
            TutorError::InvalidRequest(_) => "invalid_request",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quota_errors_use_quota_message() {
        let err = TutorError::GenerationFailed {
            quota: true,
            message: "Resource has been exhausted".into(),
        };
        assert_eq!(err.status_code(), 503);
        assert_eq!(err.kind(), "quota_exceeded");
        assert!(err.to_string().starts_with("QUOTA EXCEEDED (429)"));
    }

    #[test]
    fn generation_errors_carry_backend_message() {
        let err = TutorError::GenerationFailed {
            quota: false,
            message: "model overloaded".into(),
        };
        assert_eq!(err.kind(), "generation_failed");
        assert_eq!(err.to_string(), "LLM Generation Failed. Error: model overloaded");
    }

    #[test]
    fn status_codes() {
        assert_eq!(TutorError::CredentialMissing.status_code(), 401);
        assert_eq!(TutorError::CredentialInvalid("bad key".into()).status_code(), 401);
        assert_eq!(TutorError::RetrievalUnavailable("no index".into()).status_code(), 500);
        assert_eq!(TutorError::BackendUnreachable("refused".into()).status_code(), 503);
        assert_eq!(TutorError::RetrievalFailed("embedder down".into()).status_code(), 503);
        assert_eq!(TutorError::InvalidRequest("empty".into()).status_code(), 400);
    }
}
