//! # PyCoach Tutor
//!
//! The adaptive tutoring pipeline: the level-aware prompt builder and the
//! orchestrator that turns a chat request into a grounded answer.
//!
//! ## Request flow
//!
//! ```text
//! ChatRequest
//!   → retrieval ready?          (500 if not)
//!   → backend + credential      (401 / 503)
//!   → profile → PromptTemplate
//!   → retrieve (+ rerank)
//!   → render with session history
//!   → generate                  (503, quota-aware)
//!   → save turn to session memory
//!   → ChatResponse
//! ```

pub mod error;
pub mod prompt;
pub mod tutor;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use error::TutorError;
pub use prompt::{PromptTemplate, teaching_style};
pub use tutor::{ChatRequest, ChatResponse, Tutor};
