//! Learner profiles and conversation memory for PyCoach.
//!
//! - [`profile`]: the keyed profile store (in-memory or JSON-lines file)
//! - [`session`]: per-user rolling conversation buffers with summarization
//! - [`token`]: the token estimate used to budget session memory

pub mod profile;
pub mod session;
pub mod token;

pub use profile::{FileProfileStore, InMemoryProfileStore, ProfileStore};
pub use session::{ConversationBuffer, History, LlmSummarizer, SESSION_PERSONA, SessionStore, Summarizer};
pub use token::estimate_tokens;
