//! # PyCoach Core
//!
//! Domain types, traits, and error definitions for the PyCoach adaptive tutor.
//! This crate has **zero framework dependencies** — it defines the domain model
//! that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every external service (language model, embedding model, cross-encoder)
//! is defined as a trait here. Implementations live in their respective
//! crates. This enables:
//! - Swapping backends via configuration
//! - Easy testing with scripted mock implementations
//! - Clean dependency graph (all crates depend inward on core)

pub mod error;
pub mod level;
pub mod message;
pub mod provider;
pub mod retrieval;

// Re-export key types at crate root for ergonomics
pub use error::{MemoryError, ProviderError, RetrievalError};
pub use level::{AdaptiveProfile, BackendSelector, Level};
pub use message::{Message, Role};
pub use provider::{Provider, ProviderRequest, ProviderResponse};
pub use retrieval::{CrossEncoder, Embedder, RetrievedPassage};
