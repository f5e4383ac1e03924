//! Adaptive level and learner profile types.
//!
//! The level is the only adaptive metric: a coarse difficulty tier that
//! selects which teaching style is injected into the prompt.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A learner's difficulty tier.
///
/// Parsing never fails: anything that is not one of the three known tiers
/// becomes [`Level::Unknown`], which selects the generic teaching style.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Level {
    #[default]
    Beginner,
    Intermediate,
    Expert,
    /// An unrecognized level string, kept verbatim.
    Unknown(String),
}

impl Level {
    /// The three levels a learner can select.
    pub const KNOWN: [Level; 3] = [Level::Beginner, Level::Intermediate, Level::Expert];

    /// Parse a level label. Case-insensitive, surrounding whitespace ignored.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "beginner" => Level::Beginner,
            "intermediate" => Level::Intermediate,
            "expert" => Level::Expert,
            _ => Level::Unknown(raw.to_string()),
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, Level::Unknown(_))
    }

    /// Display label ("Beginner", "Intermediate", "Expert" or the raw string).
    pub fn label(&self) -> &str {
        match self {
            Level::Beginner => "Beginner",
            Level::Intermediate => "Intermediate",
            Level::Expert => "Expert",
            Level::Unknown(raw) => raw,
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl From<String> for Level {
    fn from(raw: String) -> Self {
        Level::parse(&raw)
    }
}

impl From<&str> for Level {
    fn from(raw: &str) -> Self {
        Level::parse(raw)
    }
}

impl From<Level> for String {
    fn from(level: Level) -> Self {
        level.label().to_string()
    }
}

/// A learner's adaptive state.
///
/// Owned by the profile store. Created on first access with the default
/// level and replaced wholesale on save.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdaptiveProfile {
    /// Opaque learner identifier
    pub user_id: String,

    /// Current difficulty tier
    #[serde(default)]
    pub current_level: Level,

    /// When the level last changed
    pub updated_at: DateTime<Utc>,
}

impl AdaptiveProfile {
    /// A fresh profile at the default level.
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            current_level: Level::default(),
            updated_at: Utc::now(),
        }
    }

    /// Change the level, stamping the update time.
    pub fn set_level(&mut self, level: Level) {
        self.current_level = level;
        self.updated_at = Utc::now();
    }
}

/// Which language-model backend serves a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum BackendSelector {
    /// Hosted model, requires a credential.
    #[default]
    Cloud,
    /// Locally hosted model, no credential.
    Local,
}

impl BackendSelector {
    /// Parse a backend label. Labels mentioning "local" or "ollama" select the
    /// local backend; everything else selects the cloud backend.
    pub fn parse(raw: &str) -> Self {
        let lower = raw.to_lowercase();
        if lower.contains("local") || lower.contains("ollama") {
            BackendSelector::Local
        } else {
            BackendSelector::Cloud
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BackendSelector::Cloud => "cloud",
            BackendSelector::Local => "local",
        }
    }
}

impl From<String> for BackendSelector {
    fn from(raw: String) -> Self {
        BackendSelector::parse(&raw)
    }
}

impl From<BackendSelector> for String {
    fn from(selector: BackendSelector) -> Self {
        selector.as_str().to_string()
    }
}
