//! Learner profile storage.
//!
//! A profile maps a user id to its adaptive level. Profiles are created on
//! first access at the default level and never deleted.

use async_trait::async_trait;
use pycoach_core::error::MemoryError;
use pycoach_core::level::AdaptiveProfile;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Keyed store of learner profiles.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    fn name(&self) -> &str;

    /// Return the stored profile, creating a default one if absent.
    /// Never overwrites an existing record.
    async fn get_or_create(&self, user_id: &str) -> Result<AdaptiveProfile, MemoryError>;

    /// Look up a profile without creating it.
    async fn get(&self, user_id: &str) -> Result<Option<AdaptiveProfile>, MemoryError>;

    /// Replace the stored profile wholesale.
    async fn save(&self, profile: AdaptiveProfile) -> Result<(), MemoryError>;

    /// Number of stored profiles.
    async fn count(&self) -> Result<usize, MemoryError>;
}

/// Profiles held in process memory.
pub struct InMemoryProfileStore {
    profiles: RwLock<HashMap<String, AdaptiveProfile>>,
}

impl InMemoryProfileStore {
    pub fn new() -> Self {
        Self {
            profiles: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryProfileStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProfileStore for InMemoryProfileStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn get_or_create(&self, user_id: &str) -> Result<AdaptiveProfile, MemoryError> {
        let mut profiles = self.profiles.write().await;
        let profile = profiles
            .entry(user_id.to_string())
            .or_insert_with(|| {
                debug!(user_id, "Creating learner profile");
                AdaptiveProfile::new(user_id)
            });
        Ok(profile.clone())
    }

    async fn get(&self, user_id: &str) -> Result<Option<AdaptiveProfile>, MemoryError> {
        Ok(self.profiles.read().await.get(user_id).cloned())
    }

    async fn save(&self, profile: AdaptiveProfile) -> Result<(), MemoryError> {
        self.profiles
            .write()
            .await
            .insert(profile.user_id.clone(), profile);
        Ok(())
    }

    async fn count(&self) -> Result<usize, MemoryError> {
        Ok(self.profiles.read().await.len())
    }
}

/// A file-backed profile store using JSONL (one profile per line).
///
/// Profiles are loaded on creation and the whole file is rewritten on every
/// mutation. When a user id appears on several lines the last one wins.
pub struct FileProfileStore {
    path: PathBuf,
    profiles: RwLock<HashMap<String, AdaptiveProfile>>,
}

impl FileProfileStore {
    /// Open the store at `path`. A missing file starts empty and is created on
    /// first write.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let profiles = Self::load_from_disk(&path);
        info!(path = %path.display(), count = profiles.len(), "Profile store loaded");
        Self {
            path,
            profiles: RwLock::new(profiles),
        }
    }

    fn load_from_disk(path: &Path) -> HashMap<String, AdaptiveProfile> {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(_) => return HashMap::new(),
        };

        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| match serde_json::from_str::<AdaptiveProfile>(line) {
                Ok(profile) => Some((profile.user_id.clone(), profile)),
                Err(e) => {
                    warn!(error = %e, "Skipping corrupted profile entry");
                    None
                }
            })
            .collect()
    }

    /// Insert `profile` and write the table. A failed write restores the
    /// previous entry so memory never holds an unsaved record.
    fn commit(
        &self,
        profiles: &mut HashMap<String, AdaptiveProfile>,
        profile: AdaptiveProfile,
    ) -> Result<(), MemoryError> {
        let user_id = profile.user_id.clone();
        let previous = profiles.insert(user_id.clone(), profile);

        if let Err(e) = self.flush(profiles) {
            match previous {
                Some(old) => profiles.insert(user_id, old),
                None => profiles.remove(&user_id),
            };
            return Err(e);
        }
        Ok(())
    }

    /// Write every profile to disk, sorted by user id.
    fn flush(&self, profiles: &HashMap<String, AdaptiveProfile>) -> Result<(), MemoryError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                MemoryError::Storage(format!("Failed to create profile directory: {e}"))
            })?;
        }

        let mut ordered: Vec<&AdaptiveProfile> = profiles.values().collect();
        ordered.sort_by(|a, b| a.user_id.cmp(&b.user_id));

        let mut content = String::new();
        for profile in ordered {
            let line = serde_json::to_string(profile).map_err(|e| {
                MemoryError::Storage(format!("Failed to serialize profile: {e}"))
            })?;
            content.push_str(&line);
            content.push('\n');
        }

        std::fs::write(&self.path, content)
            .map_err(|e| MemoryError::Storage(format!("Failed to write profile file: {e}")))
    }
}

#[async_trait]
impl ProfileStore for FileProfileStore {
    fn name(&self) -> &str {
        "file"
    }

    async fn get_or_create(&self, user_id: &str) -> Result<AdaptiveProfile, MemoryError> {
        let mut profiles = self.profiles.write().await;
        if let Some(existing) = profiles.get(user_id) {
            return Ok(existing.clone());
        }

        debug!(user_id, "Creating learner profile");
        let profile = AdaptiveProfile::new(user_id);
        self.commit(&mut profiles, profile.clone())?;
        Ok(profile)
    }

    async fn get(&self, user_id: &str) -> Result<Option<AdaptiveProfile>, MemoryError> {
        Ok(self.profiles.read().await.get(user_id).cloned())
    }

    async fn save(&self, profile: AdaptiveProfile) -> Result<(), MemoryError> {
        let mut profiles = self.profiles.write().await;
        self.commit(&mut profiles, profile)
    }

    async fn count(&self) -> Result<usize, MemoryError> {
        Ok(self.profiles.read().await.len())
    }
}
