pub mod doctor;
pub mod index;
pub mod init;
pub mod serve;

use pycoach_config::AppConfig;
use std::path::Path;

/// Load the config file plus environment overrides.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig, Box<dyn std::error::Error>> {
    Ok(AppConfig::load(path).map_err(|e| format!("Failed to load config: {e}"))?)
}
