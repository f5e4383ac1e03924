//! `pycoach init` — First-time setup.

use pycoach_config::{AppConfig, DEFAULT_CONFIG_FILE};
use std::path::{Path, PathBuf};

pub async fn run(config_path: Option<&Path>, force: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config_path = config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

    println!("🐍 PyCoach — First-Time Setup");
    println!("=============================\n");

    if config_path.exists() && !force {
        println!("⚠️  Config already exists at: {}", config_path.display());
        println!("   Edit it manually or re-run with --force.\n");
    } else {
        if let Some(parent) = config_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&config_path, AppConfig::default_toml())?;
        println!("✅ Created {}", config_path.display());
    }

    let config = AppConfig::load_from(&config_path).unwrap_or_default();
    let course_dir = &config.retrieval.course_dir;
    if course_dir.exists() {
        println!("   Course directory exists: {}", course_dir.display());
    } else {
        std::fs::create_dir_all(course_dir)?;
        println!("✅ Created course directory: {}", course_dir.display());
    }

    println!("\n📝 Next steps:");
    println!("   1. Put course material in {}", course_dir.display());
    println!("   2. Set GEMINI_API_KEY (or add cloud.api_key to {})", config_path.display());
    println!("   3. Run: pycoach index");
    println!("   4. Run: pycoach serve\n");

    Ok(())
}
