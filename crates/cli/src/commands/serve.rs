//! `pycoach serve` — Start the HTTP tutor server.

use std::path::Path;

pub async fn run(config_path: Option<&Path>, port_override: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = super::load_config(config_path)?;

    if let Some(port) = port_override {
        config.gateway.port = port;
    }

    println!("🐍 PyCoach");
    println!("   Listening: http://{}:{}", config.gateway.host, config.gateway.port);
    println!("   Index:     {}", config.retrieval.index_dir.display());
    println!("   Cloud:     {} ({})", config.cloud.model, config.cloud.name);
    println!("   Local:     {} at {}", config.local.model, config.local.base_url);

    pycoach_gateway::start(config).await?;

    Ok(())
}
