//! `thriftbot onboard`: First-time setup.

use thriftbot_config::AppConfig;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config_dir = AppConfig::config_dir();
    let config_path = config_dir.join("config.toml");

    println!("thriftbot — First-Time Setup");
    println!("============================\n");

    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir)?;
        println!("  Created config directory: {}", config_dir.display());
    } else {
        println!("  Config directory exists: {}", config_dir.display());
    }

    if config_path.exists() {
        println!("\n  Config already exists at: {}", config_path.display());
        println!("  Edit it manually or delete and re-run onboard.\n");
    } else {
        std::fs::write(&config_path, AppConfig::default_toml())?;
        println!("  Created config.toml at: {}", config_path.display());
        println!("\n  Next steps:");
        println!("   1. Add api_key to {} (or export THRIFTBOT_API_KEY)", config_path.display());
        println!("   2. Adjust budget.daily_tokens if needed");
        println!("   3. Run: thriftbot chat\n");
    }

    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let data_dir = config.data_dir();
    if !data_dir.exists() {
        std::fs::create_dir_all(data_dir.join("sessions"))?;
        println!("  Created data directory: {}", data_dir.display());
    }

    println!("Setup complete. Run `thriftbot chat` to start chatting.\n");

    Ok(())
}
