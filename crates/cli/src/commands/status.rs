//! `thriftbot status`: Show configuration, budget and mood.

use crate::runtime::sessions_dir;
use thriftbot_config::AppConfig;
use thriftbot_governor::Vitals;

pub async fn run(json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let vitals = Vitals::from_config(&config);
    let snapshot = vitals.snapshot();
    let params = vitals.current_params();

    if json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
        return Ok(());
    }

    let stored = std::fs::read_dir(sessions_dir(&config))
        .map(|entries| {
            entries
                .filter_map(Result::ok)
                .filter(|e| e.path().extension().is_some_and(|ext| ext == "json"))
                .count()
        })
        .unwrap_or(0);

    println!("thriftbot Status");
    println!("================");
    println!("  Config dir:    {}", AppConfig::config_dir().display());
    println!("  Data dir:      {}", config.data_dir().display());
    println!("  API key:       {}", if config.has_api_key() { "configured" } else { "missing" });
    println!("  Model:         {} (fallback {})", config.models.default, config.models.fallback);
    println!(
        "  Capable model: {}",
        config.models.capable.as_deref().unwrap_or("disabled")
    );
    println!("  Conversations: {stored} stored");
    println!();
    println!("  Budget:        {} / {} tokens", snapshot.used, snapshot.budget);
    println!("  Resets at:     {}", snapshot.reset_at.format("%Y-%m-%d %H:%M UTC"));
    println!("  Tier:          {} ({} max tokens, {} turns)", params.model, params.max_tokens, params.max_history);
    println!(
        "  Mood:          energy {:.0}, stress {:.0}, curiosity {:.0}",
        snapshot.energy, snapshot.stress, snapshot.curiosity
    );

    let config_path = AppConfig::config_dir().join("config.toml");
    if config_path.exists() {
        println!("\n  Config file found");
    } else {
        println!("\n  No config file — run `thriftbot onboard` first");
    }

    Ok(())
}
