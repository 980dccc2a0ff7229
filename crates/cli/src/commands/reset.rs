//! `thriftbot reset`: Delete one conversation's stored history.

use crate::runtime::sessions_for;
use thriftbot_config::AppConfig;

pub async fn run(chat_id: &str) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let sessions = sessions_for(&config);

    let path = sessions.path_for(chat_id);
    if !path.exists() {
        println!("  No stored history for '{chat_id}'.");
        return Ok(());
    }

    sessions.clear(chat_id);
    println!("  History for '{chat_id}' deleted.");
    Ok(())
}
