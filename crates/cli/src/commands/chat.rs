//! `thriftbot chat`: Interactive or single-message chat mode.

use crate::notifier::StdoutNotifier;
use crate::runtime::Runtime;
use std::io::Write;
use std::sync::Arc;
use thriftbot_config::AppConfig;
use thriftbot_core::notifier::InboundMessage;
use tokio::io::{AsyncBufReadExt, BufReader};

pub async fn run(message: Option<String>, chat_id: String) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    if !config.has_api_key() {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set one of these environment variables:");
        eprintln!("    export THRIFTBOT_API_KEY=sk-ant-...");
        eprintln!("    export ANTHROPIC_API_KEY=sk-ant-...");
        eprintln!();
        eprintln!("  Or add it to your config file:");
        eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    }

    let provider = thriftbot_providers::build_from_config(&config)?;
    let runtime = Runtime::start(&config, provider, Arc::new(StdoutNotifier));

    if let Some(msg) = message {
        eprint!("  Thinking...");
        let reply = runtime
            .assistant
            .handle(&chat_id, &InboundMessage::text(msg))
            .await;
        eprint!("\r              \r");
        println!("{reply}");
        runtime.shutdown();
        return Ok(());
    }

    println!();
    println!("  thriftbot — interactive mode");
    println!();
    println!("  Model:     {}", config.models.default);
    println!("  Budget:    {} tokens/day", config.budget.daily_tokens);
    println!("  Chat:      {chat_id}");
    println!();
    println!("  Type your message and press Enter.");
    println!("  Type 'exit' or Ctrl+C to quit.");
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("  You > ");
        std::io::stdout().flush()?;

        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else { break };
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if matches!(input, "exit" | "quit") {
            break;
        }

        eprint!("  ...");
        let reply = runtime
            .assistant
            .handle(&chat_id, &InboundMessage::text(input))
            .await;
        eprint!("\r     \r");
        println!();
        for line in reply.lines() {
            println!("  thriftbot > {line}");
        }
        println!();
    }

    runtime.shutdown();
    println!();
    println!("  Goodbye!");
    println!();

    Ok(())
}
