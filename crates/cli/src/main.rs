//! thriftbot CLI, the main entry point.
//!
//! Commands:
//! - `onboard`: Write the default config and create the data directory
//! - `chat`: Interactive chat or single-message mode
//! - `status`: Show configuration, budget and mood
//! - `reset`: Delete one conversation's history

use clap::{Parser, Subcommand};

mod commands;
mod notifier;
mod runtime;

#[derive(Parser)]
#[command(
    name = "thriftbot",
    about = "thriftbot — a budget-aware personal chat assistant",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize configuration and data directory
    Onboard,

    /// Chat with the assistant
    Chat {
        /// Send a single message instead of entering interactive mode
        #[arg(short, long)]
        message: Option<String>,

        /// Conversation id to continue
        #[arg(long = "chat", default_value = "local")]
        chat_id: String,
    },

    /// Show configuration, budget and mood
    Status {
        /// Print the snapshot as JSON
        #[arg(long)]
        json: bool,
    },

    /// Delete the stored history of one conversation
    Reset {
        /// Conversation id
        chat_id: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Onboard => commands::onboard::run().await?,
        Commands::Chat { message, chat_id } => commands::chat::run(message, chat_id).await?,
        Commands::Status { json } => commands::status::run(json).await?,
        Commands::Reset { chat_id } => commands::reset::run(&chat_id).await?,
    }

    Ok(())
}
