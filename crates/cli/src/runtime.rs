//! Startup wiring: one of each collaborator, shared for the life of the process.

use std::sync::Arc;
use thriftbot_agent::Assistant;
use thriftbot_config::AppConfig;
use thriftbot_core::notifier::Notifier;
use thriftbot_core::provider::Provider;
use thriftbot_core::tool::{NoTools, ToolExecutor};
use thriftbot_governor::Vitals;
use thriftbot_session::{SessionStore, StoreConfig};
use thriftbot_tools::{NoteStore, ReminderRegistry, Toolbox};
use thriftbot_workflow::Heartbeat;
use tracing::info;

pub struct Runtime {
    pub assistant: Arc<Assistant>,
    sessions: SessionStore,
    heartbeat: tokio::task::JoinHandle<()>,
}

impl Runtime {
    pub fn start(config: &AppConfig, provider: Arc<dyn Provider>, notifier: Arc<dyn Notifier>) -> Self {
        let data_dir = config.data_dir();
        let sessions = sessions_for(config);
        let vitals = Arc::new(Vitals::from_config(config));
        let reminders = Arc::new(ReminderRegistry::new());

        let tools: Arc<dyn ToolExecutor> = if config.agent.tools_enabled {
            let notes = Arc::new(NoteStore::open(data_dir.join("notes.jsonl")));
            Arc::new(Toolbox::new(reminders.clone(), notes))
        } else {
            Arc::new(NoTools)
        };

        let heartbeat = Heartbeat::new(
            vitals.clone(),
            reminders.clone(),
            notifier,
            config.agent.tick_interval(),
        )
        .start();

        let assistant = Arc::new(Assistant::new(
            config,
            provider,
            tools,
            sessions.clone(),
            vitals,
            reminders,
        ));

        info!(data_dir = %data_dir.display(), tools = config.agent.tools_enabled, "Runtime started");
        Self {
            assistant,
            sessions,
            heartbeat,
        }
    }

    /// Stop the heartbeat and write every pending session.
    pub fn shutdown(self) {
        self.heartbeat.abort();
        let flushed = self.sessions.flush_all();
        info!(flushed, "Runtime stopped");
    }
}

pub fn sessions_for(config: &AppConfig) -> SessionStore {
    SessionStore::new(
        sessions_dir(config),
        StoreConfig::from(&config.session),
    )
}

pub fn sessions_dir(config: &AppConfig) -> std::path::PathBuf {
    config.data_dir().join("sessions")
}
