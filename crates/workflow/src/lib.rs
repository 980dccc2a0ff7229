//! Background heartbeat for thriftbot.
//!
//! Every tick:
//! - the mood recovers and drifts
//! - the daily budget resets once midnight has passed (with stress relief)
//! - due reminders are pushed to their chats through the injected [`Notifier`]
//!
//! Delivery is at most once: a reminder whose notification fails is logged
//! and dropped.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use thriftbot_core::notifier::Notifier;
use thriftbot_governor::Vitals;
use thriftbot_tools::ReminderRegistry;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// What one tick did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    pub budget_reset: bool,
    pub delivered: usize,
    pub failed: usize,
}

pub struct Heartbeat {
    vitals: Arc<Vitals>,
    reminders: Arc<ReminderRegistry>,
    notifier: Arc<dyn Notifier>,
    interval: Duration,
}

impl Heartbeat {
    pub fn new(
        vitals: Arc<Vitals>,
        reminders: Arc<ReminderRegistry>,
        notifier: Arc<dyn Notifier>,
        interval: Duration,
    ) -> Self {
        Self {
            vitals,
            reminders,
            notifier,
            interval,
        }
    }

    /// Run one tick as of `now`.
    pub async fn tick(&self, now: DateTime<Utc>) -> TickReport {
        self.vitals.mood().tick(now);

        let mut report = TickReport {
            budget_reset: self.vitals.maybe_reset_budget(now),
            ..Default::default()
        };

        for reminder in self.reminders.take_due(now) {
            let text = format!("Reminder: {}", reminder.message);
            match self.notifier.notify(&reminder.chat_id, &text).await {
                Ok(()) => {
                    report.delivered += 1;
                    info!(chat_id = %reminder.chat_id, id = reminder.id, "Reminder delivered");
                }
                Err(e) => {
                    report.failed += 1;
                    warn!(chat_id = %reminder.chat_id, id = reminder.id, error = %e, "Reminder delivery failed");
                }
            }
        }

        debug!(
            budget_reset = report.budget_reset,
            delivered = report.delivered,
            failed = report.failed,
            "Heartbeat tick"
        );
        report
    }

    /// Tick on the configured interval until the task is aborted.
    pub fn start(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                self.tick(Utc::now()).await;
            }
        })
    }
}
