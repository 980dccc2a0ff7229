//! Process-wide budget and mood, shared by the pipeline and the heartbeat.

use crate::budget::TokenBudget;
use crate::ladder::{BudgetAwareParams, ModelTiers, RequestTraits};
use crate::mood::MoodState;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{Mutex, MutexGuard, PoisonError};
use thriftbot_config::AppConfig;
use tracing::debug;

/// Budget and mood behind one owner, constructed once at startup.
pub struct Vitals {
    budget: Mutex<TokenBudget>,
    mood: Mutex<MoodState>,
    tiers: ModelTiers,
}

/// A point-in-time copy for status output.
#[derive(Debug, Clone, Serialize)]
pub struct VitalsSnapshot {
    pub used: u64,
    pub budget: u64,
    pub usage_ratio: f64,
    pub reset_at: DateTime<Utc>,
    pub energy: f64,
    pub stress: f64,
    pub curiosity: f64,
    pub api_errors: u32,
}

impl Vitals {
    pub fn new(budget: TokenBudget, mood: MoodState, tiers: ModelTiers) -> Self {
        Self {
            budget: Mutex::new(budget),
            mood: Mutex::new(mood),
            tiers,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            TokenBudget::new(config.budget.daily_tokens),
            MoodState::default(),
            ModelTiers::from_config(config),
        )
    }

    /// Lock the budget.
    pub fn budget(&self) -> MutexGuard<'_, TokenBudget> {
        self.budget.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Lock the mood.
    pub fn mood(&self) -> MutexGuard<'_, MoodState> {
        self.mood.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn tiers(&self) -> &ModelTiers {
        &self.tiers
    }

    pub fn usage_ratio(&self) -> f64 {
        self.budget().usage_ratio()
    }

    /// Bill tokens as soon as they are spent.
    pub fn record_tokens(&self, tokens: u64) {
        let mut budget = self.budget();
        budget.record(tokens);
        debug!(tokens, used = budget.used(), usage_ratio = budget.usage_ratio(), "Tokens billed");
    }

    /// Ladder parameters for the current usage.
    pub fn current_params(&self) -> BudgetAwareParams {
        self.tiers.params_for(self.usage_ratio())
    }

    /// Ladder parameters with the capable-model upgrade applied.
    pub fn params_for_request(&self, traits: RequestTraits) -> BudgetAwareParams {
        self.tiers.upgrade(self.current_params(), traits)
    }

    /// Run the daily reset check, relieving stress when it fires.
    pub fn maybe_reset_budget(&self, now: DateTime<Utc>) -> bool {
        let reset = self.budget().maybe_reset(now);
        if reset {
            self.mood().budget_reset_relief();
        }
        reset
    }

    pub fn snapshot(&self) -> VitalsSnapshot {
        let budget = self.budget().clone();
        let mood = self.mood().clone();
        VitalsSnapshot {
            used: budget.used(),
            budget: budget.budget(),
            usage_ratio: budget.usage_ratio(),
            reset_at: budget.reset_at(),
            energy: mood.energy(),
            stress: mood.stress(),
            curiosity: mood.curiosity(),
            api_errors: mood.api_errors(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn vitals(daily: u64) -> Vitals {
        let tiers = ModelTiers {
            normal: "sonnet".into(),
            fallback: "haiku".into(),
            capable: Some("opus".into()),
            max_tokens: 2048,
            max_history: 40,
        };
        Vitals::new(TokenBudget::new(daily), MoodState::with_levels(80.0, 50.0, 50.0), tiers)
    }

    #[test]
    fn params_follow_recorded_usage() {
        let v = vitals(1_000);
        assert_eq!(v.current_params().model, "sonnet");
        v.record_tokens(920);
        let p = v.current_params();
        assert_eq!((p.model.as_str(), p.max_tokens, p.max_history), ("haiku", 500, 5));
        v.record_tokens(80);
        assert!(v.current_params().should_block);
    }

    #[test]
    fn request_upgrade_goes_through_vitals() {
        let v = vitals(1_000);
        let p = v.params_for_request(RequestTraits { has_attachments: true, uses_tools: false });
        assert_eq!(p.model, "opus");
    }

    #[test]
    fn reset_relieves_stress() {
        let v = vitals(1_000);
        v.record_tokens(1_000);
        let later = v.budget().reset_at() + Duration::minutes(1);

        assert!(v.maybe_reset_budget(later));
        assert_eq!(v.budget().used(), 0);
        assert_eq!(v.mood().stress(), 30.0);

        assert!(!v.maybe_reset_budget(later));
        assert_eq!(v.mood().stress(), 30.0);
    }

    #[test]
    fn snapshot_copies_both() {
        let v = vitals(2_000);
        v.record_tokens(500);
        let snap = v.snapshot();
        assert_eq!(snap.used, 500);
        assert!((snap.usage_ratio - 0.25).abs() < f64::EPSILON);
        assert_eq!(snap.stress, 50.0);
    }
}
