//! Energy, stress and curiosity.
//!
//! Each value lives in [0, 100]. The heartbeat calls [`MoodState::tick`];
//! the message pipeline reports exchanges and failures as they happen.

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::Serialize;

const MIN: f64 = 0.0;
const MAX: f64 = 100.0;

const TICK_ENERGY_RECOVERY: f64 = 2.0;
const TICK_STRESS_DECAY: f64 = 1.0;
const CURIOSITY_DRIFT: f64 = 2.5;
const IDLE_CURIOSITY_BONUS: f64 = 10.0;
const IDLE_AFTER_MINUTES: i64 = 5;

const TOKENS_PER_ENERGY_POINT: u32 = 500;
const MAX_EXCHANGE_COST: u32 = 10;
const QUICK_RESPONSE_COST: f64 = 1.0;

const API_ERROR_STRESS: f64 = 15.0;
const RATE_LIMIT_STRESS: f64 = 20.0;
const PROCESSING_ERROR_STRESS: f64 = 10.0;
const BUDGET_RESET_RELIEF: f64 = 20.0;
const COOLDOWN_RELIEF: f64 = 10.0;

/// Stress at or above this surfaces the cooldown reply.
pub const OVERLOAD_STRESS: f64 = 80.0;

/// How the assistant would describe itself right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Feeling {
    Frazzled,
    Tired,
    Curious,
    Content,
}

#[derive(Debug, Clone, Serialize)]
pub struct MoodState {
    energy: f64,
    stress: f64,
    curiosity: f64,
    last_exchange: DateTime<Utc>,
    /// Whether the current idle stretch already earned its curiosity bonus
    idle_bonus_given: bool,
    api_errors: u32,
    last_rate_limit: Option<DateTime<Utc>>,
}

impl MoodState {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            energy: 80.0,
            stress: 10.0,
            curiosity: 50.0,
            last_exchange: now,
            idle_bonus_given: false,
            api_errors: 0,
            last_rate_limit: None,
        }
    }

    /// Explicit starting values, clamped.
    pub fn with_levels(energy: f64, stress: f64, curiosity: f64) -> Self {
        Self {
            energy: clamp(energy),
            stress: clamp(stress),
            curiosity: clamp(curiosity),
            ..Self::new(Utc::now())
        }
    }

    pub fn energy(&self) -> f64 {
        self.energy
    }

    pub fn stress(&self) -> f64 {
        self.stress
    }

    pub fn curiosity(&self) -> f64 {
        self.curiosity
    }

    pub fn api_errors(&self) -> u32 {
        self.api_errors
    }

    pub fn last_rate_limit(&self) -> Option<DateTime<Utc>> {
        self.last_rate_limit
    }

    pub fn is_overloaded(&self) -> bool {
        self.stress >= OVERLOAD_STRESS
    }

    pub fn feeling(&self) -> Feeling {
        if self.stress >= 60.0 {
            Feeling::Frazzled
        } else if self.energy < 30.0 {
            Feeling::Tired
        } else if self.curiosity >= 70.0 {
            Feeling::Curious
        } else {
            Feeling::Content
        }
    }

    /// Periodic update with a random curiosity drift.
    pub fn tick(&mut self, now: DateTime<Utc>) {
        let drift = rand::rng().random_range(-CURIOSITY_DRIFT..=CURIOSITY_DRIFT);
        self.tick_with(now, drift);
    }

    /// Periodic update with a given drift, clamped to ±2.5.
    pub fn tick_with(&mut self, now: DateTime<Utc>, drift: f64) {
        self.energy = clamp(self.energy + TICK_ENERGY_RECOVERY);
        self.stress = clamp(self.stress - TICK_STRESS_DECAY);
        self.curiosity = clamp(self.curiosity + drift.clamp(-CURIOSITY_DRIFT, CURIOSITY_DRIFT));

        let idle = now - self.last_exchange >= Duration::minutes(IDLE_AFTER_MINUTES);
        if idle && !self.idle_bonus_given {
            self.curiosity = clamp(self.curiosity + IDLE_CURIOSITY_BONUS);
            self.idle_bonus_given = true;
        }
    }

    /// An LLM exchange that cost `tokens`.
    pub fn after_exchange(&mut self, tokens: u32, now: DateTime<Utc>) {
        let cost = (tokens / TOKENS_PER_ENERGY_POINT).clamp(1, MAX_EXCHANGE_COST);
        self.energy = clamp(self.energy - f64::from(cost));
        self.mark_activity(now);
    }

    /// A reply served without the LLM.
    pub fn after_quick_response(&mut self, now: DateTime<Utc>) {
        self.energy = clamp(self.energy - QUICK_RESPONSE_COST);
        self.mark_activity(now);
    }

    pub fn api_error(&mut self, rate_limited: bool, now: DateTime<Utc>) {
        self.api_errors += 1;
        let mut stress = API_ERROR_STRESS;
        if rate_limited {
            stress += RATE_LIMIT_STRESS;
            self.last_rate_limit = Some(now);
        }
        self.stress = clamp(self.stress + stress);
    }

    pub fn processing_error(&mut self) {
        self.stress = clamp(self.stress + PROCESSING_ERROR_STRESS);
    }

    pub fn budget_reset_relief(&mut self) {
        self.stress = clamp(self.stress - BUDGET_RESET_RELIEF);
    }

    /// The cooldown reply was shown.
    pub fn cooldown_surfaced(&mut self) {
        self.stress = clamp(self.stress - COOLDOWN_RELIEF);
    }

    fn mark_activity(&mut self, now: DateTime<Utc>) {
        self.last_exchange = now;
        self.idle_bonus_given = false;
    }
}

impl Default for MoodState {
    fn default() -> Self {
        Self::new(Utc::now())
    }
}

fn clamp(v: f64) -> f64 {
    v.clamp(MIN, MAX)
}
