//! Spending and mood for thriftbot.
//!
//! - [`TokenBudget`]: daily token ceiling with a local-midnight reset
//! - [`ModelTiers`]: the budget ladder and the capable-model upgrade
//! - [`MoodState`]: energy, stress and curiosity
//! - [`Vitals`]: the shared owner of budget and mood

pub mod budget;
pub mod ladder;
pub mod mood;
pub mod vitals;

pub use budget::TokenBudget;
pub use ladder::{BudgetAwareParams, ModelTiers, RequestTraits};
pub use mood::{Feeling, MoodState, OVERLOAD_STRESS};
pub use vitals::{Vitals, VitalsSnapshot};
