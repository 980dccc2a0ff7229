//! The budget ladder: usage ratio in, response parameters out.

use serde::Serialize;
use thriftbot_config::AppConfig;

const TIGHT_MAX_TOKENS: u32 = 500;
const TIGHT_MAX_HISTORY: usize = 5;
const LEAN_MAX_TOKENS: u32 = 1024;
const LEAN_MAX_HISTORY: usize = 10;
const HALF_MAX_HISTORY: usize = 20;

/// Parameters for one LLM request, recomputed from the budget every time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BudgetAwareParams {
    pub model: String,
    pub max_tokens: u32,
    pub max_history: usize,
    pub should_block: bool,
}

/// Models and unthrottled limits the ladder works from.
#[derive(Debug, Clone)]
pub struct ModelTiers {
    pub normal: String,
    pub fallback: String,
    /// Upgrade target for attachments or tool use. `None` disables upgrades.
    pub capable: Option<String>,
    pub max_tokens: u32,
    pub max_history: usize,
}

impl ModelTiers {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            normal: config.models.default.clone(),
            fallback: config.models.fallback.clone(),
            capable: config.models.capable.clone(),
            max_tokens: config.default_max_tokens,
            max_history: config.session.max_history,
        }
    }

    /// Parameters for a usage ratio. Tiers are checked from the top.
    ///
    /// Reduced tiers never exceed the unthrottled limits, so a small
    /// configured `max_tokens` keeps the ladder monotonic.
    pub fn params_for(&self, ratio: f64) -> BudgetAwareParams {
        let (model, max_tokens, max_history, should_block) = if ratio >= 1.0 {
            (&self.normal, self.max_tokens, self.max_history, true)
        } else if ratio >= 0.9 {
            (
                &self.fallback,
                TIGHT_MAX_TOKENS.min(self.max_tokens),
                TIGHT_MAX_HISTORY.min(self.max_history),
                false,
            )
        } else if ratio >= 0.75 {
            (
                &self.normal,
                LEAN_MAX_TOKENS.min(self.max_tokens),
                LEAN_MAX_HISTORY.min(self.max_history),
                false,
            )
        } else if ratio >= 0.5 {
            (
                &self.normal,
                self.max_tokens,
                HALF_MAX_HISTORY.min(self.max_history),
                false,
            )
        } else {
            (&self.normal, self.max_tokens, self.max_history, false)
        };

        BudgetAwareParams {
            model: model.clone(),
            max_tokens,
            max_history,
            should_block,
        }
    }

    /// Swap in the capable model for requests with attachments or tools.
    pub fn upgrade(&self, mut params: BudgetAwareParams, traits: RequestTraits) -> BudgetAwareParams {
        if params.should_block || !(traits.has_attachments || traits.uses_tools) {
            return params;
        }
        if let Some(capable) = &self.capable {
            params.model = capable.clone();
        }
        params
    }
}

/// What a request carries, as far as the upgrade hook cares.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestTraits {
    pub has_attachments: bool,
    pub uses_tools: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiers() -> ModelTiers {
        ModelTiers {
            normal: "sonnet".into(),
            fallback: "haiku".into(),
            capable: Some("opus".into()),
            max_tokens: 2048,
            max_history: 40,
        }
    }

    #[test]
    fn ninety_two_percent_uses_fallback() {
        let p = tiers().params_for(0.92);
        assert_eq!(p.model, "haiku");
        assert_eq!(p.max_tokens, 500);
        assert_eq!(p.max_history, 5);
        assert!(!p.should_block);
    }

    #[test]
    fn full_usage_blocks() {
        assert!(tiers().params_for(1.0).should_block);
        assert!(tiers().params_for(1.7).should_block);
        assert!(!tiers().params_for(0.9999).should_block);
    }

    #[test]
    fn each_tier() {
        let t = tiers();
        assert_eq!(t.params_for(0.8).max_tokens, 1024);
        assert_eq!(t.params_for(0.8).max_history, 10);
        assert_eq!(t.params_for(0.6).max_tokens, 2048);
        assert_eq!(t.params_for(0.6).max_history, 20);
        assert_eq!(t.params_for(0.1), BudgetAwareParams {
            model: "sonnet".into(),
            max_tokens: 2048,
            max_history: 40,
            should_block: false,
        });
    }

    #[test]
    fn ladder_is_monotonic() {
        for t in [tiers(), ModelTiers { max_tokens: 300, max_history: 3, ..tiers() }] {
            let ratios: Vec<f64> = (0..=120).map(|i| i as f64 / 100.0).collect();
            for pair in ratios.windows(2) {
                let (lo, hi) = (t.params_for(pair[0]), t.params_for(pair[1]));
                if hi.should_block {
                    continue;
                }
                assert!(lo.max_tokens >= hi.max_tokens, "max_tokens at {pair:?}");
                assert!(lo.max_history >= hi.max_history, "max_history at {pair:?}");
            }
            for r in &ratios {
                assert_eq!(t.params_for(*r).should_block, *r >= 1.0);
            }
        }
    }

    #[test]
    fn upgrade_for_attachments_and_tools() {
        let t = tiers();
        let base = t.params_for(0.1);

        let plain = t.upgrade(base.clone(), RequestTraits::default());
        assert_eq!(plain.model, "sonnet");

        let with_image = t.upgrade(base.clone(), RequestTraits { has_attachments: true, uses_tools: false });
        assert_eq!(with_image.model, "opus");

        let with_tools = t.upgrade(base, RequestTraits { has_attachments: false, uses_tools: true });
        assert_eq!(with_tools.model, "opus");
    }

    #[test]
    fn no_upgrade_when_blocked_or_unconfigured() {
        let t = tiers();
        let traits = RequestTraits { has_attachments: true, uses_tools: true };
        let blocked = t.upgrade(t.params_for(1.0), traits);
        assert_eq!(blocked.model, "sonnet");

        let plain = ModelTiers { capable: None, ..tiers() };
        assert_eq!(plain.upgrade(plain.params_for(0.0), traits).model, "sonnet");
    }
}
