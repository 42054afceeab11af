//! Fairness/effort/EV configuration.
//!
//! Mirrors the source's single-active-row `FairnessConfig` (the active row
//! is read through the `Store` collaborator, §6.1; the core never reads a
//! config file itself, following the teacher's `scenario::params` pattern
//! of plain structs with hand-written `Default` impls rather than pulling
//! in a config-file crate).

use serde::{Deserialize, Serialize};

/// Weights for the Effort Model's formula (§4.2): α, β, γ, δ, ε.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EffortWeights {
    pub alpha_packages: f64,
    pub beta_weight_kg: f64,
    pub gamma_difficulty: f64,
    pub delta_time: f64,
    pub epsilon_capacity_mismatch: f64,
}

impl Default for EffortWeights {
    fn default() -> Self {
        Self {
            alpha_packages: 1.0,
            beta_weight_kg: 0.5,
            gamma_difficulty: 10.0,
            delta_time: 0.2,
            epsilon_capacity_mismatch: 15.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EvConfig {
    pub charging_penalty_weight: f64,
    pub safety_margin_pct: f64,
}

impl Default for EvConfig {
    fn default() -> Self {
        Self {
            charging_penalty_weight: 0.3,
            safety_margin_pct: 10.0,
        }
    }
}

/// Fairness thresholds, recovery knobs, and EV config, as a single active
/// row (source: `app/models/fairness_config.py`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FairnessConfig {
    pub workload_weight_packages: f64,
    pub workload_weight_weight_kg: f64,
    pub workload_weight_difficulty: f64,
    pub workload_weight_time: f64,

    pub gini_threshold: f64,
    pub stddev_threshold: f64,
    pub max_gap_threshold: f64,

    pub recovery_mode_enabled: bool,
    pub complexity_debt_hard_threshold: f64,
    pub recovery_lightening_factor: f64,
    pub recovery_penalty_weight: f64,

    pub ev_charging_penalty_weight: f64,
    pub ev_safety_margin_pct: f64,
}

impl Default for FairnessConfig {
    fn default() -> Self {
        Self {
            workload_weight_packages: 1.0,
            workload_weight_weight_kg: 0.5,
            workload_weight_difficulty: 10.0,
            workload_weight_time: 0.2,

            gini_threshold: 0.33,
            stddev_threshold: 25.0,
            max_gap_threshold: 25.0,

            recovery_mode_enabled: false,
            complexity_debt_hard_threshold: 2.0,
            recovery_lightening_factor: 0.7,
            recovery_penalty_weight: 3.0,

            ev_charging_penalty_weight: 0.3,
            ev_safety_margin_pct: 10.0,
        }
    }
}

impl FairnessConfig {
    pub fn effort_weights(&self) -> EffortWeights {
        EffortWeights {
            alpha_packages: self.workload_weight_packages,
            beta_weight_kg: self.workload_weight_weight_kg,
            gamma_difficulty: self.workload_weight_difficulty,
            delta_time: self.workload_weight_time,
            ..EffortWeights::default()
        }
    }

    pub fn ev_config(&self) -> EvConfig {
        EvConfig {
            charging_penalty_weight: self.ev_charging_penalty_weight,
            safety_margin_pct: self.ev_safety_margin_pct,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let c = FairnessConfig::default();
        assert_eq!(c.gini_threshold, 0.33);
        assert_eq!(c.stddev_threshold, 25.0);
        assert_eq!(c.max_gap_threshold, 25.0);
        assert_eq!(c.recovery_lightening_factor, 0.7);
        assert_eq!(c.complexity_debt_hard_threshold, 2.0);
        assert!(!c.recovery_mode_enabled);
    }
}
