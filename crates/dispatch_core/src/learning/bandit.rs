//! (H1) Fairness bandit — Thompson sampling over a discretized fairness-
//! config arm space (§4.9).

use std::collections::HashMap;

use rand::Rng;
use rand_distr::{Beta, Distribution};
use sha2::{Digest, Sha256};

use crate::config::FairnessConfig;

const GINI_OPTIONS: [f64; 3] = [0.28, 0.33, 0.38];
const STDDEV_OPTIONS: [f64; 3] = [20.0, 25.0, 30.0];
const RECOVERY_OPTIONS: [f64; 3] = [0.6, 0.7, 0.8];
const EV_PENALTY_OPTIONS: [f64; 3] = [0.2, 0.3, 0.4];

/// Deterministic, order-insensitive hash of a config (mirrors the
/// original's `hashlib.sha256(str(sorted(config.items())))`, rebuilt here
/// over a fixed, sorted field list rather than a dynamic dict).
pub fn hash_config(config: &FairnessConfig) -> String {
    let mut fields = vec![
        ("complexity_debt_hard_threshold", config.complexity_debt_hard_threshold),
        ("ev_charging_penalty_weight", config.ev_charging_penalty_weight),
        ("ev_safety_margin_pct", config.ev_safety_margin_pct),
        ("gini_threshold", config.gini_threshold),
        ("max_gap_threshold", config.max_gap_threshold),
        ("recovery_lightening_factor", config.recovery_lightening_factor),
        ("recovery_penalty_weight", config.recovery_penalty_weight),
        ("stddev_threshold", config.stddev_threshold),
        ("workload_weight_difficulty", config.workload_weight_difficulty),
        ("workload_weight_packages", config.workload_weight_packages),
        ("workload_weight_time", config.workload_weight_time),
        ("workload_weight_weight_kg", config.workload_weight_weight_kg),
    ];
    fields.sort_by_key(|(name, _)| *name);
    let serialized: String = fields.iter().map(|(name, value)| format!("{name}={value:.6}")).collect::<Vec<_>>().join(",");

    let mut hasher = Sha256::new();
    hasher.update(serialized.as_bytes());
    let digest = hasher.finalize();
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

/// The Cartesian product of the four discretized knobs: 81 arms.
pub fn arm_space() -> Vec<FairnessConfig> {
    let mut arms = Vec::with_capacity(81);
    for &gini in &GINI_OPTIONS {
        for &stddev in &STDDEV_OPTIONS {
            for &recovery in &RECOVERY_OPTIONS {
                for &ev_penalty in &EV_PENALTY_OPTIONS {
                    arms.push(FairnessConfig {
                        gini_threshold: gini,
                        stddev_threshold: stddev,
                        recovery_lightening_factor: recovery,
                        ev_charging_penalty_weight: ev_penalty,
                        ..FairnessConfig::default()
                    });
                }
            }
        }
    }
    arms
}

/// Per-arm observed priors, aggregated by the caller from committed
/// episodes in a 30-day window (§4.9).
#[derive(Debug, Clone)]
pub struct ArmPriors {
    pub alpha: Vec<f64>,
    pub beta: Vec<f64>,
    pub samples: Vec<u64>,
}

impl ArmPriors {
    pub fn uniform(num_arms: usize) -> Self {
        Self { alpha: vec![1.0; num_arms], beta: vec![1.0; num_arms], samples: vec![0; num_arms] }
    }

    /// Folds one reward observation into arm `idx` (§4.9 Update).
    pub fn record_reward(&mut self, idx: usize, reward: f64) {
        let r = reward.clamp(0.0, 1.0);
        self.alpha[idx] += r;
        self.beta[idx] += 1.0 - r;
        self.samples[idx] += 1;
    }
}

pub struct FairnessBandit {
    arms: Vec<FairnessConfig>,
}

pub struct SelectedArm {
    pub config: FairnessConfig,
    pub arm_index: usize,
    pub alpha_prior: f64,
    pub beta_prior: f64,
    pub samples_at_selection: u64,
}

impl FairnessBandit {
    pub fn new() -> Self {
        Self { arms: arm_space() }
    }

    pub fn arms(&self) -> &[FairnessConfig] {
        &self.arms
    }

    /// Thompson-sampling arm selection. `experimental` adds a small
    /// exploration bonus proportional to under-sampling.
    pub fn select_arm<R: Rng>(&self, priors: &ArmPriors, experimental: bool, rng: &mut R) -> SelectedArm {
        let total_samples: u64 = priors.samples.iter().sum();
        let mut best_idx = 0;
        let mut best_theta = f64::NEG_INFINITY;

        for idx in 0..self.arms.len() {
            let beta_dist = Beta::new(priors.alpha[idx], priors.beta[idx]).expect("positive alpha/beta");
            let mut theta = beta_dist.sample(rng);

            if experimental {
                let bonus = 0.1 * ((1.0 + total_samples as f64).ln()) / (priors.samples[idx] as f64 + 1.0);
                theta += bonus;
            }

            if theta > best_theta {
                best_theta = theta;
                best_idx = idx;
            }
        }

        SelectedArm {
            config: self.arms[best_idx],
            arm_index: best_idx,
            alpha_prior: priors.alpha[best_idx],
            beta_prior: priors.beta[best_idx],
            samples_at_selection: priors.samples[best_idx],
        }
    }

    /// Index of `config` in the arm space, if it matches one exactly on
    /// the four discretized knobs; `-1` otherwise (§4.9 episode lifecycle).
    pub fn arm_index_of(&self, config: &FairnessConfig) -> i32 {
        self.arms
            .iter()
            .position(|arm| {
                arm.gini_threshold == config.gini_threshold
                    && arm.stddev_threshold == config.stddev_threshold
                    && arm.recovery_lightening_factor == config.recovery_lightening_factor
                    && arm.ev_charging_penalty_weight == config.ev_charging_penalty_weight
            })
            .map(|i| i as i32)
            .unwrap_or(-1)
    }
}

impl Default for FairnessBandit {
    fn default() -> Self {
        Self::new()
    }
}

/// Aggregates rewards from committed episodes (within the caller-selected
/// window) into per-arm priors, `α[k] = 1 + Σ rewards`, `β[k] = 1 + Σ(1−r)`.
pub fn load_priors(num_arms: usize, episode_arm_and_reward: &[(usize, f64)]) -> ArmPriors {
    let mut priors = ArmPriors::uniform(num_arms);
    for &(arm_idx, reward) in episode_arm_and_reward {
        if arm_idx < num_arms {
            priors.record_reward(arm_idx, reward);
        }
    }
    priors
}
