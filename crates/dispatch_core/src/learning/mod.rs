//! Service H — Learning Agent (§4.9).

pub mod bandit;
pub mod regressor;

use chrono::Utc;
use rand::Rng;

use crate::config::FairnessConfig;
use crate::model::{DriverFeedback, LearningEpisode, RunId};
use bandit::{hash_config, ArmPriors, FairnessBandit, SelectedArm};

pub struct LearningAgent {
    bandit: FairnessBandit,
}

impl LearningAgent {
    pub fn new() -> Self {
        Self { bandit: FairnessBandit::new() }
    }

    pub fn select_arm<R: Rng>(&self, priors: &ArmPriors, experimental: bool, rng: &mut R) -> SelectedArm {
        self.bandit.select_arm(priors, experimental, rng)
    }

    pub fn arm_index_of(&self, config: &FairnessConfig) -> i32 {
        self.bandit.arm_index_of(config)
    }

    /// Builds a `LearningEpisode` at the end of a successful allocation
    /// run. `episode_reward` is left `None`; it is filled in later,
    /// out-of-band, by `compute_reward` + a bandit update.
    pub fn create_episode<R: Rng>(
        &self,
        run_id: RunId,
        config: &FairnessConfig,
        num_drivers: usize,
        num_routes: usize,
        priors: &ArmPriors,
        rng: &mut R,
    ) -> LearningEpisode {
        let config_hash = hash_config(config);
        let arm_index = self.arm_index_of(config);
        let (alpha_prior, beta_prior, samples) = if arm_index >= 0 {
            let idx = arm_index as usize;
            (priors.alpha[idx], priors.beta[idx], priors.samples[idx])
        } else {
            (1.0, 1.0, 0)
        };

        LearningEpisode {
            run_id,
            config_hash,
            config_snapshot: serde_json::to_value(config).unwrap_or(serde_json::Value::Null),
            arm_index,
            num_drivers,
            num_routes,
            alpha_prior,
            beta_prior,
            samples_at_selection: samples,
            is_experimental: rng.gen_bool(0.10),
            episode_reward: None,
            created_at: Utc::now(),
        }
    }
}

impl Default for LearningAgent {
    fn default() -> Self {
        Self::new()
    }
}

/// Reward computation (§4.9, out-of-band ≥24h later). Neutral 0.5 is used
/// per missing feedback component. Clamped to [0,1].
pub fn compute_reward(feedback: &[DriverFeedback]) -> f64 {
    if feedback.is_empty() {
        return 0.5;
    }

    let fairness_ratings: Vec<f64> = feedback.iter().filter_map(|f| f.fairness_rating).map(|r| r as f64).collect();
    let avg_fairness_normalized = if fairness_ratings.is_empty() {
        0.5
    } else {
        let avg = fairness_ratings.iter().sum::<f64>() / fairness_ratings.len() as f64;
        (avg - 1.0) / 4.0
    };

    let stress_levels: Vec<f64> = feedback.iter().filter_map(|f| f.stress_level).map(|s| s as f64).collect();
    let avg_stress = if stress_levels.is_empty() {
        5.0
    } else {
        stress_levels.iter().sum::<f64>() / stress_levels.len() as f64
    };

    let completion_rate = feedback.iter().filter(|f| f.completed).count() as f64 / feedback.len() as f64;

    let tiredness_levels: Vec<f64> = feedback.iter().filter_map(|f| f.tiredness_level).map(|t| t as f64).collect();
    let avg_tiredness = if tiredness_levels.is_empty() {
        2.5
    } else {
        tiredness_levels.iter().sum::<f64>() / tiredness_levels.len() as f64
    };

    let reward = 0.4 * avg_fairness_normalized
        + 0.3 * (1.0 - avg_stress / 10.0)
        + 0.2 * completion_rate
        + 0.1 * (1.0 - avg_tiredness / 5.0);

    reward.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DriverId;

    #[test]
    fn missing_feedback_yields_neutral_reward() {
        assert_eq!(compute_reward(&[]), 0.5);
    }

    #[test]
    fn good_feedback_yields_high_reward() {
        let feedback = vec![DriverFeedback {
            driver_id: DriverId::new(),
            fairness_rating: Some(5),
            stress_level: Some(1),
            tiredness_level: Some(1),
            completed: true,
        }];
        let reward = compute_reward(&feedback);
        assert!(reward > 0.8);
    }

    #[test]
    fn reward_is_always_clamped_to_unit_interval() {
        let feedback = vec![DriverFeedback {
            driver_id: DriverId::new(),
            fairness_rating: Some(1),
            stress_level: Some(10),
            tiredness_level: Some(5),
            completed: false,
        }];
        let reward = compute_reward(&feedback);
        assert!((0.0..=1.0).contains(&reward));
    }
}
