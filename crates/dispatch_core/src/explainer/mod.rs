//! Agent F — Explainer (§4.7).
//!
//! Deterministic, template-based. Category selection is pure data logic;
//! rendering goes through `handlebars` templates (§0 ambient stack,
//! grounded on `ProdByBuddha-rust_agency`'s use of the same crate for
//! structured-context-to-text rendering).

mod templates;

use crate::model::{EffortBreakdown, ExplanationCategory, ExplanationPair, LiaisonVerdict};
use templates::Renderer;

/// Everything the Explainer needs about one driver's final assignment.
pub struct ExplanationInput<'a> {
    pub driver_id: crate::model::DriverId,
    pub driver_name: &'a str,
    pub effort: f64,
    pub avg_effort: f64,
    pub rank: usize,
    pub num_drivers: usize,
    pub breakdown: Option<EffortBreakdown>,
    pub gini: f64,
    pub std_dev: f64,
    pub max_gap: f64,
    pub num_packages: u32,
    pub total_weight_kg: f64,
    pub num_stops: u32,
    pub estimated_time_minutes: f64,
    pub is_recovery_day: bool,
    pub recovery_hard_days: u32,
    pub swap_applied: bool,
    pub liaison_verdict: LiaisonVerdict,
    pub ev_overhead: Option<f64>,
    pub complexity_debt: Option<f64>,
    pub personalized_model_version: Option<u32>,
    pub personalized_model_mse: Option<f64>,
    pub history_hard_days_last_7: u32,
    pub manual_override: bool,
}

pub struct Explainer {
    renderer: Renderer,
}

impl Explainer {
    pub fn new() -> Self {
        Self { renderer: Renderer::new() }
    }

    pub fn explain(&self, input: &ExplanationInput<'_>) -> ExplanationPair {
        let category = classify(input);
        let driver_text = self.renderer.render_driver_text(input, category);
        let admin_text = self.renderer.render_admin_text(input, category);
        ExplanationPair { driver_id: input.driver_id, driver_text, admin_text, category }
    }
}

impl Default for Explainer {
    fn default() -> Self {
        Self::new()
    }
}

/// Delta bands: NEAR if |delta|<=10, ABOVE if >10, BELOW if <-10.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Band {
    Near,
    Above,
    Below,
}

fn delta_band(effort: f64, avg: f64) -> (f64, Band) {
    if avg == 0.0 {
        return (0.0, Band::Near);
    }
    let delta_pct = (effort - avg) / avg * 100.0;
    let band = if delta_pct.abs() <= 10.0 {
        Band::Near
    } else if delta_pct > 10.0 {
        Band::Above
    } else {
        Band::Below
    };
    (delta_pct, band)
}

fn classify(input: &ExplanationInput<'_>) -> ExplanationCategory {
    let (_, band) = delta_band(input.effort, input.avg_effort);

    if let (Some(_version), Some(mse)) = (input.personalized_model_version, input.personalized_model_mse) {
        if mse < 15.0 {
            return ExplanationCategory::LearningOptimized;
        }
    }
    if input.is_recovery_day {
        return ExplanationCategory::Recovery;
    }
    if band == Band::Above && input.swap_applied {
        return ExplanationCategory::HeavyWithSwap;
    }
    if band == Band::Above
        && matches!(input.liaison_verdict, LiaisonVerdict::Counter | LiaisonVerdict::ForceAccept)
    {
        return ExplanationCategory::HeavyNoSwap;
    }
    if band == Band::Above {
        return ExplanationCategory::Heavy;
    }
    if band == Band::Below && input.history_hard_days_last_7 >= 2 {
        return ExplanationCategory::LightRecovery;
    }
    if band == Band::Below {
        return ExplanationCategory::Light;
    }
    ExplanationCategory::NearAvg
}

pub(crate) fn delta_pct(effort: f64, avg: f64) -> f64 {
    delta_band(effort, avg).0
}
