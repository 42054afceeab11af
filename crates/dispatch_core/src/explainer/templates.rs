//! Handlebars-backed text rendering for the Explainer (§4.7).

use handlebars::Handlebars;
use serde_json::json;

use crate::model::ExplanationCategory;
use super::{delta_pct, ExplanationInput};

const DRIVER_TEMPLATE: &str = "driver";
const ADMIN_TEMPLATE: &str = "admin";

pub struct Renderer {
    handlebars: Handlebars<'static>,
}

impl Renderer {
    pub fn new() -> Self {
        let mut handlebars = Handlebars::new();
        handlebars.set_strict_mode(false);
        handlebars
            .register_template_string(
                DRIVER_TEMPLATE,
                "Today you're assigned a route with {{num_packages}} packages ({{total_weight_kg}} kg, \
                 {{num_stops}} stops, about {{estimated_time_minutes}} minutes).{{#if is_recovery_day}} \
                 This is a lighter recovery-day route.{{/if}}{{#if swap_applied}} We adjusted your route \
                 after your request.{{/if}}",
            )
            .expect("driver template compiles");
        handlebars
            .register_template_string(
                ADMIN_TEMPLATE,
                "[{{category}}] effort={{effort}} ({{delta_pct}}% vs avg), rank {{rank}}/{{num_drivers}}. \
                 Route: {{num_packages}} pkgs, {{total_weight_kg}}kg, {{num_stops}} stops, \
                 {{estimated_time_minutes}}min.{{#if breakdown}} Composition: physical {{breakdown.physical_pct}}%, \
                 complexity {{breakdown.complexity_pct}}%, time {{breakdown.time_pct}}%.{{/if}} \
                 Fairness: gini={{gini}}, std={{std_dev}}, max_gap={{max_gap}}.\
                 {{#if is_recovery_day}} Recovery day with {{recovery_hard_days}} hard days.{{/if}}\
                 {{#if swap_applied}} Swap applied.{{/if}}\
                 {{#if counter_without_swap}} Counter without swap — flagged.{{/if}}\
                 {{#if manual_override}} Manual admin override.{{/if}}\
                 {{#if ev_overhead}} EV overhead {{ev_overhead}} points.{{/if}}\
                 {{#if complexity_debt}} Complexity debt {{complexity_debt}} (threshold 2.0).{{/if}}\
                 {{#if model_version}} Personalized model v{{model_version}} (MSE {{model_mse}}).{{/if}}",
            )
            .expect("admin template compiles");
        Self { handlebars }
    }

    pub fn render_driver_text(&self, input: &ExplanationInput<'_>, category: ExplanationCategory) -> String {
        let data = json!({
            "category": format!("{:?}", category),
            "num_packages": input.num_packages,
            "total_weight_kg": input.total_weight_kg,
            "num_stops": input.num_stops,
            "estimated_time_minutes": input.estimated_time_minutes,
            "is_recovery_day": input.is_recovery_day,
            "swap_applied": input.swap_applied,
        });
        self.handlebars.render(DRIVER_TEMPLATE, &data).unwrap_or_default()
    }

    pub fn render_admin_text(&self, input: &ExplanationInput<'_>, category: ExplanationCategory) -> String {
        let breakdown = input.breakdown.map(|b| {
            let total = b.total.max(0.0001);
            json!({
                "physical_pct": ((b.physical_effort / total) * 100.0 * 10.0).round() / 10.0,
                "complexity_pct": ((b.route_complexity / total) * 100.0 * 10.0).round() / 10.0,
                "time_pct": ((b.time_pressure / total) * 100.0 * 10.0).round() / 10.0,
            })
        });
        let counter_without_swap = category == ExplanationCategory::HeavyNoSwap;

        let data = json!({
            "category": format!("{:?}", category),
            "effort": input.effort,
            "delta_pct": (delta_pct(input.effort, input.avg_effort) * 10.0).round() / 10.0,
            "rank": input.rank,
            "num_drivers": input.num_drivers,
            "num_packages": input.num_packages,
            "total_weight_kg": input.total_weight_kg,
            "num_stops": input.num_stops,
            "estimated_time_minutes": input.estimated_time_minutes,
            "breakdown": breakdown,
            "gini": input.gini,
            "std_dev": input.std_dev,
            "max_gap": input.max_gap,
            "is_recovery_day": input.is_recovery_day,
            "recovery_hard_days": input.recovery_hard_days,
            "swap_applied": input.swap_applied,
            "counter_without_swap": counter_without_swap,
            "manual_override": input.manual_override,
            "ev_overhead": input.ev_overhead,
            "complexity_debt": input.complexity_debt,
            "model_version": input.personalized_model_version,
            "model_mse": input.personalized_model_mse,
        });
        self.handlebars.render(ADMIN_TEMPLATE, &data).unwrap_or_default()
    }
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new()
    }
}
