//! Decision Log Sink (§3 `DecisionLogEntry`, §6.1, §6.2 timeline, §8
//! invariant 8: entries must arrive in fixed agent order).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::RunId;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionLogEntry {
    pub run_id: RunId,
    pub agent_name: String,
    pub step_type: String,
    pub input_snapshot: serde_json::Value,
    pub output_snapshot: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

impl DecisionLogEntry {
    pub fn new(
        run_id: RunId,
        agent_name: impl Into<String>,
        step_type: impl Into<String>,
        input_snapshot: serde_json::Value,
        output_snapshot: serde_json::Value,
    ) -> Self {
        Self {
            run_id,
            agent_name: agent_name.into(),
            step_type: step_type.into(),
            input_snapshot,
            output_snapshot,
            timestamp: Utc::now(),
        }
    }

    /// Human string for `timeline()` (§6.2), built by a fixed rule table
    /// rather than free-form generation.
    pub fn short_message(&self) -> String {
        match (self.agent_name.as_str(), self.step_type.as_str()) {
            ("ML_EFFORT", "MATRIX_GENERATION") => {
                let drivers = self.output_snapshot.get("num_drivers").and_then(|v| v.as_u64()).unwrap_or(0);
                let routes = self.output_snapshot.get("num_routes").and_then(|v| v.as_u64()).unwrap_or(0);
                format!("Computed effort matrix for {drivers} drivers × {routes} routes")
            }
            ("ROUTE_PLANNER", "PROPOSAL_1") => "Generated initial assignment proposal".to_string(),
            ("ROUTE_PLANNER", "PROPOSAL_2") => "Generated re-optimized assignment proposal".to_string(),
            ("FAIRNESS_MANAGER", "FAIRNESS_CHECK_PROPOSAL_1") => "Evaluated fairness of initial proposal".to_string(),
            ("FAIRNESS_MANAGER", "FAIRNESS_CHECK_PROPOSAL_2") => "Evaluated fairness of re-optimized proposal".to_string(),
            ("DRIVER_LIAISON", "LIAISON_DECISIONS") => "Collected per-driver liaison decisions".to_string(),
            ("FINAL_RESOLVER", "SWAP_RESOLUTION") => "Resolved liaison counters via swaps".to_string(),
            ("EXPLAINABILITY", "EXPLANATIONS_GENERATED") => "Generated driver and admin explanations".to_string(),
            ("RECOVERY_BOOKKEEPER", "RECOVERY_TARGETS") => "Computed per-driver recovery targets".to_string(),
            ("RECOVERY_BOOKKEEPER", "DAILY_STATS_UPDATED") => "Updated daily complexity-debt stats".to_string(),
            ("LEARNING_AGENT", "EPISODE_CREATED") => "Recorded a learning episode".to_string(),
            _ => format!("{}/{}", self.agent_name, self.step_type),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn short_message_uses_fixed_rule_table() {
        let entry = DecisionLogEntry::new(
            RunId::new(),
            "ML_EFFORT",
            "MATRIX_GENERATION",
            json!({}),
            json!({"num_drivers": 3, "num_routes": 4}),
        );
        assert_eq!(entry.short_message(), "Computed effort matrix for 3 drivers × 4 routes");
    }

    #[test]
    fn unknown_step_falls_back_to_agent_slash_step() {
        let entry = DecisionLogEntry::new(RunId::new(), "X", "Y", json!({}), json!({}));
        assert_eq!(entry.short_message(), "X/Y");
    }
}
