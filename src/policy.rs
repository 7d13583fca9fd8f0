use crate::errors::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

const MIN_WEIGHT: f64 = 0.0;
const MAX_WEIGHT: f64 = 10.0;
const MAX_PENALTY_POINTS: f64 = 50.0;
const MIN_PACING_TOLERANCE_PCT: f64 = 1.0;
const MAX_PACING_TOLERANCE_PCT: f64 = 100.0;

pub const POLICY_FILE_NAME: &str = "health-policy.yaml";

/// Weights and thresholds behind the health score and budget pacing labels.
///
/// The score is `100 * weighted(on_time_ratio, budget_ratio)` minus fixed
/// point penalties per blocked and per overdue deliverable, clamped to
/// `[0, 100]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HealthPolicy {
    pub on_time_weight: f64,
    pub budget_weight: f64,
    pub blocked_penalty: f64,
    pub overdue_penalty: f64,
    /// Allowed gap, in percentage points, between spend and elapsed schedule
    /// before pacing is labelled under/over.
    pub pacing_tolerance_pct: f64,
}

impl Default for HealthPolicy {
    fn default() -> Self {
        Self {
            on_time_weight: 0.6,
            budget_weight: 0.4,
            blocked_penalty: 5.0,
            overdue_penalty: 3.0,
            pacing_tolerance_pct: 10.0,
        }
    }
}

impl HealthPolicy {
    /// Clamps every field into its supported range. Non-finite values fall
    /// back to the default for that field.
    pub fn normalized(&self) -> Self {
        let defaults = Self::default();
        let pick = |value: f64, fallback: f64, min: f64, max: f64| {
            if value.is_finite() {
                value.clamp(min, max)
            } else {
                fallback
            }
        };

        let mut policy = Self {
            on_time_weight: pick(self.on_time_weight, defaults.on_time_weight, MIN_WEIGHT, MAX_WEIGHT),
            budget_weight: pick(self.budget_weight, defaults.budget_weight, MIN_WEIGHT, MAX_WEIGHT),
            blocked_penalty: pick(self.blocked_penalty, defaults.blocked_penalty, 0.0, MAX_PENALTY_POINTS),
            overdue_penalty: pick(self.overdue_penalty, defaults.overdue_penalty, 0.0, MAX_PENALTY_POINTS),
            pacing_tolerance_pct: pick(
                self.pacing_tolerance_pct,
                defaults.pacing_tolerance_pct,
                MIN_PACING_TOLERANCE_PCT,
                MAX_PACING_TOLERANCE_PCT,
            ),
        };
        if policy.on_time_weight + policy.budget_weight <= f64::EPSILON {
            policy.on_time_weight = defaults.on_time_weight;
            policy.budget_weight = defaults.budget_weight;
        }
        policy
    }

    pub fn from_yaml_str(raw: &str) -> AppResult<Self> {
        let parsed: Self = serde_yaml::from_str(raw)?;
        Ok(parsed.normalized())
    }

    /// Reads an override file if present. A missing file is not an error.
    pub fn load_override(dir: &Path) -> AppResult<Option<Self>> {
        let path = dir.join(POLICY_FILE_NAME);
        if !path.exists() {
            return Ok(None);
        }
        let raw = std::fs::read_to_string(&path).map_err(|error| {
            AppError::Io(format!("failed to read {}: {}", path.display(), error))
        })?;
        Self::from_yaml_str(&raw).map(Some)
    }
}
