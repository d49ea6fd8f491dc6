use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Condition type reporting whether the database workload is serving.
pub const CONDITION_RUNNING: &str = "Running";

#[derive(Serialize, Deserialize, Debug, Clone, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    #[serde(rename = "type")]
    pub type_: String,
    pub status: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub last_transition_time: DateTime<Utc>,
}

/// Ordered set of conditions keyed by `type`.
#[derive(Serialize, Deserialize, Debug, Clone, Default, JsonSchema, PartialEq)]
#[serde(transparent)]
pub struct Conditions(pub Vec<Condition>);

impl Conditions {
    pub fn get(&self, type_: &str) -> Option<&Condition> {
        self.0.iter().find(|c| c.type_ == type_)
    }

    pub fn is_true_for(&self, type_: &str) -> bool {
        self.get(type_).map(|c| c.status).unwrap_or(false)
    }

    pub fn is_empty(&self) -> bool { self.0.is_empty() }

    /// Upserts a condition. `lastTransitionTime` only moves when `status` flips.
    /// Returns true when anything stored changed.
    pub fn set(&mut self, type_: &str, status: bool, reason: &str, now: DateTime<Utc>) -> bool {
        match self.0.iter_mut().find(|c| c.type_ == type_) {
            Some(existing) => {
                let mut changed = false;
                if existing.status != status {
                    existing.status = status;
                    existing.last_transition_time = now;
                    changed = true;
                }
                if existing.reason.as_deref() != Some(reason) {
                    existing.reason = Some(reason.to_string());
                    changed = true;
                }
                changed
            }
            None => {
                self.0.push(Condition { type_: type_.to_string(), status, reason: Some(reason.to_string()), last_transition_time: now });
                true
            }
        }
    }
}
