use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use strum::{Display, EnumString};
use uuid::Uuid;
use validator::Validate;

use super::ticket::Priority;
use crate::error::{AppError, Result};

/// SLA policy: target durations per priority level
///
/// Owned by an organization; referenced, never mutated, by the SLA engine.
/// All durations are whole seconds.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SlaPolicy {
    pub id: Uuid,

    pub organization_id: Uuid,

    #[validate(length(min = 1, max = 255))]
    pub name: String,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    /// First-response targets keyed by priority (seconds)
    pub response_targets: HashMap<Priority, i64>,

    /// Resolution targets keyed by priority (seconds)
    pub resolution_targets: HashMap<Priority, i64>,

    /// Remaining business time below which status becomes warning (seconds)
    pub warning_threshold_secs: i64,

    /// Remaining business time below which status becomes critical (seconds)
    pub critical_threshold_secs: i64,
}

impl SlaPolicy {
    /// Validate field-level constraints and policy invariants
    pub fn validate_policy(&self) -> Result<()> {
        self.validate()?;
        if self.warning_threshold_secs < 0 || self.critical_threshold_secs < 0 {
            return Err(AppError::Configuration(
                "SLA thresholds must be non-negative".to_string(),
            ));
        }
        if self.critical_threshold_secs > self.warning_threshold_secs {
            return Err(AppError::Configuration(format!(
                "critical threshold ({}s) exceeds warning threshold ({}s)",
                self.critical_threshold_secs, self.warning_threshold_secs
            )));
        }
        for (priority, secs) in self.response_targets.iter().chain(&self.resolution_targets) {
            if *secs <= 0 {
                return Err(AppError::Configuration(format!(
                    "SLA target for priority {} must be positive, got {}s",
                    priority, secs
                )));
            }
        }
        Ok(())
    }

    /// First-response target for a priority, if one is configured
    pub fn response_target(&self, priority: Priority) -> Option<Duration> {
        self.response_targets
            .get(&priority)
            .map(|s| Duration::seconds(*s))
    }

    /// Resolution target for a priority, if one is configured
    pub fn resolution_target(&self, priority: Priority) -> Option<Duration> {
        self.resolution_targets
            .get(&priority)
            .map(|s| Duration::seconds(*s))
    }

    pub fn warning_threshold(&self) -> Duration {
        Duration::seconds(self.warning_threshold_secs)
    }

    pub fn critical_threshold(&self) -> Duration {
        Duration::seconds(self.critical_threshold_secs)
    }
}

/// Breach status of a ticket relative to its SLA targets
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum BreachStatus {
    Ok,
    Warning,
    Critical,
    Breached,
}

/// Computed SLA state for a ticket at an instant
///
/// Recomputed on every relevant ticket mutation; never persisted by this core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlaState {
    /// First-response deadline; absent once the response leg is satisfied or
    /// the policy carries no response target for the ticket's priority
    pub first_response_due: Option<DateTime<Utc>>,

    /// Resolution deadline, with the same absence semantics
    pub resolution_due: Option<DateTime<Utc>>,

    pub breach_status: BreachStatus,

    /// Remaining business time to the nearer outstanding deadline (seconds);
    /// negative once breached, absent when no leg is outstanding
    pub time_remaining_secs: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_policy() -> SlaPolicy {
        let now = Utc::now();
        SlaPolicy {
            id: Uuid::new_v4(),
            organization_id: Uuid::new_v4(),
            name: "Standard Support".to_string(),
            created_at: now,
            updated_at: now,
            response_targets: HashMap::from([(Priority::High, 3600), (Priority::Normal, 14400)]),
            resolution_targets: HashMap::from([(Priority::High, 14400)]),
            warning_threshold_secs: 3600,
            critical_threshold_secs: 900,
        }
    }

    #[test]
    fn test_target_lookup() {
        let policy = create_test_policy();
        assert_eq!(
            policy.response_target(Priority::High),
            Some(Duration::hours(1))
        );
        assert_eq!(policy.response_target(Priority::Urgent), None);
        assert_eq!(policy.resolution_target(Priority::Normal), None);
    }

    #[test]
    fn test_threshold_ordering_validation() {
        let mut policy = create_test_policy();
        assert!(policy.validate_policy().is_ok());

        policy.critical_threshold_secs = 7200;
        let err = policy.validate_policy().unwrap_err();
        assert_eq!(err.error_code(), "CONFIGURATION_ERROR");
    }

    #[test]
    fn test_non_positive_target_rejected() {
        let mut policy = create_test_policy();
        policy.response_targets.insert(Priority::Low, 0);
        assert!(policy.validate_policy().is_err());
    }
}
