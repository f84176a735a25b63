use serde::{Deserialize, Serialize};

/// Engine configuration
///
/// Shared constants and tuning knobs for the three engines. Constructed by the
/// caller (deserialized from its own configuration source) and passed into each
/// engine at construction.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EngineConfig {
    /// Calendar arithmetic configuration
    #[serde(default)]
    pub calendar: CalendarConfig,

    /// Automation rule engine configuration
    #[serde(default)]
    pub automation: AutomationConfig,

    /// Route optimizer configuration
    #[serde(default)]
    pub routing: RoutingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarConfig {
    /// Maximum consecutive days the business-time walk may skip without
    /// consuming any working time before failing closed
    #[serde(default = "default_max_lookahead_days")]
    pub max_lookahead_days: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutomationConfig {
    /// Maximum number of rules evaluated for a single trigger event
    #[serde(default = "default_max_rules_per_event")]
    pub max_rules_per_event: usize,

    /// Maximum length of field path strings in conditions
    #[serde(default = "default_max_field_path_len")]
    pub max_field_path_len: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingConfig {
    /// Assumed average travel speed between stops (km/h)
    #[serde(default = "default_average_speed_kmh")]
    pub average_speed_kmh: f64,

    /// Improvement-phase iteration budget, per job in the planning set
    #[serde(default = "default_improvement_passes_per_job")]
    pub improvement_passes_per_job: usize,

    /// Optional eligibility radius around a technician's home location (km);
    /// jobs farther than this are not assigned to that technician
    #[serde(default)]
    pub max_assignment_radius_km: Option<f64>,
}

fn default_max_lookahead_days() -> u32 {
    14
}

fn default_max_rules_per_event() -> usize {
    500
}

fn default_max_field_path_len() -> usize {
    255
}

fn default_average_speed_kmh() -> f64 {
    40.0
}

fn default_improvement_passes_per_job() -> usize {
    4
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            max_lookahead_days: default_max_lookahead_days(),
        }
    }
}

impl Default for AutomationConfig {
    fn default() -> Self {
        Self {
            max_rules_per_event: default_max_rules_per_event(),
            max_field_path_len: default_max_field_path_len(),
        }
    }
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            average_speed_kmh: default_average_speed_kmh(),
            improvement_passes_per_job: default_improvement_passes_per_job(),
            max_assignment_radius_km: None,
        }
    }
}
