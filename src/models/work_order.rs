use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use strum::{Display, EnumString};
use uuid::Uuid;
use validator::Validate;

use super::ticket::Priority;

/// Geographic coordinate (decimal degrees)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub lat: f64,
    pub lon: f64,
}

/// Earliest/latest allowable start time for a service job
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TimeWindow {
    pub earliest_start: DateTime<Utc>,
    pub latest_start: DateTime<Utc>,
}

/// Field-service job to be scheduled for a working day
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ServiceJob {
    pub id: Uuid,

    #[validate(length(min = 1, max = 500))]
    pub summary: String,

    pub location: Location,

    /// Skills a technician must all hold to take this job
    #[serde(default)]
    pub required_skills: BTreeSet<String>,

    /// On-site work duration (seconds)
    pub estimated_duration_secs: i64,

    pub time_window: TimeWindow,

    pub priority: Priority,
}

/// Technician available for a working day
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct Technician {
    pub id: Uuid,

    #[validate(length(min = 1, max = 255))]
    pub name: String,

    #[serde(default)]
    pub skills: BTreeSet<String>,

    pub home_location: Location,

    /// Hard cap on assigned jobs per day
    pub max_jobs_per_day: usize,
}

impl Technician {
    /// Whether this technician holds every skill the job requires
    pub fn has_skills_for(&self, job: &ServiceJob) -> bool {
        job.required_skills.is_subset(&self.skills)
    }
}

/// Why a job could not be placed on any route
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum UnassignedReason {
    NoEligibleTechnician,
    TimeWindowInfeasible,
    CapacityExceeded,
}

/// A scheduled stop on a technician's route
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RouteStop {
    pub job_id: Uuid,
    pub estimated_arrival: DateTime<Utc>,
    pub estimated_departure: DateTime<Utc>,
}

/// Ordered stops for one technician
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TechnicianRoute {
    pub technician_id: Uuid,
    pub stops: Vec<RouteStop>,
}

/// A job left off every route, with the reason
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct UnassignedJob {
    pub job_id: Uuid,
    pub reason: UnassignedReason,
}

/// Output of one daily planning pass
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutePlan {
    pub date: NaiveDate,
    pub routes: Vec<TechnicianRoute>,
    pub unassigned: Vec<UnassignedJob>,

    /// Total travel time across all routes (seconds)
    pub total_travel_secs: i64,
}

impl RoutePlan {
    /// Number of jobs placed on routes
    pub fn assigned_count(&self) -> usize {
        self.routes.iter().map(|r| r.stops.len()).sum()
    }
}
