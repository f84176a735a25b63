use chrono::{DateTime, Duration, Utc};

use crate::calendar::BusinessCalendar;
use crate::config::CalendarConfig;
use crate::error::Result;
use crate::models::{BreachStatus, PauseInterval, SlaPolicy, SlaState, TicketSnapshot};

/// SLA business-hours compliance engine
///
/// Computes due dates and breach status for a ticket given a policy and a
/// calendar. Pure: a read of the snapshot plus policy/calendar, never a
/// mutation; safe to invoke concurrently for the same or different tickets.
pub struct SlaEngine {
    calendar_config: CalendarConfig,
}

impl SlaEngine {
    pub fn new(calendar_config: CalendarConfig) -> Self {
        Self { calendar_config }
    }

    /// Compute the SLA state of a ticket at `now`
    ///
    /// The response leg is excluded once `first_response_at` is set, the
    /// resolution leg once `resolved_at` is set; a priority with no configured
    /// target leaves that leg untracked. Business time overlapping the
    /// caller-supplied pause intervals is excluded from elapsed-time
    /// accounting, which pushes both due dates out by the paused amount.
    pub fn compute_sla_state(
        &self,
        policy: &SlaPolicy,
        calendar: &BusinessCalendar,
        snapshot: &TicketSnapshot,
        pause_intervals: &[PauseInterval],
        now: DateTime<Utc>,
    ) -> Result<SlaState> {
        policy.validate_policy()?;

        let paused = paused_business_time(calendar, snapshot.created_at, now, pause_intervals)?;

        let first_response_due = match (snapshot.first_response_at, policy.response_target(snapshot.priority)) {
            (None, Some(target)) => Some(calendar.add_business_duration(
                snapshot.created_at,
                target + paused,
                &self.calendar_config,
            )?),
            _ => None,
        };

        let resolution_due = match (snapshot.resolved_at, policy.resolution_target(snapshot.priority)) {
            (None, Some(target)) => Some(calendar.add_business_duration(
                snapshot.created_at,
                target + paused,
                &self.calendar_config,
            )?),
            _ => None,
        };

        // Breach status tracks the nearer outstanding deadline
        let nearest_due = match (first_response_due, resolution_due) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (Some(a), None) => Some(a),
            (None, Some(b)) => Some(b),
            (None, None) => None,
        };

        let (breach_status, time_remaining_secs) = match nearest_due {
            None => (BreachStatus::Ok, None),
            Some(due) => {
                if now > due {
                    let overdue = calendar.business_duration_between(due, now)?;
                    (BreachStatus::Breached, Some(-overdue.num_seconds()))
                } else {
                    let remaining = calendar.business_duration_between(now, due)?;
                    let status = if remaining > policy.warning_threshold() {
                        BreachStatus::Ok
                    } else if remaining > policy.critical_threshold() {
                        BreachStatus::Warning
                    } else {
                        BreachStatus::Critical
                    };
                    (status, Some(remaining.num_seconds()))
                }
            }
        };

        tracing::debug!(
            ticket_id = %snapshot.id,
            policy_id = %policy.id,
            breach_status = %breach_status,
            time_remaining_secs = ?time_remaining_secs,
            "Computed SLA state"
        );

        Ok(SlaState {
            first_response_due,
            resolution_due,
            breach_status,
            time_remaining_secs,
        })
    }
}

/// Business time covered by pause intervals within `[created_at, now]`
///
/// Open intervals clamp to `now`; overlapping intervals are merged first so a
/// doubly-reported pause is not subtracted twice.
fn paused_business_time(
    calendar: &BusinessCalendar,
    created_at: DateTime<Utc>,
    now: DateTime<Utc>,
    pause_intervals: &[PauseInterval],
) -> Result<Duration> {
    let mut clamped: Vec<(DateTime<Utc>, DateTime<Utc>)> = pause_intervals
        .iter()
        .filter_map(|interval| {
            let start = interval.start.max(created_at);
            let end = interval.end.unwrap_or(now).min(now);
            (start < end).then_some((start, end))
        })
        .collect();

    clamped.sort_by_key(|(start, _)| *start);

    let mut merged: Vec<(DateTime<Utc>, DateTime<Utc>)> = Vec::with_capacity(clamped.len());
    for (start, end) in clamped {
        match merged.last_mut() {
            Some((_, last_end)) if start <= *last_end => {
                *last_end = (*last_end).max(end);
            }
            _ => merged.push((start, end)),
        }
    }

    let mut total = Duration::zero();
    for (start, end) in merged {
        total = total + calendar.business_duration_between(start, end)?;
    }
    Ok(total)
}
