use chrono::{DateTime, Duration, NaiveDate, Utc};

use crate::calendar::BusinessCalendar;
use crate::config::RoutingConfig;
use crate::error::Result;
use crate::models::{
    RoutePlan, RouteStop, ServiceJob, Technician, TechnicianRoute, UnassignedJob, UnassignedReason,
};
use crate::routing::travel::{haversine_km, travel_time};

/// Field-service route optimizer
///
/// Assigns and sequences service jobs across technicians for one working day:
/// a greedy cheapest-insertion construction phase followed by a bounded
/// improvement phase. A deliberate approximation with a hard runtime ceiling,
/// not an optimal VRP solver. One call is one atomic planning pass; callers
/// re-run with a fresh snapshot when jobs or technicians change.
pub struct RouteOptimizer {
    config: RoutingConfig,
}

/// Arrival/departure schedule of one route, with its total travel time
struct RouteSchedule {
    stops: Vec<RouteStop>,
    total_travel: Duration,
}

impl RouteOptimizer {
    pub fn new(config: RoutingConfig) -> Self {
        Self { config }
    }

    /// Plan one day's routes
    pub fn optimize_daily_routes(
        &self,
        technicians: &[Technician],
        jobs: &[ServiceJob],
        calendar: &BusinessCalendar,
        date: NaiveDate,
    ) -> Result<RoutePlan> {
        let tz = calendar.tz()?;
        let day_windows = calendar.day_windows(tz, date);

        // No working time on this date: nothing can be scheduled
        let Some(shift) = day_windows
            .first()
            .map(|(start, _)| *start)
            .zip(day_windows.last().map(|(_, end)| *end))
        else {
            tracing::info!(%date, jobs = jobs.len(), "No working windows on planning date");
            return Ok(RoutePlan {
                date,
                routes: technicians
                    .iter()
                    .map(|t| TechnicianRoute {
                        technician_id: t.id,
                        stops: Vec::new(),
                    })
                    .collect(),
                unassigned: jobs
                    .iter()
                    .map(|j| UnassignedJob {
                        job_id: j.id,
                        reason: UnassignedReason::TimeWindowInfeasible,
                    })
                    .collect(),
                total_travel_secs: 0,
            });
        };

        // routes[t] holds job indices in visit order
        let mut routes: Vec<Vec<usize>> = vec![Vec::new(); technicians.len()];
        let mut unassigned: Vec<UnassignedJob> = Vec::new();

        self.construct_routes(technicians, jobs, shift, &mut routes, &mut unassigned);
        self.improve_routes(technicians, jobs, shift, &mut routes);

        let mut plan_routes = Vec::with_capacity(technicians.len());
        let mut total_travel = Duration::zero();

        for (t, technician) in technicians.iter().enumerate() {
            // Final sequences were only accepted while feasible
            let schedule = self
                .schedule_route(technician, &routes[t], jobs, shift)
                .unwrap_or(RouteSchedule {
                    stops: Vec::new(),
                    total_travel: Duration::zero(),
                });
            total_travel = total_travel + schedule.total_travel;
            plan_routes.push(TechnicianRoute {
                technician_id: technician.id,
                stops: schedule.stops,
            });
        }

        let plan = RoutePlan {
            date,
            routes: plan_routes,
            unassigned,
            total_travel_secs: total_travel.num_seconds(),
        };

        tracing::info!(
            %date,
            technicians = technicians.len(),
            assigned = plan.assigned_count(),
            unassigned = plan.unassigned.len(),
            total_travel_secs = plan.total_travel_secs,
            "Route plan computed"
        );

        Ok(plan)
    }

    /// Phase 1: greedy assignment by earliest time window, cheapest insertion
    fn construct_routes(
        &self,
        technicians: &[Technician],
        jobs: &[ServiceJob],
        shift: (DateTime<Utc>, DateTime<Utc>),
        routes: &mut [Vec<usize>],
        unassigned: &mut Vec<UnassignedJob>,
    ) {
        let mut order: Vec<usize> = (0..jobs.len()).collect();
        order.sort_by_key(|&j| {
            (
                jobs[j].time_window.earliest_start,
                jobs[j].priority.rank(),
                jobs[j].id,
            )
        });

        for j in order {
            let job = &jobs[j];

            let eligible: Vec<usize> = technicians
                .iter()
                .enumerate()
                .filter(|&(_, t)| self.is_eligible(t, job))
                .map(|(t, _)| t)
                .collect();

            if eligible.is_empty() {
                unassigned.push(UnassignedJob {
                    job_id: job.id,
                    reason: UnassignedReason::NoEligibleTechnician,
                });
                continue;
            }

            let with_capacity: Vec<usize> = eligible
                .iter()
                .copied()
                .filter(|&t| routes[t].len() < technicians[t].max_jobs_per_day)
                .collect();

            if with_capacity.is_empty() {
                unassigned.push(UnassignedJob {
                    job_id: job.id,
                    reason: UnassignedReason::CapacityExceeded,
                });
                continue;
            }

            // Cheapest feasible insertion across eligible technicians
            let mut best: Option<(Duration, usize, usize)> = None;
            for &t in &with_capacity {
                let current_travel = self
                    .schedule_route(&technicians[t], &routes[t], jobs, shift)
                    .map(|s| s.total_travel)
                    .unwrap_or(Duration::zero());

                for pos in 0..=routes[t].len() {
                    let mut candidate = routes[t].clone();
                    candidate.insert(pos, j);

                    if let Some(schedule) =
                        self.schedule_route(&technicians[t], &candidate, jobs, shift)
                    {
                        let added = schedule.total_travel - current_travel;
                        if best.map(|(b, _, _)| added < b).unwrap_or(true) {
                            best = Some((added, t, pos));
                        }
                    }
                }
            }

            match best {
                Some((_, t, pos)) => routes[t].insert(pos, j),
                None => unassigned.push(UnassignedJob {
                    job_id: job.id,
                    reason: UnassignedReason::TimeWindowInfeasible,
                }),
            }
        }
    }

    /// Phase 2: bounded relocate/swap improvement
    ///
    /// Accepts a move only if it strictly reduces total travel time while
    /// keeping every route feasible. The attempt budget is proportional to the
    /// job count, trading optimality for a hard runtime ceiling.
    fn improve_routes(
        &self,
        technicians: &[Technician],
        jobs: &[ServiceJob],
        shift: (DateTime<Utc>, DateTime<Utc>),
        routes: &mut Vec<Vec<usize>>,
    ) {
        let mut budget = self
            .config
            .improvement_passes_per_job
            .saturating_mul(jobs.len());

        while budget > 0 {
            match self.find_improving_move(technicians, jobs, shift, routes, &mut budget) {
                Some(improved) => *routes = improved,
                None => break,
            }
        }
    }

    /// One sweep over candidate moves; returns the first improving layout
    fn find_improving_move(
        &self,
        technicians: &[Technician],
        jobs: &[ServiceJob],
        shift: (DateTime<Utc>, DateTime<Utc>),
        routes: &[Vec<usize>],
        budget: &mut usize,
    ) -> Option<Vec<Vec<usize>>> {
        let current_total = self.total_travel(technicians, jobs, shift, routes);

        // Relocate: move one job to another position or technician
        for from_t in 0..routes.len() {
            for from_pos in 0..routes[from_t].len() {
                let j = routes[from_t][from_pos];
                for to_t in 0..routes.len() {
                    if to_t != from_t {
                        if !self.is_eligible(&technicians[to_t], &jobs[j]) {
                            continue;
                        }
                        if routes[to_t].len() >= technicians[to_t].max_jobs_per_day {
                            continue;
                        }
                    }

                    let positions = if to_t == from_t {
                        routes[to_t].len()
                    } else {
                        routes[to_t].len() + 1
                    };

                    for to_pos in 0..positions {
                        if to_t == from_t && to_pos == from_pos {
                            continue;
                        }
                        if *budget == 0 {
                            return None;
                        }
                        *budget -= 1;

                        let mut candidate = routes.to_vec();
                        candidate[from_t].remove(from_pos);
                        let insert_at = to_pos.min(candidate[to_t].len());
                        candidate[to_t].insert(insert_at, j);

                        if self.all_feasible(technicians, jobs, shift, &candidate) {
                            let total = self.total_travel(technicians, jobs, shift, &candidate);
                            if total < current_total {
                                return Some(candidate);
                            }
                        }
                    }
                }
            }
        }

        // Pairwise swap within one route
        for t in 0..routes.len() {
            for i in 0..routes[t].len() {
                for k in (i + 1)..routes[t].len() {
                    if *budget == 0 {
                        return None;
                    }
                    *budget -= 1;

                    let mut candidate = routes.to_vec();
                    candidate[t].swap(i, k);

                    if self.all_feasible(technicians, jobs, shift, &candidate) {
                        let total = self.total_travel(technicians, jobs, shift, &candidate);
                        if total < current_total {
                            return Some(candidate);
                        }
                    }
                }
            }
        }

        None
    }

    fn all_feasible(
        &self,
        technicians: &[Technician],
        jobs: &[ServiceJob],
        shift: (DateTime<Utc>, DateTime<Utc>),
        routes: &[Vec<usize>],
    ) -> bool {
        routes.iter().enumerate().all(|(t, route)| {
            route.is_empty()
                || self
                    .schedule_route(&technicians[t], route, jobs, shift)
                    .is_some()
        })
    }

    fn total_travel(
        &self,
        technicians: &[Technician],
        jobs: &[ServiceJob],
        shift: (DateTime<Utc>, DateTime<Utc>),
        routes: &[Vec<usize>],
    ) -> Duration {
        routes
            .iter()
            .enumerate()
            .filter_map(|(t, route)| {
                self.schedule_route(&technicians[t], route, jobs, shift)
                    .map(|s| s.total_travel)
            })
            .fold(Duration::zero(), |acc, d| acc + d)
    }

    /// Skills plus optional home-proximity screening
    fn is_eligible(&self, technician: &Technician, job: &ServiceJob) -> bool {
        if !technician.has_skills_for(job) {
            return false;
        }
        match self.config.max_assignment_radius_km {
            Some(radius) => haversine_km(technician.home_location, job.location) <= radius,
            None => true,
        }
    }

    /// Simulate a route; `None` when any time window, the shift window, or the
    /// working-day end would be violated
    fn schedule_route(
        &self,
        technician: &Technician,
        route: &[usize],
        jobs: &[ServiceJob],
        shift: (DateTime<Utc>, DateTime<Utc>),
    ) -> Option<RouteSchedule> {
        let (shift_start, shift_end) = shift;
        let mut stops = Vec::with_capacity(route.len());
        let mut cursor = shift_start;
        let mut location = technician.home_location;
        let mut total_travel = Duration::zero();

        for &j in route {
            let job = &jobs[j];
            let leg = travel_time(location, job.location, self.config.average_speed_kmh);
            let arrival = cursor + leg;
            let service_start = arrival.max(job.time_window.earliest_start);

            if service_start > job.time_window.latest_start {
                return None;
            }

            let departure = service_start + Duration::seconds(job.estimated_duration_secs);
            if departure > shift_end {
                return None;
            }

            stops.push(RouteStop {
                job_id: job.id,
                estimated_arrival: arrival,
                estimated_departure: departure,
            });

            total_travel = total_travel + leg;
            cursor = departure;
            location = job.location;
        }

        Some(RouteSchedule {
            stops,
            total_travel,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Location, Priority, TimeWindow};
    use chrono::{NaiveTime, TimeZone};
    use uuid::Uuid;

    fn create_test_calendar() -> BusinessCalendar {
        BusinessCalendar::weekdays(
            "Field ops".to_string(),
            "UTC".to_string(),
            NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
            NaiveTime::from_hms_opt(18, 0, 0).unwrap(),
        )
        .unwrap()
    }

    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 4).unwrap()
    }

    fn utc(h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 4, h, min, 0).unwrap()
    }

    fn create_test_technician(name: &str, lat: f64, lon: f64, skills: &[&str]) -> Technician {
        Technician {
            id: Uuid::new_v4(),
            name: name.to_string(),
            skills: skills.iter().map(|s| s.to_string()).collect(),
            home_location: Location { lat, lon },
            max_jobs_per_day: 8,
        }
    }

    fn create_test_job(lat: f64, lon: f64, skills: &[&str]) -> ServiceJob {
        ServiceJob {
            id: Uuid::new_v4(),
            summary: "Install line".to_string(),
            location: Location { lat, lon },
            required_skills: skills.iter().map(|s| s.to_string()).collect(),
            estimated_duration_secs: 3600,
            time_window: TimeWindow {
                earliest_start: utc(8, 0),
                latest_start: utc(16, 0),
            },
            priority: Priority::Normal,
        }
    }

    fn optimizer() -> RouteOptimizer {
        RouteOptimizer::new(RoutingConfig::default())
    }

    #[test]
    fn test_skill_incompatible_job_is_unassigned() {
        let technicians = vec![
            create_test_technician("Alex", 52.37, 4.89, &["network"]),
            create_test_technician("Sam", 52.36, 4.90, &["electrical"]),
        ];
        let jobs = vec![create_test_job(52.37, 4.90, &["plumbing"])];

        let plan = optimizer()
            .optimize_daily_routes(&technicians, &jobs, &create_test_calendar(), monday())
            .unwrap();

        assert_eq!(plan.assigned_count(), 0);
        assert_eq!(plan.unassigned.len(), 1);
        assert_eq!(
            plan.unassigned[0].reason,
            UnassignedReason::NoEligibleTechnician
        );
    }

    #[test]
    fn test_simple_assignment_respects_windows() {
        let technicians = vec![create_test_technician("Alex", 52.37, 4.89, &["network"])];
        let mut early = create_test_job(52.38, 4.91, &["network"]);
        early.time_window = TimeWindow {
            earliest_start: utc(9, 0),
            latest_start: utc(10, 0),
        };
        let mut late = create_test_job(52.39, 4.92, &["network"]);
        late.time_window = TimeWindow {
            earliest_start: utc(13, 0),
            latest_start: utc(15, 0),
        };

        let plan = optimizer()
            .optimize_daily_routes(
                &technicians,
                &[late.clone(), early.clone()],
                &create_test_calendar(),
                monday(),
            )
            .unwrap();

        assert_eq!(plan.assigned_count(), 2);
        let stops = &plan.routes[0].stops;
        assert_eq!(stops[0].job_id, early.id);
        assert_eq!(stops[1].job_id, late.id);
        // Service waits for the window to open
        assert!(stops[0].estimated_departure >= utc(10, 0));
        assert!(stops[1].estimated_departure >= utc(14, 0));
    }

    #[test]
    fn test_capacity_invariant_and_reason() {
        let mut technician = create_test_technician("Alex", 52.37, 4.89, &[]);
        technician.max_jobs_per_day = 1;
        let jobs = vec![
            create_test_job(52.37, 4.90, &[]),
            create_test_job(52.38, 4.91, &[]),
        ];

        let plan = optimizer()
            .optimize_daily_routes(&[technician], &jobs, &create_test_calendar(), monday())
            .unwrap();

        assert_eq!(plan.routes[0].stops.len(), 1);
        assert_eq!(plan.unassigned.len(), 1);
        assert_eq!(plan.unassigned[0].reason, UnassignedReason::CapacityExceeded);
    }

    #[test]
    fn test_window_before_shift_is_infeasible() {
        let technicians = vec![create_test_technician("Alex", 52.37, 4.89, &[])];
        let mut job = create_test_job(52.37, 4.90, &[]);
        job.time_window = TimeWindow {
            earliest_start: utc(5, 0),
            latest_start: utc(6, 0),
        };

        let plan = optimizer()
            .optimize_daily_routes(&technicians, &[job], &create_test_calendar(), monday())
            .unwrap();

        assert_eq!(plan.assigned_count(), 0);
        assert_eq!(
            plan.unassigned[0].reason,
            UnassignedReason::TimeWindowInfeasible
        );
    }

    #[test]
    fn test_holiday_leaves_everything_unassigned() {
        let mut calendar = create_test_calendar();
        calendar.holidays.insert(monday());
        let technicians = vec![create_test_technician("Alex", 52.37, 4.89, &[])];
        let jobs = vec![create_test_job(52.37, 4.90, &[])];

        let plan = optimizer()
            .optimize_daily_routes(&technicians, &jobs, &calendar, monday())
            .unwrap();

        assert_eq!(plan.assigned_count(), 0);
        assert_eq!(
            plan.unassigned[0].reason,
            UnassignedReason::TimeWindowInfeasible
        );
    }

    #[test]
    fn test_assignment_radius_screens_far_jobs() {
        let mut config = RoutingConfig::default();
        config.max_assignment_radius_km = Some(10.0);
        let optimizer = RouteOptimizer::new(config);

        let technicians = vec![create_test_technician("Alex", 52.37, 4.89, &[])];
        // Roughly 60 km away
        let far_job = create_test_job(52.90, 4.89, &[]);

        let plan = optimizer
            .optimize_daily_routes(&technicians, &[far_job], &create_test_calendar(), monday())
            .unwrap();

        assert_eq!(
            plan.unassigned[0].reason,
            UnassignedReason::NoEligibleTechnician
        );
    }

    #[test]
    fn test_jobs_split_across_technicians_by_proximity() {
        let technicians = vec![
            create_test_technician("North", 53.20, 4.89, &[]),
            create_test_technician("South", 51.50, 4.89, &[]),
        ];
        let jobs = vec![
            create_test_job(53.21, 4.90, &[]), // near North
            create_test_job(51.51, 4.90, &[]), // near South
        ];

        let plan = optimizer()
            .optimize_daily_routes(&technicians, &jobs, &create_test_calendar(), monday())
            .unwrap();

        assert_eq!(plan.assigned_count(), 2);
        assert_eq!(plan.routes[0].stops.len(), 1);
        assert_eq!(plan.routes[1].stops.len(), 1);
        assert_eq!(plan.routes[0].stops[0].job_id, jobs[0].id);
        assert_eq!(plan.routes[1].stops[0].job_id, jobs[1].id);
    }

    #[test]
    fn test_capacity_never_exceeded_under_load() {
        let mut technicians = vec![
            create_test_technician("Alex", 52.37, 4.89, &[]),
            create_test_technician("Sam", 52.40, 4.95, &[]),
        ];
        technicians[0].max_jobs_per_day = 3;
        technicians[1].max_jobs_per_day = 2;

        let jobs: Vec<ServiceJob> = (0..10)
            .map(|i| {
                let mut job = create_test_job(52.30 + 0.01 * i as f64, 4.85, &[]);
                job.estimated_duration_secs = 1800;
                job
            })
            .collect();

        let plan = optimizer()
            .optimize_daily_routes(&technicians, &jobs, &create_test_calendar(), monday())
            .unwrap();

        for (route, technician) in plan.routes.iter().zip(&technicians) {
            assert!(route.stops.len() <= technician.max_jobs_per_day);
        }
        assert_eq!(plan.assigned_count() + plan.unassigned.len(), jobs.len());
    }

    #[test]
    fn test_plan_is_deterministic() {
        let technicians = vec![
            create_test_technician("Alex", 52.37, 4.89, &[]),
            create_test_technician("Sam", 52.40, 4.95, &[]),
        ];
        let jobs: Vec<ServiceJob> = (0..6)
            .map(|i| create_test_job(52.30 + 0.02 * i as f64, 4.85 + 0.01 * i as f64, &[]))
            .collect();

        let optimizer = optimizer();
        let calendar = create_test_calendar();
        let first = optimizer
            .optimize_daily_routes(&technicians, &jobs, &calendar, monday())
            .unwrap();
        let second = optimizer
            .optimize_daily_routes(&technicians, &jobs, &calendar, monday())
            .unwrap();

        let sequence = |plan: &RoutePlan| {
            plan.routes
                .iter()
                .map(|r| r.stops.iter().map(|s| s.job_id).collect::<Vec<_>>())
                .collect::<Vec<_>>()
        };
        assert_eq!(sequence(&first), sequence(&second));
        assert_eq!(first.total_travel_secs, second.total_travel_secs);
    }

    #[test]
    fn test_improvement_is_bounded() {
        let mut config = RoutingConfig::default();
        config.improvement_passes_per_job = 0; // construction only
        let optimizer = RouteOptimizer::new(config);

        let technicians = vec![create_test_technician("Alex", 52.37, 4.89, &[])];
        let jobs = vec![
            create_test_job(52.38, 4.90, &[]),
            create_test_job(52.39, 4.91, &[]),
        ];

        let plan = optimizer
            .optimize_daily_routes(&technicians, &jobs, &create_test_calendar(), monday())
            .unwrap();
        assert_eq!(plan.assigned_count(), 2);
    }
}
