//! Ticket and work-order intelligence core for helpdesk operations.
//!
//! Three tightly-coupled engines decide when a ticket is late, what automatic
//! action to take, and who should do the work next, in what order:
//!
//! - [`automation::AutomationEngine`] evaluates workflow trigger conditions
//!   against a ticket snapshot and executes matched actions through a
//!   dispatch registry, returning effects for the caller to apply.
//! - [`sla::SlaEngine`] computes due dates and breach status across business
//!   calendars, weekends, holidays and time zones, with pause-aware elapsed
//!   time accounting.
//! - [`routing::RouteOptimizer`] assigns and sequences technician visits
//!   under time-window, skill and capacity constraints.
//!
//! All three are pure, synchronous functions over immutable inputs; the
//! surrounding application owns persistence, transport and the application of
//! returned effects. The shared [`calendar::BusinessCalendar`] is the single
//! source of business-time truth for both the SLA engine and the optimizer.

pub mod automation;
pub mod calendar;
pub mod config;
pub mod error;
pub mod models;
pub mod routing;
pub mod sla;

pub use automation::AutomationEngine;
pub use calendar::BusinessCalendar;
pub use config::EngineConfig;
pub use error::{AppError, Result};
pub use routing::RouteOptimizer;
pub use sla::SlaEngine;
