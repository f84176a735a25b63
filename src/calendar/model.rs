use chrono::{NaiveDate, NaiveTime, Weekday};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::error::{AppError, Result};

/// One weekly working window, local to the calendar's timezone
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct WorkingWindow {
    pub weekday: Weekday,
    pub start: NaiveTime,
    pub end: NaiveTime,
}

/// Business-hours calendar for an organization
///
/// Weekly working windows, holidays and a timezone. Immutable per evaluation;
/// the single source of business-time truth for both the SLA engine and the
/// route optimizer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusinessCalendar {
    pub name: String,

    /// IANA timezone identifier (e.g. "Europe/Amsterdam")
    pub timezone: String,

    /// Sorted by weekday, then start time; non-overlapping within a day
    pub weekly_windows: Vec<WorkingWindow>,

    #[serde(default)]
    pub holidays: BTreeSet<NaiveDate>,
}

impl BusinessCalendar {
    /// Create a calendar, validating its invariants
    ///
    /// Rejects an unparseable timezone, an empty week, inverted windows, and
    /// overlapping windows on the same weekday.
    pub fn new(
        name: String,
        timezone: String,
        mut weekly_windows: Vec<WorkingWindow>,
        holidays: BTreeSet<NaiveDate>,
    ) -> Result<Self> {
        timezone
            .parse::<Tz>()
            .map_err(|_| AppError::Configuration(format!("Invalid timezone: {}", timezone)))?;

        if weekly_windows.is_empty() {
            return Err(AppError::Configuration(format!(
                "Calendar '{}' has no working windows",
                name
            )));
        }

        for window in &weekly_windows {
            if window.start >= window.end {
                return Err(AppError::Configuration(format!(
                    "Window on {} starts at {} but ends at {}",
                    window.weekday, window.start, window.end
                )));
            }
        }

        weekly_windows.sort_by_key(|w| (w.weekday.num_days_from_monday(), w.start));

        for pair in weekly_windows.windows(2) {
            if pair[0].weekday == pair[1].weekday && pair[1].start < pair[0].end {
                return Err(AppError::Configuration(format!(
                    "Overlapping windows on {}: {}-{} and {}-{}",
                    pair[0].weekday, pair[0].start, pair[0].end, pair[1].start, pair[1].end
                )));
            }
        }

        Ok(Self {
            name,
            timezone,
            weekly_windows,
            holidays,
        })
    }

    /// Parse the calendar's timezone
    pub fn tz(&self) -> Result<Tz> {
        self.timezone
            .parse()
            .map_err(|_| AppError::Configuration(format!("Invalid timezone: {}", self.timezone)))
    }

    pub fn is_holiday(&self, date: NaiveDate) -> bool {
        self.holidays.contains(&date)
    }

    /// Working windows for one weekday, in start-time order
    pub fn windows_for(&self, weekday: Weekday) -> impl Iterator<Item = &WorkingWindow> {
        self.weekly_windows
            .iter()
            .filter(move |w| w.weekday == weekday)
    }

    /// A Monday-Friday calendar with a single daily window
    pub fn weekdays(name: String, timezone: String, start: NaiveTime, end: NaiveTime) -> Result<Self> {
        let windows = [
            Weekday::Mon,
            Weekday::Tue,
            Weekday::Wed,
            Weekday::Thu,
            Weekday::Fri,
        ]
        .into_iter()
        .map(|weekday| WorkingWindow { weekday, start, end })
        .collect();

        Self::new(name, timezone, windows, BTreeSet::new())
    }
}
