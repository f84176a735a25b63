use chrono::{DateTime, Datelike, Duration, LocalResult, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;

use super::model::BusinessCalendar;
use crate::config::CalendarConfig;
use crate::error::{AppError, Result};

/// Resolve a calendar-local wall time to a UTC instant
///
/// DST-ambiguous times take the earlier offset; times skipped by a DST gap
/// resolve to nothing and the enclosing window is dropped for that day.
fn resolve_local(tz: Tz, naive: NaiveDateTime) -> Option<DateTime<Utc>> {
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(t) => Some(t.with_timezone(&Utc)),
        LocalResult::Ambiguous(earliest, _) => Some(earliest.with_timezone(&Utc)),
        LocalResult::None => None,
    }
}

impl BusinessCalendar {
    /// Working windows of one local date as UTC instants, in order
    ///
    /// Empty on holidays and on days without windows.
    pub(crate) fn day_windows(
        &self,
        tz: Tz,
        date: NaiveDate,
    ) -> Vec<(DateTime<Utc>, DateTime<Utc>)> {
        if self.is_holiday(date) {
            return Vec::new();
        }

        self.windows_for(date.weekday())
            .filter_map(|w| {
                let start = resolve_local(tz, date.and_time(w.start))?;
                let end = resolve_local(tz, date.and_time(w.end))?;
                (start < end).then_some((start, end))
            })
            .collect()
    }

    /// Whether an instant falls inside a working window
    pub fn is_working_instant(&self, instant: DateTime<Utc>) -> Result<bool> {
        let tz = self.tz()?;
        let local = instant.with_timezone(&tz);
        let date = local.date_naive();

        if self.is_holiday(date) {
            return Ok(false);
        }

        let time = local.time();
        Ok(self
            .windows_for(date.weekday())
            .any(|w| w.start <= time && time < w.end))
    }

    /// Advance an instant by a business-time duration
    ///
    /// Walks forward day by day, consuming working time from each window. A
    /// start inside a window consumes from the current instant; a start after
    /// hours rolls to the next window. Fails closed with `OutOfRange` once
    /// `config.max_lookahead_days` consecutive days contribute no working
    /// time.
    pub fn add_business_duration(
        &self,
        start: DateTime<Utc>,
        duration: Duration,
        config: &CalendarConfig,
    ) -> Result<DateTime<Utc>> {
        if duration < Duration::zero() {
            return Err(AppError::Validation(
                "Business duration must be non-negative".to_string(),
            ));
        }
        if duration == Duration::zero() {
            return Ok(start);
        }

        let tz = self.tz()?;
        let mut remaining = duration;
        let mut cursor = start;
        let mut empty_days: u32 = 0;

        loop {
            let date = cursor.with_timezone(&tz).date_naive();
            let mut consumed_today = false;

            for (win_start, win_end) in self.day_windows(tz, date) {
                let effective_start = cursor.max(win_start);
                if effective_start >= win_end {
                    continue;
                }

                let available = win_end - effective_start;
                if available >= remaining {
                    return Ok(effective_start + remaining);
                }

                remaining = remaining - available;
                cursor = win_end;
                consumed_today = true;
            }

            if consumed_today {
                empty_days = 0;
            } else {
                empty_days += 1;
                if empty_days > config.max_lookahead_days {
                    return Err(AppError::OutOfRange(format!(
                        "No working time found within {} days of {}",
                        config.max_lookahead_days, date
                    )));
                }
            }

            // Jump to the next local midnight
            let next_date = date.succ_opt().ok_or_else(|| {
                AppError::OutOfRange("Calendar walk exceeded representable dates".to_string())
            })?;
            cursor = match resolve_local(tz, next_date.and_hms_opt(0, 0, 0).unwrap()) {
                Some(t) => t.max(cursor),
                None => cursor + Duration::days(1),
            };
        }
    }

    /// Business time elapsed between two instants
    ///
    /// Sums the working-window overlap of `[start, end)`. Returns zero when
    /// `end` is not after `start`.
    pub fn business_duration_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Duration> {
        if end <= start {
            return Ok(Duration::zero());
        }

        let tz = self.tz()?;
        let mut total = Duration::zero();
        let mut date = start.with_timezone(&tz).date_naive();
        let last = end.with_timezone(&tz).date_naive();

        while date <= last {
            for (win_start, win_end) in self.day_windows(tz, date) {
                let lo = win_start.max(start);
                let hi = win_end.min(end);
                if lo < hi {
                    total = total + (hi - lo);
                }
            }
            date = match date.succ_opt() {
                Some(d) => d,
                None => break,
            };
        }

        Ok(total)
    }
}
