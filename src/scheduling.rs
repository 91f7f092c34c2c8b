//! Review due-date rule.
//!
//! Review 1 falls `first_review_offset_days` after admission; every later
//! review falls `review_interval_days` after the previous due date. A date that
//! lands on the rest day moves forward exactly one day. The shifted date is
//! never re-examined, and it is the shifted date that seeds the next interval.
//!
//! Everything here is pure: a series is fully re-derivable from the admission
//! date and the rule parameters.

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::CareConfig;

/// Parameters of the recurring due-date rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRule {
    pub rest_day: Weekday,
    pub first_offset_days: i64,
    pub interval_days: i64,
}

impl Default for DateRule {
    fn default() -> Self {
        Self {
            rest_day: Weekday::Sat,
            first_offset_days: 18,
            interval_days: 30,
        }
    }
}

impl From<&CareConfig> for DateRule {
    fn from(config: &CareConfig) -> Self {
        Self {
            rest_day: config.rest_day,
            first_offset_days: config.first_review_offset_days,
            interval_days: config.review_interval_days,
        }
    }
}

/// One entry of a computed series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DueDate {
    pub review_number: u32,
    pub due_date: NaiveDate,
}

/// Longest series that may be computed or stored in one call.
pub const MAX_SERIES_LENGTH: u32 = 240;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("Series of {requested} reviews exceeds the limit of {max}")]
    TooLong { requested: u32, max: u32 },

    #[error("Due date of review #{review_number} is outside the supported calendar")]
    OutOfRange { review_number: u32 },
}

impl DateRule {
    /// Moves a rest-day date one day forward; any other date is returned as is.
    /// The last representable date has no successor and is returned unchanged.
    pub fn skip_rest_day(&self, date: NaiveDate) -> NaiveDate {
        if date.weekday() == self.rest_day {
            date.succ_opt().unwrap_or(date)
        } else {
            date
        }
    }

    fn shifted(&self, from: NaiveDate, days: i64) -> Option<NaiveDate> {
        let raw = from.checked_add_signed(Duration::try_days(days)?)?;
        if raw.weekday() == self.rest_day {
            raw.succ_opt()
        } else {
            Some(raw)
        }
    }

    pub fn first_due_date(&self, admission_date: NaiveDate) -> Option<NaiveDate> {
        self.shifted(admission_date, self.first_offset_days)
    }

    pub fn next_due_date(&self, previous_due: NaiveDate) -> Option<NaiveDate> {
        self.shifted(previous_due, self.interval_days)
    }

    /// The first `count` due dates of a series, numbered from 1.
    ///
    /// Fails when `count` exceeds [`MAX_SERIES_LENGTH`] or a due date would
    /// fall outside the calendar.
    pub fn checked_series(&self, admission_date: NaiveDate, count: u32) -> Result<Vec<DueDate>, ScheduleError> {
        if count > MAX_SERIES_LENGTH {
            return Err(ScheduleError::TooLong { requested: count, max: MAX_SERIES_LENGTH });
        }
        let mut series = Vec::with_capacity(count as usize);
        let mut due: Option<NaiveDate> = None;
        for review_number in 1..=count {
            let next = match due {
                None => self.first_due_date(admission_date),
                Some(previous) => self.next_due_date(previous),
            };
            let date = next.ok_or(ScheduleError::OutOfRange { review_number })?;
            series.push(DueDate { review_number, due_date: date });
            due = Some(date);
        }
        Ok(series)
    }

    /// Like [`checked_series`](Self::checked_series), but stops at the first
    /// date it cannot compute and never yields more than [`MAX_SERIES_LENGTH`]
    /// entries.
    pub fn calculate_series(&self, admission_date: NaiveDate, count: u32) -> Vec<DueDate> {
        let count = count.min(MAX_SERIES_LENGTH);
        let mut series = Vec::with_capacity(count as usize);
        let mut due = self.first_due_date(admission_date);
        for review_number in 1..=count {
            let Some(date) = due else { break };
            series.push(DueDate { review_number, due_date: date });
            due = self.next_due_date(date);
        }
        series
    }

    /// Due date of a single review, derived from admission alone.
    pub fn due_date_of(&self, admission_date: NaiveDate, review_number: u32) -> Option<NaiveDate> {
        if review_number == 0 {
            return None;
        }
        self.checked_series(admission_date, review_number)
            .ok()?
            .last()
            .map(|d| d.due_date)
    }

    /// Start of the reporting window of `review_number`: the previous review's
    /// due date, or the admission date for the first review.
    pub fn period_start(&self, admission_date: NaiveDate, review_number: u32) -> NaiveDate {
        if review_number <= 1 {
            return admission_date;
        }
        self.due_date_of(admission_date, review_number - 1)
            .unwrap_or(admission_date)
    }
}

/// Series computed with the default rule.
pub fn calculate_series(admission_date: NaiveDate, count: u32) -> Vec<DueDate> {
    DateRule::default().calculate_series(admission_date, count)
}
