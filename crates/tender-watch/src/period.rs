//! Bi-monthly publication periods of the open-data feed.
//!
//! The portal publishes one award file per half-month: `01` covers days
//! 1–15, `02` covers day 16 to the end of the month. A period renders as
//! `YYYYMMPP`, e.g. `20241002`.

use chrono::{Datelike, Days, FixedOffset, NaiveDate, Utc};
use serde::{Serialize, Serializer};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Approximate length of one period, used when stepping backwards.
const PERIOD_STEP_DAYS: u64 = 15;

/// Taiwan is UTC+8 with no daylight saving.
const TAIPEI_OFFSET_SECS: i32 = 8 * 3600;

/// Which half of the month a period covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Half {
    First,
    Second,
}

impl Half {
    fn of_day(day: u32) -> Self {
        if day <= 15 {
            Half::First
        } else {
            Half::Second
        }
    }

    fn code(self) -> u8 {
        match self {
            Half::First => 1,
            Half::Second => 2,
        }
    }
}

/// One half-month publication period.
///
/// Ordering follows calendar time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Period {
    year: i32,
    month: u32,
    half: Half,
}

impl Period {
    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn half(&self) -> Half {
        self.half
    }

    /// Name of the award file published for this period.
    pub fn award_file_name(&self) -> String {
        format!("award_{self}.xml")
    }

    /// Whether `date` falls inside this half-month.
    pub fn contains(&self, date: NaiveDate) -> bool {
        current_period(date) == *self
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}{:02}{:02}", self.year, self.month, self.half.code())
    }
}

impl Serialize for Period {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Error returned when parsing a malformed period string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid period '{0}': expected YYYYMM01 or YYYYMM02")]
pub struct ParsePeriodError(String);

impl FromStr for Period {
    type Err = ParsePeriodError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParsePeriodError(s.to_string());
        if s.len() != 8 || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(err());
        }
        let year: i32 = s[0..4].parse().map_err(|_| err())?;
        let month: u32 = s[4..6].parse().map_err(|_| err())?;
        let half = match &s[6..8] {
            "01" => Half::First,
            "02" => Half::Second,
            _ => return Err(err()),
        };
        if !(1..=12).contains(&month) {
            return Err(err());
        }
        Ok(Period { year, month, half })
    }
}

/// The period containing `reference`.
pub fn current_period(reference: NaiveDate) -> Period {
    Period {
        year: reference.year(),
        month: reference.month(),
        half: Half::of_day(reference.day()),
    }
}

/// The distinct periods reached by stepping back from `reference` in
/// 15-day increments, `count` times (the first step is the reference date
/// itself). Newest first.
///
/// Stepping by 15 days can land twice in the same half-month, so the result
/// may be shorter than `count`. It always starts with
/// `current_period(reference)` when `count >= 1`.
pub fn recent_periods(reference: NaiveDate, count: usize) -> Vec<Period> {
    let mut periods = BTreeSet::new();
    for step in 0..count as u64 {
        let Some(date) = reference.checked_sub_days(Days::new(step * PERIOD_STEP_DAYS)) else {
            break;
        };
        periods.insert(current_period(date));
    }
    periods.into_iter().rev().collect()
}

/// Today's date on the Taiwan calendar.
pub fn taipei_today() -> NaiveDate {
    match FixedOffset::east_opt(TAIPEI_OFFSET_SECS) {
        Some(tz) => Utc::now().with_timezone(&tz).date_naive(),
        None => Utc::now().date_naive(),
    }
}
