//! Study vocabulary: study-days and experimental conditions

use std::fmt;
use std::str::FromStr;

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::StudyError;

/// Number of playable days in the study window
pub const STUDY_DAYS: u8 = 8;

/// `end_date - start_date`, in days
pub const ENROLLMENT_SPAN_DAYS: i64 = 7;

/// Number of questionnaire answers submitted with each day's game
pub const RESPONSE_COUNT: usize = 5;

/// A study-day in `1..=STUDY_DAYS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct StudyDay(u8);

impl StudyDay {
    pub const FIRST: StudyDay = StudyDay(1);
    pub const LAST: StudyDay = StudyDay(STUDY_DAYS);

    pub fn new(day: u8) -> Result<Self, StudyError> {
        if (1..=STUDY_DAYS).contains(&day) {
            Ok(Self(day))
        } else {
            Err(StudyError::Validation(format!(
                "day must be between 1 and {}, got {}",
                STUDY_DAYS, day
            )))
        }
    }

    pub fn get(self) -> u8 {
        self.0
    }

    /// Study-day that `today` falls on for a participant who started on
    /// `start`. Dates before the start floor to day 1; `None` once the
    /// window has closed.
    pub fn for_date(start: NaiveDate, today: NaiveDate) -> Option<Self> {
        let elapsed = (today - start).num_days().max(0);
        let candidate = elapsed + 1;
        if candidate > i64::from(STUDY_DAYS) {
            None
        } else {
            Some(Self(candidate as u8))
        }
    }
}

impl TryFrom<u8> for StudyDay {
    type Error = StudyError;

    fn try_from(day: u8) -> Result<Self, Self::Error> {
        Self::new(day)
    }
}

impl TryFrom<i64> for StudyDay {
    type Error = StudyError;

    fn try_from(day: i64) -> Result<Self, Self::Error> {
        u8::try_from(day)
            .map_err(|_| StudyError::Validation(format!("day out of range: {}", day)))
            .and_then(Self::new)
    }
}

impl From<StudyDay> for u8 {
    fn from(day: StudyDay) -> Self {
        day.0
    }
}

impl fmt::Display for StudyDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Experimental arm a participant is assigned to at enrollment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Condition {
    C1,
    C2,
    C3,
    C4,
}

impl Condition {
    pub const ALL: [Condition; 4] = [Condition::C1, Condition::C2, Condition::C3, Condition::C4];

    pub fn as_str(&self) -> &'static str {
        match self {
            Condition::C1 => "c1",
            Condition::C2 => "c2",
            Condition::C3 => "c3",
            Condition::C4 => "c4",
        }
    }
}

impl FromStr for Condition {
    type Err = StudyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Condition::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| StudyError::Validation(format!("Invalid condition: {:?}", s)))
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Last calendar day of a participant's window
pub fn end_date_for(start: NaiveDate) -> NaiveDate {
    start + Duration::days(ENROLLMENT_SPAN_DAYS)
}
