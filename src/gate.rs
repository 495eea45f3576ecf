//! Access gate - the day-gating state machine
//!
//! A participant's state is computed on every query from two persisted
//! facts: their `start_date` and which days already have a submission.
//! Nothing about the current day is stored.
//!
//! ```text
//! elapsed   = today - start_date          (floored at 0)
//! candidate = elapsed + 1
//!
//! candidate > 8                 -> Finished
//! submission exists(candidate)  -> AlreadyPlayed
//! otherwise                     -> Playable(candidate)
//! ```
//!
//! A missed day is never recoverable: the candidate only ever reflects
//! today's study-day.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate};
use chrono_tz::Tz;
use tracing::debug;

use crate::credential::is_well_formed;
use crate::db::{participants, submissions, ParticipantRow, Store};
use crate::error::{StudyError, StudyResult};
use crate::study::{Condition, StudyDay};

/// Outcome of evaluating a participant's eligibility
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    /// Today's game may be played
    Playable(StudyDay),
    /// Today's game has already been submitted
    AlreadyPlayed(StudyDay),
    /// The study window has closed
    Finished,
}

impl GateDecision {
    pub fn day(&self) -> Option<StudyDay> {
        match self {
            GateDecision::Playable(day) | GateDecision::AlreadyPlayed(day) => Some(*day),
            GateDecision::Finished => None,
        }
    }

    /// Wire name of the state
    pub fn state_name(&self) -> &'static str {
        match self {
            GateDecision::Playable(_) => "Playable",
            GateDecision::AlreadyPlayed(_) => "AlreadyPlayed",
            GateDecision::Finished => "Finished",
        }
    }
}

/// Today's study-day for a participant who started on `start`, `None` once
/// the window has closed
pub fn current_day(start: NaiveDate, now: DateTime<Tz>) -> Option<StudyDay> {
    StudyDay::for_date(start, now.date_naive())
}

/// Pure transition function; `played` answers whether a day already has a
/// submission.
pub fn decide<F>(start: NaiveDate, today: NaiveDate, played: F) -> StudyResult<GateDecision>
where
    F: FnOnce(StudyDay) -> StudyResult<bool>,
{
    let Some(day) = StudyDay::for_date(start, today) else {
        return Ok(GateDecision::Finished);
    };

    if played(day)? {
        Ok(GateDecision::AlreadyPlayed(day))
    } else {
        Ok(GateDecision::Playable(day))
    }
}

/// Gate over the participant store
pub struct AccessGate {
    store: Arc<Store>,
}

impl AccessGate {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    /// Resolve a credential to its participant
    pub fn participant(&self, credential: &str) -> StudyResult<ParticipantRow> {
        if !is_well_formed(credential) {
            return Err(StudyError::NotFound(credential.to_string()));
        }
        self.store
            .with_conn(|conn| participants::get_by_credential(conn, credential))?
            .ok_or_else(|| StudyError::NotFound(credential.to_string()))
    }

    /// Check that a credential exists and return the participant's arm
    pub fn authenticate(&self, credential: &str) -> StudyResult<Condition> {
        Ok(self.participant(credential)?.condition)
    }

    /// Evaluate the gate for `credential` at `now`
    pub fn evaluate(&self, credential: &str, now: DateTime<Tz>) -> StudyResult<GateDecision> {
        let participant = self.participant(credential)?;
        self.evaluate_participant(&participant, now)
    }

    pub fn evaluate_participant(
        &self,
        participant: &ParticipantRow,
        now: DateTime<Tz>,
    ) -> StudyResult<GateDecision> {
        let today = now.date_naive();
        let decision = decide(participant.start_date, today, |day| {
            Ok(self
                .store
                .with_conn(|conn| submissions::submission_exists(conn, participant.id, day))?)
        })?;

        debug!(
            participant_id = participant.id,
            %today,
            ?decision,
            "Evaluated gate"
        );
        Ok(decision)
    }
}
