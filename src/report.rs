//! Study export
//!
//! Flattens the store into one JSON document for analysis: a participant
//! table (with played/current day derived at export time) and every
//! submission row.

use std::io::Write;

use chrono::{DateTime, FixedOffset, NaiveDate};
use chrono_tz::Tz;
use serde::Serialize;

use crate::db::{participants, submissions, Store, SubmissionRow};
use crate::error::{StoreError, StudyResult};
use crate::study::{Condition, StudyDay};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantSummary {
    pub external_id: String,
    pub credential: String,
    pub display_name: Option<String>,
    pub condition: Condition,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub played_days: usize,
    /// `None` once the window has closed
    pub current_day: Option<StudyDay>,
    pub submissions: Vec<SubmissionRow>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudyReport {
    pub generated_at: DateTime<FixedOffset>,
    pub participants: Vec<ParticipantSummary>,
}

impl StudyReport {
    pub fn submission_count(&self) -> usize {
        self.participants.iter().map(|p| p.played_days).sum()
    }
}

/// Build a report as of `now`
pub fn build_report(store: &Store, now: DateTime<Tz>) -> StudyResult<StudyReport> {
    let today = now.date_naive();
    let (rows, all_submissions) = store.with_conn(|conn| {
        Ok((
            participants::list_participants(conn)?,
            submissions::list_submissions(conn)?,
        ))
    })?;

    let participants = rows
        .into_iter()
        .map(|p| {
            let own: Vec<SubmissionRow> = all_submissions
                .iter()
                .filter(|s| s.participant_id == p.id)
                .cloned()
                .collect();
            ParticipantSummary {
                played_days: own.len(),
                current_day: StudyDay::for_date(p.start_date, today),
                external_id: p.external_id,
                credential: p.credential,
                display_name: p.display_name,
                condition: p.condition,
                start_date: p.start_date,
                end_date: p.end_date,
                submissions: own,
            }
        })
        .collect();

    Ok(StudyReport {
        generated_at: now.fixed_offset(),
        participants,
    })
}

/// Write the report as pretty JSON
pub fn write_report<W: Write>(report: &StudyReport, writer: W) -> Result<(), StoreError> {
    serde_json::to_writer_pretty(writer, report)
        .map_err(|e| StoreError::Internal(format!("Failed to write report: {}", e)))
}
