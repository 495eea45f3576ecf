//! Submission rows (append-only)

use chrono::{DateTime, FixedOffset};
use rusqlite::{params, Connection, Row, TransactionBehavior};
use serde::Serialize;
use tracing::debug;

use crate::error::StoreError;
use crate::study::{StudyDay, RESPONSE_COUNT};

/// Submission row from database
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionRow {
    pub id: i64,
    pub participant_id: i64,
    pub day: StudyDay,
    pub clicks: u32,
    pub selected_item_count: u32,
    pub total_item_count: u32,
    pub responses: [i64; RESPONSE_COUNT],
    pub artifact_ref: Option<String>,
    pub submitted_at: DateTime<FixedOffset>,
}

impl SubmissionRow {
    fn from_row(row: &Row) -> Result<Self, rusqlite::Error> {
        let day: i64 = row.get("day")?;
        let day = StudyDay::try_from(day).map_err(|e| conversion_error(Box::new(e)))?;

        let submitted_at: String = row.get("submitted_at")?;
        let submitted_at = DateTime::parse_from_rfc3339(&submitted_at)
            .map_err(|e| conversion_error(Box::new(e)))?;

        Ok(Self {
            id: row.get("id")?,
            participant_id: row.get("participant_id")?,
            day,
            clicks: row.get("clicks")?,
            selected_item_count: row.get("selected_item_count")?,
            total_item_count: row.get("total_item_count")?,
            responses: [
                row.get("response_1")?,
                row.get("response_2")?,
                row.get("response_3")?,
                row.get("response_4")?,
                row.get("response_5")?,
            ],
            artifact_ref: row.get("artifact_ref")?,
            submitted_at,
        })
    }
}

fn conversion_error(e: Box<dyn std::error::Error + Send + Sync>) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, e)
}

/// Input for recording a submission
#[derive(Debug, Clone)]
pub struct NewSubmission {
    pub participant_id: i64,
    pub day: StudyDay,
    pub clicks: u32,
    pub selected_item_count: u32,
    pub total_item_count: u32,
    pub responses: [i64; RESPONSE_COUNT],
    pub artifact_ref: Option<String>,
    pub submitted_at: DateTime<FixedOffset>,
}

/// Insert a submission inside an immediate transaction.
///
/// `before_commit` runs after the row is inserted and before the commit; if
/// it fails the insert is rolled back. A second row for the same participant
/// and day fails with `StoreError::UniqueViolation` before `before_commit`
/// is called.
pub fn insert_submission<F>(
    conn: &mut Connection,
    input: &NewSubmission,
    before_commit: F,
) -> Result<SubmissionRow, StoreError>
where
    F: FnOnce() -> Result<(), StoreError>,
{
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    tx.execute(
        r#"
        INSERT INTO submissions (
            participant_id, day, clicks, selected_item_count, total_item_count,
            response_1, response_2, response_3, response_4, response_5,
            artifact_ref, submitted_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
        params![
            input.participant_id,
            input.day.get(),
            input.clicks,
            input.selected_item_count,
            input.total_item_count,
            input.responses[0],
            input.responses[1],
            input.responses[2],
            input.responses[3],
            input.responses[4],
            input.artifact_ref,
            input.submitted_at.to_rfc3339(),
        ],
    )?;
    let id = tx.last_insert_rowid();

    before_commit()?;
    tx.commit()?;

    debug!(id, participant_id = input.participant_id, day = %input.day, "Inserted submission");

    Ok(SubmissionRow {
        id,
        participant_id: input.participant_id,
        day: input.day,
        clicks: input.clicks,
        selected_item_count: input.selected_item_count,
        total_item_count: input.total_item_count,
        responses: input.responses,
        artifact_ref: input.artifact_ref.clone(),
        submitted_at: input.submitted_at,
    })
}

/// Whether the participant already has a submission for `day`
pub fn submission_exists(
    conn: &Connection,
    participant_id: i64,
    day: StudyDay,
) -> Result<bool, StoreError> {
    let mut stmt =
        conn.prepare_cached("SELECT EXISTS(SELECT 1 FROM submissions WHERE participant_id = ? AND day = ?)")?;
    let exists: bool = stmt.query_row(params![participant_id, day.get()], |row| row.get(0))?;
    Ok(exists)
}

/// A participant's submissions in day order
pub fn list_for_participant(
    conn: &Connection,
    participant_id: i64,
) -> Result<Vec<SubmissionRow>, StoreError> {
    let mut stmt =
        conn.prepare_cached("SELECT * FROM submissions WHERE participant_id = ? ORDER BY day")?;
    let rows = stmt
        .query_map(params![participant_id], SubmissionRow::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Every submission, grouped by participant
pub fn list_submissions(conn: &Connection) -> Result<Vec<SubmissionRow>, StoreError> {
    let mut stmt = conn.prepare("SELECT * FROM submissions ORDER BY participant_id, day")?;
    let rows = stmt
        .query_map([], SubmissionRow::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}
