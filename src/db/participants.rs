//! Participant rows

use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;
use tracing::debug;

use crate::error::StoreError;
use crate::study::Condition;

/// Participant row from database
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantRow {
    #[serde(skip)]
    pub id: i64,
    pub external_id: String,
    pub credential: String,
    pub display_name: Option<String>,
    pub condition: Condition,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

impl ParticipantRow {
    fn from_row(row: &Row) -> Result<Self, rusqlite::Error> {
        let condition: String = row.get("condition")?;
        let condition = condition.parse::<Condition>().map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                0,
                rusqlite::types::Type::Text,
                Box::new(e),
            )
        })?;

        Ok(Self {
            id: row.get("id")?,
            external_id: row.get("external_id")?,
            credential: row.get("credential")?,
            display_name: row.get("display_name")?,
            condition,
            start_date: row.get("start_date")?,
            end_date: row.get("end_date")?,
        })
    }
}

/// Input for creating a participant
#[derive(Debug, Clone)]
pub struct NewParticipant {
    pub external_id: String,
    pub credential: String,
    pub display_name: Option<String>,
    pub condition: Condition,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

/// Insert a participant. A duplicate credential or external id surfaces as
/// `StoreError::UniqueViolation`.
pub fn insert_participant(
    conn: &Connection,
    input: &NewParticipant,
) -> Result<ParticipantRow, StoreError> {
    conn.execute(
        r#"
        INSERT INTO participants (
            external_id, credential, display_name, condition, start_date, end_date
        ) VALUES (?, ?, ?, ?, ?, ?)
        "#,
        params![
            input.external_id,
            input.credential,
            input.display_name,
            input.condition.as_str(),
            input.start_date,
            input.end_date,
        ],
    )?;

    let id = conn.last_insert_rowid();
    debug!(id, external_id = %input.external_id, "Inserted participant");

    Ok(ParticipantRow {
        id,
        external_id: input.external_id.clone(),
        credential: input.credential.clone(),
        display_name: input.display_name.clone(),
        condition: input.condition,
        start_date: input.start_date,
        end_date: input.end_date,
    })
}

/// Look up a participant by credential
pub fn get_by_credential(
    conn: &Connection,
    credential: &str,
) -> Result<Option<ParticipantRow>, StoreError> {
    let mut stmt = conn.prepare_cached("SELECT * FROM participants WHERE credential = ?")?;
    let row = stmt
        .query_row(params![credential], ParticipantRow::from_row)
        .optional()?;
    Ok(row)
}

/// All participants in enrollment order
pub fn list_participants(conn: &Connection) -> Result<Vec<ParticipantRow>, StoreError> {
    let mut stmt = conn.prepare("SELECT * FROM participants ORDER BY id")?;
    let rows = stmt
        .query_map([], ParticipantRow::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Store;

    fn new_participant(external_id: &str, credential: &str) -> NewParticipant {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        NewParticipant {
            external_id: external_id.to_string(),
            credential: credential.to_string(),
            display_name: Some("Ada".to_string()),
            condition: Condition::C3,
            start_date: start,
            end_date: NaiveDate::from_ymd_opt(2024, 1, 8).unwrap(),
        }
    }

    #[test]
    fn test_insert_and_lookup() {
        let store = Store::open_in_memory().unwrap();
        let inserted = store
            .with_conn(|conn| insert_participant(conn, &new_participant("100", "aaaaaaaa")))
            .unwrap();

        let found = store
            .with_conn(|conn| get_by_credential(conn, "aaaaaaaa"))
            .unwrap()
            .unwrap();
        assert_eq!(found, inserted);
        assert_eq!(found.condition, Condition::C3);

        let missing = store
            .with_conn(|conn| get_by_credential(conn, "bbbbbbbb"))
            .unwrap();
        assert!(missing.is_none());
    }

    #[test]
    fn test_duplicate_credential_is_unique_violation() {
        let store = Store::open_in_memory().unwrap();
        store
            .with_conn(|conn| insert_participant(conn, &new_participant("100", "aaaaaaaa")))
            .unwrap();

        let err = store
            .with_conn(|conn| insert_participant(conn, &new_participant("200", "aaaaaaaa")))
            .unwrap_err();
        assert!(err.is_unique_violation(), "got {:?}", err);
    }

    #[test]
    fn test_duplicate_external_id_is_unique_violation() {
        let store = Store::open_in_memory().unwrap();
        store
            .with_conn(|conn| insert_participant(conn, &new_participant("100", "aaaaaaaa")))
            .unwrap();

        let err = store
            .with_conn(|conn| insert_participant(conn, &new_participant("100", "cccccccc")))
            .unwrap_err();
        assert!(err.is_unique_violation(), "got {:?}", err);
    }
}
