//! Database schema definitions

use rusqlite::{Connection, OptionalExtension};
use tracing::info;

use crate::error::StoreError;

/// Current schema version for migrations
pub const SCHEMA_VERSION: i32 = 1;

/// Initialize the database schema
pub fn init_schema(conn: &Connection) -> Result<(), StoreError> {
    let current_version = get_schema_version(conn)?;

    match current_version {
        0 => {
            info!("Creating new database schema v{}", SCHEMA_VERSION);
            conn.execute_batch(PARTICIPANTS_SCHEMA)?;
            conn.execute_batch(SUBMISSIONS_SCHEMA)?;
            set_schema_version(conn, SCHEMA_VERSION)?;
        }
        SCHEMA_VERSION => {
            info!("Database schema is up to date (v{})", current_version);
        }
        other => {
            return Err(StoreError::Internal(format!(
                "Unsupported schema version v{} (this build uses v{})",
                other, SCHEMA_VERSION
            )));
        }
    }

    Ok(())
}

/// Get current schema version (0 if not initialized)
pub fn get_schema_version(conn: &Connection) -> Result<i32, StoreError> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL)",
        [],
    )?;

    let version: Option<i32> = conn
        .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| row.get(0))
        .optional()?;

    Ok(version.unwrap_or(0))
}

fn set_schema_version(conn: &Connection, version: i32) -> Result<(), StoreError> {
    conn.execute("DELETE FROM schema_version", [])?;
    conn.execute("INSERT INTO schema_version (version) VALUES (?)", [version])?;
    Ok(())
}

/// Participants. No day counter is stored; the current study-day is always
/// derived from start_date.
const PARTICIPANTS_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS participants (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    external_id TEXT NOT NULL UNIQUE,
    credential TEXT NOT NULL UNIQUE CHECK (length(credential) = 8),
    display_name TEXT,
    condition TEXT NOT NULL CHECK (condition IN ('c1', 'c2', 'c3', 'c4')),
    start_date TEXT NOT NULL,
    end_date TEXT NOT NULL,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#;

/// Submissions. UNIQUE(participant_id, day) is what makes a second write for
/// the same day fail, including under concurrent requests.
const SUBMISSIONS_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS submissions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    participant_id INTEGER NOT NULL REFERENCES participants(id),
    day INTEGER NOT NULL CHECK (day BETWEEN 1 AND 8),
    clicks INTEGER NOT NULL CHECK (clicks >= 0),
    selected_item_count INTEGER NOT NULL CHECK (selected_item_count >= 0),
    total_item_count INTEGER NOT NULL CHECK (total_item_count >= 0),
    response_1 INTEGER NOT NULL,
    response_2 INTEGER NOT NULL,
    response_3 INTEGER NOT NULL,
    response_4 INTEGER NOT NULL,
    response_5 INTEGER NOT NULL,
    artifact_ref TEXT,
    submitted_at TEXT NOT NULL,
    UNIQUE (participant_id, day)
);

CREATE INDEX IF NOT EXISTS idx_submissions_participant ON submissions(participant_id);
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        init_schema(&conn).unwrap();
        assert_eq!(get_schema_version(&conn).unwrap(), SCHEMA_VERSION);
    }

    #[test]
    fn test_unknown_version_is_rejected() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        set_schema_version(&conn, SCHEMA_VERSION + 1).unwrap();

        let err = init_schema(&conn).unwrap_err();
        assert!(matches!(err, StoreError::Internal(_)), "got {:?}", err);
        assert_eq!(get_schema_version(&conn).unwrap(), SCHEMA_VERSION + 1);
    }

    #[test]
    fn test_day_check_constraint() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        conn.execute(
            "INSERT INTO participants (external_id, credential, condition, start_date, end_date)
             VALUES ('1', 'abcdef01', 'c1', '2024-01-01', '2024-01-08')",
            [],
        )
        .unwrap();

        let result = conn.execute(
            "INSERT INTO submissions (participant_id, day, clicks, selected_item_count,
                total_item_count, response_1, response_2, response_3, response_4, response_5,
                submitted_at)
             VALUES (1, 9, 0, 0, 0, 1, 2, 3, 4, 5, '2024-01-09T12:00:00-05:00')",
            [],
        );
        assert!(result.is_err());
    }
}
