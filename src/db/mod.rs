//! SQLite store for participants and submissions
//!
//! The store is the single shared mutable resource. It is constructed
//! explicitly, handed to each component as an `Arc<Store>`, and closed on
//! shutdown.
//!
//! ## Tables
//!
//! - `participants` - one row per enrollment, never updated
//! - `submissions` - one row per participant per study-day, append-only
//!
//! Uniqueness of `participants.credential` and of
//! `submissions(participant_id, day)` is enforced by the schema, not by
//! read-then-write checks.

pub mod participants;
pub mod schema;
pub mod submissions;

use std::path::Path;
use std::sync::Mutex;

use rusqlite::Connection;
use tracing::{debug, info};

use crate::error::StoreError;

/// SQLite handle shared by enrollment, gate and ledger
pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    /// Open or create the database file
    pub fn open(db_path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        info!("Opening SQLite database at {:?}", db_path);

        let conn = Connection::open(db_path)?;

        // WAL for concurrent readers
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        Self::from_connection(conn)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self, StoreError> {
        debug!("Opening in-memory SQLite database");
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        schema::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Read access to the connection
    pub fn with_conn<F, T>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Connection) -> Result<T, StoreError>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|e| StoreError::Internal(format!("Lock poisoned: {}", e)))?;
        f(&conn)
    }

    /// Exclusive access, needed to open transactions
    pub fn with_conn_mut<F, T>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut Connection) -> Result<T, StoreError>,
    {
        let mut conn = self
            .conn
            .lock()
            .map_err(|e| StoreError::Internal(format!("Lock poisoned: {}", e)))?;
        f(&mut conn)
    }

    /// Flush and close the underlying connection
    pub fn close(self) -> Result<(), StoreError> {
        let conn = self
            .conn
            .into_inner()
            .map_err(|e| StoreError::Internal(format!("Lock poisoned: {}", e)))?;
        conn.close().map_err(|(_, e)| StoreError::from(e))?;
        info!("Database closed");
        Ok(())
    }

    /// Row counts
    pub fn stats(&self) -> Result<StoreStats, StoreError> {
        self.with_conn(|conn| {
            let participants: i64 =
                conn.query_row("SELECT COUNT(*) FROM participants", [], |row| row.get(0))?;
            let submissions: i64 =
                conn.query_row("SELECT COUNT(*) FROM submissions", [], |row| row.get(0))?;
            Ok(StoreStats {
                participants: participants as u64,
                submissions: submissions as u64,
            })
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct StoreStats {
    pub participants: u64,
    pub submissions: u64,
}

// Re-exports
pub use participants::{NewParticipant, ParticipantRow};
pub use submissions::{NewSubmission, SubmissionRow};

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_open_creates_parent_dirs_and_schema() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("participants.db");

        let store = Store::open(&path).unwrap();
        assert!(path.exists());
        assert_eq!(
            store.stats().unwrap(),
            StoreStats {
                participants: 0,
                submissions: 0
            }
        );
        store.close().unwrap();
    }

    #[test]
    fn test_reopen_keeps_schema_version() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("participants.db");

        Store::open(&path).unwrap().close().unwrap();
        let store = Store::open(&path).unwrap();
        let version = store
            .with_conn(|conn| schema::get_schema_version(conn))
            .unwrap();
        assert_eq!(version, schema::SCHEMA_VERSION);
    }
}
