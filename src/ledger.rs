//! Submission ledger
//!
//! Accepts one game result per participant per study-day. Duplicate
//! detection is left to the `UNIQUE(participant_id, day)` constraint, so two
//! racing requests for the same day cannot both commit.

use std::sync::Arc;

use chrono::{DateTime, FixedOffset};
use chrono_tz::Tz;
use serde::Serialize;
use tracing::{info, warn};

use crate::artifact_store::{ArtifactStore, ArtifactUpload};
use crate::db::{submissions, NewSubmission, Store};
use crate::error::{StudyError, StudyResult};
use crate::gate::{current_day, AccessGate};
use crate::study::{StudyDay, RESPONSE_COUNT};

/// Game result for one day
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GamePayload {
    pub clicks: u32,
    pub selected_item_count: u32,
    pub total_item_count: u32,
    pub responses: Vec<i64>,
}

impl GamePayload {
    /// Checks the response count and returns the answers in order
    pub fn validated_responses(&self) -> StudyResult<[i64; RESPONSE_COUNT]> {
        <[i64; RESPONSE_COUNT]>::try_from(self.responses.as_slice()).map_err(|_| {
            StudyError::Validation(format!(
                "expected {} responses, got {}",
                RESPONSE_COUNT,
                self.responses.len()
            ))
        })
    }
}

/// Acknowledgment of a persisted submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Receipt {
    pub submission_id: i64,
    pub day: StudyDay,
    pub artifact_ref: Option<String>,
    pub submitted_at: DateTime<FixedOffset>,
}

pub struct SubmissionLedger {
    store: Arc<Store>,
    gate: Arc<AccessGate>,
    artifacts: ArtifactStore,
    enforce_current_day: bool,
}

impl SubmissionLedger {
    pub fn new(store: Arc<Store>, gate: Arc<AccessGate>, artifacts: ArtifactStore) -> Self {
        Self {
            store,
            gate,
            artifacts,
            enforce_current_day: true,
        }
    }

    /// When disabled, the declared day is trusted as long as it is in range
    pub fn enforce_current_day(mut self, enforce: bool) -> Self {
        self.enforce_current_day = enforce;
        self
    }

    pub fn artifacts(&self) -> &ArtifactStore {
        &self.artifacts
    }

    /// Record `day`'s result for `credential`.
    ///
    /// The row and its artifact commit together: the artifact is staged
    /// first, moved into place inside the insert transaction, and removed
    /// again if the commit fails.
    pub async fn record(
        &self,
        credential: &str,
        day: StudyDay,
        payload: GamePayload,
        artifact: Option<ArtifactUpload>,
        now: DateTime<Tz>,
    ) -> StudyResult<Receipt> {
        let responses = payload.validated_responses()?;
        let participant = self.gate.participant(credential)?;

        if self.enforce_current_day {
            let current = current_day(participant.start_date, now);
            if current != Some(day) {
                return Err(StudyError::DayNotOpen {
                    requested: day.get(),
                    current: current.map_or_else(|| "finished".to_string(), |d| d.to_string()),
                });
            }
        }

        let mut staged = match &artifact {
            Some(upload) => Some(self.artifacts.stage(credential, day, upload).await?),
            None => None,
        };

        let input = NewSubmission {
            participant_id: participant.id,
            day,
            clicks: payload.clicks,
            selected_item_count: payload.selected_item_count,
            total_item_count: payload.total_item_count,
            responses,
            artifact_ref: staged.as_ref().map(|s| s.reference().to_string()),
            submitted_at: now.fixed_offset(),
        };

        let result = self.store.with_conn_mut(|conn| {
            submissions::insert_submission(conn, &input, || match staged.as_mut() {
                Some(s) => s.promote(),
                None => Ok(()),
            })
        });

        match result {
            Ok(row) => {
                info!(
                    participant_id = participant.id,
                    day = %day,
                    artifact = ?row.artifact_ref,
                    "Recorded submission"
                );
                Ok(Receipt {
                    submission_id: row.id,
                    day: row.day,
                    artifact_ref: row.artifact_ref,
                    submitted_at: row.submitted_at,
                })
            }
            Err(e) => {
                if let Some(s) = staged.as_ref().filter(|s| s.is_promoted()) {
                    if let Err(cleanup) = self.artifacts.remove(s.reference()) {
                        warn!(artifact = %s.reference(), error = %cleanup, "Failed to remove orphaned artifact");
                    }
                }

                if e.is_unique_violation() {
                    warn!(participant_id = participant.id, day = %day, "Duplicate submission rejected");
                    Err(StudyError::Conflict(format!(
                        "Game data already exists for day {}",
                        day
                    )))
                } else {
                    Err(e.into())
                }
            }
        }
    }

    /// Submissions recorded for a credential, in day order
    pub fn history(&self, credential: &str) -> StudyResult<Vec<submissions::SubmissionRow>> {
        let participant = self.gate.participant(credential)?;
        Ok(self
            .store
            .with_conn(|conn| submissions::list_for_participant(conn, participant.id))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{Clock, FixedClock};
    use crate::credential::DigestIssuer;
    use crate::enrollment::Enrollment;
    use crate::study::Condition;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    struct Fixture {
        clock: Arc<FixedClock>,
        store: Arc<Store>,
        enrollment: Enrollment,
        ledger: SubmissionLedger,
        _dir: TempDir,
    }

    async fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        let tz: Tz = "America/Toronto".parse().unwrap();
        let clock = Arc::new(FixedClock::on_date(
            tz,
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        ));
        let store = Arc::new(Store::open_in_memory().unwrap());
        let gate = Arc::new(AccessGate::new(store.clone()));
        let artifacts = ArtifactStore::new(dir.path()).await.unwrap();
        Fixture {
            enrollment: Enrollment::new(store.clone(), clock.clone(), Arc::new(DigestIssuer)),
            ledger: SubmissionLedger::new(store.clone(), gate, artifacts),
            clock,
            store,
            _dir: dir,
        }
    }

    fn payload() -> GamePayload {
        GamePayload {
            clicks: 40,
            selected_item_count: 6,
            total_item_count: 12,
            responses: vec![3, 4, 2, 5, 1],
        }
    }

    fn day(n: u8) -> StudyDay {
        StudyDay::new(n).unwrap()
    }

    #[tokio::test]
    async fn test_second_record_same_day_conflicts() {
        let f = fixture().await;
        let p = f.enrollment.enroll(None, Condition::C1).unwrap();
        f.clock.advance_days(2);

        f.ledger
            .record(&p.credential, day(3), payload(), None, f.clock.now())
            .await
            .unwrap();

        let mut different = payload();
        different.clicks = 1;
        let err = f
            .ledger
            .record(&p.credential, day(3), different, None, f.clock.now())
            .await
            .unwrap_err();
        assert!(matches!(err, StudyError::Conflict(_)), "got {:?}", err);
        assert_eq!(f.store.stats().unwrap().submissions, 1);
    }

    #[tokio::test]
    async fn test_wrong_response_count_persists_nothing() {
        let f = fixture().await;
        let p = f.enrollment.enroll(None, Condition::C1).unwrap();

        for responses in [vec![1, 2, 3, 4], vec![1, 2, 3, 4, 5, 6], vec![]] {
            let mut bad = payload();
            bad.responses = responses;
            let err = f
                .ledger
                .record(&p.credential, day(1), bad, None, f.clock.now())
                .await
                .unwrap_err();
            assert!(matches!(err, StudyError::Validation(_)));
        }
        assert_eq!(f.store.stats().unwrap().submissions, 0);
    }

    #[tokio::test]
    async fn test_unknown_credential() {
        let f = fixture().await;
        let err = f
            .ledger
            .record("deadbeef", day(1), payload(), None, f.clock.now())
            .await
            .unwrap_err();
        assert!(matches!(err, StudyError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_day_must_match_clock_when_enforced() {
        let f = fixture().await;
        let p = f.enrollment.enroll(None, Condition::C1).unwrap();
        f.clock.advance_days(3);

        let err = f
            .ledger
            .record(&p.credential, day(2), payload(), None, f.clock.now())
            .await
            .unwrap_err();
        assert!(matches!(err, StudyError::DayNotOpen { requested: 2, .. }));

        f.clock.advance_days(10);
        let err = f
            .ledger
            .record(&p.credential, day(8), payload(), None, f.clock.now())
            .await
            .unwrap_err();
        assert!(matches!(err, StudyError::DayNotOpen { .. }));
        assert_eq!(f.store.stats().unwrap().submissions, 0);
    }

    #[tokio::test]
    async fn test_declared_day_trusted_when_not_enforced() {
        let f = fixture().await;
        let gate = Arc::new(AccessGate::new(f.store.clone()));
        let ledger = SubmissionLedger::new(f.store.clone(), gate, f.ledger.artifacts().clone())
            .enforce_current_day(false);
        let p = f.enrollment.enroll(None, Condition::C1).unwrap();

        let receipt = ledger
            .record(&p.credential, day(6), payload(), None, f.clock.now())
            .await
            .unwrap();
        assert_eq!(receipt.day, day(6));
    }

    #[tokio::test]
    async fn test_artifact_stored_under_credential_and_day() {
        let f = fixture().await;
        let p = f.enrollment.enroll(None, Condition::C2).unwrap();

        let upload = ArtifactUpload {
            file_name: Some("board.png".to_string()),
            bytes: vec![1, 2, 3],
        };
        let receipt = f
            .ledger
            .record(&p.credential, day(1), payload(), Some(upload), f.clock.now())
            .await
            .unwrap();

        let reference = receipt.artifact_ref.unwrap();
        assert_eq!(reference, format!("{}/day-1/board.png", p.credential));
        assert_eq!(
            std::fs::read(f.ledger.artifacts().resolve(&reference)).unwrap(),
            vec![1, 2, 3]
        );
    }

    #[tokio::test]
    async fn test_duplicate_does_not_touch_existing_artifact() {
        let f = fixture().await;
        let p = f.enrollment.enroll(None, Condition::C2).unwrap();

        let first = ArtifactUpload {
            file_name: Some("board.png".to_string()),
            bytes: b"first".to_vec(),
        };
        let receipt = f
            .ledger
            .record(&p.credential, day(1), payload(), Some(first), f.clock.now())
            .await
            .unwrap();

        let second = ArtifactUpload {
            file_name: Some("board.png".to_string()),
            bytes: b"second".to_vec(),
        };
        let err = f
            .ledger
            .record(&p.credential, day(1), payload(), Some(second), f.clock.now())
            .await
            .unwrap_err();
        assert!(matches!(err, StudyError::Conflict(_)));

        let path = f.ledger.artifacts().resolve(&receipt.artifact_ref.unwrap());
        assert_eq!(std::fs::read(path).unwrap(), b"first");
    }

    #[tokio::test]
    async fn test_history_in_day_order() {
        let f = fixture().await;
        let p = f.enrollment.enroll(None, Condition::C3).unwrap();

        f.ledger
            .record(&p.credential, day(1), payload(), None, f.clock.now())
            .await
            .unwrap();
        f.clock.advance_days(2);
        f.ledger
            .record(&p.credential, day(3), payload(), None, f.clock.now())
            .await
            .unwrap();

        let days: Vec<u8> = f
            .ledger
            .history(&p.credential)
            .unwrap()
            .iter()
            .map(|s| s.day.get())
            .collect();
        assert_eq!(days, vec![1, 3]);
    }
}
