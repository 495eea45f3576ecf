//! Concurrent enrollment and submission behavior
//!
//! The database constraints are the only guard, so these tests race real
//! writers against one file-backed store.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::NaiveDate;
use chrono_tz::Tz;
use study_gate::{
    AccessGate, ArtifactStore, ArtifactUpload, Clock, Condition, DigestIssuer, Enrollment,
    FixedClock, GamePayload, Store, StudyDay, StudyError, SubmissionLedger,
};
use tempfile::TempDir;

const RACERS: usize = 16;

struct Harness {
    clock: Arc<FixedClock>,
    enrollment: Arc<Enrollment>,
    ledger: Arc<SubmissionLedger>,
    dir: TempDir,
}

async fn harness() -> Harness {
    let dir = TempDir::new().unwrap();
    let tz: Tz = "America/Toronto".parse().unwrap();
    let clock = Arc::new(FixedClock::on_date(
        tz,
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
    ));
    let store = Arc::new(Store::open(&dir.path().join("participants.db")).unwrap());
    let gate = Arc::new(AccessGate::new(store.clone()));
    let artifacts = ArtifactStore::new(dir.path().join("uploads")).await.unwrap();

    Harness {
        enrollment: Arc::new(Enrollment::new(
            store.clone(),
            clock.clone(),
            Arc::new(DigestIssuer),
        )),
        ledger: Arc::new(SubmissionLedger::new(store, gate, artifacts)),
        clock,
        dir,
    }
}

fn payload(seed: i64) -> GamePayload {
    GamePayload {
        clicks: seed as u32,
        selected_item_count: 1,
        total_item_count: 9,
        responses: vec![seed, 1, 2, 3, 4],
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_racing_submissions_commit_exactly_once() {
    let h = harness().await;
    let p = h.enrollment.enroll(None, Condition::C1).unwrap();
    let day = StudyDay::FIRST;

    let mut handles = Vec::new();
    for i in 0..RACERS {
        let ledger = h.ledger.clone();
        let credential = p.credential.clone();
        let now = h.clock.now();
        handles.push(tokio::spawn(async move {
            let artifact = ArtifactUpload {
                file_name: Some(format!("drawing-{}.png", i)),
                bytes: vec![i as u8; 64],
            };
            ledger
                .record(&credential, day, payload(i as i64), Some(artifact), now)
                .await
        }));
    }

    let mut accepted = 0;
    let mut conflicts = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => accepted += 1,
            Err(StudyError::Conflict(_)) => conflicts += 1,
            Err(e) => panic!("unexpected error: {}", e),
        }
    }

    assert_eq!(accepted, 1);
    assert_eq!(conflicts, RACERS - 1);

    let history = h.ledger.history(&p.credential).unwrap();
    assert_eq!(history.len(), 1);

    // Only the winning artifact is left on disk
    let artifact_ref = history[0].artifact_ref.clone().unwrap();
    let day_dir = h
        .ledger
        .artifacts()
        .resolve(&artifact_ref)
        .parent()
        .unwrap()
        .to_path_buf();
    assert_eq!(std::fs::read_dir(&day_dir).unwrap().count(), 1);
    assert!(h.dir.path().join("uploads").exists());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_racing_submissions_for_different_participants() {
    let h = harness().await;
    let participants: Vec<_> = (0..RACERS)
        .map(|_| h.enrollment.enroll(None, Condition::C2).unwrap())
        .collect();

    let mut handles = Vec::new();
    for (i, p) in participants.iter().enumerate() {
        let ledger = h.ledger.clone();
        let credential = p.credential.clone();
        let now = h.clock.now();
        handles.push(tokio::spawn(async move {
            ledger
                .record(&credential, StudyDay::FIRST, payload(i as i64), None, now)
                .await
        }));
    }

    for handle in handles {
        handle.await.unwrap().unwrap();
    }
}

#[test]
fn test_concurrent_enrollments_get_distinct_credentials() {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let h = runtime.block_on(harness());

    let credentials: Vec<String> = std::thread::scope(|scope| {
        let workers: Vec<_> = (0..RACERS)
            .map(|i| {
                let enrollment = h.enrollment.clone();
                scope.spawn(move || {
                    let condition = Condition::ALL[i % Condition::ALL.len()];
                    enrollment.enroll(None, condition).unwrap().credential
                })
            })
            .collect();
        workers.into_iter().map(|w| w.join().unwrap()).collect()
    });

    let unique: HashSet<_> = credentials.iter().collect();
    assert_eq!(unique.len(), RACERS);
}
