//! Study Gate - enrollment and day-gated submissions for multi-day studies
//!
//! Participants are enrolled with an opaque 8-character credential and may
//! submit one game result per study-day, for eight days starting on their
//! enrollment date in a single reference timezone.
//!
//! ## Components
//!
//! - **clock** - current instant in the reference timezone, injectable
//! - **credential** - external id + credential generation
//! - **enrollment** - creates participants, retries on credential collision
//! - **gate** - derives `Playable(day)` / `AlreadyPlayed` / `Finished`
//! - **ledger** - exactly-once submission per participant per day
//! - **db** - SQLite store, the only shared mutable state
//! - **artifact_store** - uploaded files under `<credential>/day-<N>/`
//!
//! ## Storage Layout
//!
//! ```text
//! <data_dir>/
//! ├── participants.db        # SQLite (participants, submissions)
//! └── uploads/images/
//!     ├── .staging/          # uploads not yet committed
//!     └── 1a2b3c4d/day-3/drawing.png
//! ```

pub mod artifact_store;
pub mod clock;
pub mod config;
pub mod credential;
pub mod db;
pub mod enrollment;
pub mod error;
pub mod gate;
pub mod http;
pub mod ledger;
pub mod report;
pub mod study;

// Re-exports
pub use artifact_store::{ArtifactStore, ArtifactUpload};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::Config;
pub use credential::{CredentialIssuer, DigestIssuer, IssuedCredential};
pub use db::Store;
pub use enrollment::Enrollment;
pub use error::{StoreError, StudyError, StudyResult};
pub use gate::{AccessGate, GateDecision};
pub use http::{create_router, AppState, SharedState};
pub use ledger::{GamePayload, Receipt, SubmissionLedger};
pub use study::{Condition, StudyDay, STUDY_DAYS};
