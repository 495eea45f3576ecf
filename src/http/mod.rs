//! HTTP API
//!
//! - `POST /api/enroll` - create a participant and issue a credential
//! - `POST /api/login` - check a credential, return the participant's condition
//! - `POST /api/gate` - evaluate today's gate state
//! - `POST /api/submissions` - record a day's result (multipart, optional artifact)
//! - `GET /health` - health check
//!
//! The legacy paths (`/generate_hash_code`, `/login`, `/check_game_status`,
//! `/send_game_data`) are mounted as aliases. They accept the legacy field
//! names (`hash_code`, `game_day`, ...) and answer with the bodies above.

pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::artifact_store::ArtifactStore;
use crate::clock::Clock;
use crate::config::StudyConfig;
use crate::credential::DigestIssuer;
use crate::db::Store;
use crate::enrollment::Enrollment;
use crate::gate::AccessGate;
use crate::ledger::SubmissionLedger;

pub use error::ApiError;

/// Components shared across handlers
pub struct AppState {
    pub enrollment: Enrollment,
    pub gate: Arc<AccessGate>,
    pub ledger: SubmissionLedger,
    pub clock: Arc<dyn Clock>,
}

impl AppState {
    /// Wire the components over one store and clock
    pub fn assemble(
        store: Arc<Store>,
        clock: Arc<dyn Clock>,
        artifacts: ArtifactStore,
        study: &StudyConfig,
    ) -> Self {
        let gate = Arc::new(AccessGate::new(store.clone()));
        let enrollment = Enrollment::new(store.clone(), clock.clone(), Arc::new(DigestIssuer))
            .with_max_attempts(study.credential_attempts);
        let ledger = SubmissionLedger::new(store, gate.clone(), artifacts)
            .enforce_current_day(study.enforce_current_day);

        Self {
            enrollment,
            gate,
            ledger,
            clock,
        }
    }
}

pub type SharedState = Arc<AppState>;

/// Create the API router
pub fn create_router(state: SharedState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/api/enroll", post(routes::enroll))
        .route("/api/login", post(routes::login))
        .route("/api/gate", post(routes::gate_status))
        .route("/api/submissions", post(routes::submit))
        // Legacy paths, same handlers and response bodies
        .route("/generate_hash_code", post(routes::enroll))
        .route("/login", post(routes::login))
        .route("/check_game_status", post(routes::gate_status))
        .route("/send_game_data", post(routes::submit))
        // Health check
        .route("/health", get(routes::health))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
