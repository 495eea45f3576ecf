//! API handlers

use axum::{
    extract::{rejection::JsonRejection, Multipart, State},
    response::{IntoResponse, Json},
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{ApiError, SharedState};
use crate::artifact_store::ArtifactUpload;
use crate::error::StudyError;
use crate::ledger::GamePayload;
use crate::study::{Condition, StudyDay};

/// Health check endpoint
pub async fn health() -> impl IntoResponse {
    "OK"
}

// === Enrollment ===

#[derive(Debug, Deserialize)]
pub struct EnrollRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub condition: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrollResponse {
    pub external_id: String,
    pub credential: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub condition: Condition,
}

/// POST /api/enroll
pub async fn enroll(
    State(state): State<SharedState>,
    body: Result<Json<EnrollRequest>, JsonRejection>,
) -> Result<Json<EnrollResponse>, ApiError> {
    let Json(req) = body?;
    let condition = req
        .condition
        .ok_or_else(|| ApiError::Validation("Invalid condition".to_string()))?;
    let participant = state.enrollment.enroll_raw(req.name, &condition)?;

    Ok(Json(EnrollResponse {
        external_id: participant.external_id,
        credential: participant.credential,
        start_date: participant.start_date,
        end_date: participant.end_date,
        condition: participant.condition,
    }))
}

// === Authentication and gate ===

#[derive(Debug, Deserialize)]
pub struct CredentialRequest {
    #[serde(default, alias = "hash_code")]
    pub credential: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub valid: bool,
    pub condition: Condition,
}

/// POST /api/login
pub async fn login(
    State(state): State<SharedState>,
    body: Result<Json<CredentialRequest>, JsonRejection>,
) -> Result<Json<LoginResponse>, ApiError> {
    let Json(req) = body?;
    match state.gate.authenticate(&req.credential) {
        Ok(condition) => Ok(Json(LoginResponse {
            valid: true,
            condition,
        })),
        Err(StudyError::NotFound(_)) => Err(ApiError::Forbidden("Invalid credential".to_string())),
        Err(e) => Err(e.into()),
    }
}

#[derive(Debug, Serialize)]
pub struct GateResponse {
    pub state: &'static str,
    pub day: Option<StudyDay>,
}

/// POST /api/gate
pub async fn gate_status(
    State(state): State<SharedState>,
    body: Result<Json<CredentialRequest>, JsonRejection>,
) -> Result<Json<GateResponse>, ApiError> {
    let Json(req) = body?;
    let decision = state.gate.evaluate(&req.credential, state.clock.now())?;

    Ok(Json(GateResponse {
        state: decision.state_name(),
        day: decision.day(),
    }))
}

// === Submissions ===

#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub success: bool,
    pub message: String,
}

/// Submission fields collected from a multipart form
#[derive(Debug, Default)]
struct SubmitForm {
    credential: Option<String>,
    day: Option<String>,
    clicks: Option<String>,
    selected_item_count: Option<String>,
    total_item_count: Option<String>,
    responses: Option<String>,
    artifact: Option<ArtifactUpload>,
}

impl SubmitForm {
    async fn read(mut multipart: Multipart) -> Result<Self, ApiError> {
        let mut form = SubmitForm::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ApiError::Validation(format!("Malformed form: {}", e)))?
        {
            let name = field.name().unwrap_or_default().to_string();

            if matches!(name.as_str(), "artifact" | "image") {
                let file_name = field.file_name().map(str::to_string);
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::Validation(format!("Malformed upload: {}", e)))?;
                // Browsers send an empty part when no file was picked
                if !bytes.is_empty() {
                    form.artifact = Some(ArtifactUpload {
                        file_name,
                        bytes: bytes.to_vec(),
                    });
                }
                continue;
            }

            let value = field
                .text()
                .await
                .map_err(|e| ApiError::Validation(format!("Malformed field {}: {}", name, e)))?;

            let slot = match name.as_str() {
                "credential" | "hash_code" => &mut form.credential,
                "day" | "game_day" => &mut form.day,
                "clicks" => &mut form.clicks,
                "selectedItemCount" | "selected_item_count" | "selected_items" => {
                    &mut form.selected_item_count
                }
                "totalItemCount" | "total_item_count" | "total_items" => &mut form.total_item_count,
                "responses" | "questions" => &mut form.responses,
                other => {
                    debug!(field = other, "Ignoring unknown form field");
                    continue;
                }
            };
            *slot = Some(value);
        }

        Ok(form)
    }
}

fn required<'a>(value: &'a Option<String>, name: &str) -> Result<&'a str, ApiError> {
    value
        .as_deref()
        .map(str::trim)
        .ok_or_else(|| ApiError::Validation(format!("Missing field: {}", name)))
}

fn parse_count(value: &Option<String>, name: &str) -> Result<u32, ApiError> {
    required(value, name)?
        .parse::<u32>()
        .map_err(|_| ApiError::Validation(format!("{} must be a non-negative integer", name)))
}

/// Accepts `1,2,3,4,5` or `[1, 2, 3, 4, 5]`
pub fn parse_responses(raw: &str) -> Result<Vec<i64>, ApiError> {
    let inner = raw.trim().trim_start_matches('[').trim_end_matches(']').trim();
    if inner.is_empty() {
        return Ok(Vec::new());
    }
    inner
        .split(',')
        .map(|part| {
            part.trim()
                .parse::<i64>()
                .map_err(|_| ApiError::Validation(format!("Response is not an integer: {:?}", part.trim())))
        })
        .collect()
}

/// POST /api/submissions
pub async fn submit(
    State(state): State<SharedState>,
    multipart: Multipart,
) -> Result<Json<SubmitResponse>, ApiError> {
    let form = SubmitForm::read(multipart).await?;

    let credential = required(&form.credential, "credential")?.to_string();
    let day = required(&form.day, "day")?
        .parse::<i64>()
        .map_err(|_| ApiError::Validation("day must be an integer".to_string()))?;
    let day = StudyDay::try_from(day)?;

    let payload = GamePayload {
        clicks: parse_count(&form.clicks, "clicks")?,
        selected_item_count: parse_count(&form.selected_item_count, "selectedItemCount")?,
        total_item_count: parse_count(&form.total_item_count, "totalItemCount")?,
        responses: parse_responses(required(&form.responses, "responses")?)?,
    };

    state
        .ledger
        .record(&credential, day, payload, form.artifact, state.clock.now())
        .await?;

    Ok(Json(SubmitResponse {
        success: true,
        message: "Game data received and saved successfully".to_string(),
    }))
}
