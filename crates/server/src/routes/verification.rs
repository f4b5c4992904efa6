use axum::{
    extract::{Path, State},
    response::Json as ResponseJson,
    routing::post,
    Json, Router,
};
use db::models::task::Task;
use serde::{Deserialize, Serialize};
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{error::ApiError, AppState};

#[derive(Debug, Deserialize)]
pub struct ArrivalRequest {
    pub lat: f64,
    pub lng: f64,
}

pub async fn confirm_arrival(
    State(state): State<AppState>,
    Path(task_id): Path<Uuid>,
    Json(payload): Json<ArrivalRequest>,
) -> Result<ResponseJson<ApiResponse<Task>>, ApiError> {
    let task = state
        .verification()
        .confirm_arrival(&state.db().pool, task_id, payload.lat, payload.lng)
        .await?;
    Ok(ResponseJson(ApiResponse::success(task)))
}

#[derive(Debug, Serialize)]
pub struct OtpSendResponse {
    /// Masked recipient, e.g. `o**@acme.example`.
    pub sent_to: String,
}

pub async fn send_otp(
    State(state): State<AppState>,
    Path(task_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<OtpSendResponse>>, ApiError> {
    let sent_to = state
        .verification()
        .send_otp(&state.db().pool, task_id)
        .await?;
    Ok(ResponseJson(ApiResponse::success(OtpSendResponse { sent_to })))
}

#[derive(Debug, Deserialize)]
pub struct OtpVerifyRequest {
    pub code: String,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub address: Option<String>,
}

pub async fn verify_otp(
    State(state): State<AppState>,
    Path(task_id): Path<Uuid>,
    Json(payload): Json<OtpVerifyRequest>,
) -> Result<ResponseJson<ApiResponse<Task>>, ApiError> {
    let task = state
        .verification()
        .verify_otp(
            &state.db().pool,
            task_id,
            &payload.code,
            payload.lat,
            payload.lng,
            payload.address,
        )
        .await?;
    Ok(ResponseJson(ApiResponse::success(task)))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/tasks/{task_id}/arrival", post(confirm_arrival))
        .route("/tasks/{task_id}/otp/send", post(send_otp))
        .route("/tasks/{task_id}/otp/verify", post(verify_otp))
}
