use axum::{
    extract::{Path, State},
    response::Json as ResponseJson,
    routing::get,
    Json, Router,
};
use db::models::staff::{CreateStaff, Staff};
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{error::ApiError, AppState};

pub async fn create_staff(
    State(state): State<AppState>,
    Json(payload): Json<CreateStaff>,
) -> Result<ResponseJson<ApiResponse<Staff>>, ApiError> {
    let staff = Staff::create(&state.db().pool, &payload, Uuid::new_v4()).await?;
    Ok(ResponseJson(ApiResponse::success(staff)))
}

pub async fn get_staff_list(
    State(state): State<AppState>,
) -> Result<ResponseJson<ApiResponse<Vec<Staff>>>, ApiError> {
    let staff = Staff::find_all(&state.db().pool).await?;
    Ok(ResponseJson(ApiResponse::success(staff)))
}

pub async fn get_staff(
    State(state): State<AppState>,
    Path(staff_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<Staff>>, ApiError> {
    let staff = Staff::find_by_id(&state.db().pool, staff_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Staff member not found".to_string()))?;
    Ok(ResponseJson(ApiResponse::success(staff)))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/staff", get(get_staff_list).post(create_staff))
        .route("/staff/{staff_id}", get(get_staff))
}
