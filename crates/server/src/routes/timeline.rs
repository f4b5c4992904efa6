use axum::{
    extract::{Path, State},
    response::Json as ResponseJson,
    routing::get,
    Router,
};
use services::services::timeline::{self, Timeline};
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{error::ApiError, AppState};

pub async fn get_timeline(
    State(state): State<AppState>,
    Path(task_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<Timeline>>, ApiError> {
    let timeline = timeline::reconstruct(&state.db().pool, task_id).await?;
    Ok(ResponseJson(ApiResponse::success(timeline)))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/tasks/{task_id}/timeline", get(get_timeline))
}
