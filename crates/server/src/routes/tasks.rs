use std::str::FromStr;

use axum::{
    extract::{Path, Query, State},
    response::Json as ResponseJson,
    routing::{get, post, put},
    Json, Router,
};
use db::{
    models::task::{CreateTask, StepRequirements, Task},
    types::{ProgressStep, TaskStatus},
};
use serde::{Deserialize, Serialize};
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{error::ApiError, AppState};

#[derive(Debug, Deserialize)]
pub struct TaskQuery {
    pub assignee_id: Option<Uuid>,
    pub status: Option<TaskStatus>,
}

/// Task plus the step requirements that actually apply to it after the
/// company defaults are merged in.
#[derive(Debug, Serialize)]
pub struct TaskDetails {
    #[serde(flatten)]
    pub task: Task,
    pub requirements: StepRequirements,
}

pub async fn get_tasks(
    State(state): State<AppState>,
    Query(query): Query<TaskQuery>,
) -> Result<ResponseJson<ApiResponse<Vec<Task>>>, ApiError> {
    let tasks = match (query.assignee_id, query.status) {
        (Some(assignee_id), _) => Task::find_by_assignee(&state.db().pool, assignee_id).await?,
        (None, Some(status)) => Task::find_by_status(&state.db().pool, status).await?,
        (None, None) => Task::find_all(&state.db().pool).await?,
    };
    Ok(ResponseJson(ApiResponse::success(tasks)))
}

pub async fn create_task(
    State(state): State<AppState>,
    Json(payload): Json<CreateTask>,
) -> Result<ResponseJson<ApiResponse<Task>>, ApiError> {
    if payload.code.trim().is_empty() {
        return Err(ApiError::BadRequest("task code must not be empty".to_string()));
    }
    tracing::debug!("Creating task '{}'", payload.code);
    let task = Task::create(&state.db().pool, &payload, Uuid::new_v4()).await?;
    Ok(ResponseJson(ApiResponse::success(task)))
}

pub async fn get_task(
    State(state): State<AppState>,
    Path(task_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<TaskDetails>>, ApiError> {
    let task = Task::find_by_id(&state.db().pool, task_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Task not found".to_string()))?;
    let requirements = task.effective_requirements(state.settings().step_defaults());
    Ok(ResponseJson(ApiResponse::success(TaskDetails {
        task,
        requirements,
    })))
}

#[derive(Debug, Default, Deserialize)]
pub struct StartTaskRequest {
    pub lat: Option<f64>,
    pub lng: Option<f64>,
}

pub async fn start_task(
    State(state): State<AppState>,
    Path(task_id): Path<Uuid>,
    payload: Option<Json<StartTaskRequest>>,
) -> Result<ResponseJson<ApiResponse<Task>>, ApiError> {
    let Json(payload) = payload.unwrap_or_default();
    let task = Task::start(&state.db().pool, task_id, payload.lat, payload.lng).await?;
    Ok(ResponseJson(ApiResponse::success(task)))
}

pub async fn complete_task(
    State(state): State<AppState>,
    Path(task_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<Task>>, ApiError> {
    let task = Task::end_task(&state.db().pool, task_id).await?;
    Ok(ResponseJson(ApiResponse::success(task)))
}

pub async fn reopen_task(
    State(state): State<AppState>,
    Path(task_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<Task>>, ApiError> {
    let task = Task::reopen(&state.db().pool, task_id).await?;
    Ok(ResponseJson(ApiResponse::success(task)))
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: TaskStatus,
}

pub async fn update_task_status(
    State(state): State<AppState>,
    Path(task_id): Path<Uuid>,
    Json(payload): Json<UpdateStatusRequest>,
) -> Result<ResponseJson<ApiResponse<Task>>, ApiError> {
    let task = Task::update_status(&state.db().pool, task_id, payload.status).await?;
    Ok(ResponseJson(ApiResponse::success(task)))
}

#[derive(Debug, Deserialize)]
pub struct SetStepRequest {
    pub value: bool,
}

pub async fn set_task_step(
    State(state): State<AppState>,
    Path((task_id, step)): Path<(Uuid, String)>,
    Json(payload): Json<SetStepRequest>,
) -> Result<ResponseJson<ApiResponse<Task>>, ApiError> {
    let step = ProgressStep::from_str(&step)
        .map_err(|_| ApiError::BadRequest(format!("unknown progress step '{step}'")))?;
    let task = Task::set_progress_step(&state.db().pool, task_id, step, payload.value).await?;
    Ok(ResponseJson(ApiResponse::success(task)))
}

pub fn router() -> Router<AppState> {
    let task_id_router = Router::new()
        .route("/", get(get_task))
        .route("/start", post(start_task))
        .route("/complete", post(complete_task))
        .route("/reopen", post(reopen_task))
        .route("/status", put(update_task_status))
        .route("/steps/{step}", put(set_task_step));

    Router::new()
        .route("/tasks", get(get_tasks).post(create_task))
        .nest("/tasks/{task_id}", task_id_router)
}
