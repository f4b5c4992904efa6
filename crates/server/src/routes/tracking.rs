use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    response::{IntoResponse, Json as ResponseJson},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use db::{
    models::tracking_sample::TrackingSample,
    types::MovementType,
};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use services::services::{events::LiveEvent, tracking::LocationPing};
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use utils::{pubsub::Topic, response::ApiResponse};
use uuid::Uuid;

use crate::{error::ApiError, AppState};

#[derive(Debug, Deserialize)]
pub struct LocationPingRequest {
    pub lat: f64,
    pub lng: f64,
    pub recorded_at: Option<DateTime<Utc>>,
    pub battery_percent: Option<i32>,
    pub movement_type: Option<MovementType>,
}

pub async fn ingest_location(
    State(state): State<AppState>,
    Path(task_id): Path<Uuid>,
    Json(payload): Json<LocationPingRequest>,
) -> Result<ResponseJson<ApiResponse<LiveEvent>>, ApiError> {
    let ping = LocationPing {
        lat: payload.lat,
        lng: payload.lng,
        recorded_at: payload.recorded_at,
        battery_percent: payload.battery_percent,
        movement_type: payload.movement_type,
    };
    let event = state
        .tracking()
        .ingest(&state.db().pool, task_id, ping)
        .await?;
    Ok(ResponseJson(ApiResponse::success(event)))
}

#[derive(Debug, Default, Deserialize)]
pub struct ExitRequest {
    pub reason: Option<String>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
}

pub async fn record_exit(
    State(state): State<AppState>,
    Path(task_id): Path<Uuid>,
    payload: Option<Json<ExitRequest>>,
) -> Result<ResponseJson<ApiResponse<LiveEvent>>, ApiError> {
    let Json(payload) = payload.unwrap_or_default();
    let event = state
        .tracking()
        .record_exit(
            &state.db().pool,
            task_id,
            payload.reason,
            payload.lat,
            payload.lng,
        )
        .await?;
    Ok(ResponseJson(ApiResponse::success(event)))
}

pub async fn record_resume(
    State(state): State<AppState>,
    Path(task_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<LiveEvent>>, ApiError> {
    let event = state
        .tracking()
        .record_resume(&state.db().pool, task_id)
        .await?;
    Ok(ResponseJson(ApiResponse::success(event)))
}

/// The durable log, for subscribers that joined after the fact.
pub async fn get_tracking_history(
    State(state): State<AppState>,
    Path(task_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<Vec<TrackingSample>>>, ApiError> {
    let samples = TrackingSample::find_by_task_id(&state.db().pool, task_id).await?;
    Ok(ResponseJson(ApiResponse::success(samples)))
}

pub async fn stream_task_ws(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path(task_id): Path<Uuid>,
) -> impl IntoResponse {
    serve_topic_ws(ws, state, Topic::Task(task_id))
}

pub async fn stream_admin_ws(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    serve_topic_ws(ws, state, Topic::AdminTracking)
}

pub async fn stream_staff_ws(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path(staff_id): Path<Uuid>,
) -> impl IntoResponse {
    serve_topic_ws(ws, state, Topic::AdminStaff(staff_id))
}

fn serve_topic_ws(ws: WebSocketUpgrade, state: AppState, topic: Topic) -> impl IntoResponse {
    ws.on_upgrade(move |socket| async move {
        if let Err(e) = forward_topic(socket, state, topic).await {
            tracing::warn!("tracking WS closed: {}", e);
        }
    })
}

async fn forward_topic(socket: WebSocket, state: AppState, topic: Topic) -> anyhow::Result<()> {
    let mut stream = state.broker().stream(&topic);

    let (mut sender, mut receiver) = socket.split();

    // Drain (and ignore) any client->server messages so pings/pongs work
    tokio::spawn(async move { while let Some(Ok(_)) = receiver.next().await {} });

    while let Some(item) = stream.next().await {
        match item {
            Ok(event) => {
                let text = serde_json::to_string(&event)?;
                if sender.send(Message::Text(text.into())).await.is_err() {
                    break; // client disconnected
                }
            }
            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                // At-most-once delivery: a slow consumer loses the oldest
                // events rather than stalling the publisher.
                tracing::warn!(%topic, skipped, "subscriber lagged");
                continue;
            }
        }
    }
    let _ = sender.close().await;
    Ok(())
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/tasks/{task_id}/location", post(ingest_location))
        .route("/tasks/{task_id}/exit", post(record_exit))
        .route("/tasks/{task_id}/resume", post(record_resume))
        .route("/tasks/{task_id}/history", get(get_tracking_history))
        .route("/tasks/{task_id}/tracking/ws", get(stream_task_ws))
        .route("/admin/tracking/ws", get(stream_admin_ws))
        .route(
            "/admin/staff/{staff_id}/tracking/ws",
            get(stream_staff_ws),
        )
}
