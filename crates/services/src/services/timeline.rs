//! Post-hoc timeline reconstruction. Derived entirely from the durable
//! tracking log and the task's audit stamps; recomputed per request and
//! never persisted.

use chrono::{DateTime, Utc};
use db::{
    models::{
        task::{Task, TaskError},
        tracking_sample::{TrackingSample, TrackingSampleError},
    },
    types::MovementType,
    ConnectionTrait, DbErr,
};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum TimelineError {
    #[error("Task not found")]
    TaskNotFound,
    #[error(transparent)]
    Database(#[from] DbErr),
}

impl From<TaskError> for TimelineError {
    fn from(err: TaskError) -> Self {
        match err {
            TaskError::NotFound => Self::TaskNotFound,
            TaskError::Database(e) => Self::Database(e),
            other => Self::Database(DbErr::Custom(other.to_string())),
        }
    }
}

impl From<TrackingSampleError> for TimelineError {
    fn from(err: TrackingSampleError) -> Self {
        match err {
            TrackingSampleError::TaskNotFound | TrackingSampleError::StaffNotFound => {
                Self::TaskNotFound
            }
            TrackingSampleError::Database(e) => Self::Database(e),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkerKind {
    Start,
    Arrived,
    Movement,
    Exit,
    Restart,
    Completed,
}

#[derive(Debug, Clone, Serialize)]
pub struct TimelineMarker {
    pub kind: MarkerKind,
    /// Missing times sort first rather than erroring.
    pub at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lat: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lng: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub movement_type: Option<MovementType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RoutePoint {
    pub lat: f64,
    pub lng: f64,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Timeline {
    pub task: Task,
    pub markers: Vec<TimelineMarker>,
    pub route: Vec<RoutePoint>,
}

pub async fn reconstruct<C: ConnectionTrait>(
    db: &C,
    task_id: Uuid,
) -> Result<Timeline, TimelineError> {
    let task = Task::find_by_id(db, task_id)
        .await?
        .ok_or(TimelineError::TaskNotFound)?;
    let samples = TrackingSample::find_by_task_id(db, task_id).await?;

    let history = Task::location_history(db, task_id).await?;
    let route: Vec<RoutePoint> = if history.is_empty() {
        // Fall back to the durable log when the bounded view has nothing.
        samples
            .iter()
            .filter_map(|s| match (s.lat, s.lng) {
                (Some(lat), Some(lng)) => Some(RoutePoint {
                    lat,
                    lng,
                    recorded_at: s.recorded_at,
                }),
                _ => None,
            })
            .collect()
    } else {
        history
            .into_iter()
            .map(|p| RoutePoint {
                lat: p.lat,
                lng: p.lng,
                recorded_at: p.recorded_at,
            })
            .collect()
    };

    let mut markers = Vec::new();

    if let Some(started_at) = task.started_at {
        markers.push(TimelineMarker {
            kind: MarkerKind::Start,
            at: Some(started_at),
            lat: task.start_lat,
            lng: task.start_lng,
            movement_type: None,
            detail: None,
        });
    }

    // Arrival comes from the first arrival-marked sample, or from the
    // task-level stamp when no sample carries it. Never both.
    if let Some(sample) = samples.iter().find(|s| s.arrived) {
        markers.push(TimelineMarker {
            kind: MarkerKind::Arrived,
            at: Some(sample.recorded_at),
            lat: sample.lat,
            lng: sample.lng,
            movement_type: None,
            detail: sample.address.clone(),
        });
    } else if let Some(arrived_at) = task.arrived_at {
        markers.push(TimelineMarker {
            kind: MarkerKind::Arrived,
            at: Some(arrived_at),
            lat: task.arrived_lat,
            lng: task.arrived_lng,
            movement_type: None,
            detail: None,
        });
    }

    let mut last_exit_at: Option<DateTime<Utc>> = None;
    let mut last_movement: Option<MovementType> = None;
    for sample in &samples {
        if sample.exited {
            // Duplicate exit reports at the same instant collapse to one.
            if last_exit_at != Some(sample.recorded_at) {
                markers.push(TimelineMarker {
                    kind: MarkerKind::Exit,
                    at: Some(sample.recorded_at),
                    lat: sample.lat,
                    lng: sample.lng,
                    movement_type: None,
                    detail: sample.exit_reason.clone(),
                });
                last_exit_at = Some(sample.recorded_at);
            }
            continue;
        }
        if sample.resumed {
            markers.push(TimelineMarker {
                kind: MarkerKind::Restart,
                at: Some(sample.recorded_at),
                lat: sample.lat,
                lng: sample.lng,
                movement_type: None,
                detail: None,
            });
            continue;
        }
        if let Some(movement) = sample.movement_type {
            // Only transitions matter; a run of identical types collapses.
            if last_movement != Some(movement) {
                markers.push(TimelineMarker {
                    kind: MarkerKind::Movement,
                    at: Some(sample.recorded_at),
                    lat: sample.lat,
                    lng: sample.lng,
                    movement_type: Some(movement),
                    detail: None,
                });
                last_movement = Some(movement);
            }
        }
    }

    if let Some(completed_at) = task.completed_at {
        markers.push(TimelineMarker {
            kind: MarkerKind::Completed,
            at: Some(completed_at),
            lat: None,
            lng: None,
            movement_type: None,
            detail: None,
        });
    }

    sort_markers(&mut markers);
    Ok(Timeline {
        task,
        markers,
        route,
    })
}

/// Ascending by time; a marker without a time sorts before everything.
fn sort_markers(markers: &mut [TimelineMarker]) {
    markers.sort_by_key(|m| m.at.unwrap_or(DateTime::<Utc>::MIN_UTC));
}
