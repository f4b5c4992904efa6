//! Live location ingestion: one bounded write, one durable write, then
//! fan-out. Reverse geocoding is best-effort and never fails a ping.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use db::{
    models::{
        task::{LocationPoint, Task, TaskError},
        tracking_sample::{CreateTrackingSample, TrackingSample, TrackingSampleError},
    },
    types::MovementType,
    ConnectionTrait, DbErr, TransactionTrait,
};
use thiserror::Error;
use tracing::warn;
use utils::{geo, pubsub::Broker};
use uuid::Uuid;

use crate::services::{
    config::CompanySettings,
    events::{LiveEvent, LiveEventKind},
    geocode::{GeocodedPlace, ReverseGeocoder},
};

#[derive(Debug, Error)]
pub enum TrackingError {
    #[error("Coordinates out of range")]
    InvalidCoordinates,
    #[error("Task not found")]
    TaskNotFound,
    #[error(transparent)]
    Database(#[from] DbErr),
}

impl From<TaskError> for TrackingError {
    fn from(err: TaskError) -> Self {
        match err {
            TaskError::NotFound => Self::TaskNotFound,
            TaskError::Database(e) => Self::Database(e),
            other => Self::Database(DbErr::Custom(other.to_string())),
        }
    }
}

impl From<TrackingSampleError> for TrackingError {
    fn from(err: TrackingSampleError) -> Self {
        match err {
            TrackingSampleError::TaskNotFound | TrackingSampleError::StaffNotFound => {
                Self::TaskNotFound
            }
            TrackingSampleError::Database(e) => Self::Database(e),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LocationPing {
    pub lat: f64,
    pub lng: f64,
    /// Client-side capture time; server receipt time when absent.
    pub recorded_at: Option<DateTime<Utc>>,
    pub battery_percent: Option<i32>,
    pub movement_type: Option<MovementType>,
}

pub struct TrackingGateway {
    settings: CompanySettings,
    geocoder: Arc<dyn ReverseGeocoder>,
    broker: Arc<Broker<LiveEvent>>,
}

impl TrackingGateway {
    pub fn new(
        settings: CompanySettings,
        geocoder: Arc<dyn ReverseGeocoder>,
        broker: Arc<Broker<LiveEvent>>,
    ) -> Self {
        Self {
            settings,
            geocoder,
            broker,
        }
    }

    /// Ingest one ping: bounded history append, durable sample insert,
    /// three-topic fan-out. Persistence completes before any publish.
    pub async fn ingest<C: ConnectionTrait + TransactionTrait>(
        &self,
        db: &C,
        task_id: Uuid,
        ping: LocationPing,
    ) -> Result<LiveEvent, TrackingError> {
        if !geo::valid_coordinates(ping.lat, ping.lng) {
            return Err(TrackingError::InvalidCoordinates);
        }

        let task = Task::find_by_id(db, task_id)
            .await?
            .ok_or(TrackingError::TaskNotFound)?;
        let recorded_at = ping.recorded_at.unwrap_or_else(Utc::now);

        let point = LocationPoint {
            lat: ping.lat,
            lng: ping.lng,
            battery_percent: ping.battery_percent,
            recorded_at,
        };
        Task::append_location(db, task_id, &point, self.settings.location_history_cap).await?;

        let place = self.lookup_place(ping.lat, ping.lng).await;

        let sample = CreateTrackingSample {
            battery_percent: ping.battery_percent,
            movement_type: ping.movement_type,
            address: place.address.clone(),
            city: place.city.clone(),
            ..CreateTrackingSample::location(
                task_id,
                task.assignee_id,
                ping.lat,
                ping.lng,
                recorded_at,
            )
        };
        TrackingSample::create(db, &sample).await?;

        let event = LiveEvent {
            kind: LiveEventKind::Location,
            task_id,
            staff_id: task.assignee_id,
            lat: Some(ping.lat),
            lng: Some(ping.lng),
            battery_percent: ping.battery_percent,
            movement_type: ping.movement_type,
            address: place.address,
            city: place.city,
            exit_reason: None,
            recorded_at,
        };
        self.fan_out(&event);
        Ok(event)
    }

    /// The worker left the site before finishing.
    pub async fn record_exit<C: ConnectionTrait>(
        &self,
        db: &C,
        task_id: Uuid,
        reason: Option<String>,
        lat: Option<f64>,
        lng: Option<f64>,
    ) -> Result<LiveEvent, TrackingError> {
        let task = Task::find_by_id(db, task_id)
            .await?
            .ok_or(TrackingError::TaskNotFound)?;
        let now = Utc::now();

        let sample = CreateTrackingSample {
            lat,
            lng,
            ..CreateTrackingSample::exit(task_id, task.assignee_id, reason.clone(), now)
        };
        TrackingSample::create(db, &sample).await?;

        let event = LiveEvent {
            kind: LiveEventKind::Exit,
            task_id,
            staff_id: task.assignee_id,
            lat,
            lng,
            battery_percent: None,
            movement_type: None,
            address: None,
            city: None,
            exit_reason: reason,
            recorded_at: now,
        };
        self.fan_out(&event);
        Ok(event)
    }

    /// Work resumed after an exit.
    pub async fn record_resume<C: ConnectionTrait>(
        &self,
        db: &C,
        task_id: Uuid,
    ) -> Result<LiveEvent, TrackingError> {
        let task = Task::find_by_id(db, task_id)
            .await?
            .ok_or(TrackingError::TaskNotFound)?;
        let now = Utc::now();

        TrackingSample::create(
            db,
            &CreateTrackingSample::resume(task_id, task.assignee_id, now),
        )
        .await?;

        let event = LiveEvent {
            kind: LiveEventKind::Resume,
            task_id,
            staff_id: task.assignee_id,
            lat: None,
            lng: None,
            battery_percent: None,
            movement_type: None,
            address: None,
            city: None,
            exit_reason: None,
            recorded_at: now,
        };
        self.fan_out(&event);
        Ok(event)
    }

    async fn lookup_place(&self, lat: f64, lng: f64) -> GeocodedPlace {
        match tokio::time::timeout(
            self.settings.geocode_timeout,
            self.geocoder.reverse(lat, lng),
        )
        .await
        {
            Ok(Ok(place)) => place,
            Ok(Err(err)) => {
                warn!("reverse geocode failed: {err}");
                GeocodedPlace::default()
            }
            Err(_) => {
                warn!("reverse geocode timed out");
                GeocodedPlace::default()
            }
        }
    }

    fn fan_out(&self, event: &LiveEvent) {
        for topic in event.topics() {
            self.broker.publish(&topic, event.clone());
        }
    }
}
