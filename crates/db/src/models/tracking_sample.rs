use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder,
    Set,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::{entities::tracking_sample, models::ids, types::MovementType};

#[derive(Debug, Error)]
pub enum TrackingSampleError {
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error("Task not found")]
    TaskNotFound,
    #[error("Staff member not found")]
    StaffNotFound,
}

/// One entry of the append-only tracking log. Unlike the bounded live-view
/// history, samples are never trimmed; the timeline is rebuilt from them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingSample {
    pub id: Uuid,
    pub task_id: Uuid,
    pub staff_id: Uuid,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub battery_percent: Option<i32>,
    pub movement_type: Option<MovementType>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub arrived: bool,
    pub exited: bool,
    pub exit_reason: Option<String>,
    pub resumed: bool,
    pub recorded_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateTrackingSample {
    pub task_id: Uuid,
    pub staff_id: Uuid,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub battery_percent: Option<i32>,
    pub movement_type: Option<MovementType>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub arrived: bool,
    pub exited: bool,
    pub exit_reason: Option<String>,
    pub resumed: bool,
    pub recorded_at: DateTime<Utc>,
}

impl CreateTrackingSample {
    /// A plain movement ping.
    pub fn location(
        task_id: Uuid,
        staff_id: Uuid,
        lat: f64,
        lng: f64,
        recorded_at: DateTime<Utc>,
    ) -> Self {
        Self {
            task_id,
            staff_id,
            lat: Some(lat),
            lng: Some(lng),
            battery_percent: None,
            movement_type: None,
            address: None,
            city: None,
            arrived: false,
            exited: false,
            exit_reason: None,
            resumed: false,
            recorded_at,
        }
    }

    /// Geofence-confirmed arrival event.
    pub fn arrival(
        task_id: Uuid,
        staff_id: Uuid,
        lat: f64,
        lng: f64,
        recorded_at: DateTime<Utc>,
    ) -> Self {
        Self {
            arrived: true,
            ..Self::location(task_id, staff_id, lat, lng, recorded_at)
        }
    }

    /// The worker left the site before completion; `reason` is free text.
    pub fn exit(
        task_id: Uuid,
        staff_id: Uuid,
        reason: Option<String>,
        recorded_at: DateTime<Utc>,
    ) -> Self {
        Self {
            task_id,
            staff_id,
            lat: None,
            lng: None,
            battery_percent: None,
            movement_type: None,
            address: None,
            city: None,
            arrived: false,
            exited: true,
            exit_reason: reason,
            resumed: false,
            recorded_at,
        }
    }

    /// Work resumed after an exit.
    pub fn resume(task_id: Uuid, staff_id: Uuid, recorded_at: DateTime<Utc>) -> Self {
        Self {
            task_id,
            staff_id,
            lat: None,
            lng: None,
            battery_percent: None,
            movement_type: None,
            address: None,
            city: None,
            arrived: false,
            exited: false,
            exit_reason: None,
            resumed: true,
            recorded_at,
        }
    }
}

impl TrackingSample {
    async fn from_model<C: ConnectionTrait>(
        db: &C,
        model: tracking_sample::Model,
    ) -> Result<Self, DbErr> {
        let task_id = ids::task_uuid_by_id(db, model.task_id)
            .await?
            .ok_or(DbErr::RecordNotFound("Task not found".to_string()))?;
        let staff_id = ids::staff_uuid_by_id(db, model.staff_id)
            .await?
            .ok_or(DbErr::RecordNotFound("Staff member not found".to_string()))?;
        Ok(Self {
            id: model.uuid,
            task_id,
            staff_id,
            lat: model.lat,
            lng: model.lng,
            battery_percent: model.battery_percent,
            movement_type: model.movement_type,
            address: model.address,
            city: model.city,
            arrived: model.arrived,
            exited: model.exited,
            exit_reason: model.exit_reason,
            resumed: model.resumed,
            recorded_at: model.recorded_at,
            created_at: model.created_at,
        })
    }

    pub async fn create<C: ConnectionTrait>(
        db: &C,
        data: &CreateTrackingSample,
    ) -> Result<Self, TrackingSampleError> {
        let task_row_id = ids::task_id_by_uuid(db, data.task_id)
            .await?
            .ok_or(TrackingSampleError::TaskNotFound)?;
        let staff_row_id = ids::staff_id_by_uuid(db, data.staff_id)
            .await?
            .ok_or(TrackingSampleError::StaffNotFound)?;

        let active = tracking_sample::ActiveModel {
            uuid: Set(Uuid::new_v4()),
            task_id: Set(task_row_id),
            staff_id: Set(staff_row_id),
            lat: Set(data.lat),
            lng: Set(data.lng),
            battery_percent: Set(data.battery_percent),
            movement_type: Set(data.movement_type),
            address: Set(data.address.clone()),
            city: Set(data.city.clone()),
            arrived: Set(data.arrived),
            exited: Set(data.exited),
            exit_reason: Set(data.exit_reason.clone()),
            resumed: Set(data.resumed),
            recorded_at: Set(data.recorded_at),
            created_at: Set(Utc::now()),
            ..Default::default()
        };
        let model = active.insert(db).await?;
        Ok(Self::from_model(db, model).await?)
    }

    /// Full durable log for a task in chronological order.
    pub async fn find_by_task_id<C: ConnectionTrait>(
        db: &C,
        task_id: Uuid,
    ) -> Result<Vec<Self>, TrackingSampleError> {
        let task_row_id = ids::task_id_by_uuid(db, task_id)
            .await?
            .ok_or(TrackingSampleError::TaskNotFound)?;

        let models = tracking_sample::Entity::find()
            .filter(tracking_sample::Column::TaskId.eq(task_row_id))
            .order_by_asc(tracking_sample::Column::RecordedAt)
            .order_by_asc(tracking_sample::Column::Id)
            .all(db)
            .await?;

        let mut samples = Vec::with_capacity(models.len());
        for model in models {
            samples.push(Self::from_model(db, model).await?);
        }
        Ok(samples)
    }
}

#[cfg(test)]
mod tests {
    use sea_orm::Database;
    use sea_orm_migration::MigratorTrait;

    use super::*;
    use crate::models::{
        customer::{CreateCustomer, Customer},
        staff::{CreateStaff, Staff},
        task::{CreateTask, Task},
    };

    async fn setup() -> (sea_orm::DatabaseConnection, Uuid, Uuid) {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        db_migration::Migrator::up(&db, None).await.unwrap();

        let staff = Staff::create(
            &db,
            &CreateStaff {
                name: "Meena".to_string(),
                email: None,
                phone: None,
            },
            Uuid::new_v4(),
        )
        .await
        .unwrap();
        let customer = Customer::create(
            &db,
            &CreateCustomer {
                name: "Gamma Foods".to_string(),
                email: None,
                phone: None,
                address: None,
                lat: Some(12.9716),
                lng: Some(77.5946),
                geofence_radius_m: None,
            },
            Uuid::new_v4(),
        )
        .await
        .unwrap();
        let task = Task::create(
            &db,
            &CreateTask {
                code: "TSK-LOG".to_string(),
                customer_id: customer.id,
                assignee_id: staff.id,
                expected_at: Utc::now(),
                otp_required: None,
                geofence_required: None,
                photo_required: None,
                form_required: None,
                geofence_radius_m: None,
            },
            Uuid::new_v4(),
        )
        .await
        .unwrap();

        (db, task.id, staff.id)
    }

    #[tokio::test]
    async fn log_is_append_only_and_chronological() {
        let (db, task_id, staff_id) = setup().await;

        let base = Utc::now();
        for n in 0..3 {
            let sample = CreateTrackingSample::location(
                task_id,
                staff_id,
                12.0 + n as f64 * 0.01,
                77.0,
                base + chrono::Duration::seconds(n * 30),
            );
            TrackingSample::create(&db, &sample).await.unwrap();
        }
        TrackingSample::create(
            &db,
            &CreateTrackingSample::arrival(
                task_id,
                staff_id,
                12.03,
                77.0,
                base + chrono::Duration::seconds(120),
            ),
        )
        .await
        .unwrap();

        let log = TrackingSample::find_by_task_id(&db, task_id).await.unwrap();
        assert_eq!(log.len(), 4);
        assert!(log.windows(2).all(|w| w[0].recorded_at <= w[1].recorded_at));
        assert!(log[3].arrived);
        assert_eq!(log[0].lat, Some(12.0));
    }

    #[tokio::test]
    async fn exit_and_resume_events_carry_no_coordinates() {
        let (db, task_id, staff_id) = setup().await;

        let at = Utc::now();
        let exit = TrackingSample::create(
            &db,
            &CreateTrackingSample::exit(
                task_id,
                staff_id,
                Some("lunch break".to_string()),
                at,
            ),
        )
        .await
        .unwrap();
        assert!(exit.exited);
        assert_eq!(exit.exit_reason.as_deref(), Some("lunch break"));
        assert!(exit.lat.is_none());

        let resume = TrackingSample::create(
            &db,
            &CreateTrackingSample::resume(task_id, staff_id, at + chrono::Duration::minutes(30)),
        )
        .await
        .unwrap();
        assert!(resume.resumed);
        assert!(!resume.exited);
    }

    #[tokio::test]
    async fn unknown_task_is_rejected() {
        let (db, _, staff_id) = setup().await;
        let err = TrackingSample::create(
            &db,
            &CreateTrackingSample::location(Uuid::new_v4(), staff_id, 12.0, 77.0, Utc::now()),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, TrackingSampleError::TaskNotFound));
    }
}
