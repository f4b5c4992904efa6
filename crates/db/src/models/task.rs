use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, TransactionSession, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::{
    entities::{task, task_location_point},
    models::ids,
    types::{ProgressStep, TaskStatus},
};

#[derive(Debug, Error)]
pub enum TaskError {
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error("Task not found")]
    NotFound,
    #[error("Customer not found")]
    CustomerNotFound,
    #[error("Staff member not found")]
    StaffNotFound,
    #[error("Invalid status transition: {from} -> {to}")]
    InvalidTransition { from: TaskStatus, to: TaskStatus },
}

/// The four independent proof-gathering gates. The store accepts any flag in
/// any order; unlock ordering is service-layer policy so that offline
/// clients whose updates arrive late are not rejected here.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ProgressSteps {
    pub reached_location: bool,
    pub photo_proof: bool,
    pub form_filled: bool,
    pub otp_verified: bool,
}

/// Which steps a task actually requires, after merging the task-level
/// overrides with the company-wide defaults.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepRequirements {
    pub otp: bool,
    pub geofence: bool,
    pub photo: bool,
    pub form: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub code: String,
    pub customer_id: Uuid,
    pub assignee_id: Uuid,
    pub status: TaskStatus,
    pub expected_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub start_lat: Option<f64>,
    pub start_lng: Option<f64>,
    pub completed_at: Option<DateTime<Utc>>,
    pub progress: ProgressSteps,
    pub otp_verified_at: Option<DateTime<Utc>>,
    pub otp_verified_lat: Option<f64>,
    pub otp_verified_lng: Option<f64>,
    pub otp_verified_address: Option<String>,
    pub arrived_at: Option<DateTime<Utc>>,
    pub arrived_lat: Option<f64>,
    pub arrived_lng: Option<f64>,
    pub otp_required: Option<bool>,
    pub geofence_required: Option<bool>,
    pub photo_required: Option<bool>,
    pub form_required: Option<bool>,
    pub geofence_radius_m: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateTask {
    pub code: String,
    pub customer_id: Uuid,
    pub assignee_id: Uuid,
    pub expected_at: DateTime<Utc>,
    #[serde(default)]
    pub otp_required: Option<bool>,
    #[serde(default)]
    pub geofence_required: Option<bool>,
    #[serde(default)]
    pub photo_required: Option<bool>,
    #[serde(default)]
    pub form_required: Option<bool>,
    #[serde(default)]
    pub geofence_radius_m: Option<f64>,
}

/// One entry of the bounded live-view history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationPoint {
    pub lat: f64,
    pub lng: f64,
    pub battery_percent: Option<i32>,
    pub recorded_at: DateTime<Utc>,
}

impl Task {
    async fn from_model<C: ConnectionTrait>(db: &C, model: task::Model) -> Result<Self, DbErr> {
        let customer_id = ids::customer_uuid_by_id(db, model.customer_id)
            .await?
            .ok_or(DbErr::RecordNotFound("Customer not found".to_string()))?;
        let assignee_id = ids::staff_uuid_by_id(db, model.assignee_id)
            .await?
            .ok_or(DbErr::RecordNotFound("Staff member not found".to_string()))?;

        Ok(Self {
            id: model.uuid,
            code: model.code,
            customer_id,
            assignee_id,
            status: model.status,
            expected_at: model.expected_at,
            started_at: model.started_at,
            start_lat: model.start_lat,
            start_lng: model.start_lng,
            completed_at: model.completed_at,
            progress: ProgressSteps {
                reached_location: model.reached_location,
                photo_proof: model.photo_proof,
                form_filled: model.form_filled,
                otp_verified: model.otp_verified,
            },
            otp_verified_at: model.otp_verified_at,
            otp_verified_lat: model.otp_verified_lat,
            otp_verified_lng: model.otp_verified_lng,
            otp_verified_address: model.otp_verified_address,
            arrived_at: model.arrived_at,
            arrived_lat: model.arrived_lat,
            arrived_lng: model.arrived_lng,
            otp_required: model.otp_required,
            geofence_required: model.geofence_required,
            photo_required: model.photo_required,
            form_required: model.form_required,
            geofence_radius_m: model.geofence_radius_m,
            created_at: model.created_at,
            updated_at: model.updated_at,
        })
    }

    async fn find_record<C: ConnectionTrait>(db: &C, id: Uuid) -> Result<task::Model, TaskError> {
        task::Entity::find()
            .filter(task::Column::Uuid.eq(id))
            .one(db)
            .await?
            .ok_or(TaskError::NotFound)
    }

    /// Merge per-task overrides with the company defaults. An explicit
    /// task-level value always wins, so a task marked `false` stays exempt
    /// even when the organization requires the step by default.
    pub fn effective_requirements(&self, defaults: StepRequirements) -> StepRequirements {
        StepRequirements {
            otp: self.otp_required.unwrap_or(defaults.otp),
            geofence: self.geofence_required.unwrap_or(defaults.geofence),
            photo: self.photo_required.unwrap_or(defaults.photo),
            form: self.form_required.unwrap_or(defaults.form),
        }
    }

    pub async fn create<C: ConnectionTrait>(
        db: &C,
        data: &CreateTask,
        task_id: Uuid,
    ) -> Result<Self, TaskError> {
        let customer_row_id = ids::customer_id_by_uuid(db, data.customer_id)
            .await?
            .ok_or(TaskError::CustomerNotFound)?;
        let assignee_row_id = ids::staff_id_by_uuid(db, data.assignee_id)
            .await?
            .ok_or(TaskError::StaffNotFound)?;

        let now = Utc::now();
        let active = task::ActiveModel {
            uuid: Set(task_id),
            code: Set(data.code.clone()),
            customer_id: Set(customer_row_id),
            assignee_id: Set(assignee_row_id),
            status: Set(TaskStatus::Assigned),
            expected_at: Set(data.expected_at),
            otp_required: Set(data.otp_required),
            geofence_required: Set(data.geofence_required),
            photo_required: Set(data.photo_required),
            form_required: Set(data.form_required),
            geofence_radius_m: Set(data.geofence_radius_m),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };

        let model = active.insert(db).await?;
        Ok(Self::from_model(db, model).await?)
    }

    pub async fn find_by_id<C: ConnectionTrait>(
        db: &C,
        id: Uuid,
    ) -> Result<Option<Self>, DbErr> {
        let record = task::Entity::find()
            .filter(task::Column::Uuid.eq(id))
            .one(db)
            .await?;
        match record {
            Some(model) => Ok(Some(Self::from_model(db, model).await?)),
            None => Ok(None),
        }
    }

    pub async fn find_by_code<C: ConnectionTrait>(
        db: &C,
        code: &str,
    ) -> Result<Option<Self>, DbErr> {
        let record = task::Entity::find()
            .filter(task::Column::Code.eq(code))
            .one(db)
            .await?;
        match record {
            Some(model) => Ok(Some(Self::from_model(db, model).await?)),
            None => Ok(None),
        }
    }

    pub async fn find_all<C: ConnectionTrait>(db: &C) -> Result<Vec<Self>, DbErr> {
        let models = task::Entity::find()
            .order_by_desc(task::Column::CreatedAt)
            .all(db)
            .await?;
        let mut tasks = Vec::with_capacity(models.len());
        for model in models {
            tasks.push(Self::from_model(db, model).await?);
        }
        Ok(tasks)
    }

    pub async fn find_by_status<C: ConnectionTrait>(
        db: &C,
        status: TaskStatus,
    ) -> Result<Vec<Self>, DbErr> {
        let models = task::Entity::find()
            .filter(task::Column::Status.eq(status))
            .order_by_desc(task::Column::CreatedAt)
            .all(db)
            .await?;
        let mut tasks = Vec::with_capacity(models.len());
        for model in models {
            tasks.push(Self::from_model(db, model).await?);
        }
        Ok(tasks)
    }

    pub async fn find_by_assignee<C: ConnectionTrait>(
        db: &C,
        assignee_id: Uuid,
    ) -> Result<Vec<Self>, DbErr> {
        let Some(staff_row_id) = ids::staff_id_by_uuid(db, assignee_id).await? else {
            return Ok(Vec::new());
        };
        let models = task::Entity::find()
            .filter(task::Column::AssigneeId.eq(staff_row_id))
            .order_by_desc(task::Column::CreatedAt)
            .all(db)
            .await?;
        let mut tasks = Vec::with_capacity(models.len());
        for model in models {
            tasks.push(Self::from_model(db, model).await?);
        }
        Ok(tasks)
    }

    /// Move to `status`, rejecting anything outside the transition table.
    pub async fn update_status<C: ConnectionTrait>(
        db: &C,
        id: Uuid,
        status: TaskStatus,
    ) -> Result<Self, TaskError> {
        let record = Self::find_record(db, id).await?;
        if !record.status.can_transition_to(status) {
            return Err(TaskError::InvalidTransition {
                from: record.status,
                to: status,
            });
        }

        let mut active: task::ActiveModel = record.into();
        active.status = Set(status);
        active.updated_at = Set(Utc::now());
        let updated = active.update(db).await?;
        Ok(Self::from_model(db, updated).await?)
    }

    /// Begin execution: scheduled (or reopened) -> in_progress, stamping the
    /// start time and location. A restart after reopening keeps the original
    /// start stamp for the audit trail.
    pub async fn start<C: ConnectionTrait>(
        db: &C,
        id: Uuid,
        lat: Option<f64>,
        lng: Option<f64>,
    ) -> Result<Self, TaskError> {
        let record = Self::find_record(db, id).await?;
        if !record.status.can_transition_to(TaskStatus::InProgress) {
            return Err(TaskError::InvalidTransition {
                from: record.status,
                to: TaskStatus::InProgress,
            });
        }

        let already_started = record.started_at.is_some();
        let mut active: task::ActiveModel = record.into();
        active.status = Set(TaskStatus::InProgress);
        if !already_started {
            active.started_at = Set(Some(Utc::now()));
            active.start_lat = Set(lat);
            active.start_lng = Set(lng);
        }
        active.updated_at = Set(Utc::now());
        let updated = active.update(db).await?;
        Ok(Self::from_model(db, updated).await?)
    }

    /// Explicit caller action; does not gate on step completion (the API
    /// layer owns that policy).
    pub async fn end_task<C: ConnectionTrait>(db: &C, id: Uuid) -> Result<Self, TaskError> {
        let record = Self::find_record(db, id).await?;
        if !record.status.can_transition_to(TaskStatus::Completed) {
            return Err(TaskError::InvalidTransition {
                from: record.status,
                to: TaskStatus::Completed,
            });
        }

        let mut active: task::ActiveModel = record.into();
        active.status = Set(TaskStatus::Completed);
        active.completed_at = Set(Some(Utc::now()));
        active.updated_at = Set(Utc::now());
        let updated = active.update(db).await?;
        Ok(Self::from_model(db, updated).await?)
    }

    pub async fn reopen<C: ConnectionTrait>(db: &C, id: Uuid) -> Result<Self, TaskError> {
        Self::update_status(db, id, TaskStatus::Reopened).await
    }

    /// Set one progress flag. Deliberately permissive: no ordering check, so
    /// late-arriving updates from offline clients are never dropped here.
    pub async fn set_progress_step<C: ConnectionTrait>(
        db: &C,
        id: Uuid,
        step: ProgressStep,
        value: bool,
    ) -> Result<Self, TaskError> {
        let record = Self::find_record(db, id).await?;
        let mut active: task::ActiveModel = record.into();
        match step {
            ProgressStep::ReachedLocation => active.reached_location = Set(value),
            ProgressStep::PhotoProof => active.photo_proof = Set(value),
            ProgressStep::FormFilled => active.form_filled = Set(value),
            ProgressStep::OtpVerified => active.otp_verified = Set(value),
        }
        active.updated_at = Set(Utc::now());
        let updated = active.update(db).await?;
        Ok(Self::from_model(db, updated).await?)
    }

    /// Geofence-confirmed arrival: flips the flag and stamps when and where.
    pub async fn record_arrival<C: ConnectionTrait>(
        db: &C,
        id: Uuid,
        at: DateTime<Utc>,
        lat: f64,
        lng: f64,
    ) -> Result<Self, TaskError> {
        let record = Self::find_record(db, id).await?;
        let mut active: task::ActiveModel = record.into();
        active.reached_location = Set(true);
        active.arrived_at = Set(Some(at));
        active.arrived_lat = Set(Some(lat));
        active.arrived_lng = Set(Some(lng));
        active.updated_at = Set(Utc::now());
        let updated = active.update(db).await?;
        Ok(Self::from_model(db, updated).await?)
    }

    /// The flag alone is insufficient for audit: verification time and
    /// location are stamped together with it.
    pub async fn record_otp_verification<C: ConnectionTrait>(
        db: &C,
        id: Uuid,
        at: DateTime<Utc>,
        lat: Option<f64>,
        lng: Option<f64>,
        address: Option<String>,
    ) -> Result<Self, TaskError> {
        let record = Self::find_record(db, id).await?;
        let mut active: task::ActiveModel = record.into();
        active.otp_verified = Set(true);
        active.otp_verified_at = Set(Some(at));
        active.otp_verified_lat = Set(lat);
        active.otp_verified_lng = Set(lng);
        active.otp_verified_address = Set(address);
        active.updated_at = Set(Utc::now());
        let updated = active.update(db).await?;
        Ok(Self::from_model(db, updated).await?)
    }

    /// Atomic append-and-trim of the bounded live-view history. The whole
    /// operation runs in one transaction so concurrent pings for the same
    /// task cannot interleave and lose points; the `cap` most recent points
    /// by insertion order are kept.
    pub async fn append_location<C: ConnectionTrait + TransactionTrait>(
        db: &C,
        id: Uuid,
        point: &LocationPoint,
        cap: usize,
    ) -> Result<(), TaskError> {
        let txn = db.begin().await?;

        let task_row_id = ids::task_id_by_uuid(&txn, id)
            .await?
            .ok_or(TaskError::NotFound)?;

        let active = task_location_point::ActiveModel {
            task_id: Set(task_row_id),
            lat: Set(point.lat),
            lng: Set(point.lng),
            battery_percent: Set(point.battery_percent),
            recorded_at: Set(point.recorded_at),
            created_at: Set(Utc::now()),
            ..Default::default()
        };
        active.insert(&txn).await?;

        let count = task_location_point::Entity::find()
            .filter(task_location_point::Column::TaskId.eq(task_row_id))
            .count(&txn)
            .await? as usize;

        if count > cap {
            let excess = (count - cap) as u64;
            let stale_ids: Vec<i64> = task_location_point::Entity::find()
                .select_only()
                .column(task_location_point::Column::Id)
                .filter(task_location_point::Column::TaskId.eq(task_row_id))
                .order_by_asc(task_location_point::Column::Id)
                .limit(excess)
                .into_tuple()
                .all(&txn)
                .await?;
            task_location_point::Entity::delete_many()
                .filter(task_location_point::Column::Id.is_in(stale_ids))
                .exec(&txn)
                .await?;
        }

        txn.commit().await?;
        Ok(())
    }

    /// Bounded history in insertion order (oldest first).
    pub async fn location_history<C: ConnectionTrait>(
        db: &C,
        id: Uuid,
    ) -> Result<Vec<LocationPoint>, TaskError> {
        let task_row_id = ids::task_id_by_uuid(db, id)
            .await?
            .ok_or(TaskError::NotFound)?;

        let points = task_location_point::Entity::find()
            .filter(task_location_point::Column::TaskId.eq(task_row_id))
            .order_by_asc(task_location_point::Column::Id)
            .all(db)
            .await?;

        Ok(points
            .into_iter()
            .map(|p| LocationPoint {
                lat: p.lat,
                lng: p.lng,
                battery_percent: p.battery_percent,
                recorded_at: p.recorded_at,
            })
            .collect())
    }
}
