use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, Set,
};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::{entities::verification_challenge, models::ids};

#[derive(Debug, Error)]
pub enum VerificationChallengeError {
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error("Task not found")]
    TaskNotFound,
    #[error("No challenge issued for task")]
    NotFound,
}

/// The single active OTP challenge for a task. Reissuing overwrites the row,
/// so at most one code is ever live per task.
#[derive(Debug, Clone, Serialize)]
pub struct VerificationChallenge {
    pub task_id: Uuid,
    pub code: String,
    pub issued_at: DateTime<Utc>,
    pub verified_at: Option<DateTime<Utc>>,
    pub verified_lat: Option<f64>,
    pub verified_lng: Option<f64>,
}

impl VerificationChallenge {
    fn from_model(task_id: Uuid, model: verification_challenge::Model) -> Self {
        Self {
            task_id,
            code: model.code,
            issued_at: model.issued_at,
            verified_at: model.verified_at,
            verified_lat: model.verified_lat,
            verified_lng: model.verified_lng,
        }
    }

    /// Insert or replace the challenge for a task. A fresh issue clears any
    /// previous verification state.
    pub async fn upsert<C: ConnectionTrait>(
        db: &C,
        task_id: Uuid,
        code: &str,
        issued_at: DateTime<Utc>,
    ) -> Result<Self, VerificationChallengeError> {
        let task_row_id = ids::task_id_by_uuid(db, task_id)
            .await?
            .ok_or(VerificationChallengeError::TaskNotFound)?;

        let existing = verification_challenge::Entity::find()
            .filter(verification_challenge::Column::TaskId.eq(task_row_id))
            .one(db)
            .await?;

        let now = Utc::now();
        let model = match existing {
            Some(record) => {
                let mut active: verification_challenge::ActiveModel = record.into();
                active.code = Set(code.to_string());
                active.issued_at = Set(issued_at);
                active.verified_at = Set(None);
                active.verified_lat = Set(None);
                active.verified_lng = Set(None);
                active.updated_at = Set(now);
                active.update(db).await?
            }
            None => {
                let active = verification_challenge::ActiveModel {
                    task_id: Set(task_row_id),
                    code: Set(code.to_string()),
                    issued_at: Set(issued_at),
                    created_at: Set(now),
                    updated_at: Set(now),
                    ..Default::default()
                };
                active.insert(db).await?
            }
        };
        Ok(Self::from_model(task_id, model))
    }

    pub async fn find_by_task_id<C: ConnectionTrait>(
        db: &C,
        task_id: Uuid,
    ) -> Result<Option<Self>, VerificationChallengeError> {
        let task_row_id = ids::task_id_by_uuid(db, task_id)
            .await?
            .ok_or(VerificationChallengeError::TaskNotFound)?;

        let record = verification_challenge::Entity::find()
            .filter(verification_challenge::Column::TaskId.eq(task_row_id))
            .one(db)
            .await?;
        Ok(record.map(|m| Self::from_model(task_id, m)))
    }

    pub async fn mark_verified<C: ConnectionTrait>(
        db: &C,
        task_id: Uuid,
        at: DateTime<Utc>,
        lat: Option<f64>,
        lng: Option<f64>,
    ) -> Result<Self, VerificationChallengeError> {
        let task_row_id = ids::task_id_by_uuid(db, task_id)
            .await?
            .ok_or(VerificationChallengeError::TaskNotFound)?;

        let record = verification_challenge::Entity::find()
            .filter(verification_challenge::Column::TaskId.eq(task_row_id))
            .one(db)
            .await?
            .ok_or(VerificationChallengeError::NotFound)?;

        let mut active: verification_challenge::ActiveModel = record.into();
        active.verified_at = Set(Some(at));
        active.verified_lat = Set(lat);
        active.verified_lng = Set(lng);
        active.updated_at = Set(Utc::now());
        let updated = active.update(db).await?;
        Ok(Self::from_model(task_id, updated))
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

    async fn setup() -> (sea_orm::DatabaseConnection, Uuid) {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        db_migration::Migrator::up(&db, None).await.unwrap();

        let staff = Staff::create(
            &db,
            &CreateStaff {
                name: "Kiran".to_string(),
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
                name: "Delta Retail".to_string(),
                email: Some("front@delta.example".to_string()),
                phone: None,
                address: None,
                lat: None,
                lng: None,
                geofence_radius_m: None,
            },
            Uuid::new_v4(),
        )
        .await
        .unwrap();
        let task = Task::create(
            &db,
            &CreateTask {
                code: "TSK-OTP".to_string(),
                customer_id: customer.id,
                assignee_id: staff.id,
                expected_at: Utc::now(),
                otp_required: Some(true),
                geofence_required: None,
                photo_required: None,
                form_required: None,
                geofence_radius_m: None,
            },
            Uuid::new_v4(),
        )
        .await
        .unwrap();

        (db, task.id)
    }

    #[tokio::test]
    async fn reissue_overwrites_and_clears_verification() {
        let (db, task_id) = setup().await;

        let first_issued = Utc::now();
        VerificationChallenge::upsert(&db, task_id, "4839", first_issued)
            .await
            .unwrap();
        VerificationChallenge::mark_verified(&db, task_id, Utc::now(), Some(12.9), Some(77.6))
            .await
            .unwrap();

        let reissued = VerificationChallenge::upsert(&db, task_id, "7712", Utc::now())
            .await
            .unwrap();
        assert_eq!(reissued.code, "7712");
        assert!(reissued.verified_at.is_none());
        assert!(reissued.verified_lat.is_none());

        // Still exactly one challenge per task.
        let stored = VerificationChallenge::find_by_task_id(&db, task_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.code, "7712");
    }

    #[tokio::test]
    async fn mark_verified_requires_an_issued_challenge() {
        let (db, task_id) = setup().await;
        let err = VerificationChallenge::mark_verified(&db, task_id, Utc::now(), None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, VerificationChallengeError::NotFound));
    }

    #[tokio::test]
    async fn unknown_task_is_rejected() {
        let (db, _) = setup().await;
        let err = VerificationChallenge::upsert(&db, Uuid::new_v4(), "0000", Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, VerificationChallengeError::TaskNotFound));
    }
}
