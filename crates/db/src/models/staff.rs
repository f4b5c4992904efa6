use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder,
    Set,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::entities::staff;

#[derive(Debug, Error)]
pub enum StaffError {
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error("Staff member not found")]
    NotFound,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Staff {
    pub id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateStaff {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
}

impl Staff {
    fn from_model(model: staff::Model) -> Self {
        Self {
            id: model.uuid,
            name: model.name,
            email: model.email,
            phone: model.phone,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }

    pub async fn create<C: ConnectionTrait>(
        db: &C,
        data: &CreateStaff,
        staff_id: Uuid,
    ) -> Result<Self, StaffError> {
        let now = Utc::now();
        let active = staff::ActiveModel {
            uuid: Set(staff_id),
            name: Set(data.name.clone()),
            email: Set(data.email.clone()),
            phone: Set(data.phone.clone()),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };
        let model = active.insert(db).await?;
        Ok(Self::from_model(model))
    }

    pub async fn find_by_id<C: ConnectionTrait>(
        db: &C,
        id: Uuid,
    ) -> Result<Option<Self>, DbErr> {
        let record = staff::Entity::find()
            .filter(staff::Column::Uuid.eq(id))
            .one(db)
            .await?;
        Ok(record.map(Self::from_model))
    }

    pub async fn find_all<C: ConnectionTrait>(db: &C) -> Result<Vec<Self>, DbErr> {
        let records = staff::Entity::find()
            .order_by_desc(staff::Column::CreatedAt)
            .all(db)
            .await?;
        Ok(records.into_iter().map(Self::from_model).collect())
    }
}
