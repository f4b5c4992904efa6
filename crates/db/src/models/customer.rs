use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder,
    Set,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::entities::customer;

#[derive(Debug, Error)]
pub enum CustomerError {
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error("Customer not found")]
    NotFound,
}

/// A task destination: contact details plus the optional geofence center
/// and per-customer radius used by arrival confirmation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Customer {
    pub id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub geofence_radius_m: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateCustomer {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub geofence_radius_m: Option<f64>,
}

impl Customer {
    fn from_model(model: customer::Model) -> Self {
        Self {
            id: model.uuid,
            name: model.name,
            email: model.email,
            phone: model.phone,
            address: model.address,
            lat: model.lat,
            lng: model.lng,
            geofence_radius_m: model.geofence_radius_m,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }

    pub async fn create<C: ConnectionTrait>(
        db: &C,
        data: &CreateCustomer,
        customer_id: Uuid,
    ) -> Result<Self, CustomerError> {
        let now = Utc::now();
        let active = customer::ActiveModel {
            uuid: Set(customer_id),
            name: Set(data.name.clone()),
            email: Set(data.email.clone()),
            phone: Set(data.phone.clone()),
            address: Set(data.address.clone()),
            lat: Set(data.lat),
            lng: Set(data.lng),
            geofence_radius_m: Set(data.geofence_radius_m),
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
        let record = customer::Entity::find()
            .filter(customer::Column::Uuid.eq(id))
            .one(db)
            .await?;
        Ok(record.map(Self::from_model))
    }

    pub async fn find_all<C: ConnectionTrait>(db: &C) -> Result<Vec<Self>, DbErr> {
        let records = customer::Entity::find()
            .order_by_desc(customer::Column::CreatedAt)
            .all(db)
            .await?;
        Ok(records.into_iter().map(Self::from_model).collect())
    }
}
