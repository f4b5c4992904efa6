use sea_orm::entity::prelude::*;

use crate::types::TaskStatus;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "tasks")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub uuid: Uuid,
    pub code: String,
    pub customer_id: i64,
    pub assignee_id: i64,
    pub status: TaskStatus,
    pub expected_at: DateTimeUtc,
    pub started_at: Option<DateTimeUtc>,
    pub start_lat: Option<f64>,
    pub start_lng: Option<f64>,
    pub completed_at: Option<DateTimeUtc>,
    pub reached_location: bool,
    pub photo_proof: bool,
    pub form_filled: bool,
    pub otp_verified: bool,
    pub otp_verified_at: Option<DateTimeUtc>,
    pub otp_verified_lat: Option<f64>,
    pub otp_verified_lng: Option<f64>,
    pub otp_verified_address: Option<String>,
    pub arrived_at: Option<DateTimeUtc>,
    pub arrived_lat: Option<f64>,
    pub arrived_lng: Option<f64>,
    pub otp_required: Option<bool>,
    pub geofence_required: Option<bool>,
    pub photo_required: Option<bool>,
    pub form_required: Option<bool>,
    pub geofence_radius_m: Option<f64>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
