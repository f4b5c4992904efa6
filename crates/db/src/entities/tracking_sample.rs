use sea_orm::entity::prelude::*;

use crate::types::MovementType;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "tracking_samples")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub uuid: Uuid,
    pub task_id: i64,
    pub staff_id: i64,
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
    pub recorded_at: DateTimeUtc,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
