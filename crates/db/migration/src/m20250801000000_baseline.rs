use sea_orm_migration::prelude::*;
use sea_orm_migration::sea_orm::DatabaseBackend;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create().if_not_exists()
                    .table(Staff::Table)
                    .col(pk_id_col(manager, Staff::Id))
                    .col(uuid_col(Staff::Uuid))
                    .col(ColumnDef::new(Staff::Name).string().not_null())
                    .col(ColumnDef::new(Staff::Email).string())
                    .col(ColumnDef::new(Staff::Phone).string())
                    .col(timestamp_col(Staff::CreatedAt))
                    .col(timestamp_col(Staff::UpdatedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create().if_not_exists()
                    .name("idx_staff_uuid")
                    .table(Staff::Table)
                    .col(Staff::Uuid)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create().if_not_exists()
                    .table(Customers::Table)
                    .col(pk_id_col(manager, Customers::Id))
                    .col(uuid_col(Customers::Uuid))
                    .col(ColumnDef::new(Customers::Name).string().not_null())
                    .col(ColumnDef::new(Customers::Email).string())
                    .col(ColumnDef::new(Customers::Phone).string())
                    .col(ColumnDef::new(Customers::Address).string())
                    .col(ColumnDef::new(Customers::Lat).double())
                    .col(ColumnDef::new(Customers::Lng).double())
                    .col(ColumnDef::new(Customers::GeofenceRadiusM).double())
                    .col(timestamp_col(Customers::CreatedAt))
                    .col(timestamp_col(Customers::UpdatedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create().if_not_exists()
                    .name("idx_customers_uuid")
                    .table(Customers::Table)
                    .col(Customers::Uuid)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create().if_not_exists()
                    .table(Tasks::Table)
                    .col(pk_id_col(manager, Tasks::Id))
                    .col(uuid_col(Tasks::Uuid))
                    .col(ColumnDef::new(Tasks::Code).string().not_null())
                    .col(ColumnDef::new(Tasks::CustomerId).big_integer().not_null())
                    .col(ColumnDef::new(Tasks::AssigneeId).big_integer().not_null())
                    .col(
                        ColumnDef::new(Tasks::Status)
                            .string_len(32)
                            .not_null()
                            .default(Expr::val("assigned")),
                    )
                    .col(ColumnDef::new(Tasks::ExpectedAt).timestamp().not_null())
                    .col(ColumnDef::new(Tasks::StartedAt).timestamp())
                    .col(ColumnDef::new(Tasks::StartLat).double())
                    .col(ColumnDef::new(Tasks::StartLng).double())
                    .col(ColumnDef::new(Tasks::CompletedAt).timestamp())
                    .col(bool_col(Tasks::ReachedLocation))
                    .col(bool_col(Tasks::PhotoProof))
                    .col(bool_col(Tasks::FormFilled))
                    .col(bool_col(Tasks::OtpVerified))
                    .col(ColumnDef::new(Tasks::OtpVerifiedAt).timestamp())
                    .col(ColumnDef::new(Tasks::OtpVerifiedLat).double())
                    .col(ColumnDef::new(Tasks::OtpVerifiedLng).double())
                    .col(ColumnDef::new(Tasks::OtpVerifiedAddress).string())
                    .col(ColumnDef::new(Tasks::ArrivedAt).timestamp())
                    .col(ColumnDef::new(Tasks::ArrivedLat).double())
                    .col(ColumnDef::new(Tasks::ArrivedLng).double())
                    .col(ColumnDef::new(Tasks::OtpRequired).boolean())
                    .col(ColumnDef::new(Tasks::GeofenceRequired).boolean())
                    .col(ColumnDef::new(Tasks::PhotoRequired).boolean())
                    .col(ColumnDef::new(Tasks::FormRequired).boolean())
                    .col(ColumnDef::new(Tasks::GeofenceRadiusM).double())
                    .col(timestamp_col(Tasks::CreatedAt))
                    .col(timestamp_col(Tasks::UpdatedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create().if_not_exists()
                    .name("idx_tasks_uuid")
                    .table(Tasks::Table)
                    .col(Tasks::Uuid)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create().if_not_exists()
                    .name("idx_tasks_code")
                    .table(Tasks::Table)
                    .col(Tasks::Code)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create().if_not_exists()
                    .name("idx_tasks_assignee_id")
                    .table(Tasks::Table)
                    .col(Tasks::AssigneeId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create().if_not_exists()
                    .table(TaskLocationPoints::Table)
                    .col(pk_id_col(manager, TaskLocationPoints::Id))
                    .col(
                        ColumnDef::new(TaskLocationPoints::TaskId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(TaskLocationPoints::Lat).double().not_null())
                    .col(ColumnDef::new(TaskLocationPoints::Lng).double().not_null())
                    .col(ColumnDef::new(TaskLocationPoints::BatteryPercent).integer())
                    .col(
                        ColumnDef::new(TaskLocationPoints::RecordedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .col(timestamp_col(TaskLocationPoints::CreatedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create().if_not_exists()
                    .name("idx_task_location_points_task_id")
                    .table(TaskLocationPoints::Table)
                    .col(TaskLocationPoints::TaskId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create().if_not_exists()
                    .table(TrackingSamples::Table)
                    .col(pk_id_col(manager, TrackingSamples::Id))
                    .col(uuid_col(TrackingSamples::Uuid))
                    .col(
                        ColumnDef::new(TrackingSamples::TaskId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(TrackingSamples::StaffId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(TrackingSamples::Lat).double())
                    .col(ColumnDef::new(TrackingSamples::Lng).double())
                    .col(ColumnDef::new(TrackingSamples::BatteryPercent).integer())
                    .col(ColumnDef::new(TrackingSamples::MovementType).string_len(16))
                    .col(ColumnDef::new(TrackingSamples::Address).string())
                    .col(ColumnDef::new(TrackingSamples::City).string())
                    .col(bool_col(TrackingSamples::Arrived))
                    .col(bool_col(TrackingSamples::Exited))
                    .col(ColumnDef::new(TrackingSamples::ExitReason).string())
                    .col(bool_col(TrackingSamples::Resumed))
                    .col(
                        ColumnDef::new(TrackingSamples::RecordedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .col(timestamp_col(TrackingSamples::CreatedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create().if_not_exists()
                    .name("idx_tracking_samples_uuid")
                    .table(TrackingSamples::Table)
                    .col(TrackingSamples::Uuid)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create().if_not_exists()
                    .name("idx_tracking_samples_task_id")
                    .table(TrackingSamples::Table)
                    .col(TrackingSamples::TaskId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create().if_not_exists()
                    .name("idx_tracking_samples_staff_id")
                    .table(TrackingSamples::Table)
                    .col(TrackingSamples::StaffId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create().if_not_exists()
                    .table(VerificationChallenges::Table)
                    .col(pk_id_col(manager, VerificationChallenges::Id))
                    .col(
                        ColumnDef::new(VerificationChallenges::TaskId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(VerificationChallenges::Code)
                            .string_len(4)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(VerificationChallenges::IssuedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .col(ColumnDef::new(VerificationChallenges::VerifiedAt).timestamp())
                    .col(ColumnDef::new(VerificationChallenges::VerifiedLat).double())
                    .col(ColumnDef::new(VerificationChallenges::VerifiedLng).double())
                    .col(timestamp_col(VerificationChallenges::CreatedAt))
                    .col(timestamp_col(VerificationChallenges::UpdatedAt))
                    .to_owned(),
            )
            .await?;

        // One active code per task.
        manager
            .create_index(
                Index::create().if_not_exists()
                    .name("idx_verification_challenges_task_id")
                    .table(VerificationChallenges::Table)
                    .col(VerificationChallenges::TaskId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(VerificationChallenges::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(TrackingSamples::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(TaskLocationPoints::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Tasks::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Customers::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Staff::Table).to_owned())
            .await?;
        Ok(())
    }
}

fn pk_id_col<T: Iden>(manager: &SchemaManager, col: T) -> ColumnDef {
    let mut col = ColumnDef::new(col);
    match manager.get_database_backend() {
        DatabaseBackend::Sqlite => {
            col.integer();
        }
        _ => {
            col.big_integer();
        }
    }
    col.not_null().auto_increment().primary_key().to_owned()
}

fn uuid_col<T: Iden>(col: T) -> ColumnDef {
    ColumnDef::new(col).uuid().not_null().to_owned()
}

fn bool_col<T: Iden>(col: T) -> ColumnDef {
    ColumnDef::new(col)
        .boolean()
        .not_null()
        .default(Expr::val(false))
        .to_owned()
}

fn timestamp_col<T: Iden>(col: T) -> ColumnDef {
    ColumnDef::new(col)
        .timestamp()
        .not_null()
        .default(Expr::current_timestamp())
        .to_owned()
}

#[derive(Iden)]
enum Staff {
    Table,
    Id,
    Uuid,
    Name,
    Email,
    Phone,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum Customers {
    Table,
    Id,
    Uuid,
    Name,
    Email,
    Phone,
    Address,
    Lat,
    Lng,
    GeofenceRadiusM,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum Tasks {
    Table,
    Id,
    Uuid,
    Code,
    CustomerId,
    AssigneeId,
    Status,
    ExpectedAt,
    StartedAt,
    StartLat,
    StartLng,
    CompletedAt,
    ReachedLocation,
    PhotoProof,
    FormFilled,
    OtpVerified,
    OtpVerifiedAt,
    OtpVerifiedLat,
    OtpVerifiedLng,
    OtpVerifiedAddress,
    ArrivedAt,
    ArrivedLat,
    ArrivedLng,
    OtpRequired,
    GeofenceRequired,
    PhotoRequired,
    FormRequired,
    GeofenceRadiusM,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum TaskLocationPoints {
    Table,
    Id,
    TaskId,
    Lat,
    Lng,
    BatteryPercent,
    RecordedAt,
    CreatedAt,
}

#[derive(Iden)]
enum TrackingSamples {
    Table,
    Id,
    Uuid,
    TaskId,
    StaffId,
    Lat,
    Lng,
    BatteryPercent,
    MovementType,
    Address,
    City,
    Arrived,
    Exited,
    ExitReason,
    Resumed,
    RecordedAt,
    CreatedAt,
}

#[derive(Iden)]
enum VerificationChallenges {
    Table,
    Id,
    TaskId,
    Code,
    IssuedAt,
    VerifiedAt,
    VerifiedLat,
    VerifiedLng,
    CreatedAt,
    UpdatedAt,
}
