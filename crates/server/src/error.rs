use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use db::{
    models::{
        customer::CustomerError, staff::StaffError, task::TaskError,
        tracking_sample::TrackingSampleError,
    },
    DbErr,
};
use serde_json::json;
use services::services::{
    timeline::TimelineError, tracking::TrackingError, verification::VerificationError,
};
use thiserror::Error;
use utils::response::ApiResponse;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Task(#[from] TaskError),
    #[error(transparent)]
    Staff(#[from] StaffError),
    #[error(transparent)]
    Customer(#[from] CustomerError),
    #[error(transparent)]
    TrackingSample(#[from] TrackingSampleError),
    #[error(transparent)]
    Verification(#[from] VerificationError),
    #[error(transparent)]
    Tracking(#[from] TrackingError),
    #[error(transparent)]
    Timeline(#[from] TimelineError),
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("Not found: {0}")]
    NotFound(String),
}

impl ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Task(err) => match err {
                TaskError::NotFound
                | TaskError::CustomerNotFound
                | TaskError::StaffNotFound => StatusCode::NOT_FOUND,
                TaskError::InvalidTransition { .. } => StatusCode::CONFLICT,
                TaskError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::Staff(err) => match err {
                StaffError::NotFound => StatusCode::NOT_FOUND,
                StaffError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::Customer(err) => match err {
                CustomerError::NotFound => StatusCode::NOT_FOUND,
                CustomerError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::TrackingSample(err) => match err {
                TrackingSampleError::TaskNotFound | TrackingSampleError::StaffNotFound => {
                    StatusCode::NOT_FOUND
                }
                TrackingSampleError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::Verification(err) => match err {
                VerificationError::Validation(_)
                | VerificationError::MissingContact
                | VerificationError::NoChallengeIssued
                | VerificationError::InvalidCode => StatusCode::BAD_REQUEST,
                VerificationError::ChallengeExpired => StatusCode::GONE,
                VerificationError::TaskNotFound | VerificationError::CustomerNotFound => {
                    StatusCode::NOT_FOUND
                }
                VerificationError::GeofenceViolation { .. }
                | VerificationError::GeofenceUnconfigured => StatusCode::UNPROCESSABLE_ENTITY,
                VerificationError::DispatchFailed(_) => StatusCode::BAD_GATEWAY,
                VerificationError::Task(task_err) => ApiError::from_task_status(task_err),
                VerificationError::Database(db_err) => ApiError::from_db_status(db_err),
            },
            ApiError::Tracking(err) => match err {
                TrackingError::InvalidCoordinates => StatusCode::BAD_REQUEST,
                TrackingError::TaskNotFound => StatusCode::NOT_FOUND,
                TrackingError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::Timeline(err) => match err {
                TimelineError::TaskNotFound => StatusCode::NOT_FOUND,
                TimelineError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::Database(db_err) => ApiError::from_db_status(db_err),
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
        }
    }

    fn from_task_status(err: &TaskError) -> StatusCode {
        match err {
            TaskError::NotFound | TaskError::CustomerNotFound | TaskError::StaffNotFound => {
                StatusCode::NOT_FOUND
            }
            TaskError::InvalidTransition { .. } => StatusCode::CONFLICT,
            TaskError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn from_db_status(err: &DbErr) -> StatusCode {
        match err {
            DbErr::RecordNotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status_code = self.status_code();

        if status_code.is_server_error() {
            tracing::error!(status = %status_code, error = %self, "API request failed");
        }

        // Geofence rejections carry structured detail so the field client
        // can tell the worker how far off they are.
        if let ApiError::Verification(VerificationError::GeofenceViolation {
            distance_m,
            allowed_radius_m,
        }) = &self
        {
            let response = ApiResponse {
                success: false,
                data: Some(json!({
                    "distance_m": distance_m,
                    "allowed_radius_m": allowed_radius_m,
                })),
                message: Some(self.to_string()),
            };
            return (status_code, Json(response)).into_response();
        }

        let response = ApiResponse::<()>::error(&self.to_string());
        (status_code, Json(response)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use db::types::TaskStatus;
    use services::services::mailer::MailerError;

    use super::*;

    #[test]
    fn task_errors_map_to_expected_statuses() {
        let err = ApiError::Task(TaskError::NotFound);
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);

        let err = ApiError::Task(TaskError::InvalidTransition {
            from: TaskStatus::Assigned,
            to: TaskStatus::Completed,
        });
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
    }

    #[test]
    fn verification_errors_map_to_expected_statuses() {
        let cases = [
            (
                ApiError::Verification(VerificationError::Validation("bad".into())),
                StatusCode::BAD_REQUEST,
            ),
            (
                ApiError::Verification(VerificationError::MissingContact),
                StatusCode::BAD_REQUEST,
            ),
            (
                ApiError::Verification(VerificationError::NoChallengeIssued),
                StatusCode::BAD_REQUEST,
            ),
            (
                ApiError::Verification(VerificationError::InvalidCode),
                StatusCode::BAD_REQUEST,
            ),
            (
                ApiError::Verification(VerificationError::ChallengeExpired),
                StatusCode::GONE,
            ),
            (
                ApiError::Verification(VerificationError::GeofenceViolation {
                    distance_m: 150.0,
                    allowed_radius_m: 100.0,
                }),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                ApiError::Verification(VerificationError::GeofenceUnconfigured),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                ApiError::Verification(VerificationError::DispatchFailed(
                    MailerError::Rejected(503),
                )),
                StatusCode::BAD_GATEWAY,
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(err.status_code(), expected, "{err}");
        }
    }

    #[test]
    fn database_record_not_found_is_404() {
        let err = ApiError::Database(DbErr::RecordNotFound("task".into()));
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);

        let err = ApiError::Database(DbErr::Custom("boom".into()));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn tracking_errors_map_to_expected_statuses() {
        assert_eq!(
            ApiError::Tracking(TrackingError::InvalidCoordinates).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::Tracking(TrackingError::TaskNotFound).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::Timeline(TimelineError::TaskNotFound).status_code(),
            StatusCode::NOT_FOUND
        );
    }
}
