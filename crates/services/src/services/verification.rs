//! Arrival and OTP verification flows.

use std::sync::Arc;

use chrono::Utc;
use db::{
    models::{
        customer::Customer,
        task::Task,
        tracking_sample::{CreateTrackingSample, TrackingSample, TrackingSampleError},
        verification_challenge::{VerificationChallenge, VerificationChallengeError},
    },
    ConnectionTrait, DbErr, TransactionTrait,
};
use rand::Rng;
use thiserror::Error;
use tracing::info;
use utils::{
    geo::{self, Point, DEFAULT_GEOFENCE_RADIUS_M},
    pubsub::Broker,
};
use uuid::Uuid;

use crate::services::{
    config::CompanySettings,
    events::{LiveEvent, LiveEventKind},
    mailer::{mask_email, Mailer, MailerError, OtpEmail},
};

#[derive(Debug, Error)]
pub enum VerificationError {
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Task not found")]
    TaskNotFound,
    #[error("Customer not found")]
    CustomerNotFound,
    #[error("Customer has no email address on file")]
    MissingContact,
    #[error("No verification code has been issued for this task")]
    NoChallengeIssued,
    #[error("Verification code has expired")]
    ChallengeExpired,
    #[error("Incorrect verification code")]
    InvalidCode,
    #[error("Outside the allowed area: {distance_m:.0} m away, limit {allowed_radius_m:.0} m")]
    GeofenceViolation {
        distance_m: f64,
        allowed_radius_m: f64,
    },
    #[error("Geofence is required but the customer has no coordinates on file")]
    GeofenceUnconfigured,
    #[error("Failed to send verification code: {0}")]
    DispatchFailed(#[source] MailerError),
    #[error(transparent)]
    Task(#[from] db::models::task::TaskError),
    #[error(transparent)]
    Database(#[from] DbErr),
}

impl From<VerificationChallengeError> for VerificationError {
    fn from(err: VerificationChallengeError) -> Self {
        match err {
            VerificationChallengeError::TaskNotFound => Self::TaskNotFound,
            VerificationChallengeError::NotFound => Self::NoChallengeIssued,
            VerificationChallengeError::Database(e) => Self::Database(e),
        }
    }
}

impl From<TrackingSampleError> for VerificationError {
    fn from(err: TrackingSampleError) -> Self {
        match err {
            TrackingSampleError::TaskNotFound | TrackingSampleError::StaffNotFound => {
                Self::TaskNotFound
            }
            TrackingSampleError::Database(e) => Self::Database(e),
        }
    }
}

pub struct VerificationService {
    settings: CompanySettings,
    mailer: Arc<dyn Mailer>,
    broker: Arc<Broker<LiveEvent>>,
}

impl VerificationService {
    pub fn new(
        settings: CompanySettings,
        mailer: Arc<dyn Mailer>,
        broker: Arc<Broker<LiveEvent>>,
    ) -> Self {
        Self {
            settings,
            mailer,
            broker,
        }
    }

    /// Geofence-gated arrival confirmation. When the task does not require
    /// a geofence the confirmation always succeeds; when it does and the
    /// customer has no coordinates on file, the check fails closed rather
    /// than waving the worker through.
    pub async fn confirm_arrival<C: ConnectionTrait + TransactionTrait>(
        &self,
        db: &C,
        task_id: Uuid,
        lat: f64,
        lng: f64,
    ) -> Result<Task, VerificationError> {
        if !geo::valid_coordinates(lat, lng) {
            return Err(VerificationError::Validation(
                "coordinates out of range".to_string(),
            ));
        }

        let task = Task::find_by_id(db, task_id)
            .await?
            .ok_or(VerificationError::TaskNotFound)?;
        let requirements = task.effective_requirements(self.settings.step_defaults());

        if requirements.geofence {
            let customer = Customer::find_by_id(db, task.customer_id)
                .await?
                .ok_or(VerificationError::CustomerNotFound)?;
            let (Some(center_lat), Some(center_lng)) = (customer.lat, customer.lng) else {
                return Err(VerificationError::GeofenceUnconfigured);
            };
            let radius = task
                .geofence_radius_m
                .or(customer.geofence_radius_m)
                .unwrap_or(DEFAULT_GEOFENCE_RADIUS_M);
            let distance =
                geo::distance_meters(Point::new(lat, lng), Point::new(center_lat, center_lng));
            if distance > radius {
                return Err(VerificationError::GeofenceViolation {
                    distance_m: distance,
                    allowed_radius_m: radius,
                });
            }
        }

        let now = Utc::now();
        let updated = Task::record_arrival(db, task_id, now, lat, lng).await?;
        TrackingSample::create(
            db,
            &CreateTrackingSample::arrival(task_id, updated.assignee_id, lat, lng, now),
        )
        .await?;

        let event = LiveEvent {
            kind: LiveEventKind::Arrival,
            task_id,
            staff_id: updated.assignee_id,
            lat: Some(lat),
            lng: Some(lng),
            battery_percent: None,
            movement_type: None,
            address: None,
            city: None,
            exit_reason: None,
            recorded_at: now,
        };
        for topic in event.topics() {
            self.broker.publish(&topic, event.clone());
        }

        info!(task = %updated.code, "arrival confirmed");
        Ok(updated)
    }

    /// Issue and dispatch a fresh code. The challenge row is written only
    /// after the mailer accepts the message, so a dispatch failure leaves
    /// the store untouched and the call retry-safe. A successful resend
    /// overwrites the previous code, which stops being valid.
    pub async fn send_otp<C: ConnectionTrait>(
        &self,
        db: &C,
        task_id: Uuid,
    ) -> Result<String, VerificationError> {
        let task = Task::find_by_id(db, task_id)
            .await?
            .ok_or(VerificationError::TaskNotFound)?;
        let customer = Customer::find_by_id(db, task.customer_id)
            .await?
            .ok_or(VerificationError::CustomerNotFound)?;
        let email = customer.email.ok_or(VerificationError::MissingContact)?;

        let code = rand::thread_rng().gen_range(1000..=9999).to_string();
        self.mailer
            .send_verification_code(&OtpEmail {
                to: email.clone(),
                customer_name: customer.name,
                task_code: task.code.clone(),
                code: code.clone(),
            })
            .await
            .map_err(VerificationError::DispatchFailed)?;

        VerificationChallenge::upsert(db, task_id, &code, Utc::now()).await?;
        info!(task = %task.code, "verification code dispatched");
        Ok(mask_email(&email))
    }

    /// Check a submitted code against the active challenge. Replaying the
    /// correct code after a successful verification succeeds again without
    /// side effects; expiry is not re-checked for an already verified
    /// challenge.
    pub async fn verify_otp<C: ConnectionTrait>(
        &self,
        db: &C,
        task_id: Uuid,
        code: &str,
        lat: Option<f64>,
        lng: Option<f64>,
        address: Option<String>,
    ) -> Result<Task, VerificationError> {
        if code.len() != 4 || !code.bytes().all(|b| b.is_ascii_digit()) {
            return Err(VerificationError::Validation(
                "code must be exactly 4 digits".to_string(),
            ));
        }

        let challenge = VerificationChallenge::find_by_task_id(db, task_id)
            .await?
            .ok_or(VerificationError::NoChallengeIssued)?;

        if challenge.verified_at.is_some() {
            if code == challenge.code {
                return Task::find_by_id(db, task_id)
                    .await?
                    .ok_or(VerificationError::TaskNotFound);
            }
            return Err(VerificationError::InvalidCode);
        }

        let now = Utc::now();
        let age = now.signed_duration_since(challenge.issued_at);
        if age.to_std().unwrap_or_default() > self.settings.otp_ttl {
            return Err(VerificationError::ChallengeExpired);
        }
        if code != challenge.code {
            return Err(VerificationError::InvalidCode);
        }

        VerificationChallenge::mark_verified(db, task_id, now, lat, lng).await?;
        let updated = Task::record_otp_verification(db, task_id, now, lat, lng, address).await?;

        let event = LiveEvent {
            kind: LiveEventKind::OtpVerified,
            task_id,
            staff_id: updated.assignee_id,
            lat,
            lng,
            battery_percent: None,
            movement_type: None,
            address: None,
            city: None,
            exit_reason: None,
            recorded_at: now,
        };
        for topic in event.topics() {
            self.broker.publish(&topic, event.clone());
        }

        info!(task = %updated.code, "otp verified");
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::Duration;
    use db::models::{
        customer::CreateCustomer,
        staff::{CreateStaff, Staff},
        task::CreateTask,
    };
    use sea_orm::Database;
    use sea_orm_migration::MigratorTrait;
    use utils::pubsub::Topic;

    use super::*;

    struct StubMailer {
        sent: Mutex<Vec<OtpEmail>>,
        fail: bool,
    }

    impl StubMailer {
        fn new() -> Self {
            Self {
                sent: Mutex::new(Vec::new()),
                fail: false,
            }
        }

        fn failing() -> Self {
            Self {
                sent: Mutex::new(Vec::new()),
                fail: true,
            }
        }

        fn last_code(&self) -> Option<String> {
            self.sent.lock().unwrap().last().map(|e| e.code.clone())
        }
    }

    #[async_trait]
    impl Mailer for StubMailer {
        async fn send_verification_code(&self, email: &OtpEmail) -> Result<(), MailerError> {
            if self.fail {
                return Err(MailerError::Rejected(503));
            }
            self.sent.lock().unwrap().push(email.clone());
            Ok(())
        }
    }

    struct Fixture {
        db: sea_orm::DatabaseConnection,
        task_id: Uuid,
        staff_id: Uuid,
    }

    async fn fixture(customer: CreateCustomer) -> Fixture {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        db_migration::Migrator::up(&db, None).await.unwrap();

        let staff = Staff::create(
            &db,
            &CreateStaff {
                name: "Noor".to_string(),
                email: None,
                phone: None,
            },
            Uuid::new_v4(),
        )
        .await
        .unwrap();
        let customer = Customer::create(&db, &customer, Uuid::new_v4()).await.unwrap();
        let task = Task::create(
            &db,
            &CreateTask {
                code: "TSK-VRF".to_string(),
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

        Fixture {
            db,
            task_id: task.id,
            staff_id: staff.id,
        }
    }

    fn customer_at_center() -> CreateCustomer {
        CreateCustomer {
            name: "Acme Stores".to_string(),
            email: Some("ops@acme.example".to_string()),
            phone: None,
            address: None,
            lat: Some(12.9716),
            lng: Some(77.5946),
            geofence_radius_m: None,
        }
    }

    fn service(mailer: Arc<dyn Mailer>) -> VerificationService {
        VerificationService::new(
            CompanySettings::default(),
            mailer,
            Arc::new(Broker::new()),
        )
    }

    #[tokio::test]
    async fn send_requires_customer_email() {
        let mut customer = customer_at_center();
        customer.email = None;
        let fx = fixture(customer).await;
        let svc = service(Arc::new(StubMailer::new()));

        let err = svc.send_otp(&fx.db, fx.task_id).await.unwrap_err();
        assert!(matches!(err, VerificationError::MissingContact));
        assert!(VerificationChallenge::find_by_task_id(&fx.db, fx.task_id)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn dispatch_failure_leaves_no_challenge_behind() {
        let fx = fixture(customer_at_center()).await;
        let svc = service(Arc::new(StubMailer::failing()));

        let err = svc.send_otp(&fx.db, fx.task_id).await.unwrap_err();
        assert!(matches!(err, VerificationError::DispatchFailed(_)));
        assert!(VerificationChallenge::find_by_task_id(&fx.db, fx.task_id)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn send_masks_the_recipient_and_persists_the_sent_code() {
        let fx = fixture(customer_at_center()).await;
        let mailer = Arc::new(StubMailer::new());
        let svc = service(mailer.clone());

        let masked = svc.send_otp(&fx.db, fx.task_id).await.unwrap();
        assert_eq!(masked, "o**@acme.example");

        let code = mailer.last_code().unwrap();
        assert_eq!(code.len(), 4);
        let stored = VerificationChallenge::find_by_task_id(&fx.db, fx.task_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.code, code);
    }

    #[tokio::test]
    async fn resend_invalidates_the_previous_code() {
        let fx = fixture(customer_at_center()).await;
        let svc = service(Arc::new(StubMailer::new()));

        VerificationChallenge::upsert(&fx.db, fx.task_id, "1111", Utc::now())
            .await
            .unwrap();
        VerificationChallenge::upsert(&fx.db, fx.task_id, "2222", Utc::now())
            .await
            .unwrap();

        let err = svc
            .verify_otp(&fx.db, fx.task_id, "1111", None, None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, VerificationError::InvalidCode));

        let task = svc
            .verify_otp(&fx.db, fx.task_id, "2222", None, None, None)
            .await
            .unwrap();
        assert!(task.progress.otp_verified);
        assert!(task.otp_verified_at.is_some());
    }

    #[tokio::test]
    async fn replaying_the_correct_code_is_idempotent() {
        let fx = fixture(customer_at_center()).await;
        let svc = service(Arc::new(StubMailer::new()));

        VerificationChallenge::upsert(&fx.db, fx.task_id, "5050", Utc::now())
            .await
            .unwrap();
        let first = svc
            .verify_otp(&fx.db, fx.task_id, "5050", Some(12.97), Some(77.59), None)
            .await
            .unwrap();
        let replay = svc
            .verify_otp(&fx.db, fx.task_id, "5050", None, None, None)
            .await
            .unwrap();

        assert!(replay.progress.otp_verified);
        assert_eq!(replay.otp_verified_at, first.otp_verified_at);

        // Wrong code after success is still rejected.
        let err = svc
            .verify_otp(&fx.db, fx.task_id, "9999", None, None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, VerificationError::InvalidCode));
    }

    #[tokio::test]
    async fn stale_codes_expire() {
        let fx = fixture(customer_at_center()).await;
        let svc = service(Arc::new(StubMailer::new()));

        let issued = Utc::now() - Duration::minutes(11);
        VerificationChallenge::upsert(&fx.db, fx.task_id, "3141", issued)
            .await
            .unwrap();

        let err = svc
            .verify_otp(&fx.db, fx.task_id, "3141", None, None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, VerificationError::ChallengeExpired));
    }

    #[tokio::test]
    async fn malformed_codes_are_rejected_up_front() {
        let fx = fixture(customer_at_center()).await;
        let svc = service(Arc::new(StubMailer::new()));

        for bad in ["123", "12345", "abcd", "12a4"] {
            let err = svc
                .verify_otp(&fx.db, fx.task_id, bad, None, None, None)
                .await
                .unwrap_err();
            assert!(matches!(err, VerificationError::Validation(_)), "{bad}");
        }

        let err = svc
            .verify_otp(&fx.db, fx.task_id, "1234", None, None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, VerificationError::NoChallengeIssued));
    }

    #[tokio::test]
    async fn arrival_inside_the_fence_is_recorded_and_broadcast() {
        let fx = fixture(customer_at_center()).await;
        let broker = Arc::new(Broker::new());
        let svc = VerificationService::new(
            CompanySettings::default(),
            Arc::new(StubMailer::new()),
            broker.clone(),
        );
        let mut rx = broker.subscribe(&Topic::Task(fx.task_id));

        let task = svc
            .confirm_arrival(&fx.db, fx.task_id, 12.9716, 77.5946)
            .await
            .unwrap();
        assert!(task.progress.reached_location);
        assert!(task.arrived_at.is_some());

        let event = rx.recv().await.unwrap();
        assert_eq!(event.kind, LiveEventKind::Arrival);
        assert_eq!(event.staff_id, fx.staff_id);

        let samples = TrackingSample::find_by_task_id(&fx.db, fx.task_id)
            .await
            .unwrap();
        assert_eq!(samples.len(), 1);
        assert!(samples[0].arrived);
    }

    #[tokio::test]
    async fn arrival_outside_the_fence_reports_the_distance() {
        let fx = fixture(customer_at_center()).await;
        let svc = service(Arc::new(StubMailer::new()));

        // Roughly 150 m north of the customer.
        let err = svc
            .confirm_arrival(&fx.db, fx.task_id, 12.97295, 77.5946)
            .await
            .unwrap_err();
        match err {
            VerificationError::GeofenceViolation {
                distance_m,
                allowed_radius_m,
            } => {
                assert!(distance_m > 100.0 && distance_m < 200.0, "got {distance_m}");
                assert_eq!(allowed_radius_m, 100.0);
            }
            other => panic!("expected geofence violation, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unconfigured_geofence_fails_closed() {
        let mut customer = customer_at_center();
        customer.lat = None;
        customer.lng = None;
        let fx = fixture(customer).await;
        let svc = service(Arc::new(StubMailer::new()));

        let err = svc
            .confirm_arrival(&fx.db, fx.task_id, 12.9716, 77.5946)
            .await
            .unwrap_err();
        assert!(matches!(err, VerificationError::GeofenceUnconfigured));
    }

    #[tokio::test]
    async fn geofence_not_required_always_passes() {
        let mut customer = customer_at_center();
        customer.lat = None;
        customer.lng = None;
        let fx = fixture(customer).await;

        let mut settings = CompanySettings::default();
        settings.geofence_required = false;
        let svc = VerificationService::new(
            settings,
            Arc::new(StubMailer::new()),
            Arc::new(Broker::new()),
        );

        let task = svc
            .confirm_arrival(&fx.db, fx.task_id, 0.0, 0.0)
            .await
            .unwrap();
        assert!(task.progress.reached_location);
    }
}
