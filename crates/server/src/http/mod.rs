use axum::Router;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{routes, AppState};

pub fn router(state: AppState) -> Router {
    let api_routes = Router::new()
        .merge(routes::staff::router())
        .merge(routes::customers::router())
        .merge(routes::tasks::router())
        .merge(routes::tracking::router())
        .merge(routes::verification::router())
        .merge(routes::timeline::router());

    Router::new()
        .merge(routes::health::router())
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use axum::{
        body::{to_bytes, Body},
        http::{header, Request, StatusCode},
    };
    use db::DBService;
    use services::services::{
        config::CompanySettings,
        geocode::{GeocodeError, GeocodedPlace, ReverseGeocoder},
        mailer::{Mailer, MailerError, OtpEmail},
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;
    use uuid::Uuid;

    use super::*;

    struct NullMailer;

    #[async_trait]
    impl Mailer for NullMailer {
        async fn send_verification_code(&self, _email: &OtpEmail) -> Result<(), MailerError> {
            Ok(())
        }
    }

    struct NullGeocoder;

    #[async_trait]
    impl ReverseGeocoder for NullGeocoder {
        async fn reverse(&self, _lat: f64, _lng: f64) -> Result<GeocodedPlace, GeocodeError> {
            Ok(GeocodedPlace::default())
        }
    }

    async fn test_router() -> Router {
        let db = DBService::new_with_url("sqlite::memory:").await.unwrap();
        let state = AppState::new(
            db,
            CompanySettings::default(),
            Arc::new(NullMailer),
            Arc::new(NullGeocoder),
        );
        router(state)
    }

    fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn response_json(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_check_works() {
        let app = test_router().await;
        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = response_json(response).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["data"], "ok");
    }

    #[tokio::test]
    async fn unknown_task_returns_404_envelope() {
        let app = test_router().await;
        let response = app
            .oneshot(
                Request::get(format!("/api/tasks/{}", Uuid::new_v4()))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = response_json(response).await;
        assert_eq!(body["success"], false);
        assert!(body["message"].is_string());
    }

    #[tokio::test]
    async fn create_and_fetch_task_through_the_api() {
        let app = test_router().await;

        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/staff",
                json!({"name": "Asha", "email": null, "phone": null}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let staff = response_json(response).await;
        let staff_id = staff["data"]["id"].as_str().unwrap().to_string();

        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/customers",
                json!({
                    "name": "Acme Stores",
                    "email": "ops@acme.example",
                    "phone": null,
                    "address": null,
                    "lat": 12.9716,
                    "lng": 77.5946,
                    "geofence_radius_m": null
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let customer = response_json(response).await;
        let customer_id = customer["data"]["id"].as_str().unwrap().to_string();

        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/tasks",
                json!({
                    "code": "TSK-001",
                    "customer_id": customer_id,
                    "assignee_id": staff_id,
                    "expected_at": "2026-09-01T09:00:00Z",
                    "otp_required": false
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let task = response_json(response).await;
        assert_eq!(task["data"]["status"], "assigned");
        let task_id = task["data"]["id"].as_str().unwrap().to_string();

        // Detail view merges the per-task override with company defaults.
        let response = app
            .oneshot(
                Request::get(format!("/api/tasks/{task_id}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let detail = response_json(response).await;
        assert_eq!(detail["data"]["requirements"]["otp"], false);
        assert_eq!(detail["data"]["requirements"]["geofence"], true);
    }

    #[tokio::test]
    async fn invalid_transition_is_a_conflict() {
        let app = test_router().await;

        let staff = response_json(
            app.clone()
                .oneshot(json_request("POST", "/api/staff", json!({"name": "Ravi"})))
                .await
                .unwrap(),
        )
        .await;
        let customer = response_json(
            app.clone()
                .oneshot(json_request(
                    "POST",
                    "/api/customers",
                    json!({"name": "Beta"}),
                ))
                .await
                .unwrap(),
        )
        .await;
        let task = response_json(
            app.clone()
                .oneshot(json_request(
                    "POST",
                    "/api/tasks",
                    json!({
                        "code": "TSK-002",
                        "customer_id": customer["data"]["id"],
                        "assignee_id": staff["data"]["id"],
                        "expected_at": "2026-09-01T09:00:00Z"
                    }),
                ))
                .await
                .unwrap(),
        )
        .await;
        let task_id = task["data"]["id"].as_str().unwrap().to_string();

        let response = app
            .oneshot(json_request(
                "PUT",
                &format!("/api/tasks/{task_id}/status"),
                json!({"status": "completed"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn out_of_range_ping_is_a_bad_request() {
        let app = test_router().await;

        let staff = response_json(
            app.clone()
                .oneshot(json_request("POST", "/api/staff", json!({"name": "Meena"})))
                .await
                .unwrap(),
        )
        .await;
        let customer = response_json(
            app.clone()
                .oneshot(json_request(
                    "POST",
                    "/api/customers",
                    json!({"name": "Gamma"}),
                ))
                .await
                .unwrap(),
        )
        .await;
        let task = response_json(
            app.clone()
                .oneshot(json_request(
                    "POST",
                    "/api/tasks",
                    json!({
                        "code": "TSK-003",
                        "customer_id": customer["data"]["id"],
                        "assignee_id": staff["data"]["id"],
                        "expected_at": "2026-09-01T09:00:00Z"
                    }),
                ))
                .await
                .unwrap(),
        )
        .await;
        let task_id = task["data"]["id"].as_str().unwrap().to_string();

        let response = app
            .oneshot(json_request(
                "POST",
                &format!("/api/tasks/{task_id}/location"),
                json!({"lat": 95.0, "lng": 77.0}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
