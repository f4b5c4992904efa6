use axum::{
    extract::{Path, State},
    response::Json as ResponseJson,
    routing::get,
    Json, Router,
};
use db::models::customer::{CreateCustomer, Customer};
use utils::{geo, response::ApiResponse};
use uuid::Uuid;

use crate::{error::ApiError, AppState};

pub async fn create_customer(
    State(state): State<AppState>,
    Json(payload): Json<CreateCustomer>,
) -> Result<ResponseJson<ApiResponse<Customer>>, ApiError> {
    if let (Some(lat), Some(lng)) = (payload.lat, payload.lng) {
        if !geo::valid_coordinates(lat, lng) {
            return Err(ApiError::BadRequest(
                "geofence center coordinates out of range".to_string(),
            ));
        }
    }
    let customer = Customer::create(&state.db().pool, &payload, Uuid::new_v4()).await?;
    Ok(ResponseJson(ApiResponse::success(customer)))
}

pub async fn get_customers(
    State(state): State<AppState>,
) -> Result<ResponseJson<ApiResponse<Vec<Customer>>>, ApiError> {
    let customers = Customer::find_all(&state.db().pool).await?;
    Ok(ResponseJson(ApiResponse::success(customers)))
}

pub async fn get_customer(
    State(state): State<AppState>,
    Path(customer_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<Customer>>, ApiError> {
    let customer = Customer::find_by_id(&state.db().pool, customer_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Customer not found".to_string()))?;
    Ok(ResponseJson(ApiResponse::success(customer)))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/customers", get(get_customers).post(create_customer))
        .route("/customers/{customer_id}", get(get_customer))
}
