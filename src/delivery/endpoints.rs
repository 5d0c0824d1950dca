//! Route handlers for creating deliveries and moving them through their lifecycle.

use std::sync::{Arc, Mutex};

use axum::{
    Json,
    extract::{FromRef, Path, Query, State},
    http::StatusCode,
};
use rusqlite::Connection;
use serde::Deserialize;

use crate::{
    AppState, Error, database_id::DeliveryId, db::lock_connection, query_params::empty_as_none,
    timezone::now_in_timezone,
};

use super::core::{
    Delivery, DeliveryQuery, DeliveryStatus, NewDelivery, assign_driver, cancel_delivery,
    create_delivery, query_deliveries, update_delivery_status,
};

/// The state needed for the delivery endpoints.
#[derive(Debug, Clone)]
pub struct DeliveryState {
    pub db_connection: Arc<Mutex<Connection>>,
    pub local_timezone: String,
}

impl FromRef<AppState> for DeliveryState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            local_timezone: state.local_timezone.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryForm {
    pub order_ref: Option<String>,
    pub driver: Option<String>,
    pub fee: f64,
}

#[derive(Debug, Default, Deserialize)]
pub struct DeliveryFilter {
    #[serde(default, deserialize_with = "empty_as_none")]
    pub status: Option<DeliveryStatus>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub driver: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AssignForm {
    pub driver: String,
}

#[derive(Debug, Deserialize)]
pub struct StatusForm {
    pub status: DeliveryStatus,
}

pub async fn create_delivery_endpoint(
    State(state): State<DeliveryState>,
    Json(form): Json<DeliveryForm>,
) -> Result<(StatusCode, Json<Delivery>), Error> {
    let now = now_in_timezone(&state.local_timezone)?;
    let connection = lock_connection(&state.db_connection)?;

    let delivery = create_delivery(
        NewDelivery {
            order_ref: form.order_ref,
            driver: form.driver,
            fee: form.fee,
            created_at: now,
        },
        &connection,
    )?;
    tracing::info!("Created delivery {} ({})", delivery.id, delivery.status);

    Ok((StatusCode::CREATED, Json(delivery)))
}

pub async fn get_deliveries_endpoint(
    State(state): State<DeliveryState>,
    Query(filter): Query<DeliveryFilter>,
) -> Result<Json<Vec<Delivery>>, Error> {
    let connection = lock_connection(&state.db_connection)?;

    query_deliveries(
        &DeliveryQuery {
            status: filter.status,
            driver: filter.driver,
            completed_in: None,
        },
        &connection,
    )
    .map(Json)
}

/// A route handler for assigning a driver.
///
/// Responds with 409 if the delivery is already in transit, delivered or cancelled.
pub async fn assign_delivery_endpoint(
    State(state): State<DeliveryState>,
    Path(delivery_id): Path<DeliveryId>,
    Json(form): Json<AssignForm>,
) -> Result<Json<Delivery>, Error> {
    let connection = lock_connection(&state.db_connection)?;

    let delivery = assign_driver(delivery_id, &form.driver, &connection)?;
    tracing::info!("Assigned delivery {delivery_id} to {}", form.driver.trim());

    Ok(Json(delivery))
}

/// A route handler for marking a delivery as in transit or delivered.
pub async fn update_delivery_status_endpoint(
    State(state): State<DeliveryState>,
    Path(delivery_id): Path<DeliveryId>,
    Json(form): Json<StatusForm>,
) -> Result<Json<Delivery>, Error> {
    let now = now_in_timezone(&state.local_timezone)?;
    let connection = lock_connection(&state.db_connection)?;

    let delivery = update_delivery_status(delivery_id, form.status, now, &connection)?;
    tracing::info!("Delivery {delivery_id} is now {}", delivery.status);

    Ok(Json(delivery))
}

pub async fn cancel_delivery_endpoint(
    State(state): State<DeliveryState>,
    Path(delivery_id): Path<DeliveryId>,
) -> Result<Json<Delivery>, Error> {
    let now = now_in_timezone(&state.local_timezone)?;
    let connection = lock_connection(&state.db_connection)?;

    let delivery = cancel_delivery(delivery_id, now, &connection)?;
    tracing::info!("Cancelled delivery {delivery_id}");

    Ok(Json(delivery))
}
