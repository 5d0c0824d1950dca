//! Delivery records, their status lifecycle and database queries.

use std::{fmt, str::FromStr};

use rusqlite::{Connection, Row, params_from_iter, types::Value};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{
    Error,
    database_id::DeliveryId,
    db::{
        get_optional_timestamp, get_timestamp, require_text, sql_text_enum, to_millis,
        validate_amount,
    },
    range::TimeRange,
};

/// Where a delivery is in its lifecycle.
///
/// `Delivered` and `Cancelled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeliveryStatus {
    /// Waiting for a driver.
    Pending,
    /// A driver has been assigned but has not collected the order.
    Assigned,
    /// On the way to the customer.
    InTransit,
    /// Handed over to the customer.
    Delivered,
    /// Will not be delivered.
    Cancelled,
}

impl DeliveryStatus {
    /// The name used in JSON and the database.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Assigned => "ASSIGNED",
            Self::InTransit => "IN_TRANSIT",
            Self::Delivered => "DELIVERED",
            Self::Cancelled => "CANCELLED",
        }
    }

    /// Whether a delivery in this status may move to `next`.
    pub fn can_transition_to(self, next: DeliveryStatus) -> bool {
        use DeliveryStatus::*;

        matches!(
            (self, next),
            (Pending | Assigned, Assigned)
                | (Assigned, InTransit)
                | (Assigned | InTransit, Delivered)
                | (Pending | Assigned | InTransit, Cancelled)
        )
    }
}

impl FromStr for DeliveryStatus {
    type Err = String;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        match text {
            "PENDING" => Ok(Self::Pending),
            "ASSIGNED" => Ok(Self::Assigned),
            "IN_TRANSIT" => Ok(Self::InTransit),
            "DELIVERED" => Ok(Self::Delivered),
            "CANCELLED" => Ok(Self::Cancelled),
            other => Err(format!("unknown delivery status {other}")),
        }
    }
}

impl fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

sql_text_enum!(DeliveryStatus);

/// A delivery of an order by a driver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Delivery {
    /// The ID of the delivery.
    pub id: DeliveryId,
    /// The order being delivered.
    pub order_ref: Option<String>,
    /// The driver assigned to the delivery.
    pub driver: Option<String>,
    /// Where the delivery is in its lifecycle.
    pub status: DeliveryStatus,
    /// The delivery fee charged to the customer.
    pub fee: f64,
    /// When the delivery was booked.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    /// Set when the delivery is marked as delivered.
    #[serde(with = "time::serde::rfc3339::option")]
    pub completed_at: Option<OffsetDateTime>,
}

/// The data needed to create a [Delivery].
///
/// A delivery created with a driver starts out as assigned, otherwise it is pending.
#[derive(Debug, Clone, PartialEq)]
pub struct NewDelivery {
    /// The order being delivered.
    pub order_ref: Option<String>,
    /// The driver, if one is known when the delivery is booked.
    pub driver: Option<String>,
    /// Must be a finite, non-negative number.
    pub fee: f64,
    /// When the delivery was booked.
    pub created_at: OffsetDateTime,
}

/// Filters for [query_deliveries].
#[derive(Debug, Default, Clone)]
pub struct DeliveryQuery {
    pub status: Option<DeliveryStatus>,
    pub driver: Option<String>,
    /// Only include deliveries completed within this range.
    pub completed_in: Option<TimeRange>,
}

const DELIVERY_COLUMNS: &str = "id, order_ref, driver, status, fee, created_at, completed_at";

/// Create a new delivery in the database.
///
/// # Errors
/// This function will return a:
/// - [Error::InvalidAmount] if the fee is negative or not a finite number,
/// - [Error::EmptyField] if the driver is given but blank,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn create_delivery(delivery: NewDelivery, connection: &Connection) -> Result<Delivery, Error> {
    let fee = validate_amount(delivery.fee)?;
    let driver = delivery
        .driver
        .as_deref()
        .map(|driver| require_text(driver, "driver"))
        .transpose()?;
    let status = if driver.is_some() {
        DeliveryStatus::Assigned
    } else {
        DeliveryStatus::Pending
    };
    let order_ref = delivery
        .order_ref
        .and_then(|order_ref| require_text(&order_ref, "orderRef").ok());

    let delivery = connection
        .prepare(&format!(
            "INSERT INTO delivery (order_ref, driver, status, fee, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             RETURNING {DELIVERY_COLUMNS}"
        ))?
        .query_row(
            (order_ref, driver, status, fee, to_millis(delivery.created_at)),
            map_delivery_row,
        )?;

    Ok(delivery)
}

/// Retrieve a delivery from the database by its `id`.
///
/// # Errors
/// Returns [Error::NotFound] if there is no delivery with `id`.
pub fn get_delivery(id: DeliveryId, connection: &Connection) -> Result<Delivery, Error> {
    let delivery = connection
        .prepare(&format!("SELECT {DELIVERY_COLUMNS} FROM delivery WHERE id = :id"))?
        .query_row(&[(":id", &id)], map_delivery_row)?;

    Ok(delivery)
}

/// Query deliveries, newest first.
pub fn query_deliveries(
    query: &DeliveryQuery,
    connection: &Connection,
) -> Result<Vec<Delivery>, Error> {
    let mut where_clause_parts = vec![];
    let mut query_parameters = vec![];

    if let Some(status) = query.status {
        where_clause_parts.push(format!("status = ?{}", query_parameters.len() + 1));
        query_parameters.push(Value::Text(status.as_str().to_owned()));
    }

    if let Some(driver) = &query.driver {
        where_clause_parts.push(format!("driver = ?{}", query_parameters.len() + 1));
        query_parameters.push(Value::Text(driver.clone()));
    }

    if let Some(range) = query.completed_in {
        where_clause_parts.push(format!(
            "completed_at BETWEEN ?{} AND ?{}",
            query_parameters.len() + 1,
            query_parameters.len() + 2,
        ));
        query_parameters.push(Value::Integer(to_millis(range.from)));
        query_parameters.push(Value::Integer(to_millis(range.to)));
    }

    let where_clause = if where_clause_parts.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", where_clause_parts.join(" AND "))
    };

    connection
        .prepare(&format!(
            "SELECT {DELIVERY_COLUMNS} FROM delivery {where_clause} ORDER BY created_at DESC, id DESC"
        ))?
        .query_map(params_from_iter(query_parameters), map_delivery_row)?
        .map(|maybe_delivery| maybe_delivery.map_err(Error::from))
        .collect()
}

/// Assign `driver` to a pending or assigned delivery.
///
/// # Errors
/// This function will return a:
/// - [Error::EmptyField] if `driver` is blank,
/// - [Error::UpdateMissingDelivery] if there is no delivery with `id`,
/// - or [Error::InvalidStatusTransition] if the delivery is already under way or finished.
pub fn assign_driver(
    id: DeliveryId,
    driver: &str,
    connection: &Connection,
) -> Result<Delivery, Error> {
    let driver = require_text(driver, "driver")?;
    let current = get_existing_delivery(id, connection)?;
    check_transition(current.status, DeliveryStatus::Assigned)?;

    let delivery = connection
        .prepare(&format!(
            "UPDATE delivery SET driver = ?1, status = ?2 WHERE id = ?3
             RETURNING {DELIVERY_COLUMNS}"
        ))?
        .query_row((driver, DeliveryStatus::Assigned, id), map_delivery_row)?;

    Ok(delivery)
}

/// Move a delivery to `status`, recording `now` as the completion time when it is delivered.
///
/// Use [assign_driver] to assign a delivery, a driver is required for that step.
///
/// # Errors
/// This function will return a:
/// - [Error::UpdateMissingDelivery] if there is no delivery with `id`,
/// - or [Error::InvalidStatusTransition] if the delivery cannot move to `status`.
pub fn update_delivery_status(
    id: DeliveryId,
    status: DeliveryStatus,
    now: OffsetDateTime,
    connection: &Connection,
) -> Result<Delivery, Error> {
    let current = get_existing_delivery(id, connection)?;

    if status == DeliveryStatus::Assigned {
        return Err(Error::InvalidStatusTransition {
            from: current.status,
            to: status,
        });
    }

    check_transition(current.status, status)?;

    let completed_at = (status == DeliveryStatus::Delivered).then(|| to_millis(now));

    let delivery = connection
        .prepare(&format!(
            "UPDATE delivery SET status = ?1, completed_at = ?2 WHERE id = ?3
             RETURNING {DELIVERY_COLUMNS}"
        ))?
        .query_row((status, completed_at, id), map_delivery_row)?;

    Ok(delivery)
}

/// Cancel a delivery that has not been delivered yet.
pub fn cancel_delivery(
    id: DeliveryId,
    now: OffsetDateTime,
    connection: &Connection,
) -> Result<Delivery, Error> {
    update_delivery_status(id, DeliveryStatus::Cancelled, now, connection)
}

fn get_existing_delivery(id: DeliveryId, connection: &Connection) -> Result<Delivery, Error> {
    get_delivery(id, connection).map_err(|error| match error {
        Error::NotFound => Error::UpdateMissingDelivery,
        error => error,
    })
}

fn check_transition(from: DeliveryStatus, to: DeliveryStatus) -> Result<(), Error> {
    if from.can_transition_to(to) {
        Ok(())
    } else {
        Err(Error::InvalidStatusTransition { from, to })
    }
}

/// Create the delivery table in the database.
///
/// # Errors
/// Returns an error if the table cannot be created or if there is an SQL error.
pub fn create_delivery_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute_batch(
        "CREATE TABLE IF NOT EXISTS delivery (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            order_ref TEXT,
            driver TEXT,
            status TEXT NOT NULL
                CHECK (status IN ('PENDING', 'ASSIGNED', 'IN_TRANSIT', 'DELIVERED', 'CANCELLED')),
            fee REAL NOT NULL CHECK (fee >= 0),
            created_at INTEGER NOT NULL,
            completed_at INTEGER
        );

        CREATE INDEX IF NOT EXISTS idx_delivery_status_completed_at
            ON delivery(status, completed_at);",
    )?;

    Ok(())
}

fn map_delivery_row(row: &Row) -> Result<Delivery, rusqlite::Error> {
    Ok(Delivery {
        id: row.get(0)?,
        order_ref: row.get(1)?,
        driver: row.get(2)?,
        status: row.get(3)?,
        fee: row.get(4)?,
        created_at: get_timestamp(row, 5)?,
        completed_at: get_optional_timestamp(row, 6)?,
    })
}
