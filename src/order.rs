//! Marketplace orders, stored as one row per order line.
//!
//! Order lines are the input for order income and farmer payouts.

use std::{
    fmt,
    str::FromStr,
    sync::{Arc, Mutex},
};

use axum::{
    Json,
    extract::{FromRef, Query, State},
    http::StatusCode,
};
use rusqlite::{Connection, Row, params_from_iter, types::Value};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{
    AppState, Error,
    database_id::OrderLineId,
    db::{get_timestamp, lock_connection, require_text, sql_text_enum, to_millis, validate_amount},
    range::{RangeQuery, TimeRange},
    timezone::{get_timezone, local_now, now_in_timezone},
};

/// Whether an order line sells inventory or rents out equipment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderKind {
    /// Produce or goods sold from a farmer's stock.
    Inventory,
    /// Equipment hired out by a farmer.
    Rental,
}

impl OrderKind {
    /// The name used in JSON and the database.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Inventory => "INVENTORY",
            Self::Rental => "RENTAL",
        }
    }
}

impl FromStr for OrderKind {
    type Err = String;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        match text {
            "INVENTORY" => Ok(Self::Inventory),
            "RENTAL" => Ok(Self::Rental),
            other => Err(format!("unknown order kind {other}")),
        }
    }
}

impl fmt::Display for OrderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

sql_text_enum!(OrderKind);

/// One item of an order, supplied by a single farmer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLine {
    /// The ID of the order line.
    pub id: OrderLineId,
    /// The order this line belongs to.
    pub order_ref: String,
    /// The farmer who supplied the item and is paid for it.
    pub farmer: String,
    /// Whether the line is a sale or a rental.
    pub kind: OrderKind,
    /// What was ordered, e.g. "Tomatoes (crate)".
    pub item: String,
    /// At least one.
    pub quantity: u32,
    /// The price of a single unit.
    pub unit_price: f64,
    /// `quantity` × `unit_price`, computed when the line is created.
    pub line_total: f64,
    /// When the order was placed.
    #[serde(with = "time::serde::rfc3339")]
    pub ordered_at: OffsetDateTime,
}

/// A line of an order that has not been stored yet.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOrderLine {
    /// The farmer who supplies the item.
    pub farmer: String,
    /// Whether the line is a sale or a rental.
    pub kind: OrderKind,
    /// What is being ordered.
    pub item: String,
    /// Must be at least one.
    pub quantity: u32,
    /// Must be a finite, non-negative number.
    pub unit_price: f64,
}

/// Store the lines of an order in a single database transaction.
///
/// # Errors
/// This function will return a:
/// - [Error::EmptyOrder] if `lines` is empty,
/// - [Error::InvalidQuantity] if a line has a quantity of zero,
/// - [Error::InvalidAmount] if a unit price is negative or not finite,
/// - [Error::EmptyField] if the order reference, farmer or item is blank,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn create_order(
    order_ref: &str,
    lines: Vec<NewOrderLine>,
    ordered_at: OffsetDateTime,
    connection: &Connection,
) -> Result<Vec<OrderLine>, Error> {
    if lines.is_empty() {
        return Err(Error::EmptyOrder);
    }

    let order_ref = require_text(order_ref, "orderRef")?;
    let transaction = connection.unchecked_transaction()?;
    let mut created = Vec::with_capacity(lines.len());

    {
        let mut statement = transaction.prepare(
            "INSERT INTO order_line
                (order_ref, farmer, kind, item, quantity, unit_price, line_total, ordered_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             RETURNING id, order_ref, farmer, kind, item, quantity, unit_price, line_total, ordered_at",
        )?;

        for line in lines {
            if line.quantity == 0 {
                return Err(Error::InvalidQuantity);
            }

            let unit_price = validate_amount(line.unit_price)?;
            let line_total = line.quantity as f64 * unit_price;

            created.push(statement.query_row(
                (
                    &order_ref,
                    require_text(&line.farmer, "farmer")?,
                    line.kind,
                    require_text(&line.item, "item")?,
                    line.quantity,
                    unit_price,
                    line_total,
                    to_millis(ordered_at),
                ),
                map_order_line_row,
            )?);
        }
    }

    transaction.commit()?;

    Ok(created)
}

/// Get the order lines ordered within `range`, or all of them if `range` is `None`.
pub fn query_order_lines(
    range: Option<TimeRange>,
    connection: &Connection,
) -> Result<Vec<OrderLine>, Error> {
    let mut query_string = "SELECT id, order_ref, farmer, kind, item, quantity, unit_price, \
                            line_total, ordered_at FROM order_line"
        .to_owned();
    let mut query_parameters = vec![];

    if let Some(range) = range {
        query_string.push_str(" WHERE ordered_at BETWEEN ?1 AND ?2");
        query_parameters.push(Value::Integer(to_millis(range.from)));
        query_parameters.push(Value::Integer(to_millis(range.to)));
    }

    query_string.push_str(" ORDER BY ordered_at DESC, id ASC");

    connection
        .prepare(&query_string)?
        .query_map(params_from_iter(query_parameters), map_order_line_row)?
        .map(|maybe_line| maybe_line.map_err(Error::from))
        .collect()
}

/// Create the order line table in the database.
///
/// # Errors
/// Returns an error if the table cannot be created or if there is an SQL error.
pub fn create_order_line_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute_batch(
        "CREATE TABLE IF NOT EXISTS order_line (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            order_ref TEXT NOT NULL,
            farmer TEXT NOT NULL,
            kind TEXT NOT NULL CHECK (kind IN ('INVENTORY', 'RENTAL')),
            item TEXT NOT NULL,
            quantity INTEGER NOT NULL CHECK (quantity >= 1),
            unit_price REAL NOT NULL CHECK (unit_price >= 0),
            line_total REAL NOT NULL,
            ordered_at INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_order_line_ordered_at ON order_line(ordered_at);",
    )?;

    Ok(())
}

fn map_order_line_row(row: &Row) -> Result<OrderLine, rusqlite::Error> {
    Ok(OrderLine {
        id: row.get(0)?,
        order_ref: row.get(1)?,
        farmer: row.get(2)?,
        kind: row.get(3)?,
        item: row.get(4)?,
        quantity: row.get(5)?,
        unit_price: row.get(6)?,
        line_total: row.get(7)?,
        ordered_at: get_timestamp(row, 8)?,
    })
}

// ============================================================================
// ENDPOINTS
// ============================================================================

/// The state needed for the order endpoints.
#[derive(Debug, Clone)]
pub struct OrderState {
    pub db_connection: Arc<Mutex<Connection>>,
    pub local_timezone: String,
}

impl FromRef<AppState> for OrderState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            local_timezone: state.local_timezone.clone(),
        }
    }
}

/// The request body for creating an order.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderForm {
    pub order_ref: String,
    /// Defaults to the current time.
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub ordered_at: Option<OffsetDateTime>,
    pub lines: Vec<NewOrderLine>,
}

pub async fn create_order_endpoint(
    State(state): State<OrderState>,
    Json(form): Json<OrderForm>,
) -> Result<(StatusCode, Json<Vec<OrderLine>>), Error> {
    let ordered_at = match form.ordered_at {
        Some(ordered_at) => ordered_at,
        None => now_in_timezone(&state.local_timezone)?,
    };
    let connection = lock_connection(&state.db_connection)?;

    let lines = create_order(&form.order_ref, form.lines, ordered_at, &connection)?;
    tracing::info!(
        "Created order {} with {} lines",
        form.order_ref.trim(),
        lines.len()
    );

    Ok((StatusCode::CREATED, Json(lines)))
}

/// A route handler for listing the order lines in a range, newest first.
pub async fn get_order_lines_endpoint(
    State(state): State<OrderState>,
    Query(range_query): Query<RangeQuery>,
) -> Result<Json<Vec<OrderLine>>, Error> {
    let timezone = get_timezone(&state.local_timezone)?;
    let now = local_now(timezone);
    let range = range_query.resolve(now, timezone)?;
    let connection = lock_connection(&state.db_connection)?;

    query_order_lines(range, &connection).map(Json)
}


#[cfg(test)]
mod order_endpoint_tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use crate::{endpoints, test_utils::get_test_server};

    use super::OrderLine;

    #[tokio::test]
    async fn create_then_list_order_lines() {
        let (server, _) = get_test_server();

        let response = server
            .post(endpoints::ORDERS)
            .json(&json!({
                "orderRef": "ORD-55",
                "lines": [
                    { "farmer": "Achieng", "kind": "INVENTORY", "item": "Beans", "quantity": 4, "unitPrice": 150.0 },
                    { "farmer": "Mwangi", "kind": "RENTAL", "item": "Sprayer", "quantity": 1, "unitPrice": 800.0 },
                ],
            }))
            .await;
        response.assert_status(StatusCode::CREATED);

        let lines = server.get(endpoints::ORDERS).await.json::<Vec<OrderLine>>();
        assert_eq!(lines.len(), 2);
        let total: f64 = lines.iter().map(|line| line.line_total).sum();
        assert_eq!(total, 1400.0);
    }

    #[tokio::test]
    async fn order_without_lines_is_a_bad_request() {
        let (server, _) = get_test_server();

        let response = server
            .post(endpoints::ORDERS)
            .json(&json!({ "orderRef": "ORD-56", "lines": [] }))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        response.assert_json_contains(&json!({ "error": "empty_order" }));
    }
}
