//! Route handlers for creating, listing and deleting transactions.

use std::sync::{Arc, Mutex};

use axum::{
    Json,
    extract::{FromRef, Path, Query, State},
    http::StatusCode,
};
use rusqlite::Connection;
use serde::Deserialize;
use time::OffsetDateTime;

use crate::{
    AppState, Error,
    database_id::TransactionId,
    db::lock_connection,
    query_params::empty_as_none,
    range::RangeQuery,
    timezone::{get_timezone, local_now, now_in_timezone},
};

use super::{
    core::{Transaction, TransactionType, create_transaction, delete_transaction, get_transaction},
    query::{SortOrder, Summary, TransactionQuery, get_summary, query_transactions},
};

/// The state needed for the transaction endpoints.
#[derive(Debug, Clone)]
pub struct TransactionState {
    /// The database connection for managing transactions.
    pub db_connection: Arc<Mutex<Connection>>,
    /// The local timezone as a canonical timezone name, e.g. "Africa/Nairobi".
    pub local_timezone: String,
}

impl FromRef<AppState> for TransactionState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            local_timezone: state.local_timezone.clone(),
        }
    }
}

/// The request body for creating a transaction.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionForm {
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub amount: f64,
    /// Defaults to the current time.
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub date: Option<OffsetDateTime>,
    pub category: Option<String>,
    pub source: Option<String>,
    pub description: Option<String>,
    pub receipt: Option<String>,
    pub created_by: Option<String>,
}

/// The `type` filter of the transaction list.
#[derive(Debug, Default, Deserialize)]
pub struct TypeFilter {
    #[serde(rename = "type", default, deserialize_with = "empty_as_none")]
    pub kind: Option<TransactionType>,
}

/// A route handler for creating a new transaction.
pub async fn create_transaction_endpoint(
    State(state): State<TransactionState>,
    Json(form): Json<TransactionForm>,
) -> Result<(StatusCode, Json<Transaction>), Error> {
    let date = match form.date {
        Some(date) => date,
        None => now_in_timezone(&state.local_timezone)?,
    };

    let builder = Transaction::build(form.kind, form.amount, date)
        .category(form.category)
        .source(form.source)
        .description(form.description)
        .receipt(form.receipt)
        .created_by(form.created_by);

    let connection = lock_connection(&state.db_connection)?;
    let transaction = create_transaction(builder, &connection)?;

    tracing::info!(
        "Created {} transaction {} for {}",
        transaction.kind,
        transaction.id,
        transaction.amount
    );

    Ok((StatusCode::CREATED, Json(transaction)))
}

/// A route handler for listing transactions, newest first.
pub async fn get_transactions_endpoint(
    State(state): State<TransactionState>,
    Query(filter): Query<TypeFilter>,
    Query(range_query): Query<RangeQuery>,
) -> Result<Json<Vec<Transaction>>, Error> {
    let timezone = get_timezone(&state.local_timezone)?;
    let query = TransactionQuery {
        kind: filter.kind,
        range: range_query.resolve(local_now(timezone), timezone)?,
        sort_date: Some(SortOrder::Descending),
    };

    let connection = lock_connection(&state.db_connection)?;
    let transactions = query_transactions(&query, &connection)?;

    Ok(Json(transactions))
}

/// A route handler for getting a transaction by its database ID.
///
/// This function will return the status code 404 if the requested resource does not exist.
pub async fn get_transaction_endpoint(
    State(state): State<TransactionState>,
    Path(transaction_id): Path<TransactionId>,
) -> Result<Json<Transaction>, Error> {
    let connection = lock_connection(&state.db_connection)?;

    get_transaction(transaction_id, &connection).map(Json)
}

/// A route handler for deleting a transaction.
pub async fn delete_transaction_endpoint(
    State(state): State<TransactionState>,
    Path(transaction_id): Path<TransactionId>,
) -> Result<StatusCode, Error> {
    let connection = lock_connection(&state.db_connection)?;

    delete_transaction(transaction_id, &connection)?;
    tracing::info!("Deleted transaction {transaction_id}");

    Ok(StatusCode::NO_CONTENT)
}

/// A route handler for the income, expense and balance totals.
pub async fn get_summary_endpoint(
    State(state): State<TransactionState>,
    Query(range_query): Query<RangeQuery>,
) -> Result<Json<Summary>, Error> {
    let timezone = get_timezone(&state.local_timezone)?;
    let now = local_now(timezone);
    let range = range_query.resolve(now, timezone)?;

    let connection = lock_connection(&state.db_connection)?;

    get_summary(range, &connection).map(Json)
}
