//! The finance back-office of an agricultural marketplace.
//!
//! This library provides a JSON REST API for bookkeeping income and expenses,
//! tracking budgets, savings goals, debts and recurring transactions, and for
//! deriving reports from those records: totals by source, monthly and daily
//! buckets, driver and farmer payouts, budget utilization, and CSV and PDF
//! exports.
//!
//! Every derived figure is computed per request from the stored records.

#![warn(missing_docs)]

use std::{net::SocketAddr, time::Duration};

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_server::Handle;
use serde_json::json;
use tokio::signal;

mod aggregation;
mod app_state;
mod budget;
mod config;
mod database_id;
mod db;
mod debt;
mod delivery;
mod endpoints;
mod export;
mod goal;
mod income;
mod logging;
mod not_found;
mod order;
mod overview;
mod payout;
mod query_params;
mod range;
mod recurring;
mod routing;
mod timezone;
mod transaction;

#[cfg(test)]
mod test_utils;

pub use app_state::AppState;
pub use config::FinanceConfig;
pub use db::initialize as initialize_db;
pub use delivery::{Delivery, DeliveryStatus, NewDelivery, create_delivery, update_delivery_status};
pub use logging::{LOG_BODY_LENGTH_LIMIT, logging_middleware};
pub use order::{NewOrderLine, OrderKind, create_order};
pub use routing::build_router;
pub use transaction::{Transaction, TransactionType, create_transaction};

/// An async task that waits for either the ctrl+c or terminate signal, whichever comes first, and
/// then signals the server to shut down gracefully.
///
/// `handle` is a handle to an Axum `Server`.
pub async fn graceful_shutdown(handle: Handle<SocketAddr>) {
    let ctrl_c = async {
        if let Err(error) = signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {error}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(error) => {
                tracing::error!("failed to install terminate signal handler: {error}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::debug!("Received ctrl+c signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
        _ = terminate => {
            tracing::debug!("Received terminate signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
    }
}

/// The errors that may occur in the application.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    /// A monetary value was negative, NaN or infinite.
    ///
    /// Amounts are stored as non-negative magnitudes, the sign of a
    /// transaction is implied by its type.
    #[error("{0} is not a valid amount, amounts must be a non-negative number")]
    InvalidAmount(f64),

    /// A budget alert threshold was outside of the range [0, 1].
    #[error("{0} is not a valid alert threshold, it must be between 0 and 1")]
    InvalidAlertThreshold(f64),

    /// A quantity of zero was used for an order line.
    #[error("order line quantity must be at least 1")]
    InvalidQuantity,

    /// A required text field was empty or only whitespace.
    #[error("{0} cannot be empty")]
    EmptyField(&'static str),

    /// An order was submitted without any lines.
    #[error("an order must contain at least one line")]
    EmptyOrder,

    /// The `from` and `to` parameters did not describe a valid date range.
    #[error("invalid date range: {0}")]
    InvalidRange(String),

    /// A delivery was asked to move to a status it cannot reach from its
    /// current status.
    #[error("a delivery cannot go from {from} to {to}")]
    InvalidStatusTransition {
        /// The current status of the delivery.
        from: DeliveryStatus,
        /// The requested status.
        to: DeliveryStatus,
    },

    /// The requested resource was not found.
    ///
    /// Internally, this error may occur when a query returns no rows.
    #[error("the requested resource could not be found")]
    NotFound,

    /// Tried to delete a transaction that does not exist
    #[error("tried to delete a transaction that is not in the database")]
    DeleteMissingTransaction,

    /// Tried to delete a budget that does not exist
    #[error("tried to delete a budget that is not in the database")]
    DeleteMissingBudget,

    /// Tried to delete a goal that does not exist
    #[error("tried to delete a goal that is not in the database")]
    DeleteMissingGoal,

    /// Tried to update a goal that does not exist
    #[error("tried to update a goal that is not in the database")]
    UpdateMissingGoal,

    /// Tried to delete a debt that does not exist
    #[error("tried to delete a debt that is not in the database")]
    DeleteMissingDebt,

    /// Tried to delete a recurring transaction that does not exist
    #[error("tried to delete a recurring transaction that is not in the database")]
    DeleteMissingRecurring,

    /// Tried to update a delivery that does not exist
    #[error("tried to update a delivery that is not in the database")]
    UpdateMissingDelivery,

    /// An error occurred while getting the local timezone from a canonical timezone string.
    #[error("invalid timezone {0}")]
    InvalidTimezoneError(String),

    /// The CSV export could not be written.
    #[error("could not write CSV: {0}")]
    CsvError(String),

    /// An error occurred while serializing a struct as JSON
    #[error("could not serialize as JSON: {0}")]
    JSONSerializationError(String),

    /// An unhandled/unexpected SQL error.
    #[error("an unexpected SQL error occurred: {0}")]
    SqlError(rusqlite::Error),

    /// Could not acquire the database lock
    #[error("could not acquire the database lock")]
    DatabaseLockError,
}

impl Error {
    /// A short, stable name for the kind of error, used in JSON error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::InvalidAmount(_) => "invalid_amount",
            Error::InvalidAlertThreshold(_) => "invalid_alert_threshold",
            Error::InvalidQuantity => "invalid_quantity",
            Error::EmptyField(_) => "empty_field",
            Error::EmptyOrder => "empty_order",
            Error::InvalidRange(_) => "invalid_range",
            Error::InvalidStatusTransition { .. } => "invalid_status_transition",
            Error::NotFound
            | Error::DeleteMissingTransaction
            | Error::DeleteMissingBudget
            | Error::DeleteMissingGoal
            | Error::UpdateMissingGoal
            | Error::DeleteMissingDebt
            | Error::DeleteMissingRecurring
            | Error::UpdateMissingDelivery => "not_found",
            Error::InvalidTimezoneError(_)
            | Error::CsvError(_)
            | Error::JSONSerializationError(_)
            | Error::SqlError(_)
            | Error::DatabaseLockError => "internal",
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            Error::InvalidAmount(_)
            | Error::InvalidAlertThreshold(_)
            | Error::InvalidQuantity
            | Error::EmptyField(_)
            | Error::EmptyOrder
            | Error::InvalidRange(_) => StatusCode::BAD_REQUEST,
            Error::InvalidStatusTransition { .. } => StatusCode::CONFLICT,
            Error::NotFound
            | Error::DeleteMissingTransaction
            | Error::DeleteMissingBudget
            | Error::DeleteMissingGoal
            | Error::UpdateMissingGoal
            | Error::DeleteMissingDebt
            | Error::DeleteMissingRecurring
            | Error::UpdateMissingDelivery => StatusCode::NOT_FOUND,
            Error::InvalidTimezoneError(_)
            | Error::CsvError(_)
            | Error::JSONSerializationError(_)
            | Error::SqlError(_)
            | Error::DatabaseLockError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        match value {
            rusqlite::Error::QueryReturnedNoRows => Error::NotFound,
            error => {
                tracing::error!("an unhandled SQL error occurred: {}", error);
                Error::SqlError(error)
            }
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // Internal details stay in the server logs.
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!("Responding with an internal server error: {self}");
            "An unexpected error occurred, check the server logs for more details.".to_owned()
        } else {
            self.to_string()
        };

        let body = Json(json!({
            "error": self.kind(),
            "message": message,
        }));

        (status, body).into_response()
    }
}
