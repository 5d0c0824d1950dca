//! Database initialization and helpers shared by the record modules.

use std::sync::{Arc, Mutex, MutexGuard};

use rusqlite::{
    Connection,
    types::{FromSqlError, FromSqlResult},
};
use time::OffsetDateTime;

use crate::{
    Error, budget::create_budget_table, debt::create_debt_table,
    delivery::create_delivery_table, goal::create_goal_table, order::create_order_line_table,
    recurring::create_recurring_table, transaction::create_transaction_table,
};

/// Create the tables for all the domain models.
///
/// # Errors
/// Returns an error if any table could not be created.
pub fn initialize(connection: &Connection) -> Result<(), Error> {
    let transaction = connection.unchecked_transaction()?;

    create_transaction_table(&transaction)?;
    create_budget_table(&transaction)?;
    create_goal_table(&transaction)?;
    create_debt_table(&transaction)?;
    create_recurring_table(&transaction)?;
    create_delivery_table(&transaction)?;
    create_order_line_table(&transaction)?;

    transaction.commit()?;

    Ok(())
}

/// Acquire the shared database connection, logging if the lock is poisoned.
pub fn lock_connection(
    connection: &Arc<Mutex<Connection>>,
) -> Result<MutexGuard<'_, Connection>, Error> {
    connection.lock().map_err(|error| {
        tracing::error!("could not acquire database lock: {error}");
        Error::DatabaseLockError
    })
}

/// Convert a timestamp to the integer stored in the database.
///
/// Timestamps are stored as UTC milliseconds so that range comparisons in SQL
/// are plain integer comparisons.
pub fn to_millis(timestamp: OffsetDateTime) -> i64 {
    (timestamp.unix_timestamp_nanos() / 1_000_000) as i64
}

/// Convert a stored timestamp back into a UTC date-time.
pub fn from_millis(millis: i64) -> FromSqlResult<OffsetDateTime> {
    OffsetDateTime::from_unix_timestamp_nanos(millis as i128 * 1_000_000)
        .map_err(|error| FromSqlError::Other(Box::new(error)))
}

/// Read a timestamp column stored by [to_millis].
pub fn get_timestamp(row: &rusqlite::Row, index: usize) -> Result<OffsetDateTime, rusqlite::Error> {
    let millis: i64 = row.get(index)?;
    from_millis(millis).map_err(|error| {
        rusqlite::Error::FromSqlConversionFailure(index, rusqlite::types::Type::Integer, error.into())
    })
}

/// Read a nullable timestamp column stored by [to_millis].
pub fn get_optional_timestamp(
    row: &rusqlite::Row,
    index: usize,
) -> Result<Option<OffsetDateTime>, rusqlite::Error> {
    let millis: Option<i64> = row.get(index)?;
    millis
        .map(|millis| {
            from_millis(millis).map_err(|error| {
                rusqlite::Error::FromSqlConversionFailure(
                    index,
                    rusqlite::types::Type::Integer,
                    error.into(),
                )
            })
        })
        .transpose()
}

/// Implement SQL conversions for a fieldless enum stored as its upper-case name.
///
/// The enum must provide `as_str(self) -> &'static str` and implement `FromStr`.
macro_rules! sql_text_enum {
    ($name:ty) => {
        impl rusqlite::types::ToSql for $name {
            fn to_sql(&self) -> rusqlite::Result<rusqlite::types::ToSqlOutput<'_>> {
                Ok(rusqlite::types::ToSqlOutput::from(self.as_str()))
            }
        }

        impl rusqlite::types::FromSql for $name {
            fn column_result(
                value: rusqlite::types::ValueRef<'_>,
            ) -> rusqlite::types::FromSqlResult<Self> {
                value.as_str().and_then(|text| {
                    text.parse()
                        .map_err(|_| rusqlite::types::FromSqlError::InvalidType)
                })
            }
        }
    };
}

pub(crate) use sql_text_enum;

/// Return an error if `amount` is negative, NaN or infinite.
pub fn validate_amount(amount: f64) -> Result<f64, Error> {
    if amount.is_finite() && amount >= 0.0 {
        Ok(amount)
    } else {
        Err(Error::InvalidAmount(amount))
    }
}

/// Trim `text` and return an error naming `field` if nothing is left.
pub fn require_text(text: &str, field: &'static str) -> Result<String, Error> {
    let trimmed = text.trim();

    if trimmed.is_empty() {
        Err(Error::EmptyField(field))
    } else {
        Ok(trimmed.to_owned())
    }
}

#[cfg(test)]
mod tests {
    use rusqlite::Connection;
    use time::macros::datetime;

    use crate::Error;

    use super::{from_millis, initialize, require_text, to_millis, validate_amount};

    #[test]
    fn initialize_creates_all_tables() {
        let connection = Connection::open_in_memory().unwrap();

        initialize(&connection).expect("Could not initialize database");

        let table_count: i64 = connection
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name IN \
                 ('finance_transaction', 'budget', 'goal', 'debt', 'recurring_transaction', \
                  'delivery', 'order_line')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(table_count, 7);
    }

    #[test]
    fn initialize_is_idempotent() {
        let connection = Connection::open_in_memory().unwrap();

        initialize(&connection).unwrap();

        assert_eq!(initialize(&connection), Ok(()));
    }

    #[test]
    fn timestamps_keep_millisecond_precision() {
        let timestamp = datetime!(2025-03-31 23:59:59.999 +03:00);

        let restored = from_millis(to_millis(timestamp)).unwrap();

        assert_eq!(restored, timestamp);
    }

    #[test]
    fn negative_and_non_finite_amounts_are_rejected() {
        assert_eq!(validate_amount(0.0), Ok(0.0));
        assert_eq!(validate_amount(-0.01), Err(Error::InvalidAmount(-0.01)));
        assert!(validate_amount(f64::NAN).is_err());
        assert!(validate_amount(f64::INFINITY).is_err());
    }

    #[test]
    fn whitespace_text_is_empty() {
        assert_eq!(require_text(" \t", "name"), Err(Error::EmptyField("name")));
        assert_eq!(require_text(" Maize ", "name"), Ok("Maize".to_owned()));
    }
}
