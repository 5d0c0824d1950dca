//! Defines the core data models and database queries for transactions.

use std::{fmt, str::FromStr};

use rusqlite::{Connection, Row};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{
    Error,
    database_id::TransactionId,
    db::{get_timestamp, require_text, sql_text_enum, to_millis, validate_amount},
};

// ============================================================================
// MODELS
// ============================================================================

/// Whether money was earned or spent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    /// Money earned, e.g. an order sale or a delivery fee.
    Income,
    /// Money spent.
    Expense,
}

impl TransactionType {
    /// The name used in JSON, CSV and the database.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Income => "INCOME",
            Self::Expense => "EXPENSE",
        }
    }

    /// The sign applied to an amount of this type when a signed figure is needed.
    pub fn sign(self) -> f64 {
        match self {
            Self::Income => 1.0,
            Self::Expense => -1.0,
        }
    }
}

impl FromStr for TransactionType {
    type Err = String;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        match text {
            "INCOME" => Ok(Self::Income),
            "EXPENSE" => Ok(Self::Expense),
            other => Err(format!("unknown transaction type {other}")),
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

sql_text_enum!(TransactionType);

/// An expense or income, i.e. an event where money was either spent or earned.
///
/// The amount is always a non-negative magnitude, the direction of the money
/// is given by `kind`.
///
/// To create a new `Transaction`, use [Transaction::build].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    /// The ID of the transaction.
    pub id: TransactionId,
    /// Whether this is income or an expense.
    #[serde(rename = "type")]
    pub kind: TransactionType,
    /// The amount of money spent or earned in this transaction.
    pub amount: f64,
    /// When the transaction happened.
    #[serde(with = "time::serde::rfc3339")]
    pub date: OffsetDateTime,
    /// The spending or earning category, e.g. "Fuel", "Seeds".
    pub category: Option<String>,
    /// Where the money came from or went to, e.g. "Market stall".
    pub source: Option<String>,
    /// A text description of what the transaction was for.
    pub description: Option<String>,
    /// A reference to an uploaded receipt image.
    pub receipt: Option<String>,
    /// The admin who recorded the transaction.
    pub created_by: Option<String>,
}

impl Transaction {
    /// Create a new transaction.
    ///
    /// Shortcut for [TransactionBuilder] for discoverability.
    pub fn build(kind: TransactionType, amount: f64, date: OffsetDateTime) -> TransactionBuilder {
        TransactionBuilder {
            kind,
            amount,
            date,
            category: None,
            source: None,
            description: None,
            receipt: None,
            created_by: None,
        }
    }

    /// The amount with the sign implied by the transaction type.
    ///
    /// A zero amount is always positive zero.
    pub fn signed_amount(&self) -> f64 {
        if self.amount == 0.0 {
            return 0.0;
        }

        self.kind.sign() * self.amount
    }
}

/// A builder for creating [Transaction] instances.
///
/// # Examples
///
/// ```ignore
/// use time::macros::datetime;
///
/// let transaction = Transaction::build(
///         TransactionType::Expense,
///         1200.0,
///         datetime!(2025-01-15 09:00 UTC),
///     )
///     .category(Some("Fuel".to_owned()))
///     .description(Some("Truck diesel".to_owned()));
/// ```
#[derive(Debug, PartialEq, Clone)]
pub struct TransactionBuilder {
    /// Whether this is income or an expense.
    pub kind: TransactionType,
    /// Must be a finite, non-negative number.
    pub amount: f64,
    /// When the transaction happened.
    pub date: OffsetDateTime,
    /// The spending or earning category.
    pub category: Option<String>,
    /// Where the money came from or went to.
    pub source: Option<String>,
    /// What the transaction was for.
    pub description: Option<String>,
    /// A reference to an uploaded receipt image.
    pub receipt: Option<String>,
    /// The admin who recorded the transaction.
    pub created_by: Option<String>,
}

impl TransactionBuilder {
    /// Set the category, blank text is stored as no category.
    pub fn category(mut self, category: Option<String>) -> Self {
        self.category = category;
        self
    }

    /// Set the source of income.
    pub fn source(mut self, source: Option<String>) -> Self {
        self.source = source;
        self
    }

    /// Set the description.
    pub fn description(mut self, description: Option<String>) -> Self {
        self.description = description;
        self
    }

    /// Set the receipt reference.
    pub fn receipt(mut self, receipt: Option<String>) -> Self {
        self.receipt = receipt;
        self
    }

    /// Set the admin who recorded the transaction.
    pub fn created_by(mut self, created_by: Option<String>) -> Self {
        self.created_by = created_by;
        self
    }
}

/// Blank optional text is stored as NULL.
fn non_blank(text: Option<String>) -> Option<String> {
    text.and_then(|text| require_text(&text, "text").ok())
}

// ============================================================================
// DATABASE FUNCTIONS
// ============================================================================

/// Create a new transaction in the database from a builder.
///
/// # Errors
/// This function will return a:
/// - [Error::InvalidAmount] if the amount is negative or not a finite number,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn create_transaction(
    builder: TransactionBuilder,
    connection: &Connection,
) -> Result<Transaction, Error> {
    let amount = validate_amount(builder.amount)?;

    let transaction = connection
        .prepare(
            "INSERT INTO finance_transaction
                (type, amount, date, category, source, description, receipt, created_by)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             RETURNING id, type, amount, date, category, source, description, receipt, created_by",
        )?
        .query_row(
            (
                builder.kind,
                amount,
                to_millis(builder.date),
                non_blank(builder.category),
                non_blank(builder.source),
                non_blank(builder.description),
                non_blank(builder.receipt),
                non_blank(builder.created_by),
            ),
            map_transaction_row,
        )?;

    Ok(transaction)
}

/// Retrieve a transaction from the database by its `id`.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `id` does not refer to a valid transaction,
/// - or [Error::SqlError] there is some other SQL error.
pub fn get_transaction(id: TransactionId, connection: &Connection) -> Result<Transaction, Error> {
    let transaction = connection
        .prepare(
            "SELECT id, type, amount, date, category, source, description, receipt, created_by
             FROM finance_transaction WHERE id = :id",
        )?
        .query_row(&[(":id", &id)], map_transaction_row)?;

    Ok(transaction)
}

/// Delete a transaction by ID. Returns an error if the transaction doesn't exist.
pub fn delete_transaction(id: TransactionId, connection: &Connection) -> Result<(), Error> {
    let rows_affected =
        connection.execute("DELETE FROM finance_transaction WHERE id = ?1", [id])?;

    if rows_affected == 0 {
        return Err(Error::DeleteMissingTransaction);
    }

    Ok(())
}

/// Create the transaction table in the database.
///
/// # Errors
/// Returns an error if the table cannot be created or if there is an SQL error.
pub fn create_transaction_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute_batch(
        "CREATE TABLE IF NOT EXISTS finance_transaction (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            type TEXT NOT NULL CHECK (type IN ('INCOME', 'EXPENSE')),
            amount REAL NOT NULL CHECK (amount >= 0),
            date INTEGER NOT NULL,
            category TEXT,
            source TEXT,
            description TEXT,
            receipt TEXT,
            created_by TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_finance_transaction_type_date
            ON finance_transaction(type, date);",
    )?;

    Ok(())
}

/// Map a database row to a Transaction.
pub fn map_transaction_row(row: &Row) -> Result<Transaction, rusqlite::Error> {
    Ok(Transaction {
        id: row.get(0)?,
        kind: row.get(1)?,
        amount: row.get(2)?,
        date: get_timestamp(row, 3)?,
        category: row.get(4)?,
        source: row.get(5)?,
        description: row.get(6)?,
        receipt: row.get(7)?,
        created_by: row.get(8)?,
    })
}

// ============================================================================
// TESTS
// ============================================================================
