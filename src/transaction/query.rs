//! Filtered reads and totals over the transaction table.

use rusqlite::{Connection, params_from_iter, types::Value};
use serde::Serialize;

use crate::{Error, db::to_millis, range::TimeRange};

use super::core::{Transaction, TransactionType, map_transaction_row};

/// The order to sort transactions in a [TransactionQuery].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    /// Oldest first.
    Ascending,
    /// Newest first.
    Descending,
}

/// Defines how transactions should be fetched from [query_transactions].
#[derive(Debug, Default, Clone)]
pub struct TransactionQuery {
    /// Only include transactions of this type.
    pub kind: Option<TransactionType>,
    /// Include transactions within `range` (inclusive), all time if `None`.
    pub range: Option<TimeRange>,
    /// Orders transactions by date. None returns transactions in the order they are stored.
    pub sort_date: Option<SortOrder>,
}

/// Query for transactions in the database.
///
/// # Errors
/// This function will return a [Error::SqlError] there is a SQL error.
pub fn query_transactions(
    query: &TransactionQuery,
    connection: &Connection,
) -> Result<Vec<Transaction>, Error> {
    let mut query_string_parts = vec![
        "SELECT id, type, amount, date, category, source, description, receipt, created_by \
         FROM finance_transaction"
            .to_owned(),
    ];
    let (where_clause, query_parameters) = build_where_clause(query.kind, query.range);

    if let Some(where_clause) = where_clause {
        query_string_parts.push(where_clause);
    }

    // Break ties by ID to keep the order stable.
    match query.sort_date {
        Some(SortOrder::Ascending) => query_string_parts.push("ORDER BY date ASC, id ASC".to_owned()),
        Some(SortOrder::Descending) => {
            query_string_parts.push("ORDER BY date DESC, id DESC".to_owned())
        }
        None => {}
    }

    let query_string = query_string_parts.join(" ");

    connection
        .prepare(&query_string)?
        .query_map(params_from_iter(query_parameters), map_transaction_row)?
        .map(|maybe_transaction| maybe_transaction.map_err(Error::from))
        .collect()
}

/// Income and expense totals.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Summary {
    pub income: f64,
    pub expenses: f64,
    /// Income minus expenses, may be negative.
    pub balance: f64,
}

impl Summary {
    pub fn new(income: f64, expenses: f64) -> Self {
        Self {
            income,
            expenses,
            balance: income - expenses,
        }
    }
}

/// Sum income and expenses in `range`, or over all time if `range` is `None`.
///
/// # Errors
/// This function will return a [Error::SqlError] there is a SQL error.
pub fn get_summary(range: Option<TimeRange>, connection: &Connection) -> Result<Summary, Error> {
    let (where_clause, query_parameters) = build_where_clause(None, range);
    let query_string = format!(
        "SELECT type, COALESCE(SUM(amount), 0) FROM finance_transaction {} GROUP BY type",
        where_clause.unwrap_or_default()
    );

    let mut income = 0.0;
    let mut expenses = 0.0;

    let mut statement = connection.prepare(&query_string)?;
    let totals = statement.query_map(params_from_iter(query_parameters), |row| {
        Ok((row.get::<_, TransactionType>(0)?, row.get::<_, f64>(1)?))
    })?;

    for total in totals {
        match total? {
            (TransactionType::Income, amount) => income = amount,
            (TransactionType::Expense, amount) => expenses = amount,
        }
    }

    Ok(Summary::new(income, expenses))
}

fn build_where_clause(
    kind: Option<TransactionType>,
    range: Option<TimeRange>,
) -> (Option<String>, Vec<Value>) {
    let mut where_clause_parts = vec![];
    let mut query_parameters = vec![];

    if let Some(kind) = kind {
        where_clause_parts.push(format!("type = ?{}", query_parameters.len() + 1));
        query_parameters.push(Value::Text(kind.as_str().to_owned()));
    }

    if let Some(range) = range {
        where_clause_parts.push(format!(
            "date BETWEEN ?{} AND ?{}",
            query_parameters.len() + 1,
            query_parameters.len() + 2,
        ));
        query_parameters.push(Value::Integer(to_millis(range.from)));
        query_parameters.push(Value::Integer(to_millis(range.to)));
    }

    if where_clause_parts.is_empty() {
        (None, query_parameters)
    } else {
        (
            Some(String::from("WHERE ") + &where_clause_parts.join(" AND ")),
            query_parameters,
        )
    }
}
