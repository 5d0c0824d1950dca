//! Budget records and their database queries.

use std::{collections::BTreeSet, fmt, str::FromStr};

use rusqlite::{Connection, Row};
use serde::{Deserialize, Serialize};

use crate::{
    Error,
    database_id::BudgetId,
    db::{require_text, sql_text_enum, validate_amount},
    range::RangePreset,
};

/// The alert threshold used when a budget is created without one.
pub const DEFAULT_ALERT_THRESHOLD: f64 = 0.8;

/// How often a budget's spending limit resets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BudgetPeriod {
    Monthly,
    Weekly,
}

impl BudgetPeriod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Monthly => "MONTHLY",
            Self::Weekly => "WEEKLY",
        }
    }

    /// The range preset that covers the current period.
    pub fn current_range(self) -> RangePreset {
        match self {
            Self::Monthly => RangePreset::Month,
            Self::Weekly => RangePreset::Week,
        }
    }
}

impl FromStr for BudgetPeriod {
    type Err = String;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        match text {
            "MONTHLY" => Ok(Self::Monthly),
            "WEEKLY" => Ok(Self::Weekly),
            other => Err(format!("unknown budget period {other}")),
        }
    }
}

impl fmt::Display for BudgetPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

sql_text_enum!(BudgetPeriod);

/// A spending limit over the expense categories in `categories`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Budget {
    pub id: BudgetId,
    pub name: String,
    pub period: BudgetPeriod,
    pub amount: f64,
    /// The expense categories that count towards this budget.
    pub categories: BTreeSet<String>,
    /// The fraction of `amount` at which the budget is reported as near its limit.
    pub alert_threshold: f64,
    pub notify_email: Option<String>,
    pub created_by: Option<String>,
}

/// The data needed to create a [Budget].
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewBudget {
    pub name: String,
    pub period: BudgetPeriod,
    pub amount: f64,
    #[serde(default)]
    pub categories: BTreeSet<String>,
    #[serde(default = "default_alert_threshold")]
    pub alert_threshold: f64,
    pub notify_email: Option<String>,
    pub created_by: Option<String>,
}

fn default_alert_threshold() -> f64 {
    DEFAULT_ALERT_THRESHOLD
}

/// Create a new budget in the database.
///
/// Category names are trimmed and blank ones are dropped.
///
/// # Errors
/// This function will return a:
/// - [Error::EmptyField] if the name is blank,
/// - [Error::InvalidAmount] if the amount is negative or not a finite number,
/// - [Error::InvalidAlertThreshold] if the threshold is outside of [0, 1],
/// - or [Error::SqlError] if there is some other SQL error.
pub fn create_budget(budget: NewBudget, connection: &Connection) -> Result<Budget, Error> {
    let name = require_text(&budget.name, "name")?;
    let amount = validate_amount(budget.amount)?;

    if !(0.0..=1.0).contains(&budget.alert_threshold) {
        return Err(Error::InvalidAlertThreshold(budget.alert_threshold));
    }

    let categories: BTreeSet<String> = budget
        .categories
        .iter()
        .filter_map(|category| require_text(category, "category").ok())
        .collect();
    let categories_json = serde_json::to_string(&categories)
        .map_err(|error| Error::JSONSerializationError(error.to_string()))?;

    let budget = connection
        .prepare(
            "INSERT INTO budget
                (name, period, amount, categories, alert_threshold, notify_email, created_by)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             RETURNING id, name, period, amount, categories, alert_threshold, notify_email, created_by",
        )?
        .query_row(
            (
                name,
                budget.period,
                amount,
                categories_json,
                budget.alert_threshold,
                budget.notify_email,
                budget.created_by,
            ),
            map_budget_row,
        )?;

    Ok(budget)
}

/// Get all budgets ordered by name.
pub fn get_budgets(connection: &Connection) -> Result<Vec<Budget>, Error> {
    connection
        .prepare(
            "SELECT id, name, period, amount, categories, alert_threshold, notify_email, created_by
             FROM budget ORDER BY name ASC, id ASC",
        )?
        .query_map([], map_budget_row)?
        .map(|maybe_budget| maybe_budget.map_err(Error::from))
        .collect()
}

/// Delete a budget by ID. Returns an error if the budget doesn't exist.
pub fn delete_budget(id: BudgetId, connection: &Connection) -> Result<(), Error> {
    let rows_affected = connection.execute("DELETE FROM budget WHERE id = ?1", [id])?;

    if rows_affected == 0 {
        return Err(Error::DeleteMissingBudget);
    }

    Ok(())
}

/// Create the budget table in the database.
///
/// # Errors
/// Returns an error if the table cannot be created or if there is an SQL error.
pub fn create_budget_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS budget (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            period TEXT NOT NULL CHECK (period IN ('MONTHLY', 'WEEKLY')),
            amount REAL NOT NULL CHECK (amount >= 0),
            categories TEXT NOT NULL DEFAULT '[]',
            alert_threshold REAL NOT NULL DEFAULT 0.8
                CHECK (alert_threshold >= 0 AND alert_threshold <= 1),
            notify_email TEXT,
            created_by TEXT
        )",
        (),
    )?;

    Ok(())
}

fn map_budget_row(row: &Row) -> Result<Budget, rusqlite::Error> {
    let categories_json: String = row.get(4)?;
    let categories = serde_json::from_str(&categories_json).map_err(|error| {
        rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(error))
    })?;

    Ok(Budget {
        id: row.get(0)?,
        name: row.get(1)?,
        period: row.get(2)?,
        amount: row.get(3)?,
        categories,
        alert_threshold: row.get(5)?,
        notify_email: row.get(6)?,
        created_by: row.get(7)?,
    })
}
