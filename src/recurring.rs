//! Recurring transactions and the projection of their upcoming occurrences.
//!
//! Recurring transactions are declarative: nothing runs them or writes the
//! transactions they describe.

use std::{
    fmt,
    str::FromStr,
    sync::{Arc, Mutex},
};

use axum::{
    Json,
    extract::{FromRef, Path, Query, State},
    http::StatusCode,
};
use rusqlite::{Connection, Row};
use serde::{Deserialize, Serialize};
use time::{Date, Duration, Month, OffsetDateTime};

use crate::{
    AppState, Error,
    database_id::RecurringId,
    db::{get_timestamp, lock_connection, require_text, sql_text_enum, to_millis, validate_amount},
    query_params::empty_as_none,
    range::days_in_month,
    timezone::now_in_timezone,
    transaction::TransactionType,
};

/// The look-ahead used when the upcoming endpoint is called without `days`.
pub const DEFAULT_UPCOMING_DAYS: u32 = 30;

/// The most occurrences projected for a single recurring transaction.
pub const MAX_OCCURRENCES_PER_RECORD: u32 = 400;

/// How often a recurring transaction repeats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Cadence {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl Cadence {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Daily => "DAILY",
            Self::Weekly => "WEEKLY",
            Self::Monthly => "MONTHLY",
            Self::Yearly => "YEARLY",
        }
    }

    /// The `n`th occurrence after `first`, with `n = 0` being `first` itself.
    ///
    /// Monthly and yearly occurrences keep the day of month of `first`, using
    /// the last day of the month when it is too short. Returns `None` if the
    /// date is out of range.
    pub fn nth_occurrence(self, first: OffsetDateTime, n: u32) -> Option<OffsetDateTime> {
        match self {
            Self::Daily => first.checked_add(Duration::days(n as i64)),
            Self::Weekly => first.checked_add(Duration::weeks(n as i64)),
            Self::Monthly => add_months(first, n as i64),
            Self::Yearly => add_months(first, 12 * n as i64),
        }
    }
}

impl FromStr for Cadence {
    type Err = String;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        match text {
            "DAILY" => Ok(Self::Daily),
            "WEEKLY" => Ok(Self::Weekly),
            "MONTHLY" => Ok(Self::Monthly),
            "YEARLY" => Ok(Self::Yearly),
            other => Err(format!("unknown cadence {other}")),
        }
    }
}

impl fmt::Display for Cadence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

sql_text_enum!(Cadence);

fn add_months(date_time: OffsetDateTime, months: i64) -> Option<OffsetDateTime> {
    let date = date_time.date();
    let month_index = date.year() as i64 * 12 + date.month() as i64 - 1 + months;
    let year = i32::try_from(month_index.div_euclid(12)).ok()?;
    let month = Month::try_from(month_index.rem_euclid(12) as u8 + 1).ok()?;
    let day = date.day().min(days_in_month(year, month));

    let date = Date::from_calendar_date(year, month, day).ok()?;

    Some(date_time.replace_date(date))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecurringTransaction {
    pub id: RecurringId,
    pub title: String,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub amount: f64,
    pub cadence: Cadence,
    /// When the next occurrence is due.
    #[serde(with = "time::serde::rfc3339")]
    pub next_run_at: OffsetDateTime,
    pub category: Option<String>,
    pub created_by: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRecurringTransaction {
    pub title: String,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub amount: f64,
    pub cadence: Cadence,
    #[serde(with = "time::serde::rfc3339")]
    pub next_run_at: OffsetDateTime,
    pub category: Option<String>,
    pub created_by: Option<String>,
}

/// A projected occurrence of a recurring transaction.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpcomingOccurrence {
    pub recurring_id: RecurringId,
    pub title: String,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub amount: f64,
    pub category: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub date: OffsetDateTime,
}

/// Project the occurrences of `recurring` from their next run through `until`, soonest first.
pub fn upcoming_occurrences(
    recurring: &[RecurringTransaction],
    until: OffsetDateTime,
) -> Vec<UpcomingOccurrence> {
    let mut occurrences = Vec::new();

    for record in recurring {
        let dates = (0..MAX_OCCURRENCES_PER_RECORD)
            .map_while(|n| record.cadence.nth_occurrence(record.next_run_at, n))
            .take_while(|date| *date <= until);

        occurrences.extend(dates.map(|date| UpcomingOccurrence {
            recurring_id: record.id,
            title: record.title.clone(),
            kind: record.kind,
            amount: record.amount,
            category: record.category.clone(),
            date,
        }));
    }

    occurrences.sort_by(|a, b| a.date.cmp(&b.date).then(a.recurring_id.cmp(&b.recurring_id)));
    occurrences
}

const RECURRING_COLUMNS: &str = "id, title, type, amount, cadence, next_run_at, category, created_by";

pub fn create_recurring(
    recurring: NewRecurringTransaction,
    connection: &Connection,
) -> Result<RecurringTransaction, Error> {
    let title = require_text(&recurring.title, "title")?;
    let amount = validate_amount(recurring.amount)?;

    let recurring = connection
        .prepare(&format!(
            "INSERT INTO recurring_transaction
                (title, type, amount, cadence, next_run_at, category, created_by)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             RETURNING {RECURRING_COLUMNS}"
        ))?
        .query_row(
            (
                title,
                recurring.kind,
                amount,
                recurring.cadence,
                to_millis(recurring.next_run_at),
                recurring.category,
                recurring.created_by,
            ),
            map_recurring_row,
        )?;

    Ok(recurring)
}

/// Get all recurring transactions, soonest next run first.
pub fn get_recurring(connection: &Connection) -> Result<Vec<RecurringTransaction>, Error> {
    connection
        .prepare(&format!(
            "SELECT {RECURRING_COLUMNS} FROM recurring_transaction ORDER BY next_run_at ASC, id ASC"
        ))?
        .query_map([], map_recurring_row)?
        .map(|maybe_recurring| maybe_recurring.map_err(Error::from))
        .collect()
}

pub fn delete_recurring(id: RecurringId, connection: &Connection) -> Result<(), Error> {
    let rows_affected =
        connection.execute("DELETE FROM recurring_transaction WHERE id = ?1", [id])?;

    if rows_affected == 0 {
        return Err(Error::DeleteMissingRecurring);
    }

    Ok(())
}

pub fn create_recurring_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS recurring_transaction (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            title TEXT NOT NULL,
            type TEXT NOT NULL CHECK (type IN ('INCOME', 'EXPENSE')),
            amount REAL NOT NULL CHECK (amount >= 0),
            cadence TEXT NOT NULL CHECK (cadence IN ('DAILY', 'WEEKLY', 'MONTHLY', 'YEARLY')),
            next_run_at INTEGER NOT NULL,
            category TEXT,
            created_by TEXT
        )",
        (),
    )?;

    Ok(())
}

fn map_recurring_row(row: &Row) -> Result<RecurringTransaction, rusqlite::Error> {
    Ok(RecurringTransaction {
        id: row.get(0)?,
        title: row.get(1)?,
        kind: row.get(2)?,
        amount: row.get(3)?,
        cadence: row.get(4)?,
        next_run_at: get_timestamp(row, 5)?,
        category: row.get(6)?,
        created_by: row.get(7)?,
    })
}

// ============================================================================
// ENDPOINTS
// ============================================================================

#[derive(Debug, Clone)]
pub struct RecurringState {
    pub db_connection: Arc<Mutex<Connection>>,
    pub local_timezone: String,
}

impl FromRef<AppState> for RecurringState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            local_timezone: state.local_timezone.clone(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct UpcomingQuery {
    #[serde(default, deserialize_with = "empty_as_none")]
    pub days: Option<u32>,
}

pub async fn create_recurring_endpoint(
    State(state): State<RecurringState>,
    Json(new_recurring): Json<NewRecurringTransaction>,
) -> Result<(StatusCode, Json<RecurringTransaction>), Error> {
    let connection = lock_connection(&state.db_connection)?;

    let recurring = create_recurring(new_recurring, &connection)?;
    tracing::info!(
        "Created {} recurring transaction {} \"{}\"",
        recurring.cadence,
        recurring.id,
        recurring.title
    );

    Ok((StatusCode::CREATED, Json(recurring)))
}

pub async fn get_recurring_endpoint(
    State(state): State<RecurringState>,
) -> Result<Json<Vec<RecurringTransaction>>, Error> {
    let connection = lock_connection(&state.db_connection)?;

    get_recurring(&connection).map(Json)
}

pub async fn delete_recurring_endpoint(
    State(state): State<RecurringState>,
    Path(recurring_id): Path<RecurringId>,
) -> Result<StatusCode, Error> {
    let connection = lock_connection(&state.db_connection)?;

    delete_recurring(recurring_id, &connection)?;
    tracing::info!("Deleted recurring transaction {recurring_id}");

    Ok(StatusCode::NO_CONTENT)
}

/// A route handler for the occurrences due within the next `days` days.
pub async fn get_upcoming_endpoint(
    State(state): State<RecurringState>,
    Query(query): Query<UpcomingQuery>,
) -> Result<Json<Vec<UpcomingOccurrence>>, Error> {
    let now = now_in_timezone(&state.local_timezone)?;
    let days = query.days.unwrap_or(DEFAULT_UPCOMING_DAYS);
    let until = now
        .checked_add(Duration::days(days.into()))
        .ok_or_else(|| Error::InvalidRange(format!("{days} days from now is out of range")))?;

    let connection = lock_connection(&state.db_connection)?;
    let recurring = get_recurring(&connection)?;

    Ok(Json(upcoming_occurrences(&recurring, until)))
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use crate::{Error, test_utils::get_test_connection, transaction::TransactionType};

    use super::{
        Cadence, NewRecurringTransaction, RecurringTransaction, create_recurring,
        delete_recurring, get_recurring, upcoming_occurrences,
    };

    fn recurring(cadence: Cadence, next_run_at: time::OffsetDateTime) -> RecurringTransaction {
        RecurringTransaction {
            id: 1,
            title: "Cold room rent".to_owned(),
            kind: TransactionType::Expense,
            amount: 15_000.0,
            cadence,
            next_run_at,
            category: Some("Rent".to_owned()),
            created_by: None,
        }
    }

    #[test]
    fn monthly_keeps_day_and_clamps_to_month_end() {
        let first = datetime!(2025-01-31 09:00 UTC);

        let dates: Vec<_> = (0..4)
            .map(|n| Cadence::Monthly.nth_occurrence(first, n).unwrap())
            .collect();

        assert_eq!(
            dates,
            vec![
                datetime!(2025-01-31 09:00 UTC),
                datetime!(2025-02-28 09:00 UTC),
                datetime!(2025-03-31 09:00 UTC),
                datetime!(2025-04-30 09:00 UTC),
            ]
        );
    }

    #[test]
    fn yearly_clamps_leap_day() {
        let first = datetime!(2024-02-29 00:00 UTC);

        assert_eq!(
            Cadence::Yearly.nth_occurrence(first, 1),
            Some(datetime!(2025-02-28 00:00 UTC))
        );
        assert_eq!(
            Cadence::Yearly.nth_occurrence(first, 4),
            Some(datetime!(2028-02-29 00:00 UTC))
        );
    }

    #[test]
    fn monthly_crosses_year_end() {
        assert_eq!(
            Cadence::Monthly.nth_occurrence(datetime!(2025-11-15 00:00 UTC), 3),
            Some(datetime!(2026-02-15 00:00 UTC))
        );
    }

    #[test]
    fn upcoming_projects_through_the_horizon() {
        let records = vec![
            recurring(Cadence::Weekly, datetime!(2025-06-02 08:00 UTC)),
            RecurringTransaction {
                id: 2,
                ..recurring(Cadence::Monthly, datetime!(2025-06-20 08:00 UTC))
            },
        ];

        let occurrences = upcoming_occurrences(&records, datetime!(2025-06-30 23:59 UTC));

        let dates: Vec<_> = occurrences.iter().map(|o| (o.recurring_id, o.date)).collect();
        assert_eq!(
            dates,
            vec![
                (1, datetime!(2025-06-02 08:00 UTC)),
                (1, datetime!(2025-06-09 08:00 UTC)),
                (1, datetime!(2025-06-16 08:00 UTC)),
                (2, datetime!(2025-06-20 08:00 UTC)),
                (1, datetime!(2025-06-23 08:00 UTC)),
                (1, datetime!(2025-06-30 08:00 UTC)),
            ]
        );
    }

    #[test]
    fn record_due_after_horizon_has_no_occurrences() {
        let records = vec![recurring(Cadence::Daily, datetime!(2025-08-01 00:00 UTC))];

        assert!(upcoming_occurrences(&records, datetime!(2025-07-01 00:00 UTC)).is_empty());
    }

    #[test]
    fn create_list_delete() {
        let conn = get_test_connection();
        let created = create_recurring(
            NewRecurringTransaction {
                title: "Market levy".to_owned(),
                kind: TransactionType::Expense,
                amount: 200.0,
                cadence: Cadence::Weekly,
                next_run_at: datetime!(2025-06-02 08:00 UTC),
                category: None,
                created_by: None,
            },
            &conn,
        )
        .unwrap();

        assert_eq!(get_recurring(&conn), Ok(vec![created.clone()]));
        delete_recurring(created.id, &conn).unwrap();
        assert_eq!(
            delete_recurring(created.id, &conn),
            Err(Error::DeleteMissingRecurring)
        );
    }
}

#[cfg(test)]
mod recurring_endpoint_tests {
    use axum::http::StatusCode;
    use serde_json::{Value, json};
    use time::{Duration, OffsetDateTime, format_description::well_known::Rfc3339};

    use crate::{endpoints, test_utils::get_test_server};

    #[tokio::test]
    async fn upcoming_respects_days() {
        let (server, _) = get_test_server();
        let next_run_at = (OffsetDateTime::now_utc() + Duration::hours(1))
            .format(&Rfc3339)
            .unwrap();
        server
            .post(endpoints::RECURRING)
            .json(&json!({
                "title": "Water bill",
                "type": "EXPENSE",
                "amount": 900.0,
                "cadence": "DAILY",
                "nextRunAt": next_run_at,
            }))
            .await
            .assert_status(StatusCode::CREATED);

        let response = server
            .get(endpoints::RECURRING_UPCOMING)
            .add_query_param("days", 3)
            .await;

        response.assert_status_ok();
        let occurrences = response.json::<Vec<Value>>();
        assert_eq!(occurrences.len(), 3);
        assert_eq!(occurrences[0]["title"], "Water bill");
    }

    #[tokio::test]
    async fn upcoming_beyond_the_calendar_is_a_bad_request() {
        let (server, _) = get_test_server();

        let response = server
            .get(endpoints::RECURRING_UPCOMING)
            .add_query_param("days", u32::MAX)
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(response.json::<Value>()["error"], "invalid_range");
    }
}
