//! Money borrowed by or lent out by the marketplace.

use std::{
    fmt,
    str::FromStr,
    sync::{Arc, Mutex},
};

use axum::{
    Json,
    extract::{FromRef, Path, State},
    http::StatusCode,
};
use rusqlite::{Connection, Row};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{
    AppState, Error,
    database_id::DebtId,
    db::{
        get_optional_timestamp, get_timestamp, lock_connection, require_text, sql_text_enum,
        to_millis, validate_amount,
    },
    timezone::now_in_timezone,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DebtType {
    /// Money the marketplace owes.
    Borrowed,
    /// Money owed to the marketplace.
    Lent,
}

impl DebtType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Borrowed => "BORROWED",
            Self::Lent => "LENT",
        }
    }
}

impl FromStr for DebtType {
    type Err = String;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        match text {
            "BORROWED" => Ok(Self::Borrowed),
            "LENT" => Ok(Self::Lent),
            other => Err(format!("unknown debt type {other}")),
        }
    }
}

impl fmt::Display for DebtType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

sql_text_enum!(DebtType);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Debt {
    pub id: DebtId,
    #[serde(rename = "type")]
    pub kind: DebtType,
    /// Who the money was borrowed from or lent to.
    pub party: String,
    pub principal: f64,
    /// Annual interest rate as a percentage.
    pub interest_rate: f64,
    #[serde(with = "time::serde::rfc3339")]
    pub start_date: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub due_date: Option<OffsetDateTime>,
    pub notes: Option<String>,
    pub created_by: Option<String>,
}

/// The request body for creating a [Debt].
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewDebt {
    #[serde(rename = "type")]
    pub kind: DebtType,
    pub party: String,
    pub principal: f64,
    #[serde(default)]
    pub interest_rate: f64,
    /// Defaults to the current time.
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub start_date: Option<OffsetDateTime>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub due_date: Option<OffsetDateTime>,
    pub notes: Option<String>,
    pub created_by: Option<String>,
}

/// Principal totals over all debts.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct DebtSummary {
    pub borrowed: f64,
    pub lent: f64,
    /// Lent minus borrowed.
    pub net: f64,
}

pub fn summarize_debts(debts: &[Debt]) -> DebtSummary {
    let (borrowed, lent) = debts
        .iter()
        .fold((0.0, 0.0), |(borrowed, lent), debt| match debt.kind {
            DebtType::Borrowed => (borrowed + debt.principal, lent),
            DebtType::Lent => (borrowed, lent + debt.principal),
        });

    DebtSummary {
        borrowed,
        lent,
        net: lent - borrowed,
    }
}

const DEBT_COLUMNS: &str =
    "id, type, party, principal, interest_rate, start_date, due_date, notes, created_by";

/// Create a new debt, starting at `now` unless a start date is given.
///
/// # Errors
/// This function will return a:
/// - [Error::EmptyField] if the party is blank,
/// - [Error::InvalidAmount] if the principal or interest rate is negative or not finite,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn create_debt(debt: NewDebt, now: OffsetDateTime, connection: &Connection) -> Result<Debt, Error> {
    let party = require_text(&debt.party, "party")?;
    let principal = validate_amount(debt.principal)?;
    let interest_rate = validate_amount(debt.interest_rate)?;

    let debt = connection
        .prepare(&format!(
            "INSERT INTO debt
                (type, party, principal, interest_rate, start_date, due_date, notes, created_by)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             RETURNING {DEBT_COLUMNS}"
        ))?
        .query_row(
            (
                debt.kind,
                party,
                principal,
                interest_rate,
                to_millis(debt.start_date.unwrap_or(now)),
                debt.due_date.map(to_millis),
                debt.notes,
                debt.created_by,
            ),
            map_debt_row,
        )?;

    Ok(debt)
}

/// Get all debts, newest first.
pub fn get_debts(connection: &Connection) -> Result<Vec<Debt>, Error> {
    connection
        .prepare(&format!(
            "SELECT {DEBT_COLUMNS} FROM debt ORDER BY start_date DESC, id DESC"
        ))?
        .query_map([], map_debt_row)?
        .map(|maybe_debt| maybe_debt.map_err(Error::from))
        .collect()
}

/// Delete a debt by ID. Returns an error if the debt doesn't exist.
pub fn delete_debt(id: DebtId, connection: &Connection) -> Result<(), Error> {
    let rows_affected = connection.execute("DELETE FROM debt WHERE id = ?1", [id])?;

    if rows_affected == 0 {
        return Err(Error::DeleteMissingDebt);
    }

    Ok(())
}

pub fn create_debt_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS debt (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            type TEXT NOT NULL CHECK (type IN ('BORROWED', 'LENT')),
            party TEXT NOT NULL,
            principal REAL NOT NULL CHECK (principal >= 0),
            interest_rate REAL NOT NULL DEFAULT 0,
            start_date INTEGER NOT NULL,
            due_date INTEGER,
            notes TEXT,
            created_by TEXT
        )",
        (),
    )?;

    Ok(())
}

fn map_debt_row(row: &Row) -> Result<Debt, rusqlite::Error> {
    Ok(Debt {
        id: row.get(0)?,
        kind: row.get(1)?,
        party: row.get(2)?,
        principal: row.get(3)?,
        interest_rate: row.get(4)?,
        start_date: get_timestamp(row, 5)?,
        due_date: get_optional_timestamp(row, 6)?,
        notes: row.get(7)?,
        created_by: row.get(8)?,
    })
}

// ============================================================================
// ENDPOINTS
// ============================================================================

#[derive(Debug, Clone)]
pub struct DebtState {
    pub db_connection: Arc<Mutex<Connection>>,
    pub local_timezone: String,
}

impl FromRef<AppState> for DebtState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            local_timezone: state.local_timezone.clone(),
        }
    }
}

pub async fn create_debt_endpoint(
    State(state): State<DebtState>,
    Json(new_debt): Json<NewDebt>,
) -> Result<(StatusCode, Json<Debt>), Error> {
    let now = now_in_timezone(&state.local_timezone)?;
    let connection = lock_connection(&state.db_connection)?;

    let debt = create_debt(new_debt, now, &connection)?;
    tracing::info!("Created {} debt {} with {}", debt.kind, debt.id, debt.party);

    Ok((StatusCode::CREATED, Json(debt)))
}

pub async fn get_debts_endpoint(State(state): State<DebtState>) -> Result<Json<Vec<Debt>>, Error> {
    let connection = lock_connection(&state.db_connection)?;

    get_debts(&connection).map(Json)
}

pub async fn get_debt_summary_endpoint(
    State(state): State<DebtState>,
) -> Result<Json<DebtSummary>, Error> {
    let connection = lock_connection(&state.db_connection)?;
    let debts = get_debts(&connection)?;

    Ok(Json(summarize_debts(&debts)))
}

pub async fn delete_debt_endpoint(
    State(state): State<DebtState>,
    Path(debt_id): Path<DebtId>,
) -> Result<StatusCode, Error> {
    let connection = lock_connection(&state.db_connection)?;

    delete_debt(debt_id, &connection)?;
    tracing::info!("Deleted debt {debt_id}");

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use crate::{Error, test_utils::get_test_connection};

    use super::{DebtType, NewDebt, create_debt, delete_debt, get_debts, summarize_debts};

    fn new_debt(kind: DebtType, principal: f64) -> NewDebt {
        NewDebt {
            kind,
            party: "Cooperative bank".to_owned(),
            principal,
            interest_rate: 0.0,
            start_date: None,
            due_date: None,
            notes: None,
            created_by: None,
        }
    }

    #[test]
    fn start_date_defaults_to_now() {
        let conn = get_test_connection();
        let now = datetime!(2025-07-01 10:00 UTC);

        let debt = create_debt(new_debt(DebtType::Borrowed, 1000.0), now, &conn).unwrap();

        assert_eq!(debt.start_date, now);
        assert_eq!(debt.interest_rate, 0.0);
    }

    #[test]
    fn blank_party_is_rejected() {
        let conn = get_test_connection();

        let result = create_debt(
            NewDebt {
                party: " ".to_owned(),
                ..new_debt(DebtType::Lent, 10.0)
            },
            datetime!(2025-07-01 10:00 UTC),
            &conn,
        );

        assert_eq!(result, Err(Error::EmptyField("party")));
    }

    #[test]
    fn summary_nets_lent_against_borrowed() {
        let conn = get_test_connection();
        let now = datetime!(2025-07-01 10:00 UTC);
        for (kind, principal) in [
            (DebtType::Borrowed, 50_000.0),
            (DebtType::Lent, 12_000.0),
            (DebtType::Lent, 3_000.0),
        ] {
            create_debt(new_debt(kind, principal), now, &conn).unwrap();
        }

        let summary = summarize_debts(&get_debts(&conn).unwrap());

        assert_eq!(summary.borrowed, 50_000.0);
        assert_eq!(summary.lent, 15_000.0);
        assert_eq!(summary.net, -35_000.0);
    }

    #[test]
    fn delete_missing_debt_fails() {
        let conn = get_test_connection();

        assert_eq!(delete_debt(5, &conn), Err(Error::DeleteMissingDebt));
    }
}

#[cfg(test)]
mod debt_endpoint_tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use crate::{endpoints, test_utils::get_test_server};

    #[tokio::test]
    async fn create_then_summarize() {
        let (server, _) = get_test_server();

        server
            .post(endpoints::DEBTS)
            .json(&json!({
                "type": "LENT",
                "party": "Farmer group",
                "principal": 4000.0,
                "interestRate": 5.0,
            }))
            .await
            .assert_status(StatusCode::CREATED);

        let response = server.get(endpoints::DEBTS_SUMMARY).await;

        response.assert_status_ok();
        response.assert_json(&json!({ "borrowed": 0.0, "lent": 4000.0, "net": 4000.0 }));
    }
}
