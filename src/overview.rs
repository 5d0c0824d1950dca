//! The overview endpoint: range totals plus the monthly and daily series.

use std::sync::{Arc, Mutex};

use axum::{
    Json,
    extract::{FromRef, Query, State},
};
use rusqlite::Connection;
use serde::Serialize;

use crate::{
    AppState, Error,
    aggregation::{
        Bucket, IncomeExpenseTotals, daily_buckets, income_expense_totals, monthly_buckets,
        monthly_window,
    },
    db::lock_connection,
    range::RangeQuery,
    timezone::{get_timezone, local_now},
    transaction::{TransactionQuery, query_transactions},
};

/// The state needed for the overview page.
#[derive(Debug, Clone)]
pub struct OverviewState {
    /// The database connection for reading transactions.
    pub db_connection: Arc<Mutex<Connection>>,
    /// The local timezone as a canonical timezone name, e.g. "Africa/Nairobi".
    pub local_timezone: String,
}

impl FromRef<AppState> for OverviewState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            local_timezone: state.local_timezone.clone(),
        }
    }
}

/// The response body of the overview endpoint.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Overview {
    /// Describes the selected range, e.g. "This month".
    pub range_label: String,
    pub totals: IncomeExpenseTotals,
    /// The trailing six months, oldest first.
    pub monthly: Vec<Bucket>,
    /// The last seven days, oldest first. Not affected by the range filter.
    pub last_seven_days: Vec<Bucket>,
}

/// A route handler for the overview totals and time series.
pub async fn get_overview_endpoint(
    State(state): State<OverviewState>,
    Query(range_query): Query<RangeQuery>,
) -> Result<Json<Overview>, Error> {
    let timezone = get_timezone(&state.local_timezone)?;
    let now = local_now(timezone);
    let range = range_query.resolve(now, timezone)?;

    let connection = lock_connection(&state.db_connection)?;

    let in_range = query_transactions(
        &TransactionQuery {
            range,
            ..Default::default()
        },
        &connection,
    )?;
    // The seven day window always falls inside the six month window.
    let series_transactions = query_transactions(
        &TransactionQuery {
            range: Some(monthly_window(now, timezone)),
            ..Default::default()
        },
        &connection,
    )?;

    Ok(Json(Overview {
        range_label: range_query.label(range),
        totals: income_expense_totals(&in_range),
        monthly: monthly_buckets(&series_transactions, now, timezone),
        last_seven_days: daily_buckets(&series_transactions, now, timezone),
    }))
}

#[cfg(test)]
mod overview_tests {
    use serde_json::Value;
    use time::{Duration, OffsetDateTime};

    use crate::{
        endpoints,
        test_utils::get_test_server,
        transaction::{Transaction, TransactionType, create_transaction},
    };

    #[tokio::test]
    async fn overview_has_totals_and_both_series() {
        let (server, state) = get_test_server();
        let now = OffsetDateTime::now_utc();
        {
            let conn = state.db_connection.lock().unwrap();
            for (kind, amount, days_ago) in [
                (TransactionType::Income, 2000.0, 0),
                (TransactionType::Expense, 500.0, 0),
                (TransactionType::Expense, 300.0, 400),
            ] {
                create_transaction(
                    Transaction::build(kind, amount, now - Duration::days(days_ago)),
                    &conn,
                )
                .unwrap();
            }
        }

        let response = server.get(endpoints::OVERVIEW).await;

        response.assert_status_ok();
        let body = response.json::<Value>();
        assert_eq!(body["rangeLabel"], "All time");
        assert_eq!(body["totals"]["income"], 2000.0);
        assert_eq!(body["totals"]["expenses"], 800.0);
        assert_eq!(body["totals"]["net"], 1200.0);
        assert_eq!(body["monthly"].as_array().unwrap().len(), 6);
        assert_eq!(body["monthly"][5]["income"], 2000.0);
        assert_eq!(body["lastSevenDays"].as_array().unwrap().len(), 7);
        assert_eq!(body["lastSevenDays"][6]["expenses"], 500.0);
    }

    #[tokio::test]
    async fn daily_series_ignores_the_range_filter() {
        let (server, state) = get_test_server();
        let now = OffsetDateTime::now_utc();
        {
            let conn = state.db_connection.lock().unwrap();
            create_transaction(
                Transaction::build(TransactionType::Income, 40.0, now - Duration::days(2)),
                &conn,
            )
            .unwrap();
        }

        let response = server
            .get(endpoints::OVERVIEW)
            .add_query_param("range", "day")
            .await;

        let body = response.json::<Value>();
        assert_eq!(body["totals"]["income"], 0.0);
        assert_eq!(body["lastSevenDays"][4]["income"], 40.0);
    }
}
