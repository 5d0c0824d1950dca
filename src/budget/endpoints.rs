//! Route handlers for budgets and their utilization.

use std::sync::{Arc, Mutex};

use axum::{
    Json,
    extract::{FromRef, Path, State},
    http::StatusCode,
};
use rusqlite::Connection;

use crate::{
    AppState, Error,
    database_id::BudgetId,
    db::lock_connection,
    timezone::{get_timezone, local_now},
};

use super::{
    core::{Budget, NewBudget, create_budget, delete_budget, get_budgets},
    utilization::{BudgetUtilization, get_budget_utilization},
};

/// The state needed for the budget endpoints.
#[derive(Debug, Clone)]
pub struct BudgetState {
    pub db_connection: Arc<Mutex<Connection>>,
    pub local_timezone: String,
}

impl FromRef<AppState> for BudgetState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            local_timezone: state.local_timezone.clone(),
        }
    }
}

pub async fn create_budget_endpoint(
    State(state): State<BudgetState>,
    Json(new_budget): Json<NewBudget>,
) -> Result<(StatusCode, Json<Budget>), Error> {
    let connection = lock_connection(&state.db_connection)?;

    let budget = create_budget(new_budget, &connection)?;
    tracing::info!("Created {} budget {} \"{}\"", budget.period, budget.id, budget.name);

    Ok((StatusCode::CREATED, Json(budget)))
}

pub async fn get_budgets_endpoint(
    State(state): State<BudgetState>,
) -> Result<Json<Vec<Budget>>, Error> {
    let connection = lock_connection(&state.db_connection)?;

    get_budgets(&connection).map(Json)
}

pub async fn delete_budget_endpoint(
    State(state): State<BudgetState>,
    Path(budget_id): Path<BudgetId>,
) -> Result<StatusCode, Error> {
    let connection = lock_connection(&state.db_connection)?;

    delete_budget(budget_id, &connection)?;
    tracing::info!("Deleted budget {budget_id}");

    Ok(StatusCode::NO_CONTENT)
}

/// A route handler for the spend against each budget in its current week or month.
pub async fn get_budget_utilization_endpoint(
    State(state): State<BudgetState>,
) -> Result<Json<Vec<BudgetUtilization>>, Error> {
    let timezone = get_timezone(&state.local_timezone)?;
    let now = local_now(timezone);
    let connection = lock_connection(&state.db_connection)?;

    get_budget_utilization(now, timezone, &connection).map(Json)
}

#[cfg(test)]
mod budget_endpoint_tests {
    use axum::http::StatusCode;
    use serde_json::{Value, json};
    use time::OffsetDateTime;

    use crate::{
        budget::core::Budget,
        endpoints::{self, format_endpoint},
        test_utils::get_test_server,
        transaction::{Transaction, TransactionType, create_transaction},
    };

    #[tokio::test]
    async fn create_uses_default_threshold() {
        let (server, _) = get_test_server();

        let response = server
            .post(endpoints::BUDGETS)
            .json(&json!({
                "name": "Transport",
                "period": "MONTHLY",
                "amount": 1000.0,
                "categories": ["Fuel"],
            }))
            .await;

        response.assert_status(StatusCode::CREATED);
        let budget = response.json::<Budget>();
        assert_eq!(budget.alert_threshold, 0.8);
    }

    #[tokio::test]
    async fn invalid_threshold_is_a_bad_request() {
        let (server, _) = get_test_server();

        let response = server
            .post(endpoints::BUDGETS)
            .json(&json!({
                "name": "Transport",
                "period": "WEEKLY",
                "amount": 1000.0,
                "alertThreshold": -0.1,
            }))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        response.assert_json_contains(&json!({ "error": "invalid_alert_threshold" }));
    }

    #[tokio::test]
    async fn utilization_flags_budget_at_threshold() {
        let (server, state) = get_test_server();
        server
            .post(endpoints::BUDGETS)
            .json(&json!({
                "name": "Transport",
                "period": "MONTHLY",
                "amount": 1000.0,
                "categories": ["Fuel"],
            }))
            .await
            .assert_status(StatusCode::CREATED);
        {
            let conn = state.db_connection.lock().unwrap();
            create_transaction(
                Transaction::build(TransactionType::Expense, 800.0, OffsetDateTime::now_utc())
                    .category(Some("Fuel".to_owned())),
                &conn,
            )
            .unwrap();
        }

        let response = server.get(endpoints::BUDGET_UTILIZATION).await;

        response.assert_status_ok();
        let utilization = response.json::<Vec<Value>>();
        assert_eq!(utilization[0]["spent"], 800.0);
        assert_eq!(utilization[0]["percent"], 80);
        assert_eq!(utilization[0]["nearLimit"], true);
    }

    #[tokio::test]
    async fn delete_missing_budget_is_not_found() {
        let (server, _) = get_test_server();

        server
            .delete(&format_endpoint(endpoints::BUDGET, 3))
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }
}
