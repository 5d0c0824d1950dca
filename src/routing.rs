//! Application router configuration.

use axum::{
    Router, middleware,
    routing::{delete, get, post, put},
};

use crate::{
    AppState,
    budget::{
        create_budget_endpoint, delete_budget_endpoint, get_budget_utilization_endpoint,
        get_budgets_endpoint,
    },
    debt::{
        create_debt_endpoint, delete_debt_endpoint, get_debt_summary_endpoint, get_debts_endpoint,
    },
    delivery::{
        assign_delivery_endpoint, cancel_delivery_endpoint, create_delivery_endpoint,
        get_deliveries_endpoint, update_delivery_status_endpoint,
    },
    endpoints,
    export::{export_csv_endpoint, export_pdf_endpoint},
    goal::{
        contribute_to_goal_endpoint, create_goal_endpoint, delete_goal_endpoint,
        get_goals_endpoint,
    },
    income::{
        get_delivery_fee_income_endpoint, get_income_by_source_endpoint,
        get_order_income_endpoint,
    },
    logging::logging_middleware,
    not_found::get_404_not_found,
    order::{create_order_endpoint, get_order_lines_endpoint},
    overview::get_overview_endpoint,
    payout::{get_driver_payouts_endpoint, get_farmer_payouts_endpoint},
    recurring::{
        create_recurring_endpoint, delete_recurring_endpoint, get_recurring_endpoint,
        get_upcoming_endpoint,
    },
    transaction::{
        create_transaction_endpoint, delete_transaction_endpoint, get_summary_endpoint,
        get_transaction_endpoint, get_transactions_endpoint,
    },
};

/// Return a router with all the app's routes.
pub fn build_router(state: AppState) -> Router {
    let finance_routes = Router::new()
        .route(endpoints::SUMMARY, get(get_summary_endpoint))
        .route(endpoints::OVERVIEW, get(get_overview_endpoint))
        .route(
            endpoints::TRANSACTIONS,
            get(get_transactions_endpoint).post(create_transaction_endpoint),
        )
        .route(
            endpoints::TRANSACTION,
            get(get_transaction_endpoint).delete(delete_transaction_endpoint),
        )
        .route(endpoints::INCOME_ORDERS, get(get_order_income_endpoint))
        .route(
            endpoints::INCOME_DELIVERY_FEES,
            get(get_delivery_fee_income_endpoint),
        )
        .route(
            endpoints::INCOME_BY_SOURCE,
            get(get_income_by_source_endpoint),
        )
        .route(endpoints::DRIVER_PAYOUTS, get(get_driver_payouts_endpoint))
        .route(endpoints::FARMER_PAYOUTS, get(get_farmer_payouts_endpoint))
        .route(
            endpoints::BUDGETS,
            get(get_budgets_endpoint).post(create_budget_endpoint),
        )
        .route(
            endpoints::BUDGET_UTILIZATION,
            get(get_budget_utilization_endpoint),
        )
        .route(endpoints::BUDGET, delete(delete_budget_endpoint))
        .route(
            endpoints::GOALS,
            get(get_goals_endpoint).post(create_goal_endpoint),
        )
        .route(endpoints::GOAL, delete(delete_goal_endpoint))
        .route(endpoints::GOAL_CONTRIBUTE, post(contribute_to_goal_endpoint))
        .route(
            endpoints::DEBTS,
            get(get_debts_endpoint).post(create_debt_endpoint),
        )
        .route(endpoints::DEBTS_SUMMARY, get(get_debt_summary_endpoint))
        .route(endpoints::DEBT, delete(delete_debt_endpoint))
        .route(
            endpoints::RECURRING,
            get(get_recurring_endpoint).post(create_recurring_endpoint),
        )
        .route(endpoints::RECURRING_UPCOMING, get(get_upcoming_endpoint))
        .route(endpoints::RECURRING_ITEM, delete(delete_recurring_endpoint))
        .route(endpoints::EXPORT_CSV, get(export_csv_endpoint))
        .route(endpoints::EXPORT_PDF, get(export_pdf_endpoint));

    // The records the finance figures are derived from.
    let marketplace_routes = Router::new()
        .route(
            endpoints::DELIVERIES,
            get(get_deliveries_endpoint).post(create_delivery_endpoint),
        )
        .route(endpoints::DELIVERY_ASSIGN, put(assign_delivery_endpoint))
        .route(
            endpoints::DELIVERY_STATUS,
            put(update_delivery_status_endpoint),
        )
        .route(endpoints::DELIVERY_CANCEL, put(cancel_delivery_endpoint))
        .route(
            endpoints::ORDERS,
            get(get_order_lines_endpoint).post(create_order_endpoint),
        );

    finance_routes
        .merge(marketplace_routes)
        .fallback(get_404_not_found)
        .layer(middleware::from_fn(logging_middleware))
        .with_state(state)
}
