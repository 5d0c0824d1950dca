//! The API endpoints URIs.
//!
//! For endpoints that take a parameter, e.g., '/finance/goals/{goal_id}', use [format_endpoint].

/// Income, expense and balance totals.
pub const SUMMARY: &str = "/finance/summary";
/// Totals, net profit and the monthly and 7-day buckets in one response.
pub const OVERVIEW: &str = "/finance/overview";
/// The route to list and create transactions.
pub const TRANSACTIONS: &str = "/finance/transactions";
/// The route to access a single transaction.
pub const TRANSACTION: &str = "/finance/transactions/{transaction_id}";

/// Income from marketplace orders.
pub const INCOME_ORDERS: &str = "/finance/income/orders";
/// Income from delivery fees.
pub const INCOME_DELIVERY_FEES: &str = "/finance/income/delivery-fees";
/// Income totals per source.
pub const INCOME_BY_SOURCE: &str = "/finance/income/by-source";

/// Payouts owed to drivers.
pub const DRIVER_PAYOUTS: &str = "/finance/expenses/driver-payouts";
/// Payouts owed to farmers.
pub const FARMER_PAYOUTS: &str = "/finance/expenses/farmer-payouts";

/// The route to list and create budgets.
pub const BUDGETS: &str = "/finance/budgets";
/// The route to delete a budget.
pub const BUDGET: &str = "/finance/budgets/{budget_id}";
/// Spend against each budget for its current period.
pub const BUDGET_UTILIZATION: &str = "/finance/budgets/utilization";

/// The route to list and create savings goals.
pub const GOALS: &str = "/finance/goals";
/// The route to delete a savings goal.
pub const GOAL: &str = "/finance/goals/{goal_id}";
/// The route to add money to a savings goal.
pub const GOAL_CONTRIBUTE: &str = "/finance/goals/{goal_id}/contribute";

/// The route to list and create debts.
pub const DEBTS: &str = "/finance/debts";
/// The route to delete a debt.
pub const DEBT: &str = "/finance/debts/{debt_id}";
/// Borrowed and lent totals.
pub const DEBTS_SUMMARY: &str = "/finance/debts/summary";

/// The route to list and create recurring transactions.
pub const RECURRING: &str = "/finance/recurring";
/// The route to delete a recurring transaction.
pub const RECURRING_ITEM: &str = "/finance/recurring/{recurring_id}";
/// Projected occurrences of the recurring transactions.
pub const RECURRING_UPCOMING: &str = "/finance/recurring/upcoming";

/// Transactions as a CSV download.
pub const EXPORT_CSV: &str = "/finance/export/transactions.csv";
/// The finance report as a PDF download.
pub const EXPORT_PDF: &str = "/finance/export/report.pdf";

/// The route to list and create deliveries.
pub const DELIVERIES: &str = "/deliveries";
/// The route to assign a driver to a delivery.
pub const DELIVERY_ASSIGN: &str = "/deliveries/{delivery_id}/assign";
/// The route to move a delivery along its route.
pub const DELIVERY_STATUS: &str = "/deliveries/{delivery_id}/status";
/// The route to cancel a delivery.
pub const DELIVERY_CANCEL: &str = "/deliveries/{delivery_id}/cancel";

/// The route to list order lines and create orders.
pub const ORDERS: &str = "/orders";

/// Replace the parameter in `endpoint_path` with `id`.
///
/// A parameter is a string that starts with a left brace, followed by
/// lowercase letters or underscores, and ends with a right brace.
/// For example, in the endpoint path '/finance/goals/{goal_id}', '{goal_id}' is the parameter.
///
/// This function assumes that an endpoint path only contains ASCII characters
/// and a single parameter.
///
/// If no parameter is found in `endpoint_path`, the function returns the
/// the original `endpoint_path`.
pub fn format_endpoint(endpoint_path: &str, id: i64) -> String {
    let Some(param_start) = endpoint_path.find('{') else {
        return endpoint_path.to_owned();
    };

    let param_end = endpoint_path[param_start..]
        .find('}')
        .map(|end| param_start + end + 1)
        .unwrap_or(endpoint_path.len());

    format!(
        "{}{}{}",
        &endpoint_path[..param_start],
        id,
        &endpoint_path[param_end..]
    )
}
