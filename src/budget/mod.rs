//! Budgets: spending limits per week or month over a set of expense categories.

mod core;
mod endpoints;
mod utilization;

pub use self::core::create_budget_table;
pub use endpoints::{
    create_budget_endpoint, delete_budget_endpoint, get_budget_utilization_endpoint,
    get_budgets_endpoint,
};
pub use utilization::{BudgetUtilization, get_budget_utilization};
