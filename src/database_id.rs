//! Database ID type definitions.

/// Alias for the integer type used for mapping to database IDs.
pub type DatabaseId = i64;
pub type TransactionId = DatabaseId;
pub type BudgetId = DatabaseId;
pub type GoalId = DatabaseId;
pub type DebtId = DatabaseId;
pub type RecurringId = DatabaseId;
pub type DeliveryId = DatabaseId;
pub type OrderLineId = DatabaseId;
