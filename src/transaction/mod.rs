//! Income and expense bookkeeping.
//!
//! This module contains everything related to transactions:
//! - The `Transaction` model and its builder
//! - Database functions for storing, querying, and deleting transactions
//! - Route handlers for the transaction endpoints

mod core;
mod endpoints;
mod query;

pub use self::core::{Transaction, TransactionType, create_transaction, create_transaction_table};
pub use endpoints::{
    TypeFilter, create_transaction_endpoint, delete_transaction_endpoint, get_summary_endpoint,
    get_transaction_endpoint, get_transactions_endpoint,
};
pub use query::{SortOrder, TransactionQuery, query_transactions};
