//! Implements a struct that holds the state of the REST server.

use std::sync::{Arc, Mutex};

use rusqlite::Connection;

use crate::{Error, config::FinanceConfig, db::initialize, timezone::get_timezone};

/// The state of the REST server.
#[derive(Debug, Clone)]
pub struct AppState {
    /// The local timezone as a canonical timezone name, e.g. "Africa/Nairobi".
    pub local_timezone: String,

    /// Payout rates and report details.
    pub finance_config: FinanceConfig,

    /// The database connection
    pub db_connection: Arc<Mutex<Connection>>,
}

impl AppState {
    /// Create a new [AppState] with a SQLite database connection.
    ///
    /// This function will initialize the database by adding the tables for the domain models.
    /// `local_timezone` should be a valid, canonical timezone name, e.g. "Africa/Nairobi".
    ///
    /// # Errors
    /// Returns an error if the timezone is not known or the database cannot be initialized.
    pub fn new(
        db_connection: Connection,
        local_timezone: &str,
        finance_config: FinanceConfig,
    ) -> Result<Self, Error> {
        get_timezone(local_timezone)?;

        initialize(&db_connection)?;

        Ok(Self {
            local_timezone: local_timezone.to_owned(),
            finance_config,
            db_connection: Arc::new(Mutex::new(db_connection)),
        })
    }
}
