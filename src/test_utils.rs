//! Helpers shared by the unit and endpoint tests.

use axum_test::TestServer;
use rusqlite::Connection;
use time_tz::Tz;

use crate::{
    AppState, build_router, config::FinanceConfig, db::initialize, timezone::get_timezone,
};

/// The timezone used by test servers, UTC so that test dates match stored dates.
pub const TEST_TIMEZONE: &str = "Etc/UTC";

/// Look up a timezone that is known to exist.
pub fn zone(name: &str) -> &'static Tz {
    get_timezone(name).expect("Could not find timezone")
}

/// The timezone of [TEST_TIMEZONE].
pub fn utc() -> &'static Tz {
    zone(TEST_TIMEZONE)
}

/// An in-memory database with all tables created.
pub fn get_test_connection() -> Connection {
    let conn = Connection::open_in_memory().expect("Could not open in-memory SQLite database");
    initialize(&conn).expect("Could not initialize database");
    conn
}

pub fn get_test_state() -> AppState {
    let conn = Connection::open_in_memory().expect("Could not open in-memory SQLite database");
    AppState::new(conn, TEST_TIMEZONE, FinanceConfig::default())
        .expect("Could not create app state")
}

/// A test server for the full router along with its state for seeding records.
pub fn get_test_server() -> (TestServer, AppState) {
    let state = get_test_state();
    let server =
        TestServer::try_new(build_router(state.clone())).expect("Could not create test server.");

    (server, state)
}
