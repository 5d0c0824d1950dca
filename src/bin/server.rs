use std::{error::Error, fs::OpenOptions, net::SocketAddr, sync::Arc};

use axum::{
    Router,
    extract::{MatchedPath, Request},
};
use axum_server::Handle;
use clap::Parser;
use rusqlite::Connection;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{EnvFilter, Layer, filter, layer::SubscriberExt, util::SubscriberInitExt};

use agri_backoffice::{AppState, FinanceConfig, build_router, graceful_shutdown};

/// The REST API server for the marketplace finance back-office.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// File path to the application SQLite database.
    #[arg(long, env = "DB_PATH")]
    db_path: String,

    /// The port to serve the API from.
    #[arg(short, long, env = "PORT", default_value_t = 3000)]
    port: u16,

    /// The canonical name of the local timezone, e.g. "Africa/Nairobi".
    #[arg(long, env = "LOCAL_TIMEZONE", default_value = "Africa/Nairobi")]
    timezone: String,

    /// The flat amount paid to a driver per completed delivery.
    #[arg(long, env = "DRIVER_RATE", default_value_t = 300.0)]
    driver_rate: f64,

    /// The percentage of each order line the marketplace keeps.
    #[arg(long, env = "COMMISSION_PERCENT", default_value_t = 10.0)]
    commission_percent: f64,

    /// The name printed at the top of PDF reports.
    #[arg(long, env = "MARKETPLACE_NAME", default_value = "Agri Marketplace")]
    marketplace_name: String,

    /// A contact line printed under the name on PDF reports, may be repeated.
    #[arg(long = "contact", env = "MARKETPLACE_CONTACTS", value_delimiter = ';')]
    contact_lines: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    setup_logging()?;

    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));

    let finance_config = FinanceConfig {
        driver_rate_per_delivery: args.driver_rate,
        commission_percent: args.commission_percent,
        marketplace_name: args.marketplace_name,
        contact_lines: args.contact_lines,
    };

    let conn = Connection::open(&args.db_path)?;
    let state = AppState::new(conn, &args.timezone, finance_config)?;

    let handle = Handle::new();
    tokio::spawn(graceful_shutdown(handle.clone()));

    let router = add_tracing_layer(build_router(state));

    tracing::info!("HTTP server listening on {}", addr);
    axum_server::bind(addr)
        .handle(handle)
        .serve(router.into_make_service())
        .await?;

    Ok(())
}

fn setup_logging() -> Result<(), Box<dyn Error>> {
    let stdout_log = tracing_subscriber::fmt::layer()
        .pretty()
        .with_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")));

    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open("debug.log")?;

    let debug_log = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_writer(Arc::new(log_file))
        .with_filter(filter::LevelFilter::DEBUG);

    tracing_subscriber::registry()
        .with(stdout_log)
        .with(debug_log)
        .init();

    Ok(())
}

fn add_tracing_layer(router: Router) -> Router {
    let tracing_layer = TraceLayer::new_for_http()
        .make_span_with(|req: &Request| {
            let method = req.method();
            let uri = req.uri();

            let matched_path = req
                .extensions()
                .get::<MatchedPath>()
                .map(|matched_path| matched_path.as_str());

            tracing::debug_span!("request", %method, %uri, matched_path)
        })
        // Errors are logged where they are turned into responses.
        .on_failure(());

    router.layer(tracing_layer)
}
