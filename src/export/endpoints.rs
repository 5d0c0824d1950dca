//! Route handlers for the CSV and PDF downloads.

use std::sync::{Arc, Mutex};

use axum::{
    extract::{FromRef, Query, State},
    http::header,
    response::{IntoResponse, Response},
};
use rusqlite::Connection;

use crate::{
    AppState, Error,
    config::FinanceConfig,
    db::lock_connection,
    range::RangeQuery,
    timezone::{get_timezone, local_now},
    transaction::{SortOrder, TransactionQuery, TypeFilter, query_transactions},
};

use super::{csv::transactions_to_csv, pdf::render_report, report::build_report};

#[derive(Debug, Clone)]
pub struct ExportState {
    pub db_connection: Arc<Mutex<Connection>>,
    pub local_timezone: String,
    pub finance_config: FinanceConfig,
}

impl FromRef<AppState> for ExportState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            local_timezone: state.local_timezone.clone(),
            finance_config: state.finance_config.clone(),
        }
    }
}

/// A route handler for downloading transactions as CSV.
///
/// Accepts the same `type` and range filters as the transaction list.
pub async fn export_csv_endpoint(
    State(state): State<ExportState>,
    Query(filter): Query<TypeFilter>,
    Query(range_query): Query<RangeQuery>,
) -> Result<Response, Error> {
    let timezone = get_timezone(&state.local_timezone)?;
    let now = local_now(timezone);
    let query = TransactionQuery {
        kind: filter.kind,
        range: range_query.resolve(now, timezone)?,
        sort_date: Some(SortOrder::Descending),
    };

    let transactions = {
        let connection = lock_connection(&state.db_connection)?;
        query_transactions(&query, &connection)?
    };
    let csv = transactions_to_csv(&transactions, timezone)?;
    tracing::debug!("Exported {} transactions as CSV", transactions.len());

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_owned()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"transactions-{}.csv\"", now.date()),
            ),
        ],
        csv,
    )
        .into_response())
}

/// A route handler for downloading the finance report as a PDF.
pub async fn export_pdf_endpoint(
    State(state): State<ExportState>,
    Query(range_query): Query<RangeQuery>,
) -> Result<Response, Error> {
    let timezone = get_timezone(&state.local_timezone)?;
    let now = local_now(timezone);
    let range = range_query.resolve(now, timezone)?;

    let report = {
        let connection = lock_connection(&state.db_connection)?;
        build_report(
            range,
            range_query.label(range),
            now,
            timezone,
            &state.finance_config,
            &connection,
        )?
    };
    let pdf = render_report(&report);
    tracing::debug!("Rendered finance report, {} bytes", pdf.len());

    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_owned()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"finance-report-{}.pdf\"", now.date()),
            ),
        ],
        pdf,
    )
        .into_response())
}
