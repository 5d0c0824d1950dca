//! CSV and PDF exports of the finance records.

mod csv;
mod endpoints;
mod pdf;
mod report;

pub use endpoints::{export_csv_endpoint, export_pdf_endpoint};
