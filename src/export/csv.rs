//! Transactions as CSV text.

use serde::{Deserialize, Serialize};
use time_tz::{OffsetDateTimeExt, Tz};

use crate::{
    Error,
    transaction::{Transaction, TransactionType},
};

/// A row of the exported CSV file.
///
/// The amount is signed: negative for expenses, positive for income.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CsvRow {
    /// The ISO date of the transaction in local time.
    pub date: String,
    #[serde(rename = "Type")]
    pub kind: TransactionType,
    pub category: String,
    pub source: String,
    pub description: String,
    pub amount: f64,
}

impl CsvRow {
    fn new(transaction: &Transaction, timezone: &Tz) -> Self {
        Self {
            date: transaction.date.to_timezone(timezone).date().to_string(),
            kind: transaction.kind,
            category: transaction.category.clone().unwrap_or_default(),
            source: transaction.source.clone().unwrap_or_default(),
            description: transaction.description.clone().unwrap_or_default(),
            amount: transaction.signed_amount(),
        }
    }
}

/// Write `transactions` as CSV, newest first, with every field quoted.
///
/// # Errors
/// Returns [Error::CsvError] if a row could not be written.
pub fn transactions_to_csv(
    transactions: &[Transaction],
    timezone: &Tz,
) -> Result<Vec<u8>, Error> {
    let mut sorted: Vec<&Transaction> = transactions.iter().collect();
    sorted.sort_by(|a, b| b.date.cmp(&a.date).then(b.id.cmp(&a.id)));

    let mut writer = csv::WriterBuilder::new()
        .quote_style(csv::QuoteStyle::Always)
        .from_writer(vec![]);

    // The header is written explicitly so that an empty export still has one.
    writer
        .write_record(["Date", "Type", "Category", "Source", "Description", "Amount"])
        .map_err(|error| Error::CsvError(error.to_string()))?;

    for transaction in sorted {
        let row = CsvRow::new(transaction, timezone);
        writer
            .write_record([
                row.date,
                row.kind.to_string(),
                row.category,
                row.source,
                row.description,
                row.amount.to_string(),
            ])
            .map_err(|error| Error::CsvError(error.to_string()))?;
    }

    writer.into_inner().map_err(|error| {
        tracing::error!("failed to finalize CSV export: {error}");
        Error::CsvError(error.to_string())
    })
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use crate::{
        test_utils::{utc, zone},
        transaction::{Transaction, TransactionType},
    };

    use super::{CsvRow, transactions_to_csv};

    fn transaction(
        id: i64,
        kind: TransactionType,
        amount: f64,
        date: time::OffsetDateTime,
        description: &str,
    ) -> Transaction {
        Transaction {
            id,
            kind,
            amount,
            date,
            category: Some("Produce".to_owned()),
            source: None,
            description: Some(description.to_owned()),
            receipt: None,
            created_by: None,
        }
    }

    fn sample() -> Vec<Transaction> {
        vec![
            transaction(
                1,
                TransactionType::Income,
                1200.5,
                datetime!(2025-03-01 10:00 UTC),
                "Tomatoes, 3 crates",
            ),
            transaction(
                2,
                TransactionType::Expense,
                450.0,
                datetime!(2025-03-04 10:00 UTC),
                "Diesel for the \"big\" truck",
            ),
        ]
    }

    fn read_rows(bytes: &[u8]) -> Vec<CsvRow> {
        csv::Reader::from_reader(bytes)
            .deserialize()
            .collect::<Result<Vec<CsvRow>, _>>()
            .expect("Could not read CSV")
    }

    #[test]
    fn header_and_quoting() {
        let bytes = transactions_to_csv(&sample(), utc()).unwrap();
        let text = String::from_utf8(bytes).unwrap();

        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some(r#""Date","Type","Category","Source","Description","Amount""#)
        );
        assert_eq!(
            lines.next(),
            Some(r#""2025-03-04","EXPENSE","Produce","","Diesel for the ""big"" truck","-450""#)
        );
    }

    #[test]
    fn round_trip_recovers_rows_newest_first() {
        let bytes = transactions_to_csv(&sample(), utc()).unwrap();

        let rows = read_rows(&bytes);

        let tuples: Vec<(&str, TransactionType, &str, f64)> = rows
            .iter()
            .map(|row| (row.date.as_str(), row.kind, row.category.as_str(), row.amount))
            .collect();
        assert_eq!(
            tuples,
            vec![
                ("2025-03-04", TransactionType::Expense, "Produce", -450.0),
                ("2025-03-01", TransactionType::Income, "Produce", 1200.5),
            ]
        );
        assert_eq!(rows[1].description, "Tomatoes, 3 crates");
        assert_eq!(rows[0].description, "Diesel for the \"big\" truck");
    }

    #[test]
    fn dates_use_the_local_offset() {
        let transactions = vec![transaction(
            1,
            TransactionType::Income,
            10.0,
            datetime!(2025-03-01 22:30 UTC),
            "Late sale",
        )];

        let rows = read_rows(&transactions_to_csv(&transactions, zone("Africa/Nairobi")).unwrap());

        assert_eq!(rows[0].date, "2025-03-02");
    }

    #[test]
    fn dates_use_the_offset_on_that_date() {
        let transactions = vec![
            transaction(
                1,
                TransactionType::Income,
                10.0,
                datetime!(2025-07-01 23:30 UTC),
                "Summer sale",
            ),
            transaction(
                2,
                TransactionType::Income,
                10.0,
                datetime!(2025-01-01 23:30 UTC),
                "Winter sale",
            ),
        ];

        let rows = read_rows(&transactions_to_csv(&transactions, zone("Europe/London")).unwrap());

        assert_eq!(rows[0].date, "2025-07-02");
        assert_eq!(rows[1].date, "2025-01-01");
    }

    #[test]
    fn empty_export_has_only_the_header() {
        let bytes = transactions_to_csv(&[], utc()).unwrap();

        assert_eq!(
            String::from_utf8(bytes).unwrap(),
            "\"Date\",\"Type\",\"Category\",\"Source\",\"Description\",\"Amount\"\n"
        );
    }

    #[test]
    fn zero_expense_is_not_negative() {
        let transactions = vec![transaction(
            1,
            TransactionType::Expense,
            0.0,
            datetime!(2025-03-01 10:00 UTC),
            "Waived fee",
        )];

        let text =
            String::from_utf8(transactions_to_csv(&transactions, utc()).unwrap()).unwrap();

        assert!(text.ends_with(",\"0\"\n"), "got {text}");
    }
}
