//! Transaction data aggregation for the overview, income and report endpoints.
//!
//! Provides functions to sum amounts by a classification key, to total income
//! and expenses, and to bucket transactions by calendar month and by day.

use std::collections::BTreeMap;

use serde::Serialize;
use time::{Duration, OffsetDateTime};
use time_tz::{OffsetDateTimeExt, Tz};

use crate::{
    range::{TimeRange, first_of_month_before, first_of_next_month, month_abbrev, start_of_day},
    transaction::{Transaction, TransactionType},
};

/// The number of calendar months in the monthly series, including the current month.
pub const MONTHLY_BUCKET_COUNT: u32 = 6;

/// The number of days in the daily series, including today.
pub const DAILY_BUCKET_COUNT: i64 = 7;

/// Sums `amount` of each item grouped by `key`.
///
/// The classification comes from the records themselves, this function only
/// adds up what the caller groups together.
pub fn totals_by_key<T, K: Ord>(
    items: impl IntoIterator<Item = T>,
    key: impl Fn(&T) -> K,
    amount: impl Fn(&T) -> f64,
) -> BTreeMap<K, f64> {
    let mut totals = BTreeMap::new();

    for item in items {
        *totals.entry(key(&item)).or_insert(0.0) += amount(&item);
    }

    totals
}

/// Total income and expenses of a set of transactions.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct IncomeExpenseTotals {
    pub income: f64,
    pub expenses: f64,
    /// Income minus expenses, may be negative.
    pub net: f64,
}

impl IncomeExpenseTotals {
    pub fn new(income: f64, expenses: f64) -> Self {
        Self {
            income,
            expenses,
            net: net_profit(income, expenses),
        }
    }
}

/// Income minus expenses without any clamping.
pub fn net_profit(income: f64, expenses: f64) -> f64 {
    income - expenses
}

pub fn income_expense_totals(transactions: &[Transaction]) -> IncomeExpenseTotals {
    let totals = totals_by_key(transactions, |t| t.kind, |t| t.amount);

    IncomeExpenseTotals::new(
        totals.get(&TransactionType::Income).copied().unwrap_or(0.0),
        totals.get(&TransactionType::Expense).copied().unwrap_or(0.0),
    )
}

/// Income and expenses for one period of a time series.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Bucket {
    /// "Mon YYYY" for months and the ISO date for days.
    pub label: String,
    #[serde(with = "time::serde::rfc3339")]
    pub start: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub end: OffsetDateTime,
    pub income: f64,
    pub expenses: f64,
    pub net: f64,
}

/// The range covered by [monthly_buckets]: from the first of the oldest month
/// to the end of the current month.
pub fn monthly_window(now: OffsetDateTime, timezone: &Tz) -> TimeRange {
    let today = now.to_timezone(timezone).date();

    TimeRange {
        from: start_of_day(timezone, first_of_month_before(today, MONTHLY_BUCKET_COUNT - 1)),
        to: start_of_day(timezone, first_of_next_month(today)) - Duration::milliseconds(1),
    }
}

/// Income and expenses for the trailing six calendar months, oldest first.
pub fn monthly_buckets(
    transactions: &[Transaction],
    now: OffsetDateTime,
    timezone: &Tz,
) -> Vec<Bucket> {
    let today = now.to_timezone(timezone).date();

    let periods = (0..MONTHLY_BUCKET_COUNT).rev().map(|months_back| {
        let first = first_of_month_before(today, months_back);
        let label = format!("{} {}", month_abbrev(first.month()), first.year());
        let range = TimeRange {
            from: start_of_day(timezone, first),
            to: start_of_day(timezone, first_of_next_month(first)) - Duration::milliseconds(1),
        };

        (label, range)
    });

    fill_buckets(periods, transactions)
}

/// Income and expenses for each of the last seven days, today last.
///
/// This window does not depend on any range filter. Each day starts at local
/// midnight, so a day with a clock change is 23 or 25 hours long.
pub fn daily_buckets(
    transactions: &[Transaction],
    now: OffsetDateTime,
    timezone: &Tz,
) -> Vec<Bucket> {
    let today = now.to_timezone(timezone).date();

    let periods = (0..DAILY_BUCKET_COUNT).rev().map(|days_back| {
        let day = today - Duration::days(days_back);
        let range = TimeRange {
            from: start_of_day(timezone, day),
            to: start_of_day(timezone, day + Duration::days(1)) - Duration::milliseconds(1),
        };

        (day.to_string(), range)
    });

    fill_buckets(periods, transactions)
}

fn fill_buckets(
    periods: impl Iterator<Item = (String, TimeRange)>,
    transactions: &[Transaction],
) -> Vec<Bucket> {
    periods
        .map(|(label, range)| {
            let in_range: Vec<Transaction> = transactions
                .iter()
                .filter(|transaction| range.contains(transaction.date))
                .cloned()
                .collect();
            let totals = income_expense_totals(&in_range);

            Bucket {
                label,
                start: range.from,
                end: range.to,
                income: totals.income,
                expenses: totals.expenses,
                net: totals.net,
            }
        })
        .collect()
}
