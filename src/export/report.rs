//! The finance report: the figures printed on the PDF export, gathered into tables.

use std::sync::OnceLock;

use numfmt::{Formatter, Precision};
use rusqlite::Connection;
use time::OffsetDateTime;
use time_tz::{OffsetDateTimeExt, Tz};

use crate::{
    Error,
    aggregation::{IncomeExpenseTotals, income_expense_totals},
    budget::{BudgetUtilization, get_budget_utilization},
    config::FinanceConfig,
    income::{SourceTotal, get_income_by_source},
    order::query_order_lines,
    payout::{
        DriverPayout, DriverRate, FarmerPayout, RateType, compute_driver_payouts,
        compute_farmer_payouts, get_completed_deliveries,
    },
    range::TimeRange,
    transaction::{SortOrder, Transaction, TransactionQuery, query_transactions},
};

/// Everything shown on an exported report.
#[derive(Debug, Clone, PartialEq)]
pub struct FinanceReport {
    pub marketplace_name: String,
    pub contact_lines: Vec<String>,
    /// Describes the reporting period, e.g. "Last month".
    pub range_label: String,
    pub generated_at: OffsetDateTime,
    /// Transaction dates are printed in this timezone.
    pub timezone: &'static Tz,
    pub totals: IncomeExpenseTotals,
    pub income_by_source: Vec<SourceTotal>,
    /// Newest first.
    pub transactions: Vec<Transaction>,
    pub driver_rate: DriverRate,
    pub driver_payouts: Vec<DriverPayout>,
    pub commission_percent: f64,
    pub farmer_payouts: Vec<FarmerPayout>,
    pub budgets: Vec<BudgetUtilization>,
}

/// Read the records in `range` and compute the report figures.
///
/// Budget utilization always covers the current week or month.
pub fn build_report(
    range: Option<TimeRange>,
    range_label: String,
    now: OffsetDateTime,
    timezone: &'static Tz,
    config: &FinanceConfig,
    connection: &Connection,
) -> Result<FinanceReport, Error> {
    let transactions = query_transactions(
        &TransactionQuery {
            range,
            sort_date: Some(SortOrder::Descending),
            ..Default::default()
        },
        connection,
    )?;
    let driver_rate = DriverRate {
        rate_type: RateType::Flat,
        value: config.driver_rate_per_delivery,
    };
    let deliveries = get_completed_deliveries(range, connection)?;
    let lines = query_order_lines(range, connection)?;

    Ok(FinanceReport {
        marketplace_name: config.marketplace_name.clone(),
        contact_lines: config.contact_lines.clone(),
        range_label,
        generated_at: now,
        timezone,
        totals: income_expense_totals(&transactions),
        income_by_source: get_income_by_source(range, config.commission_percent, connection)?,
        transactions,
        driver_rate,
        driver_payouts: compute_driver_payouts(&deliveries, driver_rate),
        commission_percent: config.commission_percent,
        farmer_payouts: compute_farmer_payouts(&lines, config.commission_percent),
        budgets: get_budget_utilization(now, timezone, connection)?,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    Left,
    Right,
}

/// A table column: its heading, share of the page width and alignment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Column {
    pub title: &'static str,
    pub weight: f32,
    pub align: Align,
}

const fn text(title: &'static str, weight: f32) -> Column {
    Column {
        title,
        weight,
        align: Align::Left,
    }
}

const fn number(title: &'static str, weight: f32) -> Column {
    Column {
        title,
        weight,
        align: Align::Right,
    }
}

/// A titled table of the report.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportSection {
    pub title: String,
    pub columns: Vec<Column>,
    pub rows: Vec<Vec<String>>,
    /// Shown instead of an empty table.
    pub empty_message: &'static str,
}

/// Format money with two decimals and comma separated thousands.
pub fn format_amount(amount: f64) -> String {
    static FMT: OnceLock<Formatter> = OnceLock::new();

    let fmt = FMT.get_or_init(|| {
        Formatter::new()
            .separator(',')
            .unwrap_or_else(|_| Formatter::new())
            .precision(Precision::Decimals(2))
    });

    let cents = (amount * 100.0).round() / 100.0;
    if cents == 0.0 {
        // numfmt renders zero as "0"
        return "0.00".to_owned();
    }

    let mut formatted = fmt.fmt_string(cents.abs());

    // numfmt drops trailing zeros, e.g. "12.30" comes out as "12.3" and "12.00" as "12".
    match formatted.find('.') {
        None => formatted.push_str(".00"),
        Some(point) if formatted.len() - point == 2 => formatted.push('0'),
        Some(_) => {}
    }

    if cents < 0.0 {
        formatted.insert(0, '-');
    }

    formatted
}

impl FinanceReport {
    /// The tables of the report in the order they are printed.
    pub fn sections(&self) -> Vec<ReportSection> {
        vec![
            self.summary_section(),
            self.income_section(),
            self.transaction_section(),
            self.driver_section(),
            self.farmer_section(),
            self.budget_section(),
        ]
    }

    fn summary_section(&self) -> ReportSection {
        ReportSection {
            title: "Summary".to_owned(),
            columns: vec![text("Figure", 3.0), number("Amount", 1.0)],
            rows: vec![
                vec!["Income".to_owned(), format_amount(self.totals.income)],
                vec!["Expenses".to_owned(), format_amount(self.totals.expenses)],
                vec!["Net profit".to_owned(), format_amount(self.totals.net)],
            ],
            empty_message: "",
        }
    }

    fn income_section(&self) -> ReportSection {
        ReportSection {
            title: "Income by source".to_owned(),
            columns: vec![text("Source", 3.0), number("Amount", 1.0)],
            rows: self
                .income_by_source
                .iter()
                .map(|total| vec![total.source.clone(), format_amount(total.amount)])
                .collect(),
            empty_message: "No income in this period.",
        }
    }

    fn transaction_section(&self) -> ReportSection {
        ReportSection {
            title: "Transactions".to_owned(),
            columns: vec![
                text("Date", 1.2),
                text("Type", 1.1),
                text("Category", 1.5),
                text("Description", 3.2),
                number("Amount", 1.3),
            ],
            rows: self
                .transactions
                .iter()
                .map(|transaction| {
                    vec![
                        transaction.date.to_timezone(self.timezone).date().to_string(),
                        transaction.kind.to_string(),
                        transaction.category.clone().unwrap_or_default(),
                        transaction.description.clone().unwrap_or_default(),
                        format_amount(transaction.signed_amount()),
                    ]
                })
                .collect(),
            empty_message: "No transactions in this period.",
        }
    }

    fn driver_section(&self) -> ReportSection {
        let rate = match self.driver_rate.rate_type {
            RateType::Flat => format!("{} per delivery", format_amount(self.driver_rate.value)),
            RateType::Percent => format!("{}% of fees", self.driver_rate.value),
        };

        ReportSection {
            title: format!("Driver payouts ({rate})"),
            columns: vec![
                text("Driver", 2.5),
                number("Deliveries", 1.0),
                number("Fees", 1.2),
                number("Payout", 1.2),
            ],
            rows: self
                .driver_payouts
                .iter()
                .map(|payout| {
                    vec![
                        payout.driver.clone(),
                        payout.completed_deliveries.to_string(),
                        format_amount(payout.fees),
                        format_amount(payout.payout),
                    ]
                })
                .collect(),
            empty_message: "No completed deliveries in this period.",
        }
    }

    fn farmer_section(&self) -> ReportSection {
        ReportSection {
            title: format!("Farmer payouts ({}% commission)", self.commission_percent),
            columns: vec![
                text("Farmer", 2.2),
                number("Lines", 0.8),
                number("Gross", 1.2),
                number("Commission", 1.2),
                number("Payout", 1.2),
            ],
            rows: self
                .farmer_payouts
                .iter()
                .map(|payout| {
                    vec![
                        payout.farmer.clone(),
                        payout.lines.to_string(),
                        format_amount(payout.gross),
                        format_amount(payout.commission),
                        format_amount(payout.payout),
                    ]
                })
                .collect(),
            empty_message: "No orders in this period.",
        }
    }

    fn budget_section(&self) -> ReportSection {
        ReportSection {
            title: "Budget utilization".to_owned(),
            columns: vec![
                text("Budget", 2.2),
                text("Period", 1.0),
                number("Limit", 1.2),
                number("Spent", 1.2),
                number("Used", 0.8),
                text("Status", 1.0),
            ],
            rows: self
                .budgets
                .iter()
                .map(|budget| {
                    vec![
                        budget.name.clone(),
                        budget.period.to_string(),
                        format_amount(budget.amount),
                        format_amount(budget.spent),
                        budget
                            .percent
                            .map(|percent| format!("{percent}%"))
                            .unwrap_or_else(|| "n/a".to_owned()),
                        if budget.near_limit { "Near limit" } else { "OK" }.to_owned(),
                    ]
                })
                .collect(),
            empty_message: "No budgets.",
        }
    }
}
