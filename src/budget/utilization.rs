//! Spend against each budget for its current period.

use serde::Serialize;
use time::OffsetDateTime;
use time_tz::Tz;

use crate::{
    Error,
    database_id::BudgetId,
    range::{TimeRange, resolve_range},
    transaction::{Transaction, TransactionQuery, TransactionType, query_transactions},
};

use super::core::{Budget, BudgetPeriod, get_budgets};

/// How much of a budget has been spent in its current period.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetUtilization {
    pub budget_id: BudgetId,
    pub name: String,
    pub period: BudgetPeriod,
    pub amount: f64,
    pub spent: f64,
    /// `spent / amount`, not clamped. `None` for a zero budget.
    pub ratio: Option<f64>,
    /// The ratio as a whole percentage.
    pub percent: Option<i64>,
    /// The percentage for progress bars, at most 100.
    pub progress: f64,
    /// Whether the ratio has reached the alert threshold.
    pub near_limit: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub period_start: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub period_end: OffsetDateTime,
}

/// Sum the expenses in `transactions` whose category belongs to `budget`.
///
/// The caller is responsible for restricting `transactions` to the budget period.
pub fn budget_spend(budget: &Budget, transactions: &[Transaction]) -> f64 {
    transactions
        .iter()
        .filter(|transaction| transaction.kind == TransactionType::Expense)
        .filter(|transaction| {
            transaction
                .category
                .as_ref()
                .is_some_and(|category| budget.categories.contains(category))
        })
        .map(|transaction| transaction.amount)
        .sum()
}

/// Compare `spent` against `budget` for the period `period`.
pub fn compute_utilization(budget: &Budget, spent: f64, period: TimeRange) -> BudgetUtilization {
    let ratio = (budget.amount > 0.0).then(|| spent / budget.amount);

    let (percent, progress, near_limit) = match ratio {
        Some(ratio) => {
            let percent = (ratio * 100.0).round();
            (
                Some(percent as i64),
                percent.min(100.0),
                ratio >= budget.alert_threshold,
            )
        }
        // Any spend against a zero budget is over the limit.
        None if spent > 0.0 => (None, 100.0, true),
        None => (None, 0.0, false),
    };

    BudgetUtilization {
        budget_id: budget.id,
        name: budget.name.clone(),
        period: budget.period,
        amount: budget.amount,
        spent,
        ratio,
        percent,
        progress,
        near_limit,
        period_start: period.from,
        period_end: period.to,
    }
}

/// Compute the utilization of every budget for the period containing `now`
/// in `timezone`.
pub fn get_budget_utilization(
    now: OffsetDateTime,
    timezone: &Tz,
    connection: &rusqlite::Connection,
) -> Result<Vec<BudgetUtilization>, Error> {
    let budgets = get_budgets(connection)?;
    let mut utilization = Vec::with_capacity(budgets.len());

    for period in [BudgetPeriod::Monthly, BudgetPeriod::Weekly] {
        let period_budgets: Vec<&Budget> = budgets
            .iter()
            .filter(|budget| budget.period == period)
            .collect();

        if period_budgets.is_empty() {
            continue;
        }

        let range = resolve_range(period.current_range(), now, timezone);
        let expenses = query_transactions(
            &TransactionQuery {
                kind: Some(TransactionType::Expense),
                range: Some(range),
                sort_date: None,
            },
            connection,
        )?;

        for budget in period_budgets {
            let spent = budget_spend(budget, &expenses);
            utilization.push(compute_utilization(budget, spent, range));
        }
    }

    // Keep the same order as the budget list.
    utilization.sort_by_key(|item| {
        budgets
            .iter()
            .position(|budget| budget.id == item.budget_id)
    });

    Ok(utilization)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use time::{Duration, macros::datetime};

    use crate::{
        budget::core::{Budget, BudgetPeriod, NewBudget, create_budget},
        range::TimeRange,
        test_utils::{get_test_connection, utc},
        transaction::{Transaction, TransactionType, create_transaction},
    };

    use super::{budget_spend, compute_utilization, get_budget_utilization};

    fn budget(amount: f64) -> Budget {
        Budget {
            id: 1,
            name: "Transport".to_owned(),
            period: BudgetPeriod::Monthly,
            amount,
            categories: BTreeSet::from(["Fuel".to_owned()]),
            alert_threshold: 0.8,
            notify_email: None,
            created_by: None,
        }
    }

    fn period() -> TimeRange {
        TimeRange {
            from: datetime!(2025-06-01 00:00 UTC),
            to: datetime!(2025-06-18 12:00 UTC),
        }
    }

    fn expense(category: &str, amount: f64) -> Transaction {
        Transaction {
            id: 0,
            kind: TransactionType::Expense,
            amount,
            date: datetime!(2025-06-10 12:00 UTC),
            category: Some(category.to_owned()),
            source: None,
            description: None,
            receipt: None,
            created_by: None,
        }
    }

    #[test]
    fn threshold_is_inclusive() {
        let below = compute_utilization(&budget(1000.0), 799.0, period());
        let at = compute_utilization(&budget(1000.0), 800.0, period());

        assert!(!below.near_limit);
        assert!(at.near_limit);
        assert_eq!(at.percent, Some(80));
    }

    #[test]
    fn utilization_is_monotonic_in_spend() {
        let mut previous = 0.0;

        for spent in (0..30).map(|step| step as f64 * 50.0) {
            let ratio = compute_utilization(&budget(1000.0), spent, period())
                .ratio
                .unwrap();
            assert!(ratio >= previous);
            previous = ratio;
        }
    }

    #[test]
    fn overspend_is_not_clamped_but_progress_is() {
        let utilization = compute_utilization(&budget(1000.0), 1500.0, period());

        assert_eq!(utilization.ratio, Some(1.5));
        assert_eq!(utilization.percent, Some(150));
        assert_eq!(utilization.progress, 100.0);
    }

    #[test]
    fn zero_budget_has_no_ratio() {
        let unused = compute_utilization(&budget(0.0), 0.0, period());
        let spent = compute_utilization(&budget(0.0), 10.0, period());

        assert_eq!(unused.ratio, None);
        assert!(!unused.near_limit);
        assert_eq!(spent.ratio, None);
        assert!(spent.near_limit);
    }

    #[test]
    fn spend_only_counts_budget_categories() {
        let transactions = vec![expense("Fuel", 300.0), expense("Seeds", 900.0)];

        assert_eq!(budget_spend(&budget(1000.0), &transactions), 300.0);
    }

    #[test]
    fn weekly_budget_ignores_last_week() {
        let conn = get_test_connection();
        // 2025-06-18 is a Wednesday.
        let now = datetime!(2025-06-18 12:00 UTC);
        create_budget(
            NewBudget {
                name: "Feed".to_owned(),
                period: BudgetPeriod::Weekly,
                amount: 200.0,
                categories: BTreeSet::from(["Feed".to_owned()]),
                alert_threshold: 0.5,
                notify_email: None,
                created_by: None,
            },
            &conn,
        )
        .unwrap();
        for (amount, days_ago) in [(120.0, 1), (500.0, 8)] {
            create_transaction(
                Transaction::build(TransactionType::Expense, amount, now - Duration::days(days_ago))
                    .category(Some("Feed".to_owned())),
                &conn,
            )
            .unwrap();
        }

        let utilization = get_budget_utilization(now, utc(), &conn).unwrap();

        assert_eq!(utilization.len(), 1);
        assert_eq!(utilization[0].spent, 120.0);
        assert_eq!(utilization[0].ratio, Some(0.6));
        assert!(utilization[0].near_limit);
        assert_eq!(utilization[0].period_start, datetime!(2025-06-16 00:00 UTC));
    }
}
