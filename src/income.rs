//! Income derived from orders, delivery fees and manual income transactions.

use std::sync::{Arc, Mutex};

use axum::{
    Json,
    extract::{FromRef, Query, State},
};
use rusqlite::Connection;
use serde::Serialize;

use crate::{
    AppState, Error,
    aggregation::totals_by_key,
    config::FinanceConfig,
    db::lock_connection,
    delivery::Delivery,
    order::{OrderKind, OrderLine, query_order_lines},
    payout::{get_completed_deliveries, line_commission},
    range::{RangeQuery, TimeRange},
    timezone::{get_timezone, local_now},
    transaction::{Transaction, TransactionQuery, TransactionType, query_transactions},
};

pub const INVENTORY_SALE_SOURCE: &str = "inventory_sale";
pub const RENTAL_SOURCE: &str = "rental";
pub const LISTING_COMMISSION_SOURCE: &str = "listing_commission";
pub const DELIVERY_FEE_SOURCE: &str = "delivery_fee";
/// The key for manual income without a source.
pub const OTHER_SOURCE: &str = "other";

/// Gross order income split by order kind.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderIncome {
    pub inventory_sales: f64,
    pub rentals: f64,
    /// The marketplace commission on every order line.
    pub listing_commission: f64,
    /// Inventory sales plus rentals.
    pub gross: f64,
    pub line_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryFeeIncome {
    pub total: f64,
    pub delivery_count: usize,
}

/// The income total for one source.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceTotal {
    pub source: String,
    pub amount: f64,
}

pub fn order_income(lines: &[OrderLine], commission_percent: f64) -> OrderIncome {
    let by_kind = totals_by_key(lines, |line| line.kind, |line| line.line_total);
    let inventory_sales = by_kind.get(&OrderKind::Inventory).copied().unwrap_or(0.0);
    let rentals = by_kind.get(&OrderKind::Rental).copied().unwrap_or(0.0);

    OrderIncome {
        inventory_sales,
        rentals,
        listing_commission: lines
            .iter()
            .map(|line| line_commission(line, commission_percent))
            .sum(),
        gross: inventory_sales + rentals,
        line_count: lines.len(),
    }
}

/// Total the fees of `deliveries`, which should only contain delivered deliveries.
pub fn delivery_fee_income(deliveries: &[Delivery]) -> DeliveryFeeIncome {
    DeliveryFeeIncome {
        total: deliveries.iter().map(|delivery| delivery.fee).sum(),
        delivery_count: deliveries.len(),
    }
}

/// One total per income source, largest first.
///
/// The marketplace sources are always present, manual income transactions are
/// grouped by their own source.
pub fn income_by_source(
    lines: &[OrderLine],
    deliveries: &[Delivery],
    transactions: &[Transaction],
    commission_percent: f64,
) -> Vec<SourceTotal> {
    let orders = order_income(lines, commission_percent);
    let fees = delivery_fee_income(deliveries);

    let mut totals = vec![
        SourceTotal {
            source: INVENTORY_SALE_SOURCE.to_owned(),
            amount: orders.inventory_sales,
        },
        SourceTotal {
            source: RENTAL_SOURCE.to_owned(),
            amount: orders.rentals,
        },
        SourceTotal {
            source: LISTING_COMMISSION_SOURCE.to_owned(),
            amount: orders.listing_commission,
        },
        SourceTotal {
            source: DELIVERY_FEE_SOURCE.to_owned(),
            amount: fees.total,
        },
    ];

    let manual = totals_by_key(
        transactions
            .iter()
            .filter(|transaction| transaction.kind == TransactionType::Income),
        |transaction| {
            transaction
                .source
                .clone()
                .unwrap_or_else(|| OTHER_SOURCE.to_owned())
        },
        |transaction| transaction.amount,
    );

    for (source, amount) in manual {
        match totals.iter_mut().find(|total| total.source == source) {
            Some(total) => total.amount += amount,
            None => totals.push(SourceTotal { source, amount }),
        }
    }

    totals.sort_by(|a, b| b.amount.total_cmp(&a.amount));
    totals
}

/// Read the records for [income_by_source] and compute it.
pub fn get_income_by_source(
    range: Option<TimeRange>,
    commission_percent: f64,
    connection: &Connection,
) -> Result<Vec<SourceTotal>, Error> {
    let lines = query_order_lines(range, connection)?;
    let deliveries = get_completed_deliveries(range, connection)?;
    let transactions = query_transactions(
        &TransactionQuery {
            kind: Some(TransactionType::Income),
            range,
            sort_date: None,
        },
        connection,
    )?;

    Ok(income_by_source(
        &lines,
        &deliveries,
        &transactions,
        commission_percent,
    ))
}

// ============================================================================
// ENDPOINTS
// ============================================================================

#[derive(Debug, Clone)]
pub struct IncomeState {
    pub db_connection: Arc<Mutex<Connection>>,
    pub local_timezone: String,
    pub finance_config: FinanceConfig,
}

impl FromRef<AppState> for IncomeState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            local_timezone: state.local_timezone.clone(),
            finance_config: state.finance_config.clone(),
        }
    }
}

impl IncomeState {
    fn resolve_range(&self, range_query: &RangeQuery) -> Result<Option<TimeRange>, Error> {
        let timezone = get_timezone(&self.local_timezone)?;
        range_query.resolve(local_now(timezone), timezone)
    }
}

pub async fn get_order_income_endpoint(
    State(state): State<IncomeState>,
    Query(range_query): Query<RangeQuery>,
) -> Result<Json<OrderIncome>, Error> {
    let range = state.resolve_range(&range_query)?;
    let connection = lock_connection(&state.db_connection)?;
    let lines = query_order_lines(range, &connection)?;

    Ok(Json(order_income(
        &lines,
        state.finance_config.commission_percent,
    )))
}

pub async fn get_delivery_fee_income_endpoint(
    State(state): State<IncomeState>,
    Query(range_query): Query<RangeQuery>,
) -> Result<Json<DeliveryFeeIncome>, Error> {
    let range = state.resolve_range(&range_query)?;
    let connection = lock_connection(&state.db_connection)?;
    let deliveries = get_completed_deliveries(range, &connection)?;

    Ok(Json(delivery_fee_income(&deliveries)))
}

pub async fn get_income_by_source_endpoint(
    State(state): State<IncomeState>,
    Query(range_query): Query<RangeQuery>,
) -> Result<Json<Vec<SourceTotal>>, Error> {
    let range = state.resolve_range(&range_query)?;
    let connection = lock_connection(&state.db_connection)?;

    get_income_by_source(range, state.finance_config.commission_percent, &connection).map(Json)
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use crate::{
        delivery::{Delivery, DeliveryStatus},
        order::{OrderKind, OrderLine},
        transaction::{Transaction, TransactionType},
    };

    use super::{delivery_fee_income, income_by_source, order_income};

    fn line(kind: OrderKind, line_total: f64) -> OrderLine {
        OrderLine {
            id: 0,
            order_ref: "ORD-1".to_owned(),
            farmer: "Achieng".to_owned(),
            kind,
            item: "Cabbages".to_owned(),
            quantity: 1,
            unit_price: line_total,
            line_total,
            ordered_at: datetime!(2025-05-01 08:00 UTC),
        }
    }

    fn delivery(fee: f64) -> Delivery {
        Delivery {
            id: 0,
            order_ref: None,
            driver: Some("Kamau".to_owned()),
            status: DeliveryStatus::Delivered,
            fee,
            created_at: datetime!(2025-05-01 08:00 UTC),
            completed_at: Some(datetime!(2025-05-01 12:00 UTC)),
        }
    }

    fn income(source: Option<&str>, amount: f64) -> Transaction {
        Transaction {
            id: 0,
            kind: TransactionType::Income,
            amount,
            date: datetime!(2025-05-02 08:00 UTC),
            category: None,
            source: source.map(str::to_owned),
            description: None,
            receipt: None,
            created_by: None,
        }
    }

    #[test]
    fn order_income_splits_by_kind() {
        let lines = vec![
            line(OrderKind::Inventory, 1000.0),
            line(OrderKind::Inventory, 500.0),
            line(OrderKind::Rental, 2000.0),
        ];

        let income = order_income(&lines, 10.0);

        assert_eq!(income.inventory_sales, 1500.0);
        assert_eq!(income.rentals, 2000.0);
        assert_eq!(income.gross, 3500.0);
        assert_eq!(income.listing_commission, 350.0);
        assert_eq!(income.line_count, 3);
    }

    #[test]
    fn delivery_fees_are_summed() {
        let income = delivery_fee_income(&[delivery(200.0), delivery(350.0)]);

        assert_eq!(income.total, 550.0);
        assert_eq!(income.delivery_count, 2);
    }

    #[test]
    fn by_source_merges_manual_income_and_sorts_descending() {
        let totals = income_by_source(
            &[line(OrderKind::Inventory, 1000.0)],
            &[delivery(300.0)],
            &[
                income(Some("Grant"), 5000.0),
                income(None, 20.0),
                income(Some("delivery_fee"), 50.0),
            ],
            10.0,
        );

        let sources: Vec<(&str, f64)> = totals
            .iter()
            .map(|total| (total.source.as_str(), total.amount))
            .collect();
        assert_eq!(
            sources,
            vec![
                ("Grant", 5000.0),
                ("inventory_sale", 1000.0),
                ("delivery_fee", 350.0),
                ("listing_commission", 100.0),
                ("other", 20.0),
                ("rental", 0.0),
            ]
        );
    }
}

#[cfg(test)]
mod income_endpoint_tests {
    use serde_json::json;
    use time::OffsetDateTime;

    use crate::{
        endpoints,
        order::{NewOrderLine, OrderKind, create_order},
        test_utils::get_test_server,
    };

    #[tokio::test]
    async fn order_income_reports_gross_and_commission() {
        let (server, state) = get_test_server();
        {
            let conn = state.db_connection.lock().unwrap();
            create_order(
                "ORD-3",
                vec![NewOrderLine {
                    farmer: "Mwangi".to_owned(),
                    kind: OrderKind::Rental,
                    item: "Water pump".to_owned(),
                    quantity: 2,
                    unit_price: 600.0,
                }],
                OffsetDateTime::now_utc(),
                &conn,
            )
            .unwrap();
        }

        let response = server
            .get(endpoints::INCOME_ORDERS)
            .add_query_param("range", "week")
            .await;

        response.assert_status_ok();
        response.assert_json_contains(&json!({
            "inventorySales": 0.0,
            "rentals": 1200.0,
            "listingCommission": 120.0,
            "gross": 1200.0,
        }));
    }

    #[tokio::test]
    async fn delivery_fee_income_is_zero_without_deliveries() {
        let (server, _) = get_test_server();

        let response = server.get(endpoints::INCOME_DELIVERY_FEES).await;

        response.assert_status_ok();
        response.assert_json(&json!({ "total": 0.0, "deliveryCount": 0 }));
    }

    #[tokio::test]
    async fn by_source_lists_marketplace_sources() {
        let (server, _) = get_test_server();

        let response = server.get(endpoints::INCOME_BY_SOURCE).await;

        response.assert_status_ok();
        let totals = response.json::<Vec<serde_json::Value>>();
        assert_eq!(totals.len(), 4);
    }
}
