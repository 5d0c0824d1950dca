//! Driver and farmer payout computation and the endpoints that report them.

use std::{
    collections::BTreeMap,
    str::FromStr,
    sync::{Arc, Mutex},
};

use axum::{
    Json,
    extract::{FromRef, Query, State},
};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::{
    AppState, Error,
    config::FinanceConfig,
    db::{lock_connection, validate_amount},
    delivery::{Delivery, DeliveryQuery, DeliveryStatus, query_deliveries},
    order::{OrderLine, query_order_lines},
    query_params::empty_as_none,
    range::{RangeQuery, TimeRange},
    timezone::{get_timezone, local_now},
};

/// How the driver rate in a payout request is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RateType {
    /// A fixed amount per completed delivery.
    #[default]
    Flat,
    /// A percentage of the delivery fees the driver collected.
    Percent,
}

impl FromStr for RateType {
    type Err = String;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        match text {
            "flat" => Ok(Self::Flat),
            "percent" => Ok(Self::Percent),
            other => Err(format!("unknown rate type {other}, expected flat or percent")),
        }
    }
}

/// The rate drivers are paid at.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DriverRate {
    pub rate_type: RateType,
    pub value: f64,
}

impl DriverRate {
    fn payout(&self, completed_deliveries: u32, fees: f64) -> f64 {
        match self.rate_type {
            RateType::Flat => completed_deliveries as f64 * self.value,
            RateType::Percent => fees * self.value / 100.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DriverPayout {
    pub driver: String,
    pub completed_deliveries: u32,
    /// The delivery fees of the completed deliveries.
    pub fees: f64,
    pub payout: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FarmerPayout {
    pub farmer: String,
    pub lines: u32,
    /// The sum of the farmer's line totals.
    pub gross: f64,
    /// The marketplace commission withheld from `gross`.
    pub commission: f64,
    pub payout: f64,
}

/// Sum the payout per driver for the delivered deliveries in `deliveries`.
///
/// Deliveries with any other status are ignored. The result is sorted by payout,
/// largest first, and no rounding is applied.
pub fn compute_driver_payouts(deliveries: &[Delivery], rate: DriverRate) -> Vec<DriverPayout> {
    let mut per_driver: BTreeMap<&str, (u32, f64)> = BTreeMap::new();

    for delivery in deliveries
        .iter()
        .filter(|delivery| delivery.status == DeliveryStatus::Delivered)
    {
        let driver = delivery.driver.as_deref().unwrap_or("Unassigned");
        let (count, fees) = per_driver.entry(driver).or_insert((0, 0.0));
        *count += 1;
        *fees += delivery.fee;
    }

    let mut payouts: Vec<DriverPayout> = per_driver
        .into_iter()
        .map(|(driver, (completed_deliveries, fees))| DriverPayout {
            driver: driver.to_owned(),
            completed_deliveries,
            fees,
            payout: rate.payout(completed_deliveries, fees),
        })
        .collect();

    payouts.sort_by(|a, b| b.payout.total_cmp(&a.payout));
    payouts
}

/// The marketplace commission on a single order line.
pub fn line_commission(line: &OrderLine, commission_percent: f64) -> f64 {
    line.line_total * commission_percent / 100.0
}

/// Sum the payout per farmer: each line total minus the commission on that line.
pub fn compute_farmer_payouts(lines: &[OrderLine], commission_percent: f64) -> Vec<FarmerPayout> {
    let mut per_farmer: BTreeMap<&str, FarmerPayout> = BTreeMap::new();

    for line in lines {
        let commission = line_commission(line, commission_percent);
        let payout = per_farmer
            .entry(line.farmer.as_str())
            .or_insert_with(|| FarmerPayout {
                farmer: line.farmer.clone(),
                lines: 0,
                gross: 0.0,
                commission: 0.0,
                payout: 0.0,
            });

        payout.lines += 1;
        payout.gross += line.line_total;
        payout.commission += commission;
        payout.payout += line.line_total - commission;
    }

    let mut payouts: Vec<FarmerPayout> = per_farmer.into_values().collect();
    payouts.sort_by(|a, b| b.payout.total_cmp(&a.payout));
    payouts
}

/// Read the delivered deliveries that were completed within `range`.
pub fn get_completed_deliveries(
    range: Option<TimeRange>,
    connection: &Connection,
) -> Result<Vec<Delivery>, Error> {
    query_deliveries(
        &DeliveryQuery {
            status: Some(DeliveryStatus::Delivered),
            completed_in: range,
            ..Default::default()
        },
        connection,
    )
}

// ============================================================================
// ENDPOINTS
// ============================================================================

/// The state needed for the payout endpoints.
#[derive(Debug, Clone)]
pub struct PayoutState {
    pub db_connection: Arc<Mutex<Connection>>,
    pub local_timezone: String,
    pub finance_config: FinanceConfig,
}

impl FromRef<AppState> for PayoutState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            local_timezone: state.local_timezone.clone(),
            finance_config: state.finance_config.clone(),
        }
    }
}

/// The rate parameters of the driver payout endpoint.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateQuery {
    #[serde(default, deserialize_with = "empty_as_none")]
    pub rate_type: Option<RateType>,
    /// Defaults to the configured rate per delivery for flat rates.
    #[serde(default, deserialize_with = "empty_as_none")]
    pub rate_value: Option<f64>,
}

impl RateQuery {
    /// Fill in the defaults from `config` and validate the rate.
    pub fn resolve(&self, config: &FinanceConfig) -> Result<DriverRate, Error> {
        let rate_type = self.rate_type.unwrap_or_default();
        let value = match (rate_type, self.rate_value) {
            (_, Some(value)) => validate_amount(value)?,
            (RateType::Flat, None) => config.driver_rate_per_delivery,
            // Drivers keep their fees in full unless told otherwise.
            (RateType::Percent, None) => 100.0,
        };

        Ok(DriverRate { rate_type, value })
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DriverPayoutReport {
    pub rate_type: RateType,
    pub rate_value: f64,
    pub payouts: Vec<DriverPayout>,
    pub total: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FarmerPayoutReport {
    pub commission_percent: f64,
    pub payouts: Vec<FarmerPayout>,
    pub total: f64,
}

pub async fn get_driver_payouts_endpoint(
    State(state): State<PayoutState>,
    Query(rate_query): Query<RateQuery>,
    Query(range_query): Query<RangeQuery>,
) -> Result<Json<DriverPayoutReport>, Error> {
    let rate = rate_query.resolve(&state.finance_config)?;
    let timezone = get_timezone(&state.local_timezone)?;
    let now = local_now(timezone);
    let range = range_query.resolve(now, timezone)?;

    let connection = lock_connection(&state.db_connection)?;
    let deliveries = get_completed_deliveries(range, &connection)?;
    let payouts = compute_driver_payouts(&deliveries, rate);

    Ok(Json(DriverPayoutReport {
        rate_type: rate.rate_type,
        rate_value: rate.value,
        total: payouts.iter().map(|payout| payout.payout).sum(),
        payouts,
    }))
}

pub async fn get_farmer_payouts_endpoint(
    State(state): State<PayoutState>,
    Query(range_query): Query<RangeQuery>,
) -> Result<Json<FarmerPayoutReport>, Error> {
    let timezone = get_timezone(&state.local_timezone)?;
    let now = local_now(timezone);
    let range = range_query.resolve(now, timezone)?;

    let connection = lock_connection(&state.db_connection)?;
    let lines = query_order_lines(range, &connection)?;
    let commission_percent = state.finance_config.commission_percent;
    let payouts = compute_farmer_payouts(&lines, commission_percent);

    Ok(Json(FarmerPayoutReport {
        commission_percent,
        total: payouts.iter().map(|payout| payout.payout).sum(),
        payouts,
    }))
}


#[cfg(test)]
mod payout_endpoint_tests {
    use serde_json::Value;
    use time::{Duration, OffsetDateTime};

    use crate::{
        delivery::{DeliveryStatus, NewDelivery, create_delivery, update_delivery_status},
        endpoints,
        order::{NewOrderLine, OrderKind, create_order},
        test_utils::get_test_server,
    };

    #[tokio::test]
    async fn driver_payouts_use_the_requested_flat_rate() {
        let (server, state) = get_test_server();
        let now = OffsetDateTime::now_utc();
        {
            let conn = state.db_connection.lock().unwrap();
            for _ in 0..3 {
                let delivery = create_delivery(
                    NewDelivery {
                        order_ref: None,
                        driver: Some("Kamau".to_owned()),
                        fee: 250.0,
                        created_at: now - Duration::hours(2),
                    },
                    &conn,
                )
                .unwrap();
                update_delivery_status(delivery.id, DeliveryStatus::Delivered, now, &conn)
                    .unwrap();
            }
        }

        let response = server
            .get(endpoints::DRIVER_PAYOUTS)
            .add_query_param("rateType", "flat")
            .add_query_param("rateValue", "500")
            .add_query_param("range", "month")
            .await;

        response.assert_status_ok();
        let body = response.json::<Value>();
        assert_eq!(body["payouts"][0]["driver"], "Kamau");
        assert_eq!(body["payouts"][0]["completedDeliveries"], 3);
        assert_eq!(body["total"], 1500.0);
    }

    #[tokio::test]
    async fn empty_rate_parameters_use_the_configured_rate() {
        let (server, state) = get_test_server();
        let now = OffsetDateTime::now_utc();
        {
            let conn = state.db_connection.lock().unwrap();
            let delivery = create_delivery(
                NewDelivery {
                    order_ref: None,
                    driver: Some("Mutua".to_owned()),
                    fee: 250.0,
                    created_at: now - Duration::hours(2),
                },
                &conn,
            )
            .unwrap();
            update_delivery_status(delivery.id, DeliveryStatus::Delivered, now, &conn).unwrap();
        }

        let response = server
            .get(endpoints::DRIVER_PAYOUTS)
            .add_query_param("rateType", "")
            .add_query_param("rateValue", "")
            .await;

        response.assert_status_ok();
        let body = response.json::<Value>();
        assert_eq!(body["rateType"], "flat");
        assert_eq!(body["total"], 300.0);
    }

    #[tokio::test]
    async fn farmer_payouts_use_the_configured_commission() {
        let (server, state) = get_test_server();
        {
            let conn = state.db_connection.lock().unwrap();
            create_order(
                "ORD-9",
                vec![NewOrderLine {
                    farmer: "Achieng".to_owned(),
                    kind: OrderKind::Inventory,
                    item: "Avocado crate".to_owned(),
                    quantity: 2,
                    unit_price: 1000.0,
                }],
                OffsetDateTime::now_utc(),
                &conn,
            )
            .unwrap();
        }

        let response = server.get(endpoints::FARMER_PAYOUTS).await;

        response.assert_status_ok();
        let body = response.json::<Value>();
        assert_eq!(body["commissionPercent"], 10.0);
        assert_eq!(body["payouts"][0]["payout"], 1800.0);
        assert_eq!(body["total"], 1800.0);
    }
}
