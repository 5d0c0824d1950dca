//! Settings for the figures the finance back-office derives.

/// The default amount paid to a driver for each completed delivery.
pub const DEFAULT_DRIVER_RATE_PER_DELIVERY: f64 = 300.0;

/// The default percentage of each order line kept by the marketplace.
pub const DEFAULT_COMMISSION_PERCENT: f64 = 10.0;

/// Payout rates and the details printed on exported reports.
#[derive(Debug, Clone, PartialEq)]
pub struct FinanceConfig {
    /// The flat amount paid per completed delivery when no rate is given in the request.
    pub driver_rate_per_delivery: f64,
    /// The marketplace commission as a percentage of each order line total.
    pub commission_percent: f64,
    /// The name printed in the header of PDF reports.
    pub marketplace_name: String,
    /// Contact lines (address, phone, email) printed under the name on PDF reports.
    pub contact_lines: Vec<String>,
}

impl Default for FinanceConfig {
    fn default() -> Self {
        Self {
            driver_rate_per_delivery: DEFAULT_DRIVER_RATE_PER_DELIVERY,
            commission_percent: DEFAULT_COMMISSION_PERCENT,
            marketplace_name: "Agri Marketplace".to_owned(),
            contact_lines: Vec::new(),
        }
    }
}
