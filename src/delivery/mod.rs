//! Deliveries: the records driver payouts and delivery fee income are derived from.

mod core;
mod endpoints;

pub use self::core::{
    Delivery, DeliveryQuery, DeliveryStatus, NewDelivery, create_delivery, create_delivery_table,
    query_deliveries, update_delivery_status,
};
pub use endpoints::{
    assign_delivery_endpoint, cancel_delivery_endpoint, create_delivery_endpoint,
    get_deliveries_endpoint, update_delivery_status_endpoint,
};
