use serde::{Deserialize, Serialize};

use super::repo_types::{Order, OrderItem, OrderItemView, OrderStatus};

/// Order as shown in the customer's cabinet.
#[derive(Debug, Serialize)]
pub struct MyOrder {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItemView>,
}

#[derive(Debug, Serialize)]
pub struct PlacedOrder {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
}

#[derive(Debug, Deserialize)]
pub struct StatusUpdateRequest {
    pub status: OrderStatus,
    #[serde(default)]
    pub expected_status: Option<OrderStatus>,
}
