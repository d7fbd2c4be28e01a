use serde::Serialize;

use super::repo_types::{Order, OrderStatus};

/// Orders partitioned into the three status columns of the admin board.
#[derive(Debug, Default, Serialize)]
pub struct OrderBoard {
    pub pending: Vec<Order>,
    pub in_progress: Vec<Order>,
    pub completed: Vec<Order>,
}

impl OrderBoard {
    /// Keeps the relative order of `orders` within each column.
    pub fn from_orders(orders: impl IntoIterator<Item = Order>) -> Self {
        let mut board = Self::default();
        for order in orders {
            board.column_mut(order.status).push(order);
        }
        board
    }

    fn column_mut(&mut self, status: OrderStatus) -> &mut Vec<Order> {
        match status {
            OrderStatus::Pending => &mut self.pending,
            OrderStatus::InProgress => &mut self.in_progress,
            OrderStatus::Completed => &mut self.completed,
        }
    }
}
