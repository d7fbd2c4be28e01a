use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{
    repo_types::{CartLine, CartRow},
    services::cart_total,
};

#[derive(Debug, Deserialize)]
pub struct AddToCartRequest {
    pub product_id: Uuid,
    #[serde(default = "default_quantity")]
    pub quantity: i32,
}

fn default_quantity() -> i32 {
    1
}

#[derive(Debug, Deserialize)]
pub struct UpdateQuantityRequest {
    pub quantity: i32,
}

#[derive(Debug, Serialize)]
pub struct CartProduct {
    pub name: String,
    pub price: Decimal,
    pub images: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct CartItem {
    pub id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    pub total_price: Decimal,
    pub product: CartProduct,
}

#[derive(Debug, Serialize)]
pub struct CartView {
    pub items: Vec<CartItem>,
    pub total: Decimal,
}

impl From<Vec<CartLine>> for CartView {
    fn from(lines: Vec<CartLine>) -> Self {
        let total = cart_total(&lines);
        let items = lines
            .into_iter()
            .map(|l| CartItem {
                id: l.id,
                product_id: l.product_id,
                quantity: l.quantity,
                total_price: l.total_price,
                product: CartProduct {
                    name: l.product_name,
                    price: l.product_price,
                    images: l.product_images,
                },
            })
            .collect();
        Self { items, total }
    }
}

#[derive(Debug, Serialize)]
pub struct CartRowResponse {
    pub id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    pub total_price: Decimal,
}

impl From<CartRow> for CartRowResponse {
    fn from(r: CartRow) -> Self {
        Self {
            id: r.id,
            product_id: r.product_id,
            quantity: r.quantity,
            total_price: r.total_price,
        }
    }
}
