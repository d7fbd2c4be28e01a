//! Turning a locked cart plus shipping details into the rows of one order.

use serde::Deserialize;
use thiserror::Error;
use uuid::Uuid;

use super::repo_types::{NewOrder, NewOrderItem};
use crate::{auth::services::is_valid_email, cart::repo_types::CartLine, cart::services::line_total};
use crate::error::AppError;

const MAX_FIELD_LEN: usize = 200;
const MAX_NOTES_LEN: usize = 2000;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CheckoutError {
    #[error("cart is empty")]
    EmptyCart,
    #[error("{0} is required")]
    MissingField(&'static str),
    #[error("{0} is too long")]
    FieldTooLong(&'static str),
    #[error("invalid email")]
    InvalidEmail,
}

impl From<CheckoutError> for AppError {
    fn from(e: CheckoutError) -> Self {
        AppError::bad_request(e.to_string())
    }
}

/// Shipping form as posted by the client.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutRequest {
    pub first_name: String,
    pub email: String,
    pub address: String,
    pub phone: String,
    #[serde(default)]
    pub notes: String,
}

/// Shipping details that passed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct Shipping {
    pub first_name: String,
    pub email: String,
    pub address: String,
    pub phone: String,
    pub notes: String,
}

fn required(value: &str, field: &'static str) -> Result<String, CheckoutError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(CheckoutError::MissingField(field));
    }
    if value.chars().count() > MAX_FIELD_LEN {
        return Err(CheckoutError::FieldTooLong(field));
    }
    Ok(value.to_string())
}

impl CheckoutRequest {
    pub fn validate(&self) -> Result<Shipping, CheckoutError> {
        let first_name = required(&self.first_name, "first_name")?;
        let email = self.email.trim().to_lowercase();
        if !is_valid_email(&email) {
            return Err(CheckoutError::InvalidEmail);
        }
        let address = required(&self.address, "address")?;
        let phone = required(&self.phone, "phone")?;
        let notes = self.notes.trim().to_string();
        if notes.chars().count() > MAX_NOTES_LEN {
            return Err(CheckoutError::FieldTooLong("notes"));
        }
        Ok(Shipping {
            first_name,
            email,
            address,
            phone,
            notes,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CheckoutPlan {
    pub order: NewOrder,
    pub items: Vec<NewOrderItem>,
}

/// One item per cart line, priced at the product's current price.
pub fn plan_checkout(
    user_id: Uuid,
    shipping: Shipping,
    lines: &[CartLine],
) -> Result<CheckoutPlan, CheckoutError> {
    if lines.is_empty() {
        return Err(CheckoutError::EmptyCart);
    }

    let items: Vec<NewOrderItem> = lines
        .iter()
        .map(|l| NewOrderItem {
            product_id: l.product_id,
            quantity: l.quantity,
            price: l.product_price,
            total_price: line_total(l.product_price, l.quantity),
        })
        .collect();
    let total_price = items.iter().map(|i| i.total_price).sum();

    Ok(CheckoutPlan {
        order: NewOrder {
            user_id,
            first_name: shipping.first_name,
            email: shipping.email,
            address: shipping.address,
            phone: shipping.phone,
            notes: shipping.notes,
            total_price,
        },
        items,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn form() -> CheckoutRequest {
        CheckoutRequest {
            first_name: " Aziz ".into(),
            email: "Aziz@Mail.uz".into(),
            address: "Chilonzor 9, Tashkent".into(),
            phone: "+998 90 123 45 67".into(),
            notes: String::new(),
        }
    }

    fn line(price: &str, quantity: i32, stale_total: &str) -> CartLine {
        CartLine {
            id: Uuid::new_v4(),
            product_id: Uuid::new_v4(),
            quantity,
            total_price: dec(stale_total),
            product_name: "p".into(),
            product_price: dec(price),
            product_images: vec![],
        }
    }

    #[test]
    fn valid_form_is_trimmed_and_normalized() {
        let s = form().validate().unwrap();
        assert_eq!(s.first_name, "Aziz");
        assert_eq!(s.email, "aziz@mail.uz");
        assert_eq!(s.notes, "");
    }

    #[test]
    fn blank_fields_are_rejected() {
        let mut f = form();
        f.address = "   ".into();
        assert_eq!(f.validate(), Err(CheckoutError::MissingField("address")));

        let mut f = form();
        f.phone = String::new();
        assert_eq!(f.validate(), Err(CheckoutError::MissingField("phone")));

        let mut f = form();
        f.email = "not-an-email".into();
        assert_eq!(f.validate(), Err(CheckoutError::InvalidEmail));
    }

    #[test]
    fn overlong_fields_are_rejected() {
        let mut f = form();
        f.first_name = "x".repeat(MAX_FIELD_LEN + 1);
        assert_eq!(f.validate(), Err(CheckoutError::FieldTooLong("first_name")));
    }

    #[test]
    fn empty_cart_produces_no_plan() {
        let shipping = form().validate().unwrap();
        assert_eq!(
            plan_checkout(Uuid::new_v4(), shipping, &[]),
            Err(CheckoutError::EmptyCart)
        );
    }

    #[test]
    fn one_item_per_cart_line_with_consistent_totals() {
        let user_id = Uuid::new_v4();
        let lines = vec![line("12.50", 2, "25.00"), line("3.20", 3, "9.60"), line("100", 1, "100")];
        let plan = plan_checkout(user_id, form().validate().unwrap(), &lines).unwrap();

        assert_eq!(plan.items.len(), lines.len());
        for (item, l) in plan.items.iter().zip(&lines) {
            assert_eq!(item.product_id, l.product_id);
            assert_eq!(item.quantity, l.quantity);
            assert_eq!(item.price, l.product_price);
            assert_eq!(item.total_price, l.product_price * Decimal::from(l.quantity));
        }
        assert_eq!(plan.order.total_price, dec("134.60"));
        assert_eq!(plan.order.user_id, user_id);
        assert_eq!(plan.order.first_name, "Aziz");
    }

    #[test]
    fn stale_cart_totals_are_repriced() {
        // Product price changed after the row was added.
        let lines = vec![line("15.00", 2, "20.00")];
        let plan = plan_checkout(Uuid::new_v4(), form().validate().unwrap(), &lines).unwrap();
        assert_eq!(plan.items[0].total_price, dec("30.00"));
        assert_eq!(plan.order.total_price, dec("30.00"));
    }

    #[test]
    fn checkout_error_maps_to_bad_request() {
        let err: AppError = CheckoutError::EmptyCart.into();
        assert!(matches!(err, AppError::BadRequest(ref m) if m == "cart is empty"));
    }
}
