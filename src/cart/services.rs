use rust_decimal::Decimal;

use super::repo_types::CartLine;

pub fn line_total(unit_price: Decimal, quantity: i32) -> Decimal {
    unit_price * Decimal::from(quantity)
}

pub fn cart_total(lines: &[CartLine]) -> Decimal {
    lines.iter().map(|l| l.total_price).sum()
}
