//! Storefront product filtering.
//!
//! Every predicate that is set must hold; unset predicates match anything.

use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;

use super::repo_types::Product;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductFilter {
    pub category_id: Option<Uuid>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    /// Case-insensitive substring of the product name.
    pub q: Option<String>,
    #[serde(default)]
    pub only_active: bool,
}

impl ProductFilter {
    pub fn matches(&self, p: &Product) -> bool {
        self.category_id.map_or(true, |c| p.category_id == Some(c))
            && self.min_price.map_or(true, |min| p.price >= min)
            && self.max_price.map_or(true, |max| p.price <= max)
            && self.name_matches(&p.name)
            && (!self.only_active || p.active)
    }

    fn name_matches(&self, name: &str) -> bool {
        match self.q.as_deref().map(str::trim) {
            None | Some("") => true,
            Some(q) => name.to_lowercase().contains(&q.to_lowercase()),
        }
    }

    pub fn apply(&self, products: Vec<Product>) -> Vec<Product> {
        products.into_iter().filter(|p| self.matches(p)).collect()
    }
}
