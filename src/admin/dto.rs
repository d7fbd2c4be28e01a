use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};
use uuid::Uuid;

use crate::{
    auth::repo_types::Role,
    catalog::repo_types::{NewProduct, ProductChanges},
    error::{AppError, AppResult},
};

pub const MAX_CATEGORY_NAME_LEN: usize = 50;
pub const MAX_PRODUCT_NAME_LEN: usize = 200;

/// Absent stays `None`, explicit `null` becomes `Some(None)`.
fn nullable<'de, D, T>(de: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(de).map(Some)
}

pub fn category_name(name: &str) -> AppResult<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::bad_request("Category name is required"));
    }
    if name.chars().count() > MAX_CATEGORY_NAME_LEN {
        return Err(AppError::bad_request("Category name is too long"));
    }
    Ok(name.to_string())
}

fn product_name(name: &str) -> AppResult<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::bad_request("Product name is required"));
    }
    if name.chars().count() > MAX_PRODUCT_NAME_LEN {
        return Err(AppError::bad_request("Product name is too long"));
    }
    Ok(name.to_string())
}

/// Largest price the `NUMERIC(12, 2)` column holds.
pub const MAX_PRICE: Decimal = Decimal::from_parts(3_567_587_327, 232, 0, false, 2);

fn product_price(price: Decimal) -> AppResult<Decimal> {
    if price.is_sign_negative() && !price.is_zero() {
        return Err(AppError::bad_request("Price must not be negative"));
    }
    let price = price.round_dp(2);
    if price > MAX_PRICE {
        return Err(AppError::bad_request("Price is too large"));
    }
    Ok(price)
}

#[derive(Debug, Deserialize)]
pub struct CreateCategoryRequest {
    pub name: String,
    #[serde(default)]
    pub active: bool,
}

#[derive(Debug, Deserialize)]
pub struct UpdateCategoryRequest {
    pub name: Option<String>,
    pub active: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct CreateProductRequest {
    pub category_id: Option<Uuid>,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: Decimal,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl CreateProductRequest {
    pub fn validate(self) -> AppResult<NewProduct> {
        Ok(NewProduct {
            category_id: self.category_id,
            name: product_name(&self.name)?,
            description: self.description.trim().to_string(),
            price: product_price(self.price)?,
            images: self.images,
            active: self.active,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateProductRequest {
    #[serde(default, deserialize_with = "nullable")]
    pub category_id: Option<Option<Uuid>>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub images: Option<Vec<String>>,
    pub active: Option<bool>,
}

impl UpdateProductRequest {
    pub fn validate(self) -> AppResult<ProductChanges> {
        Ok(ProductChanges {
            category_id: self.category_id,
            name: self.name.as_deref().map(product_name).transpose()?,
            description: self.description.map(|d| d.trim().to_string()),
            price: self.price.map(product_price).transpose()?,
            images: self.images,
            active: self.active,
        })
    }
}

/// Raw images posted as JSON byte arrays.
#[derive(Debug, Deserialize)]
pub struct ImageBytesRequest {
    pub images: Vec<serde_bytes::ByteBuf>,
    /// Parallel to `images`; missing entries are treated as unknown.
    #[serde(default)]
    pub content_types: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct UserSearch {
    pub search: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    pub username: Option<String>,
    pub role: Option<Role>,
}
