use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use tracing::{debug, instrument};
use uuid::Uuid;

use super::{
    filter::ProductFilter,
    repo_types::{Category, Product},
};
use crate::{
    error::{AppError, AppResult},
    state::AppState,
};

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/categories", get(list_categories))
        .route("/products", get(list_products))
        .route("/products/:id", get(get_product))
}

#[derive(Debug, Deserialize)]
pub struct CategoryQuery {
    #[serde(default)]
    pub only_active: bool,
}

#[instrument(skip(state))]
pub async fn list_categories(
    State(state): State<AppState>,
    Query(q): Query<CategoryQuery>,
) -> AppResult<Json<Vec<Category>>> {
    Ok(Json(Category::list(&state.db, q.only_active).await?))
}

#[instrument(skip(state))]
pub async fn list_products(
    State(state): State<AppState>,
    Query(filter): Query<ProductFilter>,
) -> AppResult<Json<Vec<Product>>> {
    let all = Product::list(&state.db).await?;
    let total = all.len();
    let visible = filter.apply(all);
    debug!(total, visible = visible.len(), "products filtered");
    Ok(Json(visible))
}

#[instrument(skip(state))]
pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Product>> {
    Product::find(&state.db, id)
        .await?
        .map(Json)
        .ok_or(AppError::NotFound)
}
