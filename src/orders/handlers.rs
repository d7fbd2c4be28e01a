use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use tracing::{instrument, warn};
use uuid::Uuid;

use super::{
    checkout::CheckoutRequest,
    dto::{MyOrder, PlacedOrder},
    repo_types::Order,
    services::{delete_own_order, orders_with_items, place_order},
};
use crate::{
    auth::extractors::AuthUser,
    error::{AppError, AppResult},
    state::AppState,
};

pub fn customer_routes() -> Router<AppState> {
    Router::new()
        .route("/checkout", post(checkout))
        .route("/me/orders", get(my_orders))
        .route("/me/orders/:id", delete(delete_my_order))
}

#[instrument(skip(state, body))]
pub async fn checkout(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(body): Json<CheckoutRequest>,
) -> AppResult<(StatusCode, Json<PlacedOrder>)> {
    let shipping = body.validate().map_err(|e| {
        warn!(%user_id, error = %e, "checkout form rejected");
        AppError::from(e)
    })?;
    let (order, items) = place_order(&state.db, user_id, shipping).await?;
    Ok((StatusCode::CREATED, Json(PlacedOrder { order, items })))
}

#[instrument(skip(state))]
pub async fn my_orders(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> AppResult<Json<Vec<MyOrder>>> {
    let orders = Order::list_by_user(&state.db, user_id).await?;
    Ok(Json(orders_with_items(&state.db, orders).await?))
}

#[instrument(skip(state))]
pub async fn delete_my_order(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    delete_own_order(&state.db, user_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
