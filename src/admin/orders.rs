use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, patch},
    Json, Router,
};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    auth::extractors::AdminUser,
    error::{AppError, AppResult},
    orders::{
        board::OrderBoard,
        dto::{MyOrder, StatusUpdateRequest},
        repo_types::Order,
        services::{move_order, orders_with_items},
    },
    state::AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/orders", get(list))
        .route("/orders/board", get(board))
        .route("/orders/:id", delete(remove))
        .route("/orders/:id/status", patch(set_status))
}

/// All orders newest first, with their items.
#[instrument(skip(state))]
async fn list(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
) -> AppResult<Json<Vec<MyOrder>>> {
    let orders = Order::list_all(&state.db).await?;
    Ok(Json(orders_with_items(&state.db, orders).await?))
}

#[instrument(skip(state))]
async fn board(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
) -> AppResult<Json<OrderBoard>> {
    let orders = Order::list_all(&state.db).await?;
    Ok(Json(OrderBoard::from_orders(orders)))
}

#[instrument(skip(state))]
async fn set_status(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Path(id): Path<Uuid>,
    Json(body): Json<StatusUpdateRequest>,
) -> AppResult<Json<Order>> {
    Ok(Json(move_order(&state.db, id, body.status, body.expected_status).await?))
}

#[instrument(skip(state))]
async fn remove(
    State(state): State<AppState>,
    AdminUser(admin_id): AdminUser,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    if !Order::delete(&state.db, id).await? {
        return Err(AppError::NotFound);
    }
    info!(%admin_id, order_id = %id, "order deleted");
    Ok(StatusCode::NO_CONTENT)
}
