use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, patch, post},
    Json, Router,
};
use tracing::{info, instrument};
use uuid::Uuid;

use super::dto::{category_name, CreateCategoryRequest, UpdateCategoryRequest};
use crate::{
    auth::extractors::AdminUser,
    catalog::repo_types::Category,
    error::{AppError, AppResult},
    state::AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/categories", get(list).post(create))
        .route("/categories/:id", patch(update).delete(remove))
        .route("/categories/:id/toggle", post(toggle))
}

#[instrument(skip(state))]
async fn list(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
) -> AppResult<Json<Vec<Category>>> {
    Ok(Json(Category::list(&state.db, false).await?))
}

#[instrument(skip(state))]
async fn create(
    State(state): State<AppState>,
    AdminUser(admin_id): AdminUser,
    Json(body): Json<CreateCategoryRequest>,
) -> AppResult<(StatusCode, Json<Category>)> {
    let name = category_name(&body.name)?;
    let category = Category::create(&state.db, &name, body.active).await?;
    info!(%admin_id, category_id = %category.id, "category created");
    Ok((StatusCode::CREATED, Json(category)))
}

#[instrument(skip(state))]
async fn update(
    State(state): State<AppState>,
    AdminUser(admin_id): AdminUser,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateCategoryRequest>,
) -> AppResult<Json<Category>> {
    let name = body.name.as_deref().map(category_name).transpose()?;
    let category = Category::update(&state.db, id, name.as_deref(), body.active)
        .await?
        .ok_or(AppError::NotFound)?;
    info!(%admin_id, category_id = %id, "category updated");
    Ok(Json(category))
}

#[instrument(skip(state))]
async fn toggle(
    State(state): State<AppState>,
    AdminUser(admin_id): AdminUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Category>> {
    let category = Category::toggle_active(&state.db, id)
        .await?
        .ok_or(AppError::NotFound)?;
    info!(%admin_id, category_id = %id, active = category.active, "category toggled");
    Ok(Json(category))
}

#[instrument(skip(state))]
async fn remove(
    State(state): State<AppState>,
    AdminUser(admin_id): AdminUser,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    if !Category::delete(&state.db, id).await? {
        return Err(AppError::NotFound);
    }
    info!(%admin_id, category_id = %id, "category deleted");
    Ok(StatusCode::NO_CONTENT)
}
