use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, patch},
    Json, Router,
};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::dto::{UpdateUserRequest, UserSearch};
use crate::{
    auth::{extractors::AdminUser, handlers::validate_username, repo_types::User},
    error::{AppError, AppResult},
    state::AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list))
        .route("/users/:id", patch(update).delete(remove))
}

#[instrument(skip(state))]
async fn list(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Query(q): Query<UserSearch>,
) -> AppResult<Json<Vec<User>>> {
    let search = q.search.as_deref().map(str::trim).filter(|s| !s.is_empty());
    Ok(Json(User::list(&state.db, search).await?))
}

#[instrument(skip(state))]
async fn update(
    State(state): State<AppState>,
    AdminUser(admin_id): AdminUser,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateUserRequest>,
) -> AppResult<Json<User>> {
    let username = body.username.as_deref().map(validate_username).transpose()?;
    let user = User::admin_update(&state.db, id, username, body.role)
        .await?
        .ok_or(AppError::NotFound)?;
    info!(%admin_id, user_id = %id, role = ?user.role, "user updated");
    Ok(Json(user))
}

#[instrument(skip(state))]
async fn remove(
    State(state): State<AppState>,
    AdminUser(admin_id): AdminUser,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    if id == admin_id {
        warn!(%admin_id, "admin tried to delete own account");
        return Err(AppError::bad_request("You can not delete yourself"));
    }
    if !User::delete(&state.db, id).await? {
        return Err(AppError::NotFound);
    }
    info!(%admin_id, user_id = %id, "user deleted");
    Ok(StatusCode::NO_CONTENT)
}
