use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::StatusCode,
    routing::{delete, get, patch, post},
    Json, Router,
};
use bytes::Bytes;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::dto::{CreateProductRequest, ImageBytesRequest, UpdateProductRequest};
use crate::{
    auth::extractors::AdminUser,
    catalog::repo_types::Product,
    error::{AppError, AppResult},
    images::services::{remove_product_image, upload_product_images, UploadItem},
    state::AppState,
};

const UNKNOWN_CONTENT_TYPE: &str = "application/octet-stream";

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/products", get(list).post(create))
        .route("/products/:id", patch(update).delete(remove))
        .route("/products/:id/images", post(upload_multipart))
        .route("/products/:id/images/bytes", post(upload_bytes))
        .route("/products/:id/images/:index", delete(remove_image))
        .layer(DefaultBodyLimit::max(20 * 1024 * 1024)) // 20MB
}

#[instrument(skip(state))]
async fn list(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
) -> AppResult<Json<Vec<Product>>> {
    Ok(Json(Product::list(&state.db).await?))
}

#[instrument(skip(state, body))]
async fn create(
    State(state): State<AppState>,
    AdminUser(admin_id): AdminUser,
    Json(body): Json<CreateProductRequest>,
) -> AppResult<(StatusCode, Json<Product>)> {
    let new = body.validate()?;
    let product = Product::create(&state.db, &new).await?;
    info!(%admin_id, product_id = %product.id, "product created");
    Ok((StatusCode::CREATED, Json(product)))
}

#[instrument(skip(state, body))]
async fn update(
    State(state): State<AppState>,
    AdminUser(admin_id): AdminUser,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateProductRequest>,
) -> AppResult<Json<Product>> {
    let changes = body.validate()?;
    let product = Product::update(&state.db, id, &changes)
        .await?
        .ok_or(AppError::NotFound)?;
    info!(%admin_id, product_id = %id, "product updated");
    Ok(Json(product))
}

#[instrument(skip(state))]
async fn remove(
    State(state): State<AppState>,
    AdminUser(admin_id): AdminUser,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    if !Product::delete(&state.db, id).await? {
        return Err(AppError::NotFound);
    }
    info!(%admin_id, product_id = %id, "product deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Multipart upload; every `files` / `files[]` part is one image.
#[instrument(skip(state, mp))]
async fn upload_multipart(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Path(id): Path<Uuid>,
    mut mp: Multipart,
) -> AppResult<Json<Product>> {
    let mut files = Vec::new();
    while let Some(field) = mp.next_field().await.map_err(|e| {
        warn!(error = %e, "malformed multipart body");
        AppError::bad_request("malformed multipart body")
    })? {
        if !matches!(field.name(), Some("files") | Some("files[]")) {
            continue;
        }
        let content_type = field
            .content_type()
            .unwrap_or(UNKNOWN_CONTENT_TYPE)
            .to_string();
        let body = field
            .bytes()
            .await
            .map_err(|_| AppError::bad_request("malformed multipart body"))?;
        files.push(UploadItem { body, content_type });
    }
    if files.is_empty() {
        return Err(AppError::bad_request("files[] is required"));
    }
    Ok(Json(upload_product_images(&state, id, files).await?))
}

#[instrument(skip(state, body))]
async fn upload_bytes(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Path(id): Path<Uuid>,
    Json(body): Json<ImageBytesRequest>,
) -> AppResult<Json<Product>> {
    Ok(Json(upload_product_images(&state, id, upload_items(body)).await?))
}

#[instrument(skip(state))]
async fn remove_image(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Path((id, index)): Path<(Uuid, usize)>,
) -> AppResult<Json<Product>> {
    Ok(Json(remove_product_image(&state, id, index).await?))
}

fn upload_items(body: ImageBytesRequest) -> Vec<UploadItem> {
    let mut types = body.content_types.into_iter();
    body.images
        .into_iter()
        .map(|buf| UploadItem {
            body: Bytes::from(buf.into_vec()),
            content_type: types
                .next()
                .unwrap_or_else(|| UNKNOWN_CONTENT_TYPE.to_string()),
        })
        .collect()
}
