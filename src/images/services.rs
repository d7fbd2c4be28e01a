use anyhow::Context;
use bytes::Bytes;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    catalog::repo_types::Product,
    error::{AppError, AppResult},
    state::AppState,
    storage::StorageClient,
};

pub const MAX_IMAGES_PER_UPLOAD: usize = 10;

pub struct UploadItem {
    pub body: Bytes,
    pub content_type: String,
}

/// Stores every image and appends the public URLs to the product, in upload order.
/// Objects stored by a failed attempt are removed again.
pub async fn upload_product_images(
    st: &AppState,
    product_id: Uuid,
    images: Vec<UploadItem>,
) -> AppResult<Product> {
    if images.is_empty() {
        return Err(AppError::bad_request("no images provided"));
    }
    if images.len() > MAX_IMAGES_PER_UPLOAD {
        return Err(AppError::bad_request("too many images"));
    }
    if Product::find(&st.db, product_id).await?.is_none() {
        return Err(AppError::NotFound);
    }

    let keys = put_all(st.storage.as_ref(), product_id, images).await?;
    match link_images(st, product_id, &keys).await {
        Ok(product) => {
            info!(%product_id, added = keys.len(), total = product.images.len(), "product images uploaded");
            Ok(product)
        }
        Err(e) => {
            discard_objects(st.storage.as_ref(), &keys).await;
            Err(e)
        }
    }
}

/// Uploads in order; on the first failure the objects already stored are deleted.
async fn put_all(
    storage: &dyn StorageClient,
    product_id: Uuid,
    images: Vec<UploadItem>,
) -> anyhow::Result<Vec<String>> {
    let mut keys = Vec::with_capacity(images.len());
    for img in images {
        let key = object_key(product_id, Uuid::new_v4(), &img.content_type);
        let stored = storage
            .put_object(&key, img.body, &img.content_type)
            .await
            .with_context(|| format!("put_object {}", key));
        if let Err(e) = stored {
            discard_objects(storage, &keys).await;
            return Err(e);
        }
        keys.push(key);
    }
    Ok(keys)
}

async fn link_images(st: &AppState, product_id: Uuid, keys: &[String]) -> AppResult<Product> {
    let mut tx = st.db.begin().await.context("begin tx")?;
    // may have been deleted while we were uploading
    let product = Product::find_for_update_tx(&mut tx, product_id)
        .await?
        .ok_or(AppError::NotFound)?;
    let mut urls = product.images;
    urls.extend(keys.iter().map(|k| st.storage.object_url(k)));
    let product = Product::set_images_tx(&mut tx, product_id, &urls).await?;
    tx.commit().await.context("commit tx")?;
    Ok(product)
}

/// Drops the image at `index`; the stored object goes too when it is ours.
pub async fn remove_product_image(
    st: &AppState,
    product_id: Uuid,
    index: usize,
) -> AppResult<Product> {
    let mut tx = st.db.begin().await.context("begin tx")?;
    let product = Product::find_for_update_tx(&mut tx, product_id)
        .await?
        .ok_or(AppError::NotFound)?;
    if index >= product.images.len() {
        return Err(AppError::NotFound);
    }
    let mut urls = product.images;
    let removed = urls.remove(index);
    let product = Product::set_images_tx(&mut tx, product_id, &urls).await?;
    tx.commit().await.context("commit tx")?;

    if let Some(key) = st.storage.key_for_url(&removed) {
        discard_objects(st.storage.as_ref(), &[key.to_string()]).await;
    }
    info!(%product_id, index, "product image removed");
    Ok(product)
}

async fn discard_objects(storage: &dyn StorageClient, keys: &[String]) {
    for key in keys {
        if let Err(e) = storage.delete_object(key).await {
            warn!(%key, error = ?e, "orphaned object left in storage");
        }
    }
}

pub fn object_key(product_id: Uuid, image_id: Uuid, content_type: &str) -> String {
    let ext = ext_from_mime(content_type).unwrap_or("bin");
    format!("products/{}/{}.{}", product_id, image_id, ext)
}

fn ext_from_mime(ct: &str) -> Option<&'static str> {
    match ct {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        "image/gif" => Some("gif"),
        "image/heic" => Some("heic"),
        "image/svg+xml" => Some("svg"),
        _ => None,
    }
}
