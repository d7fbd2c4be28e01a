use anyhow::Context;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::repo_types::{Category, NewProduct, Product, ProductChanges};

const PRODUCT_COLUMNS: &str =
    "id, category_id, name, description, price, images, active, created_at";

impl Category {
    pub async fn list(db: &PgPool, only_active: bool) -> anyhow::Result<Vec<Category>> {
        let rows = sqlx::query_as::<_, Category>(
            r#"
            SELECT id, name, active, created_at
              FROM category
             WHERE active OR NOT $1
             ORDER BY name ASC, id ASC
            "#,
        )
        .bind(only_active)
        .fetch_all(db)
        .await
        .context("list categories")?;
        Ok(rows)
    }

    pub async fn create(db: &PgPool, name: &str, active: bool) -> anyhow::Result<Category> {
        let row = sqlx::query_as::<_, Category>(
            r#"
            INSERT INTO category (name, active)
            VALUES ($1, $2)
            RETURNING id, name, active, created_at
            "#,
        )
        .bind(name)
        .bind(active)
        .fetch_one(db)
        .await
        .context("insert category")?;
        Ok(row)
    }

    pub async fn update(
        db: &PgPool,
        id: Uuid,
        name: Option<&str>,
        active: Option<bool>,
    ) -> anyhow::Result<Option<Category>> {
        let row = sqlx::query_as::<_, Category>(
            r#"
            UPDATE category
               SET name = COALESCE($2, name),
                   active = COALESCE($3, active)
             WHERE id = $1
            RETURNING id, name, active, created_at
            "#,
        )
        .bind(id)
        .bind(name)
        .bind(active)
        .fetch_optional(db)
        .await
        .context("update category")?;
        Ok(row)
    }

    /// Flips `active` in the database, so concurrent toggles never lose a flip.
    pub async fn toggle_active(db: &PgPool, id: Uuid) -> anyhow::Result<Option<Category>> {
        let row = sqlx::query_as::<_, Category>(
            r#"
            UPDATE category
               SET active = NOT active
             WHERE id = $1
            RETURNING id, name, active, created_at
            "#,
        )
        .bind(id)
        .fetch_optional(db)
        .await
        .context("toggle category")?;
        Ok(row)
    }

    pub async fn delete(db: &PgPool, id: Uuid) -> anyhow::Result<bool> {
        let res = sqlx::query("DELETE FROM category WHERE id = $1")
            .bind(id)
            .execute(db)
            .await
            .context("delete category")?;
        Ok(res.rows_affected() > 0)
    }
}

impl Product {
    pub async fn list(db: &PgPool) -> anyhow::Result<Vec<Product>> {
        let rows = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM product ORDER BY created_at ASC, id ASC"
        ))
        .fetch_all(db)
        .await
        .context("list products")?;
        Ok(rows)
    }

    pub async fn find(db: &PgPool, id: Uuid) -> anyhow::Result<Option<Product>> {
        let row = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM product WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(db)
        .await
        .context("find product")?;
        Ok(row)
    }

    /// Row-locked read used when the image list is rewritten.
    pub async fn find_for_update_tx(
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
    ) -> anyhow::Result<Option<Product>> {
        let row = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM product WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(&mut **tx)
        .await
        .context("lock product")?;
        Ok(row)
    }

    pub async fn create(db: &PgPool, new: &NewProduct) -> anyhow::Result<Product> {
        let row = sqlx::query_as::<_, Product>(&format!(
            r#"
            INSERT INTO product (category_id, name, description, price, images, active)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {PRODUCT_COLUMNS}
            "#
        ))
        .bind(new.category_id)
        .bind(&new.name)
        .bind(&new.description)
        .bind(new.price)
        .bind(&new.images)
        .bind(new.active)
        .fetch_one(db)
        .await
        .context("insert product")?;
        Ok(row)
    }

    pub async fn update(
        db: &PgPool,
        id: Uuid,
        changes: &ProductChanges,
    ) -> anyhow::Result<Option<Product>> {
        // $2 says whether category_id is being set at all, so it can be cleared with null.
        let row = sqlx::query_as::<_, Product>(&format!(
            r#"
            UPDATE product
               SET category_id = CASE WHEN $2 THEN $3 ELSE category_id END,
                   name = COALESCE($4, name),
                   description = COALESCE($5, description),
                   price = COALESCE($6, price),
                   images = COALESCE($7, images),
                   active = COALESCE($8, active)
             WHERE id = $1
            RETURNING {PRODUCT_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(changes.category_id.is_some())
        .bind(changes.category_id.flatten())
        .bind(changes.name.as_deref())
        .bind(changes.description.as_deref())
        .bind(changes.price)
        .bind(changes.images.as_deref())
        .bind(changes.active)
        .fetch_optional(db)
        .await
        .context("update product")?;
        Ok(row)
    }

    pub async fn set_images_tx(
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
        images: &[String],
    ) -> anyhow::Result<Product> {
        let row = sqlx::query_as::<_, Product>(&format!(
            "UPDATE product SET images = $2 WHERE id = $1 RETURNING {PRODUCT_COLUMNS}"
        ))
        .bind(id)
        .bind(images)
        .fetch_one(&mut **tx)
        .await
        .context("set product images")?;
        Ok(row)
    }

    pub async fn delete(db: &PgPool, id: Uuid) -> anyhow::Result<bool> {
        let res = sqlx::query("DELETE FROM product WHERE id = $1")
            .bind(id)
            .execute(db)
            .await
            .context("delete product")?;
        Ok(res.rows_affected() > 0)
    }
}
