use anyhow::Context;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::repo_types::{CartLine, CartRow};

// Line totals always follow the current product price.
const LINE_SELECT: &str = r#"
    SELECT c.id, c.product_id, c.quantity, p.price * c.quantity AS total_price,
           p.name AS product_name, p.price AS product_price, p.images AS product_images
      FROM cart c
      JOIN product p ON p.id = c.product_id
     WHERE c.user_id = $1
"#;

impl CartLine {
    pub async fn list_by_user(db: &PgPool, user_id: Uuid) -> anyhow::Result<Vec<CartLine>> {
        let rows = sqlx::query_as::<_, CartLine>(&format!(
            "{LINE_SELECT} ORDER BY c.created_at ASC, c.id ASC"
        ))
        .bind(user_id)
        .fetch_all(db)
        .await
        .context("list cart")?;
        Ok(rows)
    }

    /// Locks the user's cart rows until the transaction ends.
    pub async fn lock_by_user_tx(
        tx: &mut Transaction<'_, Postgres>,
        user_id: Uuid,
    ) -> anyhow::Result<Vec<CartLine>> {
        let rows = sqlx::query_as::<_, CartLine>(&format!(
            "{LINE_SELECT} ORDER BY c.created_at ASC, c.id ASC FOR UPDATE OF c"
        ))
        .bind(user_id)
        .fetch_all(&mut **tx)
        .await
        .context("lock cart")?;
        Ok(rows)
    }
}

impl CartRow {
    /// Adds `quantity` units, merging into an existing row for the same product.
    /// `None` when the product does not exist or the merged quantity would
    /// exceed `max_quantity`.
    pub async fn add(
        db: &PgPool,
        user_id: Uuid,
        product_id: Uuid,
        quantity: i32,
        max_quantity: i32,
    ) -> anyhow::Result<Option<CartRow>> {
        let row = sqlx::query_as::<_, CartRow>(
            r#"
            INSERT INTO cart (user_id, product_id, quantity, total_price)
            SELECT $1, p.id, $3, p.price * $3
              FROM product p
             WHERE p.id = $2
            ON CONFLICT (user_id, product_id) DO UPDATE
               SET quantity = cart.quantity + EXCLUDED.quantity,
                   total_price = (SELECT price FROM product WHERE id = EXCLUDED.product_id)
                                 * (cart.quantity + EXCLUDED.quantity)
             WHERE cart.quantity + EXCLUDED.quantity <= $4
            RETURNING id, user_id, product_id, quantity, total_price
            "#,
        )
        .bind(user_id)
        .bind(product_id)
        .bind(quantity)
        .bind(max_quantity)
        .fetch_optional(db)
        .await
        .context("add to cart")?;
        Ok(row)
    }

    pub async fn set_quantity(
        db: &PgPool,
        user_id: Uuid,
        id: Uuid,
        quantity: i32,
    ) -> anyhow::Result<Option<CartRow>> {
        let row = sqlx::query_as::<_, CartRow>(
            r#"
            UPDATE cart c
               SET quantity = $3,
                   total_price = p.price * $3
              FROM product p
             WHERE c.id = $1 AND c.user_id = $2 AND p.id = c.product_id
            RETURNING c.id, c.user_id, c.product_id, c.quantity, c.total_price
            "#,
        )
        .bind(id)
        .bind(user_id)
        .bind(quantity)
        .fetch_optional(db)
        .await
        .context("update cart quantity")?;
        Ok(row)
    }

    pub async fn remove(db: &PgPool, user_id: Uuid, id: Uuid) -> anyhow::Result<bool> {
        let res = sqlx::query("DELETE FROM cart WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(db)
            .await
            .context("remove cart row")?;
        Ok(res.rows_affected() > 0)
    }

    /// Deletes the given rows of the user's cart; rows added meanwhile stay.
    pub async fn remove_many_tx(
        tx: &mut Transaction<'_, Postgres>,
        user_id: Uuid,
        ids: &[Uuid],
    ) -> anyhow::Result<u64> {
        let res = sqlx::query("DELETE FROM cart WHERE user_id = $1 AND id = ANY($2)")
            .bind(user_id)
            .bind(ids)
            .execute(&mut **tx)
            .await
            .context("clear checked out cart rows")?;
        Ok(res.rows_affected())
    }
}
