use anyhow::Context;
use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};
use uuid::Uuid;

use super::repo_types::{NewOrder, NewOrderItem, Order, OrderItem, OrderItemView, OrderStatus};

const ORDER_COLUMNS: &str =
    "id, user_id, first_name, email, address, phone, notes, total_price, status, created_at";

impl Order {
    pub async fn insert_tx(
        tx: &mut Transaction<'_, Postgres>,
        new: &NewOrder,
    ) -> anyhow::Result<Order> {
        let row = sqlx::query_as::<_, Order>(&format!(
            r#"
            INSERT INTO orders (user_id, first_name, email, address, phone, notes, total_price, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, 'pending')
            RETURNING {ORDER_COLUMNS}
            "#
        ))
        .bind(new.user_id)
        .bind(&new.first_name)
        .bind(&new.email)
        .bind(&new.address)
        .bind(&new.phone)
        .bind(&new.notes)
        .bind(new.total_price)
        .fetch_one(&mut **tx)
        .await
        .context("insert order")?;
        Ok(row)
    }

    pub async fn list_by_user(db: &PgPool, user_id: Uuid) -> anyhow::Result<Vec<Order>> {
        let rows = sqlx::query_as::<_, Order>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = $1 ORDER BY created_at DESC, id ASC"
        ))
        .bind(user_id)
        .fetch_all(db)
        .await
        .context("list orders by user")?;
        Ok(rows)
    }

    /// Every order, newest first.
    pub async fn list_all(db: &PgPool) -> anyhow::Result<Vec<Order>> {
        let rows = sqlx::query_as::<_, Order>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders ORDER BY created_at DESC, id ASC"
        ))
        .fetch_all(db)
        .await
        .context("list orders")?;
        Ok(rows)
    }

    pub async fn exists(db: &PgPool, id: Uuid) -> anyhow::Result<bool> {
        let found: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM orders WHERE id = $1")
            .bind(id)
            .fetch_optional(db)
            .await
            .context("order exists")?;
        Ok(found.is_some())
    }

    /// Status of the caller's order, row-locked until the transaction ends.
    pub async fn lock_status_tx(
        tx: &mut Transaction<'_, Postgres>,
        user_id: Uuid,
        id: Uuid,
    ) -> anyhow::Result<Option<OrderStatus>> {
        let row: Option<(OrderStatus,)> =
            sqlx::query_as("SELECT status FROM orders WHERE id = $1 AND user_id = $2 FOR UPDATE")
                .bind(id)
                .bind(user_id)
                .fetch_optional(&mut **tx)
                .await
                .context("lock order")?;
        Ok(row.map(|(s,)| s))
    }

    /// Sets the status. With `expected` the write only happens if the current
    /// status still matches; `None` means no row was updated.
    pub async fn update_status(
        db: &PgPool,
        id: Uuid,
        status: OrderStatus,
        expected: Option<OrderStatus>,
    ) -> anyhow::Result<Option<Order>> {
        let row = sqlx::query_as::<_, Order>(&format!(
            r#"
            UPDATE orders
               SET status = $2
             WHERE id = $1
               AND ($3::order_status IS NULL OR status = $3)
            RETURNING {ORDER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(status)
        .bind(expected)
        .fetch_optional(db)
        .await
        .context("update order status")?;
        Ok(row)
    }

    pub async fn delete_tx(tx: &mut Transaction<'_, Postgres>, id: Uuid) -> anyhow::Result<bool> {
        // order_items go with it (ON DELETE CASCADE)
        let res = sqlx::query("DELETE FROM orders WHERE id = $1")
            .bind(id)
            .execute(&mut **tx)
            .await
            .context("delete order")?;
        Ok(res.rows_affected() > 0)
    }

    pub async fn delete(db: &PgPool, id: Uuid) -> anyhow::Result<bool> {
        let res = sqlx::query("DELETE FROM orders WHERE id = $1")
            .bind(id)
            .execute(db)
            .await
            .context("delete order")?;
        Ok(res.rows_affected() > 0)
    }
}

impl OrderItem {
    /// Bulk insert of all items of one order.
    pub async fn insert_many_tx(
        tx: &mut Transaction<'_, Postgres>,
        order_id: Uuid,
        items: &[NewOrderItem],
    ) -> anyhow::Result<Vec<OrderItem>> {
        anyhow::ensure!(!items.is_empty(), "no order items provided");

        let mut qb = QueryBuilder::<Postgres>::new(
            "INSERT INTO order_items (order_id, product_id, quantity, price, total_price) ",
        );
        qb.push_values(items, |mut b, item| {
            b.push_bind(order_id)
                .push_bind(item.product_id)
                .push_bind(item.quantity)
                .push_bind(item.price)
                .push_bind(item.total_price);
        });
        qb.push(" RETURNING id, order_id, product_id, quantity, price, total_price");

        let rows = qb
            .build_query_as::<OrderItem>()
            .fetch_all(&mut **tx)
            .await
            .context("insert order items")?;
        Ok(rows)
    }
}

impl OrderItemView {
    pub async fn list_for_orders(
        db: &PgPool,
        order_ids: &[Uuid],
    ) -> anyhow::Result<Vec<OrderItemView>> {
        if order_ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query_as::<_, OrderItemView>(
            r#"
            SELECT i.id, i.order_id, i.product_id,
                   COALESCE(p.name, 'Unknown Product') AS product_name,
                   p.images[1] AS product_image,
                   i.quantity, i.price, i.total_price
              FROM order_items i
              LEFT JOIN product p ON p.id = i.product_id
             WHERE i.order_id = ANY($1)
             ORDER BY i.order_id, i.id
            "#,
        )
        .bind(order_ids)
        .fetch_all(db)
        .await
        .context("list order items")?;
        Ok(rows)
    }
}
