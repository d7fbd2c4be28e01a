use std::collections::HashMap;

use anyhow::Context;
use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

use super::{
    checkout::{plan_checkout, Shipping},
    dto::MyOrder,
    repo_types::{Order, OrderItem, OrderItemView, OrderStatus},
};
use crate::{
    cart::repo_types::{CartLine, CartRow},
    error::{AppError, AppResult},
};

/// Turns the user's cart into one pending order. Everything happens in one
/// transaction holding the cart row locks, so a concurrent second checkout
/// waits and then finds the cart empty.
pub async fn place_order(
    db: &PgPool,
    user_id: Uuid,
    shipping: Shipping,
) -> AppResult<(Order, Vec<OrderItem>)> {
    let mut tx = db.begin().await.context("begin tx")?;

    let lines = CartLine::lock_by_user_tx(&mut tx, user_id).await?;
    let plan = plan_checkout(user_id, shipping, &lines).map_err(|e| {
        warn!(%user_id, error = %e, "checkout rejected");
        AppError::from(e)
    })?;

    let order = Order::insert_tx(&mut tx, &plan.order).await?;
    let items = OrderItem::insert_many_tx(&mut tx, order.id, &plan.items).await?;
    let checked_out: Vec<Uuid> = lines.iter().map(|l| l.id).collect();
    let cleared = CartRow::remove_many_tx(&mut tx, user_id, &checked_out).await?;

    tx.commit().await.context("commit tx")?;

    info!(
        %user_id,
        order_id = %order.id,
        items = items.len(),
        cleared,
        total = %order.total_price,
        "order placed"
    );
    Ok((order, items))
}

/// Customers may drop their own orders until they are completed.
pub async fn delete_own_order(db: &PgPool, user_id: Uuid, order_id: Uuid) -> AppResult<()> {
    let mut tx = db.begin().await.context("begin tx")?;

    match Order::lock_status_tx(&mut tx, user_id, order_id).await? {
        None => return Err(AppError::NotFound),
        Some(OrderStatus::Completed) => {
            warn!(%user_id, %order_id, "delete of completed order refused");
            return Err(AppError::conflict("completed orders can not be deleted"));
        }
        Some(_) => {}
    }
    Order::delete_tx(&mut tx, order_id).await?;

    tx.commit().await.context("commit tx")?;
    info!(%user_id, %order_id, "order deleted by customer");
    Ok(())
}

/// Moves an order to `status`. With `expected` set, a concurrent move that
/// got there first turns into a conflict instead of being overwritten.
pub async fn move_order(
    db: &PgPool,
    order_id: Uuid,
    status: OrderStatus,
    expected: Option<OrderStatus>,
) -> AppResult<Order> {
    if let Some(order) = Order::update_status(db, order_id, status, expected).await? {
        info!(%order_id, status = ?order.status, "order status changed");
        return Ok(order);
    }
    if expected.is_some() && Order::exists(db, order_id).await? {
        warn!(%order_id, ?expected, "order status changed concurrently");
        return Err(AppError::conflict("order status has changed"));
    }
    Err(AppError::NotFound)
}

pub async fn orders_with_items(db: &PgPool, orders: Vec<Order>) -> anyhow::Result<Vec<MyOrder>> {
    let ids: Vec<Uuid> = orders.iter().map(|o| o.id).collect();
    let items = OrderItemView::list_for_orders(db, &ids).await?;
    Ok(group_items(orders, items))
}

/// Attaches items to their orders, keeping the order of `orders`.
pub fn group_items(orders: Vec<Order>, items: Vec<OrderItemView>) -> Vec<MyOrder> {
    let mut by_order: HashMap<Uuid, Vec<OrderItemView>> = HashMap::new();
    for item in items {
        by_order.entry(item.order_id).or_default().push(item);
    }
    orders
        .into_iter()
        .map(|order| {
            let items = by_order.remove(&order.id).unwrap_or_default();
            MyOrder { order, items }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use time::OffsetDateTime;

    fn order() -> Order {
        Order {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            first_name: "A".into(),
            email: "a@b.io".into(),
            address: "addr".into(),
            phone: "1".into(),
            notes: String::new(),
            total_price: Decimal::TEN,
            status: OrderStatus::Pending,
            created_at: OffsetDateTime::now_utc(),
        }
    }

    fn item(order_id: Uuid, name: &str) -> OrderItemView {
        OrderItemView {
            id: Uuid::new_v4(),
            order_id,
            product_id: Uuid::new_v4(),
            product_name: name.into(),
            product_image: None,
            quantity: 1,
            price: Decimal::TEN,
            total_price: Decimal::TEN,
        }
    }

    #[test]
    fn items_follow_their_orders() {
        let (a, b, c) = (order(), order(), order());
        let items = vec![item(b.id, "x"), item(a.id, "y"), item(b.id, "z")];
        let grouped = group_items(vec![a.clone(), b.clone(), c.clone()], items);

        assert_eq!(grouped.len(), 3);
        assert_eq!(grouped[0].order.id, a.id);
        assert_eq!(grouped[0].items.len(), 1);
        let names: Vec<_> = grouped[1].items.iter().map(|i| i.product_name.as_str()).collect();
        assert_eq!(names, ["x", "z"]);
        assert!(grouped[2].items.is_empty());
    }

    #[test]
    fn orphan_items_are_dropped() {
        let a = order();
        let grouped = group_items(vec![a], vec![item(Uuid::new_v4(), "ghost")]);
        assert!(grouped[0].items.is_empty());
    }

    mod sql {
        use super::*;
        use crate::{
            auth::repo_types::Role, catalog::repo_types::Product, orders::checkout::Shipping,
            testing,
        };

        fn shipping() -> Shipping {
            Shipping {
                first_name: "Aziz".into(),
                email: "aziz@mail.uz".into(),
                address: "Chilonzor 9".into(),
                phone: "+998901234567".into(),
                notes: String::new(),
            }
        }

        fn dec(s: &str) -> Decimal {
            s.parse().unwrap()
        }

        async fn order_count(db: &PgPool) -> i64 {
            let (n,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM orders")
                .fetch_one(db)
                .await
                .unwrap();
            n
        }

        #[sqlx::test(migrations = "./migrations")]
        async fn checkout_turns_cart_into_one_order(db: PgPool) {
            let user = testing::user(&db, "u@shop.io", Role::Customer).await;
            let a = testing::product(&db, "A", "12.50").await;
            let b = testing::product(&db, "B", "3.20").await;
            CartRow::add(&db, user.id, a.id, 2, 999).await.unwrap().unwrap();
            CartRow::add(&db, user.id, b.id, 3, 999).await.unwrap().unwrap();

            let (order, items) = place_order(&db, user.id, shipping()).await.unwrap();

            assert_eq!(order.status, OrderStatus::Pending);
            assert_eq!(order.total_price, dec("34.60"));
            assert_eq!(items.len(), 2);
            let sum: Decimal = items.iter().map(|i| i.total_price).sum();
            assert_eq!(sum, order.total_price);
            assert!(CartLine::list_by_user(&db, user.id).await.unwrap().is_empty());
            assert_eq!(order_count(&db).await, 1);
        }

        #[sqlx::test(migrations = "./migrations")]
        async fn empty_cart_writes_nothing(db: PgPool) {
            let user = testing::user(&db, "u@shop.io", Role::Customer).await;
            let err = place_order(&db, user.id, shipping()).await.err().unwrap();
            assert!(matches!(err, AppError::BadRequest(ref m) if m == "cart is empty"));
            assert_eq!(order_count(&db).await, 0);
        }

        #[sqlx::test(migrations = "./migrations")]
        async fn second_checkout_finds_empty_cart(db: PgPool) {
            let user = testing::user(&db, "u@shop.io", Role::Customer).await;
            let a = testing::product(&db, "A", "1.00").await;
            CartRow::add(&db, user.id, a.id, 1, 999).await.unwrap().unwrap();

            let (first, second) = tokio::join!(
                place_order(&db, user.id, shipping()),
                place_order(&db, user.id, shipping()),
            );
            assert_eq!([first.is_ok(), second.is_ok()].iter().filter(|ok| **ok).count(), 1);
            assert_eq!(order_count(&db).await, 1);
        }

        #[sqlx::test(migrations = "./migrations")]
        async fn checkout_charges_current_prices(db: PgPool) {
            let user = testing::user(&db, "u@shop.io", Role::Customer).await;
            let vase = testing::product(&db, "Vase", "10.00").await;
            CartRow::add(&db, user.id, vase.id, 2, 999).await.unwrap().unwrap();
            let changes = crate::catalog::repo_types::ProductChanges {
                price: Some(dec("15.00")),
                ..Default::default()
            };
            Product::update(&db, vase.id, &changes).await.unwrap().unwrap();

            let shown = crate::cart::services::cart_total(
                &CartLine::list_by_user(&db, user.id).await.unwrap(),
            );
            let (order, _) = place_order(&db, user.id, shipping()).await.unwrap();
            assert_eq!(shown, dec("30.00"));
            assert_eq!(order.total_price, shown);
        }

        #[sqlx::test(migrations = "./migrations")]
        async fn customer_delete_rules(db: PgPool) {
            let owner = testing::user(&db, "o@shop.io", Role::Customer).await;
            let other = testing::user(&db, "x@shop.io", Role::Customer).await;
            let a = testing::product(&db, "A", "1.00").await;

            CartRow::add(&db, owner.id, a.id, 1, 999).await.unwrap().unwrap();
            let (open, _) = place_order(&db, owner.id, shipping()).await.unwrap();
            CartRow::add(&db, owner.id, a.id, 1, 999).await.unwrap().unwrap();
            let (done, _) = place_order(&db, owner.id, shipping()).await.unwrap();
            move_order(&db, done.id, OrderStatus::Completed, None).await.unwrap();

            let err = delete_own_order(&db, other.id, open.id).await.err().unwrap();
            assert!(matches!(err, AppError::NotFound));
            let err = delete_own_order(&db, owner.id, done.id).await.err().unwrap();
            assert!(matches!(err, AppError::Conflict(_)));

            delete_own_order(&db, owner.id, open.id).await.unwrap();
            let left = Order::list_by_user(&db, owner.id).await.unwrap();
            assert_eq!(left.len(), 1);
            assert_eq!(left[0].id, done.id);
            let items = OrderItemView::list_for_orders(&db, &[open.id]).await.unwrap();
            assert!(items.is_empty());
        }

        #[sqlx::test(migrations = "./migrations")]
        async fn stale_status_move_conflicts(db: PgPool) {
            let user = testing::user(&db, "u@shop.io", Role::Customer).await;
            let a = testing::product(&db, "A", "1.00").await;
            CartRow::add(&db, user.id, a.id, 1, 999).await.unwrap().unwrap();
            let (order, _) = place_order(&db, user.id, shipping()).await.unwrap();

            let moved = move_order(&db, order.id, OrderStatus::InProgress, Some(OrderStatus::Pending))
                .await
                .unwrap();
            assert_eq!(moved.status, OrderStatus::InProgress);

            // a second admin still sees it as pending
            let err = move_order(&db, order.id, OrderStatus::Completed, Some(OrderStatus::Pending))
                .await
                .err()
                .unwrap();
            assert!(matches!(err, AppError::Conflict(_)));

            // without an expectation the last write wins
            let moved = move_order(&db, order.id, OrderStatus::Pending, None).await.unwrap();
            assert_eq!(moved.status, OrderStatus::Pending);

            let err = move_order(&db, Uuid::new_v4(), OrderStatus::Completed, Some(OrderStatus::Pending))
                .await
                .err()
                .unwrap();
            assert!(matches!(err, AppError::NotFound));
        }

        #[sqlx::test(migrations = "./migrations")]
        async fn history_survives_product_deletion(db: PgPool) {
            let user = testing::user(&db, "u@shop.io", Role::Customer).await;
            let a = testing::product(&db, "A", "2.00").await;
            CartRow::add(&db, user.id, a.id, 1, 999).await.unwrap().unwrap();
            place_order(&db, user.id, shipping()).await.unwrap();
            Product::delete(&db, a.id).await.unwrap();

            let orders = Order::list_by_user(&db, user.id).await.unwrap();
            let mine = orders_with_items(&db, orders).await.unwrap();
            assert_eq!(mine[0].items[0].product_name, "Unknown Product");
            assert!(mine[0].items[0].product_image.is_none());
        }
    }
}
