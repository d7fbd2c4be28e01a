use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Redirect,
    routing::{patch, post},
    Json, Router,
};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::{
    dto::{AddToCartRequest, CartRowResponse, CartView, UpdateQuantityRequest},
    repo_types::{CartLine, CartRow},
};
use crate::{
    auth::extractors::AuthUser,
    catalog::repo_types::Product,
    error::{AppError, AppResult},
    state::AppState,
};

pub const MAX_LINE_QUANTITY: i32 = 999;

pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/cart", post(add_to_cart).get(get_cart))
        .route("/cart/:id", patch(update_quantity).delete(remove_item))
        .route("/products/:id/buy-now", post(buy_now))
}

#[instrument(skip(state))]
pub async fn get_cart(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> AppResult<Json<CartView>> {
    let lines = CartLine::list_by_user(&state.db, user_id).await?;
    Ok(Json(CartView::from(lines)))
}

async fn add(state: &AppState, user_id: Uuid, product_id: Uuid, quantity: i32) -> AppResult<CartRow> {
    if !(1..=MAX_LINE_QUANTITY).contains(&quantity) {
        warn!(quantity, "add to cart with bad quantity");
        return Err(AppError::bad_request("quantity must be between 1 and 999"));
    }
    let Some(row) = CartRow::add(&state.db, user_id, product_id, quantity, MAX_LINE_QUANTITY).await?
    else {
        if Product::find(&state.db, product_id).await?.is_none() {
            return Err(AppError::NotFound);
        }
        warn!(%user_id, %product_id, quantity, "cart line limit reached");
        return Err(AppError::bad_request("quantity must be between 1 and 999"));
    };
    info!(%user_id, %product_id, quantity = row.quantity, "cart updated");
    Ok(row)
}

#[instrument(skip(state))]
pub async fn add_to_cart(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(body): Json<AddToCartRequest>,
) -> AppResult<(StatusCode, Json<CartRowResponse>)> {
    let row = add(&state, user_id, body.product_id, body.quantity).await?;
    Ok((StatusCode::CREATED, Json(row.into())))
}

/// Adds one unit and sends the client on to its cart.
#[instrument(skip(state))]
pub async fn buy_now(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(product_id): Path<Uuid>,
) -> AppResult<Redirect> {
    add(&state, user_id, product_id, 1).await?;
    Ok(Redirect::to("/api/v1/cart"))
}

#[instrument(skip(state))]
pub async fn update_quantity(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateQuantityRequest>,
) -> AppResult<Json<Option<CartRowResponse>>> {
    if body.quantity <= 0 {
        return remove(&state, user_id, id).await.map(|_| Json(None));
    }
    if body.quantity > MAX_LINE_QUANTITY {
        return Err(AppError::bad_request("quantity must be between 1 and 999"));
    }
    let row = CartRow::set_quantity(&state.db, user_id, id, body.quantity)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(Json(Some(row.into())))
}

#[instrument(skip(state))]
pub async fn remove_item(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    remove(&state, user_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn remove(state: &AppState, user_id: Uuid, id: Uuid) -> AppResult<()> {
    if !CartRow::remove(&state.db, user_id, id).await? {
        return Err(AppError::NotFound);
    }
    info!(%user_id, cart_id = %id, "cart row removed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    #[test]
    fn cart_view_serializes_joined_product_and_total() {
        let lines = vec![
            CartLine {
                id: Uuid::new_v4(),
                product_id: Uuid::new_v4(),
                quantity: 2,
                total_price: "25.00".parse().unwrap(),
                product_name: "Rose".into(),
                product_price: "12.50".parse().unwrap(),
                product_images: vec!["https://cdn/rose.jpg".into()],
            },
            CartLine {
                id: Uuid::new_v4(),
                product_id: Uuid::new_v4(),
                quantity: 1,
                total_price: "3.20".parse().unwrap(),
                product_name: "Seeds".into(),
                product_price: "3.20".parse().unwrap(),
                product_images: vec![],
            },
        ];
        let view = CartView::from(lines);
        assert_eq!(view.total, "28.20".parse::<Decimal>().unwrap());

        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["total"], "28.20");
        assert_eq!(json["items"][0]["product"]["name"], "Rose");
        assert_eq!(json["items"][0]["product"]["price"], "12.50");
        assert_eq!(json["items"][0]["quantity"], 2);
    }

    #[test]
    fn add_request_defaults_to_one_unit() {
        let body: AddToCartRequest =
            serde_json::from_value(serde_json::json!({ "product_id": Uuid::new_v4() })).unwrap();
        assert_eq!(body.quantity, 1);
    }

    mod routes {
        use super::*;
        use crate::{app::build_app, auth::repo_types::Role, testing};
        use axum::{
            body::Body,
            http::{header, Method, Request},
        };
        use sqlx::PgPool;
        use tower::ServiceExt;

        fn post(uri: String, auth: &str, body: serde_json::Value) -> Request<Body> {
            Request::builder()
                .method(Method::POST)
                .uri(uri)
                .header(header::AUTHORIZATION, auth)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap()
        }

        #[sqlx::test(migrations = "./migrations")]
        async fn add_enforces_line_limit_and_known_products(db: PgPool) {
            let state = AppState::for_tests(db.clone());
            let user = testing::user(&db, "u@shop.io", Role::Customer).await;
            let p = testing::product(&db, "P", "1.00").await;
            let auth = testing::bearer(&state, user.id);
            let app = build_app(state);

            let add = |qty: i32| {
                post(
                    "/api/v1/cart".into(),
                    &auth,
                    serde_json::json!({ "product_id": p.id, "quantity": qty }),
                )
            };
            assert_eq!(app.clone().oneshot(add(999)).await.unwrap().status(), StatusCode::CREATED);
            assert_eq!(app.clone().oneshot(add(1)).await.unwrap().status(), StatusCode::BAD_REQUEST);
            assert_eq!(app.clone().oneshot(add(1000)).await.unwrap().status(), StatusCode::BAD_REQUEST);

            let unknown = post(
                "/api/v1/cart".into(),
                &auth,
                serde_json::json!({ "product_id": Uuid::new_v4() }),
            );
            assert_eq!(app.oneshot(unknown).await.unwrap().status(), StatusCode::NOT_FOUND);

            let lines = CartLine::list_by_user(&db, user.id).await.unwrap();
            assert_eq!(lines[0].quantity, 999);
        }

        #[sqlx::test(migrations = "./migrations")]
        async fn buy_now_redirects_to_cart(db: PgPool) {
            let state = AppState::for_tests(db.clone());
            let user = testing::user(&db, "u@shop.io", Role::Customer).await;
            let p = testing::product(&db, "P", "4.00").await;
            let auth = testing::bearer(&state, user.id);

            let req = Request::builder()
                .method(Method::POST)
                .uri(format!("/api/v1/products/{}/buy-now", p.id))
                .header(header::AUTHORIZATION, auth)
                .body(Body::empty())
                .unwrap();
            let resp = build_app(state).oneshot(req).await.unwrap();
            assert_eq!(resp.status(), StatusCode::SEE_OTHER);
            assert_eq!(resp.headers()[header::LOCATION], "/api/v1/cart");

            let lines = CartLine::list_by_user(&db, user.id).await.unwrap();
            assert_eq!(lines.len(), 1);
            assert_eq!(lines[0].quantity, 1);
        }
    }
}
