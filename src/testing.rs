//! Row builders for `#[sqlx::test]` tests.

use axum::extract::FromRef;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    auth::{
        repo_types::{Role, User},
        services::JwtKeys,
    },
    catalog::repo_types::{NewProduct, Product},
    state::AppState,
};

pub async fn user(db: &PgPool, email: &str, role: Role) -> User {
    User::create(db, email, "tester", "$argon2id$v=19$m=19456,t=2,p=1$c2FsdA$aGFzaA", role)
        .await
        .unwrap()
        .expect("email not taken")
}

pub async fn product(db: &PgPool, name: &str, price: &str) -> Product {
    Product::create(
        db,
        &NewProduct {
            category_id: None,
            name: name.into(),
            description: String::new(),
            price: price.parse().unwrap(),
            images: vec![],
            active: true,
        },
    )
    .await
    .unwrap()
}

pub fn bearer(state: &AppState, user_id: Uuid) -> String {
    let token = JwtKeys::from_ref(state).sign_access(user_id).unwrap();
    format!("Bearer {token}")
}
