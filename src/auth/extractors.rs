use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use tracing::warn;
use uuid::Uuid;

use super::repo_types::{Role, User};
use super::services::JwtKeys;
use crate::{error::AppError, state::AppState};

/// Extracts and validates the bearer access token, returning the user ID.
pub struct AuthUser(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let keys = JwtKeys::from_ref(state);
        let auth_header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or(AppError::Unauthorized("missing Authorization header"))?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .or_else(|| auth_header.strip_prefix("bearer "))
            .ok_or(AppError::Unauthorized("invalid auth scheme"))?;

        let claims = match keys.verify(token) {
            Ok(c) => c,
            Err(_) => {
                warn!("invalid or expired token");
                return Err(AppError::Unauthorized("invalid or expired token"));
            }
        };

        if !claims.is_access() {
            return Err(AppError::Unauthorized("access token required"));
        }

        Ok(AuthUser(claims.sub))
    }
}

/// Authenticated user whose stored role is `admin`.
pub struct AdminUser(pub Uuid);

#[async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let AuthUser(user_id) = AuthUser::from_request_parts(parts, state).await?;
        let user = User::find_by_id(&state.db, user_id)
            .await?
            .ok_or(AppError::Unauthorized("user not found"))?;
        if user.role != Role::Admin {
            warn!(%user_id, "admin route refused");
            return Err(AppError::Forbidden);
        }
        Ok(AdminUser(user_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{header::AUTHORIZATION, Request};

    fn parts_with(auth: Option<&str>) -> Parts {
        let mut req = Request::builder().uri("/cart");
        if let Some(value) = auth {
            req = req.header(AUTHORIZATION, value);
        }
        req.body(()).unwrap().into_parts().0
    }

    #[tokio::test]
    async fn accepts_valid_access_token() {
        let state = AppState::fake();
        let user_id = Uuid::new_v4();
        let token = JwtKeys::from_ref(&state).sign_access(user_id).unwrap();
        let mut parts = parts_with(Some(&format!("Bearer {token}")));
        let AuthUser(got) = AuthUser::from_request_parts(&mut parts, &state).await.unwrap();
        assert_eq!(got, user_id);
    }

    #[tokio::test]
    async fn rejects_missing_header() {
        let state = AppState::fake();
        let mut parts = parts_with(None);
        let err = AuthUser::from_request_parts(&mut parts, &state).await.err().unwrap();
        assert!(matches!(err, AppError::Unauthorized("missing Authorization header")));
    }

    #[tokio::test]
    async fn rejects_other_schemes() {
        let state = AppState::fake();
        let mut parts = parts_with(Some("Basic dXNlcjpwYXNz"));
        let err = AuthUser::from_request_parts(&mut parts, &state).await.err().unwrap();
        assert!(matches!(err, AppError::Unauthorized("invalid auth scheme")));
    }

    #[tokio::test]
    async fn rejects_refresh_token() {
        let state = AppState::fake();
        let token = JwtKeys::from_ref(&state).sign_refresh(Uuid::new_v4()).unwrap();
        let mut parts = parts_with(Some(&format!("Bearer {token}")));
        let err = AuthUser::from_request_parts(&mut parts, &state).await.err().unwrap();
        assert!(matches!(err, AppError::Unauthorized("access token required")));
    }

    #[tokio::test]
    async fn rejects_garbage_token() {
        let state = AppState::fake();
        let mut parts = parts_with(Some("Bearer not.a.jwt"));
        let err = AuthUser::from_request_parts(&mut parts, &state).await.err().unwrap();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn admin_extractor_checks_stored_role(db: sqlx::PgPool) {
        let state = AppState::for_tests(db.clone());
        let customer = crate::testing::user(&db, "c@shop.io", Role::Customer).await;
        let admin = crate::testing::user(&db, "a@shop.io", Role::Admin).await;

        let mut parts = parts_with(Some(&crate::testing::bearer(&state, customer.id)));
        let err = AdminUser::from_request_parts(&mut parts, &state).await.err().unwrap();
        assert!(matches!(err, AppError::Forbidden));

        let mut parts = parts_with(Some(&crate::testing::bearer(&state, admin.id)));
        let AdminUser(got) = AdminUser::from_request_parts(&mut parts, &state).await.unwrap();
        assert_eq!(got, admin.id);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn admin_extractor_rejects_deleted_user(db: sqlx::PgPool) {
        let state = AppState::for_tests(db.clone());
        let admin = crate::testing::user(&db, "gone@shop.io", Role::Admin).await;
        User::delete(&db, admin.id).await.unwrap();

        let mut parts = parts_with(Some(&crate::testing::bearer(&state, admin.id)));
        let err = AdminUser::from_request_parts(&mut parts, &state).await.err().unwrap();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }
}
