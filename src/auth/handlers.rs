use axum::{
    extract::{FromRef, State},
    routing::{get, post},
    Json, Router,
};
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        dto::{
            AuthResponse, LoginRequest, Profile, PublicUser, RefreshRequest, RegisterRequest,
            UpdateProfileRequest,
        },
        extractors::AuthUser,
        password::{hash_password, verify_password},
        repo_types::{Role, User},
        services::{is_valid_email, normalize_email, JwtKeys},
    },
    error::{AppError, AppResult},
    state::AppState,
};

pub const MIN_PASSWORD_LEN: usize = 8;
pub const MAX_USERNAME_LEN: usize = 50;

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
}

pub fn me_routes() -> Router<AppState> {
    Router::new().route("/me", get(get_me).patch(update_me))
}

pub(crate) fn validate_username(username: &str) -> AppResult<&str> {
    let username = username.trim();
    if username.is_empty() || username.chars().count() > MAX_USERNAME_LEN {
        return Err(AppError::bad_request("Username must be 1 to 50 characters"));
    }
    Ok(username)
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(mut payload): Json<RegisterRequest>,
) -> AppResult<Json<AuthResponse>> {
    payload.email = normalize_email(&payload.email);

    if !is_valid_email(&payload.email) {
        warn!(email = %payload.email, "invalid email");
        return Err(AppError::bad_request("Invalid email"));
    }

    if payload.password.len() < MIN_PASSWORD_LEN {
        warn!("password too short");
        return Err(AppError::bad_request("Password too short"));
    }

    let username = validate_username(&payload.username)?;

    let hash = hash_password(&payload.password)?;
    let role = if state.config.is_admin_email(&payload.email) {
        Role::Admin
    } else {
        Role::Customer
    };

    // The unique email index decides between concurrent registrations.
    let Some(user) = User::create(&state.db, &payload.email, username, &hash, role).await? else {
        warn!(email = %payload.email, "email already registered");
        return Err(AppError::conflict("Email already registered"));
    };

    let keys = JwtKeys::from_ref(&state);
    let (access_token, refresh_token) = keys.sign_pair(user.id)?;

    info!(user_id = %user.id, email = %user.email, role = ?user.role, "user registered");
    Ok(Json(AuthResponse {
        access_token,
        refresh_token,
        user: user.into(),
    }))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(mut payload): Json<LoginRequest>,
) -> AppResult<Json<AuthResponse>> {
    payload.email = normalize_email(&payload.email);

    if !is_valid_email(&payload.email) {
        warn!(email = %payload.email, "invalid email");
        return Err(AppError::bad_request("Invalid email"));
    }

    let user = match User::find_by_email(&state.db, &payload.email).await? {
        Some(u) => u,
        None => {
            warn!(email = %payload.email, "login unknown email");
            return Err(AppError::Unauthorized("Invalid credentials"));
        }
    };

    if !verify_password(&payload.password, &user.password_hash)? {
        warn!(email = %payload.email, user_id = %user.id, "login invalid password");
        return Err(AppError::Unauthorized("Invalid credentials"));
    }

    let keys = JwtKeys::from_ref(&state);
    let (access_token, refresh_token) = keys.sign_pair(user.id)?;

    info!(user_id = %user.id, email = %user.email, "user logged in");
    Ok(Json(AuthResponse {
        access_token,
        refresh_token,
        user: user.into(),
    }))
}

#[instrument(skip(state, payload))]
pub async fn refresh(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> AppResult<Json<AuthResponse>> {
    let keys = JwtKeys::from_ref(&state);
    let claims = keys.verify_refresh(&payload.refresh_token).map_err(|e| {
        warn!(error = %e, "refresh rejected");
        AppError::Unauthorized("invalid refresh token")
    })?;

    let user = User::find_by_id(&state.db, claims.sub)
        .await?
        .ok_or(AppError::Unauthorized("User not found"))?;

    // Issue new pair
    let (access_token, refresh_token) = keys.sign_pair(user.id)?;
    Ok(Json(AuthResponse {
        access_token,
        refresh_token,
        user: PublicUser::from(user),
    }))
}

#[instrument(skip(state))]
pub async fn get_me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> AppResult<Json<Profile>> {
    let user = User::find_by_id(&state.db, user_id)
        .await?
        .ok_or(AppError::Unauthorized("User not found"))?;
    let contact = User::last_contact(&state.db, user_id).await?;
    Ok(Json(Profile::new(user, contact)))
}

#[instrument(skip(state, payload))]
pub async fn update_me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<UpdateProfileRequest>,
) -> AppResult<Json<Profile>> {
    let username = payload
        .username
        .as_deref()
        .map(validate_username)
        .transpose()?;
    let avatar_url = payload
        .avatar_url
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty());

    let user = User::update_profile(&state.db, user_id, username, avatar_url)
        .await?
        .ok_or(AppError::Unauthorized("User not found"))?;
    let contact = User::last_contact(&state.db, user_id).await?;
    info!(%user_id, "profile updated");
    Ok(Json(Profile::new(user, contact)))
}


#[cfg(test)]
mod register_tests {
    use axum::{
        body::Body,
        http::{header, Method, Request, StatusCode},
    };
    use sqlx::PgPool;
    use tower::ServiceExt;

    use crate::{app::build_app, auth::repo_types::{Role, User}, state::AppState};

    fn register(email: &str) -> Request<Body> {
        let body = serde_json::json!({
            "email": email,
            "username": "anna",
            "password": "long-enough-pw",
        });
        Request::builder()
            .method(Method::POST)
            .uri("/api/v1/auth/register")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn concurrent_duplicates_get_conflict_not_500(db: PgPool) {
        let app = build_app(AppState::for_tests(db.clone()));
        let handles: Vec<_> = (0..6)
            .map(|_| {
                let app = app.clone();
                tokio::spawn(async move { app.oneshot(register("Anna@Shop.io")).await.unwrap() })
            })
            .collect();

        let mut statuses = Vec::new();
        for h in handles {
            statuses.push(h.await.unwrap().status());
        }
        assert_eq!(statuses.iter().filter(|s| **s == StatusCode::OK).count(), 1, "{statuses:?}");
        assert!(
            statuses.iter().all(|s| *s == StatusCode::OK || *s == StatusCode::CONFLICT),
            "{statuses:?}"
        );
        assert!(User::find_by_email(&db, "anna@shop.io").await.unwrap().is_some());
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn listed_admin_emails_register_as_admin(db: PgPool) {
        let app = build_app(AppState::for_tests(db.clone()));
        let resp = app.clone().oneshot(register("boss@shop.io")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let resp = app.oneshot(register("guest@shop.io")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let boss = User::find_by_email(&db, "boss@shop.io").await.unwrap().unwrap();
        let guest = User::find_by_email(&db, "guest@shop.io").await.unwrap().unwrap();
        assert_eq!(boss.role, Role::Admin);
        assert_eq!(guest.role, Role::Customer);
    }
}
