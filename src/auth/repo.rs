use crate::auth::repo_types::{LastContact, Role, User};
use anyhow::Context;
use sqlx::PgPool;
use uuid::Uuid;

const USER_COLUMNS: &str = "id, email, username, password_hash, role, avatar_url, created_at";

impl User {
    /// Find a user by email.
    pub async fn find_by_email(db: &PgPool, email: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(db)
        .await
        .context("find user by email")?;
        Ok(user)
    }

    pub async fn find_by_id(db: &PgPool, id: Uuid) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(db)
        .await
        .context("find user by id")?;
        Ok(user)
    }

    /// Inserts the user; `None` when the email is already registered.
    pub async fn create(
        db: &PgPool,
        email: &str,
        username: &str,
        password_hash: &str,
        role: Role,
    ) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (email, username, password_hash, role)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (email) DO NOTHING
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(email)
        .bind(username)
        .bind(password_hash)
        .bind(role)
        .fetch_optional(db)
        .await
        .context("insert user")?;
        Ok(user)
    }

    /// Partial profile update; `None` keeps the stored value.
    pub async fn update_profile(
        db: &PgPool,
        id: Uuid,
        username: Option<&str>,
        avatar_url: Option<&str>,
    ) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
               SET username = COALESCE($2, username),
                   avatar_url = COALESCE($3, avatar_url)
             WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(username)
        .bind(avatar_url)
        .fetch_optional(db)
        .await
        .context("update profile")?;
        Ok(user)
    }

    /// Admin listing, optionally filtered by a case-insensitive email substring.
    pub async fn list(db: &PgPool, search: Option<&str>) -> anyhow::Result<Vec<User>> {
        let users = sqlx::query_as::<_, User>(&format!(
            r#"
            SELECT {USER_COLUMNS}
              FROM users
             WHERE $1::text IS NULL OR strpos(lower(email), lower($1)) > 0
             ORDER BY email ASC
            "#
        ))
        .bind(search)
        .fetch_all(db)
        .await
        .context("list users")?;
        Ok(users)
    }

    pub async fn admin_update(
        db: &PgPool,
        id: Uuid,
        username: Option<&str>,
        role: Option<Role>,
    ) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
               SET username = COALESCE($2, username),
                   role = COALESCE($3, role)
             WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(username)
        .bind(role)
        .fetch_optional(db)
        .await
        .context("admin update user")?;
        Ok(user)
    }

    pub async fn delete(db: &PgPool, id: Uuid) -> anyhow::Result<bool> {
        let res = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(db)
            .await
            .context("delete user")?;
        Ok(res.rows_affected() > 0)
    }

    pub async fn last_contact(db: &PgPool, id: Uuid) -> anyhow::Result<Option<LastContact>> {
        let row = sqlx::query_as::<_, LastContact>(
            r#"
            SELECT phone, address
              FROM orders
             WHERE user_id = $1
             ORDER BY created_at DESC
             LIMIT 1
            "#,
        )
        .bind(id)
        .fetch_optional(db)
        .await
        .context("latest order contact")?;
        Ok(row)
    }
}
