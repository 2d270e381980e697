use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};

use crate::utils::{hash_password, verify_password};

#[derive(Debug, Serialize, Deserialize, FromRow)]
pub struct User {
    pub user_id: String,
    pub nickname: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub is_admin: bool,
    pub favorite_category: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub user_id: String,
    pub nickname: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub user_id: String,
    pub nickname: String,
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub user_id: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub user_id: String,
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePasswordRequest {
    pub password: String,
    pub confirm_password: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePreferenceRequest {
    pub favorite_category: String,
}

#[derive(Debug, Serialize)]
pub struct CheckTokenResponse {
    pub user_id: String,
    pub is_admin: bool,
}

#[derive(Debug, Serialize)]
pub struct UserSettings {
    pub user_id: String,
    pub nickname: String,
    pub email: String,
    pub is_admin: bool,
    pub favorite_category: Option<String>,
    pub message_count: i64,
}

impl User {
    pub async fn create(pool: &PgPool, req: RegisterRequest) -> Result<Self, sqlx::Error> {
        let password_hash = hash_password(&req.password)
            .map_err(|e| sqlx::Error::Protocol(format!("Failed to hash password: {}", e)))?;

        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (user_id, nickname, email, password_hash)
            VALUES ($1, $2, $3, $4)
            RETURNING user_id, nickname, email, password_hash, is_admin, favorite_category, created_at
            "#,
        )
        .bind(&req.user_id)
        .bind(&req.nickname)
        .bind(&req.email)
        .bind(&password_hash)
        .fetch_one(pool)
        .await?;

        Ok(user)
    }

    pub async fn find_by_id(pool: &PgPool, user_id: &str) -> Result<Option<Self>, sqlx::Error> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT user_id, nickname, email, password_hash, is_admin, favorite_category, created_at
            FROM users
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

        Ok(user)
    }

    pub fn verify_login(&self, password: &str) -> Result<bool, bcrypt::BcryptError> {
        verify_password(password, &self.password_hash)
    }

    pub async fn update_password(
        pool: &PgPool,
        user_id: &str,
        password: &str,
    ) -> Result<Self, sqlx::Error> {
        let password_hash = hash_password(password)
            .map_err(|e| sqlx::Error::Protocol(format!("Failed to hash password: {}", e)))?;

        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET password_hash = $1
            WHERE user_id = $2
            RETURNING user_id, nickname, email, password_hash, is_admin, favorite_category, created_at
            "#,
        )
        .bind(&password_hash)
        .bind(user_id)
        .fetch_one(pool)
        .await?;

        Ok(user)
    }

    pub async fn update_preference(
        pool: &PgPool,
        user_id: &str,
        favorite_category: &str,
    ) -> Result<Self, sqlx::Error> {
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET favorite_category = $1
            WHERE user_id = $2
            RETURNING user_id, nickname, email, password_hash, is_admin, favorite_category, created_at
            "#,
        )
        .bind(favorite_category)
        .bind(user_id)
        .fetch_one(pool)
        .await?;

        Ok(user)
    }

    pub async fn settings(
        pool: &PgPool,
        user_id: &str,
    ) -> Result<Option<UserSettings>, sqlx::Error> {
        let Some(user) = Self::find_by_id(pool, user_id).await? else {
            return Ok(None);
        };

        let message_count =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM messages WHERE user_id = $1")
                .bind(user_id)
                .fetch_one(pool)
                .await?;

        Ok(Some(UserSettings {
            user_id: user.user_id,
            nickname: user.nickname,
            email: user.email,
            is_admin: user.is_admin,
            favorite_category: user.favorite_category,
            message_count,
        }))
    }
}
