use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, FromRow)]
pub struct Feedback {
    pub feedback_id: String,
    pub user_id: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct SubmitFeedbackRequest {
    pub content: String,
}

impl Feedback {
    pub async fn create(pool: &PgPool, user_id: &str, content: &str) -> Result<Self, sqlx::Error> {
        let feedback_id = Uuid::new_v4().to_string();

        let feedback = sqlx::query_as::<_, Feedback>(
            r#"
            INSERT INTO feedback (feedback_id, user_id, content, created_at)
            VALUES ($1, $2, $3, NOW())
            RETURNING feedback_id, user_id, content, created_at
            "#,
        )
        .bind(&feedback_id)
        .bind(user_id)
        .bind(content)
        .fetch_one(pool)
        .await?;

        Ok(feedback)
    }

    pub async fn list_all(pool: &PgPool, limit: i64) -> Result<Vec<Self>, sqlx::Error> {
        let feedback = sqlx::query_as::<_, Feedback>(
            r#"
            SELECT feedback_id, user_id, content, created_at
            FROM feedback
            ORDER BY created_at DESC
            LIMIT $1
            "#,
        )
        .bind(limit.clamp(1, 200))
        .fetch_all(pool)
        .await?;

        Ok(feedback)
    }
}
