use std::sync::Arc;

use chrono::{DateTime, Utc};
use redis::{AsyncCommands, Client as RedisClient};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, FromRow)]
pub struct MessageRecord {
    pub message_id: String,
    pub user_id: String,
    pub recipient_name: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HistoryPage {
    pub items: Vec<MessageRecord>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
}

// 历史首页缓存
const HISTORY_CACHE_EXPIRE: u64 = 300;
const HISTORY_CACHE_PREFIX: &str = "msg:history:";

impl MessageRecord {
    pub async fn create(
        pool: &PgPool,
        redis: &Arc<RedisClient>,
        user_id: &str,
        recipient_name: &str,
        content: &str,
        created_at: DateTime<Utc>,
    ) -> Result<Self, sqlx::Error> {
        let message_id = Uuid::new_v4().to_string();

        let message = sqlx::query_as::<_, MessageRecord>(
            r#"
            INSERT INTO messages (message_id, user_id, recipient_name, content, created_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING message_id, user_id, recipient_name, content, created_at
            "#,
        )
        .bind(&message_id)
        .bind(user_id)
        .bind(recipient_name)
        .bind(content)
        .bind(created_at)
        .fetch_one(pool)
        .await?;

        // 新消息写入后清除该用户的历史首页缓存
        if let Ok(mut conn) = redis.get_multiplexed_async_connection().await {
            let cache_key = format!("{}{}", HISTORY_CACHE_PREFIX, user_id);
            let _: Result<(), redis::RedisError> = conn.del(&cache_key).await;
        }

        Ok(message)
    }

    pub async fn history_page(
        pool: &PgPool,
        redis: &Arc<RedisClient>,
        user_id: &str,
        page: i64,
        per_page: i64,
    ) -> Result<HistoryPage, sqlx::Error> {
        let page = page.max(1);
        let per_page = per_page.clamp(1, 50);

        // 首页访问最频繁，优先查缓存
        let cache_key = format!("{}{}", HISTORY_CACHE_PREFIX, user_id);
        if page == 1 {
            if let Ok(mut conn) = redis.get_multiplexed_async_connection().await {
                let cached: redis::RedisResult<Option<String>> = conn.get(&cache_key).await;
                if let Ok(Some(json_str)) = cached {
                    if let Ok(cached_page) = serde_json::from_str::<HistoryPage>(&json_str) {
                        if cached_page.per_page == per_page {
                            tracing::debug!("History page from cache: {}", cache_key);
                            return Ok(cached_page);
                        }
                    }
                }
            }
        }

        let total =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM messages WHERE user_id = $1")
                .bind(user_id)
                .fetch_one(pool)
                .await?;

        let items = sqlx::query_as::<_, MessageRecord>(
            r#"
            SELECT message_id, user_id, recipient_name, content, created_at
            FROM messages
            WHERE user_id = $1
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(user_id)
        .bind(per_page)
        .bind((page - 1) * per_page)
        .fetch_all(pool)
        .await?;

        let history = HistoryPage {
            items,
            total,
            page,
            per_page,
        };

        if page == 1 {
            if let Ok(mut conn) = redis.get_multiplexed_async_connection().await {
                if let Ok(json_str) = serde_json::to_string(&history) {
                    let _: Result<(), redis::RedisError> = conn
                        .set_ex(&cache_key, json_str, HISTORY_CACHE_EXPIRE)
                        .await;
                    tracing::debug!("History page cached: {}", cache_key);
                }
            }
        }

        Ok(history)
    }
}
