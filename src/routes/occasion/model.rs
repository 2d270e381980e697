use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, FromRow)]
pub struct Occasion {
    pub occasion_id: String,
    pub user_id: String,
    pub name: String,
    pub occasion_date: NaiveDate,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CreateOccasionRequest {
    pub name: String,
    pub occasion_date: NaiveDate,
}

impl Occasion {
    pub async fn create(
        pool: &PgPool,
        user_id: &str,
        name: &str,
        occasion_date: NaiveDate,
    ) -> Result<Self, sqlx::Error> {
        let occasion_id = Uuid::new_v4().to_string();

        let occasion = sqlx::query_as::<_, Occasion>(
            r#"
            INSERT INTO occasions (occasion_id, user_id, name, occasion_date, created_at)
            VALUES ($1, $2, $3, $4, NOW())
            RETURNING occasion_id, user_id, name, occasion_date, created_at
            "#,
        )
        .bind(&occasion_id)
        .bind(user_id)
        .bind(name)
        .bind(occasion_date)
        .fetch_one(pool)
        .await?;

        Ok(occasion)
    }

    /// 按日期升序返回还未过去的纪念日
    pub async fn upcoming(pool: &PgPool, user_id: &str) -> Result<Vec<Self>, sqlx::Error> {
        let occasions = sqlx::query_as::<_, Occasion>(
            r#"
            SELECT occasion_id, user_id, name, occasion_date, created_at
            FROM occasions
            WHERE user_id = $1 AND occasion_date >= CURRENT_DATE
            ORDER BY occasion_date ASC
            LIMIT 20
            "#,
        )
        .bind(user_id)
        .fetch_all(pool)
        .await?;

        Ok(occasions)
    }
}

/// 根据用户喜欢的类别给出礼物建议
pub fn recommend_gifts(favorite_category: Option<&str>) -> Vec<&'static str> {
    match favorite_category {
        Some("首饰") => vec!["项链", "手链", "耳环"],
        Some("鲜花") => vec!["玫瑰花束", "永生花", "向日葵"],
        Some("美食") => vec!["手工巧克力", "双人晚餐", "下午茶"],
        _ => vec!["定制相框", "手写情书", "一日约会"],
    }
}
