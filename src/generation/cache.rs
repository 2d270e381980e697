use std::sync::Arc;

use async_trait::async_trait;
use redis::AsyncCommands;

/// 生成结果缓存的过期时间，单位秒
const GENERATION_CACHE_EXPIRE: u64 = 3600;

/// 缓存协作方的最小接口。容量和淘汰策略由实现方负责，
/// 读写失败一律降级处理（读当未命中、写丢弃），不影响主流程。
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Option<String>;
    async fn set(&self, key: &str, value: &str);
}

pub struct RedisCache {
    client: Arc<redis::Client>,
}

impl RedisCache {
    pub fn new(client: Arc<redis::Client>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl CacheStore for RedisCache {
    async fn get(&self, key: &str) -> Option<String> {
        let mut conn = match self.client.get_multiplexed_async_connection().await {
            Ok(conn) => conn,
            Err(e) => {
                tracing::warn!("Redis connection failed, treating as cache miss: {}", e);
                return None;
            }
        };

        match conn.get::<_, Option<String>>(key).await {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!("Redis GET failed for {}: {}", key, e);
                None
            }
        }
    }

    async fn set(&self, key: &str, value: &str) {
        let mut conn = match self.client.get_multiplexed_async_connection().await {
            Ok(conn) => conn,
            Err(e) => {
                tracing::warn!("Redis connection failed, skipping cache write: {}", e);
                return;
            }
        };

        if let Err(e) = conn
            .set_ex::<_, _, ()>(key, value, GENERATION_CACHE_EXPIRE)
            .await
        {
            tracing::warn!("Redis SETEX failed for {}: {}", key, e);
        }
    }
}
