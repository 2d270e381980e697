use reqwest::Client;
use serde_json::json;

use crate::config::Config;
use crate::generation::GeneratedMessage;

/// 生成成功后的通知协作方。通知属于尽力而为：
/// 失败只记日志，绝不影响主请求的结果。
pub struct Notifier {
    client: Client,
    webhook_url: Option<String>,
}

impl Notifier {
    pub fn new(config: &Config) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(5))
            .build()?;

        Ok(Self {
            client,
            webhook_url: config.notify_webhook_url.clone(),
        })
    }

    pub async fn message_created(&self, user_id: &str, message: &GeneratedMessage) {
        let Some(url) = &self.webhook_url else {
            return;
        };

        let payload = json!({
            "event": "message_created",
            "user_id": user_id,
            "recipient_name": message.recipient_name,
            "content": message.content,
            "created_at": message.created_at,
        });

        match self.client.post(url).json(&payload).send().await {
            Ok(response) if response.status().is_success() => {
                tracing::debug!("Notification delivered for user {}", user_id);
            }
            Ok(response) => {
                tracing::warn!(
                    "Notification webhook returned {} for user {}",
                    response.status(),
                    user_id
                );
            }
            Err(e) => {
                tracing::warn!("Notification webhook failed for user {}: {}", user_id, e);
            }
        }
    }
}
