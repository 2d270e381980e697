use std::fmt;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::config::Config;

#[derive(Debug, Deserialize)]
pub struct CompletionChoice {
    pub text: String,
}

/// 上游文本生成接口的响应结构
#[derive(Debug, Deserialize)]
pub struct CompletionResponse {
    pub choices: Vec<CompletionChoice>,
}

#[derive(Debug)]
pub enum ProviderError {
    Timeout,
    Http(String),
    Malformed(String),
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderError::Timeout => write!(f, "completion request timed out"),
            ProviderError::Http(details) => write!(f, "completion request failed: {}", details),
            ProviderError::Malformed(details) => {
                write!(f, "completion response malformed: {}", details)
            }
        }
    }
}

impl std::error::Error for ProviderError {}

/// 上游生成服务的抽象，方便测试时注入假实现
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn complete(
        &self,
        prompt: &str,
        max_tokens: u32,
    ) -> Result<CompletionResponse, ProviderError>;
}

/// 通过 HTTP 调用上游生成服务，整个请求受客户端超时约束
pub struct HttpCompletionClient {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
}

impl HttpCompletionClient {
    pub fn new(config: &Config) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(config.completion_timeout())
            .build()?;

        Ok(Self {
            client,
            api_url: config.completion_api_url.clone(),
            api_key: config.completion_api_key.clone(),
        })
    }
}

#[async_trait]
impl CompletionProvider for HttpCompletionClient {
    async fn complete(
        &self,
        prompt: &str,
        max_tokens: u32,
    ) -> Result<CompletionResponse, ProviderError> {
        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&json!({
                "prompt": prompt,
                "max_tokens": max_tokens,
            }))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout
                } else {
                    ProviderError::Http(e.to_string())
                }
            })?;

        let response = response
            .error_for_status()
            .map_err(|e| ProviderError::Http(e.to_string()))?;

        response
            .json::<CompletionResponse>()
            .await
            .map_err(|e| ProviderError::Malformed(e.to_string()))
    }
}
