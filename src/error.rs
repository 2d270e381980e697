use std::collections::HashMap;

use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::generation::GenerateError;
use crate::utils::{error_codes, error_to_api_response, error_with_data_to_api_response};

/// 统一错误类型，各层只抛类型化错误，由这里映射为 HTTP 状态码和脱敏文案
#[derive(Debug)]
pub enum AppError {
    /// 请求参数校验失败，携带字段级错误信息
    Validation(HashMap<String, String>),
    /// 触发限流，携带重试等待秒数
    RateLimited { retry_after_secs: u64 },
    Unauthorized,
    Forbidden,
    NotFound(String),
    /// 上游生成服务错误，详情只记日志不回传
    Upstream(String),
    Database(String),
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::Validation(field_errors) => (
                StatusCode::BAD_REQUEST,
                error_with_data_to_api_response(
                    error_codes::VALIDATION_ERROR,
                    "请求参数无效".to_string(),
                    json!({ "field_errors": field_errors }),
                ),
            )
                .into_response(),
            AppError::RateLimited { retry_after_secs } => {
                let mut response = (
                    StatusCode::TOO_MANY_REQUESTS,
                    error_with_data_to_api_response(
                        error_codes::RATE_LIMIT,
                        format!("请求过于频繁，请在{}秒后重试", retry_after_secs),
                        json!({ "retry_after_secs": retry_after_secs }),
                    ),
                )
                    .into_response();
                response
                    .headers_mut()
                    .insert(header::RETRY_AFTER, retry_after_secs.into());
                response
            }
            AppError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                error_to_api_response::<()>(error_codes::AUTH_FAILED, "未授权访问".to_string()),
            )
                .into_response(),
            AppError::Forbidden => (
                StatusCode::FORBIDDEN,
                error_to_api_response::<()>(
                    error_codes::PERMISSION_DENIED,
                    "没有权限执行该操作".to_string(),
                ),
            )
                .into_response(),
            AppError::NotFound(msg) => (
                StatusCode::NOT_FOUND,
                error_to_api_response::<()>(error_codes::NOT_FOUND, msg),
            )
                .into_response(),
            AppError::Upstream(details) => {
                tracing::error!("Upstream generation failure: {}", details);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    error_to_api_response::<()>(
                        error_codes::UPSTREAM_ERROR,
                        "生成服务暂时不可用，请稍后再试".to_string(),
                    ),
                )
                    .into_response()
            }
            AppError::Database(details) => {
                tracing::error!("Database failure: {}", details);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    error_to_api_response::<()>(
                        error_codes::INTERNAL_ERROR,
                        "内部服务器错误".to_string(),
                    ),
                )
                    .into_response()
            }
            AppError::Internal(details) => {
                tracing::error!("Unexpected failure: {}", details);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    error_to_api_response::<()>(
                        error_codes::INTERNAL_ERROR,
                        "内部服务器错误".to_string(),
                    ),
                )
                    .into_response()
            }
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::RowNotFound => AppError::NotFound("记录不存在".to_string()),
            other => AppError::Database(other.to_string()),
        }
    }
}

impl From<GenerateError> for AppError {
    fn from(e: GenerateError) -> Self {
        match e {
            GenerateError::Validation(field_errors) => AppError::Validation(field_errors),
            GenerateError::Upstream(details) => AppError::Upstream(details),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_maps_to_400() {
        let mut fields = HashMap::new();
        fields.insert("recipient_name".to_string(), "必填".to_string());
        let response = AppError::Validation(fields).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn rate_limited_maps_to_429_with_header() {
        let response = AppError::RateLimited {
            retry_after_secs: 55,
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            response.headers().get(header::RETRY_AFTER).unwrap(),
            &header::HeaderValue::from(55u64)
        );
    }

    #[test]
    fn upstream_maps_to_500() {
        let response = AppError::Upstream("timeout".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
