use axum::{
    extract::{Extension, Json, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};

use super::model::MessageRecord;
use crate::{
    AppState,
    error::AppError,
    generation::{GenerateParams, GeneratedMessage},
    utils::{Claims, success_to_api_response},
};

#[derive(Debug, Serialize)]
pub struct RecentMessagesResponse {
    pub items: Vec<GeneratedMessage>,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub page: Option<i64>,
}

/// 生成情话。限流和认证都在中间件完成，参数校验在生成器内部，
/// 所以校验失败的请求同样占用限流名额。
#[axum::debug_handler]
pub async fn generate_message(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<GenerateParams>,
) -> Result<impl IntoResponse, AppError> {
    let outcome = state.generator.generate(&req).await?;

    // 新生成的结果才落库和通知；协作方失败只记日志，不影响本次请求
    if !outcome.from_cache {
        let message = GeneratedMessage {
            recipient_name: outcome.recipient_name.clone(),
            content: outcome.text.clone(),
            created_at: outcome.created_at,
        };

        if let Err(e) = MessageRecord::create(
            &state.pool,
            &state.redis,
            &claims.sub,
            &message.recipient_name,
            &message.content,
            message.created_at,
        )
        .await
        {
            tracing::warn!("Failed to persist message for {}: {}", claims.sub, e);
        }

        // 通知结果不影响响应，异步发出，避免慢webhook拖长请求耗时
        let notifier = std::sync::Arc::clone(&state.notifier);
        let user_id = claims.sub.clone();
        tokio::spawn(async move {
            notifier.message_created(&user_id, &message).await;
        });
    }

    Ok((StatusCode::OK, success_to_api_response(outcome)))
}

/// 进程内最近生成记录，最新的在末尾，最多10条
#[axum::debug_handler]
pub async fn recent_messages(
    State(state): State<AppState>,
    Extension(_claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    Ok((
        StatusCode::OK,
        success_to_api_response(RecentMessagesResponse {
            items: state.generator.recent(),
        }),
    ))
}

#[axum::debug_handler]
pub async fn message_history(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<HistoryQuery>,
) -> Result<impl IntoResponse, AppError> {
    let page = query.page.unwrap_or(1);
    let history = MessageRecord::history_page(
        &state.pool,
        &state.redis,
        &claims.sub,
        page,
        state.config.results_per_page,
    )
    .await?;

    Ok((StatusCode::OK, success_to_api_response(history)))
}
