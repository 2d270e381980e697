use std::collections::HashMap;

use axum::{
    extract::{Extension, Json, State},
    http::StatusCode,
    response::IntoResponse,
};

use super::model::{Feedback, SubmitFeedbackRequest};
use crate::{
    AppState,
    error::AppError,
    utils::{Claims, success_to_api_response},
};

#[axum::debug_handler]
pub async fn submit_feedback(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<SubmitFeedbackRequest>,
) -> Result<impl IntoResponse, AppError> {
    if req.content.trim().is_empty() {
        let mut field_errors = HashMap::new();
        field_errors.insert("content".to_string(), "反馈内容不能为空".to_string());
        return Err(AppError::Validation(field_errors));
    }

    let feedback = Feedback::create(&state.pool, &claims.sub, req.content.trim()).await?;
    Ok((StatusCode::CREATED, success_to_api_response(feedback)))
}

/// 管理员查看最近的用户反馈
#[axum::debug_handler]
pub async fn list_feedback(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    if !claims.is_admin {
        return Err(AppError::Forbidden);
    }

    let feedback = Feedback::list_all(&state.pool, 100).await?;
    Ok((StatusCode::OK, success_to_api_response(feedback)))
}
