use std::collections::HashMap;

use axum::{
    extract::{Extension, Json, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Serialize;

use super::model::{CreateOccasionRequest, Occasion, recommend_gifts};
use crate::{
    AppState,
    error::AppError,
    routes::user::User,
    utils::{Claims, success_to_api_response},
};

#[derive(Debug, Serialize)]
pub struct GiftRecommendationsResponse {
    pub favorite_category: Option<String>,
    pub recommendations: Vec<&'static str>,
}

#[axum::debug_handler]
pub async fn create_occasion(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateOccasionRequest>,
) -> Result<impl IntoResponse, AppError> {
    if req.name.trim().is_empty() {
        let mut field_errors = HashMap::new();
        field_errors.insert("name".to_string(), "请填写纪念日名称".to_string());
        return Err(AppError::Validation(field_errors));
    }

    let occasion = Occasion::create(
        &state.pool,
        &claims.sub,
        req.name.trim(),
        req.occasion_date,
    )
    .await?;

    Ok((StatusCode::CREATED, success_to_api_response(occasion)))
}

#[axum::debug_handler]
pub async fn upcoming_occasions(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let occasions = Occasion::upcoming(&state.pool, &claims.sub).await?;
    Ok((StatusCode::OK, success_to_api_response(occasions)))
}

#[axum::debug_handler]
pub async fn gift_recommendations(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let user = User::find_by_id(&state.pool, &claims.sub)
        .await?
        .ok_or_else(|| AppError::NotFound("用户不存在".to_string()))?;

    let recommendations = recommend_gifts(user.favorite_category.as_deref());
    Ok((
        StatusCode::OK,
        success_to_api_response(GiftRecommendationsResponse {
            favorite_category: user.favorite_category,
            recommendations,
        }),
    ))
}
