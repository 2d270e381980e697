use std::collections::HashMap;

use axum::{
    extract::{Extension, Json, State},
    http::StatusCode,
    response::IntoResponse,
};

use crate::{
    AppState,
    error::AppError,
    utils::{Claims, generate_token, success_to_api_response},
};

use super::model::{
    CheckTokenResponse, LoginRequest, LoginResponse, RegisterRequest, RegisterResponse,
    UpdatePasswordRequest, UpdatePreferenceRequest, User,
};

fn validate_registration(req: &RegisterRequest) -> Result<(), AppError> {
    let mut field_errors = HashMap::new();

    // 用户ID只允许字母、数字和下划线
    if req.user_id.is_empty()
        || req.user_id.chars().count() > 50
        || !req.user_id.chars().all(|c| c.is_alphanumeric() || c == '_')
    {
        field_errors.insert(
            "user_id".to_string(),
            "用户ID格式无效，只允许使用字母、数字和下划线".to_string(),
        );
    }
    // 长度按字符数而不是字节数算，中文昵称不能被误判
    let nickname_chars = req.nickname.chars().count();
    if !(2..=24).contains(&nickname_chars) {
        field_errors.insert(
            "nickname".to_string(),
            "昵称长度必须在2到24个字符之间".to_string(),
        );
    }
    if !req.email.contains('@') || !req.email.contains('.') {
        field_errors.insert("email".to_string(), "邮箱格式无效".to_string());
    }
    let password_chars = req.password.chars().count();
    if !(6..=24).contains(&password_chars) {
        field_errors.insert(
            "password".to_string(),
            "密码长度必须在6到24个字符之间".to_string(),
        );
    }
    if req.password != req.confirm_password {
        field_errors.insert(
            "confirm_password".to_string(),
            "两次输入的密码不一致".to_string(),
        );
    }

    if field_errors.is_empty() {
        Ok(())
    } else {
        Err(AppError::Validation(field_errors))
    }
}

#[axum::debug_handler]
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    validate_registration(&req)?;

    let user = User::create(&state.pool, req).await.map_err(|e| {
        if let sqlx::Error::Database(db_err) = &e {
            if db_err.is_unique_violation() {
                let mut field_errors = HashMap::new();
                field_errors.insert("user_id".to_string(), "用户ID或邮箱已被注册".to_string());
                return AppError::Validation(field_errors);
            }
        }
        AppError::from(e)
    })?;

    let token = generate_token(&user.user_id, user.is_admin, &state.config)
        .map_err(|e| AppError::Internal(format!("Failed to generate token: {}", e)))?;

    Ok((
        StatusCode::CREATED,
        success_to_api_response(RegisterResponse {
            user_id: user.user_id,
            nickname: user.nickname,
            token,
        }),
    ))
}

#[axum::debug_handler]
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user = User::find_by_id(&state.pool, &req.user_id)
        .await?
        .ok_or(AppError::Unauthorized)?;

    // 验证密码
    match user.verify_login(&req.password) {
        Ok(true) => {}
        Ok(false) => return Err(AppError::Unauthorized),
        Err(e) => return Err(AppError::Internal(format!("Password check failed: {}", e))),
    }

    let token = generate_token(&user.user_id, user.is_admin, &state.config)
        .map_err(|e| AppError::Internal(format!("Failed to generate token: {}", e)))?;

    Ok((
        StatusCode::OK,
        success_to_api_response(LoginResponse {
            user_id: user.user_id,
            token,
        }),
    ))
}

#[axum::debug_handler]
pub async fn update_password(
    Extension(claims): Extension<Claims>,
    State(state): State<AppState>,
    Json(req): Json<UpdatePasswordRequest>,
) -> Result<impl IntoResponse, AppError> {
    let mut field_errors = HashMap::new();
    let password_chars = req.password.chars().count();
    if !(6..=24).contains(&password_chars) {
        field_errors.insert(
            "password".to_string(),
            "密码长度必须在6到24个字符之间".to_string(),
        );
    }
    if req.password != req.confirm_password {
        field_errors.insert(
            "confirm_password".to_string(),
            "两次输入的密码不一致".to_string(),
        );
    }
    if !field_errors.is_empty() {
        return Err(AppError::Validation(field_errors));
    }

    let user = User::update_password(&state.pool, &claims.sub, &req.password).await?;
    Ok((StatusCode::OK, success_to_api_response(user)))
}

#[axum::debug_handler]
pub async fn update_preference(
    Extension(claims): Extension<Claims>,
    State(state): State<AppState>,
    Json(req): Json<UpdatePreferenceRequest>,
) -> Result<impl IntoResponse, AppError> {
    if req.favorite_category.trim().is_empty() {
        let mut field_errors = HashMap::new();
        field_errors.insert(
            "favorite_category".to_string(),
            "请填写喜欢的礼物类别".to_string(),
        );
        return Err(AppError::Validation(field_errors));
    }

    let user =
        User::update_preference(&state.pool, &claims.sub, req.favorite_category.trim()).await?;
    Ok((StatusCode::OK, success_to_api_response(user)))
}

#[axum::debug_handler]
pub async fn settings(
    Extension(claims): Extension<Claims>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let settings = User::settings(&state.pool, &claims.sub)
        .await?
        .ok_or_else(|| AppError::NotFound("用户不存在".to_string()))?;

    Ok((StatusCode::OK, success_to_api_response(settings)))
}

/// 检查token是否有效，中间件已完成校验，这里直接回显
#[axum::debug_handler]
pub async fn check_token(
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    Ok((
        StatusCode::OK,
        success_to_api_response(CheckTokenResponse {
            user_id: claims.sub,
            is_admin: claims.is_admin,
        }),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(nickname: &str, password: &str) -> RegisterRequest {
        RegisterRequest {
            user_id: "xiaoming_01".to_string(),
            nickname: nickname.to_string(),
            email: "xiaoming@example.com".to_string(),
            password: password.to_string(),
            confirm_password: password.to_string(),
        }
    }

    #[test]
    fn chinese_nickname_counts_characters_not_bytes() {
        // 10个汉字=30字节，按字符数校验应当通过
        let req = request("我最亲爱的小明同学呀", "secret123");
        assert!(validate_registration(&req).is_ok());
    }

    #[test]
    fn chinese_password_counts_characters_not_bytes() {
        // 3个汉字=9字节，不足6个字符应当被拒
        let req = request("小明", "密码短");
        let err = validate_registration(&req).unwrap_err();
        match err {
            AppError::Validation(field_errors) => {
                assert!(field_errors.contains_key("password"));
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn short_nickname_is_rejected() {
        let req = request("明", "secret123");
        let err = validate_registration(&req).unwrap_err();
        match err {
            AppError::Validation(field_errors) => {
                assert!(field_errors.contains_key("nickname"));
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn mismatched_confirmation_is_rejected() {
        let mut req = request("小明", "secret123");
        req.confirm_password = "different".to_string();
        let err = validate_registration(&req).unwrap_err();
        match err {
            AppError::Validation(field_errors) => {
                assert!(field_errors.contains_key("confirm_password"));
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }
}
