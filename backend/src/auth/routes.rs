use actix_web::{HttpResponse, web};

use super::middleware::AuthenticatedUser;
use super::models::{
    LoginRequest, MessageResponse, NewPasswordRequest, PhoneStartRequest, PhoneVerifyRequest,
    RegisterRequest, ResetRequest,
};
use crate::error::ApiError;
use crate::state::AppState;

pub async fn register(
    state: web::Data<AppState>,
    body: web::Json<RegisterRequest>,
) -> Result<HttpResponse, ApiError> {
    state.auth.register(body.into_inner()).await?;
    Ok(HttpResponse::Created().json(MessageResponse::new(
        "User registered. Check email to verify account.",
    )))
}

pub async fn verify_email(
    state: web::Data<AppState>,
    token: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    state.auth.verify_email(&token).await?;
    Ok(HttpResponse::Ok().json(MessageResponse::new("Email verified. You can now log in.")))
}

pub async fn login(
    state: web::Data<AppState>,
    body: web::Json<LoginRequest>,
) -> Result<HttpResponse, ApiError> {
    let response = state.auth.login(body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(response))
}

pub async fn request_reset(
    state: web::Data<AppState>,
    body: web::Json<ResetRequest>,
) -> Result<HttpResponse, ApiError> {
    state.auth.request_password_reset(body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(MessageResponse::new("Password reset email sent.")))
}

pub async fn reset_password(
    state: web::Data<AppState>,
    token: web::Path<String>,
    body: web::Json<NewPasswordRequest>,
) -> Result<HttpResponse, ApiError> {
    state.auth.reset_password(&token, body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(MessageResponse::new(
        "Password successfully reset. You can now log in.",
    )))
}

pub async fn me(
    user: AuthenticatedUser,
    state: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    log::info!("/auth/me endpoint called for user ID: {}", user.0);
    let profile = state.auth.current_user(user.0).await?;
    Ok(HttpResponse::Ok().json(profile))
}

pub async fn start_phone_verification(
    state: web::Data<AppState>,
    body: web::Json<PhoneStartRequest>,
) -> Result<HttpResponse, ApiError> {
    let phone_number = state.auth.start_phone_verification(body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(MessageResponse::new(format!(
        "Verification code sent to {}",
        phone_number
    ))))
}

pub async fn confirm_phone(
    state: web::Data<AppState>,
    body: web::Json<PhoneVerifyRequest>,
) -> Result<HttpResponse, ApiError> {
    let response = state.auth.confirm_phone(body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(response))
}
