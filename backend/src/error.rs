use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use shared::ErrorResponse;

use crate::auth::AuthError;
use crate::auth::phone::PhoneVerificationError;
use crate::auth::password::PasswordError;
use crate::db::RepositoryError;
use crate::pipeline::UploadError;
use crate::registry::RegistrationError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Unavailable(String),
    #[error("Internal server error")]
    Internal(String),
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        if let ApiError::Internal(detail) = self {
            log::error!("Request failed: {}", detail);
        }
        HttpResponse::build(self.status_code()).json(ErrorResponse {
            error: self.to_string(),
        })
    }
}

impl From<UploadError> for ApiError {
    fn from(error: UploadError) -> Self {
        ApiError::BadRequest(error.to_string())
    }
}

impl From<RepositoryError> for ApiError {
    fn from(error: RepositoryError) -> Self {
        ApiError::Internal(error.to_string())
    }
}

impl From<RegistrationError> for ApiError {
    fn from(error: RegistrationError) -> Self {
        match error {
            RegistrationError::MissingField(_) | RegistrationError::InvalidCoordinate { .. } => {
                ApiError::BadRequest(error.to_string())
            }
            RegistrationError::LocationNotFound { .. } => ApiError::NotFound(error.to_string()),
            RegistrationError::Repository(inner) => inner.into(),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(error: AuthError) -> Self {
        match error {
            AuthError::Missing(_) | AuthError::InvalidToken | AuthError::TokenExpired(_) => {
                ApiError::BadRequest(error.to_string())
            }
            AuthError::EmailTaken => ApiError::Conflict(error.to_string()),
            AuthError::InvalidCredentials => ApiError::Unauthorized(error.to_string()),
            AuthError::NotVerified => ApiError::Forbidden(error.to_string()),
            AuthError::EmailNotFound | AuthError::UserNotFound => {
                ApiError::NotFound(error.to_string())
            }
            AuthError::PhoneUnavailable => ApiError::Unavailable(error.to_string()),
            AuthError::Phone(inner) => match inner {
                PhoneVerificationError::InvalidNumber
                | PhoneVerificationError::InvalidCode
                | PhoneVerificationError::ExpiredCode => ApiError::BadRequest(inner.to_string()),
                PhoneVerificationError::Provider(detail) => ApiError::Unavailable(format!(
                    "Phone verification failed: {}",
                    detail
                )),
            },
            AuthError::Password(PasswordError::Format) => {
                ApiError::Unauthorized(AuthError::InvalidCredentials.to_string())
            }
            AuthError::Password(inner) => ApiError::Internal(inner.to_string()),
            AuthError::Jwt(inner) => ApiError::Internal(inner.to_string()),
            AuthError::Repository(inner) => inner.into(),
        }
    }
}
