use chrono::{Duration, Utc};
use std::sync::Arc;
use uuid::Uuid;

use super::jwt::{JwtError, JwtService};
use super::mailer::{Mailer, password_reset_email, verification_email};
use super::models::{
    AuthUser, LoginRequest, LoginResponse, NewPasswordRequest, PhoneStartRequest,
    PhoneVerifyRequest, RegisterRequest, ResetRequest,
};
use super::password::{self, PasswordError};
use super::phone::{PhoneVerificationError, PhoneVerifier, normalize_phone_number};
use crate::db::models::User;
use crate::db::{RepositoryError, UserStore};

const VERIFICATION_TTL_HOURS: i64 = 24;
const RESET_TTL_HOURS: i64 = 1;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("{0}")]
    Missing(&'static str),
    #[error("Email already registered")]
    EmailTaken,
    #[error("Invalid email or password")]
    InvalidCredentials,
    #[error("Email not verified. Please check your inbox.")]
    NotVerified,
    #[error("Invalid or expired token")]
    InvalidToken,
    #[error("{0}")]
    TokenExpired(&'static str),
    #[error("Email not found")]
    EmailNotFound,
    #[error("User not found")]
    UserNotFound,
    #[error("Phone verification is not configured")]
    PhoneUnavailable,
    #[error(transparent)]
    Phone(#[from] PhoneVerificationError),
    #[error(transparent)]
    Password(#[from] PasswordError),
    #[error(transparent)]
    Jwt(#[from] JwtError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

fn present(value: Option<String>, message: &'static str) -> Result<String, AuthError> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or(AuthError::Missing(message))
}

/// Email/password accounts, reset flow and phone sign-in.
pub struct AuthService {
    users: Arc<dyn UserStore>,
    mailer: Arc<dyn Mailer>,
    jwt: JwtService,
    phone: Option<Arc<dyn PhoneVerifier>>,
    base_url: String,
    password_iterations: u32,
}

impl AuthService {
    pub fn new(
        users: Arc<dyn UserStore>,
        mailer: Arc<dyn Mailer>,
        jwt: JwtService,
        phone: Option<Arc<dyn PhoneVerifier>>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            users,
            mailer,
            jwt,
            phone,
            base_url: base_url.into(),
            password_iterations: password::DEFAULT_ITERATIONS,
        }
    }

    pub fn with_password_iterations(mut self, iterations: u32) -> Self {
        self.password_iterations = iterations.max(1);
        self
    }

    pub async fn register(&self, request: RegisterRequest) -> Result<(), AuthError> {
        const MISSING: &str = "Missing fields";
        let first_name = present(request.first_name, MISSING)?;
        let last_name = present(request.last_name, MISSING)?;
        let username = present(request.username, MISSING)?;
        let email = present(request.email, MISSING)?;
        let password = request
            .password
            .filter(|p| !p.is_empty())
            .ok_or(AuthError::Missing(MISSING))?;

        if self.users.find_by_email(&email).await?.is_some() {
            return Err(AuthError::EmailTaken);
        }

        let password_hash = password::hash_in_background(password, self.password_iterations).await?;
        let token = Uuid::new_v4().to_string();
        let user = User {
            id: Uuid::new_v4(),
            first_name,
            last_name,
            username,
            email: Some(email.clone()),
            phone_number: None,
            password_hash: Some(password_hash),
            is_verified: false,
            verification_token: Some(token.clone()),
            token_expiry: Some(Utc::now() + Duration::hours(VERIFICATION_TTL_HOURS)),
            reset_token: None,
            reset_expiry: None,
            created_at: Utc::now(),
            last_login: None,
        };
        self.users.insert(&user).await?;
        log::info!("Registered user {} ({})", user.id, email);

        let link = format!("{}/auth/verify/{}", self.base_url, token);
        if let Err(e) = self.mailer.send(verification_email(&email, &link)).await {
            log::error!("Verification email to {} failed: {}", email, e);
        }
        Ok(())
    }

    pub async fn verify_email(&self, token: &str) -> Result<(), AuthError> {
        let mut user = self
            .users
            .find_by_verification_token(token)
            .await?
            .ok_or(AuthError::InvalidToken)?;

        if user.token_expiry.is_some_and(|expiry| Utc::now() > expiry) {
            return Err(AuthError::TokenExpired("Verification token expired. Register again."));
        }

        user.is_verified = true;
        user.verification_token = None;
        user.token_expiry = None;
        self.users.update(&user).await?;
        log::info!("Email verified for user {}", user.id);
        Ok(())
    }

    pub async fn login(&self, request: LoginRequest) -> Result<LoginResponse, AuthError> {
        const MISSING: &str = "Email and password are required";
        let email = present(request.email, MISSING)?;
        let password = request
            .password
            .filter(|p| !p.is_empty())
            .ok_or(AuthError::Missing(MISSING))?;

        let mut user = self
            .users
            .find_by_email(&email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;
        let hash = user.password_hash.clone().ok_or(AuthError::InvalidCredentials)?;
        if !password::verify_in_background(password, hash).await? {
            return Err(AuthError::InvalidCredentials);
        }
        if !user.is_verified {
            return Err(AuthError::NotVerified);
        }

        user.update_last_login();
        if let Err(e) = self.users.update(&user).await {
            log::warn!("Could not record last login for {}: {}", user.id, e);
        }

        Ok(LoginResponse {
            message: "Login successful".to_string(),
            token: self.jwt.generate_token(&user)?,
            first_name: user.first_name,
        })
    }

    pub async fn request_password_reset(&self, request: ResetRequest) -> Result<(), AuthError> {
        let email = present(request.email, "Email is required")?;
        let mut user = self
            .users
            .find_by_email(&email)
            .await?
            .ok_or(AuthError::EmailNotFound)?;

        let token = Uuid::new_v4().to_string();
        user.reset_token = Some(token.clone());
        user.reset_expiry = Some(Utc::now() + Duration::hours(RESET_TTL_HOURS));
        self.users.update(&user).await?;

        let link = format!("{}/auth/reset-password/{}", self.base_url, token);
        if let Err(e) = self.mailer.send(password_reset_email(&email, &link)).await {
            log::error!("Password reset email to {} failed: {}", email, e);
        }
        Ok(())
    }

    pub async fn reset_password(
        &self,
        token: &str,
        request: NewPasswordRequest,
    ) -> Result<(), AuthError> {
        let new_password = request
            .new_password
            .filter(|p| !p.is_empty())
            .ok_or(AuthError::Missing("New password is required"))?;

        let mut user = self
            .users
            .find_by_reset_token(token)
            .await?
            .ok_or(AuthError::InvalidToken)?;
        if user.reset_expiry.is_none_or(|expiry| Utc::now() > expiry) {
            return Err(AuthError::TokenExpired("Reset token expired. Request a new one."));
        }

        user.password_hash =
            Some(password::hash_in_background(new_password, self.password_iterations).await?);
        user.reset_token = None;
        user.reset_expiry = None;
        self.users.update(&user).await?;
        log::info!("Password reset for user {}", user.id);
        Ok(())
    }

    pub async fn current_user(&self, id: Uuid) -> Result<AuthUser, AuthError> {
        self.users
            .find_by_id(id)
            .await?
            .map(AuthUser::from)
            .ok_or(AuthError::UserNotFound)
    }

    fn phone_verifier(&self) -> Result<&Arc<dyn PhoneVerifier>, AuthError> {
        self.phone.as_ref().ok_or(AuthError::PhoneUnavailable)
    }

    pub async fn start_phone_verification(
        &self,
        request: PhoneStartRequest,
    ) -> Result<String, AuthError> {
        let verifier = self.phone_verifier()?;
        let raw = present(request.phone_number, "Phone number is required")?;
        let phone_number = normalize_phone_number(&raw)?;
        verifier.start(&phone_number).await?;
        Ok(phone_number)
    }

    /// Confirms the code and signs the owner of the number in, creating the account on first use.
    pub async fn confirm_phone(
        &self,
        request: PhoneVerifyRequest,
    ) -> Result<LoginResponse, AuthError> {
        let verifier = self.phone_verifier()?;
        let raw = present(request.phone_number, "Phone number and code are required")?;
        let code = present(request.code, "Phone number and code are required")?;
        let phone_number = normalize_phone_number(&raw)?;

        verifier.confirm(&phone_number, &code).await?;

        let user = match self.users.find_by_phone(&phone_number).await? {
            Some(mut user) => {
                user.is_verified = true;
                user.update_last_login();
                self.users.update(&user).await?;
                user
            }
            None => {
                let mut user = User {
                    id: Uuid::new_v4(),
                    first_name: String::new(),
                    last_name: String::new(),
                    username: phone_number.clone(),
                    email: None,
                    phone_number: Some(phone_number.clone()),
                    password_hash: None,
                    is_verified: true,
                    verification_token: None,
                    token_expiry: None,
                    reset_token: None,
                    reset_expiry: None,
                    created_at: Utc::now(),
                    last_login: None,
                };
                user.update_last_login();
                self.users.insert(&user).await?;
                log::info!("Created phone account {} for {}", user.id, phone_number);
                user
            }
        };

        Ok(LoginResponse {
            message: "Phone number verified".to_string(),
            token: self.jwt.generate_token(&user)?,
            first_name: user.first_name,
        })
    }
}
