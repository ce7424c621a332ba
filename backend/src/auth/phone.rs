use aws_sdk_cognitoidentityprovider::Client as CognitoClient;
use aws_sdk_cognitoidentityprovider::types::AttributeType;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use futures::future::BoxFuture;
use hmac::{Hmac, Mac};
use rand::Rng;
use rand::distr::Alphanumeric;
use sha2::Sha256;

use crate::config::CognitoConfig;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, thiserror::Error)]
pub enum PhoneVerificationError {
    #[error("Invalid phone number")]
    InvalidNumber,
    #[error("Invalid verification code")]
    InvalidCode,
    #[error("Verification code expired")]
    ExpiredCode,
    #[error("Identity provider error: {0}")]
    Provider(String),
}

/// Sends and checks one-time codes for a phone number.
pub trait PhoneVerifier: Send + Sync {
    fn start<'a>(
        &'a self,
        phone_number: &'a str,
    ) -> BoxFuture<'a, Result<(), PhoneVerificationError>>;
    fn confirm<'a>(
        &'a self,
        phone_number: &'a str,
        code: &'a str,
    ) -> BoxFuture<'a, Result<(), PhoneVerificationError>>;
}

/// Digits with an optional leading `+`; spaces, dashes and parentheses dropped.
pub fn normalize_phone_number(raw: &str) -> Result<String, PhoneVerificationError> {
    let compact: String = raw
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '(' | ')'))
        .collect();
    let digits = compact.strip_prefix('+').unwrap_or(&compact);
    if !(8..=15).contains(&digits.len()) || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(PhoneVerificationError::InvalidNumber);
    }
    Ok(format!("+{}", digits))
}

#[derive(Clone)]
pub struct CognitoPhoneVerifier {
    client: CognitoClient,
    client_id: String,
    client_secret: Option<String>,
}

impl CognitoPhoneVerifier {
    pub fn new(client: CognitoClient, config: &CognitoConfig) -> Self {
        Self {
            client,
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
        }
    }

    fn secret_hash(&self, username: &str) -> Result<Option<String>, PhoneVerificationError> {
        let Some(secret) = &self.client_secret else {
            return Ok(None);
        };
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
            .map_err(|e| PhoneVerificationError::Provider(e.to_string()))?;
        mac.update(username.as_bytes());
        mac.update(self.client_id.as_bytes());
        Ok(Some(BASE64.encode(mac.finalize().into_bytes())))
    }

    /// Sign-ups are code-only; the password is never shown to anyone.
    fn throwaway_password() -> String {
        let random: String = rand::rng()
            .sample_iter(&Alphanumeric)
            .take(24)
            .map(char::from)
            .collect();
        format!("{}aA1!", random)
    }

    async fn sign_up(&self, phone_number: &str) -> Result<(), PhoneVerificationError> {
        let attribute = AttributeType::builder()
            .name("phone_number")
            .value(phone_number)
            .build()
            .map_err(|e| PhoneVerificationError::Provider(e.to_string()))?;

        let result = self
            .client
            .sign_up()
            .client_id(&self.client_id)
            .username(phone_number)
            .password(Self::throwaway_password())
            .user_attributes(attribute)
            .set_secret_hash(self.secret_hash(phone_number)?)
            .send()
            .await;

        match result {
            Ok(_) => {
                log::info!("Verification code requested for new number {}", phone_number);
                Ok(())
            }
            Err(e)
                if e.as_service_error()
                    .map(|err| err.is_username_exists_exception())
                    .unwrap_or(false) =>
            {
                self.resend(phone_number).await
            }
            Err(e) => {
                log::error!("Cognito sign_up failed for {}: {:?}", phone_number, e);
                Err(PhoneVerificationError::Provider(e.to_string()))
            }
        }
    }

    async fn resend(&self, phone_number: &str) -> Result<(), PhoneVerificationError> {
        self.client
            .resend_confirmation_code()
            .client_id(&self.client_id)
            .username(phone_number)
            .set_secret_hash(self.secret_hash(phone_number)?)
            .send()
            .await
            .map_err(|e| {
                log::error!(
                    "Cognito resend_confirmation_code failed for {}: {:?}",
                    phone_number,
                    e
                );
                PhoneVerificationError::Provider(e.to_string())
            })?;
        log::info!("Verification code re-sent to {}", phone_number);
        Ok(())
    }

    async fn confirm_sign_up(
        &self,
        phone_number: &str,
        code: &str,
    ) -> Result<(), PhoneVerificationError> {
        let result = self
            .client
            .confirm_sign_up()
            .client_id(&self.client_id)
            .username(phone_number)
            .confirmation_code(code)
            .set_secret_hash(self.secret_hash(phone_number)?)
            .send()
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) => match e.as_service_error() {
                Some(err) if err.is_code_mismatch_exception() => {
                    Err(PhoneVerificationError::InvalidCode)
                }
                Some(err) if err.is_expired_code_exception() => {
                    Err(PhoneVerificationError::ExpiredCode)
                }
                _ => {
                    log::error!("Cognito confirm_sign_up failed for {}: {:?}", phone_number, e);
                    Err(PhoneVerificationError::Provider(e.to_string()))
                }
            },
        }
    }
}

impl PhoneVerifier for CognitoPhoneVerifier {
    fn start<'a>(
        &'a self,
        phone_number: &'a str,
    ) -> BoxFuture<'a, Result<(), PhoneVerificationError>> {
        Box::pin(self.sign_up(phone_number))
    }

    fn confirm<'a>(
        &'a self,
        phone_number: &'a str,
        code: &'a str,
    ) -> BoxFuture<'a, Result<(), PhoneVerificationError>> {
        Box::pin(self.confirm_sign_up(phone_number, code))
    }
}
