use super::models::Claims;
use crate::db::models::User;
use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use jsonwebtoken::errors::ErrorKind;

#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    #[error("JWT encoding error: {0}")]
    Encoding(#[from] jsonwebtoken::errors::Error),
    #[error("JWT decoding error: {0}")]
    Decoding(String),
    #[error("Invalid token")]
    InvalidToken,
    #[error("Token expired")]
    TokenExpired,
}

#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl JwtService {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_ref()),
            decoding_key: DecodingKey::from_secret(secret.as_ref()),
        }
    }

    pub fn generate_token(&self, user: &User) -> Result<String, JwtError> {
        let now = Utc::now();
        let expiration = now + Duration::hours(24);

        let claims = Claims {
            sub: user.id.to_string(),
            email: user.email.clone().unwrap_or_default(),
            name: user.first_name.clone(),
            exp: expiration.timestamp() as usize,
            iat: now.timestamp() as usize,
        };

        let header = Header::new(Algorithm::HS256);
        encode(&header, &claims, &self.encoding_key).map_err(JwtError::Encoding)
    }

    pub fn verify_token(&self, token: &str) -> Result<Claims, JwtError> {
        if token.is_empty() || token.split('.').count() != 3 {
            return Err(JwtError::InvalidToken);
        }

        let validation = Validation::new(Algorithm::HS256);

        match decode::<Claims>(token, &self.decoding_key, &validation) {
            Ok(token_data) => {
                let now = Utc::now().timestamp() as usize;
                log::debug!(
                    "JWT token decoded. User: {}, Exp: {}, Now: {}",
                    token_data.claims.sub,
                    token_data.claims.exp,
                    now
                );

                if token_data.claims.exp < now {
                    log::warn!("JWT token expired. Exp: {}, Now: {}", token_data.claims.exp, now);
                    return Err(JwtError::TokenExpired);
                }
                Ok(token_data.claims)
            }
            Err(err) => {
                log::warn!("JWT token decode error: {:?}", err);
                match err.kind() {
                    ErrorKind::ExpiredSignature => Err(JwtError::TokenExpired),
                    ErrorKind::InvalidToken | ErrorKind::InvalidSignature => {
                        Err(JwtError::InvalidToken)
                    }
                    _ => Err(JwtError::Decoding(err.to_string())),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn user() -> User {
        User {
            id: Uuid::new_v4(),
            first_name: "Amina".into(),
            last_name: "Mwangi".into(),
            username: "amina".into(),
            email: Some("amina@example.com".into()),
            phone_number: None,
            password_hash: None,
            is_verified: true,
            verification_token: None,
            token_expiry: None,
            reset_token: None,
            reset_expiry: None,
            created_at: Utc::now(),
            last_login: None,
        }
    }

    #[test]
    fn issued_token_verifies() {
        let service = JwtService::new("test-secret");
        let user = user();
        let token = service.generate_token(&user).unwrap();
        let claims = service.verify_token(&token).unwrap();
        assert_eq!(claims.sub, user.id.to_string());
        assert_eq!(claims.email, "amina@example.com");
        assert_eq!(claims.name, "Amina");
    }

    #[test]
    fn token_from_other_secret_is_rejected() {
        let token = JwtService::new("one").generate_token(&user()).unwrap();
        assert!(matches!(
            JwtService::new("two").verify_token(&token),
            Err(JwtError::InvalidToken)
        ));
        assert!(matches!(
            JwtService::new("one").verify_token("not-a-jwt"),
            Err(JwtError::InvalidToken)
        ));
    }
}
