use actix_web::body::EitherBody;
use actix_web::dev::{Payload, Service, ServiceRequest, ServiceResponse, Transform, forward_ready};
use actix_web::http::header::AUTHORIZATION;
use actix_web::{Error, FromRequest, HttpMessage, HttpRequest, HttpResponse};
use futures::future::{LocalBoxFuture, Ready, ready};
use shared::ErrorResponse;
use std::rc::Rc;
use std::sync::Arc;
use uuid::Uuid;

use super::jwt::{JwtError, JwtService};
use crate::error::ApiError;

const UNAUTHORIZED: &str = "Missing or invalid authorization token";

/// Rejects requests without a valid bearer token. Wrap only the protected scope with it.
#[derive(Clone)]
pub struct AuthMiddleware {
    jwt: Arc<JwtService>,
}

impl AuthMiddleware {
    pub fn new(jwt: JwtService) -> Self {
        Self { jwt: Arc::new(jwt) }
    }
}

impl<S, B> Transform<S, ServiceRequest> for AuthMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Transform = BearerGuard<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(BearerGuard {
            service: Rc::new(service),
            jwt: self.jwt.clone(),
        }))
    }
}

pub struct BearerGuard<S> {
    service: Rc<S>,
    jwt: Arc<JwtService>,
}

#[derive(Debug, thiserror::Error)]
enum Rejection {
    #[error("no Authorization header")]
    Missing,
    #[error("Authorization header is not a Bearer token")]
    Malformed,
    #[error("token rejected: {0}")]
    Token(#[from] JwtError),
    #[error("subject '{0}' is not a user id")]
    Subject(String),
}

impl Rejection {
    fn body(&self) -> ErrorResponse {
        let error = match self {
            Rejection::Missing | Rejection::Malformed => UNAUTHORIZED,
            Rejection::Token(JwtError::TokenExpired) => "Token expired",
            Rejection::Token(_) => "Token verification failed",
            Rejection::Subject(_) => "Invalid token claims",
        };
        ErrorResponse {
            error: error.to_string(),
        }
    }
}

fn authenticate(req: &ServiceRequest, jwt: &JwtService) -> Result<Uuid, Rejection> {
    let header = req.headers().get(AUTHORIZATION).ok_or(Rejection::Missing)?;
    let token = header
        .to_str()
        .ok()
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or(Rejection::Malformed)?;

    let claims = jwt.verify_token(token)?;
    Uuid::parse_str(&claims.sub).map_err(|_| Rejection::Subject(claims.sub))
}

impl<S, B> Service<ServiceRequest> for BearerGuard<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();
        let jwt = self.jwt.clone();

        Box::pin(async move {
            match authenticate(&req, &jwt) {
                Ok(user_id) => {
                    req.extensions_mut().insert(user_id);
                    Ok(service.call(req).await?.map_into_left_body())
                }
                Err(rejection) => {
                    log::warn!("Unauthorized request to {}: {}", req.path(), rejection);
                    let response = HttpResponse::Unauthorized().json(rejection.body());
                    Ok(req.into_response(response).map_into_right_body())
                }
            }
        })
    }
}

/// Id of the caller, placed in the request extensions by [`AuthMiddleware`].
pub struct AuthenticatedUser(pub Uuid);

impl FromRequest for AuthenticatedUser {
    type Error = ApiError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let user = req.extensions().get::<Uuid>().copied().map(AuthenticatedUser);
        if user.is_none() {
            log::warn!("No authenticated user on request for {}", req.path());
        }
        ready(user.ok_or_else(|| ApiError::Unauthorized(UNAUTHORIZED.to_string())))
    }
}
