pub mod jwt;
pub mod mailer;
pub mod middleware;
pub mod models;
pub mod password;
pub mod phone;
pub mod routes;
pub mod service;

pub use service::{AuthError, AuthService};
