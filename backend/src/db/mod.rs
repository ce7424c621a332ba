pub mod dynamodb_repository;
pub mod models;

use futures::future::BoxFuture;
use shared::ProviderKind;
use uuid::Uuid;

use crate::geo::BoundingBox;
use models::{GeolocationRecord, PredictionRecord, ProviderRecord, User};

pub use dynamodb_repository::DynamoDbRepository;

/// Store failures. Absence of a row is not an error; lookups return `Option`.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("DynamoDB error: {0}")]
    DynamoDb(String),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Invalid data format: {0}")]
    InvalidData(String),
}

pub type StoreFuture<'a, T> = BoxFuture<'a, Result<T, RepositoryError>>;

pub trait PredictionLog: Send + Sync {
    fn append<'a>(&'a self, record: &'a PredictionRecord) -> StoreFuture<'a, ()>;
}

pub trait ProviderStore: Send + Sync {
    fn insert<'a>(&'a self, record: &'a ProviderRecord) -> StoreFuture<'a, ()>;

    /// Every provider of `kind` whose position lies inside `area`.
    fn within(&self, kind: ProviderKind, area: BoundingBox) -> StoreFuture<'_, Vec<ProviderRecord>>;
}

pub trait GeolocationStore: Send + Sync {
    fn insert<'a>(&'a self, record: &'a GeolocationRecord) -> StoreFuture<'a, ()>;
    fn find<'a>(
        &'a self,
        county: &'a str,
        town: &'a str,
    ) -> StoreFuture<'a, Option<GeolocationRecord>>;

    /// Distinct county names, sorted.
    fn counties(&self) -> StoreFuture<'_, Vec<String>>;

    /// Distinct town names within `county`, sorted.
    fn towns<'a>(&'a self, county: &'a str) -> StoreFuture<'a, Vec<String>>;
}

pub trait UserStore: Send + Sync {
    fn insert<'a>(&'a self, user: &'a User) -> StoreFuture<'a, ()>;
    fn update<'a>(&'a self, user: &'a User) -> StoreFuture<'a, ()>;
    fn find_by_id(&self, id: Uuid) -> StoreFuture<'_, Option<User>>;
    fn find_by_email<'a>(&'a self, email: &'a str) -> StoreFuture<'a, Option<User>>;
    fn find_by_phone<'a>(&'a self, phone_number: &'a str) -> StoreFuture<'a, Option<User>>;
    fn find_by_verification_token<'a>(&'a self, token: &'a str) -> StoreFuture<'a, Option<User>>;
    fn find_by_reset_token<'a>(&'a self, token: &'a str) -> StoreFuture<'a, Option<User>>;
}
