#![allow(dead_code)]

use actix_web::web;
use futures::future::BoxFuture;
use serde_json::{Value, json};
use shared::ProviderKind;
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use crophealth_backend::auth::AuthService;
use crophealth_backend::auth::jwt::JwtService;
use crophealth_backend::auth::mailer::{MailError, Mailer, OutgoingEmail};
use crophealth_backend::auth::middleware::AuthMiddleware;
use crophealth_backend::auth::password;
use crophealth_backend::auth::phone::{PhoneVerificationError, PhoneVerifier};
use crophealth_backend::db::models::{
    GeolocationRecord, PredictionRecord, ProviderProfile, ProviderRecord, User,
};
use crophealth_backend::db::{
    GeolocationStore, PredictionLog, ProviderStore, RepositoryError, StoreFuture, UserStore,
};
use crophealth_backend::geo::{BoundingBox, GeoPoint};
use crophealth_backend::inference::{
    ClassificationResponse, Classifier, InferenceError, InferenceResult,
};
use crophealth_backend::pipeline::UploadPipeline;
use crophealth_backend::proximity::ProximityFinder;
use crophealth_backend::registry::ProviderRegistry;
use crophealth_backend::state::AppState;
use crophealth_backend::storage::{FileStore, StorageError, unique_name, validate_image_size};
use crophealth_backend::treatments::TreatmentCatalog;

pub const BASE_URL: &str = "http://test.local";
pub const JWT_SECRET: &str = "test-secret";
pub const VALID_CODE: &str = "123456";
pub const EXPIRED_CODE: &str = "000000";

/// Image bytes the fake classifier refuses.
pub const BROKEN_IMAGE: &[u8] = b"broken-image";

/// Answers every image with the same canned gateway payload.
pub struct FakeClassifier {
    response: Mutex<Value>,
    calls: AtomicUsize,
}

impl FakeClassifier {
    pub fn new(response: Value) -> Self {
        Self {
            response: Mutex::new(response),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn predicting(disease: &str, confidence: f64) -> Self {
        Self::new(json!({
            "predictions": [{"class": disease, "confidence": confidence}]
        }))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Classifier for FakeClassifier {
    fn classify<'a>(
        &'a self,
        image: &'a [u8],
    ) -> BoxFuture<'a, Result<InferenceResult, InferenceError>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let response = self.response.lock().unwrap().clone();
        Box::pin(async move {
            if image == BROKEN_IMAGE {
                return Err(InferenceError::Status {
                    status: 500,
                    body: "model crashed".to_string(),
                });
            }
            serde_json::from_value::<ClassificationResponse>(response)
                .map_err(|e| InferenceError::UnrecognizedShape(e.to_string()))?
                .into_result()
        })
    }
}

#[derive(Default)]
pub struct MemoryFileStore {
    saved: Mutex<Vec<String>>,
    largest: AtomicUsize,
}

impl MemoryFileStore {
    pub fn saved(&self) -> Vec<String> {
        self.saved.lock().unwrap().clone()
    }

    /// Size of the biggest buffer ever handed to `save`.
    pub fn largest(&self) -> usize {
        self.largest.load(Ordering::SeqCst)
    }
}

impl FileStore for MemoryFileStore {
    fn save<'a>(
        &'a self,
        filename: &'a str,
        data: &'a [u8],
    ) -> BoxFuture<'a, Result<String, StorageError>> {
        Box::pin(async move {
            self.largest.fetch_max(data.len(), Ordering::SeqCst);
            validate_image_size(data)?;
            let key = format!("memory://{}", unique_name(filename));
            self.saved.lock().unwrap().push(key.clone());
            Ok(key)
        })
    }
}

#[derive(Default)]
struct Tables {
    providers: Vec<ProviderRecord>,
    locations: Vec<GeolocationRecord>,
    predictions: Vec<PredictionRecord>,
    users: Vec<User>,
}

/// Every store trait over in-process vectors, with switches to simulate outages.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    pub fail_providers: AtomicBool,
    pub fail_predictions: AtomicBool,
}

fn unavailable() -> RepositoryError {
    RepositoryError::DynamoDb("service unavailable".to_string())
}

impl MemoryStore {
    pub fn add_location(&self, county: &str, town: &str, latitude: f64, longitude: f64) {
        self.tables.lock().unwrap().locations.push(GeolocationRecord {
            county: county.to_string(),
            town: town.to_string(),
            location: GeoPoint::new(latitude, longitude).unwrap(),
        });
    }

    pub fn add_agrovet(&self, name: &str, latitude: f64, longitude: f64) -> ProviderRecord {
        self.add_provider(
            ProviderProfile::Agrovet {
                name: name.to_string(),
            },
            latitude,
            longitude,
        )
    }

    pub fn add_worker(
        &self,
        name: &str,
        services: &[&str],
        latitude: f64,
        longitude: f64,
    ) -> ProviderRecord {
        let (first_name, last_name) = name.split_once(' ').unwrap_or((name, ""));
        self.add_provider(
            ProviderProfile::ExtensionWorker {
                first_name: first_name.to_string(),
                last_name: last_name.to_string(),
                services: services.iter().map(|s| s.to_string()).collect::<BTreeSet<_>>(),
            },
            latitude,
            longitude,
        )
    }

    fn add_provider(
        &self,
        profile: ProviderProfile,
        latitude: f64,
        longitude: f64,
    ) -> ProviderRecord {
        let record = ProviderRecord::new(
            profile,
            "Nairobi".to_string(),
            "Westlands".to_string(),
            GeoPoint::new(latitude, longitude).unwrap(),
            "0700000000".to_string(),
        );
        self.tables.lock().unwrap().providers.push(record.clone());
        record
    }

    pub fn providers(&self) -> Vec<ProviderRecord> {
        self.tables.lock().unwrap().providers.clone()
    }

    pub fn predictions(&self) -> Vec<PredictionRecord> {
        self.tables.lock().unwrap().predictions.clone()
    }

    pub fn users(&self) -> Vec<User> {
        self.tables.lock().unwrap().users.clone()
    }

    pub fn user_by_email(&self, email: &str) -> Option<User> {
        self.find_user(|u| u.email.as_deref() == Some(email))
    }

    pub fn put_user(&self, user: User) {
        let mut tables = self.tables.lock().unwrap();
        tables.users.retain(|u| u.id != user.id);
        tables.users.push(user);
    }

    fn find_user(&self, predicate: impl Fn(&User) -> bool) -> Option<User> {
        self.tables
            .lock()
            .unwrap()
            .users
            .iter()
            .find(|u| predicate(u))
            .cloned()
    }
}

impl PredictionLog for MemoryStore {
    fn append<'a>(&'a self, record: &'a PredictionRecord) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            if self.fail_predictions.load(Ordering::SeqCst) {
                return Err(unavailable());
            }
            self.tables.lock().unwrap().predictions.push(record.clone());
            Ok(())
        })
    }
}

impl ProviderStore for MemoryStore {
    fn insert<'a>(&'a self, record: &'a ProviderRecord) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            if self.fail_providers.load(Ordering::SeqCst) {
                return Err(unavailable());
            }
            self.tables.lock().unwrap().providers.push(record.clone());
            Ok(())
        })
    }

    fn within(
        &self,
        kind: ProviderKind,
        area: BoundingBox,
    ) -> StoreFuture<'_, Vec<ProviderRecord>> {
        Box::pin(async move {
            if self.fail_providers.load(Ordering::SeqCst) {
                return Err(unavailable());
            }
            Ok(self
                .tables
                .lock()
                .unwrap()
                .providers
                .iter()
                .filter(|p| p.kind() == kind && area.contains(&p.location))
                .cloned()
                .collect())
        })
    }
}

impl GeolocationStore for MemoryStore {
    fn insert<'a>(&'a self, record: &'a GeolocationRecord) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            self.tables.lock().unwrap().locations.push(record.clone());
            Ok(())
        })
    }

    fn find<'a>(
        &'a self,
        county: &'a str,
        town: &'a str,
    ) -> StoreFuture<'a, Option<GeolocationRecord>> {
        Box::pin(async move {
            Ok(self
                .tables
                .lock()
                .unwrap()
                .locations
                .iter()
                .find(|l| l.county == county && l.town == town)
                .cloned())
        })
    }

    fn counties(&self) -> StoreFuture<'_, Vec<String>> {
        Box::pin(async move {
            let counties: BTreeSet<String> = self
                .tables
                .lock()
                .unwrap()
                .locations
                .iter()
                .map(|l| l.county.clone())
                .collect();
            Ok(counties.into_iter().collect())
        })
    }

    fn towns<'a>(&'a self, county: &'a str) -> StoreFuture<'a, Vec<String>> {
        Box::pin(async move {
            let towns: BTreeSet<String> = self
                .tables
                .lock()
                .unwrap()
                .locations
                .iter()
                .filter(|l| l.county == county)
                .map(|l| l.town.clone())
                .collect();
            Ok(towns.into_iter().collect())
        })
    }
}

impl UserStore for MemoryStore {
    fn insert<'a>(&'a self, user: &'a User) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            let mut tables = self.tables.lock().unwrap();
            if tables.users.iter().any(|u| u.id == user.id) {
                return Err(RepositoryError::DynamoDb("conditional check failed".to_string()));
            }
            tables.users.push(user.clone());
            Ok(())
        })
    }

    fn update<'a>(&'a self, user: &'a User) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            self.put_user(user.clone());
            Ok(())
        })
    }

    fn find_by_id(&self, id: Uuid) -> StoreFuture<'_, Option<User>> {
        Box::pin(async move { Ok(self.find_user(|u| u.id == id)) })
    }

    fn find_by_email<'a>(&'a self, email: &'a str) -> StoreFuture<'a, Option<User>> {
        Box::pin(async move { Ok(self.user_by_email(email)) })
    }

    fn find_by_phone<'a>(&'a self, phone_number: &'a str) -> StoreFuture<'a, Option<User>> {
        Box::pin(async move {
            Ok(self.find_user(|u| u.phone_number.as_deref() == Some(phone_number)))
        })
    }

    fn find_by_verification_token<'a>(&'a self, token: &'a str) -> StoreFuture<'a, Option<User>> {
        Box::pin(async move {
            Ok(self.find_user(|u| u.verification_token.as_deref() == Some(token)))
        })
    }

    fn find_by_reset_token<'a>(&'a self, token: &'a str) -> StoreFuture<'a, Option<User>> {
        Box::pin(async move { Ok(self.find_user(|u| u.reset_token.as_deref() == Some(token))) })
    }
}

#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<OutgoingEmail>>,
    pub fail: AtomicBool,
}

impl RecordingMailer {
    pub fn sent(&self) -> Vec<OutgoingEmail> {
        self.sent.lock().unwrap().clone()
    }
}

impl Mailer for RecordingMailer {
    fn send(&self, email: OutgoingEmail) -> BoxFuture<'_, Result<(), MailError>> {
        Box::pin(async move {
            if self.fail.load(Ordering::SeqCst) {
                return Err(MailError::NoSender);
            }
            self.sent.lock().unwrap().push(email);
            Ok(())
        })
    }
}

#[derive(Default)]
pub struct FakePhoneVerifier {
    started: Mutex<Vec<String>>,
}

impl FakePhoneVerifier {
    pub fn started(&self) -> Vec<String> {
        self.started.lock().unwrap().clone()
    }
}

impl PhoneVerifier for FakePhoneVerifier {
    fn start<'a>(
        &'a self,
        phone_number: &'a str,
    ) -> BoxFuture<'a, Result<(), PhoneVerificationError>> {
        Box::pin(async move {
            self.started.lock().unwrap().push(phone_number.to_string());
            Ok(())
        })
    }

    fn confirm<'a>(
        &'a self,
        _phone_number: &'a str,
        code: &'a str,
    ) -> BoxFuture<'a, Result<(), PhoneVerificationError>> {
        Box::pin(async move {
            match code {
                VALID_CODE => Ok(()),
                EXPIRED_CODE => Err(PhoneVerificationError::ExpiredCode),
                _ => Err(PhoneVerificationError::InvalidCode),
            }
        })
    }
}

/// Fakes wired together the way `main` wires the real collaborators.
pub struct TestContext {
    pub store: Arc<MemoryStore>,
    pub files: Arc<MemoryFileStore>,
    pub classifier: Arc<FakeClassifier>,
    pub mailer: Arc<RecordingMailer>,
    pub phone: Option<Arc<FakePhoneVerifier>>,
}

impl TestContext {
    pub fn new() -> Self {
        Self::with_classifier(FakeClassifier::predicting("Common_Rust", 0.87))
    }

    pub fn with_classifier(classifier: FakeClassifier) -> Self {
        Self {
            store: Arc::new(MemoryStore::default()),
            files: Arc::new(MemoryFileStore::default()),
            classifier: Arc::new(classifier),
            mailer: Arc::new(RecordingMailer::default()),
            phone: Some(Arc::new(FakePhoneVerifier::default())),
        }
    }

    pub fn without_phone(mut self) -> Self {
        self.phone = None;
        self
    }

    pub fn proximity(&self) -> ProximityFinder {
        ProximityFinder::new(self.store.clone(), 10.0, 5)
    }

    pub fn pipeline(&self) -> UploadPipeline {
        UploadPipeline::new(
            self.classifier.clone(),
            Arc::new(catalog()),
            self.proximity(),
            self.files.clone(),
            self.store.clone(),
            BASE_URL.to_string(),
        )
    }

    pub fn registry(&self) -> ProviderRegistry {
        ProviderRegistry::new(self.store.clone(), self.store.clone())
    }

    pub fn auth(&self) -> AuthService {
        let phone = self
            .phone
            .clone()
            .map(|phone| phone as Arc<dyn PhoneVerifier>);
        AuthService::new(
            self.store.clone(),
            self.mailer.clone(),
            JwtService::new(JWT_SECRET),
            phone,
            BASE_URL,
        )
        .with_password_iterations(1_000)
    }

    pub fn auth_middleware(&self) -> AuthMiddleware {
        AuthMiddleware::new(JwtService::new(JWT_SECRET))
    }

    pub fn state(&self) -> web::Data<AppState> {
        web::Data::new(AppState {
            base_url: BASE_URL.to_string(),
            pipeline: self.pipeline(),
            proximity: self.proximity(),
            catalog: Arc::new(catalog()),
            registry: self.registry(),
            auth: Arc::new(self.auth()),
        })
    }
}

pub fn catalog() -> TreatmentCatalog {
    TreatmentCatalog::builtin().expect("built-in catalog parses")
}

/// Service under test, configured with the full route table.
#[allow(unused_macros)]
macro_rules! test_app {
    ($ctx:expr) => {
        actix_web::test::init_service(actix_web::App::new().app_data($ctx.state()).configure(
            |cfg| {
                crophealth_backend::routes::configure_routes(
                    cfg,
                    "static".to_string(),
                    $ctx.auth_middleware(),
                )
            },
        ))
        .await
    };
}

pub enum Part<'a> {
    File { filename: &'a str, data: &'a [u8] },
    Text { name: &'a str, value: &'a str },
}

const BOUNDARY: &str = "----crophealth-test-boundary";

/// A `multipart/form-data` body and its content type.
pub fn multipart(parts: &[Part<'_>]) -> (String, Vec<u8>) {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        match part {
            Part::File { filename, data } => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"files\"; filename=\"{}\"\r\n\
                         Content-Type: application/octet-stream\r\n\r\n",
                        filename
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(data);
            }
            Part::Text { name, value } => {
                let header = format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name);
                body.extend_from_slice(header.as_bytes());
                body.extend_from_slice(value.as_bytes());
            }
        }
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    (format!("multipart/form-data; boundary={}", BOUNDARY), body)
}

pub fn verified_user(email: &str, password: &str) -> User {
    User {
        id: Uuid::new_v4(),
        first_name: "Wanjiku".to_string(),
        last_name: "Kamau".to_string(),
        username: "wanjiku".to_string(),
        email: Some(email.to_string()),
        phone_number: None,
        password_hash: Some(password::hash_password(password, 1_000).unwrap()),
        is_verified: true,
        verification_token: None,
        token_expiry: None,
        reset_token: None,
        reset_expiry: None,
        created_at: chrono::Utc::now(),
        last_login: None,
    }
}

pub fn json_body(bytes: &[u8]) -> Value {
    serde_json::from_slice(bytes).expect("response body is JSON")
}

pub fn by_id(records: &[ProviderRecord]) -> HashMap<String, ProviderRecord> {
    records.iter().map(|r| (r.id.to_string(), r.clone())).collect()
}
