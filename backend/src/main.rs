use actix_cors::Cors;
use actix_web::{App, HttpServer, web};
use aws_config::BehaviorVersion;
use aws_sdk_cognitoidentityprovider::Client as CognitoClient;
use aws_sdk_dynamodb::Client as DynamoDbClient;
use aws_sdk_s3::Client as S3Client;
use std::env;
use std::io;
use std::sync::Arc;

use crophealth_backend::auth::AuthService;
use crophealth_backend::auth::jwt::JwtService;
use crophealth_backend::auth::mailer::SmtpMailer;
use crophealth_backend::auth::middleware::AuthMiddleware;
use crophealth_backend::auth::phone::{CognitoPhoneVerifier, PhoneVerifier};
use crophealth_backend::config::AppConfig;
use crophealth_backend::db::DynamoDbRepository;
use crophealth_backend::inference::RoboflowGateway;
use crophealth_backend::pipeline::UploadPipeline;
use crophealth_backend::proximity::ProximityFinder;
use crophealth_backend::registry::{ProviderRegistry, TownSeed};
use crophealth_backend::routes::configure_routes;
use crophealth_backend::state::AppState;
use crophealth_backend::storage::{FileStore, LocalFileStore, S3Service};
use crophealth_backend::treatments::TreatmentCatalog;

fn startup_error(context: &str, error: impl std::fmt::Display) -> io::Error {
    log::error!("{}: {}", context, error);
    io::Error::other(format!("{}: {}", context, error))
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    if let Ok(current_dir) = env::current_dir() {
        log::info!("Current working directory: {}", current_dir.display());
    } else {
        log::error!("Failed to get the current working directory.");
    }

    let config = AppConfig::from_env().map_err(|e| startup_error("Invalid configuration", e))?;

    let aws_config = aws_config::defaults(BehaviorVersion::latest()).load().await;
    let dynamodb_client = DynamoDbClient::new(&aws_config);

    let repository = Arc::new(DynamoDbRepository::new(dynamodb_client, config.tables.clone()));

    let file_store: Arc<dyn FileStore> = match &config.s3_bucket {
        Some(bucket) => {
            log::info!("Storing uploads in S3 bucket '{}'", bucket);
            Arc::new(S3Service::new(S3Client::new(&aws_config), bucket.clone()))
        }
        None => {
            log::info!("S3_BUCKET_NAME not set, storing uploads in '{}'", config.upload_dir);
            Arc::new(LocalFileStore::new(config.upload_dir.clone()))
        }
    };

    let catalog = Arc::new(
        TreatmentCatalog::load(config.treatments_file.as_deref())
            .map_err(|e| startup_error("Failed to load treatment catalog", e))?,
    );
    if catalog.is_empty() {
        log::warn!("Treatment catalog is empty; every lookup returns the fallback text");
    } else {
        log::info!("Loaded {} treatment(s)", catalog.len());
    }

    let classifier = Arc::new(
        RoboflowGateway::new(&config.inference)
            .map_err(|e| startup_error("Failed to configure inference gateway", e))?,
    );

    let proximity = ProximityFinder::new(
        repository.clone(),
        config.search_radius_km,
        config.search_limit,
    );
    let pipeline = UploadPipeline::new(
        classifier,
        catalog.clone(),
        proximity.clone(),
        file_store,
        repository.clone(),
        config.base_url.clone(),
    );
    let registry = ProviderRegistry::new(repository.clone(), repository.clone());
    if let Some(path) = &config.geolocation_file {
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| startup_error("Failed to read geolocation file", e))?;
        let seeds: Vec<TownSeed> = serde_yaml::from_str(&text)
            .map_err(|e| startup_error("Invalid geolocation file", e))?;
        let added = registry
            .import_towns(seeds)
            .await
            .map_err(|e| startup_error("Failed to import towns", e))?;
        log::info!("Imported {} new town(s) from {}", added, path);
    }

    let mailer = Arc::new(
        SmtpMailer::new(&config.mail)
            .map_err(|e| startup_error("Failed to configure mail transport", e))?,
    );
    let phone: Option<Arc<dyn PhoneVerifier>> = match &config.cognito {
        Some(cognito) => {
            log::info!("Cognito phone verification enabled");
            Some(Arc::new(CognitoPhoneVerifier::new(
                CognitoClient::new(&aws_config),
                cognito,
            )))
        }
        None => {
            log::warn!("COGNITO_CLIENT_ID not set; phone verification is disabled");
            None
        }
    };

    let jwt_service = JwtService::new(&config.secret_key);
    let auth_middleware = AuthMiddleware::new(jwt_service.clone());
    let auth = Arc::new(AuthService::new(
        repository.clone(),
        mailer,
        jwt_service,
        phone,
        config.base_url.clone(),
    ));

    let state = web::Data::new(AppState {
        base_url: config.base_url.clone(),
        pipeline,
        proximity,
        catalog,
        registry,
        auth,
    });

    let static_dir = config.static_dir.clone();
    let bind_address = format!("0.0.0.0:{}", config.port);
    log::info!("Starting server on {} (public URL {})", bind_address, config.base_url);

    HttpServer::new(move || {
        App::new()
            .wrap(
                Cors::default()
                    .allow_any_origin()
                    .allowed_methods(vec!["GET", "POST", "OPTIONS"])
                    .allowed_headers(vec![
                        actix_web::http::header::AUTHORIZATION,
                        actix_web::http::header::ACCEPT,
                        actix_web::http::header::CONTENT_TYPE,
                    ])
                    .max_age(3600),
            )
            .wrap(actix_web::middleware::Logger::default())
            .app_data(state.clone())
            .configure(|cfg| configure_routes(cfg, static_dir.clone(), auth_middleware.clone()))
    })
    .bind(&bind_address)?
    .run()
    .await
}
