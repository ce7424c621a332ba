use std::env;
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),
    #[error("Invalid value for {key}: {message}")]
    Invalid { key: &'static str, message: String },
}

#[derive(Debug, Clone)]
pub struct TableNames {
    pub users: String,
    pub predictions: String,
    pub agrovets: String,
    pub extension_workers: String,
    pub geolocation: String,
}

#[derive(Debug, Clone)]
pub struct InferenceConfig {
    pub api_url: String,
    pub api_key: String,
    pub model_id: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct MailConfig {
    pub server: String,
    pub port: u16,
    pub use_tls: bool,
    pub username: Option<String>,
    pub password: Option<String>,
    pub default_sender: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CognitoConfig {
    pub client_id: String,
    pub client_secret: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub base_url: String,
    pub secret_key: String,
    pub inference: InferenceConfig,
    pub search_radius_km: f64,
    pub search_limit: usize,
    pub tables: TableNames,
    pub s3_bucket: Option<String>,
    pub upload_dir: String,
    pub static_dir: String,
    pub treatments_file: Option<String>,
    pub geolocation_file: Option<String>,
    pub mail: MailConfig,
    pub cognito: Option<CognitoConfig>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let port: u16 = parse_or("PORT", 8081)?;
        let base_url = optional("BASE_URL")
            .unwrap_or_else(|| format!("http://localhost:{}", port))
            .trim_end_matches('/')
            .to_string();

        let inference = InferenceConfig {
            api_url: or_default("INFERENCE_API_URL", "https://classify.roboflow.com")
                .trim_end_matches('/')
                .to_string(),
            api_key: required("INFERENCE_API_KEY")?,
            model_id: or_default("INFERENCE_MODEL_ID", "corn-maize-leaf-disease/1"),
            timeout: Duration::from_secs(parse_or("INFERENCE_TIMEOUT_SECS", 10u64)?),
        };

        let tables = TableNames {
            users: or_default("DYNAMODB_USERS_TABLE", "users"),
            predictions: or_default("DYNAMODB_PREDICTIONS_TABLE", "predictions"),
            agrovets: or_default("DYNAMODB_AGROVETS_TABLE", "agrovets"),
            extension_workers: or_default("DYNAMODB_EXTENSION_WORKERS_TABLE", "extension_workers"),
            geolocation: or_default("DYNAMODB_GEOLOCATION_TABLE", "geolocation"),
        };

        let username = optional("MAIL_USERNAME");
        let mail = MailConfig {
            server: or_default("MAIL_SERVER", "smtp.gmail.com"),
            port: parse_or("MAIL_PORT", 587)?,
            use_tls: optional("MAIL_USE_TLS")
                .map(|v| matches!(v.trim().to_lowercase().as_str(), "true" | "1"))
                .unwrap_or(true),
            password: optional("MAIL_PASSWORD"),
            default_sender: optional("MAIL_DEFAULT_SENDER").or_else(|| username.clone()),
            username,
        };

        let cognito = optional("COGNITO_CLIENT_ID").map(|client_id| CognitoConfig {
            client_id,
            client_secret: optional("COGNITO_CLIENT_SECRET"),
        });

        let search_radius_km: f64 = parse_or("SEARCH_RADIUS_KM", 10.0)?;
        if !(search_radius_km.is_finite() && search_radius_km > 0.0) {
            return Err(ConfigError::Invalid {
                key: "SEARCH_RADIUS_KM",
                message: "must be a positive number".to_string(),
            });
        }

        Ok(Self {
            port,
            base_url,
            secret_key: required("SECRET_KEY")?,
            inference,
            search_radius_km,
            search_limit: parse_or("SEARCH_LIMIT", 5usize)?,
            tables,
            s3_bucket: optional("S3_BUCKET_NAME"),
            upload_dir: or_default("UPLOAD_DIR", "uploads"),
            static_dir: or_default("STATIC_DIR", "static"),
            treatments_file: optional("TREATMENTS_FILE"),
            geolocation_file: optional("GEOLOCATION_FILE"),
            mail,
            cognito,
        })
    }
}

fn optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn required(key: &'static str) -> Result<String, ConfigError> {
    optional(key).ok_or(ConfigError::Missing(key))
}

fn or_default(key: &str, default: &str) -> String {
    optional(key).unwrap_or_else(|| {
        log::info!("{} not set, using default: {}", key, default);
        default.to_string()
    })
}

fn parse_or<T>(key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    match optional(key) {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            message: e.to_string(),
        }),
        None => Ok(default),
    }
}
