use actix_files::Files;
use actix_multipart::{Field, Multipart};
use actix_web::{HttpResponse, error, web};
use futures::{StreamExt, TryStreamExt};
use serde::Deserialize;
use shared::{
    CountiesResponse, ErrorResponse, ProviderKind, RegistrationResponse, TownsResponse,
    TreatmentLookupResponse, UploadResponse,
};

use crate::auth::middleware::AuthMiddleware;
use crate::auth::routes as auth_routes;
use crate::error::ApiError;
use crate::geo::GeoPoint;
use crate::pipeline::{UploadError, UploadedImage};
use crate::registry::{AgrovetRegistration, ExtensionWorkerRegistration};
use crate::state::AppState;
use crate::storage::MAX_IMAGE_BYTES;

const MAX_FILES_PER_REQUEST: usize = 20;

pub fn configure_routes(
    cfg: &mut web::ServiceConfig,
    static_dir: String,
    auth_middleware: AuthMiddleware,
) {
    cfg.app_data(web::JsonConfig::default().error_handler(|err, _req| {
        let message = format!("Invalid JSON body: {}", err);
        error::InternalError::from_response(
            err,
            HttpResponse::BadRequest().json(ErrorResponse { error: message }),
        )
        .into()
    }))
    .service(web::resource("/").route(web::get().to(home)))
    .service(web::resource("/upload").route(web::post().to(upload_files)))
    .service(web::resource("/utils/treatments/{disease}").route(web::get().to(treatment_lookup)))
    .service(web::resource("/geolocation/counties").route(web::get().to(counties)))
    .service(web::resource("/geolocation/towns/{county}").route(web::get().to(towns)))
    .service(web::resource("/register/agrovet").route(web::post().to(register_agrovet)))
    .service(
        web::resource("/register/extension-worker")
            .route(web::post().to(register_extension_worker)),
    )
    .service(
        web::scope("/auth")
            .route("/register", web::post().to(auth_routes::register))
            .route("/login", web::post().to(auth_routes::login))
            .route("/verify/{token}", web::get().to(auth_routes::verify_email))
            .route("/request-reset", web::post().to(auth_routes::request_reset))
            .route("/reset-password/{token}", web::post().to(auth_routes::reset_password))
            .route("/phone/start", web::post().to(auth_routes::start_phone_verification))
            .route("/phone/verify", web::post().to(auth_routes::confirm_phone))
            .service(
                web::resource("/me")
                    .wrap(auth_middleware)
                    .route(web::get().to(auth_routes::me)),
            ),
    )
    .service(Files::new("/static", static_dir));
}

async fn home() -> HttpResponse {
    HttpResponse::Ok().body("Crop health server is running!")
}

#[derive(Debug, Deserialize)]
pub struct CoordinateQuery {
    pub latitude: Option<String>,
    pub longitude: Option<String>,
}

/// Both parts must be present to form a coordinate; a present but bad value is a client error.
fn parse_coordinate(
    latitude: Option<&str>,
    longitude: Option<&str>,
) -> Result<Option<GeoPoint>, ApiError> {
    let (Some(latitude), Some(longitude)) = (
        latitude.map(str::trim).filter(|v| !v.is_empty()),
        longitude.map(str::trim).filter(|v| !v.is_empty()),
    ) else {
        return Ok(None);
    };

    let parse = |name: &str, raw: &str| {
        raw.parse::<f64>()
            .map_err(|_| ApiError::BadRequest(format!("Invalid {}: {}", name, raw)))
    };
    let point = GeoPoint::new(parse("latitude", latitude)?, parse("longitude", longitude)?)
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;
    Ok(Some(point))
}

async fn read_text(field: &mut actix_multipart::Field) -> Result<String, actix_web::Error> {
    let mut bytes = Vec::new();
    while let Some(chunk) = field.next().await {
        bytes.extend_from_slice(&chunk?);
    }
    String::from_utf8(bytes).map_err(|_| error::ErrorBadRequest("Form field is not valid UTF-8"))
}

/// Keeps at most `limit` bytes of the part and discards the rest, so storage
/// sees an oversized file without the whole body being buffered.
async fn read_capped(field: &mut Field, limit: usize) -> Result<Vec<u8>, actix_web::Error> {
    let mut data = Vec::new();
    while let Some(chunk) = field.next().await {
        let chunk = chunk?;
        let room = limit - data.len();
        data.extend_from_slice(&chunk[..chunk.len().min(room)]);
    }
    Ok(data)
}

async fn upload_files(
    state: web::Data<AppState>,
    mut payload: Multipart,
) -> Result<HttpResponse, actix_web::Error> {
    let mut images = Vec::new();
    let mut latitude = None;
    let mut longitude = None;

    while let Some(mut field) = payload.try_next().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "files" => {
                let filename = field
                    .content_disposition()
                    .and_then(|cd| cd.get_filename())
                    .unwrap_or_default()
                    .to_string();
                if images.len() == MAX_FILES_PER_REQUEST {
                    let error = UploadError::TooManyFiles(MAX_FILES_PER_REQUEST);
                    return Err(ApiError::from(error).into());
                }
                let data = read_capped(&mut field, MAX_IMAGE_BYTES + 1).await?;
                images.push(UploadedImage { filename, data });
            }
            "latitude" => latitude = Some(read_text(&mut field).await?),
            "longitude" => longitude = Some(read_text(&mut field).await?),
            other => {
                log::debug!("Ignoring multipart field '{}'", other);
                while field.try_next().await?.is_some() {}
            }
        }
    }

    if images.is_empty() {
        log::warn!("No files received in request");
        return Err(ApiError::from(UploadError::NoFiles).into());
    }

    let coordinate = parse_coordinate(latitude.as_deref(), longitude.as_deref())?;
    let results = state
        .pipeline
        .handle(images, coordinate)
        .await
        .map_err(ApiError::from)?;

    Ok(HttpResponse::Ok().json(UploadResponse { results }))
}

async fn treatment_lookup(
    state: web::Data<AppState>,
    disease: web::Path<String>,
    query: web::Query<CoordinateQuery>,
) -> Result<HttpResponse, ApiError> {
    let coordinate = parse_coordinate(query.latitude.as_deref(), query.longitude.as_deref())?;
    let treatment = state.catalog.lookup(&disease);
    let view = treatment.to_view(&state.base_url);

    let (agrovets, extension_workers) = futures::join!(
        state.proximity.nearby(ProviderKind::Agrovet, coordinate, None),
        state.proximity.nearby(
            ProviderKind::ExtensionWorker,
            coordinate,
            Some(treatment.services.as_slice())
        ),
    );

    Ok(HttpResponse::Ok().json(TreatmentLookupResponse {
        treatment: view.text,
        treatment_images: view.images,
        agrovets,
        extension_workers,
    }))
}

async fn counties(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let counties = state.registry.counties().await?;
    Ok(HttpResponse::Ok().json(CountiesResponse { counties }))
}

async fn towns(
    state: web::Data<AppState>,
    county: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let county = county.into_inner();
    let towns = state.registry.towns(&county).await?;
    if towns.is_empty() {
        return Err(ApiError::NotFound(format!("County not found: {}", county)));
    }
    Ok(HttpResponse::Ok().json(TownsResponse { county, towns }))
}

async fn register_agrovet(
    state: web::Data<AppState>,
    body: web::Json<AgrovetRegistration>,
) -> Result<HttpResponse, ApiError> {
    let record = state.registry.register_agrovet(body.into_inner()).await?;
    Ok(HttpResponse::Created().json(RegistrationResponse {
        message: "Agrovet registered successfully".to_string(),
        provider: record.to_summary(0.0),
    }))
}

async fn register_extension_worker(
    state: web::Data<AppState>,
    body: web::Json<ExtensionWorkerRegistration>,
) -> Result<HttpResponse, ApiError> {
    let record = state.registry.register_extension_worker(body.into_inner()).await?;
    Ok(HttpResponse::Created().json(RegistrationResponse {
        message: "Extension worker registered successfully".to_string(),
        provider: record.to_summary(0.0),
    }))
}
