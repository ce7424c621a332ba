//! Upload handling: validate, store, classify, enrich and log each image.

use chrono::Utc;
use futures::future::join_all;
use shared::{ImageResult, PREDICTION_FAILED, ProviderKind};
use std::sync::Arc;
use uuid::Uuid;

use crate::db::PredictionLog;
use crate::db::models::PredictionRecord;
use crate::geo::GeoPoint;
use crate::inference::Classifier;
use crate::proximity::ProximityFinder;
use crate::storage::{FileStore, sanitize_filename};
use crate::treatments::{Treatment, TreatmentCatalog};

pub const ALLOWED_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

#[derive(Debug, Clone)]
pub struct UploadedImage {
    pub filename: String,
    pub data: Vec<u8>,
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum UploadError {
    #[error("No files uploaded")]
    NoFiles,
    #[error("No selected files")]
    NoSelection,
    #[error("Too many files (at most {0} per request)")]
    TooManyFiles(usize),
}

pub fn allowed_file(filename: &str) -> bool {
    filename
        .rsplit_once('.')
        .map(|(_, extension)| {
            let extension = extension.to_ascii_lowercase();
            ALLOWED_EXTENSIONS.contains(&extension.as_str())
        })
        .unwrap_or(false)
}

#[derive(Clone)]
pub struct UploadPipeline {
    classifier: Arc<dyn Classifier>,
    catalog: Arc<TreatmentCatalog>,
    proximity: ProximityFinder,
    file_store: Arc<dyn FileStore>,
    prediction_log: Arc<dyn PredictionLog>,
    base_url: String,
}

impl UploadPipeline {
    pub fn new(
        classifier: Arc<dyn Classifier>,
        catalog: Arc<TreatmentCatalog>,
        proximity: ProximityFinder,
        file_store: Arc<dyn FileStore>,
        prediction_log: Arc<dyn PredictionLog>,
        base_url: String,
    ) -> Self {
        Self {
            classifier,
            catalog,
            proximity,
            file_store,
            prediction_log,
            base_url,
        }
    }

    /// One result per accepted image, in upload order. Only an empty batch
    /// fails as a whole; every per-image problem stays inside its result.
    pub async fn handle(
        &self,
        images: Vec<UploadedImage>,
        coordinate: Option<GeoPoint>,
    ) -> Result<Vec<ImageResult>, UploadError> {
        let first = images.first().ok_or(UploadError::NoFiles)?;
        if first.filename.trim().is_empty() {
            return Err(UploadError::NoSelection);
        }

        let accepted: Vec<UploadedImage> = images
            .into_iter()
            .filter(|image| {
                let allowed = allowed_file(&image.filename);
                if !allowed {
                    log::warn!("Skipping {}: extension not allowed", image.filename);
                }
                allowed
            })
            .collect();

        log::info!(
            "Processing {} image(s){}",
            accepted.len(),
            coordinate
                .map(|c| format!(" near ({}, {})", c.latitude, c.longitude))
                .unwrap_or_default()
        );

        let results = join_all(
            accepted
                .iter()
                .map(|image| self.process_image(image, coordinate)),
        )
        .await;
        Ok(results)
    }

    async fn process_image(
        &self,
        image: &UploadedImage,
        coordinate: Option<GeoPoint>,
    ) -> ImageResult {
        let filename = sanitize_filename(&image.filename);

        let stored_as = match self.file_store.save(&image.filename, &image.data).await {
            Ok(location) => location,
            Err(e) => {
                log::error!("Failed to store {}: {}", filename, e);
                return self.failed(filename, e.to_string());
            }
        };

        let prediction = match self.classifier.classify(&image.data).await {
            Ok(prediction) => prediction,
            Err(e) => {
                log::error!("Model inference error for {}: {}", filename, e);
                return self.failed(filename, e.to_string());
            }
        };

        let treatment = self.catalog.lookup(&prediction.disease);
        let (nearby_agrovets, nearby_extension_workers) = futures::join!(
            self.proximity.nearby(ProviderKind::Agrovet, coordinate, None),
            self.proximity.nearby(
                ProviderKind::ExtensionWorker,
                coordinate,
                Some(treatment.services.as_slice())
            ),
        );

        let result = ImageResult {
            filename: filename.clone(),
            disease: prediction.disease,
            confidence: prediction.confidence_percent,
            treatment: treatment.to_view(&self.base_url),
            nearby_agrovets,
            nearby_extension_workers,
            error: None,
        };

        let record = PredictionRecord {
            id: Uuid::new_v4(),
            filename,
            stored_as,
            disease: result.disease.clone(),
            confidence: result.confidence,
            latitude: coordinate.map(|c| c.latitude),
            longitude: coordinate.map(|c| c.longitude),
            treatment: result.treatment.text.clone(),
            nearby_agrovets: result.nearby_agrovets.clone(),
            nearby_extension_workers: result.nearby_extension_workers.clone(),
            timestamp: Utc::now(),
        };
        self.record_best_effort(&record).await;

        result
    }

    /// Audit write whose failure is only logged; the result is already built.
    async fn record_best_effort(&self, record: &PredictionRecord) {
        if let Err(e) = self.prediction_log.append(record).await {
            log::error!(
                "Failed to record prediction for {}: {}",
                record.filename,
                e
            );
        }
    }

    fn failed(&self, filename: String, reason: String) -> ImageResult {
        ImageResult {
            filename,
            disease: PREDICTION_FAILED.to_string(),
            confidence: 0.0,
            treatment: Treatment::none().to_view(&self.base_url),
            nearby_agrovets: Vec::new(),
            nearby_extension_workers: Vec::new(),
            error: Some(reason),
        }
    }
}
