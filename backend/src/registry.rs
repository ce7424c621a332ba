//! Provider registration against the geolocation table.

use serde::Deserialize;
use std::collections::BTreeSet;
use std::sync::Arc;

use crate::db::models::{GeolocationRecord, ProviderProfile, ProviderRecord};
use crate::db::{GeolocationStore, ProviderStore, RepositoryError};
use crate::geo::{GeoError, GeoPoint};

#[derive(Debug, thiserror::Error)]
pub enum RegistrationError {
    #[error("Missing required field: {0}")]
    MissingField(&'static str),
    #[error("Location not found for {town}, {county}")]
    LocationNotFound { county: String, town: String },
    #[error("Invalid coordinate for {town}, {county}: {source}")]
    InvalidCoordinate {
        county: String,
        town: String,
        source: GeoError,
    },
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

#[derive(Debug, Clone, Deserialize)]
pub struct AgrovetRegistration {
    pub name: Option<String>,
    pub county: Option<String>,
    pub town: Option<String>,
    pub contact: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExtensionWorkerRegistration {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub county: Option<String>,
    pub town: Option<String>,
    pub contact: Option<String>,
    #[serde(default)]
    pub services: Vec<String>,
}

/// One row of the town gazetteer loaded into the geolocation table.
#[derive(Debug, Clone, Deserialize)]
pub struct TownSeed {
    pub county: String,
    pub town: String,
    pub latitude: f64,
    pub longitude: f64,
}

fn required(value: &Option<String>, field: &'static str) -> Result<String, RegistrationError> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or(RegistrationError::MissingField(field))
}

#[derive(Clone)]
pub struct ProviderRegistry {
    providers: Arc<dyn ProviderStore>,
    locations: Arc<dyn GeolocationStore>,
}

impl ProviderRegistry {
    pub fn new(providers: Arc<dyn ProviderStore>, locations: Arc<dyn GeolocationStore>) -> Self {
        Self {
            providers,
            locations,
        }
    }

    pub async fn register_agrovet(
        &self,
        request: AgrovetRegistration,
    ) -> Result<ProviderRecord, RegistrationError> {
        let name = required(&request.name, "name")?;
        let county = required(&request.county, "county")?;
        let town = required(&request.town, "town")?;
        let contact = required(&request.contact, "contact")?;

        self.register(ProviderProfile::Agrovet { name }, county, town, contact)
            .await
    }

    pub async fn register_extension_worker(
        &self,
        request: ExtensionWorkerRegistration,
    ) -> Result<ProviderRecord, RegistrationError> {
        let first_name = required(&request.first_name, "first_name")?;
        let last_name = required(&request.last_name, "last_name")?;
        let county = required(&request.county, "county")?;
        let town = required(&request.town, "town")?;
        let contact = required(&request.contact, "contact")?;
        let services: BTreeSet<String> = request
            .services
            .iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        self.register(
            ProviderProfile::ExtensionWorker {
                first_name,
                last_name,
                services,
            },
            county,
            town,
            contact,
        )
        .await
    }

    /// The provider takes the coordinate of its (county, town) row; no row, no insert.
    async fn register(
        &self,
        profile: ProviderProfile,
        county: String,
        town: String,
        contact: String,
    ) -> Result<ProviderRecord, RegistrationError> {
        let location = self
            .locations
            .find(&county, &town)
            .await?
            .ok_or_else(|| RegistrationError::LocationNotFound {
                county: county.clone(),
                town: town.clone(),
            })?;

        let record = ProviderRecord::new(profile, county, town, location.location, contact);
        self.providers.insert(&record).await?;
        log::info!(
            "Registered {} '{}' in {}, {}",
            record.kind(),
            record.display_name(),
            record.town,
            record.county
        );
        Ok(record)
    }

    /// Inserts towns not already present; returns how many were added.
    pub async fn import_towns(&self, seeds: Vec<TownSeed>) -> Result<usize, RegistrationError> {
        let mut added = 0;
        for seed in seeds {
            let location = GeoPoint::new(seed.latitude, seed.longitude).map_err(|source| {
                RegistrationError::InvalidCoordinate {
                    county: seed.county.clone(),
                    town: seed.town.clone(),
                    source,
                }
            })?;
            if self.locations.find(&seed.county, &seed.town).await?.is_some() {
                continue;
            }
            let record = GeolocationRecord {
                county: seed.county,
                town: seed.town,
                location,
            };
            self.locations.insert(&record).await?;
            added += 1;
        }
        Ok(added)
    }

    pub async fn counties(&self) -> Result<Vec<String>, RepositoryError> {
        self.locations.counties().await
    }

    pub async fn towns(&self, county: &str) -> Result<Vec<String>, RepositoryError> {
        self.locations.towns(county).await
    }
}
