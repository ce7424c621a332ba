use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::{ProviderKind, ProviderSummary};
use std::collections::BTreeSet;
use uuid::Uuid;

use crate::geo::GeoPoint;

#[derive(Debug, Clone, PartialEq)]
pub enum ProviderProfile {
    Agrovet {
        name: String,
    },
    ExtensionWorker {
        first_name: String,
        last_name: String,
        services: BTreeSet<String>,
    },
}

/// An agrovet shop or extension worker with a fixed position.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderRecord {
    pub id: Uuid,
    pub county: String,
    pub town: String,
    pub location: GeoPoint,
    pub contact: String,
    pub profile: ProviderProfile,
    pub created_at: DateTime<Utc>,
}

impl ProviderRecord {
    pub fn new(
        profile: ProviderProfile,
        county: String,
        town: String,
        location: GeoPoint,
        contact: String,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            county,
            town,
            location,
            contact,
            profile,
            created_at: Utc::now(),
        }
    }

    pub fn kind(&self) -> ProviderKind {
        match self.profile {
            ProviderProfile::Agrovet { .. } => ProviderKind::Agrovet,
            ProviderProfile::ExtensionWorker { .. } => ProviderKind::ExtensionWorker,
        }
    }

    pub fn display_name(&self) -> String {
        match &self.profile {
            ProviderProfile::Agrovet { name } => name.clone(),
            ProviderProfile::ExtensionWorker {
                first_name,
                last_name,
                ..
            } => format!("{} {}", first_name, last_name),
        }
    }

    pub fn services(&self) -> Vec<String> {
        match &self.profile {
            ProviderProfile::Agrovet { .. } => Vec::new(),
            ProviderProfile::ExtensionWorker { services, .. } => services.iter().cloned().collect(),
        }
    }

    /// Case-insensitive intersection with `wanted`. Agrovets offer nothing.
    pub fn offers_any(&self, wanted: &BTreeSet<String>) -> bool {
        match &self.profile {
            ProviderProfile::Agrovet { .. } => false,
            ProviderProfile::ExtensionWorker { services, .. } => services
                .iter()
                .any(|service| wanted.contains(&service.trim().to_lowercase())),
        }
    }

    pub fn to_summary(&self, distance_km: f64) -> ProviderSummary {
        ProviderSummary {
            id: self.id.to_string(),
            kind: self.kind(),
            name: self.display_name(),
            county: self.county.clone(),
            town: self.town.clone(),
            contact: self.contact.clone(),
            services: self.services(),
            latitude: self.location.latitude,
            longitude: self.location.longitude,
            distance_km: (distance_km * 100.0).round() / 100.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeolocationRecord {
    pub county: String,
    pub town: String,
    pub location: GeoPoint,
}

/// Append-only audit row, one per classified image.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionRecord {
    pub id: Uuid,
    pub filename: String,
    pub stored_as: String,
    pub disease: String,
    pub confidence: f64,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub treatment: String,
    pub nearby_agrovets: Vec<ProviderSummary>,
    pub nearby_extension_workers: Vec<ProviderSummary>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub username: String,
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub password_hash: Option<String>,
    pub is_verified: bool,
    pub verification_token: Option<String>,
    pub token_expiry: Option<DateTime<Utc>>,
    pub reset_token: Option<String>,
    pub reset_expiry: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

impl User {
    pub fn update_last_login(&mut self) {
        self.last_login = Some(Utc::now());
    }

    pub fn display_name(&self) -> String {
        let full = format!("{} {}", self.first_name, self.last_name);
        let full = full.trim();
        if full.is_empty() {
            self.username.clone()
        } else {
            full.to_string()
        }
    }
}
