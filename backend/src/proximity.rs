//! Nearest service providers around a coordinate.

use shared::{ProviderKind, ProviderSummary};
use std::collections::BTreeSet;
use std::sync::Arc;

use crate::db::ProviderStore;
use crate::geo::GeoPoint;

pub const DEFAULT_RADIUS_KM: f64 = 10.0;
pub const DEFAULT_LIMIT: usize = 5;

#[derive(Clone)]
pub struct ProximityFinder {
    store: Arc<dyn ProviderStore>,
    radius_km: f64,
    limit: usize,
}

impl ProximityFinder {
    pub fn new(store: Arc<dyn ProviderStore>, radius_km: f64, limit: usize) -> Self {
        Self {
            store,
            radius_km,
            limit,
        }
    }

    /// Up to `limit` providers within `radius_km`, closest first.
    ///
    /// `service_filter` only applies to extension workers; an empty filter
    /// matches everyone. Store failures are logged and yield no providers.
    pub async fn nearby(
        &self,
        kind: ProviderKind,
        coordinate: Option<GeoPoint>,
        service_filter: Option<&[String]>,
    ) -> Vec<ProviderSummary> {
        let Some(center) = coordinate else {
            return Vec::new();
        };

        let wanted: BTreeSet<String> = match kind {
            ProviderKind::ExtensionWorker => service_filter
                .unwrap_or_default()
                .iter()
                .map(|service| service.trim().to_lowercase())
                .filter(|service| !service.is_empty())
                .collect(),
            ProviderKind::Agrovet => BTreeSet::new(),
        };

        let candidates = match self
            .store
            .within(kind, center.bounding_box(self.radius_km))
            .await
        {
            Ok(candidates) => candidates,
            Err(e) => {
                log::warn!(
                    "Proximity search for {} near ({}, {}) failed: {}",
                    kind,
                    center.latitude,
                    center.longitude,
                    e
                );
                return Vec::new();
            }
        };

        let mut matches: Vec<(f64, _)> = candidates
            .into_iter()
            .filter(|record| wanted.is_empty() || record.offers_any(&wanted))
            .map(|record| (center.distance_km(&record.location), record))
            .filter(|(distance, _)| *distance <= self.radius_km)
            .collect();

        matches.sort_by(|a, b| a.0.total_cmp(&b.0));
        matches.truncate(self.limit);

        log::debug!(
            "Found {} {} providers within {} km",
            matches.len(),
            kind,
            self.radius_km
        );

        matches
            .into_iter()
            .map(|(distance, record)| record.to_summary(distance))
            .collect()
    }
}
