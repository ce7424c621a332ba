use std::sync::Arc;

use crate::auth::AuthService;
use crate::pipeline::UploadPipeline;
use crate::proximity::ProximityFinder;
use crate::registry::ProviderRegistry;
use crate::treatments::TreatmentCatalog;

/// Collaborators shared by every handler, registered once as `web::Data<AppState>`.
#[derive(Clone)]
pub struct AppState {
    pub base_url: String,
    pub pipeline: UploadPipeline,
    pub proximity: ProximityFinder,
    pub catalog: Arc<TreatmentCatalog>,
    pub registry: ProviderRegistry,
    pub auth: Arc<AuthService>,
}
