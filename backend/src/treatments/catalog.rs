use serde::Deserialize;
use shared::TreatmentView;
use std::collections::HashMap;
use std::path::Path;

pub const NO_TREATMENT_TEXT: &str = "No specific treatment recommendation available.";

const BUILTIN_CATALOG: &str = include_str!("../../config/treatments.yaml");

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Failed to read treatment catalog: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse treatment catalog: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Unsupported treatment catalog version: {0}")]
    Version(u32),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Treatment {
    #[serde(rename = "text")]
    pub advice_text: String,
    #[serde(rename = "images", default)]
    pub image_refs: Vec<String>,
    /// Extension-worker service tags relevant to this treatment.
    #[serde(default)]
    pub services: Vec<String>,
}

impl Treatment {
    pub fn none() -> Self {
        Self {
            advice_text: NO_TREATMENT_TEXT.to_string(),
            image_refs: Vec::new(),
            services: Vec::new(),
        }
    }

    pub fn to_view(&self, base_url: &str) -> TreatmentView {
        TreatmentView {
            text: self.advice_text.clone(),
            images: self
                .image_refs
                .iter()
                .map(|image| treatment_image_url(base_url, image))
                .collect(),
        }
    }
}

pub fn treatment_image_url(base_url: &str, image: &str) -> String {
    format!(
        "{}/static/treatments/{}",
        base_url.trim_end_matches('/'),
        urlencoding::encode(image)
    )
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    version: u32,
    treatments: HashMap<String, Treatment>,
}

/// Disease label to treatment advice, fixed for the lifetime of the process.
#[derive(Debug, Clone)]
pub struct TreatmentCatalog {
    entries: HashMap<String, Treatment>,
    fallback: Treatment,
}

impl TreatmentCatalog {
    pub fn builtin() -> Result<Self, CatalogError> {
        Self::from_yaml(BUILTIN_CATALOG)
    }

    pub fn load(path: Option<&str>) -> Result<Self, CatalogError> {
        match path {
            Some(path) => {
                log::info!("Loading treatment catalog from {}", path);
                let raw = std::fs::read_to_string(Path::new(path))?;
                Self::from_yaml(&raw)
            }
            None => Self::builtin(),
        }
    }

    pub fn from_yaml(raw: &str) -> Result<Self, CatalogError> {
        let file: CatalogFile = serde_yaml::from_str(raw)?;
        if file.version != 1 {
            return Err(CatalogError::Version(file.version));
        }
        Ok(Self {
            entries: file.treatments,
            fallback: Treatment::none(),
        })
    }

    /// Exact, case-sensitive match. Unknown labels get the fallback treatment.
    pub fn lookup(&self, disease: &str) -> &Treatment {
        self.entries.get(disease).unwrap_or(&self.fallback)
    }

    pub fn contains(&self, disease: &str) -> bool {
        self.entries.contains_key(disease)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
