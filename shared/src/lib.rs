use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

pub const PREDICTION_FAILED: &str = "Prediction Failed";

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ProviderKind {
    Agrovet,
    ExtensionWorker,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct TreatmentView {
    pub text: String,
    pub images: Vec<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ProviderSummary {
    pub id: String,
    pub kind: ProviderKind,
    pub name: String,
    pub county: String,
    pub town: String,
    pub contact: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub services: Vec<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub distance_km: f64,
}

/// One entry of the upload response, in the same order as the uploaded files.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ImageResult {
    pub filename: String,
    pub disease: String,
    /// Percentage in `[0, 100]`.
    pub confidence: f64,
    pub treatment: TreatmentView,
    pub nearby_agrovets: Vec<ProviderSummary>,
    pub nearby_extension_workers: Vec<ProviderSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ImageResult {
    pub fn is_failure(&self) -> bool {
        self.disease == PREDICTION_FAILED
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct UploadResponse {
    pub results: Vec<ImageResult>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct TreatmentLookupResponse {
    pub treatment: String,
    pub treatment_images: Vec<String>,
    pub agrovets: Vec<ProviderSummary>,
    pub extension_workers: Vec<ProviderSummary>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct CountiesResponse {
    pub counties: Vec<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct TownsResponse {
    pub county: String,
    pub towns: Vec<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct RegistrationResponse {
    pub message: String,
    pub provider: ProviderSummary,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ErrorResponse {
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn provider_kind_string_forms_agree() {
        assert_eq!(ProviderKind::ExtensionWorker.to_string(), "extension_worker");
        assert_eq!(
            ProviderKind::from_str("agrovet").unwrap(),
            ProviderKind::Agrovet
        );
        assert_eq!(
            serde_json::to_string(&ProviderKind::ExtensionWorker).unwrap(),
            "\"extension_worker\""
        );
    }

    #[test]
    fn error_field_is_omitted_for_successful_results() {
        let result = ImageResult {
            filename: "leaf.jpg".into(),
            disease: "Healthy".into(),
            confidence: 99.5,
            treatment: TreatmentView {
                text: "ok".into(),
                images: vec![],
            },
            nearby_agrovets: vec![],
            nearby_extension_workers: vec![],
            error: None,
        };
        let json = serde_json::to_value(&result).unwrap();
        assert!(json.get("error").is_none());
        assert!(!result.is_failure());
    }
}
