use serde::Deserialize;
use serde_json::Value;

use super::{InferenceError, InferenceResult};

/// Confidence as sent by the classifier: a `0..=1` fraction, or a string that is
/// either a fraction (`"0.87"`) or a formatted percentage (`"87.00%"`).
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawConfidence {
    Number(f64),
    Text(String),
}

impl RawConfidence {
    pub fn to_percent(&self) -> Result<f64, InferenceError> {
        let percent = match self {
            RawConfidence::Number(fraction) => fraction * 100.0,
            RawConfidence::Text(text) => {
                let text = text.trim();
                match text.strip_suffix('%') {
                    Some(percent) => percent
                        .trim()
                        .parse::<f64>()
                        .map_err(|_| InferenceError::Confidence(text.to_string()))?,
                    None => {
                        text.parse::<f64>()
                            .map_err(|_| InferenceError::Confidence(text.to_string()))?
                            * 100.0
                    }
                }
            }
        };

        if !percent.is_finite() || !(0.0..=100.0).contains(&percent) {
            return Err(InferenceError::Confidence(format!("{:?}", self)));
        }
        Ok((percent * 100.0).round() / 100.0)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawPrediction {
    #[serde(rename = "class")]
    pub class: String,
    pub confidence: RawConfidence,
}

/// The shapes the hosted classifier has been seen to answer with.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ClassificationResponse {
    Listed { predictions: Vec<RawPrediction> },
    Flat { top: String, confidence: RawConfidence },
    Unrecognized(Value),
}

impl ClassificationResponse {
    pub fn into_result(self) -> Result<InferenceResult, InferenceError> {
        match self {
            ClassificationResponse::Listed { predictions } => {
                let top = predictions
                    .into_iter()
                    .next()
                    .ok_or(InferenceError::EmptyPredictions)?;
                Ok(InferenceResult {
                    confidence_percent: top.confidence.to_percent()?,
                    disease: top.class,
                })
            }
            ClassificationResponse::Flat { top, confidence } => Ok(InferenceResult {
                confidence_percent: confidence.to_percent()?,
                disease: top,
            }),
            ClassificationResponse::Unrecognized(value) => {
                let mut shown = value.to_string();
                if shown.len() > 200 {
                    let mut cut = 200;
                    while !shown.is_char_boundary(cut) {
                        cut -= 1;
                    }
                    shown.truncate(cut);
                }
                Err(InferenceError::UnrecognizedShape(shown))
            }
        }
    }
}
