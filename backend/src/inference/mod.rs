pub mod response;
pub mod roboflow;

use futures::future::BoxFuture;

pub use response::ClassificationResponse;
pub use roboflow::RoboflowGateway;

/// Normalized classifier output; confidence is a percentage in `[0, 100]`.
#[derive(Debug, Clone, PartialEq)]
pub struct InferenceResult {
    pub disease: String,
    pub confidence_percent: f64,
}

#[derive(Debug, thiserror::Error)]
pub enum InferenceError {
    #[error("Inference request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Invalid inference endpoint: {0}")]
    Endpoint(#[from] url::ParseError),
    #[error("Inference service returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Unrecognized inference response: {0}")]
    UnrecognizedShape(String),
    #[error("Inference response contained no predictions")]
    EmptyPredictions,
    #[error("Malformed confidence value: {0}")]
    Confidence(String),
}

pub trait Classifier: Send + Sync {
    fn classify<'a>(
        &'a self,
        image: &'a [u8],
    ) -> BoxFuture<'a, Result<InferenceResult, InferenceError>>;
}
