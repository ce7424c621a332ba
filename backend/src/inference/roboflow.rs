use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use futures::future::BoxFuture;
use reqwest::Client as HttpClient;
use reqwest::header::CONTENT_TYPE;
use url::Url;

use super::{ClassificationResponse, Classifier, InferenceError, InferenceResult};
use crate::config::InferenceConfig;

/// Hosted image classification over HTTP. One attempt per image, no retries.
#[derive(Clone)]
pub struct RoboflowGateway {
    http_client: HttpClient,
    endpoint: Url,
    model_id: String,
}

impl RoboflowGateway {
    pub fn new(config: &InferenceConfig) -> Result<Self, InferenceError> {
        let http_client = HttpClient::builder().timeout(config.timeout).build()?;
        let endpoint = Self::endpoint(&config.api_url, &config.model_id, &config.api_key)?;
        Ok(Self {
            http_client,
            endpoint,
            model_id: config.model_id.clone(),
        })
    }

    fn endpoint(api_url: &str, model_id: &str, api_key: &str) -> Result<Url, InferenceError> {
        let mut url = Url::parse(&format!(
            "{}/{}",
            api_url.trim_end_matches('/'),
            model_id.trim_start_matches('/')
        ))?;
        url.query_pairs_mut().append_pair("api_key", api_key);
        Ok(url)
    }

    async fn infer(&self, image: &[u8]) -> Result<InferenceResult, InferenceError> {
        log::debug!(
            "Sending {} bytes to classification model {}",
            image.len(),
            self.model_id
        );

        let response = self
            .http_client
            .post(self.endpoint.clone())
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(BASE64.encode(image))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(InferenceError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let payload: ClassificationResponse = response.json().await?;
        let result = payload.into_result()?;
        log::info!(
            "Model {} classified image as {} ({}%)",
            self.model_id,
            result.disease,
            result.confidence_percent
        );
        Ok(result)
    }
}

impl Classifier for RoboflowGateway {
    fn classify<'a>(
        &'a self,
        image: &'a [u8],
    ) -> BoxFuture<'a, Result<InferenceResult, InferenceError>> {
        Box::pin(self.infer(image))
    }
}
