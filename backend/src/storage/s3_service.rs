use aws_sdk_s3::Client;
use aws_sdk_s3::primitives::ByteStream;
use futures::future::BoxFuture;
use sha2::{Digest, Sha256};

use super::{FileStore, StorageError, unique_name, validate_image_size};

#[derive(Clone)]
pub struct S3Service {
    client: Client,
    bucket_name: String,
}

impl S3Service {
    pub fn new(client: Client, bucket_name: String) -> Self {
        Self {
            client,
            bucket_name,
        }
    }

    pub fn calculate_image_hash(image_data: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(image_data);
        hex::encode(hasher.finalize())
    }

    pub fn generate_s3_key(filename: &str) -> String {
        format!("uploads/{}", unique_name(filename))
    }

    pub fn content_type(image_data: &[u8]) -> &'static str {
        match image::guess_format(image_data) {
            Ok(image::ImageFormat::Png) => "image/png",
            Ok(image::ImageFormat::Jpeg) => "image/jpeg",
            _ => "application/octet-stream",
        }
    }

    async fn upload_image(
        &self,
        filename: &str,
        image_data: &[u8],
    ) -> Result<String, StorageError> {
        validate_image_size(image_data)?;

        let s3_key = Self::generate_s3_key(filename);
        let body = ByteStream::from(image_data.to_vec());

        self.client
            .put_object()
            .bucket(&self.bucket_name)
            .key(&s3_key)
            .body(body)
            .content_type(Self::content_type(image_data))
            .metadata("sha256", Self::calculate_image_hash(image_data))
            .send()
            .await
            .map_err(|e| StorageError::S3(e.to_string()))?;

        log::info!("Image saved: s3://{}/{}", self.bucket_name, s3_key);
        Ok(format!("s3://{}/{}", self.bucket_name, s3_key))
    }
}

impl FileStore for S3Service {
    fn save<'a>(
        &'a self,
        filename: &'a str,
        data: &'a [u8],
    ) -> BoxFuture<'a, Result<String, StorageError>> {
        Box::pin(self.upload_image(filename, data))
    }
}
