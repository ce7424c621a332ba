use futures::future::BoxFuture;
use std::path::PathBuf;

use super::{FileStore, StorageError, unique_name, validate_image_size};

/// Uploads written under a directory on local disk.
#[derive(Clone)]
pub struct LocalFileStore {
    root: PathBuf,
}

impl LocalFileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    async fn write(&self, filename: &str, data: &[u8]) -> Result<String, StorageError> {
        validate_image_size(data)?;
        tokio::fs::create_dir_all(&self.root).await?;

        let path = self.root.join(unique_name(filename));
        tokio::fs::write(&path, data).await?;

        log::info!("Image saved: {}", path.display());
        Ok(path.display().to_string())
    }
}

impl FileStore for LocalFileStore {
    fn save<'a>(
        &'a self,
        filename: &'a str,
        data: &'a [u8],
    ) -> BoxFuture<'a, Result<String, StorageError>> {
        Box::pin(self.write(filename, data))
    }
}
