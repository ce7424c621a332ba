pub mod local;
pub mod s3_service;

use futures::future::BoxFuture;
use uuid::Uuid;

pub use local::LocalFileStore;
pub use s3_service::S3Service;

pub const MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("S3 error: {0}")]
    S3(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("File too large: more than {} bytes", MAX_IMAGE_BYTES)]
    FileTooLarge,
    #[error("Empty file")]
    Empty,
}

/// Raw upload storage. `save` returns the location the bytes were written to.
pub trait FileStore: Send + Sync {
    fn save<'a>(
        &'a self,
        filename: &'a str,
        data: &'a [u8],
    ) -> BoxFuture<'a, Result<String, StorageError>>;
}

pub fn validate_image_size(data: &[u8]) -> Result<(), StorageError> {
    if data.is_empty() {
        return Err(StorageError::Empty);
    }
    if data.len() > MAX_IMAGE_BYTES {
        return Err(StorageError::FileTooLarge);
    }
    Ok(())
}

/// Reduce a client-supplied filename to a safe basename.
pub fn sanitize_filename(filename: &str) -> String {
    let basename = filename
        .rsplit(|c| c == '/' || c == '\\')
        .next()
        .unwrap_or_default();

    let cleaned: String = basename
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
        .collect();

    let cleaned = cleaned.trim_start_matches(['.', '_']).to_string();
    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned
    }
}

/// Collision-safe stored name for an upload.
pub fn unique_name(filename: &str) -> String {
    format!("{}-{}", Uuid::new_v4(), sanitize_filename(filename))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_strips_paths_and_unsafe_characters() {
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("C:\\photos\\maize leaf.JPG"), "maize_leaf.JPG");
        assert_eq!(sanitize_filename("..hidden.png"), "hidden.png");
        assert_eq!(sanitize_filename("jänis?.jpeg"), "jnis.jpeg");
        assert_eq!(sanitize_filename("///"), "upload");
    }

    #[test]
    fn unique_names_do_not_collide() {
        let a = unique_name("leaf.png");
        let b = unique_name("leaf.png");
        assert_ne!(a, b);
        assert!(a.ends_with("-leaf.png"));
    }

    #[test]
    fn size_limits() {
        assert!(matches!(validate_image_size(&[]), Err(StorageError::Empty)));
        assert!(validate_image_size(&[0u8; 16]).is_ok());
        let big = vec![0u8; MAX_IMAGE_BYTES + 1];
        assert!(matches!(
            validate_image_size(&big),
            Err(StorageError::FileTooLarge)
        ));
    }
}
