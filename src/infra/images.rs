//! Filesystem storage for uploaded post images.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use slug::slugify;
use tokio::{fs, io::AsyncWriteExt};
use tracing::debug;
use uuid::Uuid;

use crate::application::repos::{ImageStore, ImageStoreError};

const ACCEPTED_SUBTYPES: [&str; 2] = ["jpeg", "png"];

/// Flat directory of image files named `<uuid>_<original-name>`.
#[derive(Debug)]
pub struct FsImageStore {
    root: PathBuf,
}

impl FsImageStore {
    /// Initialise storage rooted at the provided directory, creating it if necessary.
    pub fn new(root: PathBuf) -> Result<Self, std::io::Error> {
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    fn resolve(&self, filename: &str) -> Result<PathBuf, ImageStoreError> {
        let mut components = Path::new(filename).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) => Ok(self.root.join(filename)),
            _ => Err(ImageStoreError::InvalidFilename),
        }
    }
}

/// Accept only JPEG and PNG uploads, judged by the original file extension.
fn ensure_supported(original_name: &str) -> Result<(), ImageStoreError> {
    let supported = mime_guess::from_path(original_name)
        .iter()
        .any(|mime| {
            mime.type_() == mime_guess::mime::IMAGE
                && ACCEPTED_SUBTYPES.contains(&mime.subtype().as_str())
        });
    if supported {
        Ok(())
    } else {
        Err(ImageStoreError::UnsupportedFormat(original_name.to_string()))
    }
}

fn stored_filename(original_name: &str) -> String {
    let path = Path::new(original_name);
    let stem = path
        .file_stem()
        .and_then(|value| value.to_str())
        .unwrap_or("image");
    let mut base = slugify(stem);
    if base.is_empty() {
        base = "image".to_string();
    }

    let extension = path
        .extension()
        .and_then(|value| value.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    format!("{}_{base}.{extension}", Uuid::new_v4())
}

#[async_trait]
impl ImageStore for FsImageStore {
    async fn store(&self, original_name: &str, payload: Bytes) -> Result<String, ImageStoreError> {
        ensure_supported(original_name)?;
        if payload.is_empty() {
            return Err(ImageStoreError::EmptyPayload);
        }

        let filename = stored_filename(original_name);
        let absolute = self.resolve(&filename)?;
        let mut file = fs::File::create(&absolute).await?;
        file.write_all(&payload).await?;
        file.flush().await?;

        debug!(filename, bytes = payload.len(), "Image stored");
        Ok(filename)
    }

    async fn load(&self, filename: &str) -> Result<Option<Bytes>, ImageStoreError> {
        let absolute = self.resolve(filename)?;
        match fs::read(&absolute).await {
            Ok(data) => Ok(Some(Bytes::from(data))),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    async fn delete_if_exists(&self, filename: &str) -> Result<bool, ImageStoreError> {
        let absolute = self.resolve(filename)?;
        match fs::remove_file(&absolute).await {
            Ok(()) => {
                debug!(filename, "Image removed");
                Ok(true)
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err.into()),
        }
    }
}
