//! Avatar file storage under the media root

use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::fs;
use tracing::{info, warn};
use uuid::Uuid;

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp", "bmp"];

/// Directory below the media root that holds avatars
pub const AVATAR_DIR: &str = "avatar";

#[derive(Error, Debug)]
pub enum AvatarError {
    #[error(
        "Upload a valid image. The file you uploaded was either not an image or a corrupted image."
    )]
    InvalidImage,

    #[error("Failed to store avatar: {0}")]
    Io(#[from] std::io::Error),
}

/// An uploaded avatar file, as received from a multipart form
#[derive(Debug, Clone)]
pub struct AvatarUpload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl AvatarUpload {
    /// Lowercased image extension, or `InvalidImage`
    pub fn extension(&self) -> Result<String, AvatarError> {
        let extension = Path::new(&self.file_name)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .ok_or(AvatarError::InvalidImage)?;

        if self.bytes.is_empty() || !IMAGE_EXTENSIONS.contains(&extension.as_str()) {
            return Err(AvatarError::InvalidImage);
        }

        Ok(extension)
    }
}

/// Writes avatars to disk and hands back their media-relative reference
#[derive(Debug, Clone)]
pub struct AvatarStore {
    root: PathBuf,
}

impl AvatarStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Store the upload as `avatar/<uuid>.<ext>` and return that reference
    pub async fn save(&self, upload: &AvatarUpload) -> Result<String, AvatarError> {
        let extension = upload.extension()?;
        let reference = format!("{}/{}.{}", AVATAR_DIR, Uuid::new_v4(), extension);

        fs::create_dir_all(self.root.join(AVATAR_DIR)).await?;
        fs::write(self.root.join(&reference), &upload.bytes).await?;

        info!("Stored avatar {}", reference);
        Ok(reference)
    }

    /// Remove a stored avatar that ended up unreferenced
    pub async fn discard(&self, reference: &str) {
        match fs::remove_file(self.root.join(reference)).await {
            Ok(()) => info!("Discarded avatar {}", reference),
            Err(e) => warn!("Failed to discard avatar {}: {}", reference, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upload(name: &str) -> AvatarUpload {
        AvatarUpload {
            file_name: name.to_string(),
            bytes: vec![0x89, 0x50, 0x4e, 0x47],
        }
    }

    #[test]
    fn only_image_extensions_are_accepted() {
        assert_eq!(upload("me.PNG").extension().unwrap(), "png");
        assert_eq!(upload("me.jpeg").extension().unwrap(), "jpeg");
        assert!(matches!(upload("me.exe").extension(), Err(AvatarError::InvalidImage)));
        assert!(matches!(upload("me").extension(), Err(AvatarError::InvalidImage)));
    }

    #[test]
    fn empty_files_are_rejected() {
        let empty = AvatarUpload {
            file_name: "me.png".to_string(),
            bytes: Vec::new(),
        };
        assert!(matches!(empty.extension(), Err(AvatarError::InvalidImage)));
    }

    #[tokio::test]
    async fn save_writes_under_avatar_dir() {
        let dir = tempfile::tempdir().unwrap();
        let store = AvatarStore::new(dir.path());

        let reference = store.save(&upload("me.png")).await.unwrap();
        assert!(reference.starts_with("avatar/"));
        assert!(reference.ends_with(".png"));

        let written = tokio::fs::read(dir.path().join(&reference)).await.unwrap();
        assert_eq!(written, vec![0x89, 0x50, 0x4e, 0x47]);
    }

    #[tokio::test]
    async fn discard_removes_the_stored_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = AvatarStore::new(dir.path());

        let reference = store.save(&upload("me.gif")).await.unwrap();
        store.discard(&reference).await;
        assert!(!dir.path().join(&reference).exists());

        // Already gone: only logged
        store.discard(&reference).await;
    }
}
