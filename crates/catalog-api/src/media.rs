use std::path::{Path, PathBuf};

use crate::error::AppError;

/// URL prefix under which stored media is served.
pub const PUBLIC_PREFIX: &str = "/uploads";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaFolder {
    Brands,
    Models,
}

impl MediaFolder {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Brands => "brands",
            Self::Models => "models",
        }
    }
}

/// An uploaded file read from a multipart field.
#[derive(Debug, Clone)]
pub struct Upload {
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// Stores uploaded images on local disk and maps them to public URLs.
#[derive(Debug, Clone)]
pub struct MediaStore {
    root: PathBuf,
    max_bytes: usize,
}

impl MediaStore {
    pub const fn new(root: PathBuf, max_bytes: usize) -> Self {
        Self { root, max_bytes }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Check an upload without touching the disk, returning its image MIME type.
    pub fn validate(&self, upload: &Upload) -> Result<String, AppError> {
        let label = upload.file_name.as_deref().unwrap_or("upload");
        if upload.bytes.is_empty() {
            return Err(AppError::bad_request(format!("{label} is empty")));
        }
        if upload.bytes.len() > self.max_bytes {
            return Err(AppError::bad_request(format!(
                "{label} exceeds the {} byte upload limit",
                self.max_bytes
            )));
        }

        let mime_type =
            infer_mime_type(upload.content_type.as_deref(), upload.file_name.as_deref());
        if !mime_type.starts_with("image/") {
            return Err(AppError::bad_request(format!(
                "{label} must be an image (got {mime_type})"
            )));
        }
        Ok(mime_type)
    }

    /// Write an upload under `folder` and return its public URL.
    pub async fn store(&self, folder: MediaFolder, upload: &Upload) -> Result<String, AppError> {
        let mime_type = self.validate(upload)?;
        let extension = file_extension(&mime_type, upload.file_name.as_deref());
        let file_name = format!("{}.{extension}", uuid::Uuid::new_v4());

        let dir = self.root.join(folder.as_str());
        tokio::fs::create_dir_all(&dir).await.map_err(|error| {
            AppError::internal(format!("Failed to create media directory: {}", sanitize(&error)))
        })?;
        tokio::fs::write(dir.join(&file_name), &upload.bytes)
            .await
            .map_err(|error| {
                AppError::internal(format!("Failed to store upload: {}", sanitize(&error)))
            })?;

        tracing::debug!(
            folder = folder.as_str(),
            bytes = upload.bytes.len(),
            mime_type = %mime_type,
            "Stored upload"
        );
        Ok(format!("{PUBLIC_PREFIX}/{}/{file_name}", folder.as_str()))
    }

    /// Delete the file behind a public URL. Failures are logged, not returned.
    pub async fn remove(&self, url: &str) {
        let Some(path) = self.path_for_url(url) else {
            tracing::warn!(url_len = url.len(), "Ignoring removal of non-local media URL");
            return;
        };

        match tokio::fs::remove_file(&path).await {
            Ok(()) => tracing::debug!("Removed media file {}", path.display()),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {}
            Err(error) => {
                tracing::warn!("Failed to remove media file {}: {}", path.display(), error);
            }
        }
    }

    pub async fn remove_all(&self, urls: &[String]) {
        for url in urls {
            self.remove(url).await;
        }
    }

    fn path_for_url(&self, url: &str) -> Option<PathBuf> {
        let relative = url.strip_prefix(PUBLIC_PREFIX)?.strip_prefix('/')?;
        let (folder, file_name) = relative.split_once('/')?;
        if !matches!(folder, "brands" | "models") {
            return None;
        }
        if file_name.is_empty() || file_name.contains(['/', '\\']) || file_name.contains("..") {
            return None;
        }
        Some(self.root.join(folder).join(file_name))
    }
}

/// Resolve a MIME type from the declared content type, falling back to the file name.
fn infer_mime_type(content_type: Option<&str>, file_name: Option<&str>) -> String {
    let extension_guess = file_name
        .and_then(|name| mime_guess::from_path(name).first_raw())
        .map(str::to_string);

    if let Some(content_type) = content_type {
        let normalized = content_type.trim().to_ascii_lowercase();
        if !normalized.is_empty() && normalized != "application/octet-stream" {
            return normalized;
        }
    }

    extension_guess.unwrap_or_else(|| "application/octet-stream".to_string())
}

fn file_extension(mime_type: &str, file_name: Option<&str>) -> String {
    let from_name = file_name
        .and_then(|name| Path::new(name).extension())
        .and_then(|extension| extension.to_str())
        .map(str::to_ascii_lowercase)
        .filter(|extension| {
            extension.len() <= 5
                && extension.chars().all(|ch| ch.is_ascii_alphanumeric())
                && mime_guess::from_ext(extension)
                    .first_raw()
                    .is_some_and(|guess| guess == mime_type)
        });

    from_name
        .or_else(|| {
            mime_guess::get_mime_extensions_str(mime_type)
                .and_then(|extensions| extensions.first())
                .map(|extension| (*extension).to_string())
        })
        .unwrap_or_else(|| "img".to_string())
}

fn sanitize(error: &impl std::fmt::Display) -> String {
    error.to_string().replace('\n', " ").trim().to_string()
}
