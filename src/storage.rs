use crate::config::StorageConfig;
use crate::error::Result;
use crate::traits::ImageUploader;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use uuid::Uuid;

/// Re-hosts leeched images under `base_path`, served at `public_url`.
pub struct StorageManager {
    config: StorageConfig,
}

impl StorageManager {
    pub fn new(config: &StorageConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    /// Path relative to `base_path` for one stored image.
    fn relative_path(
        &self,
        folder: Option<&str>,
        chapter_number: Option<f64>,
        index: Option<usize>,
        extension: &str,
    ) -> PathBuf {
        let mut path = PathBuf::new();
        path.push(
            folder
                .map(|f| self.sanitize_filename(f))
                .filter(|f| !f.is_empty())
                .unwrap_or_else(|| "misc".to_string()),
        );
        if let Some(number) = chapter_number {
            path.push(format!("chapter_{}", number));
        }
        let filename = match index {
            Some(index) => format!("page_{:03}.{}", index + 1, extension),
            None => format!("{}.{}", Uuid::new_v4(), extension),
        };
        path.push(filename);
        path
    }

    async fn write_image(&self, relative: &Path, bytes: &[u8]) -> Result<PathBuf> {
        let full = Path::new(&self.config.base_path).join(relative);
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&full, bytes).await?;
        Ok(full)
    }

    fn public_url(&self, relative: &Path) -> String {
        let relative = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/");
        format!("{}/{}", self.config.public_url.trim_end_matches('/'), relative)
    }

    fn sanitize_filename(&self, filename: &str) -> String {
        filename
            .chars()
            .map(|c| match c {
                '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
                c if c.is_control() => '_',
                c => c,
            })
            .collect::<String>()
            .trim_matches('.')
            .trim_matches(' ')
            .to_string()
    }
}

#[async_trait::async_trait]
impl ImageUploader for StorageManager {
    async fn upload_image_bytes(
        &self,
        bytes: &[u8],
        folder: Option<&str>,
        chapter_number: Option<f64>,
        index: Option<usize>,
    ) -> Option<String> {
        if bytes.is_empty() {
            warn!("[STORAGE] refusing to store an empty image");
            return None;
        }

        let relative = self.relative_path(folder, chapter_number, index, image_extension(bytes));
        match self.write_image(&relative, bytes).await {
            Ok(full) => {
                info!("[STORAGE] Stored {} bytes at {:?}", bytes.len(), full);
                Some(self.public_url(&relative))
            }
            Err(e) => {
                warn!("[STORAGE] Failed to store image {:?}: {}", relative, e);
                None
            }
        }
    }
}

/// File extension guessed from the image's magic bytes.
fn image_extension(bytes: &[u8]) -> &'static str {
    match bytes {
        [0x89, b'P', b'N', b'G', ..] => "png",
        [b'G', b'I', b'F', b'8', ..] => "gif",
        [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => "webp",
        _ => "jpg",
    }
}
