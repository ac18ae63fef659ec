use crate::error::Result;
use crate::models::{LeechSummary, NewChapter, NewComic};

/// Retrieves raw pages and images from source sites.
#[async_trait::async_trait]
pub trait FetchProxy: Send + Sync {
    /// Fetch the HTML text of a page. Transport and non-2xx failures are
    /// reported as proxy errors.
    async fn fetch_raw_html(&self, url: &str) -> Result<String>;

    /// Fetch raw bytes, used to re-host images.
    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>>;
}

/// Re-hosts image bytes on local storage.
#[async_trait::async_trait]
pub trait ImageUploader: Send + Sync {
    /// Returns the stored URL, or `None` when the upload failed.
    async fn upload_image_bytes(
        &self,
        bytes: &[u8],
        folder: Option<&str>,
        chapter_number: Option<f64>,
        index: Option<usize>,
    ) -> Option<String>;
}

/// Persistence of imported comics and chapters.
#[async_trait::async_trait]
pub trait CatalogStore: Send + Sync {
    /// Persist a new comic and return its id.
    async fn save_comic(&self, comic: &NewComic) -> Result<String>;

    /// Persist a chapter with its ordered pages and return the chapter id.
    async fn save_chapter(&self, comic_id: &str, chapter: &NewChapter) -> Result<String>;
}

/// One progress update per chapter start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressUpdate {
    /// 1-based position in the selection.
    pub index: usize,
    pub total: usize,
    pub title: String,
}

impl std::fmt::Display for ProgressUpdate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}: {}", self.index, self.total, self.title)
    }
}

pub trait ProgressReporter: Send + Sync {
    fn chapter_started(&self, update: &ProgressUpdate);

    fn finished(&self, _summary: &LeechSummary) {}
}

/// Politeness policy applied between chapters.
#[async_trait::async_trait]
pub trait Pacer: Send + Sync {
    async fn pause(&self);
}
