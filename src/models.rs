use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Pointer to a not-yet-imported chapter, produced by scanning a comic page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChapterRef {
    pub url: String,
    pub title: String,
    pub number: f64,
}

/// Parsed comic listing page. Empty strings mean "not found".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScanResult {
    pub title: String,
    pub author: String,
    pub description: String,
    pub cover_image: String,
    pub chapters: Vec<ChapterRef>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageMode {
    /// Keep the source site's image URLs.
    #[default]
    Url,
    /// Download every image and re-host it.
    Upload,
}

impl StorageMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageMode::Url => "url",
            StorageMode::Upload => "upload",
        }
    }
}

/// Empty results that point at a selector misconfiguration rather than a
/// transient fault.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmptyResultWarning {
    NoChapters,
    NoImages { chapter: String },
}

impl std::fmt::Display for EmptyResultWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EmptyResultWarning::NoChapters => {
                write!(f, "no chapters found, check the chapter link selector")
            }
            EmptyResultWarning::NoImages { chapter } => {
                write!(f, "{}: no images found, check the chapter image selector", chapter)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum JobState {
    Idle,
    Scanning,
    AwaitingSelection,
    Leeching,
    Completed(LeechSummary),
    PartiallyFailed(LeechSummary),
}

impl JobState {
    pub fn is_busy(&self) -> bool {
        matches!(self, JobState::Scanning | JobState::Leeching)
    }
}

/// State of one leech run. Lives only while the run is in progress.
#[derive(Debug, Clone)]
pub struct LeechJob {
    pub comic_id: String,
    pub selected_chapters: Vec<ChapterRef>,
    pub storage_mode: StorageMode,
    pub progress_text: String,
    pub errors: Vec<String>,
    pub success_count: usize,
}

impl LeechJob {
    pub fn new(comic_id: String, selected_chapters: Vec<ChapterRef>, storage_mode: StorageMode) -> Self {
        Self {
            comic_id,
            selected_chapters,
            storage_mode,
            progress_text: String::new(),
            errors: Vec::new(),
            success_count: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeechSummary {
    pub success_count: usize,
    pub total: usize,
    /// One entry per chapter that was not saved. Selector diagnostics for
    /// chapters without images land here too, next to fetch and store errors.
    pub errors: Vec<String>,
    pub cancelled: bool,
}

impl LeechSummary {
    pub fn failed_count(&self) -> usize {
        self.errors.len()
    }

    pub fn is_partial(&self) -> bool {
        self.success_count > 0 && !self.errors.is_empty()
    }
}

impl std::fmt::Display for LeechSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Completed: {} succeeded, {} failed",
            self.success_count,
            self.errors.len()
        )?;
        if self.cancelled {
            write!(f, " (cancelled)")?;
        }
        Ok(())
    }
}

/// Comic metadata handed to the catalog store.
#[derive(Debug, Clone, PartialEq)]
pub struct NewComic {
    pub title: String,
    pub author: String,
    pub description: String,
    pub cover_url: String,
    pub source_url: String,
    pub site: String,
}

/// Chapter handed to the catalog store; `pages` are in reading order.
#[derive(Debug, Clone, PartialEq)]
pub struct NewChapter {
    pub title: String,
    pub number: f64,
    pub source_url: String,
    pub pages: Vec<String>,
    pub storage_mode: StorageMode,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Comic {
    pub id: String,
    pub title: String,
    pub author: String,
    pub description: String,
    pub cover_url: String,
    pub source_url: String,
    pub site: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Chapter {
    pub id: String,
    pub comic_id: String,
    pub title: String,
    pub number: f64,
    pub source_url: String,
    pub page_count: i32,
    pub storage_mode: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ChapterPage {
    pub id: String,
    pub chapter_id: String,
    pub page_number: i32,
    pub image_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct LeechLog {
    pub id: String,
    pub comic_id: String,
    pub site: String,
    pub storage_mode: String,
    pub total: i64,
    pub succeeded: i64,
    pub failed: i64,
    pub cancelled: bool,
    pub error_log: String,
    pub duration_ms: i64,
    pub created_at: DateTime<Utc>,
}

impl Comic {
    pub fn new(new: &NewComic) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            title: new.title.clone(),
            author: new.author.clone(),
            description: new.description.clone(),
            cover_url: new.cover_url.clone(),
            source_url: new.source_url.clone(),
            site: new.site.clone(),
            created_at: now,
            updated_at: now,
        }
    }
}

impl Chapter {
    pub fn new(comic_id: String, new: &NewChapter) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            comic_id,
            title: new.title.clone(),
            number: new.number,
            source_url: new.source_url.clone(),
            page_count: new.pages.len() as i32,
            storage_mode: new.storage_mode.as_str().to_string(),
            created_at: now,
            updated_at: now,
        }
    }
}

impl ChapterPage {
    pub fn new(chapter_id: String, page_number: i32, image_url: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            chapter_id,
            page_number,
            image_url,
        }
    }
}

impl LeechLog {
    pub fn new(comic_id: String, site: String, storage_mode: StorageMode, summary: &LeechSummary) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            comic_id,
            site,
            storage_mode: storage_mode.as_str().to_string(),
            total: summary.total as i64,
            succeeded: summary.success_count as i64,
            failed: summary.failed_count() as i64,
            cancelled: summary.cancelled,
            error_log: summary.errors.join("\n"),
            duration_ms: 0,
            created_at: Utc::now(),
        }
    }
}
