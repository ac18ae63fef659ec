//! Leech orchestration: scan a comic page, let the operator pick chapters,
//! then import them one at a time.
//!
//! A [`Leecher`] owns at most one job. Chapters are processed strictly in
//! selection order with a single request in flight, and every failure is
//! pinned to the chapter that caused it so one bad chapter never aborts the
//! batch or touches chapters that were already saved.

use crate::config::SiteConfig;
use crate::error::{LeechError, Result};
use crate::models::{
    ChapterRef, EmptyResultWarning, JobState, LeechJob, LeechSummary, NewChapter, NewComic,
    ScanResult, StorageMode,
};
use crate::pacing::FixedDelay;
use crate::parsers::{parse_chapter_images, parse_comic_page};
use crate::traits::{CatalogStore, FetchProxy, ImageUploader, Pacer, ProgressReporter, ProgressUpdate};
use crate::url_resolver::origin_of;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Which scanned chapters to import.
#[derive(Debug, Clone, PartialEq)]
pub enum ChapterSelection {
    All,
    /// The `n` newest chapters.
    Latest(usize),
    Numbers(Vec<f64>),
}

/// Picks chapters out of a scan, keeping scan order.
pub fn select_chapters(scanned: &[ChapterRef], selection: &ChapterSelection) -> Vec<ChapterRef> {
    match selection {
        ChapterSelection::All => scanned.to_vec(),
        ChapterSelection::Latest(n) => scanned.iter().take(*n).cloned().collect(),
        ChapterSelection::Numbers(numbers) => scanned
            .iter()
            .filter(|c| numbers.iter().any(|n| (c.number - n).abs() < 1e-9))
            .cloned()
            .collect(),
    }
}

enum ChapterOutcome {
    Saved(usize),
    NoImages,
}

pub struct Leecher {
    proxy: Arc<dyn FetchProxy>,
    uploader: Arc<dyn ImageUploader>,
    store: Arc<dyn CatalogStore>,
    pacer: Arc<dyn Pacer>,
    cancel: CancellationToken,
    state: JobState,
    scanned: Option<ScanResult>,
    warnings: Vec<EmptyResultWarning>,
}

impl Leecher {
    pub fn new(
        proxy: Arc<dyn FetchProxy>,
        uploader: Arc<dyn ImageUploader>,
        store: Arc<dyn CatalogStore>,
    ) -> Self {
        Self {
            proxy,
            uploader,
            store,
            pacer: Arc::new(FixedDelay::default()),
            cancel: CancellationToken::new(),
            state: JobState::Idle,
            scanned: None,
            warnings: Vec::new(),
        }
    }

    pub fn with_pacer(mut self, pacer: Arc<dyn Pacer>) -> Self {
        self.pacer = pacer;
        self
    }

    pub fn state(&self) -> &JobState {
        &self.state
    }

    /// Result of the last successful scan.
    pub fn scanned(&self) -> Option<&ScanResult> {
        self.scanned.as_ref()
    }

    /// Empty-result diagnostics from the last scan and leech run.
    pub fn warnings(&self) -> &[EmptyResultWarning] {
        &self.warnings
    }

    /// Token the operator cancels to stop a run after the current chapter.
    ///
    /// A cancelled run swaps in a fresh token, so fetch a new one before
    /// the next run.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Fetches and parses a comic page.
    ///
    /// Configuration errors and proxy failures leave the leecher `Idle` with
    /// nothing scanned; a page without chapters still reaches
    /// `AwaitingSelection` with a [`EmptyResultWarning::NoChapters`].
    pub async fn scan(&mut self, config: &SiteConfig, comic_url: &str) -> Result<ScanResult> {
        if self.state.is_busy() {
            return Err(LeechError::invalid_state(format!("cannot scan while {:?}", self.state)));
        }

        self.state = JobState::Scanning;
        self.scanned = None;
        self.warnings.clear();
        info!("[LEECH] Scanning comic from: {}", comic_url);

        match self.fetch_and_parse_comic(config, comic_url).await {
            Ok(result) => {
                if result.chapters.is_empty() {
                    warn!("[LEECH] {} ({})", EmptyResultWarning::NoChapters, comic_url);
                    self.warnings.push(EmptyResultWarning::NoChapters);
                }
                info!(
                    "[LEECH] Scan found {} chapters for comic: {}",
                    result.chapters.len(),
                    result.title
                );
                self.scanned = Some(result.clone());
                self.state = JobState::AwaitingSelection;
                Ok(result)
            }
            Err(e) => {
                error!("[LEECH] Scan failed for {}: {}", comic_url, e);
                self.state = JobState::Idle;
                Err(e)
            }
        }
    }

    async fn fetch_and_parse_comic(&self, config: &SiteConfig, comic_url: &str) -> Result<ScanResult> {
        if origin_of(comic_url).is_none() {
            return Err(LeechError::configuration(format!(
                "comic URL `{}` is not an absolute URL",
                comic_url
            )));
        }
        let html = self.proxy.fetch_raw_html(comic_url).await?;
        parse_comic_page(&html, config, comic_url)
    }

    /// Persists a new comic from a scan and returns its id. With
    /// `upload_cover_image` the cover is re-hosted, keeping the external URL
    /// when that fails.
    pub async fn import_comic(
        &self,
        config: &SiteConfig,
        scan: &ScanResult,
        comic_url: &str,
    ) -> Result<String> {
        let mut cover_url = scan.cover_image.clone();
        if config.upload_cover_image() && !cover_url.is_empty() {
            match self.rehost_image(&cover_url, "covers", None, None).await {
                Some(hosted) => cover_url = hosted,
                None => warn!("[LEECH] Keeping external cover URL: {}", cover_url),
            }
        }

        self.store
            .save_comic(&NewComic {
                title: scan.title.clone(),
                author: scan.author.clone(),
                description: scan.description.clone(),
                cover_url,
                source_url: comic_url.to_string(),
                site: config.name().to_string(),
            })
            .await
    }

    /// Imports the selected chapters into `comic_id`.
    ///
    /// The selection must be non-empty and come from the last scan. Chapter
    /// failures are collected into the summary; the call itself only fails
    /// when the run cannot start.
    pub async fn leech(
        &mut self,
        config: &SiteConfig,
        comic_id: &str,
        selected: Vec<ChapterRef>,
        storage_mode: StorageMode,
        reporter: &dyn ProgressReporter,
    ) -> Result<LeechSummary> {
        match &self.state {
            JobState::AwaitingSelection | JobState::Completed(_) | JobState::PartiallyFailed(_) => {}
            other => {
                return Err(LeechError::invalid_state(format!(
                    "cannot leech while {:?}, scan a comic first",
                    other
                )))
            }
        }
        if comic_id.trim().is_empty() {
            return Err(LeechError::configuration("a target comic id is required"));
        }
        if selected.is_empty() {
            return Err(LeechError::configuration("no chapters selected"));
        }
        let scanned = self
            .scanned
            .as_ref()
            .ok_or_else(|| LeechError::invalid_state("no scan result to select from"))?;
        if let Some(unknown) = selected
            .iter()
            .find(|c| !scanned.chapters.iter().any(|s| s.url == c.url))
        {
            return Err(LeechError::configuration(format!(
                "chapter `{}` is not part of the last scan",
                unknown.url
            )));
        }

        self.state = JobState::Leeching;
        let job = LeechJob::new(comic_id.to_string(), selected, storage_mode);
        info!(
            "[LEECH] Leeching {} chapters into comic {} ({} mode)",
            job.selected_chapters.len(),
            comic_id,
            storage_mode.as_str()
        );

        let summary = self.run_job(config, job, reporter).await;
        if summary.cancelled {
            self.cancel = CancellationToken::new();
        }
        reporter.finished(&summary);
        info!("[LEECH] {}", summary);

        self.state = if summary.is_partial() {
            JobState::PartiallyFailed(summary.clone())
        } else {
            JobState::Completed(summary.clone())
        };
        Ok(summary)
    }

    async fn run_job(
        &mut self,
        config: &SiteConfig,
        mut job: LeechJob,
        reporter: &dyn ProgressReporter,
    ) -> LeechSummary {
        let chapters = std::mem::take(&mut job.selected_chapters);
        let total = chapters.len();
        let mut cancelled = false;

        for (index, chapter) in chapters.iter().enumerate() {
            if index > 0 {
                tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => {}
                    _ = self.pacer.pause() => {}
                }
            }
            if self.cancel.is_cancelled() {
                warn!("[LEECH] Cancelled before chapter {}/{}", index + 1, total);
                cancelled = true;
                break;
            }

            let update = ProgressUpdate {
                index: index + 1,
                total,
                title: chapter.title.clone(),
            };
            job.progress_text = update.to_string();
            reporter.chapter_started(&update);

            match self.leech_chapter(config, &job.comic_id, chapter, job.storage_mode).await {
                Ok(ChapterOutcome::Saved(pages)) => {
                    job.success_count += 1;
                    info!("[LEECH] Saved {} ({} pages)", chapter.title, pages);
                }
                Ok(ChapterOutcome::NoImages) => {
                    let warning = EmptyResultWarning::NoImages {
                        chapter: chapter.title.clone(),
                    };
                    warn!("[LEECH] {} ({})", warning, chapter.url);
                    job.errors.push(warning.to_string());
                    self.warnings.push(warning);
                }
                Err(e) => {
                    warn!("[LEECH] Failed to leech {}: {}", chapter.title, e);
                    job.errors.push(format!("{}: {}", chapter.title, e));
                }
            }
        }

        LeechSummary {
            success_count: job.success_count,
            total,
            errors: job.errors,
            cancelled,
        }
    }

    async fn leech_chapter(
        &self,
        config: &SiteConfig,
        comic_id: &str,
        chapter: &ChapterRef,
        storage_mode: StorageMode,
    ) -> Result<ChapterOutcome> {
        let html = self.proxy.fetch_raw_html(&chapter.url).await?;
        let images = parse_chapter_images(&html, config, &chapter.url);
        if images.is_empty() {
            return Ok(ChapterOutcome::NoImages);
        }

        let pages = match storage_mode {
            StorageMode::Url => images,
            StorageMode::Upload => self.rehost_chapter_images(comic_id, chapter, images).await,
        };
        let page_count = pages.len();

        self.store
            .save_chapter(
                comic_id,
                &NewChapter {
                    title: chapter.title.clone(),
                    number: chapter.number,
                    source_url: chapter.url.clone(),
                    pages,
                    storage_mode,
                },
            )
            .await?;

        Ok(ChapterOutcome::Saved(page_count))
    }

    /// Re-hosts images one by one; an image that cannot be re-hosted keeps
    /// its original URL.
    async fn rehost_chapter_images(
        &self,
        comic_id: &str,
        chapter: &ChapterRef,
        images: Vec<String>,
    ) -> Vec<String> {
        let mut pages = Vec::with_capacity(images.len());
        for (index, image_url) in images.into_iter().enumerate() {
            match self
                .rehost_image(&image_url, comic_id, Some(chapter.number), Some(index))
                .await
            {
                Some(hosted) => pages.push(hosted),
                None => {
                    warn!(
                        "[LEECH] Keeping external URL for page {} of {}: {}",
                        index + 1,
                        chapter.title,
                        image_url
                    );
                    pages.push(image_url);
                }
            }
        }
        pages
    }

    async fn rehost_image(
        &self,
        image_url: &str,
        folder: &str,
        chapter_number: Option<f64>,
        index: Option<usize>,
    ) -> Option<String> {
        let bytes = match self.proxy.fetch_bytes(image_url).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("[LEECH] Failed to fetch image {}: {}", image_url, e);
                return None;
            }
        };
        self.uploader
            .upload_image_bytes(&bytes, Some(folder), chapter_number, index)
            .await
            .filter(|url| !url.trim().is_empty())
    }
}
