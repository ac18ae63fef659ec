use crate::config::SiteSettings;
use crate::error::Result;
use crate::models::*;
use crate::traits::CatalogStore;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use tracing::{debug, info};

pub struct Database {
    pub pool: SqlitePool,
}

impl Database {
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        info!("Connecting to database: {}", database_url);

        if let Some(path) = database_url.strip_prefix("sqlite:") {
            let path = std::path::Path::new(path.trim_start_matches("//"));
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    debug!("Creating directory: {:?}", parent);
                    std::fs::create_dir_all(parent)?;
                }
            }
        }

        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect_with(options)
            .await?;

        info!("Database connected successfully");
        Ok(Self { pool })
    }

    pub async fn init(&self) -> Result<()> {
        info!("Initializing database schema...");

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS comics (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                author TEXT NOT NULL DEFAULT '',
                description TEXT NOT NULL DEFAULT '',
                cover_url TEXT NOT NULL DEFAULT '',
                source_url TEXT NOT NULL,
                site TEXT NOT NULL,
                created_at DATETIME NOT NULL,
                updated_at DATETIME NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS chapters (
                id TEXT PRIMARY KEY,
                comic_id TEXT NOT NULL,
                title TEXT NOT NULL,
                number REAL NOT NULL,
                source_url TEXT NOT NULL,
                page_count INTEGER NOT NULL DEFAULT 0,
                storage_mode TEXT NOT NULL DEFAULT 'url',
                created_at DATETIME NOT NULL,
                updated_at DATETIME NOT NULL,
                FOREIGN KEY (comic_id) REFERENCES comics (id),
                UNIQUE(comic_id, source_url)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS chapter_pages (
                id TEXT PRIMARY KEY,
                chapter_id TEXT NOT NULL,
                page_number INTEGER NOT NULL,
                image_url TEXT NOT NULL,
                FOREIGN KEY (chapter_id) REFERENCES chapters (id),
                UNIQUE(chapter_id, page_number)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS site_configs (
                id TEXT PRIMARY KEY,
                settings TEXT NOT NULL,
                created_at DATETIME NOT NULL,
                updated_at DATETIME NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS leech_logs (
                id TEXT PRIMARY KEY,
                comic_id TEXT NOT NULL,
                site TEXT NOT NULL,
                storage_mode TEXT NOT NULL,
                total INTEGER NOT NULL DEFAULT 0,
                succeeded INTEGER NOT NULL DEFAULT 0,
                failed INTEGER NOT NULL DEFAULT 0,
                cancelled BOOLEAN NOT NULL DEFAULT 0,
                error_log TEXT NOT NULL DEFAULT '',
                duration_ms INTEGER NOT NULL DEFAULT 0,
                created_at DATETIME NOT NULL,
                FOREIGN KEY (comic_id) REFERENCES comics (id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_chapters_comic_id ON chapters (comic_id, number)")
            .execute(&self.pool)
            .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_chapter_pages_chapter_id ON chapter_pages (chapter_id)")
            .execute(&self.pool)
            .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_leech_logs_comic_id ON leech_logs (comic_id)")
            .execute(&self.pool)
            .await?;

        info!("Database schema initialized successfully");
        Ok(())
    }

    // Comic operations
    pub async fn create_comic(&self, comic: &Comic) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO comics (id, title, author, description, cover_url, source_url, site, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&comic.id)
        .bind(&comic.title)
        .bind(&comic.author)
        .bind(&comic.description)
        .bind(&comic.cover_url)
        .bind(&comic.source_url)
        .bind(&comic.site)
        .bind(comic.created_at)
        .bind(comic.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn get_comic_by_id(&self, id: &str) -> Result<Option<Comic>> {
        let comic = sqlx::query_as::<_, Comic>("SELECT * FROM comics WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(comic)
    }

    pub async fn get_all_comics(&self) -> Result<Vec<Comic>> {
        let comics = sqlx::query_as::<_, Comic>("SELECT * FROM comics ORDER BY updated_at DESC")
            .fetch_all(&self.pool)
            .await?;

        Ok(comics)
    }

    // Chapter operations

    /// Inserts the chapter, or replaces title, number and pages of the chapter
    /// already imported from the same source URL.
    pub async fn upsert_chapter(&self, comic_id: &str, chapter: &NewChapter) -> Result<String> {
        let mut tx = self.pool.begin().await?;
        let now = Utc::now();

        let existing: Option<String> =
            sqlx::query_scalar("SELECT id FROM chapters WHERE comic_id = ? AND source_url = ?")
                .bind(comic_id)
                .bind(&chapter.source_url)
                .fetch_optional(&mut *tx)
                .await?;

        let chapter_id = match existing {
            Some(id) => {
                sqlx::query(
                    r#"
                    UPDATE chapters
                    SET title = ?, number = ?, page_count = ?, storage_mode = ?, updated_at = ?
                    WHERE id = ?
                    "#,
                )
                .bind(&chapter.title)
                .bind(chapter.number)
                .bind(chapter.pages.len() as i32)
                .bind(chapter.storage_mode.as_str())
                .bind(now)
                .bind(&id)
                .execute(&mut *tx)
                .await?;

                sqlx::query("DELETE FROM chapter_pages WHERE chapter_id = ?")
                    .bind(&id)
                    .execute(&mut *tx)
                    .await?;
                id
            }
            None => {
                let row = Chapter::new(comic_id.to_string(), chapter);
                sqlx::query(
                    r#"
                    INSERT INTO chapters (id, comic_id, title, number, source_url, page_count, storage_mode, created_at, updated_at)
                    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                    "#,
                )
                .bind(&row.id)
                .bind(&row.comic_id)
                .bind(&row.title)
                .bind(row.number)
                .bind(&row.source_url)
                .bind(row.page_count)
                .bind(&row.storage_mode)
                .bind(row.created_at)
                .bind(row.updated_at)
                .execute(&mut *tx)
                .await?;
                row.id
            }
        };

        for (index, image_url) in chapter.pages.iter().enumerate() {
            let page = ChapterPage::new(chapter_id.clone(), index as i32 + 1, image_url.clone());
            sqlx::query(
                "INSERT INTO chapter_pages (id, chapter_id, page_number, image_url) VALUES (?, ?, ?, ?)",
            )
            .bind(&page.id)
            .bind(&page.chapter_id)
            .bind(page.page_number)
            .bind(&page.image_url)
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query("UPDATE comics SET updated_at = ? WHERE id = ?")
            .bind(now)
            .bind(comic_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(chapter_id)
    }

    pub async fn get_chapters_by_comic_id(&self, comic_id: &str) -> Result<Vec<Chapter>> {
        let chapters = sqlx::query_as::<_, Chapter>(
            "SELECT * FROM chapters WHERE comic_id = ? ORDER BY number DESC",
        )
        .bind(comic_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(chapters)
    }

    pub async fn get_chapter_pages(&self, chapter_id: &str) -> Result<Vec<ChapterPage>> {
        let pages = sqlx::query_as::<_, ChapterPage>(
            "SELECT * FROM chapter_pages WHERE chapter_id = ? ORDER BY page_number",
        )
        .bind(chapter_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(pages)
    }

    // Site config operations
    pub async fn save_site_config(&self, id: &str, settings: &SiteSettings) -> Result<()> {
        let json = serde_json::to_string(settings)?;
        let now = Utc::now();
        sqlx::query(
            r#"
            INSERT INTO site_configs (id, settings, created_at, updated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET settings = excluded.settings, updated_at = excluded.updated_at
            "#,
        )
        .bind(id)
        .bind(json)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn get_site_config(&self, id: &str) -> Result<Option<SiteSettings>> {
        let row = sqlx::query("SELECT settings FROM site_configs WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let json: String = row.try_get("settings")?;
                Ok(Some(serde_json::from_str(&json)?))
            }
            None => Ok(None),
        }
    }

    pub async fn list_site_configs(&self) -> Result<Vec<(String, SiteSettings)>> {
        let rows = sqlx::query("SELECT id, settings FROM site_configs ORDER BY id")
            .fetch_all(&self.pool)
            .await?;

        let mut sites = Vec::with_capacity(rows.len());
        for row in rows {
            let id: String = row.try_get("id")?;
            let json: String = row.try_get("settings")?;
            sites.push((id, serde_json::from_str(&json)?));
        }
        Ok(sites)
    }

    pub async fn delete_site_config(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM site_configs WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    // Leech log operations
    pub async fn create_leech_log(&self, log: &LeechLog) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO leech_logs (id, comic_id, site, storage_mode, total, succeeded, failed, cancelled, error_log, duration_ms, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&log.id)
        .bind(&log.comic_id)
        .bind(&log.site)
        .bind(&log.storage_mode)
        .bind(log.total)
        .bind(log.succeeded)
        .bind(log.failed)
        .bind(log.cancelled)
        .bind(&log.error_log)
        .bind(log.duration_ms)
        .bind(log.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn get_leech_logs(&self, comic_id: &str) -> Result<Vec<LeechLog>> {
        let logs = sqlx::query_as::<_, LeechLog>(
            "SELECT * FROM leech_logs WHERE comic_id = ? ORDER BY created_at DESC",
        )
        .bind(comic_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(logs)
    }
}

#[async_trait::async_trait]
impl CatalogStore for Database {
    async fn save_comic(&self, comic: &NewComic) -> Result<String> {
        let row = Comic::new(comic);
        self.create_comic(&row).await?;
        info!("Saved comic '{}' as {}", row.title, row.id);
        Ok(row.id)
    }

    async fn save_chapter(&self, comic_id: &str, chapter: &NewChapter) -> Result<String> {
        if self.get_comic_by_id(comic_id).await?.is_none() {
            return Err(crate::error::LeechError::comic_not_found(comic_id));
        }
        let id = self.upsert_chapter(comic_id, chapter).await?;
        debug!("Saved chapter '{}' ({} pages) as {}", chapter.title, chapter.pages.len(), id);
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_settings;

    async fn database(dir: &tempfile::TempDir) -> Database {
        let url = format!("sqlite:{}", dir.path().join("test.db").display());
        let db = Database::new(&url, 1).await.unwrap();
        db.init().await.unwrap();
        db
    }

    fn new_comic() -> NewComic {
        NewComic {
            title: "Test Comic".to_string(),
            author: "Author".to_string(),
            description: "Desc".to_string(),
            cover_url: "https://site.com/c.jpg".to_string(),
            source_url: "https://site.com/truyen/test".to_string(),
            site: "test".to_string(),
        }
    }

    fn new_chapter(number: f64, pages: &[&str]) -> NewChapter {
        NewChapter {
            title: format!("Chapter {}", number),
            number,
            source_url: format!("https://site.com/truyen/test/chap-{}", number),
            pages: pages.iter().map(|p| p.to_string()).collect(),
            storage_mode: StorageMode::Url,
        }
    }

    #[tokio::test]
    async fn saves_chapter_with_ordered_pages() {
        let dir = tempfile::tempdir().unwrap();
        let db = database(&dir).await;
        let comic_id = db.save_comic(&new_comic()).await.unwrap();

        let chapter_id = db
            .save_chapter(&comic_id, &new_chapter(1.0, &["b.jpg", "a.jpg", "c.jpg"]))
            .await
            .unwrap();

        let pages: Vec<String> = db
            .get_chapter_pages(&chapter_id)
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.image_url)
            .collect();
        assert_eq!(pages, vec!["b.jpg", "a.jpg", "c.jpg"]);

        let chapters = db.get_chapters_by_comic_id(&comic_id).await.unwrap();
        assert_eq!(chapters.len(), 1);
        assert_eq!(chapters[0].page_count, 3);
    }

    #[tokio::test]
    async fn releeching_replaces_pages() {
        let dir = tempfile::tempdir().unwrap();
        let db = database(&dir).await;
        let comic_id = db.save_comic(&new_comic()).await.unwrap();

        let first = db.save_chapter(&comic_id, &new_chapter(2.0, &["x.jpg"])).await.unwrap();
        let mut chapter = new_chapter(2.0, &["y.jpg", "z.jpg"]);
        chapter.storage_mode = StorageMode::Upload;
        let second = db.save_chapter(&comic_id, &chapter).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(db.get_chapter_pages(&first).await.unwrap().len(), 2);
        let chapters = db.get_chapters_by_comic_id(&comic_id).await.unwrap();
        assert_eq!(chapters.len(), 1);
        assert_eq!(chapters[0].storage_mode, "upload");
    }

    #[tokio::test]
    async fn chapter_for_unknown_comic_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let db = database(&dir).await;
        let err = db.save_chapter("missing", &new_chapter(1.0, &["a.jpg"])).await.unwrap_err();
        assert!(matches!(err, crate::error::LeechError::ComicNotFound(_)));
    }

    #[tokio::test]
    async fn site_config_crud() {
        let dir = tempfile::tempdir().unwrap();
        let db = database(&dir).await;
        let settings = test_settings("https://site.com");

        db.save_site_config("test", &settings).await.unwrap();
        assert_eq!(db.get_site_config("test").await.unwrap(), Some(settings.clone()));

        let mut updated = settings.clone();
        updated.upload_cover_image = true;
        db.save_site_config("test", &updated).await.unwrap();
        let listed = db.list_site_configs().await.unwrap();
        assert_eq!(listed, vec![("test".to_string(), updated)]);

        assert!(db.delete_site_config("test").await.unwrap());
        assert!(!db.delete_site_config("test").await.unwrap());
        assert_eq!(db.get_site_config("test").await.unwrap(), None);
    }

    #[tokio::test]
    async fn records_leech_log() {
        let dir = tempfile::tempdir().unwrap();
        let db = database(&dir).await;
        let comic_id = db.save_comic(&new_comic()).await.unwrap();
        let summary = LeechSummary {
            success_count: 2,
            total: 3,
            errors: vec!["Chapter 2: Proxy error: HTTP 500".to_string()],
            cancelled: false,
        };

        db.create_leech_log(&LeechLog::new(comic_id.clone(), "test".to_string(), StorageMode::Url, &summary))
            .await
            .unwrap();

        let logs = db.get_leech_logs(&comic_id).await.unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].succeeded, 2);
        assert_eq!(logs[0].failed, 1);
        assert_eq!(logs[0].error_log, "Chapter 2: Proxy error: HTTP 500");
    }
}
