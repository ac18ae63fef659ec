use anyhow::Result;
use clap::{Parser, Subcommand};
use comicleech::config::Config;
use comicleech::database::Database;
use comicleech::leech::{select_chapters, ChapterSelection, Leecher};
use comicleech::models::{LeechLog, StorageMode};
use comicleech::pacing::FixedDelay;
use comicleech::progress::BarReporter;
use comicleech::storage::StorageManager;
use comicleech::utils::HttpClient;
use comicleech::{LeechError, SiteConfig};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "comicleech")]
#[command(about = "Import comics and chapters from configured source websites")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration (if missing) and initialize the database
    Init,
    /// Scan a comic page and list its chapters
    Scan {
        /// Site id from config.toml or the database
        site: String,
        /// Comic page URL
        url: String,
        /// Print the scan result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Scan a comic page and import the selected chapters
    Leech {
        /// Site id from config.toml or the database
        site: String,
        /// Comic page URL
        url: String,
        /// Existing comic to attach chapters to; a new comic is created otherwise
        #[arg(long)]
        comic_id: Option<String>,
        /// Import every chapter
        #[arg(long, conflicts_with_all = ["latest", "chapters"])]
        all: bool,
        /// Import the N newest chapters
        #[arg(long, conflicts_with = "chapters")]
        latest: Option<usize>,
        /// Import specific chapter numbers, e.g. 1,2.5,10
        #[arg(long, value_delimiter = ',')]
        chapters: Vec<f64>,
        /// Re-host images instead of linking to the source
        #[arg(long)]
        upload: bool,
        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
    },
    /// List configured sites
    Sites,
    /// Remove a site configuration stored in the database
    SiteRemove {
        /// Site id
        id: String,
    },
    /// Show imported comics and their last leech run
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose)?;

    if matches!(cli.command, Commands::Init) && !Path::new(&cli.config).exists() {
        Config::default().save(&cli.config)?;
        println!("📝 Wrote default configuration to {}", cli.config);
    }

    let config = Config::load(&cli.config)?;
    let db = Arc::new(Database::new(&config.database.url, config.database.max_connections).await?);

    match cli.command {
        Commands::Init => {
            info!("Initializing comicleech...");
            db.init().await?;
            run_init(&config, &db).await?;
        }
        Commands::Scan { site, url, json } => {
            run_scan(&config, &db, &site, &url, json).await?;
        }
        Commands::Leech {
            site,
            url,
            comic_id,
            all,
            latest,
            chapters,
            upload,
            json,
        } => {
            let selection = if !chapters.is_empty() {
                ChapterSelection::Numbers(chapters)
            } else if let Some(n) = latest {
                ChapterSelection::Latest(n)
            } else if all {
                ChapterSelection::All
            } else {
                anyhow::bail!("Choose chapters with --all, --latest N or --chapters 1,2.5");
            };
            let mode = if upload { StorageMode::Upload } else { StorageMode::Url };
            run_leech(&config, db, &site, &url, comic_id, selection, mode, json).await?;
        }
        Commands::Sites => {
            show_sites(&config, &db).await?;
        }
        Commands::SiteRemove { id } => {
            if db.delete_site_config(&id).await? {
                println!("🗑️ Removed site '{}' from the database", id);
            } else {
                println!("⚠️ No site '{}' stored in the database", id);
            }
        }
        Commands::Status => {
            show_status(&db).await?;
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) -> Result<()> {
    let level = if verbose { "debug" } else { "info" };

    tracing_subscriber::fmt()
        .with_env_filter(format!("comicleech={}", level))
        .with_target(false)
        .init();

    Ok(())
}

/// Copies file-configured sites into the database unless already stored.
async fn run_init(config: &Config, db: &Database) -> Result<()> {
    for (id, settings) in &config.sites {
        if let Err(e) = SiteConfig::new(settings.clone()) {
            warn!("⚠️ Skipping invalid site '{}': {}", id, e);
            continue;
        }
        if db.get_site_config(id).await?.is_some() {
            info!("Site '{}' already exists in database", id);
        } else {
            db.save_site_config(id, settings).await?;
            info!("Added site '{}' to database", id);
        }
    }

    println!("✅ Database initialized at {}", config.database.url);
    Ok(())
}

/// Database site configs take precedence over `config.toml`.
async fn resolve_site(config: &Config, db: &Database, site: &str) -> Result<SiteConfig> {
    let settings = match db.get_site_config(site).await? {
        Some(settings) => settings,
        None => config
            .get_site_settings(site)
            .cloned()
            .ok_or_else(|| LeechError::site_not_configured(site))?,
    };
    Ok(SiteConfig::new(settings)?)
}

fn build_leecher(config: &Config, site: &SiteConfig, db: Arc<Database>) -> Result<Leecher> {
    let http = HttpClient::new(&config.leech, site.settings())?;
    let storage = StorageManager::new(&config.storage);
    Ok(Leecher::new(Arc::new(http), Arc::new(storage), db)
        .with_pacer(Arc::new(FixedDelay::from_millis(config.leech.chapter_delay_ms))))
}

async fn run_scan(config: &Config, db: &Arc<Database>, site: &str, url: &str, json: bool) -> Result<()> {
    let site_config = resolve_site(config, db, site).await?;
    let mut leecher = build_leecher(config, &site_config, db.clone())?;

    let scan = leecher.scan(&site_config, url).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&scan)?);
        return Ok(());
    }

    println!("📖 {}", scan.title);
    if !scan.author.is_empty() {
        println!("✍️  {}", scan.author);
    }
    if !scan.cover_image.is_empty() {
        println!("🖼️  {}", scan.cover_image);
    }
    for warning in leecher.warnings() {
        println!("⚠️ {}", warning);
    }
    println!("{:<10} {:<40} {}", "Number", "Title", "URL");
    println!("{}", "-".repeat(90));
    for chapter in &scan.chapters {
        println!("{:<10} {:<40} {}", chapter.number, chapter.title, chapter.url);
    }

    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn run_leech(
    config: &Config,
    db: Arc<Database>,
    site: &str,
    url: &str,
    comic_id: Option<String>,
    selection: ChapterSelection,
    mode: StorageMode,
    json: bool,
) -> Result<()> {
    let site_config = resolve_site(config, &db, site).await?;
    let mut leecher = build_leecher(config, &site_config, db.clone())?;

    info!("📡 Scanning {}", url);
    let scan = leecher.scan(&site_config, url).await?;
    let selected = select_chapters(&scan.chapters, &selection);
    if selected.is_empty() {
        anyhow::bail!("No chapters of '{}' match the selection", scan.title);
    }

    let comic_id = match comic_id {
        Some(id) => {
            if db.get_comic_by_id(&id).await?.is_none() {
                return Err(LeechError::comic_not_found(id).into());
            }
            id
        }
        None => {
            let id = leecher.import_comic(&site_config, &scan, url).await?;
            println!("🆕 Created comic '{}' ({})", scan.title, id);
            id
        }
    };

    let token = leecher.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("⏹️ Cancelling after the current chapter...");
            token.cancel();
        }
    });

    info!("⬇️ Leeching {} chapters of '{}'", selected.len(), scan.title);
    let reporter = BarReporter::new(selected.len());
    let started = Instant::now();
    let summary = leecher
        .leech(&site_config, &comic_id, selected, mode, &reporter)
        .await?;

    let mut log = LeechLog::new(comic_id.clone(), site.to_string(), mode, &summary);
    log.duration_ms = started.elapsed().as_millis() as i64;
    db.create_leech_log(&log).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    let icon = if summary.errors.is_empty() { "✅" } else { "⚠️" };
    println!("{} {}", icon, summary);
    let diagnostics: Vec<String> = leecher.warnings().iter().map(ToString::to_string).collect();
    for error in &summary.errors {
        if diagnostics.contains(error) {
            println!("   🔎 {} (selector diagnostic)", error);
        } else {
            println!("   ❌ {}", error);
        }
    }

    Ok(())
}

async fn show_sites(config: &Config, db: &Database) -> Result<()> {
    let stored = db.list_site_configs().await?;

    println!("🌐 Configured sites:");
    println!("{:<15} {:<20} {:<35} {:<10}", "Id", "Name", "Base URL", "Source");
    println!("{}", "-".repeat(80));
    for (id, settings) in &stored {
        println!("{:<15} {:<20} {:<35} {:<10}", id, settings.name, settings.base_url, "database");
    }

    let mut file_sites: Vec<_> = config
        .sites
        .iter()
        .filter(|(id, _)| !stored.iter().any(|(stored_id, _)| stored_id == *id))
        .collect();
    file_sites.sort_by(|a, b| a.0.cmp(b.0));
    for (id, settings) in file_sites {
        println!("{:<15} {:<20} {:<35} {:<10}", id, settings.name, settings.base_url, "config");
    }

    Ok(())
}

async fn show_status(db: &Database) -> Result<()> {
    let comics = db.get_all_comics().await?;

    println!("📚 Imported comics:");
    println!(
        "{:<30} {:<10} {:<12} {:<12} {:<20}",
        "Title", "Chapters", "Site", "Updated", "Last Leech"
    );
    println!("{}", "-".repeat(90));

    for comic in comics {
        let chapters = db.get_chapters_by_comic_id(&comic.id).await?;
        let last_leech = db
            .get_leech_logs(&comic.id)
            .await?
            .first()
            .map(|log| format!("{}/{} ok, {} failed", log.succeeded, log.total, log.failed))
            .unwrap_or_else(|| "never".to_string());

        println!(
            "{:<30} {:<10} {:<12} {:<12} {:<20}",
            comic.title,
            chapters.len(),
            comic.site,
            comic.updated_at.format("%Y-%m-%d"),
            last_leech
        );
    }

    Ok(())
}
