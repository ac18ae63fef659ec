pub mod config;
pub mod database;
pub mod error;
pub mod leech;
pub mod models;
pub mod pacing;
pub mod parsers;
pub mod progress;
pub mod storage;
pub mod traits;
pub mod url_resolver;
pub mod utils;

pub use config::{Config, SiteConfig, SiteSettings};
pub use error::{LeechError, Result};
pub use leech::{select_chapters, ChapterSelection, Leecher};
