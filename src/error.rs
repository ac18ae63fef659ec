use thiserror::Error;

#[derive(Error, Debug)]
pub enum LeechError {
    /// Invalid site configuration or an unusable page URL. Never retried.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The fetch proxy could not retrieve a page or image.
    #[error("Proxy error: {0}")]
    Proxy(String),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Config file error: {0}")]
    ConfigFile(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("URL parsing error: {0}")]
    Url(#[from] url::ParseError),

    #[error("Comic not found: {0}")]
    ComicNotFound(String),

    #[error("Site not configured: {0}")]
    SiteNotConfigured(String),

    #[error("Invalid job state: {0}")]
    InvalidState(String),
}

impl LeechError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn proxy(msg: impl Into<String>) -> Self {
        Self::Proxy(msg.into())
    }

    pub fn comic_not_found(comic_id: impl Into<String>) -> Self {
        Self::ComicNotFound(comic_id.into())
    }

    pub fn site_not_configured(site: impl Into<String>) -> Self {
        Self::SiteNotConfigured(site.into())
    }

    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }

    /// Errors the operator fixes by editing the site config.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_) | Self::Url(_))
    }

    /// Transport failures of the fetch proxy.
    pub fn is_proxy(&self) -> bool {
        matches!(self, Self::Proxy(_) | Self::Http(_))
    }
}

pub type Result<T> = std::result::Result<T, LeechError>;
