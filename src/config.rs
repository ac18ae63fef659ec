use crate::error::{LeechError, Result};
use scraper::Selector;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use url::Url;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub storage: StorageConfig,
    #[serde(default)]
    pub leech: LeechConfig,
    #[serde(default)]
    pub sites: HashMap<String, SiteSettings>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory re-hosted images are written to.
    pub base_path: String,
    /// Public prefix under which `base_path` is served.
    pub public_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LeechConfig {
    pub chapter_delay_ms: u64,
    pub request_timeout_secs: u64,
    pub connect_timeout_secs: u64,
    pub requests_per_second: u32,
    pub user_agent: Option<String>,
}

impl Default for LeechConfig {
    fn default() -> Self {
        Self {
            chapter_delay_ms: 500,
            request_timeout_secs: 30,
            connect_timeout_secs: 10,
            requests_per_second: 2,
            user_agent: None,
        }
    }
}

/// Raw, serializable selector configuration for one source website.
///
/// Accepts the snake_case keys of `config.toml` as well as the camelCase keys
/// the admin panel exports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteSettings {
    #[serde(default)]
    pub name: String,
    #[serde(alias = "baseUrl")]
    pub base_url: String,
    #[serde(alias = "comicTitleSelector")]
    pub comic_title_selector: String,
    #[serde(alias = "comicCoverSelector")]
    pub comic_cover_selector: String,
    #[serde(default, alias = "comicAuthorSelector")]
    pub comic_author_selector: Option<String>,
    #[serde(alias = "comicDescriptionSelector")]
    pub comic_description_selector: String,
    #[serde(alias = "chapterLinkSelector")]
    pub chapter_link_selector: String,
    #[serde(alias = "chapterImageSelector")]
    pub chapter_image_selector: String,
    #[serde(default = "default_image_src_attribute", alias = "imageSrcAttribute")]
    pub image_src_attribute: String,
    #[serde(default, alias = "uploadCoverImage")]
    pub upload_cover_image: bool,
    #[serde(default, alias = "userAgent")]
    pub user_agent: Option<String>,
    #[serde(default)]
    pub headers: Option<HashMap<String, String>>,
}

fn default_image_src_attribute() -> String {
    "src".to_string()
}

#[derive(Debug, Clone)]
pub(crate) struct SiteSelectors {
    pub comic_title: Selector,
    pub comic_cover: Selector,
    pub comic_author: Option<Selector>,
    pub comic_description: Selector,
    pub chapter_link: Selector,
    pub chapter_image: Selector,
}

/// Validated site configuration. Selectors are parsed and the base URL is
/// checked once, here; parsers never see a malformed config.
#[derive(Debug, Clone)]
pub struct SiteConfig {
    settings: SiteSettings,
    base_url: Url,
    selectors: SiteSelectors,
    image_src_attributes: Vec<String>,
}

impl SiteConfig {
    pub fn new(settings: SiteSettings) -> Result<Self> {
        let base_url = Url::parse(settings.base_url.trim()).map_err(|e| {
            LeechError::configuration(format!("invalid base_url `{}`: {}", settings.base_url, e))
        })?;
        if !matches!(base_url.scheme(), "http" | "https") || base_url.host_str().is_none() {
            return Err(LeechError::configuration(format!(
                "base_url `{}` must be an absolute http(s) URL",
                settings.base_url
            )));
        }

        let comic_author = match settings.comic_author_selector.as_deref().map(str::trim) {
            Some(s) if !s.is_empty() => Some(parse_selector("comic_author_selector", s)?),
            _ => None,
        };

        let selectors = SiteSelectors {
            comic_title: parse_selector("comic_title_selector", &settings.comic_title_selector)?,
            comic_cover: parse_selector("comic_cover_selector", &settings.comic_cover_selector)?,
            comic_author,
            comic_description: parse_selector(
                "comic_description_selector",
                &settings.comic_description_selector,
            )?,
            chapter_link: parse_selector("chapter_link_selector", &settings.chapter_link_selector)?,
            chapter_image: parse_selector(
                "chapter_image_selector",
                &settings.chapter_image_selector,
            )?,
        };

        let image_src_attributes: Vec<String> = settings
            .image_src_attribute
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        if image_src_attributes.is_empty() {
            return Err(LeechError::configuration(
                "image_src_attribute must name at least one attribute",
            ));
        }

        Ok(Self {
            settings,
            base_url,
            selectors,
            image_src_attributes,
        })
    }

    pub fn settings(&self) -> &SiteSettings {
        &self.settings
    }

    pub fn name(&self) -> &str {
        &self.settings.name
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// `scheme://host[:port]` of the configured base URL.
    pub fn origin(&self) -> String {
        self.base_url.origin().ascii_serialization()
    }

    pub fn image_src_attributes(&self) -> &[String] {
        &self.image_src_attributes
    }

    pub fn upload_cover_image(&self) -> bool {
        self.settings.upload_cover_image
    }

    pub(crate) fn selectors(&self) -> &SiteSelectors {
        &self.selectors
    }
}

impl TryFrom<SiteSettings> for SiteConfig {
    type Error = LeechError;

    fn try_from(settings: SiteSettings) -> Result<Self> {
        Self::new(settings)
    }
}

fn parse_selector(field: &str, raw: &str) -> Result<Selector> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(LeechError::configuration(format!("{} must not be empty", field)));
    }
    Selector::parse(raw)
        .map_err(|e| LeechError::configuration(format!("invalid {} `{}`: {}", field, raw, e)))
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(config::Environment::with_prefix("COMICLEECH").separator("__"))
            .build()?
            .try_deserialize()?;
        Ok(config)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| LeechError::configuration(format!("cannot serialize config: {}", e)))?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn get_site_settings(&self, site_name: &str) -> Option<&SiteSettings> {
        self.sites.get(site_name)
    }
}

impl Default for Config {
    fn default() -> Self {
        let mut sites = HashMap::new();

        sites.insert(
            "truyenqq".to_string(),
            SiteSettings {
                name: "TruyenQQ".to_string(),
                base_url: "https://truyenqqto.com".to_string(),
                comic_title_selector: ".book_other h1".to_string(),
                comic_cover_selector: ".book_avatar img".to_string(),
                comic_author_selector: Some(".list-info .author".to_string()),
                comic_description_selector: ".story-detail-info p".to_string(),
                chapter_link_selector: ".works-chapter-item a".to_string(),
                chapter_image_selector: ".page-chapter img".to_string(),
                image_src_attribute: "data-original,data-src,src".to_string(),
                upload_cover_image: false,
                user_agent: None,
                headers: None,
            },
        );

        Config {
            database: DatabaseConfig {
                url: "sqlite:data/comicleech.db".to_string(),
                max_connections: 5,
            },
            storage: StorageConfig {
                base_path: "./uploads".to_string(),
                public_url: "/uploads".to_string(),
            },
            leech: LeechConfig::default(),
            sites,
        }
    }
}

#[cfg(test)]
pub(crate) fn test_settings(base_url: &str) -> SiteSettings {
    SiteSettings {
        name: "Test".to_string(),
        base_url: base_url.to_string(),
        comic_title_selector: "h1".to_string(),
        comic_cover_selector: ".cover img".to_string(),
        comic_author_selector: Some(".author".to_string()),
        comic_description_selector: ".description p".to_string(),
        chapter_link_selector: ".chapters a".to_string(),
        chapter_image_selector: ".reader img".to_string(),
        image_src_attribute: "src,data-src".to_string(),
        upload_cover_image: false,
        user_agent: None,
        headers: None,
    }
}
