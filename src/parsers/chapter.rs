use crate::config::SiteConfig;
use crate::url_resolver::{origin_of, resolve};
use scraper::Html;
use std::collections::HashSet;
use tracing::{debug, warn};

/// Ordered, deduplicated absolute image URLs of one chapter page.
///
/// Never fails: an unparseable `chapter_url` falls back to the configured base
/// origin, and an empty result means the selectors matched nothing usable.
pub fn parse_chapter_images(html: &str, config: &SiteConfig, chapter_url: &str) -> Vec<String> {
    let origin = origin_of(chapter_url).unwrap_or_else(|| {
        warn!(
            "[CHAPTER PARSER] chapter URL `{}` has no origin, using {}",
            chapter_url,
            config.origin()
        );
        config.origin()
    });

    let document = Html::parse_document(html);
    let attributes = config.image_src_attributes();
    let mut seen = HashSet::new();
    let mut images = Vec::new();

    for element in document.select(&config.selectors().chapter_image) {
        let source = attributes
            .iter()
            .filter_map(|name| element.value().attr(name))
            .map(str::trim)
            .find(|value| !value.is_empty());

        let Some(source) = source else {
            debug!("[CHAPTER PARSER] image element without a usable source attribute");
            continue;
        };

        let url = resolve(source, &origin);
        if seen.insert(url.clone()) {
            images.push(url);
        }
    }

    debug!("[CHAPTER PARSER] Found {} unique image URLs in {}", images.len(), chapter_url);
    images
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_settings;

    const CHAPTER_URL: &str = "https://site.com/truyen/abc/chap-1/";

    fn config() -> SiteConfig {
        SiteConfig::new(test_settings("https://site.com")).unwrap()
    }

    #[test]
    fn falls_back_to_later_attribute() {
        let html = r#"<div class="reader"><img src="" data-src="/img/1.jpg"></div>"#;
        let images = parse_chapter_images(html, &config(), CHAPTER_URL);
        assert_eq!(images, vec!["https://site.com/img/1.jpg"]);
    }

    #[test]
    fn attribute_order_is_respected() {
        let html = r#"<div class="reader"><img src="/placeholder.gif" data-src="/img/1.jpg"></div>"#;
        let images = parse_chapter_images(html, &config(), CHAPTER_URL);
        assert_eq!(images, vec!["https://site.com/placeholder.gif"]);

        let mut settings = test_settings("https://site.com");
        settings.image_src_attribute = "data-src, src".to_string();
        let lazy = SiteConfig::new(settings).unwrap();
        assert_eq!(
            parse_chapter_images(html, &lazy, CHAPTER_URL),
            vec!["https://site.com/img/1.jpg"]
        );
    }

    #[test]
    fn duplicates_collapse_to_first_position() {
        let html = r#"<div class="reader">
            <img src="/img/1.jpg">
            <img src="https://site.com/img/2.jpg">
            <img src="https://site.com/img/1.jpg">
            <img src=" /img/3.jpg ">
            <img src="/img/2.jpg">
        </div>"#;
        let images = parse_chapter_images(html, &config(), CHAPTER_URL);
        assert_eq!(
            images,
            vec![
                "https://site.com/img/1.jpg",
                "https://site.com/img/2.jpg",
                "https://site.com/img/3.jpg",
            ]
        );
    }

    #[test]
    fn elements_without_sources_are_skipped() {
        let html = r#"<div class="reader"><img alt="ad"><img src="  "><img data-src="//cdn.x.com/a.jpg"></div>"#;
        let images = parse_chapter_images(html, &config(), CHAPTER_URL);
        assert_eq!(images, vec!["https://cdn.x.com/a.jpg"]);
    }

    #[test]
    fn no_match_is_empty() {
        let html = r#"<div class="other"><img src="/img/1.jpg"></div>"#;
        assert!(parse_chapter_images(html, &config(), CHAPTER_URL).is_empty());
    }

    #[test]
    fn bad_chapter_url_uses_base_origin() {
        let html = r#"<div class="reader"><img src="/img/1.jpg"></div>"#;
        let images = parse_chapter_images(html, &config(), "not a url");
        assert_eq!(images, vec!["https://site.com/img/1.jpg"]);
    }

    #[test]
    fn bare_paths_resolve_against_root_not_chapter() {
        let html = r#"<div class="reader"><img src="01.jpg"></div>"#;
        let images = parse_chapter_images(html, &config(), CHAPTER_URL);
        assert_eq!(images, vec!["https://site.com/01.jpg"]);
    }
}
