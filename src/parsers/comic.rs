use crate::config::SiteConfig;
use crate::error::{LeechError, Result};
use crate::models::{ChapterRef, ScanResult};
use crate::url_resolver::{origin_of, resolve};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use std::sync::LazyLock;
use tracing::{debug, info};
use url::Url;

static TEXT_NUMBER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:chapter|chap|chương)\s*(\d+(?:\.\d+)?)").expect("chapter text pattern")
});

static URL_NUMBER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:chapter|chap)[-._/]?(\d+(?:\.\d+)?)").expect("chapter url pattern")
});

static AUTHOR_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(?:tác giả|author\(s\)|authors?)\s*:\s*").expect("author label pattern")
});

/// Extracts comic metadata and the chapter list from a comic listing page.
///
/// Links are resolved against the origin of `page_url`, which may be a mirror
/// of the configured base URL. Missing fields come back empty; the only error
/// is a `page_url` without an origin.
pub fn parse_comic_page(html: &str, config: &SiteConfig, page_url: &str) -> Result<ScanResult> {
    let origin = origin_of(page_url).ok_or_else(|| {
        LeechError::configuration(format!("comic URL `{}` is not an absolute URL", page_url))
    })?;
    debug!("[COMIC PARSER] HTML length: {}, origin: {}", html.len(), origin);

    let document = Html::parse_document(html);
    let selectors = config.selectors();

    let title = document
        .select(&selectors.comic_title)
        .next()
        .map(|el| element_text(&el))
        .unwrap_or_default();

    let cover_image = document
        .select(&selectors.comic_cover)
        .next()
        .and_then(|el| first_attr(&el, &["src", "content"]))
        .map(|raw| resolve(raw, &origin))
        .unwrap_or_default();

    let description = document
        .select(&selectors.comic_description)
        .map(|el| element_text(&el))
        .filter(|text| !text.is_empty())
        .collect::<Vec<_>>()
        .join("\n");

    let author = selectors
        .comic_author
        .as_ref()
        .and_then(|selector| document.select(selector).next())
        .map(|el| strip_author_label(&element_text(&el)))
        .unwrap_or_default();

    let chapters = parse_chapter_links(&document, &selectors.chapter_link, &origin);

    info!(
        "[COMIC PARSER] title={}, author={}, cover={}, chapters={}",
        title,
        author,
        cover_image,
        chapters.len()
    );

    Ok(ScanResult {
        title,
        author,
        description,
        cover_image,
        chapters,
    })
}

fn parse_chapter_links(document: &Html, selector: &Selector, origin: &str) -> Vec<ChapterRef> {
    let mut seen = HashSet::new();
    let mut chapters = Vec::new();

    for link in document.select(selector) {
        let Some(href) = link.value().attr("href").map(str::trim) else {
            continue;
        };
        if href.is_empty() {
            continue;
        }

        let url = resolve(href, origin);
        if !seen.insert(url.clone()) {
            debug!("[COMIC PARSER] skipping duplicate chapter link: {}", url);
            continue;
        }

        let text = element_text(&link);
        let number = chapter_number(&text, &url);
        let title = if text.is_empty() {
            format!("Chapter {}", number)
        } else {
            text
        };

        debug!("[COMIC PARSER] Found chapter: {} (number: {}) at {}", title, number, url);
        chapters.push(ChapterRef { url, title, number });
    }

    // Stable: chapters sharing a number keep document order.
    chapters.sort_by(|a, b| b.number.total_cmp(&a.number));
    chapters
}

/// Chapter number from the link text, then from the URL path, else `0`.
pub fn chapter_number(link_text: &str, url: &str) -> f64 {
    if let Some(number) = capture_number(&TEXT_NUMBER, link_text) {
        return number;
    }
    let path = Url::parse(url)
        .map(|u| u.path().to_string())
        .unwrap_or_else(|_| url.to_string());
    capture_number(&URL_NUMBER, &path).unwrap_or(0.0)
}

fn capture_number(pattern: &Regex, haystack: &str) -> Option<f64> {
    pattern
        .captures(haystack)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<f64>().ok())
}

fn strip_author_label(text: &str) -> String {
    AUTHOR_LABEL.replace(text, "").trim().to_string()
}

fn element_text(element: &ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

fn first_attr<'a>(element: &ElementRef<'a>, names: &[&str]) -> Option<&'a str> {
    names
        .iter()
        .filter_map(|name| element.value().attr(name))
        .map(str::trim)
        .find(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_settings;

    const PAGE_URL: &str = "https://site.com/truyen/test-comic";

    fn config() -> SiteConfig {
        SiteConfig::new(test_settings("https://site.com")).unwrap()
    }

    fn numbers(result: &ScanResult) -> Vec<f64> {
        result.chapters.iter().map(|c| c.number).collect()
    }

    #[test]
    fn extracts_metadata() {
        let html = r#"
            <html><body>
              <h1>  Test Comic </h1>
              <div class="cover"><img src="/covers/test.jpg"></div>
              <p class="author">Tác giả:  Nguyễn Văn A </p>
              <div class="description"><p> First line. </p><p></p><p>Second line.</p></div>
            </body></html>
        "#;
        let result = parse_comic_page(html, &config(), PAGE_URL).unwrap();

        assert_eq!(result.title, "Test Comic");
        assert_eq!(result.cover_image, "https://site.com/covers/test.jpg");
        assert_eq!(result.author, "Nguyễn Văn A");
        assert_eq!(result.description, "First line.\nSecond line.");
        assert!(result.chapters.is_empty());
    }

    #[test]
    fn cover_falls_back_to_content_attribute() {
        let mut settings = test_settings("https://site.com");
        settings.comic_cover_selector = "meta[property='og:image']".to_string();
        let config = SiteConfig::new(settings).unwrap();
        let html = r#"<head><meta property="og:image" content="//cdn.site.com/c.jpg"></head>"#;

        let result = parse_comic_page(html, &config, PAGE_URL).unwrap();
        assert_eq!(result.cover_image, "https://cdn.site.com/c.jpg");
    }

    #[test]
    fn author_label_is_case_insensitive() {
        assert_eq!(strip_author_label("AUTHOR: Oda"), "Oda");
        assert_eq!(strip_author_label("tác giả : Fujiko"), "Fujiko");
        assert_eq!(strip_author_label("Author(s): Someone"), "Someone");
        assert_eq!(strip_author_label("Đang cập nhật"), "Đang cập nhật");
    }

    #[test]
    fn missing_selectors_degrade_to_empty_fields() {
        let result = parse_comic_page("<html><body></body></html>", &config(), PAGE_URL).unwrap();
        assert_eq!(result, ScanResult::default());
    }

    #[test]
    fn number_from_link_text() {
        assert_eq!(chapter_number("Chapter 12.5", "https://site.com/x"), 12.5);
        assert_eq!(chapter_number("chap 3", "https://site.com/x"), 3.0);
        assert_eq!(chapter_number("Chương 45 - Kết thúc", "https://site.com/x"), 45.0);
    }

    #[test]
    fn number_from_url_fallback() {
        assert_eq!(chapter_number("Đọc ngay", "https://site.com/truyen/abc/chap-7/"), 7.0);
        assert_eq!(chapter_number("", "https://site.com/abc/chapter_10.5.html"), 10.5);
        assert_eq!(chapter_number("Đọc ngay", "https://site.com/abc/tap-7"), 0.0);
        assert_eq!(chapter_number("Đọc ngay", "https://site.com/truyen/abc/chuong-5/"), 0.0);
    }

    #[test]
    fn number_ignores_host_name() {
        assert_eq!(chapter_number("Read", "https://chap9.example.com/abc/"), 0.0);
    }

    #[test]
    fn chapters_sorted_newest_first() {
        let html = r#"<ul class="chapters">
            <li><a href="/c/1">Chapter 1</a></li>
            <li><a href="/c/3">Chapter 3</a></li>
            <li><a href="/c/2">Chapter 2</a></li>
        </ul>"#;
        let result = parse_comic_page(html, &config(), PAGE_URL).unwrap();
        assert_eq!(numbers(&result), vec![3.0, 2.0, 1.0]);
        assert_eq!(result.chapters[0].url, "https://site.com/c/3");
    }

    #[test]
    fn duplicate_links_keep_first_occurrence() {
        let html = r#"<div class="chapters">
            <a href="/c/1">Chapter 1</a>
            <a href="https://site.com/c/1">Read first chapter</a>
        </div>"#;
        let result = parse_comic_page(html, &config(), PAGE_URL).unwrap();
        assert_eq!(result.chapters.len(), 1);
        assert_eq!(result.chapters[0].title, "Chapter 1");
    }

    #[test]
    fn untitled_link_gets_generated_title() {
        let html = r#"<div class="chapters"><a href="/truyen/abc/chap-7/"> </a></div>"#;
        let result = parse_comic_page(html, &config(), PAGE_URL).unwrap();
        assert_eq!(result.chapters[0].title, "Chapter 7");
        assert_eq!(result.chapters[0].number, 7.0);
    }

    #[test]
    fn links_without_href_are_skipped() {
        let html = r#"<div class="chapters"><a>Chapter 1</a><a href="">Chapter 2</a></div>"#;
        let result = parse_comic_page(html, &config(), PAGE_URL).unwrap();
        assert!(result.chapters.is_empty());
    }

    #[test]
    fn tied_numbers_keep_document_order() {
        let html = r#"<div class="chapters">
            <a href="/extra-a">Extra A</a>
            <a href="/c/1">Chapter 1</a>
            <a href="/extra-b">Extra B</a>
        </div>"#;
        let result = parse_comic_page(html, &config(), PAGE_URL).unwrap();
        let titles: Vec<_> = result.chapters.iter().map(|c| c.title.as_str()).collect();
        assert_eq!(titles, vec!["Chapter 1", "Extra A", "Extra B"]);
    }

    #[test]
    fn page_origin_overrides_base_url() {
        let html = r#"<div class="chapters"><a href="/c/1">Chapter 1</a></div>"#;
        let result = parse_comic_page(html, &config(), "https://mirror.site.net/truyen/x").unwrap();
        assert_eq!(result.chapters[0].url, "https://mirror.site.net/c/1");
    }

    #[test]
    fn relative_page_url_is_a_configuration_error() {
        let err = parse_comic_page("<h1>x</h1>", &config(), "/truyen/test").unwrap_err();
        assert!(err.is_configuration());
    }
}
