//! Normalization of scraped links against the origin of the page they came from.

use url::Url;

/// Resolves `raw` against `origin` (`scheme://host[:port]`).
///
/// Rules, first match wins:
/// 1. `//host/path` gets an `https:` scheme.
/// 2. `/path` is appended to the origin.
/// 3. Anything not starting with `http` is joined to the origin root. This is
///    a root-relative join, not RFC 3986 resolution: the path of the page the
///    link was found on is ignored.
/// 4. Absolute `http`/`https` URLs are returned unchanged.
///
/// Never fails; malformed input yields a string that fails later when fetched.
pub fn resolve(raw: &str, origin: &str) -> String {
    let origin = origin.trim_end_matches('/');
    if raw.starts_with("//") {
        format!("https:{}", raw)
    } else if raw.starts_with('/') {
        format!("{}{}", origin, raw)
    } else if !raw.starts_with("http") {
        format!("{}/{}", origin, raw)
    } else {
        raw.to_string()
    }
}

/// `scheme://host[:port]` of an absolute URL, `None` when `url` has no
/// usable origin.
pub fn origin_of(url: &str) -> Option<String> {
    let parsed = Url::parse(url.trim()).ok()?;
    let origin = parsed.origin();
    if origin.is_tuple() {
        Some(origin.ascii_serialization())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ORIGIN: &str = "https://site.com";

    #[test]
    fn protocol_relative() {
        assert_eq!(resolve("//cdn.x.com/a.jpg", ORIGIN), "https://cdn.x.com/a.jpg");
    }

    #[test]
    fn root_relative() {
        assert_eq!(resolve("/img/a.jpg", ORIGIN), "https://site.com/img/a.jpg");
    }

    #[test]
    fn bare_path() {
        assert_eq!(resolve("img/a.jpg", ORIGIN), "https://site.com/img/a.jpg");
    }

    #[test]
    fn absolute_is_unchanged() {
        assert_eq!(
            resolve("http://other.com/b.png?x=1", ORIGIN),
            "http://other.com/b.png?x=1"
        );
    }

    #[test]
    fn trailing_slash_on_origin_is_not_duplicated() {
        assert_eq!(resolve("/a.jpg", "https://site.com/"), "https://site.com/a.jpg");
        assert_eq!(resolve("a.jpg", "https://site.com/"), "https://site.com/a.jpg");
    }

    #[test]
    fn resolving_twice_is_idempotent() {
        for raw in ["//cdn.x.com/a.jpg", "/img/a.jpg", "img/a.jpg", "https://x.com/a"] {
            let once = resolve(raw, ORIGIN);
            assert_eq!(resolve(&once, ORIGIN), once, "{}", raw);
        }
    }

    #[test]
    fn bare_path_ignores_current_page_path() {
        // Known simplification: a page at /truyen/abc/chap-1/ referencing
        // `01.jpg` resolves to the site root, not the chapter directory.
        assert_eq!(resolve("01.jpg", ORIGIN), "https://site.com/01.jpg");
    }

    #[test]
    fn malformed_input_does_not_panic() {
        assert_eq!(resolve("", ORIGIN), "https://site.com/");
        assert_eq!(resolve("data:image/png;base64,AA", ORIGIN), "https://site.com/data:image/png;base64,AA");
    }

    #[test]
    fn origin_keeps_port_and_drops_path() {
        assert_eq!(
            origin_of("http://127.0.0.1:8080/truyen/abc?page=2").as_deref(),
            Some("http://127.0.0.1:8080")
        );
        assert_eq!(origin_of("https://site.com/a/b/").as_deref(), Some("https://site.com"));
    }

    #[test]
    fn origin_of_relative_or_opaque_url_is_none() {
        assert_eq!(origin_of("/truyen/abc"), None);
        assert_eq!(origin_of("data:text/plain,hi"), None);
    }
}
