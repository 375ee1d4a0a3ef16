use super::domain::get_domain;
use url::Url;

/// Returns true if the value is already an absolute http(s) URL
pub fn is_absolute_url(url: &str) -> bool {
    let trimmed = url.trim();
    let lower = trimmed.to_ascii_lowercase();
    (lower.starts_with("http://") || lower.starts_with("https://")) && Url::parse(trimmed).is_ok()
}

/// Serializes an absolute URL the way `Url` does
///
/// An empty path becomes `/` and the host is lowercased, so the seed and
/// links pointing back at it compare equal. Unparsable input is returned
/// trimmed.
pub fn canonical_url(url: &str) -> String {
    let trimmed = url.trim();
    match Url::parse(trimmed) {
        Ok(parsed) => parsed.to_string(),
        Err(_) => trimmed.to_string(),
    }
}

/// Resolves a discovered reference into an absolute URL
///
/// # Resolution Rules
///
/// 1. Absolute http(s) URLs are returned as-is (trimmed).
/// 2. A schemeless reference that begins with the base host
///    (`example.com/about`) gets the base scheme prepended.
/// 3. Anything else has its `..` sequences removed and is joined onto the
///    base URL.
///
/// When the base itself cannot be parsed, or the join fails, the trimmed
/// reference is returned unchanged.
///
/// # Arguments
///
/// * `base` - URL of the document the reference was found in
/// * `relative` - The raw `href`/`src` value
///
/// # Examples
///
/// ```
/// use sumi_linkrot::url::to_absolute;
///
/// let base = "https://example.com/docs/index.html";
/// assert_eq!(to_absolute(base, "guide"), "https://example.com/docs/guide");
/// assert_eq!(to_absolute(base, "/about"), "https://example.com/about");
/// assert_eq!(to_absolute(base, "example.com/faq"), "https://example.com/faq");
/// assert_eq!(to_absolute(base, "https://other.org/"), "https://other.org/");
/// ```
pub fn to_absolute(base: &str, relative: &str) -> String {
    let relative = relative.trim();
    if is_absolute_url(relative) {
        return relative.to_string();
    }

    let base_url = match Url::parse(base.trim()) {
        Ok(url) => url,
        Err(_) => return relative.to_string(),
    };

    let domain = get_domain(base);
    if !domain.is_empty() && relative.to_ascii_lowercase().starts_with(&domain) {
        return format!("{}://{}", base_url.scheme(), relative);
    }

    let cleaned = relative.replace("..", "");
    match base_url.join(&cleaned) {
        Ok(joined) => joined.to_string(),
        Err(_) => relative.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "https://example.com/blog/post.html";

    #[test]
    fn test_canonical_url() {
        assert_eq!(canonical_url("https://example.com"), "https://example.com/");
        assert_eq!(canonical_url(" https://Example.COM/a?b=1 "), "https://example.com/a?b=1");
        assert_eq!(canonical_url("https://example.com/docs/"), "https://example.com/docs/");
        assert_eq!(canonical_url("not a url"), "not a url");
    }

    #[test]
    fn test_is_absolute_url() {
        assert!(is_absolute_url("https://example.com/"));
        assert!(is_absolute_url("HTTP://example.com/a"));
        assert!(!is_absolute_url("/about"));
        assert!(!is_absolute_url("//cdn.example.com/app.js"));
        assert!(!is_absolute_url("ftp://example.com/file"));
        assert!(!is_absolute_url(""));
    }

    #[test]
    fn test_absolute_passthrough() {
        assert_eq!(
            to_absolute(BASE, " https://other.org/page "),
            "https://other.org/page"
        );
    }

    #[test]
    fn test_relative_to_document() {
        assert_eq!(to_absolute(BASE, "next.html"), "https://example.com/blog/next.html");
        assert_eq!(to_absolute(BASE, "/img/logo.png"), "https://example.com/img/logo.png");
    }

    #[test]
    fn test_schemeless_same_host() {
        assert_eq!(
            to_absolute(BASE, "example.com/contact"),
            "https://example.com/contact"
        );
        assert_eq!(
            to_absolute("http://example.com/", "EXAMPLE.com/x"),
            "http://EXAMPLE.com/x"
        );
    }

    #[test]
    fn test_protocol_relative() {
        assert_eq!(
            to_absolute(BASE, "//cdn.example.net/app.js"),
            "https://cdn.example.net/app.js"
        );
    }

    #[test]
    fn test_parent_segments_stripped() {
        assert_eq!(
            to_absolute(BASE, "../assets/site.css"),
            "https://example.com/assets/site.css"
        );
    }

    #[test]
    fn test_unparseable_base() {
        assert_eq!(to_absolute("not a base", "/about"), "/about");
    }

    #[test]
    fn test_idempotent_for_absolute_inputs() {
        let inputs = [
            "https://example.com/",
            "https://example.com/a/b?x=1",
            "http://other.org/page.html#frag",
        ];
        for input in inputs {
            let once = to_absolute(BASE, input);
            assert_eq!(to_absolute(BASE, &once), once);
        }
    }

    #[test]
    fn test_idempotent_after_resolution() {
        for input in ["about", "/x/y", "example.com/z", "//cdn.example.net/a.js"] {
            let once = to_absolute(BASE, input);
            assert_eq!(to_absolute(BASE, &once), once);
        }
    }
}
