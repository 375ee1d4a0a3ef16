//! URL handling module for Sumi-Linkrot
//!
//! Pure helpers used by the page processor: validity filtering, page-vs-resource
//! classification, internal/external comparison, absolute resolution, exclusion
//! matching and inline style/script URL scanning.

mod domain;
mod inline;
mod matcher;
mod resolve;

use regex::Regex;
use std::sync::LazyLock;

// Re-export main functions
pub use domain::{extract_domain, get_domain};
pub use inline::{extract_script_urls, extract_style_urls};
pub use matcher::{matches_ant_pattern, ExcludeMatcher};
pub use resolve::{canonical_url, is_absolute_url, to_absolute};

/// Suffixes that always denote a page
static PAGE_SUFFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\.(html|htm|php|jsp|asp|aspx|do|action|shtml|jspx|ftl)$")
        .expect("page suffix pattern is valid")
});

/// Suffixes that always denote a resource; checked before anything else
static RESOURCE_SUFFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\.(css|js|png|jpg|jpeg|gif|bmp|svg|ico|webp|mp4|avi|mp3|woff|woff2|ttf|eot|otf|zip|rar|pdf|docx?|xlsx?)$",
    )
    .expect("resource suffix pattern is valid")
});

/// Returns true if the URL is worth checking at all
///
/// Rejects blank values, `javascript:` and `mailto:` links, inline
/// `data:image` payloads and fragment-only anchors.
///
/// # Examples
///
/// ```
/// use sumi_linkrot::url::is_valid;
///
/// assert!(is_valid("/about"));
/// assert!(!is_valid("javascript:void(0)"));
/// assert!(!is_valid("#top"));
/// ```
pub fn is_valid(url: &str) -> bool {
    let trimmed = url.trim();
    !trimmed.is_empty()
        && !trimmed.starts_with("javascript:")
        && !trimmed.starts_with("data:image")
        && !trimmed.starts_with("mailto:")
        && !trimmed.starts_with('#')
}

/// Classifies a URL as a page (true) or an embedded resource (false)
///
/// # Classification Rules
///
/// 1. A resource suffix (stylesheet, script, image, media, font, archive,
///    document) on the path means resource. This rule always wins.
/// 2. Otherwise a page suffix (`.html`, `.php`, `.jsp`, ...) means page.
/// 3. Otherwise the URL is a page only if its path contains no dot.
///
/// Only the path portion is inspected: scheme, host, query string and
/// fragment are ignored.
///
/// # Examples
///
/// ```
/// use sumi_linkrot::url::is_page_link;
///
/// assert!(is_page_link("/about"));
/// assert!(is_page_link("https://example.com/index.php?page=2"));
/// assert!(!is_page_link("/img/logo.png"));
/// assert!(!is_page_link("/files/report.pdf?download=1"));
/// ```
pub fn is_page_link(url: &str) -> bool {
    if url.trim().is_empty() {
        return false;
    }

    let path = path_portion(url);

    if RESOURCE_SUFFIX.is_match(&path) {
        return false;
    }

    PAGE_SUFFIX.is_match(&path) || !path.contains('.')
}

/// Returns true if the target lives on a different host than the base
///
/// Hosts are compared lower-cased. A URL without a parseable host compares
/// as the empty host.
pub fn is_external(base: &str, target: &str) -> bool {
    get_domain(base) != get_domain(target)
}

/// Extracts the path of a URL, without query string or fragment
fn path_portion(url: &str) -> String {
    let trimmed = url.trim();
    if let Ok(parsed) = ::url::Url::parse(trimmed) {
        if parsed.has_host() {
            return parsed.path().to_string();
        }
    }

    let end = trimmed.find(|c| c == '?' || c == '#').unwrap_or(trimmed.len());
    trimmed[..end].to_string()
}
