//! URLs embedded in inline `<style>` and `<script>` text

use super::is_valid;
use regex::Regex;
use std::sync::LazyLock;

static STYLE_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)url\(['"]?(.*?)['"]?\)"#).expect("style url pattern is valid")
});

static SCRIPT_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)url\s*[:=]\s*['"](.*?)['"]"#).expect("script url pattern is valid")
});

/// Extracts every `url(...)` reference from stylesheet text
///
/// # Examples
///
/// ```
/// use sumi_linkrot::url::extract_style_urls;
///
/// let css = "body { background-image: url('/img/bg.png'); }";
/// assert_eq!(extract_style_urls(css), vec!["/img/bg.png".to_string()]);
/// ```
pub fn extract_style_urls(text: &str) -> Vec<String> {
    scan(&STYLE_URL, text)
}

/// Extracts `url: '...'` and `url = "..."` assignments from script text
pub fn extract_script_urls(text: &str) -> Vec<String> {
    scan(&SCRIPT_URL, text)
}

fn scan(pattern: &Regex, text: &str) -> Vec<String> {
    pattern
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|url| is_valid(url))
        .collect()
}
