use url::Url;

/// Extracts the domain from a parsed URL
///
/// Returns the lowercase host, or `None` if the URL has no host.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use sumi_linkrot::url::extract_domain;
///
/// let url = Url::parse("https://EXAMPLE.COM/path").unwrap();
/// assert_eq!(extract_domain(&url), Some("example.com".to_string()));
/// ```
pub fn extract_domain(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}

/// Extracts the lowercase host from a raw URL string
///
/// Surrounding whitespace is ignored. Anything that fails to parse, or
/// parses without a host, yields the empty string so that two unparseable
/// URLs compare as the same (empty) domain.
///
/// # Arguments
///
/// * `url` - The raw URL, as found in a document or supplied by the user
///
/// # Returns
///
/// The lowercase host, or `""` when there is none
///
/// # Examples
///
/// ```
/// use sumi_linkrot::url::get_domain;
///
/// assert_eq!(get_domain("https://Blog.Example.com/post"), "blog.example.com");
/// assert_eq!(get_domain("/relative/path"), "");
/// ```
pub fn get_domain(url: &str) -> String {
    Url::parse(url.trim())
        .ok()
        .and_then(|u| extract_domain(&u))
        .unwrap_or_default()
}
