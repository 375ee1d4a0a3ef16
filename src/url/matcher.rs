use super::path_portion;

/// Checks if a path matches an Ant-style pattern
///
/// Patterns are split on `/` into segments:
/// 1. `**` matches zero or more whole segments
/// 2. `*` matches zero or more characters inside one segment
/// 3. `?` matches exactly one character inside one segment
///
/// A pattern anchored with a leading `/` only matches paths that also start
/// with `/`.
///
/// # Arguments
///
/// * `pattern` - The Ant-style pattern, e.g. `/private/**`
/// * `path` - The candidate path (or full URL)
///
/// # Examples
///
/// ```
/// use sumi_linkrot::url::matches_ant_pattern;
///
/// assert!(matches_ant_pattern("/private/**", "/private/reports/q1"));
/// assert!(matches_ant_pattern("/private/**", "/private"));
/// assert!(matches_ant_pattern("/*.pdf", "/report.pdf"));
/// assert!(!matches_ant_pattern("/*.pdf", "/docs/report.pdf"));
/// assert!(matches_ant_pattern("/v?/api", "/v2/api"));
/// ```
pub fn matches_ant_pattern(pattern: &str, path: &str) -> bool {
    if pattern.starts_with('/') != path.starts_with('/') {
        return false;
    }

    let pattern_segments: Vec<&str> = pattern.split('/').filter(|s| !s.is_empty()).collect();
    let path_segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    match_segments(&pattern_segments, &path_segments)
}

fn match_segments(pattern: &[&str], path: &[&str]) -> bool {
    match pattern.split_first() {
        None => path.is_empty(),
        Some((&"**", rest)) => (0..=path.len()).any(|skip| match_segments(rest, &path[skip..])),
        Some((first, rest)) => match path.split_first() {
            Some((segment, path_rest)) => {
                match_segment(first, segment) && match_segments(rest, path_rest)
            }
            None => false,
        },
    }
}

/// Wildcard match of a single segment (`*` and `?` only)
fn match_segment(pattern: &str, segment: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let s: Vec<char> = segment.chars().collect();

    let (mut pi, mut si) = (0, 0);
    let mut star: Option<usize> = None;
    let mut mark = 0;

    while si < s.len() {
        if pi < p.len() && (p[pi] == '?' || p[pi] == s[si]) {
            pi += 1;
            si += 1;
        } else if pi < p.len() && p[pi] == '*' {
            star = Some(pi);
            mark = si;
            pi += 1;
        } else if let Some(star_at) = star {
            pi = star_at + 1;
            mark += 1;
            si = mark;
        } else {
            return false;
        }
    }

    while pi < p.len() && p[pi] == '*' {
        pi += 1;
    }
    pi == p.len()
}

/// Ordered list of exclusion patterns for one crawl
///
/// Plain patterns are matched against the URL path (no query string or
/// fragment). Patterns containing `://` are matched against the whole URL.
#[derive(Debug, Clone, Default)]
pub struct ExcludeMatcher {
    patterns: Vec<String>,
}

impl ExcludeMatcher {
    /// Creates a matcher, dropping blank patterns
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            patterns: patterns
                .into_iter()
                .map(Into::into)
                .map(|p: String| p.trim().to_string())
                .filter(|p| !p.is_empty())
                .collect(),
        }
    }

    /// Returns true if any pattern matches the URL
    pub fn is_excluded(&self, url: &str) -> bool {
        if self.patterns.is_empty() {
            return false;
        }

        let path = path_portion(url);
        let full = url.trim();

        self.patterns.iter().any(|pattern| {
            if pattern.contains("://") {
                matches_ant_pattern(pattern, full)
            } else {
                matches_ant_pattern(pattern, &path)
            }
        })
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}
