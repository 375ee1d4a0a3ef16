use std::fmt;

/// Transport hint carried by a crawl request
///
/// `Html` requests are rendered through a browser session and may yield
/// further links. `Other` requests are fetched with the lightweight client
/// and are leaves of the traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ContentKind {
    #[default]
    Html,
    Other,
}

impl ContentKind {
    pub fn is_html(&self) -> bool {
        matches!(self, Self::Html)
    }

    /// Picks the kind for a discovered URL from its page/resource classification
    pub fn for_url(url: &str) -> Self {
        if crate::url::is_page_link(url) {
            Self::Html
        } else {
            Self::Other
        }
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Html => f.write_str("html"),
            Self::Other => f.write_str("other"),
        }
    }
}
