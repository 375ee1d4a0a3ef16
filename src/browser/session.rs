use super::{BrowserError, BrowserKind};
use async_trait::async_trait;

/// One stateful rendering engine instance
///
/// Sessions are exclusively owned by whoever checked them out of the pool,
/// so every method takes `&mut self`.
#[async_trait]
pub trait RenderSession: Send {
    /// Navigates to a URL and waits for the driver to report the load
    async fn navigate(&mut self, url: &str) -> Result<(), BrowserError>;

    /// Current `document.readyState`
    async fn ready_state(&mut self) -> Result<String, BrowserError>;

    /// Response status of the main document, if the browser exposes it
    async fn response_status(&mut self) -> Result<Option<u16>, BrowserError>;

    async fn add_cookie(&mut self, name: &str, value: &str) -> Result<(), BrowserError>;

    /// Serialized DOM of the current document
    async fn page_source(&mut self) -> Result<String, BrowserError>;

    /// Ends the session; further calls are errors
    async fn quit(&mut self) -> Result<(), BrowserError>;
}

/// Creates new sessions on demand
#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn create(&self, kind: BrowserKind) -> Result<Box<dyn RenderSession>, BrowserError>;

    /// Releases backend resources once every session has quit
    async fn close(&self) {}
}
