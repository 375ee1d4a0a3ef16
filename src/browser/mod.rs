//! Headless rendering sessions
//!
//! # Components
//!
//! - `RenderSession` / `SessionFactory`: seam between the pool and a concrete browser backend
//! - `SessionPool`: bounded, lazily filled pool with blocking checkout and one-way shutdown
//! - `WebDriverFactory`: WebDriver backend (Firefox or Chrome) built on `thirtyfour`
//! - `ProcessReaper`: best-effort cleanup of orphaned driver processes at shutdown

mod driver_service;
mod pool;
mod reaper;
mod session;
mod webdriver;

pub use driver_service::DriverService;
pub use pool::{PooledSession, RenderedPage, SessionPool};
pub use reaper::{DriverProcessReaper, NoopReaper, ProcessReaper};
pub use session::{RenderSession, SessionFactory};
pub use webdriver::{WebDriverFactory, WebDriverSession};

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors raised by the rendering layer
#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("WebDriver error: {0}")]
    WebDriver(#[from] thirtyfour::error::WebDriverError),

    #[error("Session pool is closed")]
    PoolClosed,

    #[error("Session pool has already been shut down")]
    AlreadyShutDown,

    #[error("Unsupported driver: {0}")]
    UnsupportedDriver(String),

    #[error("Driver process error: {0}")]
    Process(#[from] std::io::Error),

    #[error("Driver did not start listening on port {0}")]
    DriverStartup(u16),

    #[error("Session error: {0}")]
    Session(String),
}

/// Browser flavour driven through WebDriver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BrowserKind {
    Firefox,
    Chrome,
}

impl BrowserKind {
    /// Name of the driver executable for this browser
    pub fn driver_binary(&self) -> &'static str {
        match self {
            Self::Firefox => "geckodriver",
            Self::Chrome => "chromedriver",
        }
    }
}

impl FromStr for BrowserKind {
    type Err = BrowserError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "firefox" => Ok(Self::Firefox),
            "chrome" => Ok(Self::Chrome),
            other => Err(BrowserError::UnsupportedDriver(other.to_string())),
        }
    }
}

impl fmt::Display for BrowserKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Firefox => f.write_str("firefox"),
            Self::Chrome => f.write_str("chrome"),
        }
    }
}
