use super::{BrowserError, BrowserKind, DriverService, RenderSession, SessionFactory};
use async_trait::async_trait;
use serde_json::json;
use thirtyfour::prelude::*;

const READY_STATE_SCRIPT: &str = "return document.readyState;";

const SET_COOKIE_SCRIPT: &str =
    "document.cookie = arguments[0] + '=' + arguments[1] + '; path=/';";

const RESPONSE_STATUS_SCRIPT: &str = "var e = window.performance.getEntries(); \
     return (e.length > 0 && e[0].responseStatus) ? e[0].responseStatus : 0;";

/// A live WebDriver browser session
pub struct WebDriverSession {
    driver: Option<WebDriver>,
}

impl WebDriverSession {
    fn driver(&self) -> Result<&WebDriver, BrowserError> {
        self.driver
            .as_ref()
            .ok_or_else(|| BrowserError::Session("session has quit".to_string()))
    }
}

#[async_trait]
impl RenderSession for WebDriverSession {
    async fn navigate(&mut self, url: &str) -> Result<(), BrowserError> {
        self.driver()?.goto(url).await?;
        Ok(())
    }

    async fn ready_state(&mut self) -> Result<String, BrowserError> {
        let ret = self.driver()?.execute(READY_STATE_SCRIPT, Vec::new()).await?;
        Ok(ret.json().as_str().unwrap_or_default().to_string())
    }

    async fn response_status(&mut self) -> Result<Option<u16>, BrowserError> {
        let ret = self
            .driver()?
            .execute(RESPONSE_STATUS_SCRIPT, Vec::new())
            .await?;
        let status = ret
            .json()
            .as_u64()
            .and_then(|code| u16::try_from(code).ok())
            .filter(|code| *code > 0);
        Ok(status)
    }

    async fn add_cookie(&mut self, name: &str, value: &str) -> Result<(), BrowserError> {
        self.driver()?
            .execute(SET_COOKIE_SCRIPT, vec![json!(name), json!(value)])
            .await?;
        Ok(())
    }

    async fn page_source(&mut self) -> Result<String, BrowserError> {
        Ok(self.driver()?.source().await?)
    }

    async fn quit(&mut self) -> Result<(), BrowserError> {
        if let Some(driver) = self.driver.take() {
            driver.quit().await?;
        }
        Ok(())
    }
}

/// Builds WebDriver sessions against a running or spawned driver server
pub struct WebDriverFactory {
    server_url: String,
    headless: bool,
    service: Option<DriverService>,
}

impl WebDriverFactory {
    /// Connects to an already running WebDriver server
    pub fn connect(server_url: impl Into<String>, headless: bool) -> Self {
        Self {
            server_url: server_url.into(),
            headless,
            service: None,
        }
    }

    /// Spawns the driver binary locally and targets it
    pub async fn spawn(driver_path: &str, headless: bool) -> Result<Self, BrowserError> {
        let service = DriverService::spawn(driver_path).await?;
        Ok(Self {
            server_url: service.url(),
            headless,
            service: Some(service),
        })
    }

    pub fn server_url(&self) -> &str {
        &self.server_url
    }
}

#[async_trait]
impl SessionFactory for WebDriverFactory {
    async fn create(&self, kind: BrowserKind) -> Result<Box<dyn RenderSession>, BrowserError> {
        let driver = match kind {
            BrowserKind::Firefox => {
                let mut caps = DesiredCapabilities::firefox();
                if self.headless {
                    caps.set_headless()?;
                }
                WebDriver::new(&self.server_url, caps).await?
            }
            BrowserKind::Chrome => {
                let mut caps = DesiredCapabilities::chrome();
                if self.headless {
                    caps.set_headless()?;
                }
                caps.add_chrome_arg("--ignore-certificate-errors")?;
                caps.add_chrome_arg("--disable-gpu")?;
                caps.add_chrome_arg("--no-sandbox")?;
                caps.add_chrome_arg("--disable-dev-shm-usage")?;
                WebDriver::new(&self.server_url, caps).await?
            }
        };

        tracing::debug!("Opened {} session at {}", kind, self.server_url);
        Ok(Box::new(WebDriverSession {
            driver: Some(driver),
        }))
    }

    async fn close(&self) {
        if let Some(service) = &self.service {
            service.stop().await;
        }
    }
}
