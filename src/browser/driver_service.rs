//! Locally spawned WebDriver server

use super::BrowserError;
use std::net::TcpListener;
use std::process::Stdio;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};

/// Time allowed for the driver to start accepting connections
const STARTUP_TIMEOUT: Duration = Duration::from_secs(10);

/// A driver binary (`geckodriver`, `chromedriver`) running on a local port
pub struct DriverService {
    port: u16,
    child: Mutex<Option<Child>>,
}

impl DriverService {
    /// Spawns the driver on a free local port and waits until it listens
    ///
    /// # Arguments
    ///
    /// * `driver_path` - Path to the driver executable
    pub async fn spawn(driver_path: &str) -> Result<Self, BrowserError> {
        let port = free_port()?;
        tracing::info!("Starting {} on port {}", driver_path, port);

        let child = Command::new(driver_path)
            .arg(format!("--port={}", port))
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()?;

        let service = Self {
            port,
            child: Mutex::new(Some(child)),
        };

        let deadline = Instant::now() + STARTUP_TIMEOUT;
        while TcpStream::connect(("127.0.0.1", port)).await.is_err() {
            if Instant::now() >= deadline {
                service.stop().await;
                return Err(BrowserError::DriverStartup(port));
            }
            sleep(Duration::from_millis(100)).await;
        }

        Ok(service)
    }

    /// WebDriver endpoint served by this process
    pub fn url(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }

    /// Kills the driver process; later calls do nothing
    pub async fn stop(&self) {
        if let Some(mut child) = self.child.lock().await.take() {
            if let Err(e) = child.kill().await {
                tracing::warn!("Failed to stop driver on port {}: {}", self.port, e);
            }
        }
    }
}

/// Asks the OS for an unused local port
fn free_port() -> Result<u16, BrowserError> {
    let listener = TcpListener::bind(("127.0.0.1", 0))?;
    Ok(listener.local_addr()?.port())
}
