use super::{BrowserError, BrowserKind};
use async_trait::async_trait;
use tokio::process::Command;

/// Platform-specific cleanup of rendering engine processes
///
/// Only invoked at pool shutdown. Implementations are best-effort: the pool
/// logs a failure and carries on.
#[async_trait]
pub trait ProcessReaper: Send + Sync {
    async fn reap(&self) -> Result<(), BrowserError>;
}

/// Does nothing; for runs that never start a local driver
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopReaper;

#[async_trait]
impl ProcessReaper for NoopReaper {
    async fn reap(&self) -> Result<(), BrowserError> {
        Ok(())
    }
}

/// Force-kills stray `geckodriver` / `chromedriver` processes
///
/// Uses `taskkill /F /IM <name>.exe` on Windows and `pkill -9 -f <name>`
/// elsewhere.
#[derive(Debug, Clone)]
pub struct DriverProcessReaper {
    binaries: Vec<&'static str>,
}

impl DriverProcessReaper {
    /// Reaper for every supported driver binary
    pub fn new() -> Self {
        Self {
            binaries: vec![
                BrowserKind::Firefox.driver_binary(),
                BrowserKind::Chrome.driver_binary(),
            ],
        }
    }

    /// Reaper for a single browser's driver
    pub fn for_kind(kind: BrowserKind) -> Self {
        Self {
            binaries: vec![kind.driver_binary()],
        }
    }

    /// Command line used to kill one binary on the current platform
    pub fn kill_command(binary: &str) -> (String, Vec<String>) {
        if cfg!(windows) {
            (
                "taskkill".to_string(),
                vec!["/F".to_string(), "/IM".to_string(), format!("{}.exe", binary)],
            )
        } else {
            (
                "pkill".to_string(),
                vec!["-9".to_string(), "-f".to_string(), binary.to_string()],
            )
        }
    }
}

impl Default for DriverProcessReaper {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProcessReaper for DriverProcessReaper {
    async fn reap(&self) -> Result<(), BrowserError> {
        for binary in &self.binaries {
            let (program, args) = Self::kill_command(binary);
            let output = Command::new(&program).args(&args).output().await?;

            // pkill exits 1 when nothing matched
            if output.status.success() {
                tracing::info!("Killed orphaned {} processes", binary);
            } else {
                tracing::debug!("No {} processes killed ({})", binary, output.status);
            }
        }
        Ok(())
    }
}
