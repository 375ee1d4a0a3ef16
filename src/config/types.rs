use serde::Deserialize;
use std::collections::BTreeMap;

/// Main configuration structure for Sumi-Linkrot
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub browser: BrowserConfig,
    #[serde(default, rename = "rate-limit")]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CrawlerConfig {
    /// Number of concurrent crawl workers
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Maximum BFS depth (the seed is depth 1) below which links are extracted
    #[serde(default = "default_max_depth")]
    pub max_depth: u32,

    /// Connect/read timeout for lightweight fetches (milliseconds)
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// User-Agent strings, one is picked at random per request
    #[serde(default = "default_user_agents")]
    pub user_agents: Vec<String>,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            max_depth: default_max_depth(),
            request_timeout_ms: default_request_timeout_ms(),
            user_agents: default_user_agents(),
        }
    }
}

/// Rendering engine configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct BrowserConfig {
    /// WebDriver flavour: "firefox" or "chrome"
    #[serde(default = "default_driver")]
    pub driver: String,

    /// URL of an already running WebDriver server
    #[serde(default = "default_webdriver_url")]
    pub webdriver_url: String,

    /// Driver binary to spawn instead of connecting to `webdriver_url`
    #[serde(default)]
    pub driver_path: Option<String>,

    #[serde(default = "default_true")]
    pub headless: bool,

    /// Maximum number of live rendering sessions
    #[serde(default = "default_pool_capacity")]
    pub pool_capacity: usize,

    /// Bounded wait for `document.readyState == "complete"` (milliseconds)
    #[serde(default = "default_ready_timeout_ms")]
    pub ready_timeout_ms: u64,

    /// Fixed settle delay after the document is ready (milliseconds)
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,

    /// Cookies propagated onto every session
    #[serde(default)]
    pub cookies: BTreeMap<String, String>,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            driver: default_driver(),
            webdriver_url: default_webdriver_url(),
            driver_path: None,
            headless: true,
            pool_capacity: default_pool_capacity(),
            ready_timeout_ms: default_ready_timeout_ms(),
            settle_delay_ms: default_settle_delay_ms(),
            cookies: BTreeMap::new(),
        }
    }
}

/// Outbound request pacing configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RateLimitConfig {
    /// Ceiling of simultaneously un-released permits
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,

    /// Base pacing delay per permit (milliseconds)
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Upper bound (exclusive) of the random jitter added to the base delay
    #[serde(default = "default_jitter_ms")]
    pub jitter_ms: u64,

    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,

    #[serde(default = "default_backoff_cap_ms")]
    pub backoff_cap_ms: u64,

    /// Total attempts made by the standalone validator
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_concurrent: default_max_concurrent(),
            base_delay_ms: default_base_delay_ms(),
            jitter_ms: default_jitter_ms(),
            backoff_base_ms: default_backoff_base_ms(),
            backoff_cap_ms: default_backoff_cap_ms(),
            max_attempts: default_max_attempts(),
        }
    }
}

/// Result cache sizing
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CacheConfig {
    /// Number of task namespaces kept alive
    #[serde(default = "default_max_tasks")]
    pub max_tasks: usize,

    /// Idle time after which a whole task namespace is dropped (seconds)
    #[serde(default = "default_task_ttl_secs")]
    pub task_ttl_secs: u64,

    /// Entries per task namespace
    #[serde(default = "default_entry_capacity")]
    pub task_capacity: usize,

    /// Idle time after which a task entry expires (seconds)
    #[serde(default = "default_entry_ttl_secs")]
    pub entry_ttl_secs: u64,

    #[serde(default = "default_entry_capacity")]
    pub global_capacity: usize,

    #[serde(default = "default_entry_ttl_secs")]
    pub global_ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_tasks: default_max_tasks(),
            task_ttl_secs: default_task_ttl_secs(),
            task_capacity: default_entry_capacity(),
            entry_ttl_secs: default_entry_ttl_secs(),
            global_capacity: default_entry_capacity(),
            global_ttl_secs: default_entry_ttl_secs(),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct OutputConfig {
    /// Path to the SQLite database file
    #[serde(default = "default_database_path")]
    pub database_path: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

fn default_workers() -> usize {
    4
}

fn default_max_depth() -> u32 {
    2
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

fn default_user_agents() -> Vec<String> {
    [
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:121.0) Gecko/20100101 Firefox/121.0",
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.1 Safari/605.1.15",
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36 Edg/120.0.0.0",
        "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_driver() -> String {
    "firefox".to_string()
}

fn default_webdriver_url() -> String {
    "http://localhost:4444".to_string()
}

fn default_true() -> bool {
    true
}

fn default_pool_capacity() -> usize {
    5
}

fn default_ready_timeout_ms() -> u64 {
    5_000
}

fn default_settle_delay_ms() -> u64 {
    2_000
}

fn default_max_concurrent() -> usize {
    3
}

fn default_base_delay_ms() -> u64 {
    500
}

fn default_jitter_ms() -> u64 {
    500
}

fn default_backoff_base_ms() -> u64 {
    1_000
}

fn default_backoff_cap_ms() -> u64 {
    30_000
}

fn default_max_attempts() -> u32 {
    2
}

fn default_max_tasks() -> usize {
    10
}

fn default_task_ttl_secs() -> u64 {
    86_400
}

fn default_entry_capacity() -> usize {
    10_000
}

fn default_entry_ttl_secs() -> u64 {
    3_600
}

fn default_database_path() -> String {
    "./linkrot.db".to_string()
}
