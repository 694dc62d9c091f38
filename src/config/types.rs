use serde::Deserialize;

/// Browser-like user agent sent with static fetches
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/605.1.15";

/// Main configuration structure for Press-Sieve
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub fetcher: FetcherConfig,
    #[serde(default)]
    pub pool: PoolConfig,
    #[serde(default)]
    pub extraction: ExtractionConfig,
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    pub storage: StorageConfig,
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

/// Static/rendered fetch configuration
#[derive(Debug, Clone, Deserialize)]
pub struct FetcherConfig {
    /// Timeout for a single static fetch (seconds)
    #[serde(rename = "timeout-secs", default = "default_fetch_timeout")]
    pub timeout_secs: u64,

    /// User agent header for static fetches
    #[serde(rename = "user-agent", default = "default_user_agent")]
    pub user_agent: String,

    /// Domain patterns whose pages need a rendered fetch
    #[serde(rename = "rendered-domains", default = "default_rendered_domains")]
    pub rendered_domains: Vec<String>,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_fetch_timeout(),
            user_agent: default_user_agent(),
            rendered_domains: default_rendered_domains(),
        }
    }
}

/// Page pool configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PoolConfig {
    /// Maximum number of live page handles
    #[serde(default = "default_pool_size")]
    pub size: usize,

    /// Number of leases after which the renderer is restarted
    #[serde(rename = "restart-threshold", default = "default_restart_threshold")]
    pub restart_threshold: u64,

    /// Upper bound on a single page navigation (seconds)
    #[serde(
        rename = "navigation-timeout-secs",
        default = "default_navigation_timeout"
    )]
    pub navigation_timeout_secs: u64,

    /// Explicit path to a Chromium/Chrome binary
    #[serde(rename = "chrome-executable", default)]
    pub chrome_executable: Option<String>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            size: default_pool_size(),
            restart_threshold: default_restart_threshold(),
            navigation_timeout_secs: default_navigation_timeout(),
            chrome_executable: None,
        }
    }
}

/// Extraction chain configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ExtractionConfig {
    /// Bodies shorter than this (in characters) count as empty; the default
    /// accepts any non-blank body
    #[serde(rename = "min-body-chars", default = "default_min_body_chars")]
    pub min_body_chars: usize,

    /// Additional domain-specific handlers
    #[serde(default)]
    pub handlers: Vec<HandlerEntry>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            min_body_chars: default_min_body_chars(),
            handlers: Vec::new(),
        }
    }
}

/// The kind of a configured domain handler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HandlerKind {
    /// CSS selectors for each article field
    Selectors,
    /// JSON-LD `Article`/`NewsArticle` objects embedded in the page
    JsonLd,
}

/// A domain-specific handler registration
#[derive(Debug, Clone, Deserialize)]
pub struct HandlerEntry {
    /// Domain pattern (e.g., "example.com" or "*.example.com")
    pub domain: String,

    pub kind: HandlerKind,

    #[serde(default)]
    pub title: Option<String>,

    #[serde(default)]
    pub author: Option<String>,

    #[serde(rename = "publish-date", default)]
    pub publish_date: Option<String>,

    #[serde(default)]
    pub body: Option<String>,
}

/// Analysis-service configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AnalysisConfig {
    /// Base URL of an OpenAI-compatible chat-completions API
    #[serde(rename = "base-url", default = "default_analysis_base_url")]
    pub base_url: String,

    /// Model name sent with every request
    #[serde(default = "default_analysis_model")]
    pub model: String,

    /// Inline API key
    #[serde(rename = "api-key", default)]
    pub api_key: Option<String>,

    /// Name of the environment variable holding the API key
    #[serde(rename = "api-key-env", default)]
    pub api_key_env: Option<String>,

    /// Article text is truncated to this many characters before analysis
    #[serde(rename = "max-input-chars", default = "default_max_input_chars")]
    pub max_input_chars: usize,

    /// Timeout for a single analysis request (seconds)
    #[serde(
        rename = "request-timeout-secs",
        default = "default_analysis_timeout"
    )]
    pub request_timeout_secs: u64,

    /// Classification labels offered to the classifier
    #[serde(default)]
    pub taxonomy: Vec<String>,

    #[serde(rename = "system-prompt", default)]
    pub system_prompt: Option<String>,

    #[serde(rename = "summary-prompt", default)]
    pub summary_prompt: Option<String>,

    #[serde(rename = "classify-prompt", default)]
    pub classify_prompt: Option<String>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            base_url: default_analysis_base_url(),
            model: default_analysis_model(),
            api_key: None,
            api_key_env: None,
            max_input_chars: default_max_input_chars(),
            request_timeout_secs: default_analysis_timeout(),
            taxonomy: Vec::new(),
            system_prompt: None,
            summary_prompt: None,
            classify_prompt: None,
        }
    }
}

/// Retry policy for analysis-service calls
#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    #[serde(rename = "max-tries", default = "default_max_tries")]
    pub max_tries: u32,

    /// Fixed delay between attempts (milliseconds)
    #[serde(rename = "delay-ms", default = "default_retry_delay")]
    pub delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_tries: default_max_tries(),
            delay_ms: default_retry_delay(),
        }
    }
}

/// Storage configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,

    /// Persist the fetched HTML alongside the article
    #[serde(rename = "keep-source-html", default)]
    pub keep_source_html: bool,
}

/// Persistent queue configuration
#[derive(Debug, Clone, Deserialize)]
pub struct QueueConfig {
    #[serde(default = "default_queue_path")]
    pub path: String,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            path: default_queue_path(),
        }
    }
}

/// Batch pipeline configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// Maximum number of item pipelines in flight
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
        }
    }
}

fn default_fetch_timeout() -> u64 {
    30
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

fn default_rendered_domains() -> Vec<String> {
    vec!["36kr.com".to_string()]
}

fn default_pool_size() -> usize {
    4
}

fn default_restart_threshold() -> u64 {
    1000
}

fn default_navigation_timeout() -> u64 {
    30
}

fn default_min_body_chars() -> usize {
    1
}

fn default_analysis_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_analysis_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_max_input_chars() -> usize {
    3500
}

fn default_analysis_timeout() -> u64 {
    60
}

fn default_max_tries() -> u32 {
    3
}

fn default_retry_delay() -> u64 {
    2000
}

fn default_queue_path() -> String {
    "./press-sieve-queue.json".to_string()
}

fn default_concurrency() -> usize {
    8
}
