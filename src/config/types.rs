use crate::retry::RetryPolicy;
use crate::state::ArtifactKind;
use crate::ConfigError;
use chrono_tz::Tz;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration structure for lifelog-sync
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    pub archive: ArchiveConfig,
    #[serde(default)]
    pub retry: RetrySection,
    #[serde(default)]
    pub runner: RunnerConfig,
}

impl Config {
    /// The configured IANA timezone
    ///
    /// Validation guarantees the name parses, so this only fails on a
    /// hand-built `Config` that skipped validation.
    pub fn timezone(&self) -> Result<Tz, ConfigError> {
        self.archive
            .timezone
            .parse::<Tz>()
            .map_err(|_| ConfigError::InvalidTimezone(self.archive.timezone.clone()))
    }
}

/// Remote API access configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the remote service, without the `/v1/...` path
    #[serde(rename = "base-url", default = "default_base_url")]
    pub base_url: String,

    /// Name of the environment variable holding the API key
    #[serde(rename = "api-key-env", default = "default_api_key_env")]
    pub api_key_env: String,

    /// Items requested per lifelog page
    #[serde(rename = "page-limit", default = "default_page_limit")]
    pub page_limit: u32,

    /// Items requested per chat page
    #[serde(rename = "insight-page-limit", default = "default_insight_page_limit")]
    pub insight_page_limit: u32,

    /// Upper bound on chat pages walked when looking for one day's insight
    #[serde(rename = "max-insight-pages", default = "default_max_insight_pages")]
    pub max_insight_pages: u32,

    /// Upper bound on lifelog pages for one day; a longer chain fails the day
    #[serde(rename = "max-pages-per-day", default = "default_max_pages_per_day")]
    pub max_pages_per_day: u32,

    /// Per-request timeout (seconds)
    #[serde(rename = "request-timeout-secs", default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Maximum number of remote requests in flight across all dates
    #[serde(rename = "max-concurrent-requests", default = "default_max_concurrent_requests")]
    pub max_concurrent_requests: u32,

    /// Pause between consecutive page requests (milliseconds)
    #[serde(rename = "request-delay-ms", default = "default_request_delay_ms")]
    pub request_delay_ms: u64,

    /// User-Agent header sent with every request
    #[serde(rename = "user-agent", default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key_env: default_api_key_env(),
            page_limit: default_page_limit(),
            insight_page_limit: default_insight_page_limit(),
            max_insight_pages: default_max_insight_pages(),
            max_pages_per_day: default_max_pages_per_day(),
            request_timeout_secs: default_request_timeout_secs(),
            max_concurrent_requests: default_max_concurrent_requests(),
            request_delay_ms: default_request_delay_ms(),
            user_agent: default_user_agent(),
        }
    }
}

/// Local archive configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ArchiveConfig {
    /// Root directory of the date-partitioned archive
    pub root: PathBuf,

    /// IANA timezone that defines day boundaries
    #[serde(default = "default_timezone")]
    pub timezone: String,

    /// How far back an empty archive starts syncing (days, ending yesterday)
    #[serde(rename = "initial-lookback-days", default = "default_initial_lookback_days")]
    pub initial_lookback_days: u32,

    /// SQLite run ledger; no ledger is kept when unset
    #[serde(rename = "ledger-path", default)]
    pub ledger_path: Option<PathBuf>,
}

/// Retry tuning for both retry levels
#[derive(Debug, Clone, Deserialize)]
pub struct RetrySection {
    /// Per page request
    #[serde(default = "RetryConfig::page_defaults")]
    pub page: RetryConfig,

    /// Per whole date
    #[serde(default = "RetryConfig::day_defaults")]
    pub day: RetryConfig,
}

impl Default for RetrySection {
    fn default() -> Self {
        Self {
            page: RetryConfig::page_defaults(),
            day: RetryConfig::day_defaults(),
        }
    }
}

/// One retry level
#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    #[serde(rename = "max-attempts")]
    pub max_attempts: u32,

    #[serde(rename = "base-delay-ms")]
    pub base_delay_ms: u64,

    #[serde(rename = "max-delay-ms")]
    pub max_delay_ms: u64,
}

impl RetryConfig {
    pub fn page_defaults() -> Self {
        Self {
            max_attempts: 5,
            base_delay_ms: 2_000,
            max_delay_ms: 60_000,
        }
    }

    pub fn day_defaults() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 10_000,
            max_delay_ms: 120_000,
        }
    }

    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_attempts,
            Duration::from_millis(self.base_delay_ms),
            Duration::from_millis(self.max_delay_ms),
        )
    }
}

/// Batch runner configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RunnerConfig {
    /// Dates processed concurrently
    #[serde(rename = "max-concurrent-days", default = "default_max_concurrent_days")]
    pub max_concurrent_days: u32,

    /// Upper bound on orchestrator passes per date attempt
    #[serde(rename = "max-passes-per-day", default = "default_max_passes_per_day")]
    pub max_passes_per_day: u32,

    /// Kinds synced when the command line does not select any
    #[serde(default = "default_kinds")]
    pub kinds: Vec<ArtifactKind>,

    /// Rebuild the monthly usage rollup of every month the run wrote contents or analytics for
    #[serde(rename = "monthly-rollup", default = "default_monthly_rollup")]
    pub monthly_rollup: bool,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_days: default_max_concurrent_days(),
            max_passes_per_day: default_max_passes_per_day(),
            kinds: default_kinds(),
            monthly_rollup: default_monthly_rollup(),
        }
    }
}

fn default_base_url() -> String {
    "https://api.limitless.ai".to_string()
}

fn default_api_key_env() -> String {
    "LIMITLESS_API_KEY".to_string()
}

fn default_page_limit() -> u32 {
    50
}

fn default_insight_page_limit() -> u32 {
    10
}

fn default_max_insight_pages() -> u32 {
    100
}

fn default_max_pages_per_day() -> u32 {
    1_000
}

fn default_monthly_rollup() -> bool {
    true
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_max_concurrent_requests() -> u32 {
    2
}

fn default_request_delay_ms() -> u64 {
    300
}

fn default_user_agent() -> String {
    format!("lifelog-sync/{}", env!("CARGO_PKG_VERSION"))
}

fn default_timezone() -> String {
    "UTC".to_string()
}

fn default_initial_lookback_days() -> u32 {
    30
}

fn default_max_concurrent_days() -> u32 {
    1
}

fn default_max_passes_per_day() -> u32 {
    8
}

fn default_kinds() -> Vec<ArtifactKind> {
    ArtifactKind::ALL.to_vec()
}
