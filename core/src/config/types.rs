use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub throttle: ThrottleConfig,

    #[serde(default)]
    pub dispatch: DispatchConfig,

    #[serde(default)]
    pub models: ModelsConfig,

    #[serde(default)]
    pub backend: BackendConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            throttle: ThrottleConfig::default(),
            dispatch: DispatchConfig::default(),
            models: ModelsConfig::default(),
            backend: BackendConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Admission limits for the upstream inference API.
///
/// All budgets are process-local: running N replicas multiplies the effective
/// request and token budgets by N. Coordinating budgets across instances is a
/// deployment concern, not handled here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThrottleConfig {
    /// Sliding one-minute cap on started requests.
    #[serde(default = "default_max_requests_per_minute")]
    pub max_requests_per_minute: usize,

    /// Cap on in-flight requests.
    #[serde(default = "default_max_concurrent_requests")]
    pub max_concurrent_requests: usize,

    /// Sliding one-minute cap on estimated token consumption.
    #[serde(default = "default_max_tokens_per_minute")]
    pub max_tokens_per_minute: u64,

    /// Completion token ceiling passed to the backend per request.
    #[serde(default = "default_max_tokens_per_request")]
    pub max_tokens_per_request: u64,

    /// Consecutive failures before a model's circuit opens.
    #[serde(default = "default_error_threshold")]
    pub error_threshold: u32,

    /// Base cooldown after a circuit opens; scaled by the consecutive error
    /// count at trip time.
    #[serde(default = "default_base_cooldown_secs")]
    pub base_cooldown_secs: u64,

    /// How often admission predicates are re-checked while waiting.
    #[serde(default = "default_admission_poll_interval_ms")]
    pub admission_poll_interval_ms: u64,

    /// Hard deadline on admission waits; a job that cannot be admitted in
    /// time fails with an admission timeout instead of parking a worker.
    #[serde(default = "default_admission_timeout_secs")]
    pub admission_timeout_secs: u64,

    /// Per-iteration cap on token-budget waits, so a long suggested wait is
    /// re-evaluated in chunks.
    #[serde(default = "default_admission_max_token_wait_secs")]
    pub admission_max_token_wait_secs: u64,
}

fn default_max_requests_per_minute() -> usize {
    30
}

fn default_max_concurrent_requests() -> usize {
    5
}

fn default_max_tokens_per_minute() -> u64 {
    120_000
}

fn default_max_tokens_per_request() -> u64 {
    8192
}

fn default_error_threshold() -> u32 {
    5
}

fn default_base_cooldown_secs() -> u64 {
    60
}

fn default_admission_poll_interval_ms() -> u64 {
    1000
}

fn default_admission_timeout_secs() -> u64 {
    300
}

fn default_admission_max_token_wait_secs() -> u64 {
    5
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            max_requests_per_minute: default_max_requests_per_minute(),
            max_concurrent_requests: default_max_concurrent_requests(),
            max_tokens_per_minute: default_max_tokens_per_minute(),
            max_tokens_per_request: default_max_tokens_per_request(),
            error_threshold: default_error_threshold(),
            base_cooldown_secs: default_base_cooldown_secs(),
            admission_poll_interval_ms: default_admission_poll_interval_ms(),
            admission_timeout_secs: default_admission_timeout_secs(),
            admission_max_token_wait_secs: default_admission_max_token_wait_secs(),
        }
    }
}

/// Worker pool and task retention settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Maximum concurrently running jobs.
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,

    /// Interval between sweeps of old terminal tasks.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,

    /// How long Success/Failure tasks stay pollable after completion.
    #[serde(default = "default_retention_secs")]
    pub retention_secs: u64,
}

fn default_max_workers() -> usize {
    10
}

fn default_sweep_interval_secs() -> u64 {
    300
}

fn default_retention_secs() -> u64 {
    3600
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_workers: default_max_workers(),
            sweep_interval_secs: default_sweep_interval_secs(),
            retention_secs: default_retention_secs(),
        }
    }
}

/// One upstream model in the fallback chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub id: String,

    #[serde(default)]
    pub name: String,

    #[serde(default = "default_model_max_tokens")]
    pub max_tokens: u64,

    #[serde(default = "default_model_temperature")]
    pub temperature: f64,
}

fn default_model_max_tokens() -> u64 {
    8192
}

fn default_model_temperature() -> f64 {
    0.3
}

/// Ordered model chain: jobs try `chain[0]` first and fall back down the
/// list when a model's circuit is open or its attempts are exhausted.
///
/// `chain` must stay the last field: TOML requires values before the array
/// of tables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsConfig {
    /// Feedback items below this confidence are dropped from analysis
    /// results.
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f64,

    /// Attempts per model before moving to the next one in the chain.
    #[serde(default = "default_max_retries_per_request")]
    pub max_retries_per_request: u32,

    /// First retry backoff; doubles per attempt up to `max_backoff_secs`.
    #[serde(default = "default_initial_backoff_secs")]
    pub initial_backoff_secs: u64,

    #[serde(default = "default_max_backoff_secs")]
    pub max_backoff_secs: u64,

    /// Pause before switching to the next model in the chain.
    #[serde(default = "default_model_switch_delay_secs")]
    pub model_switch_delay_secs: u64,

    #[serde(default = "default_model_chain")]
    pub chain: Vec<ModelConfig>,
}

fn default_model_chain() -> Vec<ModelConfig> {
    vec![
        ModelConfig {
            id: "anthropic.claude-sonnet-4-5".to_string(),
            name: "Claude Sonnet 4.5".to_string(),
            max_tokens: default_model_max_tokens(),
            temperature: default_model_temperature(),
        },
        ModelConfig {
            id: "anthropic.claude-3-5-sonnet".to_string(),
            name: "Claude 3.5 Sonnet".to_string(),
            max_tokens: default_model_max_tokens(),
            temperature: default_model_temperature(),
        },
    ]
}

fn default_min_confidence() -> f64 {
    0.80
}

fn default_max_retries_per_request() -> u32 {
    3
}

fn default_initial_backoff_secs() -> u64 {
    2
}

fn default_max_backoff_secs() -> u64 {
    120
}

fn default_model_switch_delay_secs() -> u64 {
    5
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            min_confidence: default_min_confidence(),
            max_retries_per_request: default_max_retries_per_request(),
            initial_backoff_secs: default_initial_backoff_secs(),
            max_backoff_secs: default_max_backoff_secs(),
            model_switch_delay_secs: default_model_switch_delay_secs(),
            chain: default_model_chain(),
        }
    }
}

/// Inference endpoint settings for the HTTP invoker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    #[serde(default = "default_backend_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// Whole-request deadline; long generations need a generous value.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_backend_endpoint() -> String {
    "http://127.0.0.1:8787/invoke".to_string()
}

fn default_connect_timeout_secs() -> u64 {
    15
}

fn default_request_timeout_secs() -> u64 {
    240
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            endpoint: default_backend_endpoint(),
            connect_timeout_secs: default_connect_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_logging_enabled")]
    pub enabled: bool,

    /// If true, log to stderr.
    #[serde(default = "default_logging_console")]
    pub console: bool,

    /// If true, log to a file under `directory` (or OS temp dir if unset).
    #[serde(default = "default_logging_file")]
    pub file: bool,

    /// EnvFilter string, e.g. "info" or "redline_core=debug".
    #[serde(default = "default_logging_level")]
    pub level: String,

    /// Optional directory for log files. If empty or unset, uses OS temp dir.
    #[serde(default)]
    pub directory: Option<String>,
}

fn default_logging_enabled() -> bool {
    true
}

fn default_logging_console() -> bool {
    true
}

fn default_logging_file() -> bool {
    false
}

fn default_logging_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: default_logging_enabled(),
            console: default_logging_console(),
            file: default_logging_file(),
            level: default_logging_level(),
            directory: None,
        }
    }
}
