//! Application configuration for GCN Watch.
//!
//! User config lives at `~/.gcnwatch/gcnwatch.toml`; `--config` points
//! elsewhere. Every field has a default, so an empty or missing file yields a
//! working setup against the public GCN index and a local Ollama.
//!
//! The loaded [`AppConfig`] is immutable for the process lifetime and handed
//! to each component constructor by reference.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{GcnWatchError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "gcnwatch.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".gcnwatch";

// ---------------------------------------------------------------------------
// Config structs (matching gcnwatch.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Polling cadence and ID floor.
    #[serde(default)]
    pub monitor: MonitorConfig,

    /// Circular index and page sources.
    #[serde(default)]
    pub source: SourceConfig,

    /// Inference service settings.
    #[serde(default)]
    pub llm: LlmConfig,

    /// On-disk ledger and result files.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Log level and optional log file.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Slack incoming-webhook notification settings.
    #[serde(default)]
    pub slack: SlackConfig,
}

/// `[monitor]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Seconds between polls of the circular index.
    #[serde(default = "default_check_interval")]
    pub check_interval_secs: u64,

    /// Circulars with a numeric ID below this are ledgered without extraction.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_circulars_before_id: Option<u64>,

    /// Pause after each new circular is `check_interval_secs / throttle_divisor`
    /// seconds, never less than one second.
    #[serde(default = "default_throttle_divisor")]
    pub throttle_divisor: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            check_interval_secs: default_check_interval(),
            skip_circulars_before_id: None,
            throttle_divisor: default_throttle_divisor(),
        }
    }
}

impl MonitorConfig {
    /// Sleep between polling cycles.
    pub fn check_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.check_interval_secs)
    }

    /// Pause after each newly processed circular.
    pub fn item_throttle(&self) -> std::time::Duration {
        let secs = self.check_interval_secs / self.throttle_divisor.max(1);
        std::time::Duration::from_secs(secs.max(1))
    }
}

fn default_check_interval() -> u64 {
    3600
}
fn default_throttle_divisor() -> u64 {
    1800
}

/// `[source]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Page listing the most recent circulars, newest first.
    #[serde(default = "default_index_url")]
    pub index_url: String,

    /// Base used to resolve circular pages and `.gcn3` raw files.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Timeout for index, page, and raw-file requests.
    #[serde(default = "default_source_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            index_url: default_index_url(),
            base_url: default_base_url(),
            request_timeout_secs: default_source_timeout(),
        }
    }
}

fn default_index_url() -> String {
    "https://gcn.nasa.gov/circulars".into()
}
fn default_base_url() -> String {
    "https://gcn.nasa.gov".into()
}
fn default_source_timeout() -> u64 {
    60
}

/// `[llm]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Ollama-compatible generate endpoint.
    #[serde(default = "default_llm_api_url")]
    pub api_url: String,

    /// Model name sent with every request.
    #[serde(default = "default_llm_model")]
    pub model: String,

    /// Maximum extraction attempts per circular.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Per-attempt request timeout.
    #[serde(default = "default_llm_timeout")]
    pub request_timeout_secs: u64,

    /// Linear backoff base: attempt `n` (0-based) waits `base * (n + 1)`.
    #[serde(default = "default_retry_backoff")]
    pub retry_backoff_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_url: default_llm_api_url(),
            model: default_llm_model(),
            max_retries: default_max_retries(),
            request_timeout_secs: default_llm_timeout(),
            retry_backoff_secs: default_retry_backoff(),
        }
    }
}

fn default_llm_api_url() -> String {
    "http://localhost:11434/api/generate".into()
}
fn default_llm_model() -> String {
    "llama3".into()
}
fn default_max_retries() -> u32 {
    3
}
fn default_llm_timeout() -> u64 {
    120
}
fn default_retry_backoff() -> u64 {
    5
}

/// `[storage]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Append-only list of handled circular IDs.
    #[serde(default = "default_ledger_file")]
    pub ledger_file: PathBuf,

    /// JSON array of extraction records.
    #[serde(default = "default_results_file")]
    pub results_file: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            ledger_file: default_ledger_file(),
            results_file: default_results_file(),
        }
    }
}

fn default_ledger_file() -> PathBuf {
    PathBuf::from("data").join("processed_circulars.txt")
}
fn default_results_file() -> PathBuf {
    PathBuf::from("data").join("gcn_extracted_data.json")
}

/// `[logging]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default level when neither `RUST_LOG` nor `-v` is given.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Optional file that receives a copy of every log line.
    #[serde(default = "default_log_file", skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: default_log_file(),
        }
    }
}

fn default_log_level() -> String {
    "info".into()
}
fn default_log_file() -> Option<PathBuf> {
    Some(PathBuf::from("logs").join("gcn_monitor.log"))
}

/// `[slack]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlackConfig {
    /// Name of the env var holding the webhook URL (never store the URL itself).
    #[serde(default = "default_webhook_env")]
    pub webhook_url_env: String,

    /// Channel override sent with the payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,

    /// Display name of the posting bot.
    #[serde(default = "default_slack_username")]
    pub username: String,

    /// Emoji shortcode used as the bot icon.
    #[serde(default = "default_slack_icon")]
    pub icon_emoji: String,

    /// Timeout for webhook posts.
    #[serde(default = "default_slack_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for SlackConfig {
    fn default() -> Self {
        Self {
            webhook_url_env: default_webhook_env(),
            channel: None,
            username: default_slack_username(),
            icon_emoji: default_slack_icon(),
            request_timeout_secs: default_slack_timeout(),
        }
    }
}

impl SlackConfig {
    /// Resolve the webhook URL from the environment, if set and non-empty.
    pub fn webhook_url(&self) -> Option<String> {
        std::env::var(&self.webhook_url_env)
            .ok()
            .filter(|v| !v.trim().is_empty())
    }
}

fn default_webhook_env() -> String {
    "GCNWATCH_SLACK_WEBHOOK_URL".into()
}
fn default_slack_username() -> String {
    "GCN Bot".into()
}
fn default_slack_icon() -> String {
    ":telescope:".into()
}
fn default_slack_timeout() -> u64 {
    30
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

impl AppConfig {
    /// Reject settings the monitor cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.monitor.check_interval_secs == 0 {
            return Err(GcnWatchError::config("monitor.check_interval_secs must be > 0"));
        }
        if self.monitor.throttle_divisor == 0 {
            return Err(GcnWatchError::config("monitor.throttle_divisor must be > 0"));
        }
        if self.llm.max_retries == 0 {
            return Err(GcnWatchError::config("llm.max_retries must be at least 1"));
        }

        for (key, value) in [
            ("source.index_url", &self.source.index_url),
            ("source.base_url", &self.source.base_url),
            ("llm.api_url", &self.llm.api_url),
        ] {
            Url::parse(value)
                .map_err(|e| GcnWatchError::config(format!("{key} '{value}' is not a URL: {e}")))?;
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.gcnwatch/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| GcnWatchError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.gcnwatch/gcnwatch.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| GcnWatchError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| GcnWatchError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| GcnWatchError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| GcnWatchError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| GcnWatchError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("check_interval_secs"));
        assert!(toml_str.contains("GCNWATCH_SLACK_WEBHOOK_URL"));
        assert!(!toml_str.contains("skip_circulars_before_id"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.monitor.check_interval_secs, 3600);
        assert_eq!(parsed.llm.max_retries, 3);
        assert_eq!(parsed.slack.webhook_url_env, "GCNWATCH_SLACK_WEBHOOK_URL");
    }

    #[test]
    fn partial_config_fills_defaults() {
        let toml_str = r#"
[monitor]
check_interval_secs = 600
skip_circulars_before_id = 38000

[llm]
model = "mistral"
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.monitor.check_interval_secs, 600);
        assert_eq!(config.monitor.skip_circulars_before_id, Some(38000));
        assert_eq!(config.llm.model, "mistral");
        assert_eq!(config.llm.api_url, "http://localhost:11434/api/generate");
        assert_eq!(config.source.base_url, "https://gcn.nasa.gov");
    }

    #[test]
    fn item_throttle_has_one_second_floor() {
        let mut monitor = MonitorConfig::default();
        assert_eq!(monitor.item_throttle(), Duration::from_secs(2));

        monitor.check_interval_secs = 60;
        assert_eq!(monitor.item_throttle(), Duration::from_secs(1));

        monitor.throttle_divisor = 10;
        assert_eq!(monitor.item_throttle(), Duration::from_secs(6));
    }

    #[test]
    fn validate_rejects_zero_retries() {
        let mut config = AppConfig::default();
        assert!(config.validate().is_ok());

        config.llm.max_retries = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("max_retries"));
    }

    #[test]
    fn validate_rejects_bad_urls() {
        let mut config = AppConfig::default();
        config.source.index_url = "not a url".into();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("source.index_url"));
    }

    #[test]
    fn webhook_url_missing_env() {
        let mut config = SlackConfig::default();
        // Use a unique env var name to avoid interfering with other tests
        config.webhook_url_env = "GCNWATCH_TEST_NONEXISTENT_WEBHOOK_12345".into();
        assert!(config.webhook_url().is_none());
    }
}
