/// Configuration for the aggregator, the WebSoc client and the HTTP server
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// When to give up on WebSoc after retrying.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminalPolicy {
    /// Fail once two retry rounds have happened, even if the last one fully
    /// succeeded. Matches the behavior of the existing public service.
    #[default]
    RoundCount,
    /// Fail only if sub-queries are still failing when the budget runs out.
    ResidualFailures,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregatorConfig {
    /// Total attempts per sub-query, including the first
    pub max_attempts: u32,
    /// Backoff before retry round `n` is `base_backoff_ms * 2^(n-1)`
    pub base_backoff_ms: u64,
    /// Upper bound on in-flight fetches within a round
    pub max_concurrency: usize,
    pub terminal_policy: TerminalPolicy,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_backoff_ms: 1000,
            max_concurrency: 16,
            terminal_policy: TerminalPolicy::RoundCount,
        }
    }
}

impl AggregatorConfig {
    /// Delay before the retry that follows round `round` (0-based).
    pub fn backoff(&self, round: u32) -> Duration {
        let factor = 1u64.checked_shl(round).unwrap_or(u64::MAX);
        Duration::from_millis(self.base_backoff_ms.saturating_mul(factor))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Endpoint of a WebSoc proxy that answers sub-queries with JSON trees
    pub base_url: String,
    pub user_agent: String,
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:3000/websoc".to_string(),
            user_agent: concat!("websoc/", env!("CARGO_PKG_VERSION")).to_string(),
            connect_timeout_secs: 10,
            request_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    /// Deadline for a whole aggregation request
    pub request_deadline_secs: u64,
    /// Emit logs as JSON lines instead of plain text
    pub log_json: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1".to_string(),
            port: 8080,
            request_deadline_secs: 15,
            log_json: false,
        }
    }
}

/// Top-level configuration file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub aggregator: AggregatorConfig,
    pub client: ClientConfig,
    pub server: ServerConfig,
}

impl Config {
    /// Loads configuration from a JSON file. Missing sections and fields fall
    /// back to their defaults.
    pub fn load_from_file(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let content = fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Loads from `path` if it exists, otherwise returns the defaults.
    pub fn load_or_default(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        if path.exists() {
            Self::load_from_file(path)
        } else {
            Ok(Self::default())
        }
    }
}
