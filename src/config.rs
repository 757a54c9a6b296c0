use serde::Deserialize;

use crate::monitor::EngineSettings;
use crate::risk::RiskThresholds;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub database: DatabaseConfig,
    pub chain: ChainConfig,
    #[serde(default)]
    pub monitor: MonitorConfig,
    #[serde(default)]
    pub api: ApiConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    10
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChainConfig {
    pub rpc_http: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_request_timeout_secs() -> u64 {
    10
}

#[derive(Debug, Deserialize, Clone)]
pub struct MonitorConfig {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_analysis_interval_ms")]
    pub analysis_interval_ms: u64,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_transaction_buffer_size")]
    pub transaction_buffer_size: usize,
    /// Addresses watched from startup. Monitoring auto-starts when non-empty.
    #[serde(default)]
    pub addresses: Vec<String>,
    #[serde(default = "default_low_threshold")]
    pub low_threshold: u8,
    #[serde(default = "default_medium_threshold")]
    pub medium_threshold: u8,
    #[serde(default = "default_high_threshold")]
    pub high_threshold: u8,
    #[serde(default = "default_block_threshold")]
    pub block_threshold: u8,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 2000,
            analysis_interval_ms: 2000,
            batch_size: 10,
            transaction_buffer_size: 100,
            addresses: vec![],
            low_threshold: 20,
            medium_threshold: 50,
            high_threshold: 80,
            block_threshold: 90,
        }
    }
}

fn default_poll_interval_ms() -> u64 {
    2000
}

fn default_analysis_interval_ms() -> u64 {
    2000
}

fn default_batch_size() -> usize {
    10
}

fn default_transaction_buffer_size() -> usize {
    100
}

fn default_low_threshold() -> u8 {
    20
}

fn default_medium_threshold() -> u8 {
    50
}

fn default_high_threshold() -> u8 {
    80
}

fn default_block_threshold() -> u8 {
    90
}

impl MonitorConfig {
    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            poll_interval: std::time::Duration::from_millis(self.poll_interval_ms),
            analysis_interval: std::time::Duration::from_millis(self.analysis_interval_ms),
            batch_size: self.batch_size,
            transaction_buffer_size: self.transaction_buffer_size,
        }
    }

    pub fn risk_thresholds(&self) -> RiskThresholds {
        RiskThresholds {
            low: self.low_threshold,
            medium: self.medium_threshold,
            high: self.high_threshold,
            block: self.block_threshold,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApiConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_api_host")]
    pub host: String,
    #[serde(default = "default_api_port")]
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_api_host() -> String {
    "0.0.0.0".to_string()
}

fn default_api_port() -> u16 {
    3000
}

impl Config {
    pub fn load(path: &str) -> eyre::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| eyre::eyre!("Failed to read config file '{}': {}", path, e))?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| eyre::eyre!("Failed to parse config file '{}': {}", path, e))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> eyre::Result<()> {
        if self.chain.rpc_http.is_empty() {
            return Err(eyre::eyre!("chain.rpc_http must be set"));
        }
        for address in &self.monitor.addresses {
            if !address.starts_with("0x") || address.len() != 42 {
                return Err(eyre::eyre!("Invalid monitored address '{}'", address));
            }
        }
        let m = &self.monitor;
        if !(m.low_threshold <= m.medium_threshold
            && m.medium_threshold <= m.high_threshold
            && m.high_threshold <= m.block_threshold)
        {
            return Err(eyre::eyre!(
                "Risk thresholds must be ordered: low <= medium <= high <= block"
            ));
        }
        if m.block_threshold > 100 {
            return Err(eyre::eyre!("block_threshold must be at most 100"));
        }
        if m.batch_size == 0 {
            return Err(eyre::eyre!("monitor.batch_size must be at least 1"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config() {
        let toml_str = r#"
[database]
url = "postgres://localhost/test"
max_connections = 5

[chain]
rpc_http = "http://localhost:8545"

[monitor]
addresses = ["0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48"]
high_threshold = 75
"#;

        let config: Config = toml::from_str(toml_str).unwrap();
        config.validate().unwrap();
        assert_eq!(config.database.max_connections, 5);
        assert_eq!(config.chain.request_timeout_secs, 10); // default
        assert_eq!(config.monitor.poll_interval_ms, 2000); // default
        assert_eq!(config.monitor.addresses.len(), 1);
        assert_eq!(config.monitor.high_threshold, 75);
        assert_eq!(config.monitor.block_threshold, 90); // default
        assert!(config.api.enabled);
    }

    #[test]
    fn test_validate_bad_address() {
        let mut config: Config = toml::from_str(
            r#"
[database]
url = "postgres://localhost/test"

[chain]
rpc_http = "http://localhost:8545"
"#,
        )
        .unwrap();
        config.monitor.addresses = vec!["not-an-address".to_string()];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_threshold_ordering() {
        let mut config: Config = toml::from_str(
            r#"
[database]
url = "postgres://localhost/test"

[chain]
rpc_http = "http://localhost:8545"
"#,
        )
        .unwrap();
        config.monitor.medium_threshold = 10;
        assert!(config.validate().is_err());
    }
}
