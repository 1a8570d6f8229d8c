use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::from([0, 0, 0, 0])
}

fn default_port() -> u16 {
    8080
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("depot.db")
}

/// Pipeline orchestration configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OrchestratorConfig {
    /// Upper bound on deposits processed concurrently.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_deposits: usize,
    /// Number of job dispatcher workers.
    #[serde(default = "default_job_workers")]
    pub job_workers: usize,
    /// Grace period before the terminal cleanup job runs.
    #[serde(default = "default_cleanup_delay")]
    pub cleanup_delay_secs: u64,
    /// Pause between redeliveries while the pipeline is not consuming.
    #[serde(default = "default_redeliver_backoff")]
    pub redeliver_backoff_ms: u64,
    /// Username attributed to actions the pipeline takes on its own.
    #[serde(default = "default_system_username")]
    pub system_username: String,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_concurrent_deposits: default_max_concurrent(),
            job_workers: default_job_workers(),
            cleanup_delay_secs: default_cleanup_delay(),
            redeliver_backoff_ms: default_redeliver_backoff(),
            system_username: default_system_username(),
        }
    }
}

fn default_max_concurrent() -> usize {
    3
}

fn default_job_workers() -> usize {
    2
}

fn default_cleanup_delay() -> u64 {
    30
}

fn default_redeliver_backoff() -> u64 {
    500
}

fn default_system_username() -> String {
    "system".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_empty_config_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host.to_string(), "0.0.0.0");
        assert_eq!(config.database.path.to_str().unwrap(), "depot.db");
        assert_eq!(config.orchestrator.max_concurrent_deposits, 3);
        assert_eq!(config.orchestrator.cleanup_delay_secs, 30);
        assert_eq!(config.orchestrator.system_username, "system");
    }

    #[test]
    fn test_deserialize_custom_values() {
        let toml = r#"
[server]
host = "127.0.0.1"
port = 9000

[database]
path = "/data/depot.sqlite"

[orchestrator]
max_concurrent_deposits = 5
job_workers = 4
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host.to_string(), "127.0.0.1");
        assert_eq!(config.database.path.to_str().unwrap(), "/data/depot.sqlite");
        assert_eq!(config.orchestrator.max_concurrent_deposits, 5);
        assert_eq!(config.orchestrator.job_workers, 4);
        // Untouched fields keep their defaults.
        assert_eq!(config.orchestrator.redeliver_backoff_ms, 500);
    }
}
