use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - Admission gate capacity and worker count are not 0
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    if config.orchestrator.max_concurrent_deposits == 0 {
        return Err(ConfigError::ValidationError(
            "orchestrator.max_concurrent_deposits cannot be 0".to_string(),
        ));
    }

    if config.orchestrator.job_workers == 0 {
        return Err(ConfigError::ValidationError(
            "orchestrator.job_workers cannot be 0".to_string(),
        ));
    }

    Ok(())
}
