use crate::config::types::{Config, MinerConfig};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_miner_config(&config.miner)?;
    Ok(())
}

/// Validates miner configuration
fn validate_miner_config(config: &MinerConfig) -> Result<(), ConfigError> {
    // The worker cap protects the target site; it is a hard invariant, not a tuning knob.
    if config.max_workers < 1 || config.max_workers > 100 {
        return Err(ConfigError::Validation(format!(
            "max_workers must be between 1 and 100, got {}",
            config.max_workers
        )));
    }

    let url = Url::parse(&config.base_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid base_url: {}", e)))?;

    if url.host_str().is_none() {
        return Err(ConfigError::InvalidUrl(format!(
            "base_url '{}' has no host",
            config.base_url
        )));
    }

    if config.data_dir.is_empty() {
        return Err(ConfigError::Validation(
            "data_dir cannot be empty".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> Config {
        Config {
            miner: MinerConfig {
                base_url: "https://forum.example.com/".to_string(),
                max_workers: 10,
                cache_pages: false,
                data_dir: "./data".to_string(),
            },
        }
    }

    #[test]
    fn test_valid_config() {
        assert!(validate(&base_config()).is_ok());
    }

    #[test]
    fn test_max_workers_zero_rejected() {
        let mut config = base_config();
        config.miner.max_workers = 0;
        assert!(matches!(
            validate(&config),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_max_workers_above_cap_rejected() {
        let mut config = base_config();
        config.miner.max_workers = 101;
        assert!(matches!(
            validate(&config),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_max_workers_bounds_accepted() {
        let mut config = base_config();
        config.miner.max_workers = 1;
        assert!(validate(&config).is_ok());
        config.miner.max_workers = 100;
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_invalid_base_url_rejected() {
        let mut config = base_config();
        config.miner.base_url = "not a url".to_string();
        assert!(matches!(
            validate(&config),
            Err(ConfigError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_empty_data_dir_rejected() {
        let mut config = base_config();
        config.miner.data_dir = String::new();
        assert!(validate(&config).is_err());
    }
}
