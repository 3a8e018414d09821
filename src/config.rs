use std::collections::HashMap;

use crate::dialect::SqlDialect;
use crate::validation::budget::TokenPolicy;
use envconfig::Envconfig;
use log::debug;

/// Limits and dialect the validation pipeline runs with
#[derive(Envconfig, Debug, Clone)]
pub struct ValidatorConfig {
    #[envconfig(from = "SEMANTIC_TOKEN_CEILING", default = "30980")]
    pub token_ceiling: usize,

    #[envconfig(from = "SEMANTIC_BYTE_CEILING", default = "1048576")]
    pub byte_ceiling: usize,

    #[envconfig(from = "SEMANTIC_DIALECT", default = "snowflake")]
    pub dialect: SqlDialect,

    #[envconfig(from = "SEMANTIC_MAX_SAMPLE_VALUES", default = "10")]
    pub max_sample_values: usize,

    #[envconfig(from = "SEMANTIC_ALLOW_SELF_JOIN", default = "false")]
    pub allow_self_join: bool,

    #[envconfig(from = "SEMANTIC_TOKEN_POLICY", default = "lexical")]
    pub token_policy: TokenPolicy,
}

impl ValidatorConfig {
    pub fn new() -> Result<Self, envconfig::Error> {
        let config = Self::init_from_env()?;
        config.log_loaded();
        Ok(config)
    }

    /// Builds the config from explicit values, unset keys take their defaults
    pub fn from_map(values: &HashMap<String, String>) -> Result<Self, envconfig::Error> {
        let config = Self::init_from_hashmap(values)?;
        config.log_loaded();
        Ok(config)
    }

    fn log_loaded(&self) {
        debug!(
            "ValidatorConfig loaded: token_ceiling={}, byte_ceiling={}, dialect={}, max_sample_values={}, allow_self_join={}, token_policy={}",
            self.token_ceiling,
            self.byte_ceiling,
            self.dialect,
            self.max_sample_values,
            self.allow_self_join,
            self.token_policy
        );
    }
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        ValidatorConfig {
            token_ceiling: 30_980,
            byte_ceiling: 1_048_576,
            dialect: SqlDialect::Snowflake,
            max_sample_values: 10,
            allow_self_join: false,
            token_policy: TokenPolicy::Lexical,
        }
    }
}

#[derive(Envconfig, Debug, Clone)]
pub struct StoreConfig {
    #[envconfig(from = "SEMANTIC_STORE_PATH", default = "semantic_models")]
    pub store_path: String,
}

impl StoreConfig {
    pub fn new() -> Result<Self, envconfig::Error> {
        let config = Self::init_from_env()?;
        debug!("StoreConfig loaded: store_path={}", config.store_path);
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_environment_defaults() {
        let config = ValidatorConfig::from_map(&HashMap::new()).unwrap();
        let default = ValidatorConfig::default();
        assert_eq!(config.token_ceiling, default.token_ceiling);
        assert_eq!(config.byte_ceiling, default.byte_ceiling);
        assert_eq!(config.dialect, default.dialect);
        assert_eq!(config.max_sample_values, default.max_sample_values);
        assert_eq!(config.allow_self_join, default.allow_self_join);
        assert_eq!(config.token_policy, default.token_policy);
    }

    #[test]
    fn test_from_map_overrides() {
        let values: HashMap<String, String> = [
            ("SEMANTIC_DIALECT", "postgres"),
            ("SEMANTIC_BYTE_CEILING", "2048"),
            ("SEMANTIC_ALLOW_SELF_JOIN", "true"),
            ("SEMANTIC_TOKEN_POLICY", "chars_per_token:4"),
        ]
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let config = ValidatorConfig::from_map(&values).unwrap();
        assert_eq!(config.dialect, SqlDialect::Postgres);
        assert_eq!(config.byte_ceiling, 2048);
        assert!(config.allow_self_join);
        assert_eq!(config.token_policy, TokenPolicy::CharsPerToken(4));
    }

    #[test]
    fn test_invalid_value_is_an_error() {
        let values: HashMap<String, String> =
            [("SEMANTIC_DIALECT".to_string(), "oracle".to_string())]
                .into_iter()
                .collect();
        assert!(ValidatorConfig::from_map(&values).is_err());
    }
}
