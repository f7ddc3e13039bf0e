//! Configuration loading from files and environment variables.

use config::{Config, Environment, File};

use crate::error::{ServiceError, ServiceResult};

use super::static_config::ServiceConfig;

/// Load configuration from `config.*` (optional) and `DOCRELAY__*` env vars
pub fn load_config() -> ServiceResult<ServiceConfig> {
    Config::builder()
        .add_source(File::with_name("config").required(false))
        .add_source(
            Environment::with_prefix("DOCRELAY")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("ocr.languages")
                .try_parsing(true),
        )
        .build()
        .map_err(|e| ServiceError::Config {
            message: format!("Failed to build config: {}", e),
        })?
        .try_deserialize()
        .map_err(|e| ServiceError::Config {
            message: format!("Failed to deserialize config: {}", e),
        })
}
