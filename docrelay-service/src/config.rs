//! Service configuration.
//!
//! All settings are read once at startup from an optional `config` file and
//! `DOCRELAY__*` environment variables. Every field has a default so the
//! service starts without any configuration present.

mod loader;
mod static_config;

pub use loader::load_config;
pub use static_config::{
    CleanupConfig, LimitsConfig, OcrConfig, OcrEngineKind, ProcessorConfig, ServerConfig,
    ServiceConfig, StorageConfig,
};
