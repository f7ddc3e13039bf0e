//! Configuration sections and their defaults.

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Top-level service configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    #[serde(default = "default_server")]
    pub server: ServerConfig,

    #[serde(default = "default_storage")]
    pub storage: StorageConfig,

    #[serde(default = "default_processor")]
    pub processor: ProcessorConfig,

    #[serde(default = "default_cleanup")]
    pub cleanup: CleanupConfig,

    #[serde(default = "default_ocr")]
    pub ocr: OcrConfig,

    #[serde(default = "default_limits")]
    pub limits: LimitsConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            server: default_server(),
            storage: default_storage(),
            processor: default_processor(),
            cleanup: default_cleanup(),
            ocr: default_ocr(),
            limits: default_limits(),
        }
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

/// Storage configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Submitted originals, stored as `{document_id}_{filename}`
    #[serde(default = "default_upload_dir")]
    pub upload_dir: PathBuf,

    /// Page images downloaded from the processor
    #[serde(default = "default_processed_dir")]
    pub processed_dir: PathBuf,

    /// Holds the SQLite database
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

/// External page-image processor
#[derive(Debug, Clone, Deserialize)]
pub struct ProcessorConfig {
    #[serde(default = "default_processor_url")]
    pub base_url: String,

    /// Sent as `X-API-KEY` on every request
    #[serde(default)]
    pub api_key: String,

    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_read_timeout_secs")]
    pub read_timeout_secs: u64,

    #[serde(default = "default_max_poll_attempts")]
    pub max_poll_attempts: u32,

    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl ProcessorConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Upper bound on how long a single document may spend polling
    pub fn max_poll_duration(&self) -> Duration {
        self.poll_interval()
            .checked_mul(self.max_poll_attempts)
            .unwrap_or(Duration::MAX)
    }
}

/// Transient storage reclamation
#[derive(Debug, Clone, Deserialize)]
pub struct CleanupConfig {
    /// Reclaim each document a fixed delay after it reaches a terminal status
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_cleanup_delay_secs")]
    pub delay_secs: u64,

    /// Periodic sweep of stale registry entries
    #[serde(default = "default_true")]
    pub scheduler_enabled: bool,

    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,

    /// Entries not updated for this long are reclaimed by the sweep
    #[serde(default = "default_max_age_secs")]
    pub max_age_secs: u64,
}

impl CleanupConfig {
    pub fn delay(&self) -> Duration {
        Duration::from_secs(self.delay_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    pub fn max_age(&self) -> Duration {
        Duration::from_secs(self.max_age_secs)
    }
}

/// Which OCR engine backs text extraction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OcrEngineKind {
    #[default]
    TesseractCli,
    Leptess,
}

/// OCR configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OcrConfig {
    #[serde(default)]
    pub engine: OcrEngineKind,

    /// Path or name of the tesseract executable
    #[serde(default = "default_tesseract_binary")]
    pub binary: String,

    #[serde(default = "default_languages")]
    pub languages: Vec<String>,

    #[serde(default)]
    pub tessdata_dir: Option<PathBuf>,
}

impl OcrConfig {
    /// Languages in tesseract's `eng+deu` form
    pub fn language_string(&self) -> String {
        if self.languages.is_empty() {
            "eng".to_string()
        } else {
            self.languages.join("+")
        }
    }
}

/// Size limits
#[derive(Debug, Clone, Deserialize)]
pub struct LimitsConfig {
    #[serde(default = "default_max_document_size")]
    pub max_document_size_bytes: u64,
}

// ==================== Default Value Functions ====================

fn default_true() -> bool {
    true
}

pub(crate) fn default_server() -> ServerConfig {
    ServerConfig {
        host: default_host(),
        port: default_port(),
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

pub(crate) fn default_storage() -> StorageConfig {
    StorageConfig {
        upload_dir: default_upload_dir(),
        processed_dir: default_processed_dir(),
        data_dir: default_data_dir(),
    }
}

fn default_upload_dir() -> PathBuf {
    PathBuf::from("./uploads")
}

fn default_processed_dir() -> PathBuf {
    PathBuf::from("./documents_processed")
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

pub(crate) fn default_processor() -> ProcessorConfig {
    ProcessorConfig {
        base_url: default_processor_url(),
        api_key: String::new(),
        connect_timeout_secs: default_connect_timeout_secs(),
        read_timeout_secs: default_read_timeout_secs(),
        max_poll_attempts: default_max_poll_attempts(),
        poll_interval_ms: default_poll_interval_ms(),
    }
}

fn default_processor_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_connect_timeout_secs() -> u64 {
    30
}

fn default_read_timeout_secs() -> u64 {
    300
}

fn default_max_poll_attempts() -> u32 {
    10
}

fn default_poll_interval_ms() -> u64 {
    1000
}

pub(crate) fn default_cleanup() -> CleanupConfig {
    CleanupConfig {
        enabled: true,
        delay_secs: default_cleanup_delay_secs(),
        scheduler_enabled: true,
        sweep_interval_secs: default_sweep_interval_secs(),
        max_age_secs: default_max_age_secs(),
    }
}

fn default_cleanup_delay_secs() -> u64 {
    30 * 60
}

fn default_sweep_interval_secs() -> u64 {
    30 * 60
}

fn default_max_age_secs() -> u64 {
    60 * 60
}

pub(crate) fn default_ocr() -> OcrConfig {
    OcrConfig {
        engine: OcrEngineKind::default(),
        binary: default_tesseract_binary(),
        languages: default_languages(),
        tessdata_dir: None,
    }
}

fn default_tesseract_binary() -> String {
    "tesseract".to_string()
}

fn default_languages() -> Vec<String> {
    vec!["por".to_string(), "eng".to_string()]
}

pub(crate) fn default_limits() -> LimitsConfig {
    LimitsConfig {
        max_document_size_bytes: default_max_document_size(),
    }
}

fn default_max_document_size() -> u64 {
    100 * 1024 * 1024
}
