//! Text recognition engines.
//!
//! Engines are synchronous and are not assumed to be safe for concurrent use;
//! the extractor drives them one image at a time on the blocking pool.

#[cfg(feature = "leptess")]
mod leptess;

#[cfg(feature = "leptess")]
pub use self::leptess::LeptessEngine;

use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::{OcrConfig, OcrEngineKind};
use crate::error::{OcrError, ServiceResult};

/// A text recognition engine working on local image files
pub trait OcrEngine: Send + Sync {
    fn name(&self) -> &'static str;

    /// Recognize the text in one image. Empty output is not an error.
    fn recognize(&self, image_path: &Path) -> Result<String, OcrError>;
}

/// Build the engine selected in configuration
pub fn build_engine(config: &OcrConfig) -> ServiceResult<Arc<dyn OcrEngine>> {
    let tessdata_dir = resolve_tessdata_dir(
        config.tessdata_dir.as_deref(),
        std::env::var_os("TESSDATA_PREFIX").map(PathBuf::from),
    );

    match config.engine {
        OcrEngineKind::TesseractCli => Ok(Arc::new(TesseractCli::new(
            &config.binary,
            config.language_string(),
            tessdata_dir,
        ))),
        #[cfg(feature = "leptess")]
        OcrEngineKind::Leptess => Ok(Arc::new(LeptessEngine::new(
            config.language_string(),
            tessdata_dir,
        ))),
        #[cfg(not(feature = "leptess"))]
        OcrEngineKind::Leptess => Err(crate::error::ServiceError::Config {
            message: "ocr.engine = \"leptess\" requires building with the `leptess` feature"
                .to_string(),
        }),
    }
}

/// Pick the tessdata directory: the configured one if it exists, then
/// `TESSDATA_PREFIX` if it exists, otherwise the engine's built-in default.
pub fn resolve_tessdata_dir(configured: Option<&Path>, env_prefix: Option<PathBuf>) -> Option<PathBuf> {
    if let Some(path) = configured {
        if path.is_dir() {
            info!(path = %path.display(), "Using configured tessdata path");
            return Some(path.to_path_buf());
        }
        warn!(path = %path.display(), "Configured tessdata path does not exist");
    }

    if let Some(path) = env_prefix.filter(|p| p.is_dir()) {
        info!(path = %path.display(), "Using TESSDATA_PREFIX from environment");
        return Some(path);
    }

    info!("No explicit tessdata path found, using engine defaults");
    None
}

/// Runs the `tesseract` executable and reads the text from stdout
pub struct TesseractCli {
    binary: String,
    languages: String,
    tessdata_dir: Option<PathBuf>,
}

impl TesseractCli {
    pub fn new(binary: &str, languages: String, tessdata_dir: Option<PathBuf>) -> Self {
        Self {
            binary: binary.to_string(),
            languages,
            tessdata_dir,
        }
    }

    fn command(&self, image_path: &Path) -> Command {
        let mut command = Command::new(&self.binary);
        command
            .arg(image_path)
            .arg("stdout")
            .arg("-l")
            .arg(&self.languages);
        if let Some(dir) = &self.tessdata_dir {
            command.arg("--tessdata-dir").arg(dir);
        }
        command
    }
}

impl OcrEngine for TesseractCli {
    fn name(&self) -> &'static str {
        "tesseract-cli"
    }

    fn recognize(&self, image_path: &Path) -> Result<String, OcrError> {
        let engine_error = |message: String| OcrError::Engine {
            path: image_path.display().to_string(),
            message,
        };

        let output = self
            .command(image_path)
            .output()
            .map_err(|e| engine_error(format!("failed to run {}: {}", self.binary, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(engine_error(format!(
                "{} exited with {}: {}",
                self.binary,
                output.status,
                stderr.trim()
            )));
        }

        String::from_utf8(output.stdout)
            .map_err(|e| engine_error(format!("output is not UTF-8: {}", e)))
    }
}
