//! In-process Tesseract through leptess.

use std::io::Cursor;
use std::path::{Path, PathBuf};

use crate::error::OcrError;

use super::OcrEngine;

pub struct LeptessEngine {
    languages: String,
    tessdata_dir: Option<PathBuf>,
}

impl LeptessEngine {
    pub fn new(languages: String, tessdata_dir: Option<PathBuf>) -> Self {
        Self {
            languages,
            tessdata_dir,
        }
    }
}

impl OcrEngine for LeptessEngine {
    fn name(&self) -> &'static str {
        "leptess"
    }

    fn recognize(&self, image_path: &Path) -> Result<String, OcrError> {
        let _span = tracing::debug_span!("ocr.leptess", path = %image_path.display()).entered();
        let engine_error = |message: String| OcrError::Engine {
            path: image_path.display().to_string(),
            message,
        };

        // Decoded pixels and the PNG copy are released when this call returns
        let img = image::open(image_path)
            .map_err(|e| engine_error(format!("Failed to load image: {}", e)))?;

        let mut png_data = Vec::new();
        img.write_to(&mut Cursor::new(&mut png_data), image::ImageFormat::Png)
            .map_err(|e| engine_error(format!("Failed to convert image: {}", e)))?;
        drop(img);

        let datapath = self.tessdata_dir.as_ref().and_then(|p| p.to_str());
        let mut lt = leptess::LepTess::new(datapath, &self.languages)
            .map_err(|e| engine_error(format!("Failed to initialize Tesseract: {}", e)))?;

        lt.set_image_from_mem(&png_data)
            .map_err(|e| engine_error(format!("Failed to set image for OCR: {}", e)))?;

        lt.get_utf8_text()
            .map_err(|e| engine_error(format!("OCR failed: {}", e)))
    }
}
