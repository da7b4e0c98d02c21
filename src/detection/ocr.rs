use image::{GrayImage, RgbImage};
use ocrs::OcrEngineParams;
pub use ocrs::{ImageSource, OcrEngine}; // Re-export for use in other modules
use rten::Model;
use std::path::{Path, PathBuf};

use crate::detection::preprocessing;
use crate::error::RecognitionError;

/// Initialize OCR engine with models from `model_dir`, or the standard cache
/// location when none is given
pub fn init_ocr_engine(model_dir: Option<&Path>) -> anyhow::Result<OcrEngine> {
    let cache_dir = match model_dir {
        Some(dir) => dir.to_path_buf(),
        None => {
            let home_dir = std::env::var("HOME").or_else(|_| std::env::var("USERPROFILE"))?;
            Path::new(&home_dir).join(".cache/ocrs")
        }
    };
    let detection_model_path = cache_dir.join("text-detection.rten");
    let recognition_model_path = cache_dir.join("text-recognition.rten");

    // Check if models exist
    if !detection_model_path.exists() || !recognition_model_path.exists() {
        anyhow::bail!(
            "OCR models not found. Please run: ocrs-cli --help (or download models manually)\n\
             Expected locations:\n  - {}\n  - {}",
            detection_model_path.display(),
            recognition_model_path.display()
        );
    }

    let detection_model = Model::load_file(&detection_model_path)?;
    let recognition_model = Model::load_file(&recognition_model_path)?;

    let engine = OcrEngine::new(OcrEngineParams {
        detection_model: Some(detection_model),
        recognition_model: Some(recognition_model),
        ..Default::default()
    })?;

    Ok(engine)
}

/// Reads a single line of text from a prepared plate image
pub trait LineReader {
    fn read_line(&self, image: &GrayImage) -> Result<String, RecognitionError>;
}

impl LineReader for OcrEngine {
    fn read_line(&self, image: &GrayImage) -> Result<String, RecognitionError> {
        // Convert to RGB8 format for OCR
        let img = image::DynamicImage::ImageLuma8(image.clone()).to_rgb8();

        let img_source = ImageSource::from_bytes(img.as_raw(), img.dimensions())
            .map_err(|e| RecognitionError::Ocr(e.to_string()))?;
        let ocr_input = self
            .prepare_input(img_source)
            .map_err(|e| RecognitionError::Ocr(e.to_string()))?;
        let text = self
            .get_text(&ocr_input)
            .map_err(|e| RecognitionError::Ocr(e.to_string()))?;

        Ok(join_lines(&text))
    }
}

/// Collapse multi-line OCR output into one line
pub fn join_lines(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Turns a plate crop into raw text
pub struct TextRecognizer {
    reader: Box<dyn LineReader>,
    /// Where the upscaled binary plate is written, overwritten on every call
    artifact_path: Option<PathBuf>,
}

impl TextRecognizer {
    pub fn new(reader: Box<dyn LineReader>) -> Self {
        Self {
            reader,
            artifact_path: None,
        }
    }

    pub fn with_artifact_path(mut self, path: Option<PathBuf>) -> Self {
        self.artifact_path = path;
        self
    }

    /// Grayscale, smooth, binarize and upscale a plate region for OCR
    pub fn prepare(plate: &RgbImage) -> Result<GrayImage, RecognitionError> {
        if plate.width() == 0 || plate.height() == 0 {
            return Err(RecognitionError::EmptyRegion);
        }

        let gray = preprocessing::to_grayscale(plate);
        let blurred = preprocessing::apply_blur(&gray, preprocessing::PLATE_BLUR_SIGMA);
        let binary = preprocessing::binarize(&blurred);

        let (width, height) = binary.dimensions();
        let factor = preprocessing::upscale_factor(width, height);
        Ok(preprocessing::upscale(&binary, factor))
    }

    /// Recognize text, surfacing any failure
    pub fn try_recognize(&self, plate: &RgbImage) -> Result<String, RecognitionError> {
        let prepared = Self::prepare(plate)?;

        if let Some(path) = &self.artifact_path {
            match prepared.save(path) {
                Ok(()) => tracing::debug!(path = %path.display(), "saved resized plate"),
                Err(e) => tracing::warn!(path = %path.display(), error = %e, "failed to save resized plate"),
            }
        }

        let text = self.reader.read_line(&prepared)?;
        Ok(text.trim().to_string())
    }

    /// Recognize text; failures are logged and yield an empty string
    pub fn recognize(&self, plate: &RgbImage) -> String {
        match self.try_recognize(plate) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(stage = "recognize", error = %e, "text recognition failed");
                String::new()
            }
        }
    }
}
