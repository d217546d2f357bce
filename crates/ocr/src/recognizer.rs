use thiserror::Error;

#[derive(Debug, Error)]
pub enum OcrError {
    #[error("image decode error: {0}")]
    ImageDecode(String),
    #[error("OCR engine error: {0}")]
    Engine(String),
}

/// Abstraction over an OCR engine. Implementations take prepared PNG bytes
/// and return the recognized text.
pub trait OcrBackend: Send + Sync {
    fn recognize(&self, image_bytes: &[u8]) -> Result<String, OcrError>;
}

/// The backend this build ships with: Tesseract when compiled in, otherwise
/// none (callers must then accept text input only).
#[cfg(feature = "tesseract")]
pub fn default_backend(lang: &str) -> Option<Box<dyn OcrBackend>> {
    Some(Box::new(tesseract_backend::TesseractRecognizer::new(
        tesseract_backend::TesseractConfig {
            lang: lang.to_string(),
            ..Default::default()
        },
    )))
}

#[cfg(not(feature = "tesseract"))]
pub fn default_backend(_lang: &str) -> Option<Box<dyn OcrBackend>> {
    None
}

// ── Mock backend (always available, used for tests) ───────────────────────────

/// Scripted backend: replies with a preset text, or a preset engine failure.
/// Lets the extraction stack and the failure paths above it be exercised
/// without Tesseract installed.
pub struct MockRecognizer {
    reply: Result<String, String>,
}

impl MockRecognizer {
    pub fn new(text: impl Into<String>) -> Self {
        Self { reply: Ok(text.into()) }
    }

    /// A mock whose `recognize` always fails with an engine error.
    pub fn failing(message: impl Into<String>) -> Self {
        Self { reply: Err(message.into()) }
    }
}

impl OcrBackend for MockRecognizer {
    fn recognize(&self, _image_bytes: &[u8]) -> Result<String, OcrError> {
        self.reply.clone().map_err(OcrError::Engine)
    }
}

// ── Tesseract backend (optional, gated behind `tesseract` feature) ─────────────

#[cfg(feature = "tesseract")]
pub mod tesseract_backend {
    use super::{OcrBackend, OcrError};
    use leptess::{LepTess, Variable};

    #[derive(Debug, Clone)]
    pub struct TesseractConfig {
        /// Directory holding `*.traineddata`; `None` uses the system default.
        pub data_path: Option<String>,
        pub lang: String,
        /// Receipts are printed around 300 DPI; camera captures carry no DPI
        /// metadata, so the engine is told explicitly.
        pub source_dpi: i32,
    }

    impl Default for TesseractConfig {
        fn default() -> Self {
            Self { data_path: None, lang: "eng".to_string(), source_dpi: 300 }
        }
    }

    pub struct TesseractRecognizer {
        config: TesseractConfig,
    }

    impl TesseractRecognizer {
        pub fn new(config: TesseractConfig) -> Self {
            Self { config }
        }
    }

    impl OcrBackend for TesseractRecognizer {
        fn recognize(&self, image_bytes: &[u8]) -> Result<String, OcrError> {
            let mut engine = LepTess::new(self.config.data_path.as_deref(), &self.config.lang)
                .map_err(|e| OcrError::Engine(e.to_string()))?;
            // Receipt lines put the label and the amount in separate columns;
            // collapsing the gap between them would break label matching.
            engine
                .set_variable(Variable::PreserveInterwordSpaces, "1")
                .map_err(|e| OcrError::Engine(e.to_string()))?;
            engine
                .set_image_from_mem(image_bytes)
                .map_err(|e| OcrError::ImageDecode(e.to_string()))?;
            engine.set_source_resolution(self.config.source_dpi);
            engine
                .get_utf8_text()
                .map_err(|e| OcrError::Engine(e.to_string()))
        }
    }
}
