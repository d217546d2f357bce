use thiserror::Error;

use crate::prepare::{self, PrepareError};
use crate::recognizer::{OcrBackend, OcrError};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("image preparation failed: {0}")]
    Prepare(#[from] PrepareError),
    #[error("recognition failed: {0}")]
    Ocr(#[from] OcrError),
}

/// Image bytes → prepared PNG → recognized text.
///
/// Synchronous and CPU-bound; async callers should run it on a blocking
/// task. Holds no per-request state.
pub struct ScanPipeline {
    backend: Box<dyn OcrBackend>,
}

impl ScanPipeline {
    pub fn new(backend: Box<dyn OcrBackend>) -> Self {
        Self { backend }
    }

    pub fn read_text(&self, image_bytes: &[u8]) -> Result<String, PipelineError> {
        let prepared = prepare::prepare_for_ocr(image_bytes)?;
        Ok(self.backend.recognize(&prepared)?)
    }
}
