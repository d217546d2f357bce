pub mod pipeline;
pub mod prepare;
pub mod recognizer;

pub use pipeline::{PipelineError, ScanPipeline};
pub use prepare::{prepare_for_ocr, PrepareError};
pub use recognizer::{default_backend, MockRecognizer, OcrBackend, OcrError};
