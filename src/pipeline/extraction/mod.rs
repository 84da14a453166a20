pub mod types;
pub mod sanitize;
pub mod ocr;
pub mod orchestrator;

pub use types::*;
pub use sanitize::*;
pub use ocr::*;
pub use orchestrator::*;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("PDF parsing failed: {0}")]
    PdfParsing(String),

    #[error("Page rendering failed: {0}")]
    Render(String),

    #[error("OCR processing failed: {0}")]
    OcrProcessing(String),

    #[error("OCR engine unavailable: {0}")]
    OcrUnavailable(String),

    #[error("No text could be extracted from the document: {0}")]
    NoText(String),
}
