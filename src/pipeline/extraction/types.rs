use serde::{Deserialize, Serialize};

use super::ExtractionError;

/// Where a piece of document text came from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TextSource {
    TextLayer,
    Secondary,
    Ocr,
}

impl TextSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TextLayer => "text_layer",
            Self::Secondary => "secondary",
            Self::Ocr => "ocr",
        }
    }
}

/// Per-page text produced by a text-layer extractor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageExtraction {
    pub page_number: usize,
    pub text: String,
}

/// Raw OCR result from the engine
#[derive(Debug, Clone)]
pub struct OcrPageResult {
    pub text: String,
    pub confidence: f32,
}

/// What one source contributed to the merged text.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SourceReport {
    pub source: TextSource,
    /// Lines this source added that no earlier source had.
    pub lines_added: usize,
    /// OCR only: zero-based page indices that produced text.
    pub pages: Vec<usize>,
    pub error: Option<String>,
}

/// Final text handed to the interpretation engine.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AcquiredText {
    pub text: String,
    pub sources: Vec<SourceReport>,
    /// True when OCR enrichment was attempted.
    pub enriched: bool,
    /// True when OCR stopped before its page budget because core fields were present.
    pub stopped_early: bool,
}

/// PDF text extraction abstraction (text layer or a secondary extractor)
pub trait PdfExtractor {
    fn extract_text(&self, pdf_bytes: &[u8]) -> Result<Vec<PageExtraction>, ExtractionError>;
}

/// Renders single PDF pages to images for OCR.
pub trait PdfPageRenderer {
    fn page_count(&self, pdf_bytes: &[u8]) -> Result<usize, ExtractionError>;

    /// Render a zero-based page at the given zoom factor (1.0 = 72 DPI).
    fn render_page(
        &self,
        pdf_bytes: &[u8],
        page_index: usize,
        zoom: f32,
    ) -> Result<Vec<u8>, ExtractionError>;
}

/// OCR engine abstraction (allows mocking for tests)
pub trait OcrEngine {
    fn ocr_image_with_lang(
        &self,
        image_bytes: &[u8],
        lang: &str,
        psm: u32,
    ) -> Result<OcrPageResult, ExtractionError>;
}
