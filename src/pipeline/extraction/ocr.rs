use super::types::{OcrEngine, OcrPageResult};
use super::ExtractionError;
use crate::pipeline_config::PipelineConfig;

/// Order in which pages are sent to OCR.
///
/// Identity, totals and category subtotals usually sit on the first, last and
/// middle pages, so those go first. `max_pages == 0` visits every page: the
/// priority pages first, then the rest in natural order.
pub fn ocr_page_order(page_count: usize, max_pages: usize) -> Vec<usize> {
    if page_count == 0 {
        return Vec::new();
    }

    let last = page_count as isize - 1;
    let middle = (page_count / 2) as isize;
    let priority = [0, last, middle, last - 1, 1, middle - 1, middle + 1, last - 2, 2];

    let limit = if max_pages == 0 {
        page_count
    } else {
        max_pages.min(page_count)
    };

    let mut selected: Vec<usize> = Vec::with_capacity(limit);
    let candidates = priority
        .iter()
        .filter(|&&i| i >= 0 && i <= last)
        .map(|&i| i as usize)
        .chain(0..page_count);

    for index in candidates {
        if selected.len() >= limit {
            break;
        }
        if !selected.contains(&index) {
            selected.push(index);
        }
    }

    selected
}

/// Recognize one rendered page, trying the primary language set first and the
/// fallback set when the primary errors or yields blank text.
///
/// Returns `Ok(None)` when neither language produced text. `OcrUnavailable`
/// is propagated immediately: there is no point trying another language.
pub fn recognize_page(
    engine: &dyn OcrEngine,
    image: &[u8],
    config: &PipelineConfig,
) -> Result<Option<String>, ExtractionError> {
    let mut langs = vec![config.ocr_lang_primary.as_str()];
    if config.ocr_lang_fallback != config.ocr_lang_primary {
        langs.push(config.ocr_lang_fallback.as_str());
    }

    for lang in langs {
        match engine.ocr_image_with_lang(image, lang, config.ocr_psm) {
            Ok(result) if !result.text.trim().is_empty() => {
                tracing::debug!(lang, confidence = result.confidence, "OCR page recognized");
                return Ok(Some(result.text));
            }
            Ok(_) => {
                tracing::debug!(lang, "OCR returned blank text");
            }
            Err(ExtractionError::OcrUnavailable(msg)) => {
                return Err(ExtractionError::OcrUnavailable(msg));
            }
            Err(e) => {
                tracing::debug!(lang, error = %e, "OCR attempt failed");
            }
        }
    }

    Ok(None)
}

/// Mock OCR engine for unit testing without a real OCR backend.
///
/// With fixed text it returns that text for every image; in echo mode it
/// returns the image bytes themselves as UTF-8, which lets a mock renderer
/// hand page text straight through.
pub struct MockOcrEngine {
    text: Option<String>,
    confidence: f32,
    failing_langs: Vec<String>,
    unavailable: bool,
}

impl MockOcrEngine {
    pub fn new(text: &str, confidence: f32) -> Self {
        Self {
            text: Some(text.to_string()),
            confidence,
            failing_langs: vec![],
            unavailable: false,
        }
    }

    pub fn echo() -> Self {
        Self {
            text: None,
            confidence: 0.9,
            failing_langs: vec![],
            unavailable: false,
        }
    }

    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::echo()
        }
    }

    /// Make every call with this language set fail with a processing error.
    pub fn failing_for(mut self, lang: &str) -> Self {
        self.failing_langs.push(lang.to_string());
        self
    }
}

impl OcrEngine for MockOcrEngine {
    fn ocr_image_with_lang(
        &self,
        image_bytes: &[u8],
        lang: &str,
        _psm: u32,
    ) -> Result<OcrPageResult, ExtractionError> {
        if self.unavailable {
            return Err(ExtractionError::OcrUnavailable("mock engine offline".into()));
        }
        if self.failing_langs.iter().any(|l| l == lang) {
            return Err(ExtractionError::OcrProcessing(format!("no traineddata for {lang}")));
        }

        let text = match &self.text {
            Some(text) => text.clone(),
            None => String::from_utf8_lossy(image_bytes).into_owned(),
        };

        Ok(OcrPageResult {
            text,
            confidence: self.confidence,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_order_prioritizes_first_last_middle() {
        assert_eq!(ocr_page_order(10, 4), vec![0, 9, 5, 8]);
    }

    #[test]
    fn page_order_small_documents() {
        assert_eq!(ocr_page_order(1, 4), vec![0]);
        assert_eq!(ocr_page_order(2, 4), vec![0, 1]);
        assert_eq!(ocr_page_order(3, 4), vec![0, 2, 1]);
        assert!(ocr_page_order(0, 4).is_empty());
    }

    #[test]
    fn page_order_unlimited_covers_every_page_once() {
        let order = ocr_page_order(12, 0);
        assert_eq!(order.len(), 12);
        assert_eq!(&order[..3], &[0, 11, 6]);
        let mut sorted = order.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, (0..12).collect::<Vec<_>>());
    }

    #[test]
    fn recognize_uses_primary_language() {
        let engine = MockOcrEngine::new("Total Tagihan Rp 10.000", 0.8);
        let text = recognize_page(&engine, b"img", &PipelineConfig::default()).unwrap();
        assert_eq!(text.as_deref(), Some("Total Tagihan Rp 10.000"));
    }

    #[test]
    fn recognize_falls_back_when_primary_fails() {
        let engine = MockOcrEngine::echo().failing_for("ind+eng");
        let text = recognize_page(&engine, b"Nama Pasien", &PipelineConfig::default()).unwrap();
        assert_eq!(text.as_deref(), Some("Nama Pasien"));
    }

    #[test]
    fn recognize_blank_in_both_languages_is_none() {
        let engine = MockOcrEngine::new("   \n ", 0.2);
        let text = recognize_page(&engine, b"img", &PipelineConfig::default()).unwrap();
        assert!(text.is_none());
    }

    #[test]
    fn recognize_propagates_unavailable_engine() {
        let engine = MockOcrEngine::unavailable();
        let result = recognize_page(&engine, b"img", &PipelineConfig::default());
        assert!(matches!(result, Err(ExtractionError::OcrUnavailable(_))));
    }
}
