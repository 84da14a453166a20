use std::collections::HashSet;

use super::ocr::{ocr_page_order, recognize_page};
use super::sanitize::{is_text_too_short, normalized_lines, sanitize_extracted_text};
use super::types::{
    AcquiredText, OcrEngine, PdfExtractor, PdfPageRenderer, SourceReport, TextSource,
};
use super::ExtractionError;
use crate::pipeline::structuring::components::count_alias_categories;
use crate::pipeline::structuring::labels::critical_marker_count;
use crate::pipeline::structuring::name::extract_name;
use crate::pipeline::structuring::total::extract_total;
use crate::pipeline_config::PipelineConfig;

/// Critical markers a sufficient text layer must show.
const MIN_CRITICAL_MARKERS: usize = 2;

/// Text acquisition for one document.
/// Uses trait objects for the text layer, the secondary extractor and OCR,
/// enabling dependency injection.
pub struct DocumentExtractor {
    text_layer: Box<dyn PdfExtractor + Send + Sync>,
    secondary: Option<Box<dyn PdfExtractor + Send + Sync>>,
    pdf_renderer: Option<Box<dyn PdfPageRenderer + Send + Sync>>,
    ocr_engine: Option<Box<dyn OcrEngine + Send + Sync>>,
}

impl DocumentExtractor {
    pub fn new(text_layer: Box<dyn PdfExtractor + Send + Sync>) -> Self {
        Self {
            text_layer,
            secondary: None,
            pdf_renderer: None,
            ocr_engine: None,
        }
    }

    /// Add a second text-layer extractor, run after the primary one.
    pub fn with_secondary(mut self, extractor: Box<dyn PdfExtractor + Send + Sync>) -> Self {
        self.secondary = Some(extractor);
        self
    }

    /// Add a page renderer and OCR engine for enrichment of scanned pages.
    pub fn with_ocr(
        mut self,
        renderer: Box<dyn PdfPageRenderer + Send + Sync>,
        engine: Box<dyn OcrEngine + Send + Sync>,
    ) -> Self {
        self.pdf_renderer = Some(renderer);
        self.ocr_engine = Some(engine);
        self
    }

    /// Extract, merge and (when needed) OCR-enrich the document text.
    ///
    /// A failing source is skipped. `NoText` is returned only when no source
    /// produced any text; it carries the first source error.
    pub fn acquire_text(
        &self,
        pdf_bytes: &[u8],
        config: &PipelineConfig,
    ) -> Result<AcquiredText, ExtractionError> {
        tracing::info!(bytes = pdf_bytes.len(), "Starting text acquisition");

        let mut merged = MergedText::default();
        let mut sources = Vec::new();
        let mut first_error: Option<String> = None;

        let extractors = [
            (TextSource::TextLayer, Some(&*self.text_layer)),
            (TextSource::Secondary, self.secondary.as_deref()),
        ];
        for (source, extractor) in extractors {
            let Some(extractor) = extractor else {
                continue;
            };
            let report = run_extractor(source, extractor, pdf_bytes, &mut merged);
            if let Some(error) = &report.error {
                first_error.get_or_insert_with(|| error.clone());
            }
            sources.push(report);
        }

        let mut enriched = false;
        let mut stopped_early = false;
        if needs_enrichment(&merged.text(), config) {
            match (&self.pdf_renderer, &self.ocr_engine) {
                (Some(renderer), Some(engine)) => {
                    enriched = true;
                    let (report, early) =
                        run_ocr(&**renderer, &**engine, pdf_bytes, config, &mut merged);
                    if let Some(error) = &report.error {
                        first_error.get_or_insert_with(|| error.clone());
                    }
                    stopped_early = early;
                    sources.push(report);
                }
                _ => {
                    tracing::debug!("Enrichment needed but no OCR engine configured");
                }
            }
        }

        let text = merged.text();
        if text.trim().is_empty() {
            let reason = first_error.unwrap_or_else(|| "every source returned empty text".into());
            tracing::warn!(reason = %reason, "Text acquisition failed");
            return Err(ExtractionError::NoText(reason));
        }

        tracing::info!(
            lines = merged.lines.len(),
            enriched,
            stopped_early,
            "Text acquisition complete"
        );

        Ok(AcquiredText {
            text,
            sources,
            enriched,
            stopped_early,
        })
    }
}

/// Running merged text. A line is appended unless an earlier source already
/// produced it; repeats within one source are kept.
#[derive(Debug, Default)]
struct MergedText {
    lines: Vec<String>,
    seen: HashSet<String>,
}

impl MergedText {
    /// Merge one source's text, returning how many lines it added.
    fn merge(&mut self, text: &str) -> usize {
        let added: Vec<String> = normalized_lines(&sanitize_extracted_text(text))
            .into_iter()
            .filter(|line| !self.seen.contains(line))
            .collect();
        self.seen.extend(added.iter().cloned());
        let count = added.len();
        self.lines.extend(added);
        count
    }

    fn text(&self) -> String {
        self.lines.join("\n")
    }
}

fn run_extractor(
    source: TextSource,
    extractor: &dyn PdfExtractor,
    pdf_bytes: &[u8],
    merged: &mut MergedText,
) -> SourceReport {
    match extractor.extract_text(pdf_bytes) {
        Ok(pages) => {
            let text = pages
                .iter()
                .map(|p| p.text.as_str())
                .collect::<Vec<_>>()
                .join("\n");
            let lines_added = merged.merge(&text);
            tracing::debug!(source = source.as_str(), pages = pages.len(), lines_added, "Source merged");
            SourceReport {
                source,
                lines_added,
                pages: Vec::new(),
                error: None,
            }
        }
        Err(e) => {
            tracing::warn!(source = source.as_str(), error = %e, "Text source failed, skipping");
            SourceReport {
                source,
                lines_added: 0,
                pages: Vec::new(),
                error: Some(e.to_string()),
            }
        }
    }
}

/// Enrichment is required when forced, when the text is too short, or when
/// fewer than two critical markers are present.
pub fn needs_enrichment(text: &str, config: &PipelineConfig) -> bool {
    config.always_enrich
        || is_text_too_short(text, config.min_text_chars)
        || critical_marker_count(text) < MIN_CRITICAL_MARKERS
}

/// Lightweight sufficiency check run after each OCR page: name and total
/// present and enough categories named. No amounts are reconciled.
pub fn core_fields_present(text: &str, component_hits: usize) -> bool {
    extract_name(text).is_some()
        && extract_total(text).is_some()
        && count_alias_categories(text) >= component_hits
}

/// OCR pages in priority order, merging each page as it arrives.
/// Returns the OCR source report and whether it stopped early.
fn run_ocr(
    renderer: &dyn PdfPageRenderer,
    engine: &dyn OcrEngine,
    pdf_bytes: &[u8],
    config: &PipelineConfig,
    merged: &mut MergedText,
) -> (SourceReport, bool) {
    let mut report = SourceReport {
        source: TextSource::Ocr,
        lines_added: 0,
        pages: Vec::new(),
        error: None,
    };

    let page_count = match renderer.page_count(pdf_bytes) {
        Ok(count) => count,
        Err(e) => {
            tracing::warn!(error = %e, "Cannot count pages for OCR");
            report.error = Some(e.to_string());
            return (report, false);
        }
    };

    let order = ocr_page_order(page_count, config.ocr_max_pages);
    tracing::info!(page_count, planned = order.len(), "Starting OCR enrichment");

    for (position, &page) in order.iter().enumerate() {
        let image = match renderer.render_page(pdf_bytes, page, config.ocr_zoom) {
            Ok(image) => image,
            Err(e) => {
                tracing::debug!(page, error = %e, "Page render failed, skipping");
                continue;
            }
        };

        match recognize_page(engine, &image, config) {
            Ok(Some(text)) => {
                report.lines_added += merged.merge(&text);
                report.pages.push(page);
                tracing::debug!(page, lines_added = report.lines_added, "OCR page merged");

                let remaining = order.len() - position - 1;
                if remaining > 0
                    && core_fields_present(&merged.text(), config.ocr_early_stop_component_hits)
                {
                    tracing::info!(page, remaining, "Core fields present, stopping OCR early");
                    return (report, true);
                }
            }
            Ok(None) => {
                tracing::debug!(page, "OCR produced no text");
            }
            Err(ExtractionError::OcrUnavailable(msg)) => {
                tracing::warn!(error = %msg, "OCR engine unavailable, enrichment aborted");
                report.error = Some(msg);
                break;
            }
            Err(e) => {
                tracing::debug!(page, error = %e, "OCR page failed, skipping");
            }
        }
    }

    (report, false)
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::pipeline::extraction::ocr::MockOcrEngine;
    use crate::pipeline::extraction::types::PageExtraction;

    const SUFFICIENT: &str = "Rincian Biaya Pasien\nNama Pasien: BUDI SANTOSO\n\
                              Total Tagihan Rp 1.000.000";

    /// Mock PDF extractor for testing
    struct MockPdfExtractor {
        pages: Option<Vec<String>>,
    }

    impl MockPdfExtractor {
        fn with_text(text: &str) -> Self {
            Self {
                pages: Some(vec![text.to_string()]),
            }
        }

        fn failing() -> Self {
            Self { pages: None }
        }
    }

    impl PdfExtractor for MockPdfExtractor {
        fn extract_text(&self, _pdf_bytes: &[u8]) -> Result<Vec<PageExtraction>, ExtractionError> {
            match &self.pages {
                Some(pages) => Ok(pages
                    .iter()
                    .enumerate()
                    .map(|(i, text)| PageExtraction {
                        page_number: i + 1,
                        text: text.clone(),
                    })
                    .collect()),
                None => Err(ExtractionError::PdfParsing("broken xref table".into())),
            }
        }
    }

    /// Renders each page as its own text, for `MockOcrEngine::echo()`.
    /// Records the page indices it was asked to render.
    struct MockPdfPageRenderer {
        pages: Vec<String>,
        rendered: Arc<Mutex<Vec<usize>>>,
    }

    impl MockPdfPageRenderer {
        fn new(pages: &[&str]) -> (Self, Arc<Mutex<Vec<usize>>>) {
            let rendered = Arc::new(Mutex::new(Vec::new()));
            let renderer = Self {
                pages: pages.iter().map(|p| p.to_string()).collect(),
                rendered: Arc::clone(&rendered),
            };
            (renderer, rendered)
        }
    }

    impl PdfPageRenderer for MockPdfPageRenderer {
        fn page_count(&self, _pdf_bytes: &[u8]) -> Result<usize, ExtractionError> {
            Ok(self.pages.len())
        }

        fn render_page(
            &self,
            _pdf_bytes: &[u8],
            page_index: usize,
            _zoom: f32,
        ) -> Result<Vec<u8>, ExtractionError> {
            self.rendered.lock().unwrap().push(page_index);
            self.pages
                .get(page_index)
                .map(|p| p.as_bytes().to_vec())
                .ok_or_else(|| ExtractionError::Render(format!("no page {page_index}")))
        }
    }

    fn with_echo_ocr(text_layer: &str, pages: &[&str]) -> (DocumentExtractor, Arc<Mutex<Vec<usize>>>) {
        let (renderer, rendered) = MockPdfPageRenderer::new(pages);
        let extractor = DocumentExtractor::new(Box::new(MockPdfExtractor::with_text(text_layer)))
            .with_ocr(Box::new(renderer), Box::new(MockOcrEngine::echo()));
        (extractor, rendered)
    }

    #[test]
    fn sufficient_text_layer_skips_ocr() {
        let (extractor, rendered) = with_echo_ocr(SUFFICIENT, &["OCR page"]);
        let acquired = extractor.acquire_text(b"%PDF", &PipelineConfig::default()).unwrap();
        assert!(!acquired.enriched);
        assert!(rendered.lock().unwrap().is_empty());
        assert!(acquired.text.contains("BUDI SANTOSO"));
    }

    #[test]
    fn short_text_triggers_enrichment() {
        let (extractor, rendered) = with_echo_ocr("Nama: BUDI", &["Laboratorium Rp 50.000"]);
        assert!(is_text_too_short("Nama: BUDI", 40));

        let acquired = extractor.acquire_text(b"%PDF", &PipelineConfig::default()).unwrap();
        assert!(acquired.enriched);
        assert_eq!(*rendered.lock().unwrap(), vec![0]);
        assert_eq!(acquired.text, "Nama: BUDI\nLaboratorium Rp 50.000");
    }

    #[test]
    fn missing_markers_trigger_enrichment() {
        let long_but_unlabeled = "Terima kasih atas kunjungan anda ke rumah sakit kami hari ini.";
        assert!(needs_enrichment(long_but_unlabeled, &PipelineConfig::default()));
        assert!(!needs_enrichment(SUFFICIENT, &PipelineConfig::default()));
    }

    #[test]
    fn always_enrich_forces_ocr() {
        let config = PipelineConfig {
            always_enrich: true,
            ..PipelineConfig::default()
        };
        assert!(needs_enrichment(SUFFICIENT, &config));
    }

    #[test]
    fn merge_keeps_first_seen_order_and_in_source_repeats() {
        let extractor = DocumentExtractor::new(Box::new(MockPdfExtractor::with_text("A\nA\nB")))
            .with_secondary(Box::new(MockPdfExtractor::with_text("B\n  C  ")));
        let acquired = extractor.acquire_text(b"%PDF", &PipelineConfig::default()).unwrap();
        assert_eq!(acquired.text, "A\nA\nB\nC");
        assert_eq!(acquired.sources[0].lines_added, 3);
        assert_eq!(acquired.sources[1].lines_added, 1);
    }

    #[test]
    fn failing_text_layer_recovered_by_secondary() {
        let extractor = DocumentExtractor::new(Box::new(MockPdfExtractor::failing()))
            .with_secondary(Box::new(MockPdfExtractor::with_text(SUFFICIENT)));
        let acquired = extractor.acquire_text(b"%PDF", &PipelineConfig::default()).unwrap();
        assert!(acquired.text.contains("Total Tagihan"));
        assert!(acquired.sources[0].error.is_some());
        assert!(acquired.sources[1].error.is_none());
    }

    #[test]
    fn no_text_anywhere_is_fatal_with_first_error() {
        let extractor = DocumentExtractor::new(Box::new(MockPdfExtractor::failing()))
            .with_secondary(Box::new(MockPdfExtractor::with_text("   ")));
        let err = extractor
            .acquire_text(b"%PDF", &PipelineConfig::default())
            .unwrap_err();
        match err {
            ExtractionError::NoText(reason) => assert!(reason.contains("broken xref table")),
            other => panic!("expected NoText, got {other:?}"),
        }
    }

    #[test]
    fn ocr_stops_early_when_core_fields_present() {
        let page0 = "Nama Pasien: BUDI SANTOSO\nTotal Tagihan Rp 1.000.000\n\
                     Obat Rp 100.000\nLaboratorium Rp 50.000\nRadiologi Rp 80.000";
        let (extractor, rendered) = with_echo_ocr("", &[page0, "p1", "p2", "p3", "p4", "p5"]);
        let acquired = extractor.acquire_text(b"%PDF", &PipelineConfig::default()).unwrap();
        assert!(acquired.stopped_early);
        assert_eq!(*rendered.lock().unwrap(), vec![0]);
        assert_eq!(acquired.sources.last().unwrap().pages, vec![0]);
    }

    #[test]
    fn ocr_follows_page_priority_within_budget() {
        let (extractor, rendered) = with_echo_ocr("", &["p0", "p1", "p2", "p3", "p4", "p5"]);
        let acquired = extractor.acquire_text(b"%PDF", &PipelineConfig::default()).unwrap();
        assert!(!acquired.stopped_early);
        assert_eq!(*rendered.lock().unwrap(), vec![0, 5, 3, 4]);
        assert_eq!(acquired.text, "p0\np5\np3\np4");
    }

    #[test]
    fn unavailable_ocr_keeps_text_layer() {
        let (renderer, _) = MockPdfPageRenderer::new(&["p0"]);
        let extractor = DocumentExtractor::new(Box::new(MockPdfExtractor::with_text("Nama: BUDI")))
            .with_ocr(Box::new(renderer), Box::new(MockOcrEngine::unavailable()));
        let acquired = extractor.acquire_text(b"%PDF", &PipelineConfig::default()).unwrap();
        assert!(acquired.enriched);
        assert_eq!(acquired.text, "Nama: BUDI");
        assert!(acquired.sources.last().unwrap().error.is_some());
    }

    #[test]
    fn without_ocr_short_text_is_returned() {
        let extractor = DocumentExtractor::new(Box::new(MockPdfExtractor::with_text("Nama: BUDI")));
        let acquired = extractor.acquire_text(b"%PDF", &PipelineConfig::default()).unwrap();
        assert!(!acquired.enriched);
        assert_eq!(acquired.text, "Nama: BUDI");
    }
}
