//! Pipeline configuration read once at process start.
//!
//! Every tuning knob the engine consults lives here. The struct is built once
//! (from the environment, or `Default`) and passed by reference into the
//! acquisition orchestrator and the interpretation stages.

use serde::Serialize;

use crate::config::{lookup_bool, lookup_f32, lookup_string, lookup_usize};

// ═══════════════════════════════════════════════════════════
// Types
// ═══════════════════════════════════════════════════════════

/// Immutable engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineConfig {
    /// Render scale applied to each page before OCR.
    pub ocr_zoom: f32,
    /// Maximum number of pages sent to OCR. 0 means every page.
    pub ocr_max_pages: usize,
    /// Page segmentation mode handed to the OCR engine.
    pub ocr_psm: u32,
    /// Language set tried first (e.g. "ind+eng").
    pub ocr_lang_primary: String,
    /// Language set tried when the primary one fails or returns blank text.
    pub ocr_lang_fallback: String,
    /// Category hits required (with name and total) to stop OCR early.
    pub ocr_early_stop_component_hits: usize,
    /// Always run OCR enrichment, even when the text layer looks sufficient.
    pub always_enrich: bool,
    /// Below this many non-whitespace characters the text is "too short".
    pub min_text_chars: usize,
    /// Bundle raw text is truncated beyond this many characters. 0 disables.
    pub bundle_max_chars: usize,
    /// Evidence snippets are clipped to this many characters.
    pub snippet_max_chars: usize,
    /// Maximum ranked snippets kept per field.
    pub evidence_max_parts: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            ocr_zoom: 1.35,
            ocr_max_pages: 4,
            ocr_psm: 6,
            ocr_lang_primary: "ind+eng".into(),
            ocr_lang_fallback: "eng".into(),
            ocr_early_stop_component_hits: 3,
            always_enrich: false,
            min_text_chars: 40,
            bundle_max_chars: 60_000,
            snippet_max_chars: 240,
            evidence_max_parts: 5,
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Loading
// ═══════════════════════════════════════════════════════════

impl PipelineConfig {
    /// Load from process environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load through an arbitrary key lookup. Missing or invalid values keep
    /// their defaults; values under a lower bound are clamped to it.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let d = Self::default();
        Self {
            ocr_zoom: lookup_f32(&lookup, "OCR_ZOOM", d.ocr_zoom, 0.5),
            ocr_max_pages: lookup_usize(&lookup, "OCR_MAX_PAGES", d.ocr_max_pages, 0),
            ocr_psm: lookup_usize(&lookup, "OCR_PSM", d.ocr_psm as usize, 3) as u32,
            ocr_lang_primary: lookup_string(&lookup, "OCR_LANG_PRIMARY", &d.ocr_lang_primary),
            ocr_lang_fallback: lookup_string(&lookup, "OCR_LANG_FALLBACK", &d.ocr_lang_fallback),
            ocr_early_stop_component_hits: lookup_usize(
                &lookup,
                "OCR_EARLY_STOP_COMPONENT_HITS",
                d.ocr_early_stop_component_hits,
                1,
            ),
            always_enrich: lookup_bool(&lookup, "OCR_ALWAYS_ENRICH", d.always_enrich),
            min_text_chars: lookup_usize(&lookup, "MIN_TEXT_CHARS", d.min_text_chars, 1),
            bundle_max_chars: lookup_usize(&lookup, "BUNDLE_MAX_TEXT_CHARS", d.bundle_max_chars, 0),
            snippet_max_chars: lookup_usize(
                &lookup,
                "EVIDENCE_MAX_SNIPPET_CHARS",
                d.snippet_max_chars,
                40,
            ),
            evidence_max_parts: lookup_usize(&lookup, "EVIDENCE_MAX_PARTS", d.evidence_max_parts, 1),
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn from_pairs(pairs: &[(&str, &str)]) -> PipelineConfig {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        PipelineConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn empty_environment_gives_defaults() {
        assert_eq!(from_pairs(&[]), PipelineConfig::default());
    }

    #[test]
    fn overrides_are_applied() {
        let config = from_pairs(&[
            ("OCR_ZOOM", "2.0"),
            ("OCR_MAX_PAGES", "0"),
            ("OCR_LANG_PRIMARY", "ind"),
            ("OCR_ALWAYS_ENRICH", "true"),
            ("EVIDENCE_MAX_PARTS", "8"),
        ]);
        assert!((config.ocr_zoom - 2.0).abs() < f32::EPSILON);
        assert_eq!(config.ocr_max_pages, 0, "0 means unlimited and must survive");
        assert_eq!(config.ocr_lang_primary, "ind");
        assert!(config.always_enrich);
        assert_eq!(config.evidence_max_parts, 8);
    }

    #[test]
    fn lower_bounds_clamp() {
        let config = from_pairs(&[
            ("OCR_PSM", "1"),
            ("OCR_ZOOM", "0.1"),
            ("EVIDENCE_MAX_SNIPPET_CHARS", "5"),
        ]);
        assert_eq!(config.ocr_psm, 3);
        assert!((config.ocr_zoom - 0.5).abs() < f32::EPSILON);
        assert_eq!(config.snippet_max_chars, 40);
    }

    #[test]
    fn invalid_values_keep_defaults() {
        let config = from_pairs(&[("MIN_TEXT_CHARS", "forty"), ("OCR_ALWAYS_ENRICH", "perhaps")]);
        assert_eq!(config.min_text_chars, 40);
        assert!(!config.always_enrich);
    }

    #[test]
    fn config_serializes() {
        let json = serde_json::to_string(&PipelineConfig::default()).unwrap();
        assert!(json.contains("\"ocr_lang_primary\":\"ind+eng\""));
        assert!(json.contains("\"bundle_max_chars\":60000"));
    }
}
