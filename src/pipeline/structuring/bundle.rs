use super::evidence::EvidencePayload;
use super::types::{BillingBundle, BundleSummary};

/// Schema identifier consumers key on.
pub const BUNDLE_SCHEMA_VERSION: &str = "billing-bundle/v1";

/// Appended after truncated raw text.
pub const TRUNCATION_MARKER: &str = "\n[...TEKS DIPOTONG...]";

/// Truncate to `max_chars` characters (0 = unlimited). Returns the text,
/// whether it was cut, and the original character count.
pub fn truncate_raw_text(text: &str, max_chars: usize) -> (String, bool, usize) {
    let chars = text.chars().count();
    if max_chars == 0 || chars <= max_chars {
        return (text.to_string(), false, chars);
    }
    let mut cut: String = text.chars().take(max_chars).collect();
    cut.push_str(TRUNCATION_MARKER);
    (cut, true, chars)
}

/// Assemble the review bundle from the working text and the extracted fields.
pub fn assemble_bundle(
    text: &str,
    max_chars: usize,
    summary: BundleSummary,
    evidence: &EvidencePayload,
) -> BillingBundle {
    let (raw_text, raw_text_truncated, raw_text_chars) = truncate_raw_text(text, max_chars);
    BillingBundle {
        schema_version: BUNDLE_SCHEMA_VERSION.to_string(),
        raw_text,
        raw_text_truncated,
        raw_text_chars,
        summary,
        field_raw: evidence.payload.clone(),
        field_status: evidence.field_status.clone(),
        keyword_context: evidence.keyword_context.clone(),
    }
}
