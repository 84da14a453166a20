//! Label vocabulary shared by the extractors and the acquisition orchestrator.

use std::sync::LazyLock;

use regex::Regex;

/// Patient-name label.
pub static NAME_LABEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bNAMA(?:\s+PASIEN)?\b").expect("valid regex"));

/// Total-billing label.
pub static TOTAL_LABEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bTOTAL\s*(?:TAGIHAN|BILLING)\b").expect("valid regex"));

/// Header that opens one billing episode (bill-detail header).
pub static EPISODE_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\bRINCIAN\s+BIAYA\s+(?:PELAYANAN\s+)?PASIEN\b|\bRINCIAN\s+TAGIHAN\s+PASIEN\b|\bBILLING\s+DETAIL\s+HEADER\b",
    )
    .expect("valid regex")
});

/// Medical-record-number label.
pub static RECORD_NUMBER_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bNO\.?\s*(?:REKAM\s*MEDIS|RM|MR)\b").expect("valid regex")
});

/// Bill-number label. Numbers after it are identifiers, never amounts.
pub static BILL_NUMBER_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:NO(?:MOR)?\.?\s*(?:TAGIHAN|BILLING|BILL|NOTA|KWITANSI|INVOICE)|BILL\s*(?:NO|NUMBER))\b",
    )
    .expect("valid regex")
});

/// Subtotal marker printed under a section.
pub static SUMMARY_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?:JUMLAH|SUB\s*TOTAL)\b").expect("valid regex"));

/// How many of the four critical markers (name label, total label,
/// bill-detail header, record-number label) the text contains.
pub fn critical_marker_count(text: &str) -> usize {
    [&NAME_LABEL, &TOTAL_LABEL, &EPISODE_HEADER, &RECORD_NUMBER_LABEL]
        .iter()
        .filter(|re| re.is_match(text))
        .count()
}

/// Word-boundary phrase match on an upper-cased line.
///
/// A trailing `*` in `phrase` turns the right boundary off, so `LABORAT*`
/// matches `LABORATORIUM` while `LAB` does not match `LABEL`.
pub fn contains_phrase(upper: &str, phrase: &str) -> bool {
    let (needle, prefix) = match phrase.strip_suffix('*') {
        Some(stem) => (stem, true),
        None => (phrase, false),
    };
    if needle.is_empty() {
        return false;
    }

    let bytes = upper.as_bytes();
    let mut from = 0;
    while let Some(offset) = upper[from..].find(needle) {
        let start = from + offset;
        let end = start + needle.len();
        let left_ok = start == 0 || !bytes[start - 1].is_ascii_alphanumeric();
        let right_ok = prefix || end == bytes.len() || !bytes[end].is_ascii_alphanumeric();
        if left_ok && right_ok {
            return true;
        }
        from = start + 1;
        while from < upper.len() && !upper.is_char_boundary(from) {
            from += 1;
        }
        if from >= upper.len() {
            break;
        }
    }
    false
}

/// Alphabetic-only, upper-cased form of a line, used as a dedup key.
pub fn canonical_alpha(line: &str) -> String {
    line.chars()
        .filter(|c| c.is_alphabetic())
        .flat_map(|c| c.to_uppercase())
        .collect()
}
