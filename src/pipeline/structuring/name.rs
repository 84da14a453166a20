//! Patient-name extraction.
//!
//! Labeled patterns are tried most specific first and the first plausible
//! candidate wins. OCR output often bleeds the next label into the name
//! ("BUDI SANTOSO TOL." from "Tgl."), so trailing tokens that look like a
//! broken label are stripped before the plausibility check.

use std::sync::LazyLock;

use regex::Regex;

use super::labels::NAME_LABEL;
use crate::pipeline::extraction::sanitize::{normalized_lines, squash_whitespace};

/// Tokens that end a name: they start the next field.
const STOP_KEYWORDS: &[&str] = &[
    "TGL", "TAGIHAN", "TANGGAL", "JENIS", "KELAMIN", "NO", "REKAM", "MEDIS", "ALAMAT", "UMUR",
    "USIA", "LAHIR", "DOKTER", "PENJAMIN", "RUANG", "KELAS", "NIK", "DIAGNOSA", "RAWAT", "POLI",
    "RM", "TOTAL", "BIAYA", "RINCIAN", "PASIEN",
];

/// Common OCR renderings of a truncated "TGL" / "NO" label.
const TAIL_NOISE_EXACT: &[&str] = &["TOL", "TOI", "TGI", "T6L", "7GL", "N0"];

const TAIL_FUZZY_TARGETS: &[&str] = &["TGL", "TAGIHAN", "NO", "NOMOR", "RM"];
const TAIL_FUZZY_THRESHOLD: f64 = 0.72;
const TAIL_FUZZY_MAX_LEN: usize = 6;

const MAX_CANDIDATE_TOKENS: usize = 8;
const MAX_NAME_TOKENS: usize = 6;
/// A name needs this many tokens with at least two letters each.
const MIN_NAME_WORDS: usize = 2;

/// Substrings (space-padded) that mark institution names.
const INSTITUTION_MARKERS: &[&str] = &[
    "RUMAH SAKIT",
    "RSUD",
    " RS ",
    " RSU ",
    " RSIA ",
    " INSTALASI ",
    " POLIKLINIK ",
    " PELAYANAN ",
    " KLINIK ",
    " HOSPITAL ",
];

/// Generic phrases printed next to a name label that are not a name.
const GENERIC_PHRASES: &[&str] = &[
    "KELUARGA PASIEN",
    "PASIEN",
    "KELUARGA",
    "PENANGGUNG JAWAB",
    "PENANGGUNG JAWAB PASIEN",
    "WALI PASIEN",
    "PASIEN UMUM",
    "PETUGAS",
    "KASIR",
];

static NAME_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?is)\bNO\.?\s*REKAM\s*MEDIS\b.*?\bNAMA(?:\s+PASIEN)?\b\s*[:\-]?\s*",
        r"(?i)\bNAMA\s+PASIEN\b\s*[:\-]?\s*",
        r"(?i)\bNAMA\b\s*[:\-]?\s*",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid regex"))
    .collect()
});

/// Labels that may follow the name on the same line.
static NEXT_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:TGL\.?\s*(?:TAGIHAN|LAHIR|MASUK|KELUAR)|TANGGAL|JENIS\s*KELAMIN|NO\.?\s*TAGIHAN|NO\.?\s*REKAM\s*MEDIS|NO\.?\s*RM|ALAMAT|UMUR|USIA|DOKTER|PENJAMIN|RUANG(?:AN)?|KELAS|NIK|DIAGNOSA|RAWAT|POLI(?:KLINIK)?)\b",
    )
    .expect("valid regex")
});

static HOSPITAL_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:RS(?:U|UD|IA|AB)?\b|RUMAH\s+SAKIT\b)").expect("valid regex")
});

static HOSPITAL_NAME_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bNAMA\s+(?:RS|RUMAH\s+SAKIT)\b").expect("valid regex")
});

/// Extract the primary patient name.
pub fn extract_name(text: &str) -> Option<String> {
    for pattern in NAME_PATTERNS.iter() {
        for m in pattern.find_iter(text) {
            let candidate = candidate_until_next_label(&text[m.end()..]);
            if HOSPITAL_PREFIX.is_match(candidate) {
                continue;
            }
            if let Some(name) = accept(candidate) {
                return Some(name);
            }
        }
    }

    line_scan_name(text)
}

/// Scan lines holding a name label; try the rest of the line, or the next
/// line when the label stands alone.
fn line_scan_name(text: &str) -> Option<String> {
    let lines = normalized_lines(text);

    for (index, line) in lines.iter().enumerate() {
        let Some(label) = NAME_LABEL.find(line) else {
            continue;
        };
        if HOSPITAL_NAME_LABEL.is_match(line) {
            continue;
        }

        let after_label = candidate_until_next_label(&line[label.end()..]);
        let mut candidates = vec![after_label];
        if after_label.trim_matches(is_edge_punctuation).is_empty() {
            if let Some(next) = lines.get(index + 1) {
                candidates.push(candidate_until_next_label(next));
            }
        }

        if let Some(name) = candidates.into_iter().find_map(accept) {
            return Some(name);
        }
    }

    None
}

fn accept(candidate: &str) -> Option<String> {
    clean_name_candidate(candidate).filter(|name| is_plausible_name(name))
}

/// Candidate text from here to the next known label or end of line.
fn candidate_until_next_label(rest: &str) -> &str {
    let line_end = rest.find('\n').unwrap_or(rest.len());
    let line = &rest[..line_end];
    match NEXT_LABEL.find(line) {
        Some(m) => &line[..m.start()],
        None => line,
    }
}

fn is_edge_punctuation(c: char) -> bool {
    c.is_whitespace() || matches!(c, ':' | ';' | ',' | '.' | '|' | '-')
}

/// Tokenize, alpha-filter, stop at the next field, strip label noise.
pub fn clean_name_candidate(candidate: &str) -> Option<String> {
    let compact = squash_whitespace(candidate.trim_matches(is_edge_punctuation));
    if compact.is_empty() {
        return None;
    }

    let mut tokens: Vec<String> = Vec::new();
    for token in compact.split(' ') {
        let cleaned: String = token
            .chars()
            .filter(|c| c.is_ascii_alphabetic() || matches!(c, '\'' | '.' | '-'))
            .collect();
        if cleaned.is_empty() {
            if tokens.is_empty() {
                continue;
            }
            break;
        }

        let upper = cleaned.to_uppercase();
        if STOP_KEYWORDS.contains(&upper.as_str()) {
            break;
        }
        tokens.push(upper);
        if tokens.len() >= MAX_CANDIDATE_TOKENS {
            break;
        }
    }

    while tokens.last().is_some_and(|t| is_tail_noise(t)) {
        tokens.pop();
    }
    if tokens.is_empty() {
        return None;
    }
    Some(tokens.join(" "))
}

fn is_tail_noise(token: &str) -> bool {
    let normalized: String = token
        .chars()
        .filter(|c| c.is_ascii_alphabetic())
        .map(|c| c.to_ascii_uppercase())
        .collect();
    if normalized.is_empty() {
        return true;
    }
    if STOP_KEYWORDS.contains(&normalized.as_str())
        || TAIL_NOISE_EXACT.contains(&normalized.as_str())
    {
        return true;
    }

    normalized.len() <= TAIL_FUZZY_MAX_LEN
        && TAIL_FUZZY_TARGETS
            .iter()
            .any(|target| strsim::normalized_levenshtein(&normalized, target) >= TAIL_FUZZY_THRESHOLD)
}

/// Reject digits, institution names, generic phrases and implausible shapes.
pub fn is_plausible_name(name: &str) -> bool {
    let squashed = squash_whitespace(&name.to_uppercase());
    if squashed.is_empty() {
        return false;
    }
    if squashed.chars().any(|c| c.is_ascii_digit()) {
        return false;
    }

    let padded = format!(" {squashed} ");
    if INSTITUTION_MARKERS.iter().any(|m| padded.contains(m)) {
        return false;
    }
    if GENERIC_PHRASES.contains(&squashed.as_str()) {
        return false;
    }

    let tokens: Vec<&str> = squashed.split(' ').collect();
    if tokens.len() > MAX_NAME_TOKENS {
        return false;
    }
    let words = tokens
        .iter()
        .filter(|t| t.chars().filter(|c| c.is_ascii_alphabetic()).count() >= 2)
        .count();
    words >= MIN_NAME_WORDS
}
