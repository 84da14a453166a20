//! Evidence snippets per semantic field.
//!
//! Every field key gets candidate snippets from three places: lines already
//! confirmed by an extractor, lines hitting the field's keywords (plus the
//! following line for multi-line fields whose value wraps), and a one-line
//! window around each keyword hit. Snippets are scored per field, filtered by
//! the field's minimum, deduplicated and ranked best-first.

use std::collections::{BTreeMap, HashSet};
use std::sync::LazyLock;

use chrono::{NaiveDate, NaiveTime};
use regex::Regex;

use super::amount::{format_rupiah, has_currency_hint, line_amount};
use super::labels::{contains_phrase, RECORD_NUMBER_LABEL};
use super::total::TotalMatch;
use super::types::{ComponentKey, ComponentMap, EvidenceField, FieldKey, FieldStatus};
use crate::pipeline::extraction::sanitize::squash_whitespace;
use crate::pipeline_config::PipelineConfig;

/// Separator between ranked snippets in the flat payload.
pub const PAYLOAD_DELIMITER: &str = " || ";

/// Value synthesized for a settled balance.
pub const PAID_VALUE: &str = "LUNAS";

/// Value synthesized when an e-claim is mentioned without a link.
pub const ECLAIM_WITHOUT_LINK: &str = "E-KLAIM DISEBUTKAN (TANPA TAUTAN)";

const CONFIRMED_BONUS: f32 = 2.0;
const CURRENCY_BONUS: f32 = 1.0;
const SHAPED_AMOUNT_BONUS: f32 = 0.5;
const DATE_BONUS: f32 = 1.5;
const TIME_BONUS: f32 = 1.0;
const CODE_BONUS: f32 = 1.5;
const URL_BONUS: f32 = 3.0;
const MISSING_URL_PENALTY: f32 = 2.0;
const RECORD_NUMBER_PENALTY: f32 = 1.5;
const LENGTH_PENALTY: f32 = 1.0;

static DMY_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(\d{1,2})[/\-.](\d{1,2})[/\-.](\d{4})\b").expect("valid regex")
});

static ISO_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{4})-(\d{2})-(\d{2})\b").expect("valid regex"));

static CLOCK_TIME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{1,2})[:.](\d{2})\b").expect("valid regex"));

/// ICD-10 (`A09`, `J18.9`) and INA-CBG (`K-4-17-I`) codes.
static CLINICAL_CODE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b[A-Z]\d{2}(?:\.\d{1,2})?\b|\b[A-Z]-\d-\d{2}-[IVX0-9]+\b").expect("valid regex")
});

static URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bhttps?://\S+|\bwww\.\S+").expect("valid regex"));

static PAID_WORDING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\bLUNAS\b|\bPAID\b|\bSISA\s*(?:TAGIHAN|BAYAR|PEMBAYARAN)?\s*:?\s*(?:RP\.?\s*)?0(?:[.,]0{1,2})?(?:\s|$)",
    )
    .expect("valid regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SnippetKind {
    Amount,
    Time,
    Code,
    Link,
    Text,
}

struct FieldProfile {
    keywords: Vec<(&'static str, f32)>,
    min_score: f32,
    kind: SnippetKind,
    /// Value may wrap onto the line after a bare label.
    multiline: bool,
}

fn profile(key: FieldKey) -> FieldProfile {
    let (keywords, min_score, kind, multiline): (Vec<(&'static str, f32)>, f32, SnippetKind, bool) =
        match key {
            FieldKey::Component(component) => {
                let mut keywords: Vec<(&'static str, f32)> =
                    component.aliases().iter().map(|a| (*a, 2.0)).collect();
                keywords.push(("JUMLAH", 0.5));
                keywords.push(("SUBTOTAL", 0.5));
                (keywords, 2.0, SnippetKind::Amount, false)
            }
            FieldKey::Total => (
                vec![
                    ("TOTAL TAGIHAN", 3.0),
                    ("TOTAL BILLING", 3.0),
                    ("GRAND TOTAL", 2.5),
                    ("TOTAL BIAYA", 2.0),
                    ("TOTAL", 1.0),
                    ("TAGIHAN", 0.5),
                ],
                2.0,
                SnippetKind::Amount,
                false,
            ),
            FieldKey::TimeIn => (
                vec![
                    ("TGL MASUK", 3.0),
                    ("TGL. MASUK", 3.0),
                    ("TANGGAL MASUK", 3.0),
                    ("JAM MASUK", 3.0),
                    ("WAKTU MASUK", 3.0),
                    ("ADMISSION", 2.5),
                    ("CHECK IN", 2.5),
                    ("MASUK", 1.5),
                ],
                1.5,
                SnippetKind::Time,
                false,
            ),
            FieldKey::TimeOut => (
                vec![
                    ("TGL KELUAR", 3.0),
                    ("TGL. KELUAR", 3.0),
                    ("TANGGAL KELUAR", 3.0),
                    ("JAM KELUAR", 3.0),
                    ("TGL PULANG", 3.0),
                    ("TANGGAL PULANG", 3.0),
                    ("DISCHARGE", 2.5),
                    ("CHECK OUT", 2.5),
                    ("KELUAR", 1.5),
                    ("PULANG", 1.5),
                ],
                1.5,
                SnippetKind::Time,
                false,
            ),
            FieldKey::Coding => (
                vec![
                    ("ICD-10", 3.0),
                    ("ICD 10", 3.0),
                    ("ICD-9", 3.0),
                    ("ICD", 2.0),
                    ("INA-CBG", 3.0),
                    ("INA CBG", 3.0),
                    ("CBG", 2.0),
                    ("KODE DIAGNOSA", 2.5),
                    ("KODE TINDAKAN", 2.5),
                    ("KODE", 1.0),
                ],
                2.0,
                SnippetKind::Code,
                false,
            ),
            FieldKey::Diagnosis => (
                vec![
                    ("DIAGNOSA", 3.0),
                    ("DIAGNOSIS", 3.0),
                    ("DIAGNOSA UTAMA", 1.0),
                    ("DX", 2.0),
                    ("KELUHAN", 1.0),
                ],
                2.0,
                SnippetKind::Text,
                true,
            ),
            FieldKey::Payer => (
                vec![
                    ("PENJAMIN", 3.0),
                    ("CARA BAYAR", 3.0),
                    ("JAMINAN", 2.5),
                    ("ASURANSI", 2.5),
                    ("BPJS", 2.5),
                    ("JKN", 2.0),
                    ("PERUSAHAAN", 1.5),
                    ("UMUM", 1.0),
                    ("TUNAI", 1.0),
                ],
                2.0,
                SnippetKind::Text,
                true,
            ),
            FieldKey::Deposit => (
                vec![("DEPOSIT", 3.0), ("UANG MUKA", 3.0), ("PANJAR", 2.5), ("DP", 1.5)],
                2.0,
                SnippetKind::Amount,
                false,
            ),
            FieldKey::Cashier => (
                vec![
                    ("KASIR", 3.0),
                    ("CASHIER", 3.0),
                    ("PETUGAS", 2.0),
                    ("DITERIMA OLEH", 2.0),
                ],
                2.0,
                SnippetKind::Text,
                true,
            ),
            FieldKey::Balance => (
                vec![
                    ("SISA TAGIHAN", 3.0),
                    ("SISA PEMBAYARAN", 3.0),
                    ("KURANG BAYAR", 3.0),
                    ("SISA", 2.0),
                    ("SALDO", 2.5),
                    ("BALANCE", 2.5),
                    ("KEMBALIAN", 1.5),
                ],
                2.0,
                SnippetKind::Amount,
                false,
            ),
            FieldKey::EClaim => (
                vec![
                    ("E-KLAIM", 3.0),
                    ("EKLAIM", 3.0),
                    ("E KLAIM", 3.0),
                    ("E-CLAIM", 3.0),
                    ("ECLAIM", 3.0),
                    ("KLAIM", 1.5),
                ],
                4.0,
                SnippetKind::Link,
                true,
            ),
        };

    FieldProfile {
        keywords,
        min_score,
        kind,
        multiline,
    }
}

/// A candidate snippet and its field-specific score.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredSnippet {
    pub text: String,
    pub score: f32,
}

/// Per-field payload, status and keyword context.
#[derive(Debug, Clone, Default)]
pub struct EvidencePayload {
    pub payload: BTreeMap<FieldKey, String>,
    pub field_status: BTreeMap<FieldKey, EvidenceField>,
    pub keyword_context: BTreeMap<FieldKey, Vec<String>>,
}

fn keyword_score(upper: &str, profile: &FieldProfile) -> f32 {
    profile
        .keywords
        .iter()
        .filter(|(keyword, _)| contains_phrase(upper, keyword))
        .map(|(_, weight)| weight)
        .sum()
}

fn has_valid_date(text: &str) -> bool {
    let dmy = DMY_DATE.captures_iter(text).any(|c| {
        match (c[1].parse::<u32>(), c[2].parse::<u32>(), c[3].parse::<i32>()) {
            (Ok(day), Ok(month), Ok(year)) => NaiveDate::from_ymd_opt(year, month, day).is_some(),
            _ => false,
        }
    });
    dmy || ISO_DATE.captures_iter(text).any(|c| {
        match (c[1].parse::<i32>(), c[2].parse::<u32>(), c[3].parse::<u32>()) {
            (Ok(year), Ok(month), Ok(day)) => NaiveDate::from_ymd_opt(year, month, day).is_some(),
            _ => false,
        }
    })
}

fn has_valid_time(text: &str) -> bool {
    CLOCK_TIME.captures_iter(text).any(|c| {
        match (c[1].parse::<u32>(), c[2].parse::<u32>()) {
            (Ok(hour), Ok(minute)) => NaiveTime::from_hms_opt(hour, minute, 0).is_some(),
            _ => false,
        }
    })
}

fn score_snippet(text: &str, bonus: f32, profile: &FieldProfile, config: &PipelineConfig) -> f32 {
    let upper = text.to_uppercase();
    let mut score = keyword_score(&upper, profile) + bonus;

    match profile.kind {
        SnippetKind::Amount => {
            if has_currency_hint(text) {
                score += CURRENCY_BONUS;
            }
            if line_amount(text).is_some() {
                score += SHAPED_AMOUNT_BONUS;
            }
        }
        SnippetKind::Time => {
            if has_valid_date(text) {
                score += DATE_BONUS;
            }
            if has_valid_time(text) {
                score += TIME_BONUS;
            }
        }
        SnippetKind::Code => {
            if CLINICAL_CODE.is_match(&upper) {
                score += CODE_BONUS;
            }
        }
        SnippetKind::Link => {
            if URL.is_match(text) {
                score += URL_BONUS;
            } else {
                score -= MISSING_URL_PENALTY;
            }
        }
        SnippetKind::Text => {}
    }

    if RECORD_NUMBER_LABEL.is_match(text) {
        score -= RECORD_NUMBER_PENALTY;
    }
    let chars = text.chars().count();
    if chars > config.snippet_max_chars {
        score -= LENGTH_PENALTY;
    }
    if chars > config.snippet_max_chars * 2 {
        score -= LENGTH_PENALTY;
    }

    score
}

/// Drop snippets below `min_score`, dedupe, order by score (desc) then
/// length (asc), keep at most `max_parts`.
pub fn rank_snippets(
    mut snippets: Vec<ScoredSnippet>,
    min_score: f32,
    max_parts: usize,
) -> Vec<ScoredSnippet> {
    snippets.retain(|s| s.score >= min_score && !s.text.trim().is_empty());
    snippets.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.text.chars().count().cmp(&b.text.chars().count()))
    });

    let mut seen = HashSet::new();
    snippets.retain(|s| seen.insert(squash_whitespace(&s.text).to_uppercase()));
    snippets.truncate(max_parts);
    snippets
}

fn clip(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut clipped: String = text.chars().take(max_chars).collect();
    clipped.push_str("...");
    clipped
}

fn is_label_only(line: &str) -> bool {
    match line.split_once(':') {
        Some((_, value)) => value.trim().is_empty(),
        None => line.split_whitespace().count() <= 3 && !line.chars().any(|c| c.is_ascii_digit()),
    }
}

fn window(lines: &[String], index: usize) -> String {
    let start = index.saturating_sub(1);
    let end = (index + 2).min(lines.len());
    lines[start..end].join(" ")
}

/// Build the evidence payload for every field key.
pub fn build_evidence(
    lines: &[String],
    components: &ComponentMap,
    total: Option<&TotalMatch>,
    config: &PipelineConfig,
) -> EvidencePayload {
    let uppers: Vec<String> = lines.iter().map(|l| l.to_uppercase()).collect();
    let mut out = EvidencePayload::default();

    for key in FieldKey::all() {
        let profile = profile(key);
        let hits: Vec<usize> = uppers
            .iter()
            .enumerate()
            .filter(|(_, upper)| keyword_score(upper, &profile) > 0.0)
            .map(|(i, _)| i)
            .collect();

        let mut candidates: Vec<(String, f32)> = Vec::new();
        match key {
            FieldKey::Component(component) => {
                if let Some(line) = components
                    .get(&component)
                    .filter(|c| c.found)
                    .and_then(|c| c.raw_evidence_line.clone())
                {
                    candidates.push((line, CONFIRMED_BONUS));
                }
            }
            FieldKey::Total => {
                if let Some(total) = total {
                    candidates.push((total.raw.clone(), CONFIRMED_BONUS));
                }
            }
            _ => {}
        }
        for &i in &hits {
            candidates.push((lines[i].clone(), 0.0));
            if profile.multiline && is_label_only(&lines[i]) {
                if let Some(next) = lines.get(i + 1) {
                    candidates.push((format!("{} {next}", lines[i]), 0.0));
                }
            }
            candidates.push((window(lines, i), 0.0));
        }

        let scored = candidates
            .into_iter()
            .map(|(text, bonus)| ScoredSnippet {
                score: score_snippet(&text, bonus, &profile, config),
                text: clip(&text, config.snippet_max_chars),
            })
            .collect();
        let ranked = rank_snippets(scored, profile.min_score, config.evidence_max_parts);

        let field = if ranked.is_empty() {
            synthesize(key, lines, components, total)
        } else {
            EvidenceField {
                value: ranked.first().map(|s| s.text.clone()),
                status: FieldStatus::Found,
                evidence: ranked.iter().map(|s| s.text.clone()).collect(),
            }
        };

        let payload = if field.evidence.is_empty() {
            field.value.clone().unwrap_or_default()
        } else {
            field.evidence.join(PAYLOAD_DELIMITER)
        };

        let mut context: Vec<String> = Vec::new();
        for &i in &hits {
            let snippet = clip(&window(lines, i), config.snippet_max_chars);
            if !context.contains(&snippet) {
                context.push(snippet);
            }
            if context.len() >= config.evidence_max_parts {
                break;
            }
        }

        out.payload.insert(key, payload);
        out.field_status.insert(key, field);
        out.keyword_context.insert(key, context);
    }

    out
}

/// Fallback value when no snippet qualified.
fn synthesize(
    key: FieldKey,
    lines: &[String],
    components: &ComponentMap,
    total: Option<&TotalMatch>,
) -> EvidenceField {
    let inferred = |value: String| EvidenceField {
        value: Some(value),
        status: FieldStatus::Inferred,
        evidence: Vec::new(),
    };

    match key {
        FieldKey::Component(component) => {
            if let Some(amount) = component_amount(components, component) {
                return inferred(format_rupiah(amount));
            }
        }
        FieldKey::Total => {
            if let Some(total) = total {
                return inferred(format_rupiah(total.value));
            }
        }
        FieldKey::Balance => {
            if lines.iter().any(|l| PAID_WORDING.is_match(l)) {
                return inferred(PAID_VALUE.to_string());
            }
        }
        FieldKey::EClaim => {
            let eclaim = profile(FieldKey::EClaim);
            let mentioned = lines.iter().any(|l| {
                let upper = l.to_uppercase();
                eclaim
                    .keywords
                    .iter()
                    .any(|(k, weight)| *weight >= 3.0 && contains_phrase(&upper, k))
            });
            if mentioned && !lines.iter().any(|l| URL.is_match(l)) {
                return inferred(ECLAIM_WITHOUT_LINK.to_string());
            }
        }
        _ => {}
    }

    EvidenceField {
        value: None,
        status: FieldStatus::NotFound,
        evidence: Vec::new(),
    }
}

fn component_amount(components: &ComponentMap, key: ComponentKey) -> Option<i64> {
    components.get(&key).and_then(|c| c.amount)
}
