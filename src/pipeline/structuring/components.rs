//! Cost-category extraction.
//!
//! One pass over the lines tracks the active section, collects subtotal
//! (`Jumlah` / `Subtotal`) amounts and item-level amounts per category, then
//! reconciles them with the category's strategy. A keyword rescue pass runs
//! afterwards for categories that produced no signal at all.

use std::collections::{BTreeMap, HashMap};
use std::sync::LazyLock;

use regex::Regex;

use super::amount::{line_amount, AmountToken};
use super::labels::{
    canonical_alpha, contains_phrase, BILL_NUMBER_LABEL, RECORD_NUMBER_LABEL, SUMMARY_MARKER,
};
use super::total::has_total_phrase;
use super::types::{AmountSource, ComponentKey, ComponentMap, ComponentRecord, ReconcileStrategy};

/// A named subtotal outside its section is attributed only when a plain
/// header for the category appeared this many lines earlier or less.
pub const SUMMARY_HEADER_WINDOW: usize = 25;

/// Lower bound of the per-document amount ceiling.
pub const MIN_CEILING: i64 = 2_000_000;

/// Ceiling used when no total was found.
pub const FALLBACK_CEILING: i64 = 250_000_000;

/// Hybrid categories take the item sum only up to this multiple of the
/// subtotal sum.
const HYBRID_MAX_RATIO: i64 = 3;

static DRUG_NOISE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b\d+(?:[.,]\d+)?\s*(?:MG|MCG|ML|GR|G|IU|UI|%)(?:\b|$)|\b(?:TAB|TABLET|KAPSUL|KAPS|CAPS|AMP|AMPUL|VIAL|INJ|SYR|SYRUP|SIRUP|DROP|DROPS|FLS|BTL|BOTOL|SUPP)\b",
    )
    .expect("valid regex")
});

/// Keyword rules for categories that are often printed only as loose rows.
struct RescueRule {
    key: ComponentKey,
    keywords: &'static [&'static str],
    excludes: &'static [&'static str],
}

const RESCUE_RULES: &[RescueRule] = &[
    RescueRule {
        key: ComponentKey::Tindakan,
        keywords: &[
            "INJEKSI",
            "INJECTION",
            "PASANG INFUS",
            "PEMASANGAN INFUS",
            "IV LINE",
            "NEBULISASI",
            "NEBULIZER",
            "HECTING",
            "JAHIT LUKA",
            "RAWAT LUKA",
            "PASANG KATETER",
            "PASANG NGT",
        ],
        excludes: &[],
    },
    RescueRule {
        key: ComponentKey::Bmhp,
        keywords: &[
            "SPUIT",
            "KASA",
            "HANDSCOEN",
            "HANDSCOON",
            "SARUNG TANGAN",
            "ABOCATH",
            "IV CATH",
            "INFUSION SET",
            "INFUS SET",
            "UNDERPAD",
            "PLESTER",
            "MASKER",
            "URINE BAG",
            "KATETER",
            "NASAL KANUL",
        ],
        excludes: &["PASANG", "PEMASANGAN", "JASA"],
    },
    RescueRule {
        key: ComponentKey::SewaAlat,
        keywords: &["OKSIGEN", "SYRINGE PUMP", "INFUSION PUMP", "MONITOR", "VENTILATOR", "CPAP"],
        excludes: &[],
    },
];

/// Ceiling for any single or resolved component amount.
pub fn amount_ceiling(total: Option<i64>) -> i64 {
    match total {
        Some(total) if total > 0 => MIN_CEILING.max(total.saturating_mul(3) / 2),
        _ => FALLBACK_CEILING,
    }
}

/// Category named on an upper-cased line, most specific category first.
pub fn classify_line(upper: &str) -> Option<ComponentKey> {
    ComponentKey::MATCH_PRIORITY
        .iter()
        .copied()
        .find(|key| key.aliases().iter().any(|alias| contains_phrase(upper, alias)))
}

fn is_summary_line(line: &str) -> bool {
    SUMMARY_MARKER.is_match(line)
}

#[derive(Debug, Clone)]
struct Candidate {
    amount: i64,
    line: String,
}

#[derive(Debug, Default)]
struct Signals {
    found: bool,
    first_line: Option<String>,
    summaries: Vec<Candidate>,
    items: Vec<Candidate>,
    /// Named subtotal rows seen outside their section (recap tables).
    recap: Vec<Candidate>,
}

fn push_unique(list: &mut Vec<Candidate>, amount: i64, line: &str) {
    let key = canonical_alpha(line);
    if list
        .iter()
        .any(|c| c.amount == amount && canonical_alpha(&c.line) == key)
    {
        return;
    }
    list.push(Candidate {
        amount,
        line: line.to_string(),
    });
}

/// Numbers on a record-number or bill-number line are identifiers.
fn carries_identifier(line: &str) -> bool {
    RECORD_NUMBER_LABEL.is_match(line) || BILL_NUMBER_LABEL.is_match(line)
}

fn within_ceiling(token: &AmountToken, ceiling: i64) -> bool {
    token.value > 0 && token.value <= ceiling
}

/// Extract every category from the given lines. `total` bounds amounts.
pub fn extract_components(lines: &[String], total: Option<i64>) -> ComponentMap {
    let ceiling = amount_ceiling(total);
    let uppers: Vec<String> = lines.iter().map(|l| l.to_uppercase()).collect();
    let named: Vec<Option<ComponentKey>> = uppers.iter().map(|u| classify_line(u)).collect();

    let mut signals: HashMap<ComponentKey, Signals> = HashMap::new();
    let mut current: Option<ComponentKey> = None;
    let mut last_header: HashMap<ComponentKey, usize> = HashMap::new();

    for (index, line) in lines.iter().enumerate() {
        if has_total_phrase(line) {
            continue;
        }

        if is_summary_line(line) {
            let target = match named[index] {
                Some(key)
                    if current == Some(key)
                        || last_header
                            .get(&key)
                            .is_some_and(|&h| index - h <= SUMMARY_HEADER_WINDOW) =>
                {
                    Some(key)
                }
                Some(key) => {
                    if let Some(token) = line_amount(line)
                        .filter(|t| t.is_currency_bearing() && within_ceiling(t, ceiling))
                    {
                        let entry = signals.entry(key).or_default();
                        push_unique(&mut entry.recap, token.value, line);
                    }
                    None
                }
                None => current,
            };

            if let Some(key) = target {
                if let Some(token) = line_amount(line)
                    .filter(|t| t.is_currency_bearing() && within_ceiling(t, ceiling))
                {
                    let entry = signals.entry(key).or_default();
                    entry.found = true;
                    push_unique(&mut entry.summaries, token.value, line);
                }
                current = Some(key);
            }
            continue;
        }

        let Some(key) = named[index] else {
            continue;
        };
        current = Some(key);
        last_header.insert(key, index);

        let entry = signals.entry(key).or_default();
        entry.found = true;
        if entry.first_line.is_none() {
            entry.first_line = Some(line.clone());
        }

        let same_line = if carries_identifier(line) {
            None
        } else {
            line_amount(line).map(|t| (t, line.clone()))
        };
        let item = same_line.or_else(|| {
            let next = lines.get(index + 1)?;
            if named[index + 1].is_some()
                || is_summary_line(next)
                || has_total_phrase(next)
                || carries_identifier(next)
            {
                return None;
            }
            line_amount(next).map(|t| (t, format!("{line} {next}")))
        });
        if let Some((token, raw)) = item.filter(|(t, _)| within_ceiling(t, ceiling)) {
            push_unique(&mut entry.items, token.value, &raw);
        }
    }

    let mut components: ComponentMap = BTreeMap::new();
    for key in ComponentKey::ALL {
        let record = match signals.remove(&key) {
            Some(sig) => resolve(key, sig, ceiling),
            None => ComponentRecord::not_found(key),
        };
        components.insert(key, record);
    }

    rescue_unsignalled(lines, &uppers, &mut components, ceiling);
    components
}

fn sum(list: &[Candidate]) -> i64 {
    list.iter().map(|c| c.amount).sum()
}

fn largest(list: &[Candidate]) -> Option<&Candidate> {
    list.iter().max_by_key(|c| c.amount)
}

/// Pick the amount for one category. The result never exceeds `ceiling`:
/// an oversized sum falls back to the largest single candidate.
fn resolve(key: ComponentKey, sig: Signals, ceiling: i64) -> ComponentRecord {
    let summary_sum = sum(&sig.summaries);
    let item_sum = sum(&sig.items);

    let chosen: Option<(i64, AmountSource, &[Candidate])> = match key.strategy() {
        ReconcileStrategy::SumSummary if !sig.summaries.is_empty() => {
            Some((summary_sum, AmountSource::Summary, &sig.summaries[..]))
        }
        ReconcileStrategy::MaxSummary if !sig.summaries.is_empty() => largest(&sig.summaries)
            .map(|c| (c.amount, AmountSource::Summary, &sig.summaries[..])),
        ReconcileStrategy::Hybrid if !sig.summaries.is_empty() => {
            if item_sum > summary_sum && item_sum <= summary_sum.saturating_mul(HYBRID_MAX_RATIO) {
                Some((item_sum, AmountSource::Items, &sig.items[..]))
            } else {
                Some((summary_sum, AmountSource::Summary, &sig.summaries[..]))
            }
        }
        ReconcileStrategy::MaxSummary if !sig.items.is_empty() => {
            largest(&sig.items).map(|c| (c.amount, AmountSource::Items, &sig.items[..]))
        }
        _ if !sig.items.is_empty() => Some((item_sum, AmountSource::Items, &sig.items[..])),
        _ => largest(&sig.recap).map(|c| (c.amount, AmountSource::Summary, &sig.recap[..])),
    };

    let Some((mut amount, source, pool)) = chosen else {
        return ComponentRecord {
            label: key.label().to_string(),
            found: sig.found || !sig.recap.is_empty(),
            raw_evidence_line: sig.first_line,
            amount: None,
            source: None,
        };
    };

    if amount > ceiling {
        amount = largest(pool).map_or(0, |c| c.amount);
    }

    let evidence = match source {
        AmountSource::Summary => pool.last().map(|c| c.line.clone()),
        _ => largest(pool).map(|c| c.line.clone()),
    };

    ComponentRecord {
        label: key.label().to_string(),
        found: true,
        raw_evidence_line: evidence.or(sig.first_line),
        amount: (amount > 0).then_some(amount),
        source: (amount > 0).then_some(source),
    }
}

/// Keyword fallback for categories with no section, subtotal or item hit.
fn rescue_unsignalled(
    lines: &[String],
    uppers: &[String],
    components: &mut ComponentMap,
    ceiling: i64,
) {
    for rule in RESCUE_RULES {
        if components.get(&rule.key).is_some_and(|c| c.found) {
            continue;
        }

        let mut hits: Vec<Candidate> = Vec::new();
        for (line, upper) in lines.iter().zip(uppers) {
            if is_summary_line(line)
                || has_total_phrase(line)
                || carries_identifier(line)
                || DRUG_NOISE.is_match(line)
            {
                continue;
            }
            if !rule.keywords.iter().any(|k| contains_phrase(upper, k))
                || rule.excludes.iter().any(|k| contains_phrase(upper, k))
            {
                continue;
            }
            if let Some(token) = line_amount(line)
                .filter(|t| t.is_currency_bearing() && within_ceiling(t, ceiling))
            {
                push_unique(&mut hits, token.value, line);
            }
        }

        let Some(best) = largest(&hits) else {
            continue;
        };
        let mut amount = sum(&hits);
        if amount > ceiling {
            amount = best.amount;
        }

        tracing::debug!(category = rule.key.as_str(), rows = hits.len(), amount, "rescued category");
        components.insert(
            rule.key,
            ComponentRecord {
                label: rule.key.label().to_string(),
                found: true,
                raw_evidence_line: Some(best.line.clone()),
                amount: Some(amount),
                source: Some(AmountSource::Rescue),
            },
        );
    }
}

/// Lines carrying a subtotal marker.
pub fn count_summary_markers(lines: &[String]) -> usize {
    lines.iter().filter(|l| is_summary_line(l)).count()
}

/// Distinct categories named anywhere in `text`. Cheap: no amounts parsed.
pub fn count_alias_categories(text: &str) -> usize {
    let mut seen: Vec<ComponentKey> = Vec::new();
    for line in text.lines() {
        if let Some(key) = classify_line(&line.to_uppercase()) {
            if !seen.contains(&key) {
                seen.push(key);
            }
        }
    }
    seen.len()
}

/// Categories marked found.
pub fn found_count(components: &ComponentMap) -> usize {
    components.values().filter(|c| c.found).count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::extraction::sanitize::normalized_lines;

    fn extract(text: &str, total: Option<i64>) -> ComponentMap {
        extract_components(&normalized_lines(text), total)
    }

    #[test]
    fn every_category_present_in_output() {
        let components = extract("", None);
        assert_eq!(components.len(), ComponentKey::ALL.len());
        assert!(components.values().all(|c| !c.found && c.amount.is_none()));
    }

    #[test]
    fn section_subtotal_recorded() {
        let text = "LABORATORIUM\nHematologi lengkap Rp 85.000\nKimia darah Rp 60.000\nJumlah Rp 145.000";
        let lab = &extract(text, None)[&ComponentKey::Laboratorium];
        assert_eq!(lab.amount, Some(145_000));
        assert_eq!(lab.source, Some(AmountSource::Summary));
        assert_eq!(lab.raw_evidence_line.as_deref(), Some("Jumlah Rp 145.000"));
    }

    #[test]
    fn named_subtotal_within_header_window() {
        let mut lines = vec!["Laboratorium".to_string()];
        for i in 0..10 {
            lines.push(format!("Paracetamol 500 tab {i}"));
        }
        lines.insert(3, "OBAT-OBATAN".to_string());
        lines.push("Laboratorium Jumlah Rp. 150.000".to_string());

        let components = extract_components(&lines, None);
        let lab = &components[&ComponentKey::Laboratorium];
        assert_eq!(lab.amount, Some(150_000), "subtotal attributed to laboratorium");
        assert_eq!(lab.source, Some(AmountSource::Summary));
        assert_eq!(components[&ComponentKey::Obat].amount, None);
    }

    #[test]
    fn named_subtotal_outside_window_is_recap_only() {
        let mut lines = vec!["Laboratorium".to_string(), "OBAT".to_string()];
        for i in 0..30 {
            lines.push(format!("baris {i}"));
        }
        lines.push("Jumlah Obat Rp 40.000".to_string());
        lines.push("Jumlah Laboratorium Rp 150.000".to_string());

        let components = extract_components(&lines, None);
        assert_eq!(components[&ComponentKey::Obat].amount, Some(40_000));
        let lab = &components[&ComponentKey::Laboratorium];
        assert_eq!(lab.amount, Some(150_000), "recap used when nothing else");
    }

    #[test]
    fn sum_summary_adds_subsections() {
        let text = "Radiologi\nThorax AP Rp 150.000\nJumlah Rp 150.000\nRadiologi\nCT Scan Rp 900.000\nJumlah Rp 900.000";
        let radiologi = &extract(text, None)[&ComponentKey::Radiologi];
        assert_eq!(radiologi.amount, Some(1_050_000));
    }

    #[test]
    fn max_summary_takes_largest() {
        let text = "Ruangan\nKelas 1 3 hari\nJumlah Rp 900.000\nJumlah Rp 300.000";
        let room = &extract(text, None)[&ComponentKey::Ruangan];
        assert_eq!(room.amount, Some(900_000));
    }

    #[test]
    fn hybrid_prefers_larger_item_sum_within_ratio() {
        let text = "Obat oral Rp 50.000\nObat infus Rp 70.000\nJumlah Rp 100.000";
        let obat = &extract(text, None)[&ComponentKey::Obat];
        assert_eq!(obat.amount, Some(120_000));
        assert_eq!(obat.source, Some(AmountSource::Items));
    }

    #[test]
    fn hybrid_keeps_subtotal_when_items_diverge() {
        let text = "Obat oral Rp 500.000\nObat infus Rp 700.000\nJumlah Rp 100.000";
        let obat = &extract(text, None)[&ComponentKey::Obat];
        assert_eq!(obat.amount, Some(100_000));
        assert_eq!(obat.source, Some(AmountSource::Summary));
    }

    #[test]
    fn duplicated_rows_counted_once() {
        let text = "Obat oral Rp 50.000\nObat oral Rp 50.000\nObat oral Rp 50.000";
        let obat = &extract(text, None)[&ComponentKey::Obat];
        assert_eq!(obat.amount, Some(50_000));
    }

    #[test]
    fn item_amount_from_next_line() {
        let text = "Administrasi\nRp 25.000\nFarmasi\nRp 10.000";
        let components = extract(text, None);
        assert_eq!(components[&ComponentKey::Administrasi].amount, Some(25_000));
        assert_eq!(
            components[&ComponentKey::Administrasi].raw_evidence_line.as_deref(),
            Some("Administrasi Rp 25.000")
        );
        assert_eq!(components[&ComponentKey::Obat].amount, Some(10_000));
    }

    #[test]
    fn next_line_header_not_borrowed() {
        let text = "Administrasi\nLaboratorium Rp 40.000";
        let components = extract(text, None);
        assert!(components[&ComponentKey::Administrasi].found);
        assert_eq!(components[&ComponentKey::Administrasi].amount, None);
        assert_eq!(components[&ComponentKey::Laboratorium].amount, Some(40_000));
    }

    #[test]
    fn amounts_never_exceed_ceiling() {
        let total = Some(1_000_000);
        let ceiling = amount_ceiling(total);
        assert_eq!(ceiling, 2_000_000);

        let text = "Obat A Rp 1.500.000\nObat B Rp 1.200.000\nLaboratorium Rp 95.000.000\n\
                    Radiologi\nJumlah Rp 1.800.000\nRadiologi\nJumlah Rp 1.900.000";
        let components = extract(text, total);
        for (key, record) in &components {
            if let Some(amount) = record.amount {
                assert!(amount <= ceiling, "{} = {amount} exceeds {ceiling}", key.as_str());
            }
        }
        assert_eq!(components[&ComponentKey::Obat].amount, Some(1_500_000));
        assert_eq!(components[&ComponentKey::Laboratorium].amount, None);
        assert!(components[&ComponentKey::Laboratorium].found);
        assert_eq!(components[&ComponentKey::Radiologi].amount, Some(1_900_000));
    }

    #[test]
    fn ceiling_scales_with_total() {
        assert_eq!(amount_ceiling(None), FALLBACK_CEILING);
        assert_eq!(amount_ceiling(Some(10_000_000)), 15_000_000);
        assert_eq!(amount_ceiling(Some(100_000)), MIN_CEILING);
    }

    #[test]
    fn specific_category_wins_classification() {
        assert_eq!(classify_line("KAMAR OPERASI"), Some(ComponentKey::KamarOperasi));
        assert_eq!(classify_line("SEWA ALKES"), Some(ComponentKey::SewaAlat));
        assert_eq!(classify_line("KAMAR MELATI"), Some(ComponentKey::Ruangan));
        assert_eq!(classify_line("TINDAKAN KEPERAWATAN"), Some(ComponentKey::AsuhanKeperawatan));
        assert_eq!(classify_line("NAMA PASIEN"), None);
    }

    #[test]
    fn rescue_recovers_loose_rows() {
        let text = "Injeksi IV Rp 25.000\nPasang infus Rp 40.000\nSpuit 3 cc Rp 5.000\nKasa steril Rp 7.500\n\
                    Ceftriaxone 1 gr vial Rp 150.000";
        let components = extract(text, None);
        let tindakan = &components[&ComponentKey::Tindakan];
        assert_eq!(tindakan.amount, Some(65_000));
        assert_eq!(tindakan.source, Some(AmountSource::Rescue));
        assert_eq!(components[&ComponentKey::Bmhp].amount, Some(12_500));
    }

    #[test]
    fn rescue_skips_drug_noise_and_signalled_categories() {
        let text = "Injeksi Ceftriaxone 1 gr Rp 150.000";
        assert_eq!(extract(text, None)[&ComponentKey::Tindakan].amount, None);

        let text = "Tindakan\nJumlah Rp 80.000\nInjeksi IV Rp 25.000";
        let tindakan = &extract(text, None)[&ComponentKey::Tindakan];
        assert_eq!(tindakan.amount, Some(80_000));
        assert_eq!(tindakan.source, Some(AmountSource::Summary));
    }

    #[test]
    fn alias_category_count_is_distinct() {
        assert_eq!(count_alias_categories("Obat\nObat\nLaboratorium\nNama"), 2);
    }

    #[test]
    fn identifier_numbers_are_not_item_amounts() {
        let text = "Kamar Melati No. RM 123456\nObat\nNo. Tagihan 20240301";
        let components = extract(text, None);
        let ruangan = &components[&ComponentKey::Ruangan];
        assert!(ruangan.found);
        assert_eq!(ruangan.amount, None);
        assert_eq!(components[&ComponentKey::Obat].amount, None);

        let text = "Kamar Melati No. RM 123456\nRp 450.000";
        assert_eq!(extract(text, None)[&ComponentKey::Ruangan].amount, Some(450_000));
    }

    #[test]
    fn total_line_is_not_a_component() {
        let text = "Total Tagihan Rawat Inap Rp 5.000.000";
        assert!(!extract(text, None)[&ComponentKey::Ruangan].found);
    }
}
