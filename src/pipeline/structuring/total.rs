//! Total-billing extraction.
//!
//! Later restatements win: a corrected total printed near the end of the
//! document overrides an earlier one.

use std::sync::LazyLock;

use regex::Regex;

use super::amount::{amount_pattern, amount_tokens, has_currency_hint, parse_amount};
use super::labels::BILL_NUMBER_LABEL;
use crate::pipeline::extraction::sanitize::squash_whitespace;

/// Largest plausible total, in rupiah.
pub const MAX_TOTAL: i64 = 999_999_999;

/// Bare numbers with this many digits or more are identifiers unless they
/// carry a currency marker or grouping.
const BARE_DIGIT_LIMIT: usize = 9;

static TOTAL_PHRASE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)\bTOTAL\s*(?:TAGIHAN|BILLING)\b[\s:.\-]*(R\s?P\.?|RUPIAH|IDR)?[\s:.\-]*({})",
        amount_pattern()
    ))
    .expect("valid regex")
});

static WARD_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)[\[(]\s*(?:KELAS|KLS|VIP|VVIP|ICU|ICCU|NICU|PICU|HCU|BANGSAL|ISOLASI)\b[^\])\n]*[\])]",
    )
    .expect("valid regex")
});

static TOTAL_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bTOTAL\b").expect("valid regex"));

static BILLING_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?:TAGIHAN|BILLING)\b").expect("valid regex"));

/// The selected total phrase and its value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TotalMatch {
    pub raw: String,
    pub value: i64,
}

/// True when the text contains a total-billing phrase at all.
pub fn has_total_phrase(text: &str) -> bool {
    TOTAL_WORD.is_match(text) && BILLING_WORD.is_match(text)
}

/// Extract the total billed amount. Last valid labeled match wins; the line
/// scan only runs when no labeled match validates.
pub fn extract_total(text: &str) -> Option<TotalMatch> {
    let labeled = labeled_total(text);
    if labeled.is_some() {
        return labeled;
    }
    line_scan_total(text)
}

fn labeled_total(text: &str) -> Option<TotalMatch> {
    let mut selected = None;

    for caps in TOTAL_PHRASE.captures_iter(text) {
        let (Some(whole), Some(amount)) = (caps.get(0), caps.get(2)) else {
            continue;
        };
        if text[amount.end()..].starts_with(|c: char| c.is_ascii_digit()) {
            continue;
        }
        let Some(value) = parse_amount(amount.as_str()) else {
            continue;
        };

        let context = surrounding_lines(text, whole.start(), whole.end());
        let has_currency = caps.get(1).is_some() || has_currency_hint(context);
        if !is_plausible_total(value, amount.as_str(), has_currency, context) {
            tracing::debug!(value, "rejected total candidate");
            continue;
        }

        selected = Some(TotalMatch {
            raw: squash_whitespace(whole.as_str()),
            value,
        });
    }

    selected
}

fn line_scan_total(text: &str) -> Option<TotalMatch> {
    let lines: Vec<String> = text
        .lines()
        .map(squash_whitespace)
        .filter(|l| !l.is_empty())
        .collect();
    let mut selected = None;

    for (index, line) in lines.iter().enumerate() {
        if !has_total_phrase(line) {
            continue;
        }

        let mut raw = line.clone();
        let mut tokens: Vec<_> = amount_tokens(line)
            .into_iter()
            .filter(|t| t.is_amount_shaped())
            .collect();
        if tokens.is_empty() {
            if let Some(next) = lines.get(index + 1) {
                tokens = amount_tokens(next)
                    .into_iter()
                    .filter(|t| t.is_amount_shaped())
                    .collect();
                raw = format!("{line} {next}");
            }
        }

        for token in tokens {
            let has_currency = token.has_currency || has_currency_hint(&raw);
            if is_plausible_total(token.value, &token.raw, has_currency, &raw) {
                selected = Some(TotalMatch {
                    raw: raw.clone(),
                    value: token.value,
                });
            }
        }
    }

    selected
}

/// Range check, identifier-context rejection and the shape rule.
fn is_plausible_total(value: i64, raw_amount: &str, has_currency: bool, context: &str) -> bool {
    if value <= 0 || value > MAX_TOTAL {
        return false;
    }
    if BILL_NUMBER_LABEL.is_match(context) || WARD_TAG.is_match(context) {
        return false;
    }

    let has_separator = raw_amount.trim().contains(['.', ',', ' ']);
    let digits = raw_amount.chars().filter(|c| c.is_ascii_digit()).count();
    has_currency || has_separator || digits < BARE_DIGIT_LIMIT
}

/// Full lines spanned by `start..end`.
fn surrounding_lines(text: &str, start: usize, end: usize) -> &str {
    let line_start = text[..start].rfind('\n').map_or(0, |i| i + 1);
    let line_end = text[end..].find('\n').map_or(text.len(), |i| end + i);
    &text[line_start..line_end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labeled_total_with_currency() {
        let total = extract_total("Nama: BUDI\nTotal Tagihan: Rp 1.500.000\n").unwrap();
        assert_eq!(total.value, 1_500_000);
        assert!(total.raw.contains("Total Tagihan"));
        assert!(total.raw.contains("1.500.000"));
    }

    #[test]
    fn later_restatement_wins() {
        let text = "TOTAL TAGIHAN Rp 1.000.000\nkoreksi\nTOTAL TAGIHAN Rp 1.250.000";
        assert_eq!(extract_total(text).unwrap().value, 1_250_000);
    }

    #[test]
    fn total_billing_and_rupiah_marker() {
        let total = extract_total("Total Billing Rupiah 2.750.000,00").unwrap();
        assert_eq!(total.value, 2_750_000);
    }

    #[test]
    fn rejects_bill_number_context() {
        let text = "Total Tagihan 1234567890 No. Tagihan";
        assert!(extract_total(text).is_none());
    }

    #[test]
    fn rejects_ward_tag_context() {
        let text = "Total Tagihan 750.000 (Kelas 1)";
        assert!(extract_total(text).is_none());
    }

    #[test]
    fn long_bare_number_is_not_a_total() {
        assert!(extract_total("Total Tagihan 123456789").is_none());
        assert_eq!(extract_total("Total Tagihan 12345678").unwrap().value, 12_345_678);
    }

    #[test]
    fn out_of_range_rejected() {
        assert!(extract_total("Total Tagihan Rp 0").is_none());
        assert!(extract_total("Total Tagihan Rp 1.000.000.000").is_none());
    }

    #[test]
    fn line_scan_reads_next_line() {
        let text = "Total keseluruhan tagihan\nRp 3.400.000\nTerima kasih";
        let total = extract_total(text).unwrap();
        assert_eq!(total.value, 3_400_000);
        assert_eq!(total.raw, "Total keseluruhan tagihan Rp 3.400.000");
    }

    #[test]
    fn no_total_phrase() {
        assert!(extract_total("Jumlah Rp 150.000").is_none());
        assert!(!has_total_phrase("Jumlah Rp 150.000"));
    }
}
