//! Rupiah amount parsing.
//!
//! Billing text mixes `1.234.567`, `1,234,567`, `1234567,50` and OCR-spaced
//! `1 234 567`. Thousands groups are always three digits, so a final
//! separator followed by one or two digits is a decimal part and is dropped.

use std::sync::LazyLock;

use regex::Regex;

/// Amount alternatives, most specific first (leftmost-first alternation).
const GROUPED_DOT: &str = r"\d{1,3}(?:\.\d{3})+(?:,\d{1,2})?";
const GROUPED_COMMA: &str = r"\d{1,3}(?:,\d{3})+(?:\.\d{1,2})?";
const GROUPED_SPACE: &str = r"\d{1,3}(?: \d{3})+";
const PLAIN: &str = r"\d+(?:[.,]\d{1,2})?";

/// Largest value accepted from any token; longer digit runs are identifiers.
const MAX_DIGITS: usize = 15;

static CURRENCY_AMOUNT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)(?:\bR\s?P\.?|\bIDR)\s*:?\s*({GROUPED_DOT}|{GROUPED_COMMA}|{GROUPED_SPACE}|{PLAIN})"
    ))
    .expect("valid regex")
});

static BARE_AMOUNT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"{GROUPED_DOT}|{GROUPED_COMMA}|{PLAIN}")).expect("valid regex")
});

/// Regex fragment matching one amount token, spaces allowed as group separators.
pub fn amount_pattern() -> String {
    format!("{GROUPED_DOT}|{GROUPED_COMMA}|{GROUPED_SPACE}|{PLAIN}")
}

/// A numeric token found in a line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AmountToken {
    pub raw: String,
    pub value: i64,
    /// Preceded by `Rp` / `IDR`.
    pub has_currency: bool,
    /// Contains a thousands separator.
    pub has_separator: bool,
    /// Digits in the raw token, decimals included.
    pub digits: usize,
}

impl AmountToken {
    /// Currency-bearing: printed with `Rp` or with thousands grouping.
    pub fn is_currency_bearing(&self) -> bool {
        self.has_currency || self.has_separator
    }

    /// Shaped like a money amount rather than a count, date part or code.
    pub fn is_amount_shaped(&self) -> bool {
        self.has_currency || self.has_separator || self.digits >= 5
    }
}

/// Parse a raw numeric token into rupiah.
///
/// Returns `None` for tokens without digits or too long to be an amount.
pub fn parse_amount(token: &str) -> Option<i64> {
    let compact: String = token.chars().filter(|c| !c.is_whitespace()).collect();
    let body = strip_decimal_tail(&compact);

    let digits: String = body.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() || digits.len() > MAX_DIGITS {
        return None;
    }
    digits.parse().ok()
}

fn strip_decimal_tail(compact: &str) -> &str {
    if let Some(pos) = compact.rfind(['.', ',']) {
        let tail = &compact[pos + 1..];
        if (1..=2).contains(&tail.len()) && tail.chars().all(|c| c.is_ascii_digit()) {
            return &compact[..pos];
        }
    }
    compact
}

fn has_thousands_separator(token: &str) -> bool {
    let compact: String = token.chars().filter(|c| !c.is_whitespace()).collect();
    let body = strip_decimal_tail(&compact);
    body.contains(['.', ',']) || token.trim().contains(' ')
}

fn make_token(raw: &str, has_currency: bool) -> Option<AmountToken> {
    let value = parse_amount(raw)?;
    Some(AmountToken {
        raw: raw.to_string(),
        value,
        has_currency,
        has_separator: has_thousands_separator(raw),
        digits: raw.chars().filter(|c| c.is_ascii_digit()).count(),
    })
}

/// Every amount token in `text`, in order. Currency-marked tokens keep their
/// `Rp` flag; bare tokens glued to another digit are skipped.
pub fn amount_tokens(text: &str) -> Vec<AmountToken> {
    let mut tokens: Vec<(usize, AmountToken)> = Vec::new();
    let mut covered: Vec<(usize, usize)> = Vec::new();

    for caps in CURRENCY_AMOUNT.captures_iter(text) {
        if let Some(m) = caps.get(1) {
            if followed_by_digit(text, m.end()) {
                continue;
            }
            if let Some(token) = make_token(m.as_str(), true) {
                covered.push((m.start(), m.end()));
                tokens.push((m.start(), token));
            }
        }
    }

    for m in BARE_AMOUNT.find_iter(text) {
        if followed_by_digit(text, m.end()) || preceded_by_digit(text, m.start()) {
            continue;
        }
        if covered.iter().any(|&(s, e)| m.start() < e && s < m.end()) {
            continue;
        }
        if let Some(token) = make_token(m.as_str(), false) {
            tokens.push((m.start(), token));
        }
    }

    tokens.sort_by_key(|(start, _)| *start);
    tokens.into_iter().map(|(_, t)| t).collect()
}

fn followed_by_digit(text: &str, end: usize) -> bool {
    text[end..].chars().next().is_some_and(|c| c.is_ascii_digit())
}

fn preceded_by_digit(text: &str, start: usize) -> bool {
    text[..start].chars().next_back().is_some_and(|c| c.is_ascii_digit())
}

/// Best amount on a billing row: the right-most currency-marked token, else
/// the right-most amount-shaped token (row totals sit in the last column).
pub fn line_amount(line: &str) -> Option<AmountToken> {
    let tokens = amount_tokens(line);
    if let Some(token) = tokens.iter().rev().find(|t| t.has_currency) {
        return Some(token.clone());
    }
    tokens.into_iter().rev().find(|t| t.is_amount_shaped())
}

/// True when the line carries an explicit currency marker.
pub fn has_currency_hint(line: &str) -> bool {
    CURRENCY_AMOUNT.is_match(line) || line.to_uppercase().contains("RUPIAH")
}

/// Format as `Rp 1.500.000`. Parsed amounts are never negative.
pub fn format_rupiah(value: i64) -> String {
    let digits = value.max(0).to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(ch);
    }
    format!("Rp {grouped}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_all_separator_styles() {
        for token in ["1.234.567", "1,234,567", "1234567,50", "1234567", "1 234 567", "1.234.567,00"] {
            assert_eq!(parse_amount(token), Some(1_234_567), "token {token}");
        }
    }

    #[test]
    fn decimal_tail_only_when_one_or_two_digits() {
        assert_eq!(parse_amount("150.000"), Some(150_000));
        assert_eq!(parse_amount("1,500,000.00"), Some(1_500_000));
        assert_eq!(parse_amount("12,5"), Some(12));
    }

    #[test]
    fn malformed_tokens_are_none() {
        assert_eq!(parse_amount(""), None);
        assert_eq!(parse_amount(".,"), None);
        assert_eq!(parse_amount("1234567890123456789"), None);
    }

    #[test]
    fn tokens_flag_currency_and_separator() {
        let tokens = amount_tokens("Obat 2 x 5.000 Rp 10.000");
        let raws: Vec<&str> = tokens.iter().map(|t| t.raw.as_str()).collect();
        assert_eq!(raws, vec!["2", "5.000", "10.000"]);
        assert!(!tokens[1].has_currency && tokens[1].has_separator);
        assert!(tokens[2].has_currency);
    }

    #[test]
    fn currency_allows_space_grouping() {
        let tokens = amount_tokens("Total Rp. 1 500 000");
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].value, 1_500_000);
        assert!(tokens[0].has_currency && tokens[0].has_separator);
    }

    #[test]
    fn glued_currency_marker() {
        let amount = line_amount("Laboratorium Rp150.000").unwrap();
        assert_eq!(amount.value, 150_000);
        assert!(amount.has_currency);
    }

    #[test]
    fn line_amount_prefers_rightmost_currency_token() {
        let amount = line_amount("Rp 5.000 x 3 = Rp 15.000 (kelas 2 12345678)").unwrap();
        assert_eq!(amount.value, 15_000);
    }

    #[test]
    fn line_amount_ignores_dates_and_small_counts() {
        assert!(line_amount("Tgl 01/01/2024 Kamar 12").is_none());
        assert!(line_amount("Jam 10.30").is_none());
    }

    #[test]
    fn line_amount_rightmost_shaped_token() {
        let amount = line_amount("Paracetamol 10 5.000 50.000").unwrap();
        assert_eq!(amount.value, 50_000);
        assert!(!amount.has_currency);
    }

    #[test]
    fn bare_plain_digits_need_five() {
        let t = &amount_tokens("kode 2024")[0];
        assert!(!t.is_amount_shaped());
        let t = &amount_tokens("biaya 25000")[0];
        assert!(t.is_amount_shaped() && !t.is_currency_bearing());
    }

    #[test]
    fn currency_hint_detection() {
        assert!(has_currency_hint("Jumlah Rp. 150.000"));
        assert!(has_currency_hint("dalam rupiah"));
        assert!(!has_currency_hint("Jumlah 150.000"));
    }

    #[test]
    fn formats_rupiah() {
        assert_eq!(format_rupiah(1_500_000), "Rp 1.500.000");
        assert_eq!(format_rupiah(999), "Rp 999");
        assert_eq!(format_rupiah(0), "Rp 0");
    }
}
