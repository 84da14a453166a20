/// Sanitize extracted text before passing downstream.
/// Strips control characters, trims every line and drops blank ones,
/// preserving billing punctuation (separators, currency, brackets, URLs).
pub fn sanitize_extracted_text(raw: &str) -> String {
    raw.chars()
        .filter(|c| {
            c.is_alphanumeric()
                || c.is_whitespace()
                || matches!(
                    c,
                    '.' | ','
                        | ';'
                        | ':'
                        | '-'
                        | '/'
                        | '\\'
                        | '('
                        | ')'
                        | '['
                        | ']'
                        | '{'
                        | '}'
                        | '+'
                        | '='
                        | '%'
                        | '#'
                        | '@'
                        | '&'
                        | '\''
                        | '"'
                        | '!'
                        | '?'
                        | '<'
                        | '>'
                        | '*'
                        | '_'
                        | '|'
                        | '~'
                        | '$'
                        | '°'
                        | '\u{2013}' // En-dash
                        | '\u{2019}' // Right single quotation mark
                )
        })
        .collect::<String>()
        .lines()
        .map(|l| l.trim())
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Collapse every whitespace run into a single space and trim.
pub fn squash_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Ordered, whitespace-collapsed, non-empty lines of a document.
pub fn normalized_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(squash_whitespace)
        .filter(|l| !l.is_empty())
        .collect()
}

/// Number of non-whitespace characters.
pub fn non_whitespace_chars(text: &str) -> usize {
    text.chars().filter(|c| !c.is_whitespace()).count()
}

/// True when extracted text is likely empty or truncated.
pub fn is_text_too_short(text: &str, min_non_space_chars: usize) -> bool {
    non_whitespace_chars(text) < min_non_space_chars
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_control_characters() {
        let raw = "Total Tagihan\x01\x02: Rp 150.000\nNama\x00 Pasien";
        let clean = sanitize_extracted_text(raw);
        assert!(!clean.contains('\x01'));
        assert!(!clean.contains('\x00'));
        assert!(clean.contains("Rp 150.000"));
    }

    #[test]
    fn preserves_billing_punctuation() {
        let raw = "Obat [Rawat Inap] (2x) : Rp. 1.250.000,00 | https://e-klaim.id/x?a=1";
        assert_eq!(sanitize_extracted_text(raw), raw);
    }

    #[test]
    fn collapses_blank_lines() {
        let raw = "Line one\n\n\n\nLine two\n\n\nLine three";
        assert_eq!(sanitize_extracted_text(raw), "Line one\nLine two\nLine three");
    }

    #[test]
    fn empty_input_returns_empty() {
        assert_eq!(sanitize_extracted_text(""), "");
        assert_eq!(sanitize_extracted_text("\x00\x01\x02"), "");
    }

    #[test]
    fn squash_collapses_inner_runs() {
        assert_eq!(squash_whitespace("  Nama \t Pasien   :  BUDI "), "Nama Pasien : BUDI");
    }

    #[test]
    fn normalized_lines_drop_blank_and_keep_order() {
        let lines = normalized_lines("  a  b \n\n   \n c\t\td ");
        assert_eq!(lines, vec!["a b".to_string(), "c d".to_string()]);
    }

    #[test]
    fn too_short_counts_only_non_space() {
        assert!(is_text_too_short("a b c d e f g h i j", 40));
        assert!(is_text_too_short("          0123456789          ", 11));
        assert!(!is_text_too_short(&"x".repeat(40), 40));
    }
}
