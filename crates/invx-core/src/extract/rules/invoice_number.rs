//! Invoice number extraction.

use regex::Regex;

use super::patterns::{BARE_HASH, BILL_HASH, INV, INVOICE_HASH, INVOICE_NO};
use super::{ExtractionMatch, FieldExtractor};

/// A labeled identifier rule.
struct NumberRule {
    name: &'static str,
    pattern: &'static Regex,
    /// Loose labels only accept identifiers containing a digit.
    needs_digit: bool,
}

/// Invoice number field extractor.
pub struct InvoiceNumberExtractor {
    rules: Vec<NumberRule>,
}

impl InvoiceNumberExtractor {
    pub fn new() -> Self {
        let rule = |name, pattern, needs_digit| NumberRule {
            name,
            pattern,
            needs_digit,
        };

        Self {
            rules: vec![
                rule("invoice_hash", &*INVOICE_HASH, false),
                rule("invoice_no", &*INVOICE_NO, false),
                rule("inv", &*INV, true),
                rule("bill_hash", &*BILL_HASH, false),
                rule("bare_hash", &*BARE_HASH, true),
            ],
        }
    }
}

impl Default for InvoiceNumberExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldExtractor for InvoiceNumberExtractor {
    type Output = ExtractionMatch<String>;

    fn extract(&self, text: &str) -> Option<Self::Output> {
        self.extract_all(text).into_iter().next()
    }

    fn extract_all(&self, text: &str) -> Vec<Self::Output> {
        let mut results: Vec<Self::Output> = Vec::new();

        for rule in &self.rules {
            for caps in rule.pattern.captures_iter(text) {
                let id = clean_identifier(&caps[1]);
                if id.is_empty() || (rule.needs_digit && !id.chars().any(|c| c.is_ascii_digit())) {
                    continue;
                }

                // Skip if an earlier rule already found it
                if results.iter().any(|r| r.value == id) {
                    continue;
                }

                let full = caps.get(0).unwrap();
                results.push(
                    ExtractionMatch::new(id, rule.name, full.as_str())
                        .with_position(full.start(), full.end()),
                );
            }
        }

        results
    }
}

fn clean_identifier(raw: &str) -> String {
    raw.trim()
        .trim_end_matches(|c| matches!(c, '.' | '-' | '/' | '_'))
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn extract(text: &str) -> Option<(String, &'static str)> {
        InvoiceNumberExtractor::new()
            .extract(text)
            .map(|m| (m.value, m.rule))
    }

    #[test]
    fn test_invoice_number_label() {
        assert_eq!(
            extract("Invoice Number: INV-2024-001"),
            Some(("INV-2024-001".to_string(), "invoice_no"))
        );
        assert_eq!(
            extract("Invoice No. 4471/B"),
            Some(("4471/B".to_string(), "invoice_no"))
        );
    }

    #[test]
    fn test_invoice_hash_wins_over_later_rules() {
        let text = "Bill # B-7781\nInvoice #: 10023.";
        assert_eq!(extract(text), Some(("10023".to_string(), "invoice_hash")));
    }

    #[test]
    fn test_inv_requires_digit() {
        assert_eq!(extract("Inv: PENDING"), None);
        assert_eq!(extract("Inv #A77"), Some(("A77".to_string(), "inv")));
    }

    #[test]
    fn test_heading_is_not_an_identifier() {
        assert_eq!(extract("INVOICE\nAcme Corp\nDate: 01/15/2025"), None);
    }

    #[test]
    fn test_bare_hash_needs_five_chars() {
        assert_eq!(extract("Ref #123"), None);
        assert_eq!(
            extract("Order ref #AB12345"),
            Some(("AB12345".to_string(), "bare_hash"))
        );
    }

    #[test]
    fn test_extract_all_deduplicates() {
        let matches = InvoiceNumberExtractor::new().extract_all("Invoice #: 55021\nRef #55021");
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].rule, "invoice_hash");
    }
}
