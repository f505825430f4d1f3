//! Common regex patterns for invoice field extraction.
//!
//! Label and value are kept on one line (`[ \t]*`, never `\s*`) so a bare
//! label at the end of an OCR line cannot capture the next line's text.

use lazy_static::lazy_static;
use regex::Regex;

/// Identifier token: starts alphanumeric, may contain `-`, `/`, `.` or `_`.
const ID: &str = r"([A-Z0-9][A-Z0-9\-/._]*)";

/// Optional currency prefix.
const CURRENCY: &str = r"(?:[$€£¥₹]|USD|EUR|GBP|CAD|AUD|INR|Rs\.?)?";

/// Number with optional grouping and decimals.
const NUMBER: &str = r"(\d[\d,]*(?:\.\d+)?)";

/// Numeric date shapes: ISO, or D/M/Y with `/` or `-` and a 2- or 4-digit year.
const NUMERIC_DATE: &str = r"\d{4}[-/.]\d{1,2}[-/.]\d{1,2}|\d{1,2}[/\-]\d{1,2}[/\-](?:\d{4}|\d{2})";

/// Month-name dates: `January 15, 2025`, `15 Jan 2025`.
const WORD_DATE: &str = r"[A-Z][a-z]{2,8}\.?[ \t]+\d{1,2},?[ \t]+\d{4}|\d{1,2}[ \t]+[A-Z][a-z]{2,8}\.?,?[ \t]+\d{4}";

fn amount_rule(label: &str) -> Regex {
    Regex::new(&format!(
        r"(?i){label}[ \t]*[:\-]?[ \t]*{CURRENCY}[ \t]*{NUMBER}"
    ))
    .unwrap()
}

fn date_rule(label: &str) -> Regex {
    Regex::new(&format!(
        r"(?i){label}[ \t]*[:\-]?[ \t]*({NUMERIC_DATE}|{WORD_DATE})\b"
    ))
    .unwrap()
}

lazy_static! {
    // Invoice number, in priority order
    pub static ref INVOICE_HASH: Regex = Regex::new(
        &format!(r"(?i)\binvoice[ \t]*#[ \t]*:?[ \t]*{ID}")
    ).unwrap();

    pub static ref INVOICE_NO: Regex = Regex::new(
        &format!(r"(?i)\binvoice[ \t]*(?:no\b\.?|number\b|num\b\.?|nr\b\.?)[ \t]*[:#]?[ \t]*{ID}")
    ).unwrap();

    pub static ref INV: Regex = Regex::new(
        &format!(r"(?i)\binv\b\.?[ \t]*(?:#|no\b\.?)?[ \t]*[:\-]?[ \t]*{ID}")
    ).unwrap();

    pub static ref BILL_HASH: Regex = Regex::new(
        &format!(r"(?i)\bbill[ \t]*#[ \t]*:?[ \t]*{ID}")
    ).unwrap();

    pub static ref BARE_HASH: Regex = Regex::new(
        r"(?i)#[ \t]*([A-Z0-9]{5,}[A-Z0-9\-/._]*)"
    ).unwrap();

    // Amounts, in priority order
    pub static ref TOTAL_AMOUNT: Regex = amount_rule(r"\btotal[ \t]+amount(?:[ \t]+due)?");
    pub static ref AMOUNT_DUE: Regex = amount_rule(r"\bamount[ \t]+due");
    pub static ref TOTAL: Regex = amount_rule(r"\btotal\b(?:[ \t]+due)?");
    pub static ref BALANCE: Regex = amount_rule(r"\bbalance(?:[ \t]+due)?");
    pub static ref GRAND_TOTAL: Regex = amount_rule(r"\bgrand[ \t]+total");

    /// `Sub Total` / `Sub-Total` prefix, matched against the text before a label.
    pub static ref SUB_PREFIX: Regex = Regex::new(r"(?i)\bsub[ \t\-]*$").unwrap();

    pub static ref CURRENCY_AMOUNT: Regex = Regex::new(
        &format!(r"[$€£¥₹][ \t]*{NUMBER}")
    ).unwrap();

    // Labeled dates
    pub static ref DUE_DATE: Regex = date_rule(
        r"\b(?:due[ \t]+date|payment[ \t]+due(?:[ \t]+date)?)"
    );

    pub static ref INVOICE_DATE: Regex = date_rule(
        r"\b(?:invoice[ \t]+date|date[ \t]+of[ \t]+issue|issue[ \t]+date)"
    );

    /// Generic `Date:` label. Group 1 is set when the label is really `Due Date`.
    pub static ref GENERIC_DATE: Regex = Regex::new(
        &format!(r"(?i)(\bdue[ \t]+)?\bdate\b[ \t]*[:\-]?[ \t]*({NUMERIC_DATE}|{WORD_DATE})\b")
    ).unwrap();

    /// Any numeric date-shaped substring.
    pub static ref ANY_DATE: Regex = Regex::new(
        &format!(r"\b(?:{NUMERIC_DATE})\b")
    ).unwrap();

    // Date components
    pub static ref DATE_YMD: Regex = Regex::new(
        r"^(\d{4})[-/.](\d{1,2})[-/.](\d{1,2})(?:\D|$)"
    ).unwrap();

    pub static ref DATE_XXY: Regex = Regex::new(
        r"^(\d{1,2})([/\-])(\d{1,2})([/\-])(\d{4}|\d{2})$"
    ).unwrap();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_does_not_cross_lines() {
        assert!(INVOICE_HASH.captures("Invoice #\nDate: 01/01/2025").is_none());
    }

    #[test]
    fn test_generic_date_marks_due_label() {
        let caps = GENERIC_DATE.captures("Due Date: 01/15/2025").unwrap();
        assert!(caps.get(1).is_some());

        let caps = GENERIC_DATE.captures("Date: 01/15/2025").unwrap();
        assert!(caps.get(1).is_none());
        assert_eq!(&caps[2], "01/15/2025");
    }

    #[test]
    fn test_total_skips_subtotal() {
        let caps = TOTAL.captures("Subtotal: 80.00\nTotal: 100.00").unwrap();
        assert_eq!(&caps[1], "100.00");
    }

    #[test]
    fn test_sub_prefix() {
        assert!(SUB_PREFIX.is_match("Sub "));
        assert!(SUB_PREFIX.is_match("Items\nSUB-"));
        assert!(!SUB_PREFIX.is_match("Club "));
        assert!(!SUB_PREFIX.is_match("Subtotal: 80.00\n"));
    }
}
