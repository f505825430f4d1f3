//! Deterministic rule-based invoice parser.

use tracing::debug;

use crate::models::invoice::ExtractionResult;

use super::rules::{
    extract_dates, AmountExtractor, FieldExtractor, InvoiceNumberExtractor, VendorExtractor,
};

/// Rule-based parser used when no model is available or a model call fails.
///
/// Pure function of its input: the same text always yields the same record.
pub struct PatternParser {
    vendor: VendorExtractor,
    invoice_number: InvoiceNumberExtractor,
    amount: AmountExtractor,
}

impl PatternParser {
    pub fn new() -> Self {
        Self {
            vendor: VendorExtractor::new(),
            invoice_number: InvoiceNumberExtractor::new(),
            amount: AmountExtractor::new(),
        }
    }

    /// Parse all fields from recognized text.
    pub fn parse(&self, text: &str) -> ExtractionResult {
        let vendor = self.vendor.extract(text);
        let invoice_number = self.invoice_number.extract(text);
        let amount = self.amount.extract(text);
        let dates = extract_dates(text);

        debug!(
            "Pattern rules matched: invoice_no={:?} amount={:?} invoice_date={:?} due_date={:?}",
            invoice_number.as_ref().map(|m| m.rule),
            amount.as_ref().map(|m| m.rule),
            dates.invoice_date.as_ref().map(|m| m.rule),
            dates.due_date.as_ref().map(|m| m.rule),
        );

        ExtractionResult {
            vendor_name: vendor.map(|m| m.value),
            invoice_no: invoice_number.map(|m| m.value),
            amount: amount.map(|m| m.value),
            invoice_date: dates.invoice_date.map(|m| m.value),
            due_date: dates.due_date.map(|m| m.value),
        }
    }
}

impl Default for PatternParser {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;
    use rust_decimal::Decimal;

    #[test]
    fn test_parse_basic_invoice() {
        let text = "Acme Corp\n123 Main Street\nInvoice Number: INV-2024-001\nDue Date: 01/15/2025\nTotal: $1,500.00";

        let result = PatternParser::new().parse(text);
        assert_eq!(
            result,
            ExtractionResult {
                vendor_name: Some("Acme Corp".to_string()),
                invoice_no: Some("INV-2024-001".to_string()),
                amount: Some(Decimal::new(150000, 2)),
                invoice_date: None,
                due_date: NaiveDate::from_ymd_opt(2025, 1, 15),
            }
        );
    }

    #[test]
    fn test_parse_is_deterministic() {
        let text = "Globex Ltd\nInvoice #: G-77\nDate: 2025-03-01\nAmount Due: 250.00";
        let parser = PatternParser::new();
        assert_eq!(parser.parse(text), parser.parse(text));
    }

    #[test]
    fn test_parse_empty_text() {
        assert_eq!(PatternParser::new().parse(""), ExtractionResult::default());
    }
}
