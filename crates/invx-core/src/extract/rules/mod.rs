//! Rule-based field extractors for invoice text.

pub mod amounts;
pub mod dates;
pub mod invoice_number;
pub mod patterns;
pub mod vendor;

pub use amounts::{parse_amount, AmountExtractor};
pub use dates::{extract_dates, parse_date, DateExtractor, InvoiceDates};
pub use invoice_number::InvoiceNumberExtractor;
pub use vendor::VendorExtractor;

/// Trait for field extractors.
pub trait FieldExtractor {
    /// The type of value this extractor produces.
    type Output;

    /// Extract the field from text.
    fn extract(&self, text: &str) -> Option<Self::Output>;

    /// Extract all occurrences of the field, in rule priority order.
    fn extract_all(&self, text: &str) -> Vec<Self::Output>;
}

/// A value found in the text, with the rule that found it.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionMatch<T> {
    /// Extracted value.
    pub value: T,
    /// Name of the rule that matched.
    pub rule: &'static str,
    /// Position in source text.
    pub position: Option<(usize, usize)>,
    /// Source text that was matched.
    pub source: String,
}

impl<T> ExtractionMatch<T> {
    pub fn new(value: T, rule: &'static str, source: impl Into<String>) -> Self {
        Self {
            value,
            rule,
            position: None,
            source: source.into(),
        }
    }

    pub fn with_position(mut self, start: usize, end: usize) -> Self {
        self.position = Some((start, end));
        self
    }
}
