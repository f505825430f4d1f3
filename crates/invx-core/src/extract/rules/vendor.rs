//! Vendor name heuristic.

use super::{ExtractionMatch, FieldExtractor};

/// Words that mark a line as a label rather than a company name.
const STOPWORDS: [&str; 5] = ["invoice", "date", "total", "amount", "due"];

/// Vendor extractor.
///
/// Invoices usually open with the issuer's name, so the first short run of
/// lines is scanned for one that does not look like a field label.
pub struct VendorExtractor {
    max_lines: usize,
    min_len: usize,
}

impl VendorExtractor {
    pub fn new() -> Self {
        Self {
            max_lines: 5,
            min_len: 3,
        }
    }

    fn is_candidate(&self, line: &str) -> bool {
        if line.chars().count() <= self.min_len {
            return false;
        }
        let lower = line.to_lowercase();
        !STOPWORDS.iter().any(|word| lower.contains(word))
    }
}

impl Default for VendorExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldExtractor for VendorExtractor {
    type Output = ExtractionMatch<String>;

    fn extract(&self, text: &str) -> Option<Self::Output> {
        self.extract_all(text).into_iter().next()
    }

    fn extract_all(&self, text: &str) -> Vec<Self::Output> {
        text.lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .take(self.max_lines)
            .filter(|line| self.is_candidate(line))
            .map(|line| ExtractionMatch::new(line.to_string(), "header_line", line))
            .collect()
    }
}
