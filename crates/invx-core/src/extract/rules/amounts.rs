//! Amount extraction.

use regex::Regex;
use rust_decimal::Decimal;
use std::str::FromStr;

use super::patterns::{
    AMOUNT_DUE, BALANCE, CURRENCY_AMOUNT, GRAND_TOTAL, SUB_PREFIX, TOTAL, TOTAL_AMOUNT,
};
use super::{ExtractionMatch, FieldExtractor};

/// Amount field extractor.
///
/// Rules are tried in order; within a rule the first match in the text that
/// parses wins.
pub struct AmountExtractor {
    rules: Vec<(&'static str, &'static Regex)>,
}

impl AmountExtractor {
    pub fn new() -> Self {
        Self {
            rules: vec![
                ("total_amount", &*TOTAL_AMOUNT),
                ("amount_due", &*AMOUNT_DUE),
                ("total", &*TOTAL),
                ("balance", &*BALANCE),
                ("grand_total", &*GRAND_TOTAL),
                ("currency_prefixed", &*CURRENCY_AMOUNT),
            ],
        }
    }
}

impl Default for AmountExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldExtractor for AmountExtractor {
    type Output = ExtractionMatch<Decimal>;

    fn extract(&self, text: &str) -> Option<Self::Output> {
        for &(name, rule) in &self.rules {
            for caps in rule.captures_iter(text) {
                let full = caps.get(0).unwrap();
                if is_subtotal(text, full.start()) {
                    continue;
                }
                if let Some(amount) = parse_amount(&caps[1]) {
                    return Some(
                        ExtractionMatch::new(amount, name, full.as_str())
                            .with_position(full.start(), full.end()),
                    );
                }
            }
        }
        None
    }

    fn extract_all(&self, text: &str) -> Vec<Self::Output> {
        let mut results = Vec::new();

        for &(name, rule) in &self.rules {
            for caps in rule.captures_iter(text) {
                let full = caps.get(0).unwrap();
                if is_subtotal(text, full.start()) {
                    continue;
                }
                if let Some(amount) = parse_amount(&caps[1]) {
                    results.push(
                        ExtractionMatch::new(amount, name, full.as_str())
                            .with_position(full.start(), full.end()),
                    );
                }
            }
        }

        results
    }
}

/// Whether the label starting at `start` continues a `Sub` on the same line.
fn is_subtotal(text: &str, start: usize) -> bool {
    let line_start = text[..start].rfind('\n').map_or(0, |i| i + 1);
    SUB_PREFIX.is_match(&text[line_start..start])
}

/// Parse a monetary amount, stripping currency symbols and grouping.
///
/// Accepts `"$1,234.56"`, `"1234.56"`, `"1.234,56"` and `"USD 999"`. When
/// both `,` and `.` appear the last one is the decimal separator; a lone `,`
/// followed by exactly three digits is treated as grouping.
pub fn parse_amount(s: &str) -> Option<Decimal> {
    let trimmed = s.trim();
    let negative = trimmed.starts_with('-') || (trimmed.starts_with('(') && trimmed.ends_with(')'));

    let cleaned: String = trimmed
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == ',' || *c == '.')
        .collect();
    let cleaned = cleaned.trim_matches(|c| c == ',' || c == '.');

    if !cleaned.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }

    let normalized = match (cleaned.rfind(','), cleaned.rfind('.')) {
        (Some(c), Some(d)) if c > d => cleaned.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => cleaned.replace(',', ""),
        (Some(c), None) => {
            let decimals = cleaned.len() - c - 1;
            if decimals == 3 || cleaned.matches(',').count() > 1 {
                cleaned.replace(',', "")
            } else {
                cleaned.replace(',', ".")
            }
        }
        (None, _) => cleaned.to_string(),
    };

    let amount = Decimal::from_str(&normalized).ok()?;
    Some(if negative { -amount } else { amount })
}
