//! Date extraction and normalization.

use chrono::NaiveDate;

use super::patterns::{ANY_DATE, DATE_XXY, DATE_YMD, DUE_DATE, GENERIC_DATE, INVOICE_DATE};
use super::{ExtractionMatch, FieldExtractor};

/// Component order of a numeric date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Order {
    MonthDayYear,
    DayMonthYear,
}

/// Numeric formats in priority order: `MM/DD/YYYY`, `DD/MM/YYYY`,
/// `MM-DD-YYYY`, `DD-MM-YYYY`, then the same four with a 2-digit year.
const FORMATS: [(char, Order, bool); 8] = [
    ('/', Order::MonthDayYear, true),
    ('/', Order::DayMonthYear, true),
    ('-', Order::MonthDayYear, true),
    ('-', Order::DayMonthYear, true),
    ('/', Order::MonthDayYear, false),
    ('/', Order::DayMonthYear, false),
    ('-', Order::MonthDayYear, false),
    ('-', Order::DayMonthYear, false),
];

/// Month-name formats accepted after the numeric ones.
const WORD_FORMATS: [&str; 4] = ["%B %d, %Y", "%b %d, %Y", "%d %B %Y", "%d %b %Y"];

/// Parse a date string into a calendar date.
///
/// ISO `YYYY-MM-DD` is tried first, then the numeric formats in [`FORMATS`]
/// order, then month-name forms. The first format yielding a valid calendar
/// date wins, so `12/31/2025` and `31-12-2025` both give 2025-12-31.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();

    if let Some(caps) = DATE_YMD.captures(s) {
        let year: i32 = caps[1].parse().ok()?;
        let month: u32 = caps[2].parse().ok()?;
        let day: u32 = caps[3].parse().ok()?;
        if let Some(date) = NaiveDate::from_ymd_opt(year, month, day) {
            return Some(date);
        }
    }

    if let Some(caps) = DATE_XXY.captures(s) {
        let separator = caps[2].chars().next()?;
        if caps[4].chars().next()? != separator {
            return None;
        }

        let first: u32 = caps[1].parse().ok()?;
        let second: u32 = caps[3].parse().ok()?;
        let four_digit = caps[5].len() == 4;
        let year = parse_year(&caps[5]);

        return FORMATS
            .iter()
            .filter(|(sep, _, four)| *sep == separator && *four == four_digit)
            .find_map(|(_, order, _)| match order {
                Order::MonthDayYear => NaiveDate::from_ymd_opt(year, first, second),
                Order::DayMonthYear => NaiveDate::from_ymd_opt(year, second, first),
            });
    }

    let words = s.replace('.', "");
    WORD_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(&words, format).ok())
}

/// Date field extractor over all date-shaped substrings.
pub struct DateExtractor;

impl DateExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for DateExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldExtractor for DateExtractor {
    type Output = ExtractionMatch<NaiveDate>;

    fn extract(&self, text: &str) -> Option<Self::Output> {
        self.extract_all(text).into_iter().next()
    }

    fn extract_all(&self, text: &str) -> Vec<Self::Output> {
        ANY_DATE
            .find_iter(text)
            .filter_map(|m| {
                parse_date(m.as_str()).map(|date| {
                    ExtractionMatch::new(date, "any_date", m.as_str())
                        .with_position(m.start(), m.end())
                })
            })
            .collect()
    }
}

/// Dates found on an invoice.
#[derive(Debug, Clone, Default)]
pub struct InvoiceDates {
    /// Issue date.
    pub invoice_date: Option<ExtractionMatch<NaiveDate>>,
    /// Payment due date.
    pub due_date: Option<ExtractionMatch<NaiveDate>>,
}

/// Extract labeled dates, falling back to positional assignment.
///
/// Labeled rules run first. Only when neither label produced a date is the
/// whole text scanned: the first date becomes the invoice date and the
/// second the due date.
pub fn extract_dates(text: &str) -> InvoiceDates {
    let mut result = InvoiceDates::default();

    result.due_date = DUE_DATE
        .captures_iter(text)
        .find_map(|caps| labeled(&caps[1], "due_date"));

    result.invoice_date = INVOICE_DATE
        .captures_iter(text)
        .find_map(|caps| labeled(&caps[1], "invoice_date"))
        .or_else(|| {
            GENERIC_DATE
                .captures_iter(text)
                .filter(|caps| caps.get(1).is_none())
                .find_map(|caps| labeled(&caps[2], "date"))
        });

    if result.invoice_date.is_none() && result.due_date.is_none() {
        let mut dates = DateExtractor::new().extract_all(text).into_iter();
        result.invoice_date = dates.next();
        result.due_date = dates.next();
    }

    result
}

fn labeled(candidate: &str, rule: &'static str) -> Option<ExtractionMatch<NaiveDate>> {
    parse_date(candidate).map(|date| ExtractionMatch::new(date, rule, candidate))
}

fn parse_year(s: &str) -> i32 {
    let year: i32 = s.parse().unwrap_or(0);
    if s.len() <= 2 {
        // Two-digit year: assume 2000s for 00-50, 1900s for 51-99
        if year <= 50 {
            2000 + year
        } else {
            1900 + year
        }
    } else {
        year
    }
}
