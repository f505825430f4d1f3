//! The extracted invoice record.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::str::FromStr;

use crate::extract::rules::{amounts::parse_amount, dates::parse_date};

/// Structured invoice fields. Every field is independently optional.
///
/// Deserialization is lenient so the same type can absorb model output:
/// amounts may arrive as numbers or strings with currency symbols, dates in
/// any supported format, and placeholder strings such as `"N/A"` become
/// `None`. Negative amounts are dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionResult {
    /// Company or vendor issuing the invoice.
    #[serde(default, deserialize_with = "lenient_text")]
    pub vendor_name: Option<String>,

    /// Invoice number/identifier.
    #[serde(default, deserialize_with = "lenient_text")]
    pub invoice_no: Option<String>,

    /// Total amount, without currency symbol or grouping.
    #[serde(
        default,
        serialize_with = "amount_as_number",
        deserialize_with = "lenient_amount"
    )]
    pub amount: Option<Decimal>,

    /// Date the invoice was issued.
    #[serde(default, deserialize_with = "lenient_date")]
    pub invoice_date: Option<NaiveDate>,

    /// Payment due date.
    #[serde(default, deserialize_with = "lenient_date")]
    pub due_date: Option<NaiveDate>,
}

impl ExtractionResult {
    /// Whether any identifying data was found.
    pub fn has_data(&self) -> bool {
        self.invoice_no.is_some()
            || self.vendor_name.is_some()
            || self.amount.is_some_and(|a| a > Decimal::ZERO)
    }

    /// Number of populated fields.
    pub fn field_count(&self) -> usize {
        [
            self.vendor_name.is_some(),
            self.invoice_no.is_some(),
            self.amount.is_some(),
            self.invoice_date.is_some(),
            self.due_date.is_some(),
        ]
        .iter()
        .filter(|present| **present)
        .count()
    }

    /// Check the record for problems worth showing to a reviewer.
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();

        if self.invoice_no.is_none() {
            issues.push("invoice number is missing".to_string());
        }

        if self.vendor_name.is_none() {
            issues.push("vendor name is missing".to_string());
        }

        match self.amount {
            None => issues.push("amount is missing".to_string()),
            Some(amount) if amount.is_zero() => issues.push("amount is zero".to_string()),
            Some(_) => {}
        }

        if let (Some(issued), Some(due)) = (self.invoice_date, self.due_date) {
            if due < issued {
                issues.push(format!(
                    "due date {} is before invoice date {}",
                    due, issued
                ));
            }
        }

        issues
    }
}

/// Strings models use instead of `null`.
const PLACEHOLDERS: &[&str] = &["", "n/a", "na", "null", "none", "unknown", "...", "-"];

fn coerce_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };

    if PLACEHOLDERS.contains(&text.to_lowercase().as_str()) {
        None
    } else {
        Some(text)
    }
}

fn coerce_amount(value: &Value) -> Option<Decimal> {
    let amount = match value {
        Value::Number(n) => {
            let s = n.to_string();
            Decimal::from_str(&s)
                .or_else(|_| Decimal::from_scientific(&s))
                .ok()
        }
        Value::String(s) => parse_amount(s),
        _ => None,
    }?;

    if amount.is_sign_negative() && !amount.is_zero() {
        None
    } else {
        Some(amount)
    }
}

fn coerce_date(value: &Value) -> Option<NaiveDate> {
    match value {
        Value::String(s) => parse_date(s),
        _ => None,
    }
}

fn lenient_text<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    Ok(Option::<Value>::deserialize(d)?.as_ref().and_then(coerce_text))
}

fn lenient_amount<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Decimal>, D::Error> {
    Ok(Option::<Value>::deserialize(d)?.as_ref().and_then(coerce_amount))
}

fn lenient_date<'de, D: Deserializer<'de>>(d: D) -> Result<Option<NaiveDate>, D::Error> {
    Ok(Option::<Value>::deserialize(d)?.as_ref().and_then(coerce_date))
}

fn amount_as_number<S: Serializer>(amount: &Option<Decimal>, s: S) -> Result<S::Ok, S::Error> {
    match amount.and_then(|a| a.to_f64()) {
        Some(value) => s.serialize_f64(value),
        None => s.serialize_none(),
    }
}
