//! Prompt templates for the model strategies.

/// JSON shape both models are asked to return.
const RESPONSE_SHAPE: &str = r#"{
    "vendor_name": "...",
    "invoice_no": "...",
    "amount": 0.00,
    "due_date": "YYYY-MM-DD",
    "invoice_date": "YYYY-MM-DD"
}"#;

/// Prompt sent with an invoice image.
pub fn vision_prompt() -> String {
    format!(
        "Read this invoice image and extract the following fields. Return ONLY valid JSON.

Extract these fields:
- vendor_name: The company/vendor name that issued the invoice
- invoice_no: The invoice number
- amount: The total amount due (numeric only, no currency symbols)
- due_date: The due date in YYYY-MM-DD format
- invoice_date: The invoice date in YYYY-MM-DD format

Return JSON format:
{RESPONSE_SHAPE}

If a field cannot be found, use null."
    )
}

/// Prompt wrapping recognized invoice text.
pub fn text_prompt(text: &str) -> String {
    format!(
        "Extract the following information from this invoice text. Return ONLY valid JSON.

Invoice text:
{text}

Extract these fields:
- vendor_name: The company/vendor name, usually near the top of the invoice
- invoice_no: The invoice number, often labeled \"Invoice #\", \"Invoice No\", \"Inv\" or \"Bill #\"
- amount: The total amount, labeled \"Total\", \"Amount Due\" or \"Balance Due\" (numeric only, no currency symbols or thousands separators)
- due_date: The due date, labeled \"Due Date\" or \"Payment Due\", in YYYY-MM-DD format
- invoice_date: The invoice date, labeled \"Invoice Date\" or \"Date\", in YYYY-MM-DD format

Return JSON format:
{RESPONSE_SHAPE}

If a field cannot be found, use null."
    )
}
