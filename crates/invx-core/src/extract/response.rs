//! Parsing of model replies into [`ExtractionResult`].

use serde_json::Value;

use crate::error::StrategyError;
use crate::models::invoice::ExtractionResult;

/// Remove a surrounding Markdown code fence, with or without a language tag.
pub fn strip_code_fences(reply: &str) -> &str {
    let trimmed = reply.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };

    let rest = rest.trim_start_matches(|c: char| c.is_ascii_alphanumeric());
    let rest = rest.strip_suffix("```").unwrap_or(rest);
    rest.trim()
}

/// Parse a model reply into a record.
///
/// The reply must contain a JSON object. Chatty replies that wrap the object
/// in prose are accepted by taking the outermost `{...}` span.
pub fn parse_model_reply(reply: &str) -> Result<ExtractionResult, StrategyError> {
    let body = strip_code_fences(reply);
    if body.is_empty() {
        return Err(StrategyError::MalformedResponse("empty reply".to_string()));
    }

    let value = match serde_json::from_str::<Value>(body) {
        Ok(value) => value,
        Err(err) => outermost_object(body)
            .and_then(|span| serde_json::from_str::<Value>(span).ok())
            .ok_or_else(|| StrategyError::MalformedResponse(err.to_string()))?,
    };

    if !value.is_object() {
        return Err(StrategyError::MalformedResponse(
            "reply is not a JSON object".to_string(),
        ));
    }

    serde_json::from_value(value).map_err(|e| StrategyError::MalformedResponse(e.to_string()))
}

fn outermost_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (start < end).then(|| &text[start..=end])
}
