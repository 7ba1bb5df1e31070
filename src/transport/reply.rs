//! Reply inspection.
//!
//! A destination may answer a request with a payload that reports a handled
//! failure instead of raising one. Both shapes are recognised:
//!
//! ```text
//! { "error": "user not found" }
//! { "success": false, "message": "quota exceeded" }
//! ```

use serde_json::Value;

/// Extract the failure message if `reply` encodes an application error.
pub fn application_error(reply: &Value) -> Option<String> {
    let obj = reply.as_object()?;

    if let Some(error) = obj.get("error") {
        return Some(message_of(error).unwrap_or_else(|| "remote operation failed".to_string()));
    }

    if obj.get("success").and_then(Value::as_bool) == Some(false) {
        let message = obj
            .get("message")
            .and_then(message_of)
            .unwrap_or_else(|| "remote operation failed".to_string());
        return Some(message);
    }

    None
}

fn message_of(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Object(map) => map
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .or_else(|| Some(value.to_string())),
        other => Some(other.to_string()),
    }
}
