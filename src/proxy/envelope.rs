//! Success-envelope handling for backend responses.
//!
//! Backends wrap payloads as `{"apiResponse": {"success", "message"}, ...}`.
//! A successful envelope is stripped so clients see the payload directly;
//! a failed one is forwarded untouched.

use serde_json::Value;

pub const ENVELOPE_FIELD: &str = "apiResponse";

/// Envelope status of a decoded response, if it carries one
pub fn envelope_success(value: &Value) -> Option<bool> {
    value
        .get(ENVELOPE_FIELD)?
        .get("success")
        .and_then(Value::as_bool)
        .or(Some(false))
}

/// Strip a successful envelope. The remaining fields stay an object, however
/// many there are.
pub fn unwrap_envelope(value: Value) -> Value {
    if envelope_success(&value) != Some(true) {
        return value;
    }

    let Value::Object(mut object) = value else {
        return value;
    };
    object.remove(ENVELOPE_FIELD);
    Value::Object(object)
}
