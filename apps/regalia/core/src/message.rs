use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use thiserror::Error;

/// Shown wherever a value is unknown or `null`.
pub const PLACEHOLDER: &str = "—";

/// Why a payload did not decode into a telemetry object.
///
/// This is a fallback signal rather than a failure: callers skip the
/// structured update and keep going.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("payload is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("payload is JSON but not an object (found {0})")]
    NotAnObject(&'static str),
}

/// A decoded telemetry message: string keys mapped to scalar values, in the
/// order the producer sent them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TelemetryObject(Map<String, Value>);

impl TelemetryObject {
    /// Parses `payload` as a JSON object. Arrays, bare scalars and malformed
    /// text are rejected.
    pub fn decode(payload: &str) -> Result<Self, DecodeError> {
        match serde_json::from_str::<Value>(payload)? {
            Value::Object(map) => Ok(Self(map)),
            other => Err(DecodeError::NotAnObject(kind_of(&other))),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Renders a telemetry value for display.
///
/// Numbers are shown in their shortest decimal form (`42`, `12.3`, `1.0` as
/// `1`), strings verbatim, `null` as [`PLACEHOLDER`], and anything else as
/// compact JSON text.
pub fn format_scalar(value: &Value) -> String {
    match value {
        Value::Null => PLACEHOLDER.to_string(),
        Value::Number(number) => format_number(number),
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn format_number(number: &Number) -> String {
    if number.is_i64() || number.is_u64() {
        return number.to_string();
    }
    match number.as_f64() {
        Some(float) if float.is_finite() => float.to_string(),
        // Outside the f64 range; keep the literal as sent.
        _ => number.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test_timeout::timeout]
    fn decodes_objects_in_wire_order() {
        let decoded = TelemetryObject::decode(r#"{"v": 12.3, "kmph": 42, "ntime": "1:02"}"#)
            .expect("object payload");
        let keys: Vec<_> = decoded.keys().cloned().collect();
        assert_eq!(keys, vec!["v", "kmph", "ntime"]);
        assert_eq!(decoded.get("kmph"), Some(&json!(42)));
    }

    #[test_timeout::timeout]
    fn rejects_non_objects() {
        assert!(matches!(
            TelemetryObject::decode("[1, 2, 3]"),
            Err(DecodeError::NotAnObject("array"))
        ));
        assert!(matches!(
            TelemetryObject::decode("42"),
            Err(DecodeError::NotAnObject("number"))
        ));
        assert!(matches!(
            TelemetryObject::decode("hello from esp32"),
            Err(DecodeError::Json(_))
        ));
        assert!(matches!(TelemetryObject::decode(""), Err(DecodeError::Json(_))));
    }

    #[test_timeout::timeout]
    fn serializes_back_to_the_same_object() {
        let raw = r#"{"kmph":42,"v":12.3}"#;
        let decoded = TelemetryObject::decode(raw).unwrap();
        assert_eq!(serde_json::to_string(&decoded).unwrap(), raw);
        assert_eq!(serde_json::to_string(&TelemetryObject::default()).unwrap(), "{}");
    }

    #[test_timeout::timeout]
    fn keeps_numbers_beyond_f64_range() {
        let raw = r#"{"v":1e400,"kmph":42}"#;
        let decoded = TelemetryObject::decode(raw).expect("out-of-range numbers are still JSON");
        assert_eq!(decoded.keys().collect::<Vec<_>>(), vec!["v", "kmph"]);
        assert_eq!(serde_json::to_string(&decoded).unwrap(), raw);
        assert_eq!(format_scalar(decoded.get("v").unwrap()), "1e400");
    }

    #[test_timeout::timeout]
    fn whole_floats_drop_the_fraction() {
        let decoded = TelemetryObject::decode(r#"{"a": 1.0, "b": 1e2, "c": 12.50}"#).unwrap();
        let shown: Vec<_> = decoded.iter().map(|(_, value)| format_scalar(value)).collect();
        assert_eq!(shown, vec!["1", "100", "12.5"]);
    }

    #[test_timeout::timeout]
    fn formats_scalars_for_display() {
        assert_eq!(format_scalar(&json!(42)), "42");
        assert_eq!(format_scalar(&json!(12.3)), "12.3");
        assert_eq!(format_scalar(&json!(-0.5)), "-0.5");
        assert_eq!(format_scalar(&json!("3:41.2")), "3:41.2");
        assert_eq!(format_scalar(&Value::Null), PLACEHOLDER);
        assert_eq!(format_scalar(&json!(true)), "true");
        assert_eq!(format_scalar(&json!([1, 2])), "[1,2]");
    }
}
