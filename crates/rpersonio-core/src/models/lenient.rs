//! Deserializers for fields the API sends with inconsistent JSON types.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Accept a string, number or bool and keep it as a string. `null` becomes "".
pub(crate) fn string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    })
}

/// Accept a number or a numeric string.
pub(crate) fn optional_i64<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    #[derive(Deserialize)]
    struct Probe {
        #[serde(deserialize_with = "super::string")]
        id: String,
        #[serde(default, deserialize_with = "super::optional_i64")]
        project: Option<i64>,
    }

    #[test]
    fn test_string_accepts_mixed_types() {
        let p: Probe = serde_json::from_str(r#"{"id": 123456}"#).expect("number id");
        assert_eq!(p.id, "123456");
        let p: Probe = serde_json::from_str(r#"{"id": "abc"}"#).expect("string id");
        assert_eq!(p.id, "abc");
        let p: Probe = serde_json::from_str(r#"{"id": false}"#).expect("bool id");
        assert_eq!(p.id, "false");
        let p: Probe = serde_json::from_str(r#"{"id": null}"#).expect("null id");
        assert_eq!(p.id, "");
    }

    #[test]
    fn test_optional_i64() {
        let p: Probe = serde_json::from_str(r#"{"id": "x", "project": "17"}"#).expect("string");
        assert_eq!(p.project, Some(17));
        let p: Probe = serde_json::from_str(r#"{"id": "x", "project": null}"#).expect("null");
        assert_eq!(p.project, None);
        let p: Probe = serde_json::from_str(r#"{"id": "x"}"#).expect("missing");
        assert_eq!(p.project, None);
    }
}
