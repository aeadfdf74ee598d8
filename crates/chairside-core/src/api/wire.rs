//! Payload-to-wire conversion
//!
//! The remote API accepts writes as form-encoded bodies. Scalar payload
//! values become single fields; arrays flatten into repeated fields with the
//! same name, which is how the API expects multi-valued inputs.

use serde_json::{Map, Value};

/// Flatten a payload map into ordered form fields.
#[must_use]
pub fn form_fields(payload: &Map<String, Value>) -> Vec<(String, String)> {
    let mut fields = Vec::new();

    for (key, value) in payload {
        match value {
            Value::Array(items) => {
                for item in items {
                    fields.push((key.clone(), scalar_text(item)));
                }
            }
            Value::Null => {}
            other => fields.push((key.clone(), scalar_text(other))),
        }
    }

    fields
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        // Nested structures should not appear in payloads; encode them as
        // JSON text rather than dropping data
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn payload(entries: &[(&str, Value)]) -> Map<String, Value> {
        entries
            .iter()
            .map(|(key, value)| ((*key).to_string(), value.clone()))
            .collect()
    }

    #[test]
    fn scalars_become_single_fields() {
        let fields = form_fields(&payload(&[
            ("amount", json!(2500)),
            ("code", json!("P-0042")),
            ("confirmed", json!(true)),
        ]));

        assert_eq!(
            fields,
            vec![
                ("amount".to_string(), "2500".to_string()),
                ("code".to_string(), "P-0042".to_string()),
                ("confirmed".to_string(), "true".to_string()),
            ]
        );
    }

    #[test]
    fn arrays_flatten_into_repeated_fields() {
        let fields = form_fields(&payload(&[
            ("session_id", json!(12)),
            ("treatments", json!(["filling", "x-ray"])),
        ]));

        assert_eq!(
            fields,
            vec![
                ("session_id".to_string(), "12".to_string()),
                ("treatments".to_string(), "filling".to_string()),
                ("treatments".to_string(), "x-ray".to_string()),
            ]
        );
    }

    #[test]
    fn strings_are_not_json_quoted() {
        let fields = form_fields(&payload(&[("note", json!("needs \"recall\""))]));
        assert_eq!(fields[0].1, "needs \"recall\"");
    }

    #[test]
    fn nulls_are_omitted() {
        let fields = form_fields(&payload(&[("phone", Value::Null), ("code", json!("P-1"))]));
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].0, "code");
    }

    #[test]
    fn empty_arrays_produce_no_fields() {
        let fields = form_fields(&payload(&[("treatments", json!([]))]));
        assert!(fields.is_empty());
    }
}
