//! Inference service payload handling.
//!
//! Ollama's `/api/generate` normally returns `{"response": "<json text>", ...}`
//! but some deployments and proxies hand back the answer object directly.
//! [`InferenceResponse::classify`] decides which shape arrived and
//! [`parse_answer`] reduces it to the model's JSON object.

use serde_json::{Map, Value};

use crate::error::InferenceError;
use crate::schema::SCIENTIFIC_FIELDS;

/// Envelope keys Ollama adds around the answer.
const METADATA_KEYS: [&str; 11] = [
    "model",
    "created_at",
    "done",
    "done_reason",
    "total_duration",
    "load_duration",
    "prompt_eval_count",
    "prompt_eval_duration",
    "eval_count",
    "eval_duration",
    "context",
];

#[derive(Debug, Clone, PartialEq)]
pub enum InferenceResponse {
    /// `response` is a string that must itself be parsed as JSON.
    Wrapped(String),
    /// The answer object is already structured.
    Structured(Map<String, Value>),
    Unrecognized(Value),
}

impl InferenceResponse {
    pub fn classify(payload: Value) -> Self {
        let Value::Object(mut obj) = payload else {
            return Self::Unrecognized(payload);
        };

        match obj.remove("response") {
            Some(Value::String(s)) => return Self::Wrapped(s),
            Some(Value::Object(answer)) => return Self::Structured(answer),
            Some(other) => {
                obj.insert("response".into(), other);
                return Self::Unrecognized(Value::Object(obj));
            }
            None => {}
        }

        // A bare object only counts as an answer when it carries at least one
        // extraction field; `{"error": ...}` and similar must not pass.
        let has_field = SCIENTIFIC_FIELDS.iter().any(|f| obj.contains_key(f.name));
        if obj.contains_key("error") || !has_field {
            return Self::Unrecognized(Value::Object(obj));
        }

        let answer: Map<String, Value> = obj
            .into_iter()
            .filter(|(k, _)| !METADATA_KEYS.contains(&k.as_str()))
            .collect();
        Self::Structured(answer)
    }
}

/// Strip a surrounding markdown code fence (```` ```json ```` or ```` ``` ````).
pub fn strip_code_fence(text: &str) -> &str {
    let mut t = text.trim();
    if let Some(rest) = t.strip_prefix("```json").or_else(move || t.strip_prefix("```")) {
        t = rest;
    }
    if let Some(rest) = t.strip_suffix("```") {
        t = rest;
    }
    t.trim()
}

/// Reduce a payload to the model's answer object.
pub fn parse_answer(response: InferenceResponse) -> Result<Map<String, Value>, InferenceError> {
    match response {
        InferenceResponse::Structured(answer) => Ok(answer),
        InferenceResponse::Wrapped(text) => {
            let value = match serde_json::from_str::<Value>(text.trim()) {
                Ok(v) => v,
                Err(first) => {
                    tracing::warn!(error = %first, "answer is not plain JSON, retrying without code fence");
                    serde_json::from_str::<Value>(strip_code_fence(&text))
                        .map_err(|e| InferenceError::json(e, &text))?
                }
            };
            match value {
                Value::Object(answer) => Ok(answer),
                other => Err(InferenceError::UnexpectedShape(format!(
                    "model answer is not a JSON object: {}",
                    crate::error::excerpt(&other.to_string())
                ))),
            }
        }
        InferenceResponse::Unrecognized(payload) => Err(InferenceError::UnexpectedShape(format!(
            "unexpected inference response structure: {}",
            crate::error::excerpt(&payload.to_string())
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn classify_wrapped() {
        let payload = json!({"model": "llama3", "response": "{\"ra\": null}", "done": true});
        assert_eq!(
            InferenceResponse::classify(payload),
            InferenceResponse::Wrapped("{\"ra\": null}".into())
        );
    }

    #[test]
    fn classify_structured_response_field() {
        let payload = json!({"model": "llama3", "response": {"telescope": "ZTF"}});
        let InferenceResponse::Structured(answer) = InferenceResponse::classify(payload) else {
            panic!("expected structured");
        };
        assert_eq!(answer["telescope"], "ZTF");
    }

    #[test]
    fn classify_bare_object_drops_metadata() {
        let payload = json!({
            "model": "llama3",
            "created_at": "2024-11-05T10:00:00Z",
            "done": true,
            "eval_count": 120,
            "context": [1, 2, 3],
            "is_trigger_event": true
        });
        let InferenceResponse::Structured(answer) = InferenceResponse::classify(payload) else {
            panic!("expected structured");
        };
        assert_eq!(answer.len(), 1);
        assert_eq!(answer["is_trigger_event"], true);
    }

    #[test]
    fn classify_unrecognized() {
        assert!(matches!(
            InferenceResponse::classify(json!({"model": "llama3", "done": true})),
            InferenceResponse::Unrecognized(_)
        ));
        assert!(matches!(
            InferenceResponse::classify(json!({"response": [1, 2]})),
            InferenceResponse::Unrecognized(_)
        ));
        assert!(matches!(
            InferenceResponse::classify(json!({"error": "model 'llama3' not found"})),
            InferenceResponse::Unrecognized(_)
        ));
        assert!(matches!(
            InferenceResponse::classify(json!({"model": "llama3", "status": "loading"})),
            InferenceResponse::Unrecognized(_)
        ));
        assert!(matches!(
            InferenceResponse::classify(json!("plain text")),
            InferenceResponse::Unrecognized(_)
        ));
    }

    #[test]
    fn fenced_answer_is_parsed() {
        let text = "```json\n{\"telescope\": \"Swift/XRT\"}\n```";
        let answer = parse_answer(InferenceResponse::Wrapped(text.into())).unwrap();
        assert_eq!(answer["telescope"], "Swift/XRT");

        assert_eq!(strip_code_fence("```\n{}\n```"), "{}");
        assert_eq!(strip_code_fence("  {\"a\": 1}  "), "{\"a\": 1}");
    }

    #[test]
    fn garbage_answer_is_json_error() {
        let err = parse_answer(InferenceResponse::Wrapped("I cannot help with that".into()))
            .unwrap_err();
        assert!(matches!(err, InferenceError::Json { .. }));
        assert!(err.to_string().contains("Raw LLM output: I cannot help with that"));
    }

    #[test]
    fn non_object_answer_is_rejected() {
        let err = parse_answer(InferenceResponse::Wrapped("[1, 2, 3]".into())).unwrap_err();
        assert!(matches!(err, InferenceError::UnexpectedShape(_)));
    }
}
