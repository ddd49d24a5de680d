//! Ollama-backed extraction with bounded retries.

use std::time::Duration;

use gcnwatch_shared::{ExtractionRecord, GcnWatchError, LlmConfig, Result};
use reqwest::Client;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, error, info, instrument, warn};

use crate::error::{InferenceError, excerpt};
use crate::prompt::build_prompt;
use crate::response::{InferenceResponse, parse_answer};
use crate::schema::merge_into;

/// User-Agent string for inference requests.
const USER_AGENT: &str = concat!("GcnWatch/", env!("CARGO_PKG_VERSION"));

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    format: &'a str,
}

/// Turns circular text into an [`ExtractionRecord`] via the inference service.
#[derive(Debug, Clone)]
pub struct ExtractionEngine {
    client: Client,
    api_url: String,
    model: String,
    max_retries: u32,
    retry_backoff: Duration,
}

impl ExtractionEngine {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| GcnWatchError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_url: config.api_url.clone(),
            model: config.model.clone(),
            max_retries: config.max_retries.max(1),
            retry_backoff: Duration::from_secs(config.retry_backoff_secs),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Extract structured fields from `text`.
    ///
    /// Never fails: when every attempt errors, the returned record has
    /// `extraction_successful == false` and the last attempt's error in
    /// `llm_error_message`.
    #[instrument(skip_all, fields(circular_id = %id, model = %self.model))]
    pub async fn extract(
        &self,
        text: &str,
        id: &str,
        url: &str,
        subject: Option<&str>,
    ) -> ExtractionRecord {
        let mut record =
            ExtractionRecord::new_default(id, url, subject.map(str::to_string), text);
        let prompt = build_prompt(text);
        debug!(prompt_chars = prompt.len(), "built extraction prompt");

        let request = GenerateRequest {
            model: &self.model,
            prompt: &prompt,
            stream: false,
            format: "json",
        };

        for attempt in 0..self.max_retries {
            match self.attempt(&request, attempt + 1).await {
                Ok(answer) => {
                    merge_into(&mut record, &answer);
                    record.mark_successful();
                    info!(attempt = attempt + 1, "extraction succeeded");
                    return record;
                }
                Err(e) => {
                    error!(
                        attempt = attempt + 1,
                        max_attempts = self.max_retries,
                        error = %e,
                        "extraction attempt failed"
                    );
                    record.llm_error_message = Some(e.to_string());
                }
            }

            if attempt + 1 < self.max_retries {
                let delay = self.backoff(attempt);
                info!(delay_secs = delay.as_secs(), "retrying extraction");
                tokio::time::sleep(delay).await;
            }
        }

        error!(attempts = self.max_retries, "all extraction attempts failed");
        record
    }

    /// Pause after the zero-based `attempt` fails: `retry_backoff * (attempt + 1)`.
    fn backoff(&self, attempt: u32) -> Duration {
        self.retry_backoff * (attempt + 1)
    }

    async fn attempt(
        &self,
        request: &GenerateRequest<'_>,
        attempt: u32,
    ) -> std::result::Result<Map<String, Value>, InferenceError> {
        let response = self
            .client
            .post(&self.api_url)
            .json(request)
            .send()
            .await
            .map_err(|e| classify_transport(e, attempt))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| classify_transport(e, attempt))?;

        if !status.is_success() {
            return Err(InferenceError::Status {
                status: status.as_u16(),
                body: excerpt(&body),
            });
        }

        let payload: Value =
            serde_json::from_str(&body).map_err(|e| InferenceError::json(e, &body))?;

        let shape = InferenceResponse::classify(payload);
        if let InferenceResponse::Unrecognized(_) = &shape {
            warn!("unrecognized inference response shape");
        }
        parse_answer(shape)
    }
}

fn classify_transport(e: reqwest::Error, attempt: u32) -> InferenceError {
    if e.is_timeout() {
        InferenceError::Timeout { attempt }
    } else {
        InferenceError::Request(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gcnwatch_shared::Measurement;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const CIRCULAR: &str = "GRB 241105A: MASTER optical afterglow candidate. \
        Unfiltered magnitude 17.8 +/- 0.1 at RA 12h34m56.7s.";

    fn engine(server: &MockServer, max_retries: u32, timeout_secs: u64) -> ExtractionEngine {
        ExtractionEngine::new(&LlmConfig {
            api_url: format!("{}/api/generate", server.uri()),
            model: "llama3".into(),
            max_retries,
            request_timeout_secs: timeout_secs,
            retry_backoff_secs: 0,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn wrapped_response_is_merged() {
        let server = MockServer::start().await;
        let answer = json!({
            "is_trigger_event": "false",
            "ra": "12:34:56.7",
            "magnitude": 17.8,
            "is_upper_limit": false,
            "telescope": "MASTER-SAAO"
        });
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .and(body_partial_json(json!({"model": "llama3", "stream": false, "format": "json"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "model": "llama3",
                "response": answer.to_string(),
                "done": true
            })))
            .expect(1)
            .mount(&server)
            .await;

        let record = engine(&server, 3, 5)
            .extract(CIRCULAR, "38215", "https://gcn.nasa.gov/circulars/38215", Some("GRB 241105A"))
            .await;

        assert!(record.extraction_successful);
        assert!(record.llm_error_message.is_none());
        assert_eq!(record.ra.as_deref(), Some("12:34:56.7"));
        assert!(matches!(record.magnitude, Some(Measurement::Number(_))));
        assert_eq!(record.telescope.as_deref(), Some("MASTER-SAAO"));
        assert_eq!(record.raw_text, CIRCULAR);
        assert_eq!(record.subject.as_deref(), Some("GRB 241105A"));
        assert_eq!(record.dec, None);
    }

    #[tokio::test]
    async fn fenced_answer_after_failed_attempt() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("model loading"))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "response": "```json\n{\"is_trigger_event\": true, \"telescope\": \"Swift/BAT\"}\n```"
            })))
            .mount(&server)
            .await;

        let record = engine(&server, 3, 5)
            .extract(CIRCULAR, "38216", "https://gcn.nasa.gov/circulars/38216", None)
            .await;

        assert!(record.extraction_successful);
        assert!(record.is_trigger_event);
        assert!(record.llm_error_message.is_none());
        assert_eq!(server.received_requests().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn retries_exhausted_on_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"response": "{}"}))
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&server)
            .await;

        let record = engine(&server, 2, 1)
            .extract(CIRCULAR, "38217", "https://gcn.nasa.gov/circulars/38217", None)
            .await;

        assert!(!record.extraction_successful);
        assert_eq!(
            record.llm_error_message.as_deref(),
            Some("API Request Timeout (attempt 2)")
        );
        assert!(!record.is_trigger_event);
        assert!(!record.is_upper_limit);
        assert!(!record.multiple_bands_reported);
        assert_eq!(server.received_requests().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn unrecognized_shape_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"model": "llama3", "done": true})),
            )
            .mount(&server)
            .await;

        let record = engine(&server, 1, 5)
            .extract(CIRCULAR, "38218", "https://gcn.nasa.gov/circulars/38218", None)
            .await;

        assert!(!record.extraction_successful);
        let msg = record.llm_error_message.unwrap();
        assert!(msg.starts_with("Unexpected Error: unexpected inference response structure"));
    }

    #[tokio::test]
    async fn error_payload_is_not_a_successful_extraction() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(
                json!({"error": "model 'llama3' not found, try pulling it first"}),
            ))
            .expect(2)
            .mount(&server)
            .await;

        let record = engine(&server, 2, 5)
            .extract(CIRCULAR, "38219", "https://gcn.nasa.gov/circulars/38219", None)
            .await;

        assert!(!record.extraction_successful);
        let msg = record.llm_error_message.unwrap();
        assert!(msg.starts_with("Unexpected Error"), "{msg}");
        assert!(msg.contains("not found"), "{msg}");
        assert_eq!(record.telescope, None);
    }

    #[test]
    fn backoff_grows_linearly() {
        let engine = ExtractionEngine::new(&LlmConfig {
            retry_backoff_secs: 5,
            ..LlmConfig::default()
        })
        .unwrap();
        assert_eq!(engine.backoff(0), Duration::from_secs(5));
        assert_eq!(engine.backoff(1), Duration::from_secs(10));
        assert_eq!(engine.backoff(2), Duration::from_secs(15));
    }

    #[tokio::test]
    async fn unreachable_service_is_request_error() {
        let engine = ExtractionEngine::new(&LlmConfig {
            api_url: "http://127.0.0.1:9/api/generate".into(),
            max_retries: 1,
            retry_backoff_secs: 0,
            ..LlmConfig::default()
        })
        .unwrap();

        let record = engine.extract(CIRCULAR, "1", "u", None).await;
        assert!(!record.extraction_successful);
        assert!(record.llm_error_message.unwrap().starts_with("API Request Error"));
    }
}
