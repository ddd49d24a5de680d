//! One-off extraction of a single circular for debugging.
//!
//! Runs the same retrieval and extraction as the monitor but never touches
//! the ledger or the result file.

use gcnwatch_shared::{AppConfig, BulletinReference, ExtractionRecord, GcnWatchError, Result};
use tracing::{info, instrument, warn};
use url::Url;

use crate::processor::CircularProcessor;

/// Progress callback for the inspect command.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called once the record is ready.
    fn done(&self, record: &ExtractionRecord);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn done(&self, _record: &ExtractionRecord) {}
}

/// Resolve a circular number or URL to `(id, page_url)`.
///
/// - `"38215"` → `<base>/circulars/38215`
/// - `https://.../circulars/38215`, `.../38215/`, `.../38215#top`, and
///   `.../38215.gcn3` all resolve to ID `38215` with the URL kept as given
pub fn parse_target(input: &str, base_url: &Url) -> Result<(String, String)> {
    let input = input.trim();

    if is_digits(input) {
        let url = base_url
            .join(&format!("/circulars/{input}"))
            .map_err(|e| GcnWatchError::validation(format!("cannot build URL for {input}: {e}")))?;
        return Ok((input.to_string(), url.to_string()));
    }

    if !input.starts_with("http") {
        return Err(GcnWatchError::validation(format!(
            "'{input}' is neither a circular number nor a URL"
        )));
    }

    let segments: Vec<&str> = input.split('/').collect();
    let last = segments.last().copied().unwrap_or_default();
    let previous = segments
        .len()
        .checked_sub(2)
        .map(|i| segments[i])
        .unwrap_or_default();

    let id = if is_digits(last) {
        last
    } else if is_digits(previous) && (last.is_empty() || last.starts_with('#')) {
        previous
    } else {
        last.split(['.', '#']).next().unwrap_or_default()
    };

    if !is_digits(id) {
        return Err(GcnWatchError::validation(format!(
            "could not determine a circular ID from '{input}'"
        )));
    }
    Ok((id.to_string(), input.to_string()))
}

/// Retrieve and extract one circular.
#[instrument(skip_all, fields(target = %target))]
pub async fn inspect_circular(
    config: &AppConfig,
    target: &str,
    progress: &dyn ProgressReporter,
) -> Result<ExtractionRecord> {
    let base_url = Url::parse(&config.source.base_url).map_err(|e| {
        GcnWatchError::config(format!("invalid source.base_url '{}': {e}", config.source.base_url))
    })?;
    let (id, url) = parse_target(target, &base_url)?;
    info!(%id, %url, "inspecting circular");

    let processor = CircularProcessor::new(config)?;
    let reference = BulletinReference::new(&id, url, Some(format!("Debug parsing for circular {id}")));

    progress.phase("Retrieving and extracting");
    let record = processor.process(&reference).await;

    if record.extraction_successful {
        info!("extraction successful");
    } else {
        warn!(error = ?record.llm_error_message, "extraction was not successful");
    }

    progress.done(&record);
    Ok(record)
}

fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn base() -> Url {
        Url::parse("https://gcn.nasa.gov").unwrap()
    }

    #[test]
    fn target_from_number() {
        let (id, url) = parse_target("38215", &base()).unwrap();
        assert_eq!(id, "38215");
        assert_eq!(url, "https://gcn.nasa.gov/circulars/38215");
    }

    #[test]
    fn target_from_urls() {
        for (input, expected) in [
            ("https://gcn.nasa.gov/circulars/38215", "38215"),
            ("https://gcn.nasa.gov/circulars/38215/", "38215"),
            ("https://gcn.nasa.gov/circulars/38215/#top", "38215"),
            ("https://gcn.nasa.gov/gcn3/38215.gcn3", "38215"),
        ] {
            let (id, url) = parse_target(input, &base()).unwrap();
            assert_eq!(id, expected, "{input}");
            assert_eq!(url, input);
        }
    }

    #[test]
    fn target_rejects_garbage() {
        assert!(parse_target("GRB 241105A", &base()).is_err());
        assert!(parse_target("https://gcn.nasa.gov/circulars/latest", &base()).is_err());
        assert!(parse_target("", &base()).is_err());
    }

    #[tokio::test]
    async fn inspect_uses_debug_subject_and_leaves_state_alone() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/circulars/38215"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                "<html><body><pre>GRB 241105A: MASTER-SAAO detects an optical transient at 17.8 mag.</pre></body></html>",
            ))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"response": "{\"telescope\": \"MASTER-SAAO\"}"})),
            )
            .mount(&server)
            .await;

        let dir = std::env::temp_dir().join(format!("gw-inspect-test-{}", uuid::Uuid::now_v7()));
        let mut config = AppConfig::default();
        config.source.base_url = server.uri();
        config.llm.api_url = format!("{}/api/generate", server.uri());
        config.storage.ledger_file = dir.join("processed.txt");
        config.storage.results_file = dir.join("results.json");

        let record = inspect_circular(&config, "38215", &SilentProgress).await.unwrap();
        assert!(record.extraction_successful);
        assert_eq!(record.subject.as_deref(), Some("Debug parsing for circular 38215"));
        assert_eq!(record.telescope.as_deref(), Some("MASTER-SAAO"));
        assert!(!dir.exists());
    }
}
