//! Slack incoming-webhook notifier using Block Kit messages.

use std::time::Duration;

use gcnwatch_shared::{ExtractionRecord, GcnWatchError, Result, SlackConfig};
use reqwest::Client;
use serde_json::{Value, json};
use tracing::{debug, error, info, instrument, warn};

use crate::Notifier;

/// User-Agent string for webhook posts.
const USER_AGENT: &str = concat!("GcnWatch/", env!("CARGO_PKG_VERSION"));

/// Posts records to a Slack webhook. Disabled (every `notify` returns
/// `false`) when the webhook env var is unset.
#[derive(Debug, Clone)]
pub struct SlackNotifier {
    client: Client,
    webhook_url: Option<String>,
    config: SlackConfig,
}

impl SlackNotifier {
    pub fn new(config: &SlackConfig) -> Result<Self> {
        Self::with_webhook(config, config.webhook_url())
    }

    /// Build with an explicit webhook URL instead of reading the environment.
    pub fn with_webhook(config: &SlackConfig, webhook_url: Option<String>) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| GcnWatchError::Network(format!("failed to build HTTP client: {e}")))?;

        if webhook_url.is_none() {
            debug!(env = %config.webhook_url_env, "slack webhook not configured, notifications disabled");
        }

        Ok(Self {
            client,
            webhook_url,
            config: config.clone(),
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.webhook_url.is_some()
    }
}

impl Notifier for SlackNotifier {
    #[instrument(skip_all, fields(circular_id = %record.circular_id))]
    async fn notify(&self, record: &ExtractionRecord) -> bool {
        let Some(webhook_url) = &self.webhook_url else {
            debug!("slack webhook not configured, skipping notification");
            return false;
        };

        let payload = format_message(record, &self.config);
        debug!(%payload, "slack payload");

        let response = match self.client.post(webhook_url).json(&payload).send().await {
            Ok(r) => r,
            Err(e) => {
                error!(error = %e, "failed to send slack notification");
                return false;
            }
        };

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            error!(%status, body = %body, "slack rejected notification");
            return false;
        }

        if body != "ok" {
            warn!(body = %body, "slack notification sent, but response was not 'ok'");
        } else {
            info!("slack notification sent");
        }
        true
    }
}

// ---------------------------------------------------------------------------
// Message formatting
// ---------------------------------------------------------------------------

/// Render a record as a Block Kit webhook payload.
pub fn format_message(record: &ExtractionRecord, config: &SlackConfig) -> Value {
    let mut payload = if record.extraction_successful {
        success_message(record)
    } else {
        failure_message(record)
    };

    payload["username"] = json!(config.username);
    payload["icon_emoji"] = json!(config.icon_emoji);
    if let Some(channel) = &config.channel {
        payload["channel"] = json!(channel);
    }
    payload
}

fn failure_message(record: &ExtractionRecord) -> Value {
    let mut message = format!(
        "⚠️ Failed to extract data for GCN Circular <{}|*{}*>",
        record.circular_url, record.circular_id
    );
    if let Some(subject) = record.subject.as_deref().filter(|s| !s.is_empty()) {
        message.push_str(&format!("\n*Subject*: {subject}"));
    }
    if let Some(err) = record.llm_error_message.as_deref().filter(|s| !s.is_empty()) {
        message.push_str(&format!("\n*Error*: `{err}`"));
    }

    json!({
        "text": message,
        "blocks": [{ "type": "section", "text": { "type": "mrkdwn", "text": message } }],
    })
}

fn success_message(record: &ExtractionRecord) -> Value {
    let subject = record.subject.as_deref().unwrap_or("N/A");
    let icon = if record.is_trigger_event { "🚨" } else { "🛰️" };

    let mut header = vec![format!("{icon} GCN Circular {}", record.circular_id)];
    if record.is_trigger_event {
        header.push("- *TRIGGER EVENT*".into());
    }
    let mut instrument = Vec::new();
    if let Some(telescope) = non_empty(&record.telescope) {
        instrument.push(telescope.to_string());
    }
    if let Some(observatory) = non_empty(&record.observatory) {
        if record.telescope.as_deref() != Some(observatory) {
            instrument.push(format!("at {observatory}"));
        }
    }
    if !instrument.is_empty() {
        header.push(format!("({})", instrument.join(", ")));
    }

    let mut blocks = vec![
        json!({
            "type": "header",
            "text": { "type": "plain_text", "text": header.join(" "), "emoji": true },
        }),
        json!({
            "type": "section",
            "text": {
                "type": "mrkdwn",
                "text": format!("*Subject*: {subject}\n*<{}|View Circular on GCN>*", record.circular_url),
            },
        }),
    ];

    let fields = summary_fields(record);
    if !fields.is_empty() {
        blocks.push(json!({ "type": "divider" }));
        for pair in fields.chunks(2) {
            let texts: Vec<Value> = pair
                .iter()
                .map(|(title, value)| json!({ "type": "mrkdwn", "text": format!("*{title}*:\n{value}") }))
                .collect();
            blocks.push(json!({ "type": "section", "fields": texts }));
        }
    }

    json!({
        "text": format!("{icon} GCN {}: {subject}", record.circular_id),
        "blocks": blocks,
    })
}

fn summary_fields(record: &ExtractionRecord) -> Vec<(&'static str, String)> {
    let mut fields = Vec::new();

    match (non_empty(&record.ra), non_empty(&record.dec)) {
        (Some(ra), Some(dec)) => fields.push(("RA / Dec", format!("`{ra}` / `{dec}`"))),
        _ if !record.is_trigger_event => {
            fields.push(("Coordinates", "_Not provided in this circular_".into()))
        }
        _ => {}
    }

    if let Some(magnitude) = &record.magnitude {
        let mut parts = vec![if record.is_upper_limit {
            format!("> {magnitude} (UL)")
        } else {
            magnitude.to_string()
        }];
        if let Some(err) = &record.magnitude_error {
            parts.push(format!("± {err}"));
        }
        if let Some(band) = non_empty(&record.wavelength_band) {
            parts.push(format!("[{band}]"));
        }
        let mut display = parts.join(" ");
        let title = if record.multiple_bands_reported {
            display.push_str(" (multi-band)");
            "Brightest Mag."
        } else {
            "Magnitude"
        };
        fields.push((title, format!("`{display}`")));
    } else if let Some(band) = non_empty(&record.wavelength_band) {
        fields.push(("Band Obs.", band.to_string()));
    }

    if record.is_trigger_event {
        if let Some(t) = non_empty(&record.event_time_utc) {
            fields.push(("Trigger Time (UTC)", format!("`{t}`")));
        }
    } else {
        if let Some(t) = non_empty(&record.event_time_utc) {
            fields.push(("Obs. Time (UTC)", format!("`{t}`")));
        }
        if let Some(t) = non_empty(&record.time_since_trigger) {
            fields.push(("Time Since Trig.", t.to_string()));
        }
    }

    fields
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use gcnwatch_shared::Measurement;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn follow_up() -> ExtractionRecord {
        let mut r = ExtractionRecord::new_default(
            "38215",
            "https://gcn.nasa.gov/circulars/38215",
            Some("GRB 241105A: MASTER optical afterglow candidate".into()),
            "text",
        );
        r.telescope = Some("MASTER-SAAO".into());
        r.observatory = Some("MASTER Global Network".into());
        r.magnitude = Some(Measurement::Text("17.8".into()));
        r.magnitude_error = Some(Measurement::Text("0.1".into()));
        r.wavelength_band = Some("Optical".into());
        r.multiple_bands_reported = true;
        r.event_time_utc = Some("2024-11-05T09:58:01Z".into());
        r.time_since_trigger = Some("95 seconds".into());
        r.mark_successful();
        r
    }

    fn section_texts(payload: &Value) -> Vec<String> {
        payload["blocks"]
            .as_array()
            .unwrap()
            .iter()
            .flat_map(|b| b["fields"].as_array().cloned().unwrap_or_default())
            .map(|f| f["text"].as_str().unwrap().to_string())
            .collect()
    }

    #[test]
    fn follow_up_message_layout() {
        let payload = format_message(&follow_up(), &SlackConfig::default());

        assert_eq!(payload["username"], "GCN Bot");
        assert_eq!(payload["icon_emoji"], ":telescope:");
        assert!(payload.get("channel").is_none());
        assert_eq!(
            payload["text"],
            "🛰️ GCN 38215: GRB 241105A: MASTER optical afterglow candidate"
        );
        assert_eq!(
            payload["blocks"][0]["text"]["text"],
            "🛰️ GCN Circular 38215 (MASTER-SAAO, at MASTER Global Network)"
        );
        assert_eq!(payload["blocks"][2]["type"], "divider");

        let fields = section_texts(&payload);
        assert_eq!(
            fields,
            [
                "*Coordinates*:\n_Not provided in this circular_",
                "*Brightest Mag.*:\n`17.8 ± 0.1 [Optical] (multi-band)`",
                "*Obs. Time (UTC)*:\n`2024-11-05T09:58:01Z`",
                "*Time Since Trig.*:\n95 seconds",
            ]
        );
        // two fields per section
        assert_eq!(payload["blocks"].as_array().unwrap().len(), 5);
    }

    #[test]
    fn trigger_message_layout() {
        let mut r = ExtractionRecord::new_default("38300", "https://x/38300", None, "t");
        r.is_trigger_event = true;
        r.telescope = Some("Swift/BAT".into());
        r.observatory = Some("Swift/BAT".into());
        r.ra = Some("12:34:56".into());
        r.dec = Some("-45:12:34".into());
        r.magnitude = Some(Measurement::Text("21.0".into()));
        r.is_upper_limit = true;
        r.event_time_utc = Some("2024-12-01T00:00:00Z".into());
        r.mark_successful();

        let mut config = SlackConfig::default();
        config.channel = Some("#transients".into());
        let payload = format_message(&r, &config);

        assert_eq!(payload["channel"], "#transients");
        assert_eq!(
            payload["blocks"][0]["text"]["text"],
            "🚨 GCN Circular 38300 - *TRIGGER EVENT* (Swift/BAT)"
        );
        assert_eq!(payload["text"], "🚨 GCN 38300: N/A");
        assert_eq!(
            section_texts(&payload),
            [
                "*RA / Dec*:\n`12:34:56` / `-45:12:34`",
                "*Magnitude*:\n`> 21.0 (UL)`",
                "*Trigger Time (UTC)*:\n`2024-12-01T00:00:00Z`",
            ]
        );
    }

    #[test]
    fn failure_message_layout() {
        let mut r = ExtractionRecord::new_default("38217", "https://x/38217", Some("GRB".into()), "t");
        r.llm_error_message = Some("API Request Timeout (attempt 3)".into());
        let payload = format_message(&r, &SlackConfig::default());

        let text = payload["text"].as_str().unwrap();
        assert_eq!(
            text,
            "⚠️ Failed to extract data for GCN Circular <https://x/38217|*38217*>\n*Subject*: GRB\n*Error*: `API Request Timeout (attempt 3)`"
        );
        assert_eq!(payload["blocks"][0]["text"]["text"], text);
    }

    #[tokio::test]
    async fn disabled_without_webhook() {
        let notifier = SlackNotifier::with_webhook(&SlackConfig::default(), None).unwrap();
        assert!(!notifier.is_enabled());
        assert!(!notifier.notify(&follow_up()).await);
    }

    #[tokio::test]
    async fn posts_to_webhook() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hooks/T000/B000"))
            .and(body_partial_json(serde_json::json!({"username": "GCN Bot"})))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .expect(1)
            .mount(&server)
            .await;

        let notifier = SlackNotifier::with_webhook(
            &SlackConfig::default(),
            Some(format!("{}/hooks/T000/B000", server.uri())),
        )
        .unwrap();
        assert!(notifier.notify(&follow_up()).await);
    }

    #[tokio::test]
    async fn non_ok_body_still_counts_as_sent() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("invalid_blocks_format"))
            .mount(&server)
            .await;

        let notifier =
            SlackNotifier::with_webhook(&SlackConfig::default(), Some(server.uri())).unwrap();
        assert!(notifier.notify(&follow_up()).await);
    }

    #[tokio::test]
    async fn http_error_is_not_sent() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(404).set_body_string("no_service"))
            .mount(&server)
            .await;

        let notifier =
            SlackNotifier::with_webhook(&SlackConfig::default(), Some(server.uri())).unwrap();
        assert!(!notifier.notify(&follow_up()).await);
    }
}
