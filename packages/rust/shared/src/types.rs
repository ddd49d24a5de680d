//! Core domain types for GCN Watch.

use serde::{Deserialize, Serialize};

/// Placeholder stored in `raw_text` when neither the circular page nor the
/// raw `.gcn3` file produced usable text.
pub const RAW_TEXT_UNAVAILABLE: &str = "COULD NOT RETRIEVE TEXT";

/// Error message attached to records whose text could not be retrieved.
pub const RETRIEVAL_FAILED_MESSAGE: &str =
    "Failed to retrieve raw text from circular page or .gcn3 file.";

// ---------------------------------------------------------------------------
// BulletinReference
// ---------------------------------------------------------------------------

/// One row of the circular index: an ID, its page URL, and the subject line
/// when the index exposes one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulletinReference {
    pub id: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
}

impl BulletinReference {
    pub fn new(id: impl Into<String>, url: impl Into<String>, subject: Option<String>) -> Self {
        Self {
            id: id.into(),
            url: url.into(),
            subject,
        }
    }

    /// The circular number, or `None` if the ID is not purely ASCII digits.
    pub fn numeric_id(&self) -> Option<u64> {
        if self.id.is_empty() || !self.id.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        self.id.parse().ok()
    }
}

// ---------------------------------------------------------------------------
// ExtractionRecord
// ---------------------------------------------------------------------------

/// A photometric value as reported by the model: usually a number, sometimes
/// a string such as `">21.5"` or `"19.2 +/- 0.1"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Measurement {
    Number(serde_json::Number),
    Text(String),
}

impl std::fmt::Display for Measurement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

/// The persisted result for a single circular.
///
/// Created once per circular, either from a model extraction or as a
/// retrieval-failure placeholder, and never modified after it is appended to
/// the result list. Absent fields are written as `null`; the three flags are
/// always concrete booleans.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionRecord {
    pub circular_id: String,
    pub circular_url: String,
    #[serde(default)]
    pub subject: Option<String>,

    #[serde(default)]
    pub is_trigger_event: bool,
    #[serde(default)]
    pub event_time_utc: Option<String>,
    #[serde(default)]
    pub time_since_trigger: Option<String>,
    #[serde(default)]
    pub ra: Option<String>,
    #[serde(default)]
    pub dec: Option<String>,
    #[serde(default)]
    pub magnitude: Option<Measurement>,
    #[serde(default)]
    pub magnitude_error: Option<Measurement>,
    #[serde(default)]
    pub is_upper_limit: bool,
    #[serde(default)]
    pub wavelength_band: Option<String>,
    #[serde(default)]
    pub multiple_bands_reported: bool,
    #[serde(default)]
    pub telescope: Option<String>,
    #[serde(default)]
    pub observatory: Option<String>,

    #[serde(default)]
    pub raw_text: String,

    #[serde(default)]
    pub extraction_successful: bool,
    #[serde(default)]
    pub llm_error_message: Option<String>,
}

impl ExtractionRecord {
    /// A record with every scientific field unset and the flags `false`.
    pub fn new_default(
        circular_id: impl Into<String>,
        circular_url: impl Into<String>,
        subject: Option<String>,
        raw_text: impl Into<String>,
    ) -> Self {
        Self {
            circular_id: circular_id.into(),
            circular_url: circular_url.into(),
            subject,
            is_trigger_event: false,
            event_time_utc: None,
            time_since_trigger: None,
            ra: None,
            dec: None,
            magnitude: None,
            magnitude_error: None,
            is_upper_limit: false,
            wavelength_band: None,
            multiple_bands_reported: false,
            telescope: None,
            observatory: None,
            raw_text: raw_text.into(),
            extraction_successful: false,
            llm_error_message: None,
        }
    }

    /// Terminal record for a circular whose text could not be fetched.
    pub fn retrieval_failure(reference: &BulletinReference) -> Self {
        let mut record = Self::new_default(
            &reference.id,
            &reference.url,
            reference.subject.clone(),
            RAW_TEXT_UNAVAILABLE,
        );
        record.llm_error_message = Some(RETRIEVAL_FAILED_MESSAGE.to_string());
        record
    }

    /// Mark the record as a successful extraction, clearing any error left by
    /// an earlier attempt.
    pub fn mark_successful(&mut self) {
        self.extraction_successful = true;
        self.llm_error_message = None;
    }
}
