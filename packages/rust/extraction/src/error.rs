/// Longest excerpt of model output kept in a decode error message.
const RAW_EXCERPT_CHARS: usize = 200;

/// Why a single inference attempt failed. The `Display` text is what ends up
/// in `llm_error_message`.
#[derive(Debug, thiserror::Error)]
pub enum InferenceError {
    #[error("API Request Timeout (attempt {attempt})")]
    Timeout { attempt: u32 },

    #[error("API Request Error: {0}")]
    Request(String),

    #[error("API Request Error: HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("JSON Decode Error: {error}. Raw LLM output: {raw}")]
    Json { error: String, raw: String },

    #[error("Unexpected Error: {0}")]
    UnexpectedShape(String),
}

impl InferenceError {
    pub fn json(error: impl std::fmt::Display, raw: &str) -> Self {
        Self::Json {
            error: error.to_string(),
            raw: excerpt(raw),
        }
    }
}

pub(crate) fn excerpt(raw: &str) -> String {
    raw.chars().take(RAW_EXCERPT_CHARS).collect()
}
