//! Single-circular pipeline: text retrieval then extraction.

use gcnwatch_circulars::TextRetriever;
use gcnwatch_extraction::ExtractionEngine;
use gcnwatch_shared::{AppConfig, BulletinReference, ExtractionRecord, Result};
use tracing::{info, instrument, warn};

/// Turns one [`BulletinReference`] into an [`ExtractionRecord`].
#[derive(Debug, Clone)]
pub struct CircularProcessor {
    retriever: TextRetriever,
    engine: ExtractionEngine,
}

impl CircularProcessor {
    pub fn new(config: &AppConfig) -> Result<Self> {
        Ok(Self {
            retriever: TextRetriever::new(&config.source)?,
            engine: ExtractionEngine::new(&config.llm)?,
        })
    }

    /// Retrieve and extract. A circular whose text cannot be fetched yields
    /// the retrieval-failure record instead of an error.
    #[instrument(skip_all, fields(id = %reference.id))]
    pub async fn process(&self, reference: &BulletinReference) -> ExtractionRecord {
        info!(url = %reference.url, "processing new circular");

        let Some(text) = self.retriever.fetch(&reference.id, &reference.url).await else {
            warn!("could not retrieve text, skipping extraction");
            return ExtractionRecord::retrieval_failure(reference);
        };

        let record = self
            .engine
            .extract(&text, &reference.id, &reference.url, reference.subject.as_deref())
            .await;

        if record.extraction_successful {
            info!("circular processed");
        } else {
            warn!(error = ?record.llm_error_message, "extraction failed");
        }
        record
    }
}
