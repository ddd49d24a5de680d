//! The polling loop.
//!
//! Each cycle fetches the index, walks it oldest-first, processes every
//! circular not yet in the ledger, and rewrites the result file once at the
//! end. The ledger is appended per item, so after a crash it may be ahead of
//! the result file; a circular is never extracted twice.

use std::collections::HashSet;
use std::time::Duration;

use gcnwatch_circulars::{IndexClient, parse_circular_list};
use gcnwatch_notify::Notifier;
use gcnwatch_shared::{
    AppConfig, BulletinReference, ExtractionRecord, GcnWatchError, MonitorConfig, Result,
};
use gcnwatch_storage::{Ledger, ResultStore};
use tracing::{debug, error, info, instrument, warn};
use url::Url;

use crate::processor::CircularProcessor;

// ---------------------------------------------------------------------------
// Per-item policy
// ---------------------------------------------------------------------------

/// What the monitor does with one index entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemAction {
    /// ID is not a number: ledger it so it is not re-examined every cycle.
    Malformed,
    /// ID is below the configured floor: ledger it without extraction.
    BelowFloor,
    AlreadyProcessed,
    Process,
}

/// Decide what to do with `reference` given the ID floor and the ledger.
pub fn classify_reference(
    reference: &BulletinReference,
    floor: Option<u64>,
    processed: &HashSet<String>,
) -> ItemAction {
    let Some(id) = reference.numeric_id() else {
        return ItemAction::Malformed;
    };
    if floor.is_some_and(|floor| id < floor) {
        return ItemAction::BelowFloor;
    }
    if processed.contains(&reference.id) {
        return ItemAction::AlreadyProcessed;
    }
    ItemAction::Process
}

// ---------------------------------------------------------------------------
// CycleReport
// ---------------------------------------------------------------------------

/// Counts from one pass over the index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Entries found on the index page.
    pub listed: usize,
    /// New circulars retrieved and extracted.
    pub processed: usize,
    /// Newly ledgered entries below the ID floor.
    pub skipped_below_floor: usize,
    /// Newly ledgered entries with non-numeric IDs.
    pub malformed: usize,
    /// Whether the result file was rewritten this cycle.
    pub saved: bool,
}

// ---------------------------------------------------------------------------
// Monitor
// ---------------------------------------------------------------------------

pub struct Monitor<N> {
    config: MonitorConfig,
    index: IndexClient,
    base_url: Url,
    processor: CircularProcessor,
    notifier: N,
    ledger: Ledger,
    results: ResultStore,
    processed: HashSet<String>,
    records: Vec<ExtractionRecord>,
    item_throttle: Duration,
    unsaved: bool,
}

impl<N: Notifier> Monitor<N> {
    /// Build the monitor and load persisted state.
    ///
    /// Unreadable state files are logged and treated as empty. The in-memory
    /// ledger is the union of the ledger file and every ID in the results.
    pub fn new(config: &AppConfig, notifier: N) -> Result<Self> {
        config.validate()?;

        let base_url = Url::parse(&config.source.base_url).map_err(|e| {
            GcnWatchError::config(format!("invalid source.base_url '{}': {e}", config.source.base_url))
        })?;

        let ledger = Ledger::new(&config.storage.ledger_file);
        let results = ResultStore::new(&config.storage.results_file);

        let mut processed = ledger.load().unwrap_or_else(|e| {
            error!(error = %e, "failed to load ledger, starting empty");
            HashSet::new()
        });
        let records = results.load().unwrap_or_else(|e| {
            error!(error = %e, "failed to load results, starting empty");
            Vec::new()
        });
        processed.extend(records.iter().map(|r| r.circular_id.clone()));

        info!(
            processed_ids = processed.len(),
            records = records.len(),
            "loaded monitor state"
        );
        if let Some(floor) = config.monitor.skip_circulars_before_id {
            info!(floor, "circulars below this ID will be skipped");
        }

        Ok(Self {
            config: config.monitor.clone(),
            index: IndexClient::new(&config.source)?,
            base_url,
            processor: CircularProcessor::new(config)?,
            notifier,
            ledger,
            results,
            processed,
            records,
            item_throttle: config.monitor.item_throttle(),
            unsaved: false,
        })
    }

    #[cfg(test)]
    fn with_item_throttle(mut self, throttle: Duration) -> Self {
        self.item_throttle = throttle;
        self
    }

    pub fn records(&self) -> &[ExtractionRecord] {
        &self.records
    }

    pub fn processed_ids(&self) -> &HashSet<String> {
        &self.processed
    }

    /// Poll forever. Returns only on an error that is not recoverable.
    pub async fn run(&mut self) -> Result<()> {
        info!(
            index_url = %self.index.index_url(),
            interval_secs = self.config.check_interval_secs,
            "starting GCN circular monitor"
        );

        loop {
            match self.run_cycle().await {
                Ok(report) => {
                    if report.processed == 0 && report.skipped_below_floor == 0 {
                        info!("no new circulars this cycle");
                    }
                }
                Err(e) if e.is_recoverable() => {
                    error!(error = %e, "cycle failed, retrying after interval");
                }
                Err(e) => return Err(e),
            }

            info!(
                next_check_secs = self.config.check_interval_secs,
                "sleeping until next check"
            );
            tokio::time::sleep(self.config.check_interval()).await;
        }
    }

    /// One pass over the index.
    #[instrument(skip_all)]
    pub async fn run_cycle(&mut self) -> Result<CycleReport> {
        info!("checking for new GCN circulars");

        let html = self.index.fetch_list_page().await?;
        let references = parse_circular_list(&html, &self.base_url);
        if references.is_empty() {
            return Err(GcnWatchError::parse("no circulars found on index page"));
        }

        let mut report = CycleReport {
            listed: references.len(),
            ..CycleReport::default()
        };

        // Index is newest-first.
        for reference in references.iter().rev() {
            match classify_reference(reference, self.config.skip_circulars_before_id, &self.processed) {
                ItemAction::Malformed => {
                    warn!(id = %reference.id, "circular ID is not numeric, skipping");
                    if self.mark_processed(&reference.id) {
                        report.malformed += 1;
                    }
                }
                ItemAction::BelowFloor => {
                    if self.mark_processed(&reference.id) {
                        info!(id = %reference.id, "skipping circular below ID floor");
                        report.skipped_below_floor += 1;
                    }
                }
                ItemAction::AlreadyProcessed => {}
                ItemAction::Process => {
                    let record = self.processor.process(reference).await;
                    self.notifier.notify(&record).await;
                    self.records.push(record);
                    self.mark_processed(&reference.id);
                    report.processed += 1;

                    debug!(delay_ms = self.item_throttle.as_millis() as u64, "throttling");
                    tokio::time::sleep(self.item_throttle).await;
                }
            }
        }

        if report.skipped_below_floor > 0 {
            info!(count = report.skipped_below_floor, "skipped circulars below ID floor");
        }

        if report.processed > 0 || self.unsaved {
            match self.results.save(&self.records) {
                Ok(()) => {
                    self.unsaved = false;
                    report.saved = true;
                    info!(
                        processed = report.processed,
                        total = self.records.len(),
                        "saved results"
                    );
                }
                Err(e) => {
                    self.unsaved = true;
                    error!(error = %e, "failed to save results, will retry next cycle");
                }
            }
        }

        Ok(report)
    }

    /// Add `id` to the ledger (disk then memory). Returns `false` if it was
    /// already there.
    fn mark_processed(&mut self, id: &str) -> bool {
        if self.processed.contains(id) {
            return false;
        }
        if let Err(e) = self.ledger.append(id) {
            error!(id, error = %e, "failed to append to ledger");
        }
        self.processed.insert(id.to_string())
    }
}
