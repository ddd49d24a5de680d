use std::path::{Path, PathBuf};

use chrono::Local;
use gcnwatch_shared::{ExtractionRecord, GcnWatchError, Result};

/// Whole-file JSON store for extraction records.
#[derive(Debug, Clone)]
pub struct ResultStore {
    path: PathBuf,
}

impl ResultStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load all records.
    ///
    /// A missing or blank file yields an empty list. A file that fails to
    /// decode is renamed to `<name>.bak.<YYYYmmddHHMMSS>` and an empty list is
    /// returned, so the next save starts fresh while the bad data stays on
    /// disk for inspection.
    pub fn load(&self) -> Result<Vec<ExtractionRecord>> {
        let content = match std::fs::read(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(GcnWatchError::io(&self.path, e)),
        };

        if content.trim_ascii().is_empty() {
            return Ok(Vec::new());
        }

        // Invalid UTF-8 surfaces as a decode error here, so it is quarantined too.
        match serde_json::from_slice::<Vec<ExtractionRecord>>(&content) {
            Ok(records) => {
                tracing::info!(count = records.len(), path = %self.path.display(), "loaded results");
                Ok(records)
            }
            Err(e) => {
                match self.quarantine() {
                    Ok(backup) => tracing::error!(
                        path = %self.path.display(),
                        backup = %backup.display(),
                        error = %e,
                        "results file is corrupt, moved aside and starting empty"
                    ),
                    Err(move_err) => tracing::error!(
                        path = %self.path.display(),
                        error = %e,
                        backup_error = %move_err,
                        "results file is corrupt and could not be moved aside, starting empty"
                    ),
                }
                Ok(Vec::new())
            }
        }
    }

    /// Replace the file with `records` via a temp file and rename.
    pub fn save(&self, records: &[ExtractionRecord]) -> Result<()> {
        let dir = match self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            Some(parent) => {
                std::fs::create_dir_all(parent).map_err(|e| GcnWatchError::io(parent, e))?;
                parent.to_path_buf()
            }
            None => PathBuf::from("."),
        };

        let file_name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| {
                GcnWatchError::Storage(format!("{} has no file name", self.path.display()))
            })?;
        let temp = dir.join(format!(".{file_name}.tmp"));

        let json = serde_json::to_string_pretty(records)
            .map_err(|e| GcnWatchError::Storage(format!("failed to serialize results: {e}")))?;

        let written = std::fs::write(&temp, json)
            .map_err(|e| GcnWatchError::io(&temp, e))
            .and_then(|()| {
                std::fs::rename(&temp, &self.path).map_err(|e| GcnWatchError::io(&self.path, e))
            });

        if let Err(e) = written {
            if temp.exists() {
                let _ = std::fs::remove_file(&temp);
            }
            return Err(e);
        }

        tracing::debug!(count = records.len(), path = %self.path.display(), "saved results");
        Ok(())
    }

    fn quarantine(&self) -> Result<PathBuf> {
        let stamp = Local::now().format("%Y%m%d%H%M%S");
        let mut name = self.path.as_os_str().to_owned();
        name.push(format!(".bak.{stamp}"));
        let backup = PathBuf::from(name);

        std::fs::rename(&self.path, &backup).map_err(|e| GcnWatchError::io(&self.path, e))?;
        Ok(backup)
    }
}
