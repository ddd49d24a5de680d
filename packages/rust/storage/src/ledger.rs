use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};

use gcnwatch_shared::{GcnWatchError, Result};

/// Append-only record of every circular ID the monitor has handled.
#[derive(Debug, Clone)]
pub struct Ledger {
    path: PathBuf,
}

impl Ledger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read all IDs. A missing file is an empty ledger; blank lines are ignored.
    pub fn load(&self) -> Result<HashSet<String>> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "ledger file not found, starting empty");
                return Ok(HashSet::new());
            }
            Err(e) => return Err(GcnWatchError::io(&self.path, e)),
        };

        let ids: HashSet<String> = content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();

        tracing::info!(count = ids.len(), path = %self.path.display(), "loaded ledger");
        Ok(ids)
    }

    /// Append one ID, creating the parent directory on first use.
    pub fn append(&self, id: &str) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| GcnWatchError::io(parent, e))?;
        }

        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| GcnWatchError::io(&self.path, e))?;

        writeln!(file, "{id}").map_err(|e| GcnWatchError::io(&self.path, e))
    }
}
