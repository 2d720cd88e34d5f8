//! JSONL feed written by the external scraper: one [`RawRow`] per line,
//! rewritten in place with the rows currently visible in the portal.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::collaborator::{
    BlockingSource, Collaborator, CollaboratorError, RawRow, ThreadedCollaborator,
};

pub struct FeedFileSource {
    path: PathBuf,
    ready: bool,
}

impl FeedFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ready: false,
        }
    }
}

/// Feed source running on its own collaborator thread.
pub fn spawn(path: &Path) -> Result<Box<dyn Collaborator>, CollaboratorError> {
    let collaborator = ThreadedCollaborator::spawn(FeedFileSource::new(path))
        .map_err(|e| CollaboratorError::Unavailable(format!("collaborator thread: {e}")))?;
    Ok(Box::new(collaborator))
}

/// Parse a JSONL row dump.  Blank lines are skipped; malformed lines are
/// logged and skipped so one bad row cannot hide the rest of the batch.
pub fn read_rows(path: &Path) -> std::io::Result<Vec<RawRow>> {
    let reader = BufReader::new(File::open(path)?);
    let mut rows = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<RawRow>(&line) {
            Ok(row) => rows.push(row),
            Err(e) => warn!("{}: invalid row at line {}: {e}", path.display(), idx + 1),
        }
    }
    Ok(rows)
}

impl BlockingSource for FeedFileSource {
    fn ensure_ready(&mut self) -> bool {
        self.ready = self.path.is_file();
        if self.ready {
            info!("Feed ready at {}", self.path.display());
        } else {
            warn!("Feed file {} not found", self.path.display());
        }
        self.ready
    }

    fn fetch_rows(&mut self) -> Result<Vec<RawRow>, CollaboratorError> {
        if !self.ready {
            return Err(CollaboratorError::Unavailable(format!(
                "feed {} not ready",
                self.path.display()
            )));
        }
        let rows = read_rows(&self.path).map_err(|e| {
            self.ready = false;
            CollaboratorError::Unavailable(format!("{}: {e}", self.path.display()))
        })?;
        debug!("Feed returned {} rows", rows.len());
        Ok(rows)
    }

    fn force_resync(&mut self) -> bool {
        info!("Resyncing feed {}", self.path.display());
        self.ensure_ready()
    }

    fn shutdown(&mut self) {
        self.ready = false;
        info!("Feed {} released", self.path.display());
    }
}
