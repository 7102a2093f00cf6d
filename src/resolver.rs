// Snapshot resolution - find the newest playable capture in a candidate list
use crate::client::ArchiveClient;
use crate::error::ArchiveError;
use crate::snapshot::{CdxRecord, Mode, Snapshot};

/// Outcome of walking a candidate list
#[derive(Debug, Clone)]
pub enum Resolution {
    /// `snapshot` was played back from `candidates[index]`
    Found { snapshot: Snapshot, index: usize },
    /// No candidate was playable, or the site is blocked
    Exhausted,
}

impl Resolution {
    pub fn is_found(&self) -> bool {
        matches!(self, Resolution::Found { .. })
    }

    pub fn snapshot(&self) -> Option<&Snapshot> {
        match self {
            Resolution::Found { snapshot, .. } => Some(snapshot),
            Resolution::Exhausted => None,
        }
    }

    /// Position of the resolved candidate in the list that was walked
    pub fn index(&self) -> Option<usize> {
        match self {
            Resolution::Found { index, .. } => Some(*index),
            Resolution::Exhausted => None,
        }
    }

    /// The resolved candidate
    pub fn record<'a>(&self, candidates: &'a [CdxRecord]) -> Option<&'a CdxRecord> {
        self.index().and_then(|i| candidates.get(i))
    }

    /// Candidates strictly older than the resolved one; empty when exhausted
    pub fn remaining<'a>(&self, candidates: &'a [CdxRecord]) -> &'a [CdxRecord] {
        match self.index() {
            Some(i) => candidates.get(i + 1..).unwrap_or(&[]),
            None => &[],
        }
    }
}

/// Find the newest candidate whose capture plays back with status 200.
///
/// Candidates are tried once each, in the order given. A playback failure or a capture
/// recorded with any other status moves on to the next candidate; a blocked site ends the
/// search immediately.
pub async fn resolve(candidates: &[CdxRecord], client: &dyn ArchiveClient) -> Resolution {
    for (index, record) in candidates.iter().enumerate() {
        match client.fetch(record, Mode::Original).await {
            Ok(snapshot) if snapshot.is_ok() => {
                log::debug!(
                    "Resolved {} to capture {} ({} of {})",
                    record.url,
                    record.timestamp,
                    index + 1,
                    candidates.len()
                );
                return Resolution::Found { snapshot, index };
            }
            Ok(snapshot) => {
                log::debug!(
                    "Skipping capture {} of {}: recorded status {}",
                    record.timestamp,
                    record.url,
                    snapshot.status_code
                );
            }
            Err(ArchiveError::BlockedSite { url }) => {
                log::info!("Archive playback is blocked for {}, abandoning search", url);
                return Resolution::Exhausted;
            }
            Err(e @ ArchiveError::Playback { .. }) => {
                log::debug!("Skipping capture: {}", e);
            }
            Err(e) => {
                log::warn!(
                    "Skipping capture {} of {}: {}",
                    record.timestamp,
                    record.url,
                    e
                );
            }
        }
    }

    log::debug!("No playable capture among {} candidates", candidates.len());
    Resolution::Exhausted
}
