use reqwest::StatusCode;
use thiserror::Error;

/// Errors raised by an archive client while searching for or playing back captures.
///
/// Only two variants matter to the fallback logic: [`ArchiveError::Playback`] skips a single
/// candidate, [`ArchiveError::BlockedSite`] ends the whole search. Everything else is treated
/// as a failed attempt on that one candidate.
#[derive(Error, Debug)]
pub enum ArchiveError {
    /// The capture exists but the archive cannot serve it right now.
    #[error("memento {timestamp} of {url} could not be played back: {detail}")]
    Playback {
        url: String,
        timestamp: String,
        detail: String,
    },

    /// The site is excluded from archive playback entirely.
    #[error("{url} is excluded from archive playback")]
    BlockedSite { url: String },

    /// The archive answered a lookup with an unexpected HTTP status.
    #[error("archive returned status {status} for {url}")]
    UnexpectedStatus { status: StatusCode, url: String },

    /// The archive answered with a body we could not make sense of.
    #[error("malformed archive response: {0}")]
    Malformed(String),

    /// The request to the archive never completed.
    #[error("archive request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

impl ArchiveError {
    /// Whether this error only disqualifies the candidate that produced it
    pub fn is_playback(&self) -> bool {
        matches!(self, ArchiveError::Playback { .. })
    }

    /// Whether this error ends the search for every remaining candidate
    pub fn is_blocked(&self) -> bool {
        matches!(self, ArchiveError::BlockedSite { .. })
    }
}

/// Errors surfaced to the host pipeline by the fallback middleware and downloader.
#[derive(Error, Debug)]
pub enum FallbackError {
    /// Proxy mode was mandatory and the archive had nothing playable.
    #[error("request abandoned: {url} not found in archive")]
    NotInArchive { url: String },

    /// The live request failed before any response was received.
    #[error("live request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The archive client could not be created.
    #[error(transparent)]
    Archive(#[from] ArchiveError),
}
