use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error(
        "MMseqs2 API is giving errors. Please confirm your input is a valid protein \
         sequence. If error persists, please try again in an hour."
    )]
    Service,

    #[error("MMseqs2 server accepted the job without returning a ticket id")]
    MissingTicketId,

    #[error("gave up waiting for the MMseqs2 server after {attempts} attempts")]
    Timeout { attempts: u32 },

    #[error(
        "result cache is locked by {holder} ({}); delete the lock file if no other run is using it",
        .lock.display()
    )]
    CacheLocked { lock: PathBuf, holder: String },

    #[error("malformed MMseqs2 output in {file}: {reason}")]
    Format { file: String, reason: String },

    #[error("no alignment returned for query tag {0}")]
    MissingTag(usize),
}
