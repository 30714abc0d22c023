use thiserror::Error;

/// Failure taxonomy for jet archive access.
///
/// Wrong-password trials are never surfaced through this type; discovery
/// swallows them and moves on to the next candidate. Everything else comes
/// back to the caller as a distinct variant.
#[derive(Debug, Error)]
pub enum JetError {
    /// The remote password list is unreachable and no local cache exists.
    #[error("password list unavailable: {0}")]
    ResourceUnavailable(String),

    /// The requested path does not exist inside the archive.
    #[error("entry not found in archive: {0}")]
    EntryNotFound(String),

    /// Discovery exhausted every candidate without a match. The archive is
    /// still enumerable, just not readable.
    #[error("no known password decodes this archive")]
    PasswordUnknown,

    /// The container itself cannot be opened or decoded.
    #[error("archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type JetResult<T> = Result<T, JetError>;
