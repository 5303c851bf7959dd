//! error - типизированные ошибки ledger/store слоя.
//!
//! Callers branch on [`ErrorKind`] (via [`LedgerError::kind`]), never on message text.
//! Display messages carry a stable category prefix so logs stay greppable.

use thiserror::Error;

/// Ошибки хранилища (любой backend: MemStore, FileStore, внешние реализации).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("corrupt store: {0}")]
    Corrupt(String),
    #[error("store is read-only")]
    ReadOnly,
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

/// Coarse failure category exposed to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidArgument,
    NotFound,
    StoreFailure,
    DecodeFailure,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidArgument => "invalid argument",
            ErrorKind::NotFound => "not found",
            ErrorKind::StoreFailure => "store failure",
            ErrorKind::DecodeFailure => "decode failure",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum LedgerError {
    /// Wrong argument count, non-integer timestamp, empty entity name, ordering violation
    /// (when monotonic checks are enabled).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// Referenced entity has no record, or holds no open interval to give away.
    #[error("not found: {0}")]
    NotFound(String),
    #[error("store failure: {0}")]
    Store(#[from] StoreError),
    /// Only produced by the strict decode policy.
    #[error("decode failure: {0}")]
    Decode(String),
}

impl LedgerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LedgerError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            LedgerError::NotFound(_) => ErrorKind::NotFound,
            LedgerError::Store(_) => ErrorKind::StoreFailure,
            LedgerError::Decode(_) => ErrorKind::DecodeFailure,
        }
    }

    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        LedgerError::InvalidArgument(msg.into())
    }

    pub(crate) fn not_found(msg: impl Into<String>) -> Self {
        LedgerError::NotFound(msg.into())
    }
}

pub type LedgerResult<T> = std::result::Result<T, LedgerError>;
