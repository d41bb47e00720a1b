use std::fmt;
use thiserror::Error;

/// Why a store call failed for good.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PermanentReason {
    NotFound,
    PermissionDenied,
    Unsupported,
    QuotaExceeded,
    Conflict,
    Other,
}

impl PermanentReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotFound => "not found",
            Self::PermissionDenied => "permission denied",
            Self::Unsupported => "unsupported",
            Self::QuotaExceeded => "quota exceeded",
            Self::Conflict => "name collision",
            Self::Other => "permanent failure",
        }
    }
}

impl fmt::Display for PermanentReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Bridge capability not available: {0}")]
    NotAvailable(String),

    /// Unclassified failure. Treated as transient until the retry budget runs out.
    #[error("Bridge operation failed: {0}")]
    OperationFailed(String),

    #[error("Transient failure: {0}")]
    Transient(String),

    #[error("{reason}: {message}")]
    Permanent {
        reason: PermanentReason,
        message: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    pub fn transient(message: impl Into<String>) -> Self {
        Self::Transient(message.into())
    }

    pub fn permanent(reason: PermanentReason, message: impl Into<String>) -> Self {
        Self::Permanent {
            reason,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::permanent(PermanentReason::NotFound, message)
    }

    pub fn permission_denied(message: impl Into<String>) -> Self {
        Self::permanent(PermanentReason::PermissionDenied, message)
    }

    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::permanent(PermanentReason::Unsupported, message)
    }

    /// Whether another attempt of the same call may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transient(_) | Self::OperationFailed(_) => true,
            Self::Permanent { .. } | Self::NotAvailable(_) => false,
            Self::Io(e) => io_permanent_reason(e).is_none(),
        }
    }

    /// The permanent reason, if this error is classified as permanent.
    pub fn permanent_reason(&self) -> Option<PermanentReason> {
        match self {
            Self::Permanent { reason, .. } => Some(*reason),
            Self::NotAvailable(_) => Some(PermanentReason::Unsupported),
            Self::Io(e) => io_permanent_reason(e),
            _ => None,
        }
    }
}

/// I/O failures that come back identically on every attempt
fn io_permanent_reason(error: &std::io::Error) -> Option<PermanentReason> {
    use std::io::ErrorKind;

    if is_filesystem_loop(error) {
        return Some(PermanentReason::Other);
    }
    match error.kind() {
        ErrorKind::NotFound => Some(PermanentReason::NotFound),
        ErrorKind::PermissionDenied | ErrorKind::ReadOnlyFilesystem => {
            Some(PermanentReason::PermissionDenied)
        }
        ErrorKind::AlreadyExists | ErrorKind::IsADirectory | ErrorKind::NotADirectory => {
            Some(PermanentReason::Conflict)
        }
        ErrorKind::StorageFull | ErrorKind::FileTooLarge => Some(PermanentReason::QuotaExceeded),
        ErrorKind::InvalidInput => Some(PermanentReason::Other),
        _ => None,
    }
}

/// ELOOP; `ErrorKind::FilesystemLoop` is not stable yet
fn is_filesystem_loop(error: &std::io::Error) -> bool {
    const ELOOP: i32 = if cfg!(any(target_os = "linux", target_os = "android")) {
        40
    } else {
        62
    };
    cfg!(unix) && error.raw_os_error() == Some(ELOOP)
}

pub type Result<T> = std::result::Result<T, BridgeError>;
