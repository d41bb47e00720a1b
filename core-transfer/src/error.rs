use bridge_traits::error::BridgeError;
use thiserror::Error;

/// Retry classification of a failed item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureClass {
    /// May succeed on another attempt
    Transient,
    /// Will not succeed no matter how often it is attempted
    Permanent,
    /// The destination folder of the item could not be resolved
    Structural,
}

impl FailureClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureClass::Transient => "transient",
            FailureClass::Permanent => "permanent",
            FailureClass::Structural => "structural",
        }
    }
}

impl std::fmt::Display for FailureClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Audit reason for items that never finished because the run was stopped
pub const CANCELLED_REASON: &str = "cancelled";

#[derive(Error, Debug)]
pub enum TransferError {
    #[error("Store error: {0}")]
    Store(#[from] BridgeError),

    #[error("Folder {path} could not be resolved: {reason}")]
    Structural { path: String, reason: String },

    #[error("Unsupported item: {0}")]
    Unsupported(String),

    #[error("Conversion failed: {0}")]
    Conversion(String),

    #[error("Transfer cancelled")]
    Cancelled,

    #[error("Invalid state transition from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("Metadata export failed: {0}")]
    Export(String),

    #[error("Configuration error: {0}")]
    Config(#[from] core_runtime::Error),

    #[error("Gave up after {attempts} attempts: {source}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        source: Box<TransferError>,
    },
}

impl TransferError {
    /// Classifies the error for retry decisions and audit records
    ///
    /// Unclassified store failures count as transient here; once the retry
    /// budget is spent they are wrapped in `RetriesExhausted`, which is permanent.
    pub fn classify(&self) -> FailureClass {
        match self {
            TransferError::Store(e) if e.is_retryable() => FailureClass::Transient,
            TransferError::Structural { .. } => FailureClass::Structural,
            _ => FailureClass::Permanent,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.classify() == FailureClass::Transient
    }

    /// Message written to the audit record: `"<class>: <error>"`, or just
    /// `cancelled` for items stopped by a cancel signal
    pub fn record_message(&self) -> String {
        match self {
            TransferError::Cancelled => CANCELLED_REASON.to_string(),
            _ => format!("{}: {}", self.classify(), self),
        }
    }
}

pub type Result<T> = std::result::Result<T, TransferError>;
