//! Error types for Google Drive provider

use bridge_traits::error::{BridgeError, PermanentReason};
use thiserror::Error;

use crate::types::ApiErrorResponse;

/// Google Drive provider errors
#[derive(Error, Debug)]
pub enum GoogleDriveError {
    /// Access token missing, expired or revoked
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Caller lacks access to the file or folder
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Per-user or per-project rate limit hit (429 or 403 rate-limit reasons)
    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    /// Destination drive is full
    #[error("Storage quota exceeded: {0}")]
    QuotaExceeded(String),

    #[error("File not found: {file_id}")]
    FileNotFound { file_id: String },

    /// Document cannot be exported in the requested format or size
    #[error("Export not supported: {0}")]
    ExportNotSupported(String),

    /// Any other non-2xx response
    #[error("Google Drive API error (status {status_code}): {message}")]
    ApiError { status_code: u16, message: String },

    /// Failed to parse API response
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    #[error(transparent)]
    BridgeError(#[from] BridgeError),
}

/// Result type for Google Drive operations
pub type Result<T> = std::result::Result<T, GoogleDriveError>;

impl GoogleDriveError {
    /// Classify a non-2xx response
    ///
    /// `subject` is the file or folder the request targeted, used for not-found messages.
    pub fn from_response(status: u16, body: &[u8], subject: &str) -> Self {
        let (message, reason) = match serde_json::from_slice::<ApiErrorResponse>(body) {
            Ok(envelope) => {
                let reason = envelope
                    .error
                    .errors
                    .first()
                    .map(|detail| detail.reason.clone())
                    .unwrap_or_default();
                (envelope.error.message, reason)
            }
            Err(_) => (String::from_utf8_lossy(body).into_owned(), String::new()),
        };

        match (status, reason.as_str()) {
            (401, _) => Self::AuthenticationFailed(message),
            (404, _) => Self::FileNotFound {
                file_id: subject.to_string(),
            },
            (429, _) | (403, "rateLimitExceeded") | (403, "userRateLimitExceeded") => {
                Self::RateLimitExceeded(message)
            }
            (403, "storageQuotaExceeded") | (403, "quotaExceeded") => Self::QuotaExceeded(message),
            (403, "exportSizeLimitExceeded") | (403, "cannotExportFile") => {
                Self::ExportNotSupported(message)
            }
            (400, "badRequest") if message.contains("export") => Self::ExportNotSupported(message),
            (403, _) => Self::PermissionDenied(message),
            _ => Self::ApiError {
                status_code: status,
                message,
            },
        }
    }
}

impl From<GoogleDriveError> for BridgeError {
    fn from(error: GoogleDriveError) -> Self {
        match error {
            GoogleDriveError::AuthenticationFailed(msg) => {
                BridgeError::permission_denied(format!("authentication failed: {}", msg))
            }
            GoogleDriveError::PermissionDenied(msg) => BridgeError::permission_denied(msg),
            GoogleDriveError::RateLimitExceeded(msg) => {
                BridgeError::transient(format!("rate limited: {}", msg))
            }
            GoogleDriveError::QuotaExceeded(msg) => {
                BridgeError::permanent(PermanentReason::QuotaExceeded, msg)
            }
            GoogleDriveError::FileNotFound { file_id } => BridgeError::not_found(file_id),
            GoogleDriveError::ExportNotSupported(msg) => BridgeError::unsupported(msg),
            GoogleDriveError::ApiError {
                status_code,
                message,
            } => match status_code {
                408 | 500..=599 => {
                    BridgeError::transient(format!("HTTP {}: {}", status_code, message))
                }
                409 => BridgeError::permanent(PermanentReason::Conflict, message),
                _ => BridgeError::permanent(
                    PermanentReason::Other,
                    format!("HTTP {}: {}", status_code, message),
                ),
            },
            GoogleDriveError::ParseError(msg) => {
                BridgeError::OperationFailed(format!("Parse error: {}", msg))
            }
            GoogleDriveError::BridgeError(e) => e,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = GoogleDriveError::ApiError {
            status_code: 400,
            message: "Invalid query".to_string(),
        };

        assert_eq!(
            error.to_string(),
            "Google Drive API error (status 400): Invalid query"
        );
    }

    #[test]
    fn test_rate_limit_reasons_are_transient() {
        let body = br#"{"error":{"code":403,"message":"slow down","errors":[{"reason":"userRateLimitExceeded"}]}}"#;
        let error = GoogleDriveError::from_response(403, body, "file1");
        assert!(matches!(error, GoogleDriveError::RateLimitExceeded(_)));

        let bridge: BridgeError = error.into();
        assert!(bridge.is_retryable());

        let too_many: BridgeError = GoogleDriveError::from_response(429, b"", "file1").into();
        assert!(too_many.is_retryable());
    }

    #[test]
    fn test_permanent_classification() {
        let not_found: BridgeError = GoogleDriveError::from_response(404, b"gone", "file1").into();
        assert_eq!(not_found.permanent_reason(), Some(PermanentReason::NotFound));

        let denied: BridgeError = GoogleDriveError::from_response(
            403,
            br#"{"error":{"code":403,"message":"no access","errors":[{"reason":"insufficientFilePermissions"}]}}"#,
            "file1",
        )
        .into();
        assert_eq!(
            denied.permanent_reason(),
            Some(PermanentReason::PermissionDenied)
        );

        let quota: BridgeError = GoogleDriveError::from_response(
            403,
            br#"{"error":{"code":403,"message":"full","errors":[{"reason":"storageQuotaExceeded"}]}}"#,
            "dest",
        )
        .into();
        assert_eq!(quota.permanent_reason(), Some(PermanentReason::QuotaExceeded));
    }

    #[test]
    fn test_server_errors_are_transient() {
        let error: BridgeError = GoogleDriveError::from_response(503, b"backend", "x").into();
        assert!(error.is_retryable());
    }

    #[test]
    fn test_parse_error_is_unclassified() {
        let error: BridgeError = GoogleDriveError::ParseError("truncated".into()).into();
        assert!(matches!(error, BridgeError::OperationFailed(_)));
        assert!(error.is_retryable());
    }
}
