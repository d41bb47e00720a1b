//! Error types for the S3 provider

use aws_sdk_s3::config::http::HttpResponse;
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use bridge_traits::error::{BridgeError, PermanentReason};
use thiserror::Error;

/// S3 provider errors
#[derive(Error, Debug)]
pub enum S3Error {
    #[error("Invalid S3 location: {0}")]
    InvalidLocation(String),

    /// Timeouts, connection failures and unreadable responses
    #[error("S3 request failed in transit: {0}")]
    Transport(String),

    /// The request could not be built; retrying will not help
    #[error("S3 request could not be constructed: {0}")]
    Construction(String),

    /// Error response from the service
    #[error("S3 error (status {status}, code {code}): {message}")]
    Service {
        status: u16,
        code: String,
        message: String,
    },

    /// Object body stream broke off
    #[error("Failed to read object body: {0}")]
    Body(String),

    #[error(transparent)]
    BridgeError(#[from] BridgeError),
}

/// Result type for S3 operations
pub type Result<T> = std::result::Result<T, S3Error>;

impl S3Error {
    pub fn from_sdk<E>(error: SdkError<E, HttpResponse>) -> Self
    where
        E: ProvideErrorMetadata + std::error::Error + 'static,
    {
        match &error {
            SdkError::ServiceError(context) => Self::Service {
                status: context.raw().status().as_u16(),
                code: context.err().code().unwrap_or_default().to_string(),
                message: context
                    .err()
                    .message()
                    .map(str::to_string)
                    .unwrap_or_else(|| context.err().to_string()),
            },
            SdkError::ConstructionFailure(_) => {
                Self::Construction(DisplayErrorContext(&error).to_string())
            }
            _ => Self::Transport(DisplayErrorContext(&error).to_string()),
        }
    }
}

impl From<S3Error> for BridgeError {
    fn from(error: S3Error) -> Self {
        match error {
            S3Error::InvalidLocation(msg) => BridgeError::permanent(PermanentReason::Other, msg),
            S3Error::Transport(msg) | S3Error::Body(msg) => BridgeError::transient(msg),
            S3Error::Construction(msg) => BridgeError::permanent(PermanentReason::Other, msg),
            S3Error::Service {
                status,
                code,
                message,
            } => {
                let detail = format!("{code}: {message}");
                match (status, code.as_str()) {
                    (_, "NoSuchKey") | (_, "NoSuchBucket") | (404, _) => {
                        BridgeError::not_found(detail)
                    }
                    (_, "SlowDown") | (_, "RequestTimeout") | (429, _) | (500..=599, _) => {
                        BridgeError::transient(format!("HTTP {status} {detail}"))
                    }
                    (_, "AccessDenied") | (403, _) => BridgeError::permission_denied(detail),
                    (_, "QuotaExceeded") | (_, "EntityTooLarge") => {
                        BridgeError::permanent(PermanentReason::QuotaExceeded, detail)
                    }
                    (409, _) => BridgeError::permanent(PermanentReason::Conflict, detail),
                    _ => BridgeError::permanent(
                        PermanentReason::Other,
                        format!("HTTP {status} {detail}"),
                    ),
                }
            }
            S3Error::BridgeError(e) => e,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service(status: u16, code: &str) -> BridgeError {
        S3Error::Service {
            status,
            code: code.to_string(),
            message: "details".to_string(),
        }
        .into()
    }

    #[test]
    fn test_error_display() {
        let error = S3Error::Service {
            status: 403,
            code: "AccessDenied".to_string(),
            message: "Access Denied".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "S3 error (status 403, code AccessDenied): Access Denied"
        );
    }

    #[test]
    fn test_missing_objects_are_not_found() {
        assert_eq!(
            service(404, "NoSuchKey").permanent_reason(),
            Some(PermanentReason::NotFound)
        );
        assert_eq!(
            service(404, "NoSuchBucket").permanent_reason(),
            Some(PermanentReason::NotFound)
        );
    }

    #[test]
    fn test_throttling_and_server_errors_are_transient() {
        assert!(service(503, "SlowDown").is_retryable());
        assert!(service(500, "InternalError").is_retryable());
        assert!(service(400, "RequestTimeout").is_retryable());
        assert!(BridgeError::from(S3Error::Transport("connection reset".into())).is_retryable());
        assert!(BridgeError::from(S3Error::Body("eof".into())).is_retryable());
    }

    #[test]
    fn test_client_errors_are_permanent() {
        assert_eq!(
            service(403, "AccessDenied").permanent_reason(),
            Some(PermanentReason::PermissionDenied)
        );
        assert_eq!(
            service(400, "EntityTooLarge").permanent_reason(),
            Some(PermanentReason::QuotaExceeded)
        );
        let bad_request = service(400, "InvalidArgument");
        assert!(!bad_request.is_retryable());
        assert_eq!(bad_request.permanent_reason(), Some(PermanentReason::Other));
        assert!(!BridgeError::from(S3Error::Construction("no region".into())).is_retryable());
    }
}
