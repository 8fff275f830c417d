//! Errors surfaced to the host application.

use crate::config::ConfigError;
use crate::pipeline::PreflightError;

/// Synchronous failures of session operations.
///
/// Each variant carries a stable `code()` the host can switch on.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("AR session is not active")]
    SessionInactive,
    #[error("No valid measurements available yet")]
    NoMeasurements,
    #[error("Invalid scan type '{0}' (expected \"front\" or \"side\")")]
    InvalidScanType(String),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("No host activity is available")]
    NoActivity,
    #[error("Camera permission denied")]
    CameraPermissionDenied,
    #[error("AR body tracking is not supported on this device")]
    ArNotSupported,
    #[error("Real-time processing needs a running tokio runtime")]
    RuntimeUnavailable,
}

impl SessionError {
    pub fn code(&self) -> &'static str {
        match self {
            SessionError::SessionInactive => "SESSION_INACTIVE",
            SessionError::NoMeasurements => "NO_MEASUREMENTS",
            SessionError::InvalidScanType(_) => "INVALID_SCAN_TYPE",
            SessionError::Config(_) => "CONFIG_ERROR",
            SessionError::NoActivity => "NO_ACTIVITY",
            SessionError::CameraPermissionDenied => "CAMERA_PERMISSION_DENIED",
            SessionError::ArNotSupported => "AR_NOT_SUPPORTED",
            SessionError::RuntimeUnavailable => "RUNTIME_UNAVAILABLE",
        }
    }
}

impl From<PreflightError> for SessionError {
    fn from(e: PreflightError) -> Self {
        match e {
            PreflightError::NoActivity => SessionError::NoActivity,
            PreflightError::CameraPermissionDenied => SessionError::CameraPermissionDenied,
            PreflightError::ArNotSupported => SessionError::ArNotSupported,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_stable() {
        assert_eq!(SessionError::SessionInactive.code(), "SESSION_INACTIVE");
        assert_eq!(SessionError::InvalidScanType("top".into()).code(), "INVALID_SCAN_TYPE");
        assert_eq!(
            SessionError::Config(ConfigError::Validation(vec!["x".into()])).code(),
            "CONFIG_ERROR"
        );
        assert_eq!(SessionError::RuntimeUnavailable.code(), "RUNTIME_UNAVAILABLE");
    }

    #[test]
    fn test_preflight_mapping() {
        assert_eq!(
            SessionError::from(PreflightError::CameraPermissionDenied).code(),
            "CAMERA_PERMISSION_DENIED"
        );
        assert_eq!(SessionError::from(PreflightError::NoActivity).code(), "NO_ACTIVITY");
        assert_eq!(SessionError::from(PreflightError::ArNotSupported).code(), "AR_NOT_SUPPORTED");
    }

    #[test]
    fn test_messages() {
        let err = SessionError::InvalidScanType("top".into());
        assert_eq!(err.to_string(), "Invalid scan type 'top' (expected \"front\" or \"side\")");
    }
}
