//! Camera error types and handling
//!
//! This module defines the error taxonomy surfaced by every camflow crate.
//! Platform failures are carried as [`PlatformError`] values and reclassified
//! into [`CameraError`] variants before they reach the caller.

use crate::platform::{DecodeProgress, PlatformError};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// One failed step of the acquisition ladder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptFailure {
    /// Human readable label of the constraint profile that was tried
    pub profile: String,
    /// Error reported by the platform for this profile
    pub error: PlatformError,
}

impl fmt::Display for AttemptFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.profile, self.error)
    }
}

/// Main error type for camera orchestration
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CameraError {
    /// The platform exposes no enumeration or acquisition capability
    #[error("Unsupported platform: {reason}")]
    UnsupportedPlatform {
        /// Missing capability description
        reason: String,
    },

    /// Camera access was explicitly denied
    #[error("Permission denied: {reason}")]
    PermissionDenied {
        /// Denial detail reported by the platform
        reason: String,
    },

    /// No usable video input device exists
    #[error("No camera found: {detail}")]
    NoDeviceFound {
        /// What was searched for
        detail: String,
    },

    /// Listing devices failed at the platform level
    #[error("Device enumeration failed: {reason}")]
    DeviceEnumerationFailed {
        /// Failure reason
        reason: String,
    },

    /// Every profile of the acquisition ladder failed
    #[error("Camera acquisition failed after {} attempt(s): {last}", attempts.len())]
    AcquisitionFailed {
        /// Error of the last attempted profile
        last: PlatformError,
        /// Every failed attempt in ladder order
        attempts: Vec<AttemptFailure>,
    },

    /// The rendering surface never produced a usable frame
    #[error(
        "Surface not ready after {waited:?} ({width}x{height}, {progress:?}){}",
        message.as_deref().map(|m| format!(": {m}")).unwrap_or_default()
    )]
    SurfaceNotReady {
        /// How long the binder waited
        waited: Duration,
        /// Last observed frame width
        width: u32,
        /// Last observed frame height
        height: u32,
        /// Last observed decode progress
        progress: DecodeProgress,
        /// Surface error message, if the surface reported one
        message: Option<String>,
    },

    /// A capture was attempted before a frame was available
    #[error("Source not ready for capture: {reason}")]
    SourceNotReady {
        /// Why the source is not ready
        reason: String,
    },

    /// The active source exposes neither torch nor fill light
    #[error("Torch is not supported by the active camera")]
    TorchUnsupported,

    /// Operation is not valid for the current lifecycle phase
    #[error("Invalid state: cannot {operation} while {phase}")]
    InvalidState {
        /// Rejected operation
        operation: String,
        /// Phase the engine was in
        phase: String,
    },

    /// Another `open()` is in flight and did not finish in time
    #[error("Camera is already initializing (waited {waited:?})")]
    AlreadyInitializing {
        /// How long the caller waited for the in-flight open
        waited: Duration,
    },

    /// Still image encoding failed
    #[error("Encoding failed: {format} - {reason}")]
    EncodingFailed {
        /// Target image format
        format: String,
        /// Failure reason
        reason: String,
    },

    /// Invalid configuration provided
    #[error("Invalid configuration: {message}")]
    InvalidConfiguration {
        /// Error message
        message: String,
    },
}

/// Result type alias for camera operations
pub type CameraResult<T> = Result<T, CameraError>;

/// Flat error kind reported alongside human readable messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum ErrorKind {
    UnsupportedPlatform,
    PermissionDenied,
    NoDeviceFound,
    DeviceEnumerationFailed,
    AcquisitionFailed,
    SurfaceNotReady,
    SourceNotReady,
    TorchUnsupported,
    InvalidState,
    AlreadyInitializing,
    EncodingFailed,
    InvalidConfiguration,
}

impl ErrorKind {
    /// Stable snake_case name for event payloads
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::UnsupportedPlatform => "unsupported_platform",
            ErrorKind::PermissionDenied => "permission_denied",
            ErrorKind::NoDeviceFound => "no_device_found",
            ErrorKind::DeviceEnumerationFailed => "device_enumeration_failed",
            ErrorKind::AcquisitionFailed => "acquisition_failed",
            ErrorKind::SurfaceNotReady => "surface_not_ready",
            ErrorKind::SourceNotReady => "source_not_ready",
            ErrorKind::TorchUnsupported => "torch_unsupported",
            ErrorKind::InvalidState => "invalid_state",
            ErrorKind::AlreadyInitializing => "already_initializing",
            ErrorKind::EncodingFailed => "encoding_failed",
            ErrorKind::InvalidConfiguration => "invalid_configuration",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl CameraError {
    /// Structured kind of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            CameraError::UnsupportedPlatform { .. } => ErrorKind::UnsupportedPlatform,
            CameraError::PermissionDenied { .. } => ErrorKind::PermissionDenied,
            CameraError::NoDeviceFound { .. } => ErrorKind::NoDeviceFound,
            CameraError::DeviceEnumerationFailed { .. } => ErrorKind::DeviceEnumerationFailed,
            CameraError::AcquisitionFailed { .. } => ErrorKind::AcquisitionFailed,
            CameraError::SurfaceNotReady { .. } => ErrorKind::SurfaceNotReady,
            CameraError::SourceNotReady { .. } => ErrorKind::SourceNotReady,
            CameraError::TorchUnsupported => ErrorKind::TorchUnsupported,
            CameraError::InvalidState { .. } => ErrorKind::InvalidState,
            CameraError::AlreadyInitializing { .. } => ErrorKind::AlreadyInitializing,
            CameraError::EncodingFailed { .. } => ErrorKind::EncodingFailed,
            CameraError::InvalidConfiguration { .. } => ErrorKind::InvalidConfiguration,
        }
    }

    /// Check if a caller-initiated retry can succeed without user action
    ///
    /// Permission denial, missing devices and unsupported platforms need the
    /// user to change something first.
    pub fn is_recoverable(&self) -> bool {
        match self {
            CameraError::UnsupportedPlatform { .. } => false,
            CameraError::PermissionDenied { .. } => false,
            CameraError::NoDeviceFound { .. } => false,
            CameraError::DeviceEnumerationFailed { .. } => true,
            CameraError::AcquisitionFailed { .. } => true,
            CameraError::SurfaceNotReady { .. } => true,
            CameraError::SourceNotReady { .. } => true,
            CameraError::TorchUnsupported => false,
            CameraError::InvalidState { .. } => true,
            CameraError::AlreadyInitializing { .. } => true,
            CameraError::EncodingFailed { .. } => true,
            CameraError::InvalidConfiguration { .. } => false,
        }
    }

    /// Get error category
    pub fn category(&self) -> ErrorCategory {
        match self {
            CameraError::UnsupportedPlatform { .. } => ErrorCategory::Platform,
            CameraError::PermissionDenied { .. } => ErrorCategory::Permission,
            CameraError::NoDeviceFound { .. } => ErrorCategory::Device,
            CameraError::DeviceEnumerationFailed { .. } => ErrorCategory::Device,
            CameraError::AcquisitionFailed { .. } => ErrorCategory::Device,
            CameraError::SurfaceNotReady { .. } => ErrorCategory::Surface,
            CameraError::SourceNotReady { .. } => ErrorCategory::Surface,
            CameraError::TorchUnsupported => ErrorCategory::Device,
            CameraError::InvalidState { .. } => ErrorCategory::State,
            CameraError::AlreadyInitializing { .. } => ErrorCategory::State,
            CameraError::EncodingFailed { .. } => ErrorCategory::Codec,
            CameraError::InvalidConfiguration { .. } => ErrorCategory::Configuration,
        }
    }

    /// Shorthand for an [`CameraError::InvalidState`] value
    pub fn invalid_state(operation: impl Into<String>, phase: impl fmt::Display) -> Self {
        CameraError::InvalidState {
            operation: operation.into(),
            phase: phase.to_string(),
        }
    }
}

/// Error categories for classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Platform compatibility errors
    Platform,
    /// User or OS permission errors
    Permission,
    /// Device and hardware errors
    Device,
    /// Rendering surface errors
    Surface,
    /// Lifecycle state errors
    State,
    /// Image encoding errors
    Codec,
    /// Configuration and parameter errors
    Configuration,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::PlatformErrorKind;

    #[test]
    fn test_error_categories() {
        let denied = CameraError::PermissionDenied {
            reason: "user dismissed prompt".to_string(),
        };
        assert_eq!(denied.category(), ErrorCategory::Permission);
        assert_eq!(denied.kind(), ErrorKind::PermissionDenied);
        assert!(!denied.is_recoverable());

        let timeout = CameraError::SurfaceNotReady {
            waited: Duration::from_secs(10),
            width: 0,
            height: 0,
            progress: DecodeProgress::HaveNothing,
            message: None,
        };
        assert_eq!(timeout.category(), ErrorCategory::Surface);
        assert!(timeout.is_recoverable());
    }

    #[test]
    fn test_acquisition_failed_display() {
        let busy = PlatformError::new(PlatformErrorKind::DeviceBusy, "in use");
        let error = CameraError::AcquisitionFailed {
            last: busy.clone(),
            attempts: vec![
                AttemptFailure {
                    profile: "exact device".to_string(),
                    error: busy.clone(),
                },
                AttemptFailure {
                    profile: "any video".to_string(),
                    error: busy,
                },
            ],
        };
        assert_eq!(
            error.to_string(),
            "Camera acquisition failed after 2 attempt(s): device-busy: in use"
        );
    }

    #[test]
    fn test_surface_not_ready_display() {
        let error = CameraError::SurfaceNotReady {
            waited: Duration::from_secs(10),
            width: 640,
            height: 0,
            progress: DecodeProgress::HaveMetadata,
            message: Some("decoder crashed".to_string()),
        };
        assert_eq!(
            error.to_string(),
            "Surface not ready after 10s (640x0, HaveMetadata): decoder crashed"
        );
        assert_eq!(ErrorKind::SurfaceNotReady.to_string(), "surface_not_ready");
    }
}
