//! Human-readable reports for camera failures

use camflow_core::{CameraError, ErrorKind, PlatformErrorKind};
use serde::Serialize;
use tracing::warn;

/// One failed ladder step
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttemptRecord {
    /// 1-based position in the ladder
    pub step: usize,
    /// Profile description
    pub profile: String,
    /// Platform error kind
    pub kind: String,
    /// Platform error message
    pub message: String,
}

/// Breakdown of a failed acquisition
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AcquisitionReport {
    /// Every attempt in ladder order
    pub attempts: Vec<AttemptRecord>,
    /// Kind of the last platform error
    pub final_kind: String,
    /// Suggested remedy for the last error
    pub hint: String,
}

impl AcquisitionReport {
    /// Build a report from an `AcquisitionFailed` error
    pub fn from_error(error: &CameraError) -> Option<Self> {
        let CameraError::AcquisitionFailed { last, attempts } = error else {
            return None;
        };

        let attempts = attempts
            .iter()
            .enumerate()
            .map(|(i, attempt)| AttemptRecord {
                step: i + 1,
                profile: attempt.profile.clone(),
                kind: attempt.error.kind.as_str().to_string(),
                message: attempt.error.message.clone(),
            })
            .collect();

        Some(Self {
            attempts,
            final_kind: last.kind.as_str().to_string(),
            hint: hint_for(last.kind).to_string(),
        })
    }

    /// One-line summary
    pub fn summary(&self) -> String {
        format!(
            "{} attempt(s) failed, last error {}. {}",
            self.attempts.len(),
            self.final_kind,
            self.hint
        )
    }

    /// JSON rendering
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Emit one warning per attempt
    pub fn log(&self) {
        for attempt in &self.attempts {
            warn!(
                step = attempt.step,
                profile = %attempt.profile,
                kind = %attempt.kind,
                message = %attempt.message,
                "Acquisition attempt failed"
            );
        }
    }
}

/// Remedy for a platform error kind
pub fn hint_for(kind: PlatformErrorKind) -> &'static str {
    match kind {
        PlatformErrorKind::PermissionDenied => "Allow camera access and try again.",
        PlatformErrorKind::DeviceNotFound => "Connect a camera and try again.",
        PlatformErrorKind::DeviceBusy => "Close other applications using the camera.",
        PlatformErrorKind::Overconstrained => "The camera does not support the requested settings.",
        PlatformErrorKind::Other => "Try again or pick another camera.",
    }
}

/// Status line shown to the user for an error
pub fn user_message(error: &CameraError) -> String {
    match error.kind() {
        ErrorKind::UnsupportedPlatform => "Camera is not supported on this platform.".to_string(),
        ErrorKind::PermissionDenied => {
            "Camera access was denied. Allow access and try again.".to_string()
        }
        ErrorKind::NoDeviceFound => "No camera found.".to_string(),
        ErrorKind::AcquisitionFailed => AcquisitionReport::from_error(error)
            .map(|report| format!("Could not start the camera: {}", report.summary()))
            .unwrap_or_else(|| error.to_string()),
        ErrorKind::SurfaceNotReady => "Camera preview did not start in time.".to_string(),
        ErrorKind::TorchUnsupported => "Torch is not available on this camera.".to_string(),
        _ => error.to_string(),
    }
}
