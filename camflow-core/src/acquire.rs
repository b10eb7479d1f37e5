//! Live source acquisition with a constraint fallback ladder
//!
//! Cameras and drivers reject constraints in unpredictable ways, so the
//! acquirer walks a fixed ladder of [`ConstraintProfile`]s from most to least
//! specific and returns the first source that carries a video track.

use crate::error::{AttemptFailure, CameraError, CameraResult};
use crate::platform::{
    ConstraintProfile, FacingMode, LiveSource, MediaPlatform, PlatformError, PlatformErrorKind,
    Resolution,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Ladder tuning
///
/// The resolutions are empirical defaults, not contracts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AcquireConfig {
    /// Ideal resolution for a preferred device on desktop
    pub desktop_ideal: Resolution,
    /// Ideal resolution for a preferred device on mobile
    pub mobile_ideal: Resolution,
    /// Ideal resolution for the rear-camera step on mobile
    pub portrait_ideal: Resolution,
    /// Reduced resolution of the fallback step
    pub fallback_ideal: Resolution,
    /// Pause between failed attempts, in milliseconds
    pub backoff_ms: u64,
}

impl Default for AcquireConfig {
    fn default() -> Self {
        Self {
            desktop_ideal: Resolution::FULL_HD,
            mobile_ideal: Resolution::HD,
            portrait_ideal: Resolution::HD.rotated(),
            fallback_ideal: Resolution::VGA,
            backoff_ms: 300,
        }
    }
}

impl AcquireConfig {
    /// Validate configuration
    pub fn validate(&self) -> CameraResult<()> {
        for (name, resolution) in [
            ("desktop_ideal", self.desktop_ideal),
            ("mobile_ideal", self.mobile_ideal),
            ("portrait_ideal", self.portrait_ideal),
            ("fallback_ideal", self.fallback_ideal),
        ] {
            if resolution.is_empty() {
                return Err(CameraError::InvalidConfiguration {
                    message: format!("{name} must have non-zero dimensions"),
                });
            }
        }

        if self.backoff_ms > 10_000 {
            return Err(CameraError::InvalidConfiguration {
                message: "backoff_ms must not exceed 10000".to_string(),
            });
        }

        Ok(())
    }

    /// Backoff as a duration
    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }
}

/// Build the acquisition ladder, most specific profile first
pub fn build_ladder(
    config: &AcquireConfig,
    preferred_device_id: Option<&str>,
    is_mobile: bool,
) -> Vec<ConstraintProfile> {
    let mut ladder = Vec::with_capacity(4);

    match preferred_device_id {
        Some(id) => {
            let ideal = if is_mobile {
                config.mobile_ideal
            } else {
                config.desktop_ideal
            };
            ladder.push(
                ConstraintProfile::exact_device(id)
                    .with_ideal(ideal)
                    .labeled("preferred device"),
            );
        }
        None if is_mobile => {
            ladder.push(
                ConstraintProfile::facing(FacingMode::Environment)
                    .with_ideal(config.portrait_ideal)
                    .labeled("rear camera"),
            );
        }
        None => {}
    }

    let reduced = match preferred_device_id {
        Some(id) => ConstraintProfile::exact_device(id),
        None => ConstraintProfile::any_video(),
    };
    ladder.push(
        reduced
            .with_ideal(config.fallback_ideal)
            .labeled("reduced resolution"),
    );

    let last = match preferred_device_id {
        Some(id) => ConstraintProfile::exact_device(id).labeled("device only"),
        None => ConstraintProfile::any_video(),
    };
    ladder.push(last);

    ladder
}

/// Acquires live sources through the constraint ladder
///
/// No retries beyond the ladder: retrying a whole acquisition is the caller's
/// decision.
pub struct StreamAcquirer {
    platform: Arc<dyn MediaPlatform>,
    config: AcquireConfig,
}

impl StreamAcquirer {
    /// Create an acquirer
    pub fn new(platform: Arc<dyn MediaPlatform>, config: AcquireConfig) -> Self {
        Self { platform, config }
    }

    /// Current configuration
    pub fn config(&self) -> &AcquireConfig {
        &self.config
    }

    /// Acquire a source, trying each ladder profile in order
    pub async fn acquire(
        &self,
        preferred_device_id: Option<&str>,
        is_mobile: bool,
    ) -> CameraResult<LiveSource> {
        let ladder = build_ladder(&self.config, preferred_device_id, is_mobile);
        let mut attempts: Vec<AttemptFailure> = Vec::new();

        for (step, profile) in ladder.iter().enumerate() {
            if step > 0 {
                tokio::time::sleep(self.config.backoff()).await;
            }

            debug!(step, %profile, "Requesting camera stream");
            let error = match self.platform.acquire(profile).await {
                Ok(source) if source.video_tracks().next().is_some() => {
                    info!(
                        step,
                        profile = %profile.label,
                        source_id = %source.id(),
                        device_id = ?source.device_id(),
                        resolution = ?source.resolution(),
                        "Camera stream acquired"
                    );
                    return Ok(source);
                }
                Ok(source) => {
                    source.stop();
                    PlatformError::new(PlatformErrorKind::Other, "source has no video track")
                }
                Err(e) => e,
            };

            warn!(step, profile = %profile.label, error = %error, "Camera stream request failed");
            let abort = error.kind == PlatformErrorKind::PermissionDenied;
            attempts.push(AttemptFailure {
                profile: profile.to_string(),
                error,
            });
            if abort {
                debug!("Permission denied, skipping remaining profiles");
                break;
            }
        }

        let last = attempts
            .last()
            .map(|attempt| attempt.error.clone())
            .unwrap_or_else(|| PlatformError::new(PlatformErrorKind::Other, "empty ladder"));

        Err(CameraError::AcquisitionFailed { last, attempts })
    }
}
