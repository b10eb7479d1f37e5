//! Rendering surface binding
//!
//! A [`RenderSurface`] is whatever the host uses to decode and display a live
//! source (a video element, a texture, a preview widget). [`SurfaceBinder`]
//! attaches a source and waits for the first usable frame:
//! - any previously bound source is stopped and the surface reset first
//! - playback is (re)started on every signal while paused
//! - autoplay refusal degrades to a manual start instead of failing
//! - a hard wall-clock timeout bounds the wait

use crate::frame::VideoFrame;
use async_trait::async_trait;
use camflow_core::{CameraError, CameraResult, DecodeProgress, LiveSource, Resolution};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Signals a surface emits while loading a source
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceSignal {
    /// Frame dimensions are known
    MetadataLoaded,
    /// Enough data to start playback
    CanPlay,
    /// Playback started
    Playing,
    /// The surface failed to decode the source
    Error(String),
}

/// Why `play()` was rejected
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackError {
    /// Autoplay policy requires a user gesture
    NotAllowed(String),
    /// Any other playback failure
    Failed(String),
}

/// Host rendering surface
#[async_trait]
pub trait RenderSurface: Send + Sync {
    /// Attach a live source
    fn attach(&self, source: &LiveSource);

    /// Drop the current source reference
    fn detach(&self);

    /// Reset decoder state
    fn reload(&self);

    /// Currently attached source
    fn bound_source(&self) -> Option<LiveSource>;

    /// Current decode progress
    fn decode_progress(&self) -> DecodeProgress;

    /// Decoded frame dimensions, zero until metadata is loaded
    fn frame_size(&self) -> Resolution;

    /// Playback is paused
    fn is_paused(&self) -> bool;

    /// Start playback
    async fn play(&self) -> Result<(), PlaybackError>;

    /// Pause playback
    fn pause(&self);

    /// Subscribe to loading signals
    fn subscribe(&self) -> broadcast::Receiver<SurfaceSignal>;

    /// Current decoded frame at native resolution
    fn current_frame(&self) -> Option<VideoFrame>;
}

/// Binder timing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BinderConfig {
    /// Hard limit for reaching readiness, in milliseconds
    pub timeout_ms: u64,
    /// Interval between readiness polls, in milliseconds
    pub poll_interval_ms: u64,
}

impl Default for BinderConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 10_000,
            poll_interval_ms: 100,
        }
    }
}

impl BinderConfig {
    /// Validate configuration
    pub fn validate(&self) -> CameraResult<()> {
        if self.timeout_ms == 0 {
            return Err(CameraError::InvalidConfiguration {
                message: "bind timeout must be > 0".to_string(),
            });
        }
        if self.poll_interval_ms == 0 || self.poll_interval_ms > self.timeout_ms {
            return Err(CameraError::InvalidConfiguration {
                message: "poll interval must be > 0 and not exceed the timeout".to_string(),
            });
        }
        Ok(())
    }

    /// Timeout as a duration
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Poll interval as a duration
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Result of a successful bind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BindOutcome {
    /// Decoded frame dimensions
    pub resolution: Resolution,
    /// Decode progress when readiness was declared
    pub progress: DecodeProgress,
    /// Playback was refused; the user has to start it
    pub manual_start_required: bool,
}

/// Readiness predicate
///
/// When autoplay was refused, non-zero dimensions are sufficient.
pub fn is_ready(
    size: Resolution,
    progress: DecodeProgress,
    paused: bool,
    autoplay_blocked: bool,
) -> bool {
    if size.is_empty() {
        return false;
    }
    autoplay_blocked || (progress >= DecodeProgress::HaveCurrentData && !paused)
}

/// Binds live sources to a rendering surface
#[derive(Debug, Clone, Default)]
pub struct SurfaceBinder {
    config: BinderConfig,
}

impl SurfaceBinder {
    /// Create a binder
    pub fn new(config: BinderConfig) -> Self {
        Self { config }
    }

    /// Current configuration
    pub fn config(&self) -> &BinderConfig {
        &self.config
    }

    /// Stop whatever is bound to the surface and reset it
    pub fn release(surface: &dyn RenderSurface) {
        if let Some(previous) = surface.bound_source() {
            previous.stop();
            debug!(source_id = %previous.id(), "Released previous surface source");
        }
        surface.pause();
        surface.detach();
        surface.reload();
    }

    /// Attach `source` and wait until the surface shows a usable frame
    pub async fn bind(
        &self,
        surface: &dyn RenderSurface,
        source: &LiveSource,
    ) -> CameraResult<BindOutcome> {
        if let Some(previous) = surface.bound_source() {
            if previous.id() != source.id() {
                previous.stop();
            }
            surface.detach();
            surface.reload();
        }

        let mut signals = surface.subscribe();
        let mut signals_open = true;
        surface.attach(source);

        let started = Instant::now();
        let deadline = started + self.config.timeout();
        let mut ticker = tokio::time::interval(self.config.poll_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut autoplay_blocked = false;

        loop {
            if surface.is_paused() && !autoplay_blocked {
                match tokio::time::timeout_at(deadline, surface.play()).await {
                    Ok(Ok(())) => debug!("Surface playback started"),
                    Ok(Err(PlaybackError::NotAllowed(reason))) => {
                        warn!(%reason, "Autoplay blocked, manual start required");
                        autoplay_blocked = true;
                    }
                    Ok(Err(PlaybackError::Failed(reason))) => {
                        debug!(%reason, "Playback start failed, retrying on next signal");
                    }
                    Err(_) => {
                        warn!("Surface play() did not settle before the bind deadline");
                        return Err(self.not_ready(surface, started, None));
                    }
                }
            }

            let size = surface.frame_size();
            let progress = surface.decode_progress();
            if is_ready(size, progress, surface.is_paused(), autoplay_blocked) {
                info!(
                    resolution = %size,
                    ?progress,
                    manual_start_required = autoplay_blocked,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Surface ready"
                );
                return Ok(BindOutcome {
                    resolution: size,
                    progress,
                    manual_start_required: autoplay_blocked,
                });
            }

            if Instant::now() >= deadline {
                return Err(self.not_ready(surface, started, None));
            }

            tokio::select! {
                _ = tokio::time::sleep_until(deadline) => {
                    return Err(self.not_ready(surface, started, None));
                }
                signal = signals.recv(), if signals_open => match signal {
                    Ok(SurfaceSignal::Error(message)) => {
                        warn!(%message, "Surface reported an error");
                        return Err(self.not_ready(surface, started, Some(message)));
                    }
                    Ok(signal) => debug!(?signal, "Surface signal"),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!(skipped, "Surface signals lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => signals_open = false,
                },
                _ = ticker.tick() => {}
            }
        }
    }

    fn not_ready(
        &self,
        surface: &dyn RenderSurface,
        started: Instant,
        message: Option<String>,
    ) -> CameraError {
        let size = surface.frame_size();
        let progress = surface.decode_progress();
        let waited = started.elapsed();
        warn!(resolution = %size, ?progress, waited_ms = waited.as_millis() as u64, "Surface not ready");
        CameraError::SurfaceNotReady {
            waited,
            width: size.width,
            height: size.height,
            progress,
            message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_readiness_predicate() {
        let vga = Resolution::VGA;
        let zero = Resolution::new(0, 0);

        assert!(is_ready(vga, DecodeProgress::HaveCurrentData, false, false));
        assert!(!is_ready(vga, DecodeProgress::HaveMetadata, false, false));
        assert!(!is_ready(vga, DecodeProgress::HaveEnoughData, true, false));
        assert!(!is_ready(zero, DecodeProgress::HaveEnoughData, false, false));

        // Autoplay refused: dimensions are enough
        assert!(is_ready(vga, DecodeProgress::HaveMetadata, true, true));
        assert!(!is_ready(zero, DecodeProgress::HaveMetadata, true, true));
    }

    #[test]
    fn test_binder_config_validation() {
        assert!(BinderConfig::default().validate().is_ok());
        assert_eq!(BinderConfig::default().timeout(), Duration::from_secs(10));

        let config = BinderConfig {
            timeout_ms: 100,
            poll_interval_ms: 200,
        };
        assert!(config.validate().is_err());
    }
}
