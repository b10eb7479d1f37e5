//! Torch and fill-light control

use camflow_core::{
    CameraError, CameraResult, FillLightMode, LightSetting, LiveSource, MediaTrack,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Controls the torch of the active source's video track
#[derive(Debug, Clone, Default)]
pub struct TorchController {
    source_id: Option<String>,
    track: Option<Arc<dyn MediaTrack>>,
    enabled: bool,
}

impl TorchController {
    /// Create an unbound controller
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `source` exposes a torch or a flash fill-light
    pub fn check_support(source: &LiveSource) -> bool {
        source
            .primary_video_track()
            .and_then(|track| track.capabilities())
            .map(|caps| caps.has_torch() || caps.has_flash_fill_light())
            .unwrap_or(false)
    }

    /// Bind to a new source; the torch state resets to off
    pub fn bind(&mut self, source: &LiveSource) {
        self.source_id = Some(source.id().to_string());
        self.track = source.primary_video_track();
        self.enabled = false;
        debug!(source_id = %source.id(), supported = self.is_supported(), "Torch bound");
    }

    /// Forget the current source
    pub fn unbind(&mut self) {
        self.source_id = None;
        self.track = None;
        self.enabled = false;
    }

    /// Id of the bound source
    pub fn source_id(&self) -> Option<&str> {
        self.source_id.as_deref()
    }

    /// Bound track supports light control
    pub fn is_supported(&self) -> bool {
        self.track
            .as_ref()
            .and_then(|track| track.capabilities())
            .map(|caps| caps.has_torch() || caps.has_flash_fill_light())
            .unwrap_or(false)
    }

    /// Torch is currently on
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Flip the torch and return the new state
    ///
    /// State is left unchanged when the track refuses the change.
    pub async fn toggle(&mut self) -> CameraResult<bool> {
        let track = self.track.clone().ok_or(CameraError::TorchUnsupported)?;
        let caps = track.capabilities().ok_or(CameraError::TorchUnsupported)?;
        let target = !self.enabled;

        let setting = if caps.has_torch() {
            LightSetting::Torch(target)
        } else if caps.has_flash_fill_light() {
            LightSetting::FillLight(if target {
                FillLightMode::Flash
            } else {
                FillLightMode::Off
            })
        } else {
            return Err(CameraError::TorchUnsupported);
        };

        if let Err(e) = track.apply_light(setting).await {
            warn!(error = %e, ?setting, "Track rejected light change");
            return Err(CameraError::TorchUnsupported);
        }

        self.enabled = target;
        info!(enabled = target, ?setting, "Torch toggled");
        Ok(target)
    }
}
