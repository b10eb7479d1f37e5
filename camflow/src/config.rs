//! Configuration types and defaults

use camflow_core::{AcquireConfig, CameraError, CameraResult};
use camflow_media::{BinderConfig, CaptureOptions};
use serde::{Deserialize, Serialize};

/// Engine configuration
///
/// Durations are stored in milliseconds so the structure round-trips
/// through JSON unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Running on a phone or tablet; selects rear-facing defaults
    pub mobile: bool,
    /// Device to open instead of the first sorted one
    pub preferred_device_id: Option<String>,
    /// Acquisition ladder settings
    pub acquire: AcquireConfig,
    /// Surface binding settings
    pub binder: BinderConfig,
    /// Options used by `capture()` when none are given
    pub capture: CaptureOptions,
    /// Mirror captures from front-facing devices when `mirror` is unset
    pub mirror_front_camera: bool,
    /// Capacity of the event broadcast channel
    pub event_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::desktop()
    }
}

impl EngineConfig {
    /// Desktop defaults: first sorted device, 1920x1080 ideal
    pub fn desktop() -> Self {
        Self {
            mobile: false,
            preferred_device_id: None,
            acquire: AcquireConfig::default(),
            binder: BinderConfig::default(),
            capture: CaptureOptions::default(),
            mirror_front_camera: true,
            event_capacity: 64,
        }
    }

    /// Mobile defaults: rear camera by facing, portrait ideal
    pub fn mobile() -> Self {
        Self {
            mobile: true,
            ..Self::desktop()
        }
    }

    /// Prefer a specific device
    pub fn with_preferred_device(mut self, device_id: impl Into<String>) -> Self {
        self.preferred_device_id = Some(device_id.into());
        self
    }

    /// Parse from JSON and validate
    pub fn from_json(json: &str) -> CameraResult<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| CameraError::InvalidConfiguration {
                message: format!("invalid engine config: {e}"),
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to JSON
    pub fn to_json(&self) -> CameraResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| CameraError::InvalidConfiguration {
            message: e.to_string(),
        })
    }

    /// Validate nested settings
    pub fn validate(&self) -> CameraResult<()> {
        self.acquire.validate()?;
        self.binder.validate()?;
        self.capture.validate()?;
        if self.event_capacity == 0 {
            return Err(CameraError::InvalidConfiguration {
                message: "event capacity must be > 0".to_string(),
            });
        }
        if matches!(self.preferred_device_id.as_deref(), Some("")) {
            return Err(CameraError::InvalidConfiguration {
                message: "preferred device id must not be empty".to_string(),
            });
        }
        Ok(())
    }
}
