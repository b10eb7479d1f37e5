//! Video input discovery and classification
//!
//! [`DeviceRegistry`] wraps a [`MediaPlatform`] to check support, force the
//! permission prompt, and produce a deterministically ordered device list.

use crate::error::{CameraError, CameraResult};
use crate::platform::{
    ConstraintProfile, MediaDeviceKind, MediaPlatform, PermissionState, PlatformErrorKind,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Label tokens of cameras facing the user
const FRONT_TOKENS: &[&str] = &["front", "user", "facetime", "selfie", "facing front"];

/// Label tokens of cameras facing away from the user
const BACK_TOKENS: &[&str] = &["back", "rear", "environment", "world"];

/// Label tokens of cameras built into the host
const BUILT_IN_TOKENS: &[&str] = &[
    "integrated",
    "built-in",
    "builtin",
    "internal",
    "facetime",
    "front",
    "back",
    "rear",
];

/// Label tokens of software cameras
const VIRTUAL_TOKENS: &[&str] = &[
    "virtual",
    "obs",
    "snap camera",
    "manycam",
    "xsplit",
    "droidcam",
    "epoccam",
    "ndi webcam",
    "v4l2loopback",
    "dummy",
    "camo",
];

/// Facing direction derived from a device label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceFacing {
    /// Towards the user
    Front,
    /// Away from the user
    Back,
    /// Label carries no hint
    Unknown,
}

/// Sort class of a device, in preference order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DeviceClass {
    /// Integrated or built-in sensor
    BuiltIn,
    /// No hint either way
    Unclassified,
    /// Software or virtual camera
    Virtual,
}

/// Best-effort tags derived from a device label
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceTags {
    /// Facing direction
    pub facing: DeviceFacing,
    /// Sort class
    pub class: DeviceClass,
}

/// Classify a device by its label
///
/// Pure and total: an empty or unknown label yields `Unknown`/`Unclassified`.
pub fn classify(label: &str) -> DeviceTags {
    let label = label.to_lowercase();
    let matches = |tokens: &[&str]| tokens.iter().any(|token| contains_token(&label, token));

    let facing = if matches(FRONT_TOKENS) {
        DeviceFacing::Front
    } else if matches(BACK_TOKENS) {
        DeviceFacing::Back
    } else {
        DeviceFacing::Unknown
    };

    // Virtual wins over built-in so "OBS Virtual Camera (front)" stays last
    let class = if matches(VIRTUAL_TOKENS) {
        DeviceClass::Virtual
    } else if matches(BUILT_IN_TOKENS) {
        DeviceClass::BuiltIn
    } else {
        DeviceClass::Unclassified
    };

    DeviceTags { facing, class }
}

/// Tokens shorter than this only match whole words
const SHORT_TOKEN_LEN: usize = 5;

fn contains_token(label: &str, token: &str) -> bool {
    if token.len() >= SHORT_TOKEN_LEN {
        return label.contains(token);
    }
    label.match_indices(token).any(|(start, _)| {
        let before = label[..start].chars().next_back();
        let after = label[start + token.len()..].chars().next();
        !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
    })
}

/// A classified video input device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceDescriptor {
    /// Opaque device identifier
    pub id: String,
    /// Advisory label, may be empty before permission grant
    pub label: String,
    /// Always [`MediaDeviceKind::VideoInput`]
    pub kind: MediaDeviceKind,
    /// Derived facing direction
    pub facing: DeviceFacing,
    /// Derived sort class
    pub class: DeviceClass,
}

impl DeviceDescriptor {
    /// Build a descriptor and classify its label
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        let label = label.into();
        let tags = classify(&label);
        Self {
            id: id.into(),
            label,
            kind: MediaDeviceKind::VideoInput,
            facing: tags.facing,
            class: tags.class,
        }
    }

    /// Camera points at the user
    pub fn is_front_facing(&self) -> bool {
        self.facing == DeviceFacing::Front
    }

    /// Label or a placeholder for redacted devices
    pub fn display_name(&self) -> &str {
        if self.label.is_empty() {
            "Camera"
        } else {
            &self.label
        }
    }
}

/// Order devices built-in first, virtual last; stable within a class
pub fn sort_devices(devices: &mut [DeviceDescriptor]) {
    devices.sort_by_key(|device| device.class);
}

/// Registry of available video inputs
pub struct DeviceRegistry {
    platform: Arc<dyn MediaPlatform>,
    devices: Vec<DeviceDescriptor>,
    active_device_id: Option<String>,
    labels_redacted: bool,
}

impl DeviceRegistry {
    /// Create a registry over a platform
    pub fn new(platform: Arc<dyn MediaPlatform>) -> Self {
        Self {
            platform,
            devices: Vec::new(),
            active_device_id: None,
            labels_redacted: false,
        }
    }

    /// Fail with [`CameraError::UnsupportedPlatform`] if a capability is missing
    pub fn check_support(&self) -> CameraResult<()> {
        if !self.platform.supports_enumeration() {
            return Err(CameraError::UnsupportedPlatform {
                reason: "device enumeration is not available".to_string(),
            });
        }
        if !self.platform.supports_acquisition() {
            return Err(CameraError::UnsupportedPlatform {
                reason: "stream acquisition is not available".to_string(),
            });
        }
        Ok(())
    }

    /// Force the platform permission prompt with a throwaway acquisition
    ///
    /// The probe's tracks are stopped before returning.
    pub async fn request_permission(&self) -> CameraResult<()> {
        let state = self.platform.query_permission().await;
        debug!(?state, "Camera permission state");
        if state == PermissionState::Denied {
            return Err(CameraError::PermissionDenied {
                reason: "camera access is blocked for this application".to_string(),
            });
        }

        match self.platform.acquire(&ConstraintProfile::any_video()).await {
            Ok(probe) => {
                probe.stop();
                info!("Camera permission granted");
                Ok(())
            }
            Err(e) => match e.kind {
                PlatformErrorKind::PermissionDenied => Err(CameraError::PermissionDenied {
                    reason: e.message,
                }),
                PlatformErrorKind::DeviceNotFound => Err(CameraError::NoDeviceFound {
                    detail: e.message,
                }),
                _ => {
                    warn!(error = %e, "Permission probe failed, continuing with enumeration");
                    Ok(())
                }
            },
        }
    }

    /// Enumerate, classify and sort video inputs
    ///
    /// The previous list is replaced, never merged.
    pub async fn enumerate(&mut self) -> CameraResult<&[DeviceDescriptor]> {
        let raw = self
            .platform
            .enumerate_devices()
            .await
            .map_err(|e| CameraError::DeviceEnumerationFailed {
                reason: e.to_string(),
            })?;

        let mut devices: Vec<DeviceDescriptor> = raw
            .into_iter()
            .filter(|info| info.kind == MediaDeviceKind::VideoInput)
            .map(|info| DeviceDescriptor::new(info.device_id, info.label))
            .collect();

        if devices.is_empty() {
            self.devices.clear();
            return Err(CameraError::NoDeviceFound {
                detail: "no video input devices reported".to_string(),
            });
        }

        sort_devices(&mut devices);
        self.labels_redacted = devices.iter().any(|device| device.label.is_empty());
        info!(
            count = devices.len(),
            labels_redacted = self.labels_redacted,
            "Enumerated cameras"
        );
        for device in &devices {
            debug!(id = %device.id, label = %device.label, class = ?device.class, facing = ?device.facing, "Camera");
        }
        self.devices = devices;

        Ok(&self.devices)
    }

    /// Re-enumerate once if the last listing had redacted labels
    ///
    /// Returns `true` when a refresh happened. Failures keep the previous list.
    pub async fn refresh_after_grant(&mut self) -> bool {
        if !self.labels_redacted {
            return false;
        }
        match self.enumerate().await {
            Ok(_) => true,
            Err(e) => {
                warn!(error = %e, "Label refresh failed, keeping previous device list");
                false
            }
        }
    }

    /// Last enumerated devices in preference order
    pub fn devices(&self) -> &[DeviceDescriptor] {
        &self.devices
    }

    /// Look up a device by id
    pub fn find(&self, id: &str) -> Option<&DeviceDescriptor> {
        self.devices.iter().find(|device| device.id == id)
    }

    /// Whether the last listing had empty labels
    pub fn labels_redacted(&self) -> bool {
        self.labels_redacted
    }

    /// Currently active device id
    pub fn active_device_id(&self) -> Option<&str> {
        self.active_device_id.as_deref()
    }

    /// Active device descriptor, if it is still listed
    pub fn active_device(&self) -> Option<&DeviceDescriptor> {
        self.active_device_id.as_deref().and_then(|id| self.find(id))
    }

    /// Record the active device
    pub fn set_active(&mut self, id: Option<String>) {
        self.active_device_id = id;
    }

    /// Device after `current` in list order, wrapping around
    pub fn next_in_rotation(&self, current: Option<&str>) -> Option<&DeviceDescriptor> {
        let position = current.and_then(|id| self.devices.iter().position(|d| d.id == id));
        match position {
            Some(index) => self.devices.get((index + 1) % self.devices.len()),
            None => self.devices.first(),
        }
    }
}
