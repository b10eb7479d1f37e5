//! Platform capability traits and the live source model
//!
//! The orchestration core never talks to camera hardware directly. Hosts
//! implement [`MediaPlatform`] for permission queries, device enumeration and
//! stream acquisition, and hand back [`LiveSource`] values whose tracks
//! implement [`MediaTrack`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Named failure kinds reported by a platform acquisition call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlatformErrorKind {
    /// The user or OS refused camera access
    PermissionDenied,
    /// The requested device does not exist
    DeviceNotFound,
    /// The device is held by another consumer
    DeviceBusy,
    /// No device satisfies the requested constraints
    Overconstrained,
    /// Anything else
    Other,
}

impl PlatformErrorKind {
    /// Wire name of this error kind
    pub fn as_str(&self) -> &'static str {
        match self {
            PlatformErrorKind::PermissionDenied => "permission-denied",
            PlatformErrorKind::DeviceNotFound => "device-not-found",
            PlatformErrorKind::DeviceBusy => "device-busy",
            PlatformErrorKind::Overconstrained => "overconstrained",
            PlatformErrorKind::Other => "other",
        }
    }
}

/// Structured error returned by platform capabilities
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformError {
    /// Failure kind
    pub kind: PlatformErrorKind,
    /// Platform supplied message
    pub message: String,
}

impl PlatformError {
    /// Create a platform error
    pub fn new(kind: PlatformErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for PlatformError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind.as_str(), self.message)
    }
}

impl std::error::Error for PlatformError {}

/// Result of a permission capability query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionState {
    /// Access was granted earlier
    Granted,
    /// Access was explicitly denied
    Denied,
    /// The platform will prompt on the next acquisition
    Prompt,
    /// The platform has no permission query
    Unknown,
}

/// Kind of media device reported by enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaDeviceKind {
    /// Camera-like input
    VideoInput,
    /// Microphone-like input
    AudioInput,
    /// Speaker-like output
    AudioOutput,
}

/// Raw device entry as reported by the platform
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaDeviceInfo {
    /// Opaque device identifier
    pub device_id: String,
    /// Human readable label, empty until permission is granted on most platforms
    pub label: String,
    /// Device kind
    pub kind: MediaDeviceKind,
}

impl MediaDeviceInfo {
    /// Convenience constructor for a video input entry
    pub fn video(device_id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            label: label.into(),
            kind: MediaDeviceKind::VideoInput,
        }
    }
}

/// Video resolution information
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resolution {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
}

impl Resolution {
    /// Create a resolution
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// 640x480
    pub const VGA: Self = Self::new(640, 480);
    /// 1280x720
    pub const HD: Self = Self::new(1280, 720);
    /// 1920x1080
    pub const FULL_HD: Self = Self::new(1920, 1080);

    /// Same resolution with width and height swapped
    pub const fn rotated(&self) -> Self {
        Self::new(self.height, self.width)
    }

    /// Total pixel count
    pub fn pixel_count(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Both dimensions are non-zero
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Camera facing direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FacingMode {
    /// Towards the user (selfie camera)
    User,
    /// Away from the user (rear camera)
    Environment,
}

/// A ranked acquisition request
///
/// Profiles are immutable; the acquirer builds a fresh ladder for every
/// acquisition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstraintProfile {
    /// Short description used in logs and diagnostics
    pub label: String,
    /// Exact device id to open
    pub device_id: Option<String>,
    /// Preferred facing direction
    pub facing: Option<FacingMode>,
    /// Advisory target resolution
    pub ideal: Option<Resolution>,
}

impl ConstraintProfile {
    /// Least specific profile: any video source at any resolution
    pub fn any_video() -> Self {
        Self {
            label: "any video".to_string(),
            device_id: None,
            facing: None,
            ideal: None,
        }
    }

    /// Exact match on a device id
    pub fn exact_device(device_id: impl Into<String>) -> Self {
        Self {
            label: "exact device".to_string(),
            device_id: Some(device_id.into()),
            facing: None,
            ideal: None,
        }
    }

    /// Facing preference without a device id
    pub fn facing(facing: FacingMode) -> Self {
        Self {
            label: format!("facing {:?}", facing).to_lowercase(),
            device_id: None,
            facing: Some(facing),
            ideal: None,
        }
    }

    /// Attach an advisory resolution
    pub fn with_ideal(mut self, ideal: Resolution) -> Self {
        self.ideal = Some(ideal);
        self
    }

    /// Replace the diagnostic label
    pub fn labeled(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }
}

impl fmt::Display for ConstraintProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label)?;
        if let Some(id) = &self.device_id {
            write!(f, " [device={id}]")?;
        }
        if let Some(facing) = self.facing {
            write!(f, " [facing={facing:?}]")?;
        }
        if let Some(ideal) = self.ideal {
            write!(f, " [ideal={ideal}]")?;
        }
        Ok(())
    }
}

/// Decode progress of a rendering surface, ordered from least to most data
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DecodeProgress {
    /// Nothing decoded yet
    HaveNothing,
    /// Dimensions are known
    HaveMetadata,
    /// The current frame is decoded
    HaveCurrentData,
    /// At least one frame ahead is decoded
    HaveFutureData,
    /// Enough data buffered to play through
    HaveEnoughData,
}

/// Fill light modes a track may advertise
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FillLightMode {
    /// Platform decides
    Auto,
    /// Light off
    Off,
    /// Light on
    Flash,
}

/// Typed capability set of a video track
///
/// Every field is optional: absence means the platform does not report it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceCapabilities {
    /// Continuous torch support
    pub torch: Option<bool>,
    /// Supported fill light modes
    pub fill_light_mode: Option<Vec<FillLightMode>>,
    /// Facing direction of the sensor
    pub facing_mode: Option<FacingMode>,
    /// Largest resolution the sensor produces
    pub max_resolution: Option<Resolution>,
}

impl DeviceCapabilities {
    /// Torch flag is present and set
    pub fn has_torch(&self) -> bool {
        self.torch == Some(true)
    }

    /// Fill light modes include flash
    pub fn has_flash_fill_light(&self) -> bool {
        self.fill_light_mode
            .as_ref()
            .is_some_and(|modes| modes.contains(&FillLightMode::Flash))
    }
}

/// Light constraint applied to a track
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightSetting {
    /// Torch on or off
    Torch(bool),
    /// Fill light mode
    FillLight(FillLightMode),
}

/// Media kind of a track
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackKind {
    /// Video channel
    Video,
    /// Audio channel
    Audio,
}

/// Lifecycle state of a track
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackState {
    /// Producing media
    Live,
    /// Stopped; cannot be restarted
    Ended,
}

/// Current settings of a track
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackSettings {
    /// Device the track was opened from
    pub device_id: Option<String>,
    /// Negotiated resolution
    pub resolution: Option<Resolution>,
    /// Facing direction
    pub facing: Option<FacingMode>,
}

/// A single hardware-backed media channel
#[async_trait]
pub trait MediaTrack: Send + Sync + fmt::Debug {
    /// Track identifier
    fn id(&self) -> &str;

    /// Media kind
    fn kind(&self) -> TrackKind;

    /// Whether the track delivers media
    fn is_enabled(&self) -> bool;

    /// Current lifecycle state
    fn ready_state(&self) -> TrackState;

    /// Negotiated settings
    fn settings(&self) -> TrackSettings;

    /// Capability introspection; `None` when the platform has none
    fn capabilities(&self) -> Option<DeviceCapabilities>;

    /// Stop the track and release the hardware. Must be idempotent.
    fn stop(&self);

    /// Apply a torch or fill light constraint
    async fn apply_light(&self, setting: LightSetting) -> Result<(), PlatformError>;
}

/// An acquired hardware-backed stream handle
///
/// Clones share the same tracks. Whoever holds the source must call
/// [`LiveSource::stop`] before dropping or replacing it, otherwise the device
/// stays busy.
#[derive(Debug, Clone)]
pub struct LiveSource {
    id: String,
    tracks: Vec<Arc<dyn MediaTrack>>,
}

impl LiveSource {
    /// Wrap platform tracks into a source
    pub fn new(id: impl Into<String>, tracks: Vec<Arc<dyn MediaTrack>>) -> Self {
        Self {
            id: id.into(),
            tracks,
        }
    }

    /// Source identifier
    pub fn id(&self) -> &str {
        &self.id
    }

    /// All tracks
    pub fn tracks(&self) -> &[Arc<dyn MediaTrack>] {
        &self.tracks
    }

    /// Video tracks only
    pub fn video_tracks(&self) -> impl Iterator<Item = &Arc<dyn MediaTrack>> {
        self.tracks.iter().filter(|t| t.kind() == TrackKind::Video)
    }

    /// First video track
    pub fn primary_video_track(&self) -> Option<Arc<dyn MediaTrack>> {
        self.video_tracks().next().cloned()
    }

    /// Device id reported by the primary video track
    pub fn device_id(&self) -> Option<String> {
        self.primary_video_track()
            .and_then(|track| track.settings().device_id)
    }

    /// Resolution reported by the primary video track
    pub fn resolution(&self) -> Option<Resolution> {
        self.primary_video_track()
            .and_then(|track| track.settings().resolution)
    }

    /// At least one video track is live
    pub fn is_active(&self) -> bool {
        self.video_tracks()
            .any(|track| track.ready_state() == TrackState::Live)
    }

    /// Stop every track
    pub fn stop(&self) {
        for track in &self.tracks {
            track.stop();
        }
        debug!(source_id = %self.id, tracks = self.tracks.len(), "Stopped live source");
    }
}

/// Host-provided camera capabilities
#[async_trait]
pub trait MediaPlatform: Send + Sync {
    /// Device enumeration is available
    fn supports_enumeration(&self) -> bool;

    /// Stream acquisition is available
    fn supports_acquisition(&self) -> bool;

    /// Query the camera permission without prompting
    async fn query_permission(&self) -> PermissionState;

    /// List media devices; an empty list is valid
    async fn enumerate_devices(&self) -> Result<Vec<MediaDeviceInfo>, PlatformError>;

    /// Acquire a live source matching the profile
    async fn acquire(&self, profile: &ConstraintProfile) -> Result<LiveSource, PlatformError>;
}
