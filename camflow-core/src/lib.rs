//! # camflow core
//!
//! Platform capability traits, device discovery and stream acquisition for
//! camera capture orchestration. Hosts implement [`MediaPlatform`]; this crate
//! turns its unreliable primitives into a classified device list and a live
//! source acquired through a constraint ladder.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod acquire;
pub mod device;
pub mod error;
pub mod mock;
pub mod platform;

// Re-export main types
pub use acquire::{build_ladder, AcquireConfig, StreamAcquirer};
pub use device::{
    classify, sort_devices, DeviceClass, DeviceDescriptor, DeviceFacing, DeviceRegistry,
    DeviceTags,
};
pub use error::{AttemptFailure, CameraError, CameraResult, ErrorCategory, ErrorKind};
pub use mock::{MockFailure, MockPlatform, MockTrack};
pub use platform::{
    ConstraintProfile, DecodeProgress, DeviceCapabilities, FacingMode, FillLightMode,
    LightSetting, LiveSource, MediaDeviceInfo, MediaDeviceKind, MediaPlatform, MediaTrack,
    PermissionState, PlatformError, PlatformErrorKind, Resolution, TrackKind, TrackSettings,
    TrackState,
};
