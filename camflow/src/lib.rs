//! # camflow - Camera Sessions That Survive Real Hardware
//!
//! camflow opens a camera, keeps a live preview bound to a rendering surface
//! and captures processed still images. Real devices reject constraints,
//! hide their labels until permission is granted and take an unpredictable
//! time to produce a first frame; the engine absorbs that with a constraint
//! fallback ladder, a bounded bind wait and a generation-checked state
//! machine.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use camflow::{CaptureEngine, EngineConfig, MockPlatform, MockSurface};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let engine = CaptureEngine::new(
//!         Arc::new(MockPlatform::single_camera()),
//!         Arc::new(MockSurface::new()),
//!         EngineConfig::desktop(),
//!     )?;
//!
//!     engine.open().await?;
//!     let photo = engine.capture().await?;
//!     println!("{}x{} photo", photo.pixel_width, photo.pixel_height);
//!
//!     engine.close();
//!     Ok(())
//! }
//! ```

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod engine;
pub mod event;

pub use config::EngineConfig;
pub use engine::{CaptureEngine, CapturePhase};
pub use event::{notify, CameraEvent, CaptureObserver, EventFilter, EventStream};

// Re-export core types for easy access
pub use camflow_core::{
    AcquireConfig, CameraError, CameraResult, ConstraintProfile, DecodeProgress,
    DeviceCapabilities, DeviceClass, DeviceDescriptor, DeviceFacing, ErrorCategory, ErrorKind,
    FacingMode, FillLightMode, LiveSource, MediaDeviceInfo, MediaDeviceKind, MediaPlatform,
    MediaTrack, MockFailure, MockPlatform, PermissionState, PlatformError, PlatformErrorKind,
    Resolution,
};

pub use camflow_media::{
    Adjustments, BindOutcome, BinderConfig, CaptureOptions, CapturedImage, Filter, MockSurface,
    PlaybackError, RenderSurface, SurfaceBehavior, SurfaceSignal, VideoFrame,
};

pub use camflow_diagnostics::{AcquisitionReport, DebugLogger};
