//! # camflow media
//!
//! Everything between a live source and a still image: binding sources to a
//! rendering surface, frame snapshots, pixel processing, JPEG encoding and
//! torch control.

#![warn(clippy::all)]

pub mod capturer;
pub mod frame;
pub mod mock;
pub mod processing;
pub mod surface;
pub mod torch;

pub use capturer::{CaptureOptions, CapturedImage, FrameCapturer, JPEG_MIME};
pub use frame::VideoFrame;
pub use mock::{MockSurface, SurfaceBehavior};
pub use processing::{Adjustments, Filter, MAX_BLUR_RADIUS};
pub use surface::{
    is_ready, BindOutcome, BinderConfig, PlaybackError, RenderSurface, SurfaceBinder,
    SurfaceSignal,
};
pub use torch::TorchController;
