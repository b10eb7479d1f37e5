//! Still capture from a rendering surface

use crate::frame::VideoFrame;
use crate::processing::{self, Adjustments, Filter};
use crate::surface::RenderSurface;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use bytes::Bytes;
use camflow_core::{CameraError, CameraResult, DecodeProgress};
use chrono::{DateTime, Utc};
use image::codecs::jpeg::JpegEncoder;
use image::{Rgb, RgbImage, RgbaImage};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// MIME type of encoded captures
pub const JPEG_MIME: &str = "image/jpeg";

/// Options for a single capture
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureOptions {
    /// Flip horizontally; `None` lets the caller decide (the engine mirrors
    /// front-facing devices)
    pub mirror: Option<bool>,
    /// JPEG quality in (0.0, 1.0]
    pub quality: f32,
    /// Colour adjustments
    pub adjustments: Adjustments,
    /// Filters applied after adjustments, in order
    pub filters: Vec<Filter>,
}

impl Default for CaptureOptions {
    fn default() -> Self {
        Self {
            mirror: None,
            quality: 0.95,
            adjustments: Adjustments::default(),
            filters: Vec::new(),
        }
    }
}

impl CaptureOptions {
    /// Set mirroring explicitly
    pub fn mirrored(mut self, mirror: bool) -> Self {
        self.mirror = Some(mirror);
        self
    }

    /// Append a filter
    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    /// Validate quality, adjustment ranges and filter parameters
    pub fn validate(&self) -> CameraResult<()> {
        if !(self.quality > 0.0 && self.quality <= 1.0) {
            return Err(CameraError::InvalidConfiguration {
                message: format!("quality {} outside (0.0, 1.0]", self.quality),
            });
        }
        self.adjustments.validate()?;
        self.filters.iter().try_for_each(Filter::validate)
    }

    fn jpeg_quality(&self) -> u8 {
        (self.quality * 100.0).round().clamp(1.0, 100.0) as u8
    }
}

/// A processed and encoded still image
#[derive(Debug, Clone)]
pub struct CapturedImage {
    /// Width in pixels
    pub pixel_width: u32,
    /// Height in pixels
    pub pixel_height: u32,
    /// Processed RGBA pixels
    pub buffer: Vec<u8>,
    /// Encoded bytes
    pub encoded: Bytes,
    /// MIME type of `encoded`
    pub mime_type: &'static str,
    /// `data:` URI of the encoded image
    pub data_uri: String,
    /// Capture time
    pub captured_at: DateTime<Utc>,
}

impl CapturedImage {
    /// RGBA value at `(x, y)` in the processed buffer
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.pixel_width || y >= self.pixel_height {
            return None;
        }
        let idx = (y as usize * self.pixel_width as usize + x as usize) * 4;
        self.buffer
            .get(idx..idx + 4)
            .map(|p| [p[0], p[1], p[2], p[3]])
    }

    /// Encoded size in bytes
    pub fn encoded_len(&self) -> usize {
        self.encoded.len()
    }
}

/// Produces still images from a surface's current frame
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameCapturer;

impl FrameCapturer {
    /// Snapshot and process in one step
    pub fn capture(
        surface: &dyn RenderSurface,
        options: &CaptureOptions,
    ) -> CameraResult<CapturedImage> {
        let frame = Self::snapshot(surface)?;
        Self::process(frame, options)
    }

    /// Take the current frame at native resolution
    pub fn snapshot(surface: &dyn RenderSurface) -> CameraResult<VideoFrame> {
        let progress = surface.decode_progress();
        if progress < DecodeProgress::HaveCurrentData {
            return Err(CameraError::SourceNotReady {
                reason: format!("surface decode progress is {progress:?}"),
            });
        }
        surface
            .current_frame()
            .ok_or_else(|| CameraError::SourceNotReady {
                reason: "surface has no decoded frame".to_string(),
            })
    }

    /// Mirror, adjust, filter and encode a frame
    pub fn process(frame: VideoFrame, options: &CaptureOptions) -> CameraResult<CapturedImage> {
        options.validate()?;

        let mut image = frame.into_image()?;
        if options.mirror.unwrap_or(false) {
            processing::mirror(&mut image);
        }
        processing::apply_adjustments(&mut image, &options.adjustments);
        processing::apply_filters(&mut image, &options.filters);

        let encoded = encode_jpeg(&image, options.jpeg_quality())?;
        let data_uri = format!("data:{};base64,{}", JPEG_MIME, STANDARD.encode(&encoded));
        let (pixel_width, pixel_height) = image.dimensions();

        debug!(
            width = pixel_width,
            height = pixel_height,
            bytes = encoded.len(),
            mirrored = options.mirror.unwrap_or(false),
            filters = options.filters.len(),
            "Captured still image"
        );

        Ok(CapturedImage {
            pixel_width,
            pixel_height,
            buffer: image.into_raw(),
            encoded: Bytes::from(encoded),
            mime_type: JPEG_MIME,
            data_uri,
            captured_at: Utc::now(),
        })
    }
}

fn encode_jpeg(image: &RgbaImage, quality: u8) -> CameraResult<Vec<u8>> {
    // JPEG has no alpha channel
    let rgb = RgbImage::from_fn(image.width(), image.height(), |x, y| {
        let p = image.get_pixel(x, y);
        Rgb([p[0], p[1], p[2]])
    });

    let mut encoded = Vec::new();
    JpegEncoder::new_with_quality(&mut encoded, quality)
        .encode_image(&rgb)
        .map_err(|e| CameraError::EncodingFailed {
            format: JPEG_MIME.to_string(),
            reason: e.to_string(),
        })?;
    Ok(encoded)
}
