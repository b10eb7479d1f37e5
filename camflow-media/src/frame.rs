//! Decoded frame representation

use camflow_core::{CameraError, CameraResult, Resolution};
use image::RgbaImage;

/// A decoded video frame in packed RGBA8
#[derive(Debug, Clone, PartialEq)]
pub struct VideoFrame {
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Pixel data, row major, 4 bytes per pixel
    pub data: Vec<u8>,
    /// Timestamp in milliseconds
    pub timestamp: u64,
}

impl VideoFrame {
    /// Wrap RGBA data, checking the buffer length
    pub fn new(width: u32, height: u32, data: Vec<u8>, timestamp: u64) -> CameraResult<Self> {
        let expected = width as usize * height as usize * 4;
        if width == 0 || height == 0 || data.len() != expected {
            return Err(CameraError::SourceNotReady {
                reason: format!(
                    "frame buffer has {} bytes, expected {} for {}x{}",
                    data.len(),
                    expected,
                    width,
                    height
                ),
            });
        }
        Ok(Self {
            width,
            height,
            data,
            timestamp,
        })
    }

    /// Build a frame by evaluating `f` for every pixel
    pub fn from_fn<F>(width: u32, height: u32, timestamp: u64, mut f: F) -> Self
    where
        F: FnMut(u32, u32) -> [u8; 4],
    {
        let mut data = Vec::with_capacity(width as usize * height as usize * 4);
        for y in 0..height {
            for x in 0..width {
                data.extend_from_slice(&f(x, y));
            }
        }
        Self {
            width,
            height,
            data,
            timestamp,
        }
    }

    /// Frame dimensions
    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.width, self.height)
    }

    /// RGBA value at `(x, y)`
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = (y as usize * self.width as usize + x as usize) * 4;
        self.data
            .get(idx..idx + 4)
            .map(|p| [p[0], p[1], p[2], p[3]])
    }

    /// Convert into an image buffer for processing
    pub fn into_image(self) -> CameraResult<RgbaImage> {
        let (width, height) = (self.width, self.height);
        RgbaImage::from_raw(width, height, self.data).ok_or_else(|| CameraError::SourceNotReady {
            reason: format!("frame buffer too small for {width}x{height}"),
        })
    }
}
