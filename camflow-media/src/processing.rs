//! Pixel processing for still captures
//!
//! Adjustments run first in a fixed order (brightness, contrast, saturation)
//! and touch only the colour channels. Named filters follow in request order.

use camflow_core::{CameraError, CameraResult};
use image::{imageops, RgbaImage};
use serde::{Deserialize, Serialize};

/// Linear colour adjustments
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Adjustments {
    /// Offset added to each channel, as a fraction of full scale (-1.0..=1.0)
    pub brightness: f32,
    /// Contrast multiplier around mid-grey (1.0 = unchanged)
    pub contrast: f32,
    /// Saturation multiplier around luminance (1.0 = unchanged)
    pub saturation: f32,
}

impl Default for Adjustments {
    fn default() -> Self {
        Self {
            brightness: 0.0,
            contrast: 1.0,
            saturation: 1.0,
        }
    }
}

impl Adjustments {
    /// No adjustment would change a pixel
    pub fn is_identity(&self) -> bool {
        self.brightness == 0.0 && self.contrast == 1.0 && self.saturation == 1.0
    }

    /// Validate ranges
    pub fn validate(&self) -> CameraResult<()> {
        if !(-1.0..=1.0).contains(&self.brightness) {
            return Err(CameraError::InvalidConfiguration {
                message: format!("brightness {} outside -1.0..=1.0", self.brightness),
            });
        }
        if !self.contrast.is_finite() || self.contrast < 0.0 {
            return Err(CameraError::InvalidConfiguration {
                message: format!("contrast {} must be >= 0", self.contrast),
            });
        }
        if !self.saturation.is_finite() || self.saturation < 0.0 {
            return Err(CameraError::InvalidConfiguration {
                message: format!("saturation {} must be >= 0", self.saturation),
            });
        }
        Ok(())
    }
}

/// Named post-processing filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Filter {
    /// Luminance only
    Grayscale,
    /// Warm brown tone
    Sepia,
    /// Negative
    Invert,
    /// Box blur with the given radius in pixels
    BoxBlur {
        /// Blur radius; 0 is a no-op
        radius: u32,
    },
}

/// Largest accepted box blur radius in pixels
pub const MAX_BLUR_RADIUS: u32 = 64;

impl Filter {
    /// Reject parameters outside the supported range
    pub fn validate(&self) -> CameraResult<()> {
        match self {
            Filter::BoxBlur { radius } if *radius > MAX_BLUR_RADIUS => {
                Err(CameraError::InvalidConfiguration {
                    message: format!("blur radius {radius} exceeds {MAX_BLUR_RADIUS}"),
                })
            }
            _ => Ok(()),
        }
    }
}

fn luminance(r: f32, g: f32, b: f32) -> f32 {
    0.299 * r + 0.587 * g + 0.114 * b
}

/// Flip horizontally
pub fn mirror(image: &mut RgbaImage) {
    imageops::flip_horizontal_in_place(image);
}

/// Apply brightness, contrast and saturation, leaving alpha as is
pub fn apply_adjustments(image: &mut RgbaImage, adjustments: &Adjustments) {
    if adjustments.is_identity() {
        return;
    }

    let offset = adjustments.brightness * 255.0;
    for pixel in image.pixels_mut() {
        let mut rgb = [pixel[0] as f32, pixel[1] as f32, pixel[2] as f32];

        for c in rgb.iter_mut() {
            *c = (*c + offset).clamp(0.0, 255.0);
        }
        for c in rgb.iter_mut() {
            *c = ((*c - 128.0) * adjustments.contrast + 128.0).clamp(0.0, 255.0);
        }
        if adjustments.saturation != 1.0 {
            let gray = luminance(rgb[0], rgb[1], rgb[2]);
            for c in rgb.iter_mut() {
                *c = (gray + (*c - gray) * adjustments.saturation).clamp(0.0, 255.0);
            }
        }

        pixel[0] = rgb[0].round() as u8;
        pixel[1] = rgb[1].round() as u8;
        pixel[2] = rgb[2].round() as u8;
    }
}

/// Apply a single filter in place
pub fn apply_filter(image: &mut RgbaImage, filter: Filter) {
    match filter {
        Filter::Grayscale => {
            for pixel in image.pixels_mut() {
                let gray = luminance(pixel[0] as f32, pixel[1] as f32, pixel[2] as f32)
                    .round()
                    .clamp(0.0, 255.0) as u8;
                pixel[0] = gray;
                pixel[1] = gray;
                pixel[2] = gray;
            }
        }
        Filter::Sepia => {
            for pixel in image.pixels_mut() {
                let (r, g, b) = (pixel[0] as f32, pixel[1] as f32, pixel[2] as f32);
                pixel[0] = (0.393 * r + 0.769 * g + 0.189 * b).round().min(255.0) as u8;
                pixel[1] = (0.349 * r + 0.686 * g + 0.168 * b).round().min(255.0) as u8;
                pixel[2] = (0.272 * r + 0.534 * g + 0.131 * b).round().min(255.0) as u8;
            }
        }
        Filter::Invert => {
            for pixel in image.pixels_mut() {
                pixel[0] = 255 - pixel[0];
                pixel[1] = 255 - pixel[1];
                pixel[2] = 255 - pixel[2];
            }
        }
        Filter::BoxBlur { radius } => box_blur(image, radius),
    }
}

/// Apply filters in order
pub fn apply_filters(image: &mut RgbaImage, filters: &[Filter]) {
    for filter in filters {
        apply_filter(image, *filter);
    }
}

/// Separable box blur over the colour channels, edges clamped
///
/// Running sums keep the cost independent of the radius. The radius is
/// capped at [`MAX_BLUR_RADIUS`].
fn box_blur(image: &mut RgbaImage, radius: u32) {
    let (width, height) = image.dimensions();
    let radius = radius.min(MAX_BLUR_RADIUS) as usize;
    if radius == 0 || width == 0 || height == 0 {
        return;
    }

    let mut line = Vec::with_capacity(width.max(height) as usize);
    let mut blurred = Vec::with_capacity(width.max(height) as usize);

    for y in 0..height {
        line.clear();
        line.extend((0..width).map(|x| rgb(image.get_pixel(x, y).0)));
        blur_line(&line, radius, &mut blurred);
        for (x, value) in blurred.iter().enumerate() {
            image.get_pixel_mut(x as u32, y).0[..3].copy_from_slice(value);
        }
    }

    for x in 0..width {
        line.clear();
        line.extend((0..height).map(|y| rgb(image.get_pixel(x, y).0)));
        blur_line(&line, radius, &mut blurred);
        for (y, value) in blurred.iter().enumerate() {
            image.get_pixel_mut(x, y as u32).0[..3].copy_from_slice(value);
        }
    }
}

fn rgb(pixel: [u8; 4]) -> [u8; 3] {
    [pixel[0], pixel[1], pixel[2]]
}

/// One sliding-window pass; indices past either end repeat the edge value
fn blur_line(line: &[[u8; 3]], radius: usize, out: &mut Vec<[u8; 3]>) {
    let last = line.len() as isize - 1;
    let at = |i: isize| line[i.clamp(0, last) as usize];
    let window = (2 * radius + 1) as u32;
    let radius = radius as isize;

    let mut sum = [0u32; 3];
    for i in -radius..=radius {
        for (total, value) in sum.iter_mut().zip(at(i)) {
            *total += value as u32;
        }
    }

    out.clear();
    for i in 0..line.len() as isize {
        out.push(sum.map(|total| ((total + window / 2) / window) as u8));
        let incoming = at(i + radius + 1);
        let outgoing = at(i - radius);
        for c in 0..3 {
            sum[c] = sum[c] + incoming[c] as u32 - outgoing[c] as u32;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn solid(width: u32, height: u32, rgba: [u8; 4]) -> RgbaImage {
        RgbaImage::from_pixel(width, height, Rgba(rgba))
    }

    #[test]
    fn test_identity_adjustments_leave_pixels() {
        let mut image = solid(2, 2, [10, 20, 30, 40]);
        apply_adjustments(&mut image, &Adjustments::default());
        assert_eq!(image.get_pixel(0, 0).0, [10, 20, 30, 40]);
    }

    #[test]
    fn test_brightness_preserves_alpha() {
        let mut image = solid(1, 1, [100, 100, 100, 7]);
        let adjustments = Adjustments {
            brightness: 0.2,
            ..Default::default()
        };
        apply_adjustments(&mut image, &adjustments);
        assert_eq!(image.get_pixel(0, 0).0, [151, 151, 151, 7]);
    }

    #[test]
    fn test_zero_saturation_is_gray() {
        let mut image = solid(1, 1, [200, 50, 10, 255]);
        let adjustments = Adjustments {
            saturation: 0.0,
            ..Default::default()
        };
        apply_adjustments(&mut image, &adjustments);
        let p = image.get_pixel(0, 0).0;
        assert_eq!(p[0], p[1]);
        assert_eq!(p[1], p[2]);
    }

    #[test]
    fn test_invert_and_grayscale() {
        let mut image = solid(1, 1, [0, 128, 255, 255]);
        apply_filter(&mut image, Filter::Invert);
        assert_eq!(image.get_pixel(0, 0).0, [255, 127, 0, 255]);

        apply_filter(&mut image, Filter::Grayscale);
        let p = image.get_pixel(0, 0).0;
        assert_eq!(p[0], p[2]);
    }

    #[test]
    fn test_box_blur_smooths_edge() {
        let mut image = solid(3, 1, [0, 0, 0, 255]);
        image.put_pixel(1, 0, Rgba([255, 255, 255, 255]));

        apply_filter(&mut image, Filter::BoxBlur { radius: 1 });

        assert_eq!(image.get_pixel(0, 0).0, [85, 85, 85, 255]);
        assert_eq!(image.get_pixel(1, 0).0, [85, 85, 85, 255]);
    }

    #[test]
    fn test_box_blur_large_radius_averages_whole_image() {
        let mut image = solid(4, 4, [0, 0, 0, 200]);
        image.put_pixel(0, 0, Rgba([255, 255, 255, 200]));

        apply_filter(&mut image, Filter::BoxBlur { radius: MAX_BLUR_RADIUS });

        // Edge clamping weights the corner heavily, but every pixel blurs
        let corner = image.get_pixel(0, 0).0;
        let far = image.get_pixel(3, 3).0;
        assert!(corner[0] > far[0]);
        assert!(far[0] > 0);
        assert_eq!(far[3], 200);
    }

    #[test]
    fn test_blur_radius_validation() {
        assert!(Filter::BoxBlur { radius: MAX_BLUR_RADIUS }.validate().is_ok());
        assert!(matches!(
            Filter::BoxBlur { radius: u32::MAX }.validate(),
            Err(CameraError::InvalidConfiguration { .. })
        ));
        assert!(Filter::Sepia.validate().is_ok());
    }

    #[test]
    fn test_mirror_flips_columns() {
        let mut image = solid(2, 1, [0, 0, 0, 255]);
        image.put_pixel(0, 0, Rgba([9, 9, 9, 255]));
        mirror(&mut image);
        assert_eq!(image.get_pixel(1, 0).0, [9, 9, 9, 255]);
    }

    #[test]
    fn test_adjustment_validation() {
        assert!(Adjustments::default().validate().is_ok());
        let bad = Adjustments {
            brightness: 2.0,
            ..Default::default()
        };
        assert!(bad.validate().is_err());
    }
}
