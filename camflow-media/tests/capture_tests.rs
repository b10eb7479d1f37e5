//! Integration tests for still capture
//!
//! Frames come from the mock surface's test pattern, so expected pixels can
//! be computed from coordinates.

use camflow_core::*;
use camflow_media::*;
use tokio_test::assert_ok;

fn pattern(x: u32, y: u32) -> [u8; 4] {
    [(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8, 255]
}

async fn bound_surface(platform: &MockPlatform) -> (MockSurface, LiveSource) {
    let surface = MockSurface::new();
    let source = platform
        .acquire(&ConstraintProfile::any_video())
        .await
        .unwrap();
    assert_ok!(SurfaceBinder::default().bind(&surface, &source).await);
    (surface, source)
}

#[tokio::test(start_paused = true)]
async fn test_capture_native_resolution() {
    let platform = MockPlatform::single_camera().with_default_resolution(Resolution::HD);
    let (surface, _source) = bound_surface(&platform).await;

    let image = assert_ok!(FrameCapturer::capture(&surface, &CaptureOptions::default()));

    assert_eq!((image.pixel_width, image.pixel_height), (1280, 720));
    assert_eq!(image.pixel(17, 3), Some(pattern(17, 3)));
}

#[tokio::test(start_paused = true)]
async fn test_capture_mirror_flips_horizontally() {
    let platform = MockPlatform::single_camera();
    let (surface, _source) = bound_surface(&platform).await;

    let options = CaptureOptions::default().mirrored(true);
    let image = assert_ok!(FrameCapturer::capture(&surface, &options));

    assert_eq!((image.pixel_width, image.pixel_height), (640, 480));
    assert_eq!(image.buffer.len(), 640 * 480 * 4);
    for (x, y) in [(0, 0), (1, 5), (100, 200), (639, 479)] {
        assert_eq!(image.pixel(x, y), Some(pattern(639 - x, y)));
    }
}

#[tokio::test(start_paused = true)]
async fn test_capture_adjustments_then_filters() {
    let platform = MockPlatform::single_camera();
    let (surface, _source) = bound_surface(&platform).await;

    let options = CaptureOptions {
        adjustments: Adjustments {
            brightness: 1.0,
            ..Default::default()
        },
        filters: vec![Filter::Invert],
        ..Default::default()
    };
    let image = assert_ok!(FrameCapturer::capture(&surface, &options));

    // Full brightness saturates every channel, invert then zeroes them
    assert_eq!(image.pixel(10, 10), Some([0, 0, 0, 255]));
}

#[tokio::test(start_paused = true)]
async fn test_capture_before_data_is_not_ready() {
    let platform = MockPlatform::single_camera();
    let surface = MockSurface::never_ready();
    let source = platform
        .acquire(&ConstraintProfile::any_video())
        .await
        .unwrap();
    surface.attach(&source);

    let error = FrameCapturer::capture(&surface, &CaptureOptions::default()).unwrap_err();
    assert_eq!(error.kind(), ErrorKind::SourceNotReady);
}

#[tokio::test(start_paused = true)]
async fn test_capture_data_uri_is_jpeg() {
    let platform = MockPlatform::single_camera();
    let (surface, _source) = bound_surface(&platform).await;

    let options = CaptureOptions {
        quality: 0.5,
        ..Default::default()
    };
    let image = assert_ok!(FrameCapturer::capture(&surface, &options));

    assert_eq!(image.mime_type, JPEG_MIME);
    let payload = image
        .data_uri
        .strip_prefix("data:image/jpeg;base64,")
        .unwrap();
    assert!(!payload.is_empty());
    assert!(image.encoded_len() > 0);
}

#[tokio::test(start_paused = true)]
async fn test_capture_rejects_oversized_blur() {
    let platform = MockPlatform::single_camera();
    let (surface, _source) = bound_surface(&platform).await;

    let options = CaptureOptions::default().with_filter(Filter::BoxBlur { radius: u32::MAX });
    let error = FrameCapturer::capture(&surface, &options).unwrap_err();

    assert!(matches!(error, CameraError::InvalidConfiguration { .. }));
}

#[tokio::test(start_paused = true)]
async fn test_capture_max_blur_at_hd() {
    let platform = MockPlatform::single_camera().with_default_resolution(Resolution::HD);
    let (surface, _source) = bound_surface(&platform).await;

    let options = CaptureOptions::default().with_filter(Filter::BoxBlur {
        radius: MAX_BLUR_RADIUS,
    });
    let image = assert_ok!(FrameCapturer::capture(&surface, &options));

    assert_eq!((image.pixel_width, image.pixel_height), (1280, 720));
    let corner = image.pixel(0, 0).unwrap();
    assert_ne!(corner, pattern(0, 0));
    assert_eq!(corner[3], 255);
}
