//! Integration tests for the capture engine lifecycle
//!
//! Every test runs against the mock platform and surface with paused time,
//! so backoff and bind timeouts are deterministic.

use camflow::*;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_test::assert_ok;

fn two_cameras() -> Vec<MediaDeviceInfo> {
    vec![
        MediaDeviceInfo::video("cam-a", "Integrated Camera"),
        MediaDeviceInfo::video("cam-b", "HD Pro Webcam C920"),
    ]
}

fn engine(platform: &MockPlatform, surface: &MockSurface) -> CaptureEngine {
    engine_with(platform, surface, EngineConfig::desktop())
}

fn engine_with(platform: &MockPlatform, surface: &MockSurface, config: EngineConfig) -> CaptureEngine {
    CaptureEngine::new(
        Arc::new(platform.clone()),
        Arc::new(surface.clone()),
        config,
    )
    .unwrap()
}

fn vga_only(platform: MockPlatform, device_id: &str) -> MockPlatform {
    platform.with_capabilities(
        device_id,
        DeviceCapabilities {
            max_resolution: Some(Resolution::VGA),
            ..Default::default()
        },
    )
}

// ============================================================================
// OPEN / CLOSE TESTS
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_open_reaches_ready() {
    let platform = MockPlatform::new(vec![
        MediaDeviceInfo::video("obs", "OBS Virtual Camera"),
        MediaDeviceInfo::video("laptop", "Integrated Camera"),
    ]);
    let surface = MockSurface::new();
    let engine = engine(&platform, &surface);
    let mut events = engine.events();

    assert_eq!(engine.phase(), CapturePhase::Idle);
    assert_ok!(engine.open().await);

    assert_eq!(engine.phase(), CapturePhase::Ready);
    assert_eq!(engine.active_device().unwrap().id, "laptop");
    assert_eq!(platform.live_tracks(), 1);

    // Probe first, then the desktop ladder on the first sorted device
    let calls = platform.acquisitions();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].label, "any video");
    assert_eq!(calls[1].device_id.as_deref(), Some("laptop"));
    assert_eq!(calls[1].ideal, Some(Resolution::FULL_HD));

    let received = events.drain();
    assert!(received.iter().any(|e| matches!(
        e,
        CameraEvent::Ready {
            manual_start_required: false,
            ..
        }
    )));
    assert!(received
        .iter()
        .any(|e| matches!(e, CameraEvent::DevicesChanged { devices } if devices.len() == 2)));
}

#[tokio::test(start_paused = true)]
async fn test_open_when_ready_is_a_no_op() {
    let platform = MockPlatform::single_camera();
    let surface = MockSurface::new();
    let engine = engine(&platform, &surface);

    assert_ok!(engine.open().await);
    assert_ok!(engine.open().await);

    assert_eq!(platform.acquisitions().len(), 2);
    assert_eq!(surface.attaches(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_open_close_open_leaves_one_source() {
    let platform = MockPlatform::new(two_cameras());
    let surface = MockSurface::new();
    let engine = engine(&platform, &surface);

    assert_ok!(engine.open().await);
    engine.close();
    assert_ok!(engine.open().await);

    assert_eq!(engine.phase(), CapturePhase::Ready);
    assert_eq!(platform.live_tracks(), 1);

    engine.close();
    assert_eq!(platform.tracks_started(), platform.tracks_stopped());
    assert!(surface.bound_source().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_close_is_idempotent() {
    let platform = MockPlatform::single_camera();
    let surface = MockSurface::new();
    let engine = engine(&platform, &surface);

    engine.close();
    assert_eq!(engine.phase(), CapturePhase::Closed);

    assert_ok!(engine.open().await);
    engine.close();
    engine.close();

    assert_eq!(engine.phase(), CapturePhase::Closed);
    assert_eq!(platform.live_tracks(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_label_refresh_after_grant() {
    // The probe fails softly, so labels stay hidden until the real stream starts
    let platform = MockPlatform::new(vec![
        MediaDeviceInfo::video("a", "Front Camera"),
        MediaDeviceInfo::video("b", "Back Camera"),
    ])
    .with_hidden_labels()
    .with_permission(PermissionState::Prompt)
    .fail_when(|profile| {
        (profile.label == "any video")
            .then_some(MockFailure::Error(PlatformErrorKind::Overconstrained))
    });
    let surface = MockSurface::new();
    let engine = engine(&platform, &surface);

    assert_ok!(engine.open().await);

    assert_eq!(platform.enumerations(), 2);
    let devices = engine.devices();
    assert_eq!(devices[0].label, "Front Camera");
    assert!(devices[0].is_front_facing());
    assert_eq!(engine.active_device().unwrap().display_name(), "Front Camera");
}

// ============================================================================
// FAILURE TESTS
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_no_video_devices() {
    let platform = MockPlatform::new(vec![MediaDeviceInfo {
        device_id: "mic".to_string(),
        label: "Microphone".to_string(),
        kind: MediaDeviceKind::AudioInput,
    }]);
    let surface = MockSurface::new();
    let engine = engine(&platform, &surface);
    let mut events = engine.events().filtered(EventFilter::errors_only());

    let error = engine.open().await.unwrap_err();

    assert_eq!(error.kind(), ErrorKind::NoDeviceFound);
    assert!(!error.is_recoverable());
    assert_eq!(engine.phase(), CapturePhase::Error);
    // The probe finds no video input, so enumeration is never reached
    assert_eq!(platform.enumerations(), 0);
    assert_eq!(platform.acquisitions().len(), 1);
    assert!(matches!(
        events.try_next(),
        Some(CameraEvent::Error {
            kind: ErrorKind::NoDeviceFound,
            ..
        })
    ));
}

#[tokio::test(start_paused = true)]
async fn test_empty_enumeration_skips_acquisition() {
    let platform = MockPlatform::single_camera().with_empty_enumeration();
    let surface = MockSurface::new();
    let engine = engine(&platform, &surface);

    let error = engine.open().await.unwrap_err();

    assert_eq!(error.kind(), ErrorKind::NoDeviceFound);
    assert_eq!(engine.phase(), CapturePhase::Error);
    assert_eq!(platform.enumerations(), 1);
    // Only the permission check's throwaway stream, stopped right away
    let calls = platform.acquisitions();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0], ConstraintProfile::any_video());
    assert_eq!(platform.live_tracks(), 0);
    assert_eq!(surface.attaches(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_permission_denied_is_terminal() {
    let platform = MockPlatform::single_camera().with_permission(PermissionState::Denied);
    let surface = MockSurface::new();
    let engine = engine(&platform, &surface);

    let error = engine.open().await.unwrap_err();

    assert_eq!(error.kind(), ErrorKind::PermissionDenied);
    assert_eq!(engine.last_error(), Some(error));
    assert!(platform.acquisitions().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_unsupported_platform() {
    let platform = MockPlatform::single_camera().unsupported();
    let surface = MockSurface::new();
    let engine = engine(&platform, &surface);

    let error = engine.open().await.unwrap_err();
    assert_eq!(error.kind(), ErrorKind::UnsupportedPlatform);
}

#[tokio::test(start_paused = true)]
async fn test_ladder_ending_in_not_found_is_no_device() {
    let platform = MockPlatform::new(two_cameras()).fail_when(|profile| {
        profile
            .device_id
            .is_some()
            .then_some(MockFailure::Error(PlatformErrorKind::DeviceNotFound))
    });
    let surface = MockSurface::new();
    let engine = engine(&platform, &surface);

    let error = engine.open().await.unwrap_err();

    assert_eq!(error.kind(), ErrorKind::NoDeviceFound);
    assert_eq!(platform.live_tracks(), 0);
    // Each ladder step is still listed on the terminal error
    match error {
        CameraError::NoDeviceFound { detail } => {
            assert!(detail.contains("after 3 attempt(s)"));
            assert!(detail.contains("preferred device"));
            assert!(detail.contains("reduced resolution"));
            assert!(detail.contains("device only"));
        }
        other => panic!("Expected NoDeviceFound, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_busy_device_reports_acquisition_failure() {
    let platform = MockPlatform::new(two_cameras()).fail_device("cam-a", PlatformErrorKind::DeviceBusy);
    let surface = MockSurface::new();
    let engine = engine(&platform, &surface);
    let mut events = engine.events();

    let error = engine.open().await.unwrap_err();

    match &error {
        CameraError::AcquisitionFailed { attempts, .. } => assert_eq!(attempts.len(), 3),
        other => panic!("Expected AcquisitionFailed, got {other:?}"),
    }
    assert!(error.is_recoverable());
    let statuses: Vec<String> = events
        .drain()
        .into_iter()
        .filter_map(|e| match e {
            CameraEvent::Status { message, busy: false } => Some(message),
            _ => None,
        })
        .collect();
    assert!(statuses
        .iter()
        .any(|m| m.contains("Close other applications")));
}

#[tokio::test(start_paused = true)]
async fn test_bind_timeout_releases_and_allows_reopen() {
    let platform = MockPlatform::single_camera();
    let surface = MockSurface::never_ready();
    let engine = engine(&platform, &surface);

    let started = Instant::now();
    let error = engine.open().await.unwrap_err();
    let elapsed = started.elapsed();

    assert_eq!(error.kind(), ErrorKind::SurfaceNotReady);
    assert!(elapsed >= Duration::from_secs(10));
    assert!(elapsed < Duration::from_secs(11));
    assert_eq!(engine.phase(), CapturePhase::Error);
    assert_eq!(platform.live_tracks(), 0);

    surface.set_behavior(SurfaceBehavior::default());
    assert_ok!(engine.open().await);
    assert_eq!(engine.phase(), CapturePhase::Ready);
    assert!(engine.last_error().is_none());
}

// ============================================================================
// CONCURRENCY TESTS
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_concurrent_open_waits_for_first() {
    let platform = MockPlatform::single_camera().with_acquire_delay(Duration::from_secs(1));
    let surface = MockSurface::new();
    let engine = engine(&platform, &surface);

    let first = tokio::spawn({
        let engine = engine.clone();
        async move { engine.open().await }
    });
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(engine.phase(), CapturePhase::Initializing);

    assert_ok!(engine.open().await);
    assert_ok!(first.await.unwrap());

    // Probe plus a single ladder step
    assert_eq!(platform.acquisitions().len(), 2);
    assert_eq!(platform.live_tracks(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_open_gives_up_after_bind_timeout() {
    let platform = MockPlatform::single_camera().with_acquire_delay(Duration::from_secs(30));
    let surface = MockSurface::new();
    let engine = engine(&platform, &surface);

    let first = tokio::spawn({
        let engine = engine.clone();
        async move { engine.open().await }
    });
    tokio::time::sleep(Duration::from_millis(10)).await;

    let error = engine.open().await.unwrap_err();
    match error {
        CameraError::AlreadyInitializing { waited } => {
            assert!(waited >= Duration::from_secs(10));
        }
        other => panic!("Expected AlreadyInitializing, got {other:?}"),
    }

    engine.close();
    let error = first.await.unwrap().unwrap_err();
    assert_eq!(error.kind(), ErrorKind::InvalidState);
    assert_eq!(platform.live_tracks(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_close_during_bind_cancels_open() {
    let platform = MockPlatform::single_camera();
    let surface = MockSurface::never_ready();
    let engine = engine(&platform, &surface);

    let pending = tokio::spawn({
        let engine = engine.clone();
        async move { engine.open().await }
    });
    tokio::time::sleep(Duration::from_secs(2)).await;
    engine.close();

    let started = Instant::now();
    let error = pending.await.unwrap().unwrap_err();
    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(error.kind(), ErrorKind::InvalidState);
    assert_eq!(engine.phase(), CapturePhase::Closed);
    assert_eq!(platform.live_tracks(), 0);

    surface.set_behavior(SurfaceBehavior::default());
    assert_ok!(engine.open().await);
    assert_eq!(platform.live_tracks(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_close_during_acquisition_stops_late_source() {
    let platform = MockPlatform::single_camera().with_acquire_delay(Duration::from_secs(5));
    let surface = MockSurface::new();
    let engine = engine(&platform, &surface);

    let pending = tokio::spawn({
        let engine = engine.clone();
        async move { engine.open().await }
    });
    // Past the probe, inside the ladder request
    tokio::time::sleep(Duration::from_secs(6)).await;
    assert_eq!(platform.acquisitions().len(), 2);
    engine.close();

    let error = pending.await.unwrap().unwrap_err();
    assert_eq!(error.kind(), ErrorKind::InvalidState);
    assert_eq!(platform.live_tracks(), 0);
    assert_eq!(platform.tracks_started(), 2);
    assert_eq!(platform.tracks_started(), platform.tracks_stopped());
    assert_eq!(surface.attaches(), 0);
}

// ============================================================================
// CAPTURE TESTS
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_capture_mirror_at_vga() {
    let platform = vga_only(MockPlatform::single_camera(), "mock-camera-0");
    let surface = MockSurface::new();
    let engine = engine(&platform, &surface);
    let mut events = engine.events().filtered(EventFilter::specific_types(&["photo_captured"]));

    assert_ok!(engine.open().await);
    let image = assert_ok!(
        engine
            .capture_with(CaptureOptions::default().mirrored(true))
            .await
    );

    assert_eq!((image.pixel_width, image.pixel_height), (640, 480));
    for (x, y) in [(0, 0), (10, 20), (639, 479)] {
        let source_x = 639 - x;
        assert_eq!(
            image.pixel(x, y),
            Some([source_x as u8, y as u8, ((source_x + y) % 256) as u8, 255])
        );
    }
    assert_eq!(engine.phase(), CapturePhase::Ready);
    assert!(matches!(
        events.try_next(),
        Some(CameraEvent::PhotoCaptured { .. })
    ));
}

#[tokio::test(start_paused = true)]
async fn test_front_camera_mirrors_by_default() {
    let platform = vga_only(
        MockPlatform::new(vec![MediaDeviceInfo::video("selfie", "Front Camera")]),
        "selfie",
    );
    let surface = MockSurface::new();
    let engine = engine(&platform, &surface);
    assert_ok!(engine.open().await);

    let image = assert_ok!(engine.capture().await);
    assert_eq!(image.pixel(0, 0), Some([127, 0, 127, 255]));

    let unmirrored = assert_ok!(
        engine
            .capture_with(CaptureOptions::default().mirrored(false))
            .await
    );
    assert_eq!(unmirrored.pixel(0, 0), Some([0, 0, 0, 255]));
}

#[tokio::test(start_paused = true)]
async fn test_capture_requires_ready() {
    let platform = MockPlatform::single_camera();
    let surface = MockSurface::new();
    let engine = engine(&platform, &surface);

    let error = engine.capture().await.unwrap_err();
    assert_eq!(error.kind(), ErrorKind::SourceNotReady);

    assert_ok!(engine.open().await);
    engine.close();
    let error = engine.capture().await.unwrap_err();
    assert_eq!(error.kind(), ErrorKind::SourceNotReady);
}

// ============================================================================
// TORCH TESTS
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_torch_unsupported_leaves_state() {
    let platform = MockPlatform::single_camera();
    let surface = MockSurface::new();
    let engine = engine(&platform, &surface);
    assert_ok!(engine.open().await);

    assert!(!engine.torch_supported());
    let error = engine.toggle_torch().await.unwrap_err();

    assert_eq!(error, CameraError::TorchUnsupported);
    assert!(!engine.torch_enabled());
    assert_eq!(engine.phase(), CapturePhase::Ready);
}

#[tokio::test(start_paused = true)]
async fn test_torch_toggle_emits_event() {
    let platform = MockPlatform::single_camera().with_capabilities(
        "mock-camera-0",
        DeviceCapabilities {
            torch: Some(true),
            ..Default::default()
        },
    );
    let surface = MockSurface::new();
    let engine = engine(&platform, &surface);
    let mut events = engine.events().filtered(EventFilter::specific_types(&["torch_changed"]));
    assert_ok!(engine.open().await);

    assert!(engine.torch_supported());
    assert!(assert_ok!(engine.toggle_torch().await));
    assert!(engine.torch_enabled());
    assert!(matches!(
        events.try_next(),
        Some(CameraEvent::TorchChanged { enabled: true })
    ));
}

// ============================================================================
// SWITCHING TESTS
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_switch_to_next_camera() {
    let platform = MockPlatform::new(two_cameras());
    let surface = MockSurface::new();
    let engine = engine(&platform, &surface);
    assert_ok!(engine.open().await);
    let first = engine.active_source().unwrap();

    assert_ok!(engine.switch_device(None).await);

    assert_eq!(engine.active_device().unwrap().id, "cam-b");
    assert!(!first.is_active());
    assert_eq!(platform.live_tracks(), 1);

    // Wraps around
    assert_ok!(engine.switch_device(None).await);
    assert_eq!(engine.active_device().unwrap().id, "cam-a");
}

#[tokio::test(start_paused = true)]
async fn test_switch_rotation_with_single_camera_stays() {
    let platform = MockPlatform::single_camera();
    let surface = MockSurface::new();
    let engine = engine(&platform, &surface);
    assert_ok!(engine.open().await);
    let calls = platform.acquisitions().len();

    assert_ok!(engine.switch_device(None).await);

    assert_eq!(platform.acquisitions().len(), calls);
    assert_eq!(engine.active_device().unwrap().id, "mock-camera-0");
    assert_eq!(engine.phase(), CapturePhase::Ready);
}

#[tokio::test(start_paused = true)]
async fn test_switch_to_current_or_unknown_device() {
    let platform = MockPlatform::new(two_cameras());
    let surface = MockSurface::new();
    let engine = engine(&platform, &surface);
    assert_ok!(engine.open().await);
    let calls = platform.acquisitions().len();

    assert_ok!(engine.switch_device(Some("cam-a")).await);
    assert_eq!(platform.acquisitions().len(), calls);

    let error = engine.switch_device(Some("missing")).await.unwrap_err();
    assert_eq!(error.kind(), ErrorKind::NoDeviceFound);
    assert_eq!(engine.phase(), CapturePhase::Ready);
}

#[tokio::test(start_paused = true)]
async fn test_switch_requires_ready() {
    let platform = MockPlatform::new(two_cameras());
    let surface = MockSurface::new();
    let engine = engine(&platform, &surface);

    let error = engine.switch_device(None).await.unwrap_err();
    assert_eq!(error.kind(), ErrorKind::InvalidState);
}

#[tokio::test(start_paused = true)]
async fn test_failed_switch_restores_previous_device() {
    let platform = MockPlatform::new(two_cameras()).fail_device("cam-b", PlatformErrorKind::DeviceBusy);
    let surface = MockSurface::new();
    let engine = engine(&platform, &surface);
    assert_ok!(engine.open().await);

    let error = engine.switch_device(Some("cam-b")).await.unwrap_err();

    assert_eq!(error.kind(), ErrorKind::AcquisitionFailed);
    assert_eq!(engine.phase(), CapturePhase::Ready);
    assert_eq!(engine.active_device().unwrap().id, "cam-a");
    assert_eq!(platform.live_tracks(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_failed_switch_and_restore_enters_error() {
    let broken = Arc::new(AtomicBool::new(false));
    let platform = MockPlatform::new(two_cameras()).fail_when({
        let broken = broken.clone();
        move |_| {
            broken
                .load(Ordering::SeqCst)
                .then_some(MockFailure::Error(PlatformErrorKind::DeviceBusy))
        }
    });
    let surface = MockSurface::new();
    let engine = engine(&platform, &surface);
    assert_ok!(engine.open().await);

    broken.store(true, Ordering::SeqCst);
    let error = engine.switch_device(None).await.unwrap_err();

    assert_eq!(error.kind(), ErrorKind::AcquisitionFailed);
    assert_eq!(engine.phase(), CapturePhase::Error);
    assert_eq!(platform.live_tracks(), 0);
}

// ============================================================================
// PLAYBACK TESTS
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_autoplay_blocked_needs_manual_start() {
    let platform = MockPlatform::single_camera();
    let surface = MockSurface::autoplay_blocked();
    let engine = engine(&platform, &surface);

    assert_ok!(engine.open().await);
    assert!(engine.manual_start_required());

    let error = engine.resume_playback().await.unwrap_err();
    assert_eq!(error.kind(), ErrorKind::SourceNotReady);

    surface.set_behavior(SurfaceBehavior::default());
    assert_ok!(engine.resume_playback().await);
    assert!(!engine.manual_start_required());
    assert!(!surface.is_paused());
}

#[tokio::test(start_paused = true)]
async fn test_retake_reacquires_ended_source() {
    let platform = MockPlatform::single_camera();
    let surface = MockSurface::new();
    let engine = engine(&platform, &surface);
    assert_ok!(engine.open().await);

    // Healthy source: nothing to do
    assert_ok!(engine.retake().await);
    let calls = platform.acquisitions().len();

    let source = engine.active_source().unwrap();
    source.stop();
    assert_ok!(engine.retake().await);

    assert_eq!(engine.phase(), CapturePhase::Ready);
    assert!(platform.acquisitions().len() > calls);
    assert!(engine.active_source().unwrap().is_active());
    assert_eq!(platform.live_tracks(), 1);
}

// ============================================================================
// OBSERVER TESTS
// ============================================================================

#[derive(Default)]
struct Recorder {
    ready: Mutex<Vec<Option<String>>>,
    statuses: Mutex<Vec<(String, bool)>>,
    errors: Mutex<Vec<ErrorKind>>,
}

impl CaptureObserver for Recorder {
    fn on_ready(&self, device_id: Option<&str>) {
        self.ready.lock().push(device_id.map(str::to_string));
    }

    fn on_error(&self, kind: ErrorKind, _message: &str) {
        self.errors.lock().push(kind);
    }

    fn on_status(&self, message: &str, busy: bool) {
        self.statuses.lock().push((message.to_string(), busy));
    }
}

#[tokio::test(start_paused = true)]
async fn test_observer_callbacks() {
    let platform = MockPlatform::single_camera();
    let surface = MockSurface::new();
    let engine = engine(&platform, &surface);
    let recorder = Arc::new(Recorder::default());
    engine.add_observer(recorder.clone());

    assert_ok!(engine.open().await);
    let _ = engine.toggle_torch().await;

    assert_eq!(
        *recorder.ready.lock(),
        vec![Some("mock-camera-0".to_string())]
    );
    assert_eq!(*recorder.errors.lock(), vec![ErrorKind::TorchUnsupported]);

    let statuses = recorder.statuses.lock();
    assert!(statuses.first().unwrap().1);
    assert!(statuses.iter().any(|(m, busy)| m == "Camera ready" && !busy));
}

#[tokio::test]
async fn test_invalid_config_is_rejected() {
    let platform = MockPlatform::single_camera();
    let mut config = EngineConfig::desktop();
    config.binder.timeout_ms = 0;

    let result = CaptureEngine::new(
        Arc::new(platform),
        Arc::new(MockSurface::new()),
        config,
    );
    assert!(matches!(
        result,
        Err(CameraError::InvalidConfiguration { .. })
    ));
}
