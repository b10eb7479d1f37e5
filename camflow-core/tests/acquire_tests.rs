//! Integration tests for the acquisition ladder
//!
//! These tests drive [`StreamAcquirer`] against the mock platform and check
//! profile ordering, failure aggregation and backoff timing.

use camflow_core::*;
use std::sync::Arc;
use std::time::Duration;
use tokio_test::assert_ok;

fn two_cameras() -> Vec<MediaDeviceInfo> {
    vec![
        MediaDeviceInfo::video("front-id", "Front Camera"),
        MediaDeviceInfo::video("rear-id", "Back Camera"),
    ]
}

fn acquirer(platform: &MockPlatform) -> StreamAcquirer {
    StreamAcquirer::new(Arc::new(platform.clone()), AcquireConfig::default())
}

// ============================================================================
// LADDER ORDERING TESTS
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_first_profile_wins_without_trying_others() {
    let platform = MockPlatform::new(two_cameras());

    let source = assert_ok!(acquirer(&platform).acquire(Some("rear-id"), false).await);

    let calls = platform.acquisitions();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].device_id.as_deref(), Some("rear-id"));
    assert_eq!(source.device_id().as_deref(), Some("rear-id"));
    assert_eq!(source.resolution(), Some(Resolution::FULL_HD));
}

#[tokio::test(start_paused = true)]
async fn test_first_succeeding_profile_is_used() {
    // Reject anything that asks for more than VGA
    let platform = MockPlatform::new(two_cameras()).fail_when(|profile| {
        profile
            .ideal
            .filter(|ideal| ideal.pixel_count() > Resolution::VGA.pixel_count())
            .map(|_| MockFailure::Error(PlatformErrorKind::Overconstrained))
    });

    let source = assert_ok!(acquirer(&platform).acquire(Some("front-id"), false).await);

    let calls = platform.acquisitions();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[1].ideal, Some(Resolution::VGA));
    assert_eq!(source.resolution(), Some(Resolution::VGA));
    assert_eq!(platform.live_tracks(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_source_without_video_track_is_a_failure() {
    let platform = MockPlatform::new(two_cameras()).fail_when(|profile| {
        (profile.label == "preferred device").then_some(MockFailure::NoVideoTrack)
    });

    let source = assert_ok!(acquirer(&platform).acquire(Some("front-id"), false).await);

    assert_eq!(platform.acquisitions().len(), 2);
    assert_eq!(source.video_tracks().count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_mobile_prefers_rear_camera_by_facing() {
    let platform = MockPlatform::new(two_cameras());

    let source = assert_ok!(acquirer(&platform).acquire(None, true).await);

    let calls = platform.acquisitions();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].facing, Some(FacingMode::Environment));
    assert_eq!(source.device_id().as_deref(), Some("rear-id"));
    assert_eq!(source.resolution(), Some(Resolution::new(720, 1280)));
}

// ============================================================================
// FAILURE TESTS
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_all_profiles_fail() {
    let platform = MockPlatform::new(two_cameras())
        .fail_when(|_| Some(MockFailure::Error(PlatformErrorKind::DeviceBusy)));

    let error = acquirer(&platform)
        .acquire(Some("front-id"), false)
        .await
        .unwrap_err();

    match error {
        CameraError::AcquisitionFailed { last, attempts } => {
            assert_eq!(last.kind, PlatformErrorKind::DeviceBusy);
            assert_eq!(attempts.len(), 3);
            assert!(attempts[0].profile.starts_with("preferred device"));
            assert!(attempts[2].profile.starts_with("device only"));
        }
        other => panic!("Expected AcquisitionFailed, got {other:?}"),
    }
    assert_eq!(platform.tracks_started(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_permission_denied_stops_the_ladder() {
    let platform =
        MockPlatform::new(two_cameras()).with_permission(PermissionState::Denied);

    let error = acquirer(&platform).acquire(None, true).await.unwrap_err();

    match error {
        CameraError::AcquisitionFailed { last, attempts } => {
            assert_eq!(last.kind, PlatformErrorKind::PermissionDenied);
            assert_eq!(attempts.len(), 1);
        }
        other => panic!("Expected AcquisitionFailed, got {other:?}"),
    }
    assert_eq!(platform.acquisitions().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_backoff_between_attempts() {
    let platform = MockPlatform::new(two_cameras())
        .fail_when(|_| Some(MockFailure::Error(PlatformErrorKind::Overconstrained)));
    let acquirer = acquirer(&platform);

    let started = tokio::time::Instant::now();
    let result = acquirer.acquire(Some("front-id"), false).await;
    let elapsed = started.elapsed();

    assert!(result.is_err());
    // Three attempts, two pauses
    assert!(elapsed >= Duration::from_millis(600));
    assert!(elapsed < Duration::from_millis(900));
}
