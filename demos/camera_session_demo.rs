//! Camera Session Demo - A full session against the mock platform
//!
//! Opens the first camera, captures a mirrored selfie, switches to the rear
//! camera, turns the torch on, captures again and closes.
//!
//! Run with `RUST_LOG=debug` to see the acquisition ladder at work.

use camflow::{
    CameraEvent, CaptureEngine, CaptureOptions, DebugLogger, DeviceCapabilities, EngineConfig,
    Filter, MediaDeviceInfo, MockFailure, MockPlatform, MockSurface, PlatformErrorKind, Resolution,
};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    DebugLogger::init_logging();

    println!("📷 Camera Session Demo");
    println!("======================");

    // A laptop with a front camera, a rear camera that rejects 1080p and a
    // virtual camera that should sort last
    let platform = MockPlatform::new(vec![
        MediaDeviceInfo::video("virtual-0", "OBS Virtual Camera"),
        MediaDeviceInfo::video("front-0", "FaceTime HD Camera"),
        MediaDeviceInfo::video("rear-0", "Back Camera"),
    ])
    .with_capabilities(
        "rear-0",
        DeviceCapabilities {
            torch: Some(true),
            max_resolution: Some(Resolution::HD),
            ..Default::default()
        },
    )
    .fail_when(|profile| {
        (profile.device_id.as_deref() == Some("rear-0")
            && profile.ideal == Some(Resolution::FULL_HD))
        .then_some(MockFailure::Error(PlatformErrorKind::Overconstrained))
    });

    let engine = CaptureEngine::new(
        Arc::new(platform.clone()),
        Arc::new(MockSurface::new()),
        EngineConfig::desktop(),
    )?;

    let mut events = engine.events();
    let printer = tokio::spawn(async move {
        while let Some(event) = events.next().await {
            match event {
                CameraEvent::Status { message, busy } => {
                    println!("  {} {}", if busy { "⏳" } else { "ℹ️ " }, message);
                }
                CameraEvent::Ready {
                    device_id,
                    resolution,
                    ..
                } => println!("  ✅ Ready on {:?} at {}", device_id, resolution),
                CameraEvent::Error { kind, message, .. } => {
                    println!("  ❌ {}: {}", kind, message)
                }
                CameraEvent::TorchChanged { enabled } => println!("  🔦 Torch {}", enabled),
                _ => {}
            }
        }
    });

    println!("\n🚀 Opening camera...");
    engine.open().await?;

    println!("\n📹 Cameras:");
    for (i, device) in engine.devices().iter().enumerate() {
        println!(
            "  {}. {} ({:?}, {:?})",
            i + 1,
            device.display_name(),
            device.class,
            device.facing
        );
    }

    let selfie = engine.capture().await?;
    println!(
        "\n🤳 Selfie: {}x{}, {} bytes of JPEG",
        selfie.pixel_width,
        selfie.pixel_height,
        selfie.encoded_len()
    );

    println!("\n🔄 Switching camera...");
    engine.switch_device(None).await?;
    if engine.torch_supported() {
        engine.toggle_torch().await?;
    }

    let photo = engine
        .capture_with(CaptureOptions::default().with_filter(Filter::Sepia))
        .await?;
    println!(
        "\n🖼️  Sepia photo: {}x{}, data URI of {} chars",
        photo.pixel_width,
        photo.pixel_height,
        photo.data_uri.len()
    );

    engine.close();
    drop(engine);
    printer.await?;

    println!(
        "\n🧹 Tracks started: {}, stopped: {}",
        platform.tracks_started(),
        platform.tracks_stopped()
    );
    Ok(())
}
