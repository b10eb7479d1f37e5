//! Capture engine: the camera session state machine
//!
//! The engine owns one live source at a time and drives it through
//! `Idle -> Initializing -> Ready -> (Capturing | Switching) -> Closed`, with
//! `Error` reachable from any non-terminal phase.
//!
//! Session state lives behind a `parking_lot::Mutex` that is never held
//! across an `.await`. Every long operation records the session generation
//! when it starts and re-checks it after each suspension point; `close()`
//! bumps the generation, so stale operations release what they acquired and
//! fail with `InvalidState` instead of resurrecting a closed session.

use crate::config::EngineConfig;
use crate::event::{notify, CameraEvent, CaptureObserver, EventStream};
use camflow_core::{
    CameraError, CameraResult, DeviceDescriptor, DeviceRegistry, LiveSource, MediaPlatform,
    PlatformErrorKind, StreamAcquirer,
};
use camflow_diagnostics::{user_message, AcquisitionReport};
use camflow_media::{
    BindOutcome, CaptureOptions, CapturedImage, FrameCapturer, PlaybackError, RenderSurface,
    SurfaceBinder, TorchController, JPEG_MIME,
};
use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Engine lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CapturePhase {
    /// Never opened
    Idle,
    /// `open()` in progress
    Initializing,
    /// Preview is live
    Ready,
    /// A still capture is being processed
    Capturing,
    /// Moving to another device
    Switching,
    /// Last operation failed; `open()` may be called again
    Error,
    /// Released by `close()`
    Closed,
}

impl fmt::Display for CapturePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CapturePhase::Idle => "idle",
            CapturePhase::Initializing => "initializing",
            CapturePhase::Ready => "ready",
            CapturePhase::Capturing => "capturing",
            CapturePhase::Switching => "switching",
            CapturePhase::Error => "error",
            CapturePhase::Closed => "closed",
        };
        f.write_str(name)
    }
}

#[derive(Debug)]
struct Session {
    phase: CapturePhase,
    generation: u64,
    source: Option<LiveSource>,
    device_id: Option<String>,
    cameras: Vec<DeviceDescriptor>,
    last_error: Option<CameraError>,
    /// Failures since the last `Ready`
    retry_count: u32,
    torch: TorchController,
    manual_start_required: bool,
}

struct Inner {
    id: String,
    config: EngineConfig,
    surface: Arc<dyn RenderSurface>,
    registry: tokio::sync::Mutex<DeviceRegistry>,
    acquirer: StreamAcquirer,
    binder: SurfaceBinder,
    session: Mutex<Session>,
    phase_tx: watch::Sender<CapturePhase>,
    /// Highest generation cancelled by `close()`
    cancel_tx: watch::Sender<u64>,
    events: broadcast::Sender<CameraEvent>,
    observers: RwLock<Vec<Arc<dyn CaptureObserver>>>,
}

/// Camera session engine
///
/// Cheap to clone; clones share the same session.
#[derive(Clone)]
pub struct CaptureEngine {
    inner: Arc<Inner>,
}

impl fmt::Debug for CaptureEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CaptureEngine")
            .field("id", &self.inner.id)
            .field("phase", &self.phase())
            .finish()
    }
}

/// Resolves once `close()` cancels `generation`
async fn cancelled(mut rx: watch::Receiver<u64>, generation: u64) {
    loop {
        let latest = *rx.borrow_and_update();
        if latest >= generation {
            return;
        }
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Map a failed ladder onto the terminal error kinds
fn reclassify(error: CameraError) -> CameraError {
    let CameraError::AcquisitionFailed { last, attempts } = &error else {
        return error;
    };
    // Keep the per-attempt trail on the terminal error
    let trail = || {
        let steps: Vec<String> = attempts.iter().map(ToString::to_string).collect();
        format!(
            "{} after {} attempt(s) [{}]",
            last.message,
            attempts.len(),
            steps.join("; ")
        )
    };
    let reclassified = match last.kind {
        PlatformErrorKind::PermissionDenied => {
            Some(CameraError::PermissionDenied { reason: trail() })
        }
        PlatformErrorKind::DeviceNotFound => Some(CameraError::NoDeviceFound { detail: trail() }),
        _ => None,
    };
    reclassified.unwrap_or(error)
}

impl CaptureEngine {
    /// Create an engine; nothing is acquired until [`open`](Self::open)
    pub fn new(
        platform: Arc<dyn MediaPlatform>,
        surface: Arc<dyn RenderSurface>,
        config: EngineConfig,
    ) -> CameraResult<Self> {
        config.validate()?;

        let (phase_tx, _) = watch::channel(CapturePhase::Idle);
        let (cancel_tx, _) = watch::channel(0u64);
        let (events, _) = broadcast::channel(config.event_capacity);
        let id = Uuid::new_v4().to_string();
        info!(engine_id = %id, mobile = config.mobile, "Creating capture engine");

        Ok(Self {
            inner: Arc::new(Inner {
                id,
                registry: tokio::sync::Mutex::new(DeviceRegistry::new(platform.clone())),
                acquirer: StreamAcquirer::new(platform, config.acquire.clone()),
                binder: SurfaceBinder::new(config.binder.clone()),
                surface,
                session: Mutex::new(Session {
                    phase: CapturePhase::Idle,
                    generation: 0,
                    source: None,
                    device_id: None,
                    cameras: Vec::new(),
                    last_error: None,
                    retry_count: 0,
                    torch: TorchController::new(),
                    manual_start_required: false,
                }),
                phase_tx,
                cancel_tx,
                events,
                observers: RwLock::new(Vec::new()),
                config,
            }),
        })
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// Engine instance id
    pub fn id(&self) -> &str {
        &self.inner.id
    }

    /// Active configuration
    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    /// Current phase
    pub fn phase(&self) -> CapturePhase {
        self.inner.session.lock().phase
    }

    /// Watch phase changes
    pub fn phase_watch(&self) -> watch::Receiver<CapturePhase> {
        self.inner.phase_tx.subscribe()
    }

    /// Subscribe to engine events
    pub fn events(&self) -> EventStream {
        EventStream::new(self.inner.events.subscribe())
    }

    /// Register a callback observer
    pub fn add_observer(&self, observer: Arc<dyn CaptureObserver>) {
        self.inner.observers.write().push(observer);
    }

    /// Last enumerated cameras in preference order
    pub fn devices(&self) -> Vec<DeviceDescriptor> {
        self.inner.session.lock().cameras.clone()
    }

    /// Descriptor of the device the current source came from
    pub fn active_device(&self) -> Option<DeviceDescriptor> {
        let session = self.inner.session.lock();
        let id = session.device_id.as_deref()?;
        session.cameras.iter().find(|d| d.id == id).cloned()
    }

    /// The live source currently shown
    pub fn active_source(&self) -> Option<LiveSource> {
        self.inner.session.lock().source.clone()
    }

    /// Error that put the engine into [`CapturePhase::Error`]
    pub fn last_error(&self) -> Option<CameraError> {
        self.inner.session.lock().last_error.clone()
    }

    /// Failed attempts since the session was last `Ready`
    pub fn retry_count(&self) -> u32 {
        self.inner.session.lock().retry_count
    }

    /// Playback is waiting for a user gesture
    pub fn manual_start_required(&self) -> bool {
        self.inner.session.lock().manual_start_required
    }

    /// Active source supports torch or flash fill-light
    pub fn torch_supported(&self) -> bool {
        self.inner.session.lock().torch.is_supported()
    }

    /// Torch is on
    pub fn torch_enabled(&self) -> bool {
        self.inner.session.lock().torch.is_enabled()
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Open the camera and bind it to the surface
    ///
    /// Returns immediately when already `Ready` with a live source. A call
    /// made while another `open()` is initializing waits for that result for
    /// up to the bind timeout.
    pub async fn open(&self) -> CameraResult<()> {
        enum Entry {
            AlreadyOpen,
            Wait,
            Start(u64, Option<LiveSource>),
        }

        let entry = {
            let mut session = self.inner.session.lock();
            let phase = session.phase;
            match phase {
                CapturePhase::Ready
                    if session.source.as_ref().is_some_and(|s| s.is_active()) =>
                {
                    Entry::AlreadyOpen
                }
                CapturePhase::Initializing => Entry::Wait,
                CapturePhase::Switching | CapturePhase::Capturing => {
                    return Err(CameraError::invalid_state("open", phase));
                }
                _ => {
                    session.generation += 1;
                    session.last_error = None;
                    session.manual_start_required = false;
                    session.torch.unbind();
                    self.set_phase_locked(&mut session, CapturePhase::Initializing);
                    Entry::Start(session.generation, session.source.take())
                }
            }
        };

        let (generation, stale) = match entry {
            Entry::AlreadyOpen => {
                debug!("Camera already open");
                return Ok(());
            }
            Entry::Wait => return self.wait_for_open().await,
            Entry::Start(generation, stale) => (generation, stale),
        };
        self.emit(CameraEvent::PhaseChanged {
            phase: CapturePhase::Initializing,
        });
        if let Some(stale) = stale {
            debug!(source_id = %stale.id(), "Releasing stale source");
            stale.stop();
        }

        info!(engine_id = %self.inner.id, generation, "Opening camera");
        match self.initialize(generation).await {
            Ok(()) => Ok(()),
            Err(e) => Err(self.fail(generation, "open", e)),
        }
    }

    async fn wait_for_open(&self) -> CameraResult<()> {
        let mut rx = self.inner.phase_tx.subscribe();
        let started = Instant::now();
        let limit = self.inner.config.binder.timeout();
        debug!("Waiting for in-flight open");

        let settled = tokio::time::timeout(limit, async {
            loop {
                let phase = *rx.borrow_and_update();
                if phase != CapturePhase::Initializing {
                    return phase;
                }
                if rx.changed().await.is_err() {
                    return phase;
                }
            }
        })
        .await;

        match settled {
            Ok(CapturePhase::Ready) => Ok(()),
            Ok(CapturePhase::Error) => Err(self
                .last_error()
                .unwrap_or_else(|| CameraError::invalid_state("open", CapturePhase::Error))),
            Ok(phase) => Err(CameraError::invalid_state("open", phase)),
            Err(_) => Err(CameraError::AlreadyInitializing {
                waited: started.elapsed(),
            }),
        }
    }

    async fn initialize(&self, generation: u64) -> CameraResult<()> {
        self.status("Starting camera", true);
        self.inner.registry.lock().await.check_support()?;

        self.status("Requesting camera access", true);
        self.inner.registry.lock().await.request_permission().await?;
        self.ensure_current(generation, "open")?;

        self.status("Looking for cameras", true);
        let devices = {
            let mut registry = self.inner.registry.lock().await;
            registry.enumerate().await?.to_vec()
        };
        self.ensure_current(generation, "open")?;
        self.update_cameras(generation, devices.clone());

        let preferred = self.preferred_device(&devices);
        self.start_device(generation, preferred.as_deref(), "open")
            .await
    }

    fn preferred_device(&self, devices: &[DeviceDescriptor]) -> Option<String> {
        if let Some(id) = &self.inner.config.preferred_device_id {
            if devices.iter().any(|d| &d.id == id) {
                return Some(id.clone());
            }
            warn!(device_id = %id, "Configured camera not found, using defaults");
        }
        if self.inner.config.mobile {
            None
        } else {
            devices.first().map(|d| d.id.clone())
        }
    }

    /// Acquire, bind and publish `Ready` for one device
    async fn start_device(
        &self,
        generation: u64,
        device_id: Option<&str>,
        operation: &str,
    ) -> CameraResult<()> {
        let name = device_id
            .and_then(|id| {
                let session = self.inner.session.lock();
                session
                    .cameras
                    .iter()
                    .find(|d| d.id == id)
                    .map(|d| d.display_name().to_string())
            })
            .unwrap_or_else(|| "camera".to_string());
        self.status(&format!("Opening {name}"), true);

        let source = self
            .inner
            .acquirer
            .acquire(device_id, self.inner.config.mobile)
            .await
            .map_err(|e| {
                if let Some(report) = AcquisitionReport::from_error(&e) {
                    report.log();
                }
                reclassify(e)
            })?;
        self.register_source(generation, &source, operation)?;

        let refreshed = {
            let mut registry = self.inner.registry.lock().await;
            if registry.refresh_after_grant().await {
                Some(registry.devices().to_vec())
            } else {
                None
            }
        };
        if let Some(devices) = refreshed {
            self.update_cameras(generation, devices);
        }

        self.status("Starting preview", true);
        let outcome = match self.bind_source(generation, &source).await {
            Ok(outcome) => outcome,
            Err(e) => {
                self.discard_source(generation, &source);
                return Err(e);
            }
        };
        self.ensure_current(generation, operation)?;
        self.finish_ready(generation, &source, outcome, operation)
            .await
    }

    async fn bind_source(&self, generation: u64, source: &LiveSource) -> CameraResult<BindOutcome> {
        let cancel = self.inner.cancel_tx.subscribe();
        tokio::select! {
            result = self.inner.binder.bind(self.inner.surface.as_ref(), source) => result,
            _ = cancelled(cancel, generation) => {
                debug!(generation, "Bind cancelled by close");
                Err(CameraError::invalid_state("bind", CapturePhase::Closed))
            }
        }
    }

    async fn finish_ready(
        &self,
        generation: u64,
        source: &LiveSource,
        outcome: BindOutcome,
        operation: &str,
    ) -> CameraResult<()> {
        let device_id = source.device_id();
        self.inner
            .registry
            .lock()
            .await
            .set_active(device_id.clone());

        {
            let mut session = self.inner.session.lock();
            if session.generation != generation {
                return Err(CameraError::invalid_state(operation, session.phase));
            }
            session.device_id = device_id.clone();
            session.retry_count = 0;
            session.manual_start_required = outcome.manual_start_required;
            session.torch.bind(source);
            self.set_phase_locked(&mut session, CapturePhase::Ready);
        }

        info!(
            engine_id = %self.inner.id,
            device_id = ?device_id,
            resolution = %outcome.resolution,
            manual_start_required = outcome.manual_start_required,
            "Camera ready"
        );
        self.emit(CameraEvent::PhaseChanged {
            phase: CapturePhase::Ready,
        });
        self.emit(CameraEvent::Ready {
            device_id,
            resolution: outcome.resolution,
            manual_start_required: outcome.manual_start_required,
        });
        if outcome.manual_start_required {
            self.status("Tap to start the preview", false);
        } else {
            self.status("Camera ready", false);
        }
        Ok(())
    }

    /// Release the camera
    ///
    /// Always succeeds and may be called repeatedly or while `open()` is in
    /// flight; the in-flight call then fails with `InvalidState`.
    pub fn close(&self) {
        let (source, previous, cancelled) = {
            let mut session = self.inner.session.lock();
            let cancelled = session.generation;
            session.generation += 1;
            session.torch.unbind();
            session.manual_start_required = false;
            let previous = session.phase;
            self.set_phase_locked(&mut session, CapturePhase::Closed);
            (session.source.take(), previous, cancelled)
        };

        if let Some(source) = source {
            debug!(source_id = %source.id(), "Stopping source");
            source.stop();
        }
        SurfaceBinder::release(self.inner.surface.as_ref());
        self.inner.cancel_tx.send_replace(cancelled);

        if previous != CapturePhase::Closed {
            info!(engine_id = %self.inner.id, from = %previous, "Camera closed");
            self.emit(CameraEvent::PhaseChanged {
                phase: CapturePhase::Closed,
            });
            self.status("Camera closed", false);
        }
    }

    // ------------------------------------------------------------------
    // Device switching
    // ------------------------------------------------------------------

    /// Move to `device_id`, or the next camera in list order
    ///
    /// On failure the previous device is restored when possible; the
    /// original error is returned either way.
    pub async fn switch_device(&self, device_id: Option<&str>) -> CameraResult<()> {
        let rotated = match device_id {
            Some(_) => None,
            None => {
                let current = self.inner.session.lock().device_id.clone();
                let registry = self.inner.registry.lock().await;
                registry.next_in_rotation(current.as_deref()).cloned()
            }
        };

        let (generation, previous_id, target, old_source) = {
            let mut session = self.inner.session.lock();
            if session.phase != CapturePhase::Ready {
                return Err(CameraError::invalid_state("switch device", session.phase));
            }

            let current = session.device_id.clone();
            let target = match device_id {
                Some(id) => session.cameras.iter().find(|d| d.id == id).cloned(),
                None => rotated,
            };
            let target = target.ok_or_else(|| CameraError::NoDeviceFound {
                detail: match device_id {
                    Some(id) => format!("camera {id} is not in the device list"),
                    None => "no camera to switch to".to_string(),
                },
            })?;

            if current.as_deref() == Some(target.id.as_str()) {
                debug!(device_id = %target.id, "Already on requested camera");
                return Ok(());
            }

            session.torch.unbind();
            session.manual_start_required = false;
            self.set_phase_locked(&mut session, CapturePhase::Switching);
            (session.generation, current, target, session.source.take())
        };

        info!(from = ?previous_id, to = %target.id, "Switching camera");
        self.emit(CameraEvent::PhaseChanged {
            phase: CapturePhase::Switching,
        });
        self.status(&format!("Switching to {}", target.display_name()), true);

        // The device is exclusive: release before acquiring the next one
        if let Some(old) = old_source {
            old.stop();
        }
        SurfaceBinder::release(self.inner.surface.as_ref());

        let error = match self
            .start_device(generation, Some(&target.id), "switch device")
            .await
        {
            Ok(()) => return Ok(()),
            Err(e) => e,
        };
        if !self.is_current(generation) {
            return Err(CameraError::invalid_state("switch device", self.phase()));
        }

        warn!(error = %error, device_id = %target.id, "Camera switch failed");
        let Some(previous_id) = previous_id else {
            return Err(self.fail(generation, "switch device", error));
        };

        self.status("Restoring previous camera", true);
        match self
            .start_device(generation, Some(&previous_id), "switch device")
            .await
        {
            Ok(()) => {
                info!(device_id = %previous_id, "Previous camera restored");
                self.report_error(&error);
                Err(error)
            }
            Err(restore_error) => {
                error!(error = %restore_error, "Restoring previous camera failed");
                Err(self.fail(generation, "switch device", error))
            }
        }
    }

    // ------------------------------------------------------------------
    // Playback
    // ------------------------------------------------------------------

    /// Start playback after autoplay was refused
    pub async fn resume_playback(&self) -> CameraResult<()> {
        {
            let session = self.inner.session.lock();
            if session.phase != CapturePhase::Ready {
                return Err(CameraError::invalid_state("resume playback", session.phase));
            }
        }

        match self.inner.surface.play().await {
            Ok(()) => {
                self.inner.session.lock().manual_start_required = false;
                self.status("Camera ready", false);
                Ok(())
            }
            Err(PlaybackError::NotAllowed(reason)) | Err(PlaybackError::Failed(reason)) => {
                warn!(%reason, "Playback did not start");
                Err(CameraError::SourceNotReady { reason })
            }
        }
    }

    /// Return to a live preview after a capture
    ///
    /// Resumes playback when the source is healthy, otherwise re-acquires
    /// the active device.
    pub async fn retake(&self) -> CameraResult<()> {
        let (generation, healthy, device_id) = {
            let session = self.inner.session.lock();
            if session.phase != CapturePhase::Ready {
                return Err(CameraError::invalid_state("retake", session.phase));
            }
            (
                session.generation,
                session.source.as_ref().is_some_and(|s| s.is_active()),
                session.device_id.clone(),
            )
        };

        if healthy {
            if !self.inner.surface.is_paused() {
                return Ok(());
            }
            return self.resume_playback().await;
        }

        warn!(device_id = ?device_id, "Source ended, re-acquiring");
        let stale = {
            let mut session = self.inner.session.lock();
            if session.generation != generation || session.phase != CapturePhase::Ready {
                return Err(CameraError::invalid_state("retake", session.phase));
            }
            session.torch.unbind();
            self.set_phase_locked(&mut session, CapturePhase::Switching);
            session.source.take()
        };
        self.emit(CameraEvent::PhaseChanged {
            phase: CapturePhase::Switching,
        });
        if let Some(stale) = stale {
            stale.stop();
        }
        SurfaceBinder::release(self.inner.surface.as_ref());

        match self
            .start_device(generation, device_id.as_deref(), "retake")
            .await
        {
            Ok(()) => Ok(()),
            Err(e) => Err(self.fail(generation, "retake", e)),
        }
    }

    // ------------------------------------------------------------------
    // Capture and torch
    // ------------------------------------------------------------------

    /// Capture a still image with the configured default options
    pub async fn capture(&self) -> CameraResult<Arc<CapturedImage>> {
        self.capture_with(self.inner.config.capture.clone()).await
    }

    /// Capture a still image
    ///
    /// When `options.mirror` is unset, front-facing devices are mirrored if
    /// the configuration asks for it.
    pub async fn capture_with(&self, mut options: CaptureOptions) -> CameraResult<Arc<CapturedImage>> {
        let (generation, front_facing) = {
            let mut session = self.inner.session.lock();
            if session.phase != CapturePhase::Ready {
                return Err(CameraError::SourceNotReady {
                    reason: format!("camera is {}", session.phase),
                });
            }
            let front_facing = session.device_id.as_deref().is_some_and(|id| {
                session
                    .cameras
                    .iter()
                    .any(|d| d.id == id && d.is_front_facing())
            });
            self.set_phase_locked(&mut session, CapturePhase::Capturing);
            (session.generation, front_facing)
        };
        self.emit(CameraEvent::PhaseChanged {
            phase: CapturePhase::Capturing,
        });

        if options.mirror.is_none() {
            options.mirror = Some(self.inner.config.mirror_front_camera && front_facing);
        }

        let result = match FrameCapturer::snapshot(self.inner.surface.as_ref()) {
            Ok(frame) => {
                tokio::task::spawn_blocking(move || FrameCapturer::process(frame, &options))
                    .await
                    .map_err(|e| CameraError::EncodingFailed {
                        format: JPEG_MIME.to_string(),
                        reason: e.to_string(),
                    })
                    .and_then(|processed| processed)
            }
            Err(e) => Err(e),
        };

        let restored = {
            let mut session = self.inner.session.lock();
            let restore =
                session.generation == generation && session.phase == CapturePhase::Capturing;
            if restore {
                self.set_phase_locked(&mut session, CapturePhase::Ready);
            }
            restore
        };
        if restored {
            self.emit(CameraEvent::PhaseChanged {
                phase: CapturePhase::Ready,
            });
        }

        match result {
            Ok(image) => {
                let image = Arc::new(image);
                info!(
                    width = image.pixel_width,
                    height = image.pixel_height,
                    bytes = image.encoded_len(),
                    "Photo captured"
                );
                self.emit(CameraEvent::PhotoCaptured {
                    image: image.clone(),
                });
                Ok(image)
            }
            Err(e) => {
                self.report_error(&e);
                Err(e)
            }
        }
    }

    /// Flip the torch and return the new state
    pub async fn toggle_torch(&self) -> CameraResult<bool> {
        let mut torch = {
            let session = self.inner.session.lock();
            if session.phase != CapturePhase::Ready {
                return Err(CameraError::invalid_state("toggle torch", session.phase));
            }
            session.torch.clone()
        };
        let source_id = torch.source_id().map(str::to_string);

        let enabled = match torch.toggle().await {
            Ok(enabled) => enabled,
            Err(e) => {
                self.report_error(&e);
                return Err(e);
            }
        };

        {
            let mut session = self.inner.session.lock();
            if session.torch.source_id() != source_id.as_deref() {
                return Err(CameraError::invalid_state("toggle torch", session.phase));
            }
            session.torch = torch;
        }
        self.emit(CameraEvent::TorchChanged { enabled });
        Ok(enabled)
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn set_phase_locked(&self, session: &mut Session, phase: CapturePhase) {
        session.phase = phase;
        self.inner.phase_tx.send_replace(phase);
    }

    fn is_current(&self, generation: u64) -> bool {
        self.inner.session.lock().generation == generation
    }

    fn ensure_current(&self, generation: u64, operation: &str) -> CameraResult<()> {
        let session = self.inner.session.lock();
        if session.generation != generation {
            return Err(CameraError::invalid_state(operation, session.phase));
        }
        Ok(())
    }

    /// Make `source` the session source so `close()` can stop it
    fn register_source(
        &self,
        generation: u64,
        source: &LiveSource,
        operation: &str,
    ) -> CameraResult<()> {
        let mut session = self.inner.session.lock();
        if session.generation != generation {
            let phase = session.phase;
            drop(session);
            debug!(source_id = %source.id(), "Session closed during acquisition, stopping source");
            source.stop();
            return Err(CameraError::invalid_state(operation, phase));
        }
        session.source = Some(source.clone());
        Ok(())
    }

    fn discard_source(&self, generation: u64, source: &LiveSource) {
        let current = {
            let mut session = self.inner.session.lock();
            if session.source.as_ref().is_some_and(|s| s.id() == source.id()) {
                session.source = None;
            }
            session.generation == generation
        };
        source.stop();
        if current {
            SurfaceBinder::release(self.inner.surface.as_ref());
        }
    }

    fn update_cameras(&self, generation: u64, devices: Vec<DeviceDescriptor>) {
        {
            let mut session = self.inner.session.lock();
            if session.generation != generation {
                return;
            }
            session.cameras = devices.clone();
        }
        self.emit(CameraEvent::DevicesChanged { devices });
    }

    /// Enter `Error`, release everything and report
    ///
    /// A superseded operation only reports `InvalidState`.
    fn fail(&self, generation: u64, operation: &str, error: CameraError) -> CameraError {
        let source = {
            let mut session = self.inner.session.lock();
            if session.generation != generation {
                let phase = session.phase;
                drop(session);
                debug!(operation, error = %error, "Superseded operation failed");
                return CameraError::invalid_state(operation, phase);
            }
            session.last_error = Some(error.clone());
            session.retry_count += 1;
            session.torch.unbind();
            session.manual_start_required = false;
            self.set_phase_locked(&mut session, CapturePhase::Error);
            session.source.take()
        };

        if let Some(source) = source {
            source.stop();
        }
        SurfaceBinder::release(self.inner.surface.as_ref());

        error!(
            engine_id = %self.inner.id,
            operation,
            kind = %error.kind(),
            error = %error,
            "Camera operation failed"
        );
        self.emit(CameraEvent::PhaseChanged {
            phase: CapturePhase::Error,
        });
        self.report_error(&error);
        error
    }

    fn report_error(&self, error: &CameraError) {
        self.emit(CameraEvent::Error {
            kind: error.kind(),
            message: error.to_string(),
            recoverable: error.is_recoverable(),
        });
        self.status(&user_message(error), false);
    }

    fn status(&self, message: &str, busy: bool) {
        debug!(message, busy, "Status");
        self.emit(CameraEvent::Status {
            message: message.to_string(),
            busy,
        });
    }

    fn emit(&self, event: CameraEvent) {
        let observers = self.inner.observers.read().clone();
        for observer in &observers {
            notify(observer.as_ref(), &event);
        }
        // No subscribers is fine
        let _ = self.inner.events.send(event);
    }
}
