//! In-memory rendering surface for tests and demos

use crate::frame::VideoFrame;
use crate::surface::{PlaybackError, RenderSurface, SurfaceSignal};
use async_trait::async_trait;
use camflow_core::{DecodeProgress, LiveSource, Resolution};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::debug;

/// How a [`MockSurface`] reacts to attached sources
#[derive(Debug, Clone, Default)]
pub struct SurfaceBehavior {
    /// Never report dimensions or decoded data
    pub never_ready: bool,
    /// Reject `play()` as an autoplay violation
    pub autoplay_blocked: bool,
    /// Dimensions and data appear this long after attach
    pub metadata_delay: Duration,
    /// Emit an error signal right after attach
    pub error_on_attach: Option<String>,
    /// `play()` never settles
    pub play_hangs: bool,
}

#[derive(Debug)]
struct SurfaceState {
    bound: Option<LiveSource>,
    attached_at: Option<Instant>,
    paused: bool,
    attaches: usize,
    reloads: usize,
    play_calls: usize,
}

/// Rendering surface that decodes a synthetic test pattern
///
/// Pixel `(x, y)` of every frame is `[x % 256, y % 256, (x + y) % 256, 255]`.
#[derive(Debug, Clone)]
pub struct MockSurface {
    behavior: Arc<Mutex<SurfaceBehavior>>,
    state: Arc<Mutex<SurfaceState>>,
    signals: broadcast::Sender<SurfaceSignal>,
}

impl Default for MockSurface {
    fn default() -> Self {
        Self::new()
    }
}

impl MockSurface {
    /// Surface that becomes ready immediately
    pub fn new() -> Self {
        Self::with_behavior(SurfaceBehavior::default())
    }

    /// Surface with custom behavior
    pub fn with_behavior(behavior: SurfaceBehavior) -> Self {
        let (signals, _) = broadcast::channel(32);
        Self {
            behavior: Arc::new(Mutex::new(behavior)),
            state: Arc::new(Mutex::new(SurfaceState {
                bound: None,
                attached_at: None,
                paused: true,
                attaches: 0,
                reloads: 0,
                play_calls: 0,
            })),
            signals,
        }
    }

    /// Surface that never reaches readiness
    pub fn never_ready() -> Self {
        Self::with_behavior(SurfaceBehavior {
            never_ready: true,
            ..Default::default()
        })
    }

    /// Surface that refuses autoplay
    pub fn autoplay_blocked() -> Self {
        Self::with_behavior(SurfaceBehavior {
            autoplay_blocked: true,
            ..Default::default()
        })
    }

    /// Change behavior for subsequent attaches
    pub fn set_behavior(&self, behavior: SurfaceBehavior) {
        *self.behavior.lock() = behavior;
    }

    /// Number of attach calls
    pub fn attaches(&self) -> usize {
        self.state.lock().attaches
    }

    /// Number of reload calls
    pub fn reloads(&self) -> usize {
        self.state.lock().reloads
    }

    /// Number of play calls
    pub fn play_calls(&self) -> usize {
        self.state.lock().play_calls
    }

    /// Emit a signal to subscribers
    pub fn emit(&self, signal: SurfaceSignal) {
        let _ = self.signals.send(signal);
    }

    fn has_metadata(&self) -> bool {
        let behavior = self.behavior.lock();
        if behavior.never_ready {
            return false;
        }
        let state = self.state.lock();
        match (&state.bound, state.attached_at) {
            (Some(source), Some(at)) => {
                source.is_active() && at.elapsed() >= behavior.metadata_delay
            }
            _ => false,
        }
    }
}

#[async_trait]
impl RenderSurface for MockSurface {
    fn attach(&self, source: &LiveSource) {
        let behavior = self.behavior.lock().clone();
        {
            let mut state = self.state.lock();
            state.bound = Some(source.clone());
            state.attached_at = Some(Instant::now());
            state.paused = true;
            state.attaches += 1;
        }
        debug!(source_id = %source.id(), "Mock surface attached");

        if let Some(message) = behavior.error_on_attach {
            self.emit(SurfaceSignal::Error(message));
            return;
        }
        if !behavior.never_ready && behavior.metadata_delay.is_zero() {
            self.emit(SurfaceSignal::MetadataLoaded);
            self.emit(SurfaceSignal::CanPlay);
        }
    }

    fn detach(&self) {
        let mut state = self.state.lock();
        state.bound = None;
        state.attached_at = None;
        state.paused = true;
    }

    fn reload(&self) {
        self.state.lock().reloads += 1;
    }

    fn bound_source(&self) -> Option<LiveSource> {
        self.state.lock().bound.clone()
    }

    fn decode_progress(&self) -> DecodeProgress {
        if self.has_metadata() {
            DecodeProgress::HaveEnoughData
        } else {
            DecodeProgress::HaveNothing
        }
    }

    fn frame_size(&self) -> Resolution {
        if !self.has_metadata() {
            return Resolution::new(0, 0);
        }
        self.state
            .lock()
            .bound
            .as_ref()
            .and_then(|source| source.resolution())
            .unwrap_or(Resolution::VGA)
    }

    fn is_paused(&self) -> bool {
        self.state.lock().paused
    }

    async fn play(&self) -> Result<(), PlaybackError> {
        let (blocked, hangs) = {
            let behavior = self.behavior.lock();
            (behavior.autoplay_blocked, behavior.play_hangs)
        };
        if hangs {
            self.state.lock().play_calls += 1;
            return std::future::pending().await;
        }
        {
            let mut state = self.state.lock();
            state.play_calls += 1;
            if state.bound.is_none() {
                return Err(PlaybackError::Failed("no source attached".to_string()));
            }
            if blocked {
                return Err(PlaybackError::NotAllowed(
                    "play() requires a user gesture".to_string(),
                ));
            }
            state.paused = false;
        }
        self.emit(SurfaceSignal::Playing);
        Ok(())
    }

    fn pause(&self) {
        self.state.lock().paused = true;
    }

    fn subscribe(&self) -> broadcast::Receiver<SurfaceSignal> {
        self.signals.subscribe()
    }

    fn current_frame(&self) -> Option<VideoFrame> {
        let size = self.frame_size();
        if size.is_empty() {
            return None;
        }
        let timestamp = self
            .state
            .lock()
            .attached_at
            .map(|at| at.elapsed().as_millis() as u64)
            .unwrap_or(0);
        Some(VideoFrame::from_fn(
            size.width,
            size.height,
            timestamp,
            |x, y| [(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8, 255],
        ))
    }
}
