//! Event system for camera session changes

use crate::engine::CapturePhase;
use camflow_core::{DeviceDescriptor, ErrorKind, Resolution};
use camflow_media::CapturedImage;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::debug;

/// Events emitted by the capture engine
#[derive(Debug, Clone)]
pub enum CameraEvent {
    /// The preview shows frames
    Ready {
        /// Device the source was opened from
        device_id: Option<String>,
        /// Decoded frame dimensions
        resolution: Resolution,
        /// Playback needs a user gesture
        manual_start_required: bool,
    },
    /// An operation failed
    Error {
        /// Error kind
        kind: ErrorKind,
        /// Human readable message
        message: String,
        /// Whether retrying may help
        recoverable: bool,
    },
    /// Progress line for the user
    Status {
        /// Message text
        message: String,
        /// An operation is in flight
        busy: bool,
    },
    /// A still image was captured
    PhotoCaptured {
        /// The processed image
        image: Arc<CapturedImage>,
    },
    /// Torch state changed
    TorchChanged {
        /// Torch is on
        enabled: bool,
    },
    /// Engine phase changed
    PhaseChanged {
        /// New phase
        phase: CapturePhase,
    },
    /// The device list was refreshed
    DevicesChanged {
        /// Sorted video inputs
        devices: Vec<DeviceDescriptor>,
    },
}

impl CameraEvent {
    /// Get the event type as a string
    pub fn event_type(&self) -> &'static str {
        match self {
            CameraEvent::Ready { .. } => "ready",
            CameraEvent::Error { .. } => "error",
            CameraEvent::Status { .. } => "status",
            CameraEvent::PhotoCaptured { .. } => "photo_captured",
            CameraEvent::TorchChanged { .. } => "torch_changed",
            CameraEvent::PhaseChanged { .. } => "phase_changed",
            CameraEvent::DevicesChanged { .. } => "devices_changed",
        }
    }

    /// Lifecycle event (ready, phase, devices)
    pub fn is_lifecycle_event(&self) -> bool {
        matches!(
            self,
            CameraEvent::Ready { .. }
                | CameraEvent::PhaseChanged { .. }
                | CameraEvent::DevicesChanged { .. }
        )
    }

    /// Capture or torch event
    pub fn is_capture_event(&self) -> bool {
        matches!(
            self,
            CameraEvent::PhotoCaptured { .. } | CameraEvent::TorchChanged { .. }
        )
    }

    /// Error event
    pub fn is_error_event(&self) -> bool {
        matches!(self, CameraEvent::Error { .. })
    }
}

/// Callback interface for engine events
///
/// Every method has an empty default so observers implement only what they
/// need.
pub trait CaptureObserver: Send + Sync {
    /// The preview is ready
    fn on_ready(&self, _device_id: Option<&str>) {}

    /// An operation failed
    fn on_error(&self, _kind: ErrorKind, _message: &str) {}

    /// Status line changed
    fn on_status(&self, _message: &str, _busy: bool) {}

    /// A still image was captured
    fn on_photo_captured(&self, _image: &CapturedImage) {}

    /// Torch state changed
    fn on_torch_changed(&self, _enabled: bool) {}
}

/// Route an event to the matching observer method
pub fn notify(observer: &dyn CaptureObserver, event: &CameraEvent) {
    match event {
        CameraEvent::Ready { device_id, .. } => observer.on_ready(device_id.as_deref()),
        CameraEvent::Error { kind, message, .. } => observer.on_error(*kind, message),
        CameraEvent::Status { message, busy } => observer.on_status(message, *busy),
        CameraEvent::PhotoCaptured { image } => observer.on_photo_captured(image),
        CameraEvent::TorchChanged { enabled } => observer.on_torch_changed(*enabled),
        CameraEvent::PhaseChanged { .. } | CameraEvent::DevicesChanged { .. } => {}
    }
}

/// Stream of engine events for async iteration
#[derive(Debug)]
pub struct EventStream {
    receiver: broadcast::Receiver<CameraEvent>,
    filter: EventFilter,
}

impl EventStream {
    /// Create a new event stream with a receiver
    pub fn new(receiver: broadcast::Receiver<CameraEvent>) -> Self {
        Self {
            receiver,
            filter: EventFilter::all(),
        }
    }

    /// Only yield events accepted by `filter`
    pub fn filtered(mut self, filter: EventFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Get the next event; `None` once the engine is dropped
    pub async fn next(&mut self) -> Option<CameraEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) if self.filter.matches(&event) => return Some(event),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!(skipped, "Event stream lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Get the next buffered event without waiting
    pub fn try_next(&mut self) -> Option<CameraEvent> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) if self.filter.matches(&event) => return Some(event),
                Ok(_) => continue,
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    debug!(skipped, "Event stream lagged");
                }
                Err(_) => return None,
            }
        }
    }

    /// Drain every buffered event
    pub fn drain(&mut self) -> Vec<CameraEvent> {
        std::iter::from_fn(|| self.try_next()).collect()
    }
}

/// Event filter for selective event processing
#[derive(Debug, Clone)]
pub struct EventFilter {
    /// Whether to include lifecycle events
    pub include_lifecycle_events: bool,
    /// Whether to include status events
    pub include_status_events: bool,
    /// Whether to include capture and torch events
    pub include_capture_events: bool,
    /// Whether to include error events
    pub include_error_events: bool,
    /// Specific event types to include (if specified, overrides other filters)
    pub specific_event_types: Option<Vec<String>>,
}

impl EventFilter {
    /// Create a filter that includes all events
    pub fn all() -> Self {
        Self {
            include_lifecycle_events: true,
            include_status_events: true,
            include_capture_events: true,
            include_error_events: true,
            specific_event_types: None,
        }
    }

    /// Create a filter that includes only error events
    pub fn errors_only() -> Self {
        Self {
            include_lifecycle_events: false,
            include_status_events: false,
            include_capture_events: false,
            include_error_events: true,
            specific_event_types: None,
        }
    }

    /// Create a filter for specific event types
    pub fn specific_types(types: &[&str]) -> Self {
        Self {
            specific_event_types: Some(types.iter().map(|t| t.to_string()).collect()),
            ..Self::all()
        }
    }

    /// Check if an event matches this filter
    pub fn matches(&self, event: &CameraEvent) -> bool {
        if let Some(types) = &self.specific_event_types {
            return types.iter().any(|t| t == event.event_type());
        }
        match event {
            CameraEvent::Status { .. } => self.include_status_events,
            CameraEvent::Error { .. } => self.include_error_events,
            e if e.is_capture_event() => self.include_capture_events,
            _ => self.include_lifecycle_events,
        }
    }
}

impl Default for EventFilter {
    fn default() -> Self {
        Self::all()
    }
}
