//! Mock camera platform for tests and hosts without camera support
//!
//! [`MockPlatform`] serves a configurable device list, fails profiles that
//! match registered rules, and counts every track it starts and stops so
//! callers can assert that no hardware handle leaks.

use crate::device::{classify, DeviceFacing};
use crate::platform::{
    ConstraintProfile, DeviceCapabilities, FacingMode, LightSetting, LiveSource,
    MediaDeviceInfo, MediaDeviceKind, MediaPlatform, MediaTrack, PermissionState, PlatformError,
    PlatformErrorKind, Resolution, TrackKind, TrackSettings, TrackState,
};
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

/// How a matching rule makes an acquisition fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockFailure {
    /// Return a platform error of this kind
    Error(PlatformErrorKind),
    /// Succeed with a source that has no tracks
    NoVideoTrack,
}

type Rule = Box<dyn Fn(&ConstraintProfile) -> Option<MockFailure> + Send + Sync>;

#[derive(Default)]
struct Counters {
    started: AtomicUsize,
    stopped: AtomicUsize,
}

struct MockState {
    devices: RwLock<Vec<MediaDeviceInfo>>,
    permission: RwLock<PermissionState>,
    enumeration: AtomicBool,
    acquisition: AtomicBool,
    hide_labels_until_granted: AtomicBool,
    empty_enumeration: AtomicBool,
    granted: AtomicBool,
    default_resolution: RwLock<Resolution>,
    capabilities: RwLock<HashMap<String, DeviceCapabilities>>,
    rules: RwLock<Vec<Rule>>,
    acquire_delay: RwLock<Option<Duration>>,
    acquisitions: Mutex<Vec<ConstraintProfile>>,
    enumerations: AtomicUsize,
    lights: Arc<Mutex<Vec<(String, LightSetting)>>>,
    counters: Arc<Counters>,
}

/// Scriptable in-memory [`MediaPlatform`]
#[derive(Clone)]
pub struct MockPlatform {
    state: Arc<MockState>,
}

impl MockPlatform {
    /// Platform with the given video inputs and permission already granted
    pub fn new(devices: Vec<MediaDeviceInfo>) -> Self {
        Self {
            state: Arc::new(MockState {
                devices: RwLock::new(devices),
                permission: RwLock::new(PermissionState::Granted),
                enumeration: AtomicBool::new(true),
                acquisition: AtomicBool::new(true),
                hide_labels_until_granted: AtomicBool::new(false),
                empty_enumeration: AtomicBool::new(false),
                granted: AtomicBool::new(false),
                default_resolution: RwLock::new(Resolution::VGA),
                capabilities: RwLock::new(HashMap::new()),
                rules: RwLock::new(Vec::new()),
                acquire_delay: RwLock::new(None),
                acquisitions: Mutex::new(Vec::new()),
                enumerations: AtomicUsize::new(0),
                lights: Arc::new(Mutex::new(Vec::new())),
                counters: Arc::new(Counters::default()),
            }),
        }
    }

    /// Platform with one generic webcam
    pub fn single_camera() -> Self {
        Self::new(vec![MediaDeviceInfo::video("mock-camera-0", "Mock Camera")])
    }

    /// Set the permission query result
    pub fn with_permission(self, permission: PermissionState) -> Self {
        self.set_permission(permission);
        self
    }

    /// Report empty labels until an acquisition succeeds
    pub fn with_hidden_labels(self) -> Self {
        self.state
            .hide_labels_until_granted
            .store(true, Ordering::SeqCst);
        self
    }

    /// Enumerate nothing while acquisition still reaches the devices
    pub fn with_empty_enumeration(self) -> Self {
        self.state.empty_enumeration.store(true, Ordering::SeqCst);
        self
    }

    /// Disable enumeration and acquisition capabilities
    pub fn unsupported(self) -> Self {
        self.state.enumeration.store(false, Ordering::SeqCst);
        self.state.acquisition.store(false, Ordering::SeqCst);
        self
    }

    /// Resolution used when a profile carries no ideal
    pub fn with_default_resolution(self, resolution: Resolution) -> Self {
        *self.state.default_resolution.write() = resolution;
        self
    }

    /// Capabilities reported by tracks of one device
    pub fn with_capabilities(self, device_id: &str, capabilities: DeviceCapabilities) -> Self {
        self.state
            .capabilities
            .write()
            .insert(device_id.to_string(), capabilities);
        self
    }

    /// Fail every profile for which `rule` returns a failure
    pub fn fail_when<F>(self, rule: F) -> Self
    where
        F: Fn(&ConstraintProfile) -> Option<MockFailure> + Send + Sync + 'static,
    {
        self.state.rules.write().push(Box::new(rule));
        self
    }

    /// Fail exact-id requests for one device
    pub fn fail_device(self, device_id: &str, kind: PlatformErrorKind) -> Self {
        let device_id = device_id.to_string();
        self.fail_when(move |profile| {
            (profile.device_id.as_deref() == Some(device_id.as_str()))
                .then_some(MockFailure::Error(kind))
        })
    }

    /// Delay every acquisition
    pub fn with_acquire_delay(self, delay: Duration) -> Self {
        *self.state.acquire_delay.write() = Some(delay);
        self
    }

    /// Change the permission query result
    pub fn set_permission(&self, permission: PermissionState) {
        *self.state.permission.write() = permission;
    }

    /// Replace the device list
    pub fn set_devices(&self, devices: Vec<MediaDeviceInfo>) {
        *self.state.devices.write() = devices;
    }

    /// Profiles passed to `acquire`, in call order
    pub fn acquisitions(&self) -> Vec<ConstraintProfile> {
        self.state.acquisitions.lock().clone()
    }

    /// Number of `enumerate_devices` calls
    pub fn enumerations(&self) -> usize {
        self.state.enumerations.load(Ordering::SeqCst)
    }

    /// Tracks started so far
    pub fn tracks_started(&self) -> usize {
        self.state.counters.started.load(Ordering::SeqCst)
    }

    /// Tracks stopped so far
    pub fn tracks_stopped(&self) -> usize {
        self.state.counters.stopped.load(Ordering::SeqCst)
    }

    /// Tracks started and not yet stopped
    pub fn live_tracks(&self) -> usize {
        self.tracks_started().saturating_sub(self.tracks_stopped())
    }

    /// Light constraints applied, as `(device_id, setting)`
    pub fn light_changes(&self) -> Vec<(String, LightSetting)> {
        self.state.lights.lock().clone()
    }

    fn select_device(&self, profile: &ConstraintProfile) -> Result<MediaDeviceInfo, PlatformError> {
        let devices = self.state.devices.read();
        let mut video = devices
            .iter()
            .filter(|device| device.kind == MediaDeviceKind::VideoInput);

        let found = if let Some(id) = &profile.device_id {
            video.find(|device| &device.device_id == id)
        } else if let Some(facing) = profile.facing {
            let wanted = match facing {
                FacingMode::User => DeviceFacing::Front,
                FacingMode::Environment => DeviceFacing::Back,
            };
            let found = video.find(|device| classify(&device.label).facing == wanted);
            if found.is_none() {
                return Err(PlatformError::new(
                    PlatformErrorKind::Overconstrained,
                    format!("no camera facing {facing:?}"),
                ));
            }
            found
        } else {
            video.next()
        };

        found.cloned().ok_or_else(|| {
            PlatformError::new(PlatformErrorKind::DeviceNotFound, "requested device not found")
        })
    }
}

#[async_trait]
impl MediaPlatform for MockPlatform {
    fn supports_enumeration(&self) -> bool {
        self.state.enumeration.load(Ordering::SeqCst)
    }

    fn supports_acquisition(&self) -> bool {
        self.state.acquisition.load(Ordering::SeqCst)
    }

    async fn query_permission(&self) -> PermissionState {
        *self.state.permission.read()
    }

    async fn enumerate_devices(&self) -> Result<Vec<MediaDeviceInfo>, PlatformError> {
        self.state.enumerations.fetch_add(1, Ordering::SeqCst);
        if self.state.empty_enumeration.load(Ordering::SeqCst) {
            return Ok(Vec::new());
        }
        let redact = self.state.hide_labels_until_granted.load(Ordering::SeqCst)
            && !self.state.granted.load(Ordering::SeqCst);

        let devices = self.state.devices.read().clone();
        Ok(devices
            .into_iter()
            .map(|mut device| {
                if redact {
                    device.label.clear();
                }
                device
            })
            .collect())
    }

    async fn acquire(&self, profile: &ConstraintProfile) -> Result<LiveSource, PlatformError> {
        self.state.acquisitions.lock().push(profile.clone());

        let delay = *self.state.acquire_delay.read();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if *self.state.permission.read() == PermissionState::Denied {
            return Err(PlatformError::new(
                PlatformErrorKind::PermissionDenied,
                "camera access denied",
            ));
        }

        let failure = self
            .state
            .rules
            .read()
            .iter()
            .find_map(|rule| rule(profile));
        match failure {
            Some(MockFailure::Error(kind)) => {
                return Err(PlatformError::new(kind, format!("rejected {}", profile.label)));
            }
            Some(MockFailure::NoVideoTrack) => {
                return Ok(LiveSource::new(Uuid::new_v4().to_string(), Vec::new()));
            }
            None => {}
        }

        let device = self.select_device(profile)?;
        let capabilities = self
            .state
            .capabilities
            .read()
            .get(&device.device_id)
            .cloned();

        let mut resolution = profile
            .ideal
            .unwrap_or(*self.state.default_resolution.read());
        if let Some(max) = capabilities.as_ref().and_then(|c| c.max_resolution) {
            resolution.width = resolution.width.min(max.width);
            resolution.height = resolution.height.min(max.height);
        }

        let facing = match classify(&device.label).facing {
            DeviceFacing::Front => Some(FacingMode::User),
            DeviceFacing::Back => Some(FacingMode::Environment),
            DeviceFacing::Unknown => None,
        };

        self.state.granted.store(true, Ordering::SeqCst);
        if *self.state.permission.read() == PermissionState::Prompt {
            *self.state.permission.write() = PermissionState::Granted;
        }

        let track = MockTrack {
            id: Uuid::new_v4().to_string(),
            settings: TrackSettings {
                device_id: Some(device.device_id.clone()),
                resolution: Some(resolution),
                facing,
            },
            capabilities,
            state: Mutex::new(TrackState::Live),
            counters: self.state.counters.clone(),
            lights: self.state.lights.clone(),
        };
        self.state.counters.started.fetch_add(1, Ordering::SeqCst);
        debug!(device_id = %device.device_id, %resolution, "Mock track started");

        Ok(LiveSource::new(
            Uuid::new_v4().to_string(),
            vec![Arc::new(track) as Arc<dyn MediaTrack>],
        ))
    }
}

/// Video track handed out by [`MockPlatform`]
pub struct MockTrack {
    id: String,
    settings: TrackSettings,
    capabilities: Option<DeviceCapabilities>,
    state: Mutex<TrackState>,
    counters: Arc<Counters>,
    lights: Arc<Mutex<Vec<(String, LightSetting)>>>,
}

impl std::fmt::Debug for MockTrack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockTrack")
            .field("id", &self.id)
            .field("settings", &self.settings)
            .field("state", &*self.state.lock())
            .finish()
    }
}

#[async_trait]
impl MediaTrack for MockTrack {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> TrackKind {
        TrackKind::Video
    }

    fn is_enabled(&self) -> bool {
        *self.state.lock() == TrackState::Live
    }

    fn ready_state(&self) -> TrackState {
        *self.state.lock()
    }

    fn settings(&self) -> TrackSettings {
        self.settings.clone()
    }

    fn capabilities(&self) -> Option<DeviceCapabilities> {
        self.capabilities.clone()
    }

    fn stop(&self) {
        let mut state = self.state.lock();
        if *state == TrackState::Live {
            *state = TrackState::Ended;
            self.counters.stopped.fetch_add(1, Ordering::SeqCst);
        }
    }

    async fn apply_light(&self, setting: LightSetting) -> Result<(), PlatformError> {
        let caps = self.capabilities.clone().unwrap_or_default();
        let supported = match setting {
            LightSetting::Torch(_) => caps.has_torch(),
            LightSetting::FillLight(_) => caps.has_flash_fill_light(),
        };
        if !supported {
            return Err(PlatformError::new(
                PlatformErrorKind::Overconstrained,
                format!("{setting:?} not supported"),
            ));
        }

        let device_id = self.settings.device_id.clone().unwrap_or_default();
        self.lights.lock().push((device_id, setting));
        Ok(())
    }
}
