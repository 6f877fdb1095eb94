//! Ports to the external collaborators driven by the session controller
//!
//! The mapping engine, the key-value settings store and the renderer live
//! outside this crate. The controller only sees them through these traits,
//! which lets tests substitute the in-process fakes from `session::mock`.

use crate::error::Result;
use crate::placement::record::Transform;

/// Opaque map handle returned by the engine on save.
pub type MapId = String;

/// Invoked once when a save finishes; `None` means the save failed.
pub type SaveCallback = Box<dyn FnOnce(Option<MapId>) + Send>;

/// Invoked once when a delete finishes with whether the map was removed.
pub type DeleteCallback = Box<dyn FnOnce(bool) + Send>;

/// Invoked repeatedly as an upload or download advances.
pub type ProgressCallback = Box<dyn FnMut(TransferProgress) + Send>;

/// Invoked on every engine status change with `(previous, current)`.
pub type StatusListener = Box<dyn Fn(MappingStatus, MappingStatus) + Send + Sync>;

/// Engine mapping status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MappingStatus {
    /// Session not started
    Waiting,
    /// Tracking against the map
    Running,
    /// Tracking lost
    Lost,
}

/// Upload/download progress as reported by the engine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransferProgress {
    pub completed: bool,
    pub faulted: bool,
    /// 0.0 to 1.0
    pub percent: f32,
}

impl TransferProgress {
    pub fn in_progress(percent: f32) -> Self {
        Self {
            completed: false,
            faulted: false,
            percent,
        }
    }

    pub fn completed() -> Self {
        Self {
            completed: true,
            faulted: false,
            percent: 1.0,
        }
    }

    pub fn faulted(percent: f32) -> Self {
        Self {
            completed: false,
            faulted: true,
            percent,
        }
    }
}

/// Camera tracking quality reported with each frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackingQuality {
    /// Full tracking; `has_surfaces` is false until a surface is detected
    Normal { has_surfaces: bool },
    NotAvailable,
    ExcessiveMotion,
    InsufficientFeatures,
    Initializing,
    Interrupted,
}

impl TrackingQuality {
    /// Whether the provider is delivering valid poses.
    pub fn is_normal(self) -> bool {
        matches!(self, TrackingQuality::Normal { .. })
    }

    /// User-facing hint for the session info banner; `None` hides the banner.
    pub fn guidance(self) -> Option<&'static str> {
        match self {
            TrackingQuality::Normal { has_surfaces: false } => {
                Some("Move the device around to detect horizontal surfaces.")
            }
            TrackingQuality::Normal { has_surfaces: true } => None,
            TrackingQuality::NotAvailable => Some("Tracking unavailable."),
            TrackingQuality::ExcessiveMotion => {
                Some("Tracking limited - Move the device more slowly.")
            }
            TrackingQuality::InsufficientFeatures => Some(
                "Tracking limited - Point the device at an area with visible surface detail, or improve lighting conditions.",
            ),
            TrackingQuality::Initializing => Some("Initializing AR session."),
            TrackingQuality::Interrupted => Some("Session was interrupted"),
        }
    }
}

/// One camera frame from the tracking provider.
#[derive(Debug, Clone)]
pub struct CameraFrame {
    /// Raw captured image; layout is the provider's business
    pub image: Vec<u8>,
    /// Camera pose in tracking coordinates
    pub pose: Transform,
    pub tracking: TrackingQuality,
}

/// The external mapping/localization engine.
///
/// Callbacks may run on any thread. Implementations must not block the
/// caller of `set_frame`.
pub trait MappingEngine: Send + Sync {
    fn initialized(&self) -> bool;

    fn start_session(&self);

    fn stop_session(&self);

    fn set_frame(&self, image: &[u8], pose: &Transform);

    fn save_map(&self, on_saved: SaveCallback, on_upload: ProgressCallback);

    fn load_map(&self, map_id: &str, on_download: ProgressCallback);

    fn delete_map(&self, map_id: &str, on_deleted: DeleteCallback);

    /// Register the listener for status changes. Replaces any previous one.
    fn set_status_listener(&self, listener: StatusListener);
}

/// Lightweight key-value settings.
pub trait SettingsStore: Send {
    fn get(&self, key: &str) -> Option<String>;

    fn set(&mut self, key: &str, value: &str) -> Result<()>;

    fn remove(&mut self, key: &str) -> Result<()>;
}

/// Scene-graph side of model instantiation.
pub trait Renderer: Send {
    /// Put one model into the scene at `transform`.
    fn instantiate_model(&mut self, model_type: u32, transform: &Transform);

    /// Remove every model this session instantiated.
    fn clear_models(&mut self);
}
