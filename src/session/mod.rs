//! Session Module
//!
//! The placement session state machine and the ports it drives:
//! - Session states and control-context events
//! - External collaborator traits (mapping engine, settings, renderer)
//! - Background readiness polling
//! - In-process fakes of the collaborators

pub mod controller;
pub mod mock;
pub mod ports;
pub mod readiness;
pub mod state;

pub use controller::{SessionController, SessionPorts};
pub use ports::{
    CameraFrame, MapId, MappingEngine, MappingStatus, Renderer, SettingsStore, TrackingQuality,
    TransferProgress,
};
pub use readiness::PollOutcome;
pub use state::{Envelope, SessionEvent, SessionState};
