//! Session states and control-context events

use std::fmt;

use crate::session::ports::{MapId, MappingStatus, TransferProgress};

/// Where the placement session currently is.
///
/// Transitions:
/// - `Fresh` -> `Mapping` (no saved session) or `WaitingDownload` (saved map + records)
/// - `Mapping` -> `Saving` on finalize
/// - `Saving` -> `Localized` on a successful save, `Mapping` on failure
/// - `WaitingDownload` -> `Relocalizing` once the map download completes
/// - `Relocalizing` -> `Localized` on the first transition into `Running`
/// - any state -> `Mapping` on reset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// Constructed, not yet started
    #[default]
    Fresh,
    /// Building a new map; placements are accepted
    Mapping,
    /// Placements persisted, waiting for the engine to save and upload
    Saving,
    /// Waiting for engine readiness and the saved map download
    WaitingDownload,
    /// Map loaded, feeding frames until the engine localizes
    Relocalizing,
    /// Idle: models are on screen and frames are no longer forwarded
    Localized,
}

impl SessionState {
    /// Whether camera frames may be forwarded to the mapping engine
    pub fn forwards_frames(self) -> bool {
        matches!(self, SessionState::Mapping | SessionState::Relocalizing)
    }

    /// Whether the placement gateway may append records
    pub fn accepts_placements(self) -> bool {
        self == SessionState::Mapping
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Fresh => write!(f, "Fresh"),
            SessionState::Mapping => write!(f, "Mapping"),
            SessionState::Saving => write!(f, "Saving"),
            SessionState::WaitingDownload => write!(f, "WaitingDownload"),
            SessionState::Relocalizing => write!(f, "Relocalizing"),
            SessionState::Localized => write!(f, "Localized"),
        }
    }
}

/// Something that happened outside the control context and asks for a
/// state transition.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// The readiness poller saw the engine report initialized
    EngineReady,
    /// Map download progress
    DownloadProgress(TransferProgress),
    /// Map upload progress
    UploadProgress(TransferProgress),
    /// Save callback; `None` means the engine failed to save
    MapSaved(Option<MapId>),
    /// Delete callback for a specific map
    MapDeleted { map_id: MapId, deleted: bool },
    /// Engine status notification
    StatusChanged {
        previous: MappingStatus,
        current: MappingStatus,
    },
}

/// An event tagged with the session epoch that was current when the
/// originating request was issued.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub epoch: u64,
    pub event: SessionEvent,
}

impl Envelope {
    pub fn new(epoch: u64, event: SessionEvent) -> Self {
        Self { epoch, event }
    }
}
