//! Session Controller
//!
//! Owns the session state and the placement store and is the only thing
//! that mutates either. Everything asynchronous (engine callbacks, status
//! notifications, the readiness poller) reaches it as an [`Envelope`] on the
//! control channel, and the host drains that channel from its control
//! context with [`SessionController::process_next`] or
//! [`SessionController::pump`].
//!
//! Each envelope carries the epoch that was current when its request was
//! issued. A reset bumps the epoch, so callbacks from work started before
//! the reset are dropped when they arrive.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

use crate::config::SessionConfig;
use crate::error::{FurnishError, Result};
use crate::placement::{ModelCatalog, PlacementRecord, PlacementStore};
use crate::session::ports::{
    CameraFrame, MapId, MappingEngine, MappingStatus, Renderer, SettingsStore,
    TrackingQuality, TransferProgress,
};
use crate::session::readiness::{spawn_readiness_poller, PollOutcome};
use crate::session::state::{Envelope, SessionEvent, SessionState};

/// External collaborators handed to the controller.
pub struct SessionPorts {
    pub engine: Arc<dyn MappingEngine>,
    pub settings: Box<dyn SettingsStore>,
    pub renderer: Box<dyn Renderer>,
}

/// Drives the mapping engine through map, save, download, relocalize and
/// replay.
pub struct SessionController {
    config: SessionConfig,
    engine: Arc<dyn MappingEngine>,
    settings: Box<dyn SettingsStore>,
    renderer: Box<dyn Renderer>,

    state: SessionState,
    store: PlacementStore,

    /// Bumped on every reset; shared with the readiness poller
    epoch: Arc<AtomicU64>,

    /// Set once the stored models are on screen; cleared only by reset
    rendered: bool,

    /// Latched on the first normal-tracking frame seen while frames are
    /// wanted; cleared by reset
    tracking_ready: bool,

    download_in_flight: bool,
    transfer_progress: Option<TransferProgress>,
    last_error: Option<FurnishError>,

    events_tx: UnboundedSender<Envelope>,
    events_rx: UnboundedReceiver<Envelope>,
    poller: Option<JoinHandle<PollOutcome>>,
}

impl SessionController {
    /// Create a controller in `Fresh` and subscribe to engine status changes.
    pub fn new(config: SessionConfig, ports: SessionPorts) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let epoch = Arc::new(AtomicU64::new(0));

        let status_tx = events_tx.clone();
        let status_epoch = epoch.clone();
        ports
            .engine
            .set_status_listener(Box::new(move |previous, current| {
                let envelope = Envelope::new(
                    status_epoch.load(Ordering::Acquire),
                    SessionEvent::StatusChanged { previous, current },
                );
                let _ = status_tx.send(envelope);
            }));

        Self {
            config,
            engine: ports.engine,
            settings: ports.settings,
            renderer: ports.renderer,
            state: SessionState::Fresh,
            store: PlacementStore::new(),
            epoch,
            rendered: false,
            tracking_ready: false,
            download_in_flight: false,
            transfer_progress: None,
            last_error: None,
            events_tx,
            events_rx,
            poller: None,
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn store(&self) -> &PlacementStore {
        &self.store
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn catalog(&self) -> &ModelCatalog {
        &self.config.catalog
    }

    /// Current session generation
    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::Acquire)
    }

    /// Whether the stored models have been put on screen this session
    pub fn is_rendered(&self) -> bool {
        self.rendered
    }

    /// Latest upload or download progress
    pub fn transfer_progress(&self) -> Option<TransferProgress> {
        self.transfer_progress
    }

    /// The most recent failure reported by an asynchronous path
    pub fn last_error(&self) -> Option<&FurnishError> {
        self.last_error.as_ref()
    }

    /// The map identifier currently recorded in settings
    pub fn saved_map_id(&self) -> Option<MapId> {
        self.settings.get(&self.config.map_id_key)
    }

    /// A sender for hosts that deliver engine events themselves
    pub fn event_sender(&self) -> UnboundedSender<Envelope> {
        self.events_tx.clone()
    }

    // ========================================================================
    // Launch
    // ========================================================================

    /// Decide between a fresh mapping session and restoring the saved one.
    ///
    /// Restoring spawns the readiness poller, so this must run inside a
    /// tokio runtime.
    pub fn start(&mut self) -> Result<()> {
        if self.state != SessionState::Fresh {
            return Err(FurnishError::InvalidState {
                state: self.state,
                operation: "start the session",
            });
        }

        self.store = PlacementStore::load_or_empty(&self.config.store_path);
        let usable = self.store.count_valid(&self.config.catalog);
        if usable < self.store.len() {
            warn!(
                skipped = self.store.len() - usable,
                catalog = self.config.catalog.len(),
                "stored placements reference models missing from the catalog"
            );
        }

        match self.saved_map_id() {
            Some(map_id) if usable > 0 => {
                info!(%map_id, count = self.store.len(), "saved session found, waiting for engine");
                self.enter(SessionState::WaitingDownload);
                self.spawn_poller();
            }
            Some(map_id) => {
                info!(%map_id, "saved map has no usable placements, starting fresh");
                self.store.clear();
                self.begin_mapping();
            }
            None => {
                info!("no saved session, starting fresh");
                self.store.clear();
                self.begin_mapping();
            }
        }
        Ok(())
    }

    // ========================================================================
    // Per-frame path
    // ========================================================================

    /// Forward a camera frame to the engine if the session wants frames.
    ///
    /// Cheap and non-blocking; returns whether the frame was forwarded.
    pub fn on_frame(&mut self, frame: &CameraFrame) -> bool {
        if !self.state.forwards_frames() {
            return false;
        }
        if frame.tracking.is_normal() {
            self.tracking_ready = true;
        }
        if !self.tracking_ready || frame.tracking == TrackingQuality::NotAvailable {
            return false;
        }
        trace!(state = %self.state, "forwarding frame");
        self.engine.set_frame(&frame.image, &frame.pose);
        true
    }

    // ========================================================================
    // Placement and save
    // ========================================================================

    /// Append a placement made through the gateway and show it.
    ///
    /// Reaching `required_placements` saves the session. A failed automatic
    /// save keeps the session in `Mapping`, is recorded in `last_error`, and
    /// does not fail the placement.
    pub(crate) fn append_placement(&mut self, record: PlacementRecord) -> Result<()> {
        if !self.state.accepts_placements() {
            return Err(FurnishError::NotAcceptingPlacements { state: self.state });
        }

        self.store.append(record);
        self.renderer
            .instantiate_model(record.model_type, &record.transform);
        info!(count = self.store.len(), model_type = record.model_type, "model placed");

        if let Some(required) = self.config.required_placements {
            if self.store.len() >= required {
                if let Err(e) = self.finalize() {
                    error!(error = %e, "automatic save failed");
                    self.last_error = Some(e);
                }
            }
        }
        Ok(())
    }

    /// Persist the placements and ask the engine to save and upload the map.
    ///
    /// A disk failure leaves the session in `Mapping` so the user can retry.
    pub fn finalize(&mut self) -> Result<()> {
        if self.state != SessionState::Mapping {
            return Err(FurnishError::InvalidState {
                state: self.state,
                operation: "save the session",
            });
        }
        if self.store.is_empty() {
            return Err(FurnishError::InvalidState {
                state: self.state,
                operation: "save a session with no placements",
            });
        }

        self.store.save_to(&self.config.store_path)?;
        self.last_error = None;
        self.enter(SessionState::Saving);

        let epoch = self.epoch();
        let saved_tx = self.events_tx.clone();
        let upload_tx = self.events_tx.clone();
        self.engine.save_map(
            Box::new(move |map_id| {
                let _ = saved_tx.send(Envelope::new(epoch, SessionEvent::MapSaved(map_id)));
            }),
            Box::new(move |progress| {
                let _ = upload_tx.send(Envelope::new(epoch, SessionEvent::UploadProgress(progress)));
            }),
        );
        Ok(())
    }

    /// Re-arm readiness polling after a failed download.
    pub fn retry_download(&mut self) -> Result<()> {
        let polling = self.poller.as_ref().is_some_and(|h| !h.is_finished());
        if self.state != SessionState::WaitingDownload || self.download_in_flight || polling {
            return Err(FurnishError::InvalidState {
                state: self.state,
                operation: "retry the download",
            });
        }
        info!("retrying map download");
        self.last_error = None;
        self.spawn_poller();
        Ok(())
    }

    // ========================================================================
    // Reset
    // ========================================================================

    /// Discard everything and start a brand-new mapping session.
    ///
    /// Callbacks for requests issued before the reset are ignored. The saved
    /// map identifier is only removed once the engine confirms the delete.
    pub fn reset(&mut self) {
        let epoch = self.epoch.fetch_add(1, Ordering::AcqRel) + 1;
        if let Some(poller) = self.poller.take() {
            poller.abort();
        }

        self.store.clear();
        self.renderer.clear_models();
        if let Err(e) = PlacementStore::remove_file(&self.config.store_path) {
            warn!(error = %e, "could not delete placement store, truncating instead");
            if let Err(e) = self.store.save_to(&self.config.store_path) {
                error!(error = %e, "could not truncate placement store");
            }
        }

        self.engine.stop_session();
        if let Some(map_id) = self.saved_map_id() {
            self.request_delete(map_id);
        }

        self.rendered = false;
        self.tracking_ready = false;
        self.download_in_flight = false;
        self.transfer_progress = None;
        self.last_error = None;

        info!(epoch, "session reset");
        self.begin_mapping();
    }

    // ========================================================================
    // Event handling
    // ========================================================================

    /// Wait for the next envelope and apply it.
    ///
    /// Returns whether it caused a change; `false` for stale or irrelevant
    /// events.
    pub async fn process_next(&mut self) -> bool {
        match self.events_rx.recv().await {
            Some(envelope) => self.handle(envelope),
            None => false,
        }
    }

    /// Keep processing envelopes until `done` holds.
    pub async fn run_until<F>(&mut self, done: F)
    where
        F: Fn(&SessionController) -> bool,
    {
        while !done(self) {
            match self.events_rx.recv().await {
                Some(envelope) => {
                    self.handle(envelope);
                }
                None => return,
            }
        }
    }

    /// Apply every envelope already queued without waiting. Returns how many
    /// were taken off the queue.
    pub fn pump(&mut self) -> usize {
        let mut taken = 0;
        while let Ok(envelope) = self.events_rx.try_recv() {
            self.handle(envelope);
            taken += 1;
        }
        taken
    }

    /// Apply one envelope.
    pub fn handle(&mut self, envelope: Envelope) -> bool {
        let Envelope { epoch, event } = envelope;

        // Delete outcomes concern the remote map, not the session generation.
        if let SessionEvent::MapDeleted { map_id, deleted } = event {
            return self.on_map_deleted(map_id, deleted);
        }

        let current = self.epoch();
        if epoch != current {
            debug!(epoch, current, ?event, "ignoring stale event");
            return false;
        }

        match event {
            SessionEvent::EngineReady => self.on_engine_ready(),
            SessionEvent::DownloadProgress(progress) => self.on_download_progress(progress),
            SessionEvent::UploadProgress(progress) => self.on_upload_progress(progress),
            SessionEvent::MapSaved(map_id) => self.on_map_saved(map_id),
            SessionEvent::StatusChanged { previous, current } => {
                self.on_status_changed(previous, current)
            }
            SessionEvent::MapDeleted { .. } => false,
        }
    }

    fn on_engine_ready(&mut self) -> bool {
        if self.state != SessionState::WaitingDownload || self.download_in_flight {
            return false;
        }

        let Some(map_id) = self.saved_map_id() else {
            warn!("saved map identifier disappeared before download, starting fresh");
            self.store.clear();
            self.begin_mapping();
            return true;
        };

        info!(%map_id, "requesting map download");
        self.download_in_flight = true;
        let epoch = self.epoch();
        let tx = self.events_tx.clone();
        self.engine.load_map(
            &map_id,
            Box::new(move |progress| {
                let _ = tx.send(Envelope::new(epoch, SessionEvent::DownloadProgress(progress)));
            }),
        );
        true
    }

    fn on_download_progress(&mut self, progress: TransferProgress) -> bool {
        if self.state != SessionState::WaitingDownload || !self.download_in_flight {
            return false;
        }
        self.transfer_progress = Some(progress);

        if progress.faulted {
            self.download_in_flight = false;
            let e = FurnishError::EngineLoadFailed {
                reason: format!("download faulted at {:.0}%", progress.percent * 100.0),
            };
            warn!(error = %e, "map download failed");
            self.last_error = Some(e);
        } else if progress.completed {
            self.download_in_flight = false;
            info!("map download complete, relocalizing");
            self.engine.start_session();
            self.enter(SessionState::Relocalizing);
        } else {
            debug!(percent = progress.percent, "map download progress");
        }
        true
    }

    fn on_upload_progress(&mut self, progress: TransferProgress) -> bool {
        if !matches!(self.state, SessionState::Saving | SessionState::Localized) {
            return false;
        }
        self.transfer_progress = Some(progress);
        if progress.faulted {
            warn!(percent = progress.percent, "map upload faulted");
        } else {
            debug!(percent = progress.percent, completed = progress.completed, "map upload progress");
        }
        true
    }

    fn on_map_saved(&mut self, map_id: Option<MapId>) -> bool {
        if self.state != SessionState::Saving {
            return false;
        }

        let Some(map_id) = map_id else {
            let e = FurnishError::EngineSaveFailed {
                reason: "engine returned no map identifier".to_string(),
            };
            warn!(error = %e, "map save failed, resuming mapping");
            self.last_error = Some(e);
            self.enter(SessionState::Mapping);
            return true;
        };

        let previous = self.saved_map_id();
        if let Err(e) = self.settings.set(&self.config.map_id_key, &map_id) {
            error!(%map_id, error = %e, "could not record saved map, resuming mapping");
            self.last_error = Some(e);
            self.enter(SessionState::Mapping);
            return true;
        }

        // A map left behind by an earlier failed delete.
        if let Some(old) = previous.filter(|old| *old != map_id) {
            info!(map_id = %old, "removing superseded map");
            self.request_delete(old);
        }

        info!(%map_id, "map saved");
        self.engine.stop_session();
        self.rendered = true;
        self.enter(SessionState::Localized);
        true
    }

    fn on_map_deleted(&mut self, map_id: MapId, deleted: bool) -> bool {
        if !deleted {
            let e = FurnishError::EngineDeleteFailed { map_id };
            warn!(error = %e, "keeping map identifier for a later retry");
            self.last_error = Some(e);
            return false;
        }

        info!(%map_id, "map deleted");
        if self.saved_map_id().as_deref() == Some(map_id.as_str()) {
            if let Err(e) = self.settings.remove(&self.config.map_id_key) {
                error!(%map_id, error = %e, "could not clear saved map identifier");
                self.last_error = Some(e);
            }
        }
        true
    }

    fn on_status_changed(&mut self, previous: MappingStatus, current: MappingStatus) -> bool {
        debug!(?previous, ?current, state = %self.state, "engine status changed");
        if self.state != SessionState::Relocalizing
            || previous == MappingStatus::Running
            || current != MappingStatus::Running
            || self.rendered
        {
            return false;
        }

        info!("relocalized against saved map");
        self.replay();
        self.rendered = true;
        self.enter(SessionState::Localized);
        true
    }

    // ========================================================================
    // Internals
    // ========================================================================

    /// Instantiate one model per stored record, in store order.
    fn replay(&mut self) {
        self.renderer.clear_models();
        let mut shown = 0usize;
        for (index, record) in self.store.records().iter().enumerate() {
            if !self.config.catalog.contains(record.model_type) {
                warn!(index, model_type = record.model_type, "skipping unknown model type");
                continue;
            }
            self.renderer
                .instantiate_model(record.model_type, &record.transform);
            shown += 1;
        }
        info!(shown, stored = self.store.len(), "placements replayed");
    }

    fn begin_mapping(&mut self) {
        self.engine.start_session();
        self.enter(SessionState::Mapping);
    }

    fn spawn_poller(&mut self) {
        if let Some(previous) = self.poller.take() {
            previous.abort();
        }
        self.poller = Some(spawn_readiness_poller(
            self.engine.clone(),
            self.config.readiness_poll_interval(),
            self.epoch(),
            self.epoch.clone(),
            self.events_tx.clone(),
        ));
    }

    fn request_delete(&mut self, map_id: MapId) {
        let tx = self.events_tx.clone();
        let epoch = self.epoch();
        let tagged = map_id.clone();
        self.engine.delete_map(
            &map_id,
            Box::new(move |deleted| {
                let _ = tx.send(Envelope::new(
                    epoch,
                    SessionEvent::MapDeleted {
                        map_id: tagged,
                        deleted,
                    },
                ));
            }),
        );
    }

    fn enter(&mut self, next: SessionState) {
        if self.state != next {
            debug!(from = %self.state, to = %next, epoch = self.epoch(), "state transition");
            self.state = next;
        }
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        if let Some(poller) = self.poller.take() {
            poller.abort();
        }
    }
}
