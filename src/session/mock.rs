//! In-process stand-ins for the external collaborators
//!
//! These don't talk to a real mapping engine, renderer or settings store.
//! They record what the controller asked for and hold engine callbacks until
//! the caller decides how each request ends, so every transition of the
//! session can be driven deterministically.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::{FurnishError, Result};
use crate::placement::gateway::ReticleSource;
use crate::placement::record::Transform;
use crate::session::ports::{
    DeleteCallback, MapId, MappingEngine, MappingStatus, ProgressCallback, Renderer,
    SaveCallback, SettingsStore, StatusListener, TransferProgress,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A request the controller made of the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCall {
    StartSession,
    StopSession,
    SaveMap,
    LoadMap(MapId),
    DeleteMap(MapId),
}

/// Scriptable mapping engine.
///
/// Frames are counted rather than logged as calls.
#[derive(Default)]
pub struct MockMappingEngine {
    initialized: AtomicBool,
    frames: AtomicUsize,
    calls: Mutex<Vec<EngineCall>>,
    pending_save: Mutex<Option<(SaveCallback, ProgressCallback)>>,
    pending_load: Mutex<Option<ProgressCallback>>,
    pending_deletes: Mutex<VecDeque<(MapId, DeleteCallback)>>,
    listener: Mutex<Option<StatusListener>>,
}

impl MockMappingEngine {
    /// An engine that has not finished initializing
    pub fn new() -> Self {
        Self::default()
    }

    /// An engine that is already initialized
    pub fn ready() -> Self {
        let engine = Self::new();
        engine.set_initialized(true);
        engine
    }

    pub fn set_initialized(&self, initialized: bool) {
        self.initialized.store(initialized, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<EngineCall> {
        lock(&self.calls).clone()
    }

    pub fn call_count(&self, call: &EngineCall) -> usize {
        lock(&self.calls).iter().filter(|c| *c == call).count()
    }

    /// Map ids passed to `load_map`, in order
    pub fn loaded_maps(&self) -> Vec<MapId> {
        lock(&self.calls)
            .iter()
            .filter_map(|c| match c {
                EngineCall::LoadMap(id) => Some(id.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn frame_count(&self) -> usize {
        self.frames.load(Ordering::SeqCst)
    }

    pub fn has_pending_save(&self) -> bool {
        lock(&self.pending_save).is_some()
    }

    pub fn has_pending_load(&self) -> bool {
        lock(&self.pending_load).is_some()
    }

    /// Report upload progress for the pending save
    pub fn report_upload(&self, progress: TransferProgress) -> bool {
        match lock(&self.pending_save).as_mut() {
            Some((_, on_upload)) => {
                on_upload(progress);
                true
            }
            None => false,
        }
    }

    /// Finish the pending save. `None` reports a failed save.
    pub fn finish_save(&self, map_id: Option<&str>) -> bool {
        let pending = lock(&self.pending_save).take();
        match pending {
            Some((on_saved, _)) => {
                on_saved(map_id.map(str::to_string));
                true
            }
            None => false,
        }
    }

    /// Report download progress for the pending load; a completed or
    /// faulted report ends the load.
    pub fn report_download(&self, progress: TransferProgress) -> bool {
        let mut pending = lock(&self.pending_load);
        match pending.as_mut() {
            Some(on_download) => {
                on_download(progress);
                if progress.completed || progress.faulted {
                    *pending = None;
                }
                true
            }
            None => false,
        }
    }

    pub fn complete_download(&self) -> bool {
        self.report_download(TransferProgress::completed())
    }

    /// Finish the oldest pending delete; returns the map id it was for
    pub fn finish_delete(&self, deleted: bool) -> Option<MapId> {
        let pending = lock(&self.pending_deletes).pop_front();
        pending.map(|(map_id, on_deleted)| {
            on_deleted(deleted);
            map_id
        })
    }

    /// Deliver a status change to the registered listener
    pub fn emit_status(&self, previous: MappingStatus, current: MappingStatus) {
        if let Some(listener) = lock(&self.listener).as_ref() {
            listener(previous, current);
        }
    }

    fn record(&self, call: EngineCall) {
        lock(&self.calls).push(call);
    }
}

impl MappingEngine for MockMappingEngine {
    fn initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    fn start_session(&self) {
        self.record(EngineCall::StartSession);
    }

    fn stop_session(&self) {
        self.record(EngineCall::StopSession);
    }

    fn set_frame(&self, _image: &[u8], _pose: &Transform) {
        self.frames.fetch_add(1, Ordering::SeqCst);
    }

    fn save_map(&self, on_saved: SaveCallback, on_upload: ProgressCallback) {
        self.record(EngineCall::SaveMap);
        *lock(&self.pending_save) = Some((on_saved, on_upload));
    }

    fn load_map(&self, map_id: &str, on_download: ProgressCallback) {
        self.record(EngineCall::LoadMap(map_id.to_string()));
        *lock(&self.pending_load) = Some(on_download);
    }

    fn delete_map(&self, map_id: &str, on_deleted: DeleteCallback) {
        self.record(EngineCall::DeleteMap(map_id.to_string()));
        lock(&self.pending_deletes).push_back((map_id.to_string(), on_deleted));
    }

    fn set_status_listener(&self, listener: StatusListener) {
        *lock(&self.listener) = Some(listener);
    }
}

/// Settings kept in memory. Clones share the same map.
#[derive(Debug, Clone, Default)]
pub struct MemorySettings {
    values: Arc<Mutex<HashMap<String, String>>>,
    read_only: Arc<AtomicBool>,
}

impl MemorySettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(key: &str, value: &str) -> Self {
        let settings = Self::new();
        lock(&settings.values).insert(key.to_string(), value.to_string());
        settings
    }

    /// While set, every write fails and leaves the values untouched
    pub fn set_read_only(&self, read_only: bool) {
        self.read_only.store(read_only, Ordering::SeqCst);
    }

    fn check_writable(&self) -> Result<()> {
        if self.read_only.load(Ordering::SeqCst) {
            return Err(FurnishError::Settings {
                reason: "settings are read-only".to_string(),
            });
        }
        Ok(())
    }
}

impl SettingsStore for MemorySettings {
    fn get(&self, key: &str) -> Option<String> {
        lock(&self.values).get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.check_writable()?;
        lock(&self.values).insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        self.check_writable()?;
        lock(&self.values).remove(key);
        Ok(())
    }
}

/// Renderer that records instantiations. Clones share the same log.
#[derive(Debug, Clone, Default)]
pub struct RecordingRenderer {
    log: Arc<Mutex<RenderLog>>,
}

#[derive(Debug, Default)]
struct RenderLog {
    instantiated: Vec<(u32, Transform)>,
    on_screen: usize,
    clears: usize,
}

impl RecordingRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every instantiation since creation, in call order
    pub fn instantiated(&self) -> Vec<(u32, Transform)> {
        lock(&self.log).instantiated.clone()
    }

    pub fn instantiation_count(&self) -> usize {
        lock(&self.log).instantiated.len()
    }

    /// Models currently in the scene
    pub fn on_screen(&self) -> usize {
        lock(&self.log).on_screen
    }

    pub fn clear_count(&self) -> usize {
        lock(&self.log).clears
    }
}

impl Renderer for RecordingRenderer {
    fn instantiate_model(&mut self, model_type: u32, transform: &Transform) {
        let mut log = lock(&self.log);
        log.instantiated.push((model_type, *transform));
        log.on_screen += 1;
    }

    fn clear_models(&mut self) {
        let mut log = lock(&self.log);
        log.on_screen = 0;
        log.clears += 1;
    }
}

/// Reticle parked at a fixed transform; `None` means no surface in view.
#[derive(Debug, Clone, Default)]
pub struct FixedReticle {
    transform: Option<Transform>,
}

impl FixedReticle {
    pub fn at(transform: Transform) -> Self {
        Self {
            transform: Some(transform),
        }
    }

    pub fn no_surface() -> Self {
        Self { transform: None }
    }

    pub fn move_to(&mut self, transform: Option<Transform>) {
        self.transform = transform;
    }
}

impl ReticleSource for FixedReticle {
    fn placement_transform(&self) -> Option<Transform> {
        self.transform
    }
}
