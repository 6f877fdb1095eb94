//! Session Scenario Tests
//!
//! End-to-end runs of the placement session against the in-process engine:
//! first launch, save, relaunch, download, relocalize and replay, reset.

use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use tempfile::{tempdir, TempDir};
use tokio::time::timeout;

use furnish::placement::{PlacementGateway, PlacementRecord, PlacementStore, Transform};
use furnish::session::mock::{
    EngineCall, FixedReticle, MemorySettings, MockMappingEngine, RecordingRenderer,
};
use furnish::session::{
    CameraFrame, MappingStatus, SessionController, SessionPorts, SessionState, SettingsStore,
    TrackingQuality,
};
use furnish::{FurnishError, SessionConfig};

const WAIT: Duration = Duration::from_secs(2);

struct Launch {
    engine: Arc<MockMappingEngine>,
    settings: MemorySettings,
    renderer: RecordingRenderer,
    controller: SessionController,
}

fn config(dir: &TempDir) -> SessionConfig {
    let mut config = SessionConfig::in_dir(dir.path());
    config.readiness_poll_interval_ms = 5;
    config.required_placements = None;
    config
}

fn launch(config: SessionConfig, settings: MemorySettings, engine: MockMappingEngine) -> Launch {
    let engine = Arc::new(engine);
    let renderer = RecordingRenderer::new();
    let controller = SessionController::new(
        config,
        SessionPorts {
            engine: engine.clone(),
            settings: Box::new(settings.clone()),
            renderer: Box::new(renderer.clone()),
        },
    );
    Launch {
        engine,
        settings,
        renderer,
        controller,
    }
}

fn record(x: f32, model_type: u32) -> PlacementRecord {
    PlacementRecord::new(Transform::from_translation(x, 0.0, -1.0), model_type)
}

fn frame() -> CameraFrame {
    CameraFrame {
        image: vec![7u8; 32],
        pose: Transform::IDENTITY,
        tracking: TrackingQuality::Normal { has_surfaces: true },
    }
}

fn seed_saved_session(config: &SessionConfig, records: &[PlacementRecord]) -> MemorySettings {
    PlacementStore::from_records(records.to_vec())
        .save_to(&config.store_path)
        .unwrap();
    MemorySettings::with_value(&config.map_id_key, "saved-map")
}

/// Bring a relaunched session up to `Relocalizing`.
async fn download(l: &mut Launch) {
    l.engine.set_initialized(true);
    timeout(WAIT, l.controller.process_next()).await.unwrap();
    assert!(l.engine.complete_download());
    l.controller.pump();
    assert_eq!(l.controller.state(), SessionState::Relocalizing);
}

// === Launch Decisions ===

#[tokio::test]
async fn test_first_launch_enters_mapping_immediately() {
    let dir = tempdir().unwrap();
    let mut l = launch(config(&dir), MemorySettings::new(), MockMappingEngine::new());

    l.controller.start().unwrap();

    assert_eq!(l.controller.state(), SessionState::Mapping);
    assert_eq!(l.engine.calls(), vec![EngineCall::StartSession]);
    assert!(l.controller.on_frame(&frame()));
    assert_eq!(l.engine.frame_count(), 1);
}

#[tokio::test]
async fn test_saved_session_waits_for_engine_before_loading() {
    let dir = tempdir().unwrap();
    let config = config(&dir);
    let settings = seed_saved_session(&config, &[record(0.0, 0), record(1.0, 1), record(2.0, 2)]);
    let mut l = launch(config, settings, MockMappingEngine::new());

    l.controller.start().unwrap();
    assert_eq!(l.controller.state(), SessionState::WaitingDownload);
    assert_eq!(l.controller.store().len(), 3);

    // Several poll intervals pass without the engine initializing.
    tokio::time::sleep(Duration::from_millis(40)).await;
    assert_eq!(l.controller.pump(), 0);
    assert!(l.engine.loaded_maps().is_empty());
    assert!(!l.controller.on_frame(&frame()));

    l.engine.set_initialized(true);
    assert!(timeout(WAIT, l.controller.process_next()).await.unwrap());
    assert_eq!(l.engine.loaded_maps(), vec!["saved-map".to_string()]);
    assert_eq!(l.controller.state(), SessionState::WaitingDownload);
}

#[tokio::test]
async fn test_download_then_relocalize_replays_in_order() {
    let dir = tempdir().unwrap();
    let config = config(&dir);
    let records = [record(0.0, 2), record(1.0, 0), record(2.0, 1)];
    let settings = seed_saved_session(&config, &records);
    let mut l = launch(config, settings, MockMappingEngine::new());
    l.controller.start().unwrap();

    download(&mut l).await;
    assert_eq!(l.engine.call_count(&EngineCall::StartSession), 1);
    assert!(l.controller.on_frame(&frame()));
    assert_eq!(l.renderer.instantiation_count(), 0);

    l.engine.emit_status(MappingStatus::Lost, MappingStatus::Running);
    l.controller.pump();

    let replayed: Vec<(u32, Transform)> = records.iter().map(|r| (r.model_type, r.transform)).collect();
    assert_eq!(l.renderer.instantiated(), replayed);
    assert_eq!(l.controller.state(), SessionState::Localized);
    assert!(!l.controller.on_frame(&frame()));
}

// === Replay ===

#[tokio::test]
async fn test_replay_fires_once_despite_status_jitter() {
    let dir = tempdir().unwrap();
    let config = config(&dir);
    let settings = seed_saved_session(&config, &[record(0.0, 0), record(1.0, 1), record(2.0, 2)]);
    let mut l = launch(config, settings, MockMappingEngine::new());
    l.controller.start().unwrap();
    download(&mut l).await;

    // Out-of-order reports before the real transition change nothing.
    l.engine.emit_status(MappingStatus::Running, MappingStatus::Running);
    l.engine.emit_status(MappingStatus::Running, MappingStatus::Lost);
    l.controller.pump();
    assert_eq!(l.renderer.instantiation_count(), 0);

    l.engine.emit_status(MappingStatus::Lost, MappingStatus::Running);
    l.engine.emit_status(MappingStatus::Lost, MappingStatus::Running);
    l.engine.emit_status(MappingStatus::Running, MappingStatus::Lost);
    l.engine.emit_status(MappingStatus::Lost, MappingStatus::Running);
    l.controller.pump();

    assert_eq!(l.renderer.instantiation_count(), 3);
    assert!(l.controller.is_rendered());
}

#[tokio::test]
async fn test_large_store_replays_in_insertion_order() {
    let dir = tempdir().unwrap();
    let config = config(&dir);
    let records: Vec<PlacementRecord> = (0..500).map(|i| record(i as f32, (i % 3) as u32)).collect();
    let settings = seed_saved_session(&config, &records);
    let mut l = launch(config, settings, MockMappingEngine::new());
    l.controller.start().unwrap();
    download(&mut l).await;

    l.engine.emit_status(MappingStatus::Waiting, MappingStatus::Running);
    l.controller.pump();

    let xs: Vec<f32> = l
        .renderer
        .instantiated()
        .iter()
        .map(|(_, t)| t.translation()[0])
        .collect();
    let expected: Vec<f32> = (0..500).map(|i| i as f32).collect();
    assert_eq!(xs, expected);
}

#[tokio::test]
async fn test_unknown_model_types_are_skipped_on_replay() {
    let dir = tempdir().unwrap();
    let config = config(&dir);
    let settings = seed_saved_session(&config, &[record(0.0, 0), record(1.0, 99), record(2.0, 2)]);
    let mut l = launch(config, settings, MockMappingEngine::new());
    l.controller.start().unwrap();
    download(&mut l).await;

    l.engine.emit_status(MappingStatus::Lost, MappingStatus::Running);
    l.controller.pump();

    let tags: Vec<u32> = l.renderer.instantiated().iter().map(|(t, _)| *t).collect();
    assert_eq!(tags, vec![0, 2]);
    assert_eq!(l.controller.state(), SessionState::Localized);
}

#[tokio::test]
async fn test_malformed_store_starts_fresh() {
    let dir = tempdir().unwrap();
    let config = config(&dir);
    std::fs::write(&config.store_path, vec![1u8; 68 * 2 + 5]).unwrap();
    let settings = MemorySettings::with_value(&config.map_id_key, "saved-map");
    let mut l = launch(config, settings, MockMappingEngine::new());

    l.controller.start().unwrap();

    assert_eq!(l.controller.state(), SessionState::Mapping);
    assert!(l.controller.store().is_empty());
}

// === Placement ===

#[tokio::test]
async fn test_placement_rejected_outside_mapping() {
    let dir = tempdir().unwrap();
    let config = config(&dir);
    let settings = seed_saved_session(&config, &[record(0.0, 0)]);
    let mut l = launch(config, settings, MockMappingEngine::new());
    let gateway = PlacementGateway::new(FixedReticle::at(Transform::IDENTITY));

    let assert_rejected = |controller: &mut SessionController, expected: SessionState| {
        let before = controller.store().clone();
        match gateway.place_model(controller, 0) {
            Err(FurnishError::NotAcceptingPlacements { state }) => assert_eq!(state, expected),
            other => panic!("expected rejection in {}, got {:?}", expected, other),
        }
        assert_eq!(controller.store(), &before);
    };

    assert_rejected(&mut l.controller, SessionState::Fresh);
    l.controller.start().unwrap();
    assert_rejected(&mut l.controller, SessionState::WaitingDownload);
    download(&mut l).await;
    assert_rejected(&mut l.controller, SessionState::Relocalizing);
    l.engine.emit_status(MappingStatus::Lost, MappingStatus::Running);
    l.controller.pump();
    assert_rejected(&mut l.controller, SessionState::Localized);
}

#[tokio::test]
async fn test_placement_rejected_while_saving() {
    let dir = tempdir().unwrap();
    let mut l = launch(config(&dir), MemorySettings::new(), MockMappingEngine::ready());
    let gateway = PlacementGateway::new(FixedReticle::at(Transform::IDENTITY));
    l.controller.start().unwrap();

    gateway.place_next(&mut l.controller).unwrap();
    l.controller.finalize().unwrap();

    assert!(matches!(
        gateway.place_next(&mut l.controller),
        Err(FurnishError::NotAcceptingPlacements {
            state: SessionState::Saving
        })
    ));
    assert_eq!(l.controller.store().len(), 1);
}

// === Full Lifecycle ===

#[tokio::test]
async fn test_map_save_relaunch_restore() {
    let dir = tempdir().unwrap();
    let mut config = config(&dir);
    config.required_placements = Some(3);
    let settings = MemorySettings::new();

    // First run: place three models; the third saves the session.
    let mut first = launch(config.clone(), settings.clone(), MockMappingEngine::ready());
    first.controller.start().unwrap();
    let mut gateway = PlacementGateway::new(FixedReticle::no_surface());
    for i in 0..3 {
        gateway
            .reticle_mut()
            .move_to(Some(Transform::from_translation(i as f32, 0.0, -2.0)));
        gateway.place_next(&mut first.controller).unwrap();
    }
    assert_eq!(first.controller.state(), SessionState::Saving);
    assert_eq!(first.renderer.instantiation_count(), 3);
    first.engine.finish_save(Some("map-abc"));
    first.controller.pump();
    assert_eq!(first.controller.state(), SessionState::Localized);
    let placed = first.renderer.instantiated();
    drop(first);

    // Second run: same files, same settings.
    let mut second = launch(config, settings, MockMappingEngine::new());
    second.controller.start().unwrap();
    assert_eq!(second.controller.state(), SessionState::WaitingDownload);
    download(&mut second).await;
    assert_eq!(second.engine.loaded_maps(), vec!["map-abc".to_string()]);

    second.engine.emit_status(MappingStatus::Lost, MappingStatus::Running);
    second.controller.pump();
    assert_eq!(second.renderer.instantiated(), placed);
}

// === Reset ===

#[tokio::test]
async fn test_reset_clears_everything_and_restarts_mapping() {
    let dir = tempdir().unwrap();
    let config = config(&dir);
    let store_path = config.store_path.clone();
    let settings = seed_saved_session(&config, &[record(0.0, 0), record(1.0, 1)]);
    let mut l = launch(config, settings, MockMappingEngine::new());
    l.controller.start().unwrap();
    download(&mut l).await;
    l.engine.emit_status(MappingStatus::Lost, MappingStatus::Running);
    l.controller.pump();
    assert_eq!(l.renderer.on_screen(), 2);

    l.controller.reset();

    assert_eq!(l.controller.state(), SessionState::Mapping);
    assert!(l.controller.store().is_empty());
    assert!(!l.controller.is_rendered());
    assert_eq!(l.renderer.on_screen(), 0);
    assert!(PlacementStore::load_from(&store_path).unwrap().is_empty());
    assert!(l.engine.calls().contains(&EngineCall::DeleteMap("saved-map".to_string())));
    assert_eq!(l.engine.calls().last(), Some(&EngineCall::StartSession));

    assert_eq!(l.engine.finish_delete(true), Some("saved-map".to_string()));
    l.controller.pump();
    assert_eq!(l.settings.get("MapID"), None);
    assert!(l.controller.on_frame(&frame()));
}

#[tokio::test]
async fn test_reset_while_waiting_discards_pending_download() {
    let dir = tempdir().unwrap();
    let config = config(&dir);
    let settings = seed_saved_session(&config, &[record(0.0, 0)]);
    let mut l = launch(config, settings, MockMappingEngine::new());
    l.controller.start().unwrap();
    l.engine.set_initialized(true);
    timeout(WAIT, l.controller.process_next()).await.unwrap();
    assert!(l.engine.has_pending_load());

    l.controller.reset();
    l.engine.complete_download();
    l.controller.pump();

    assert_eq!(l.controller.state(), SessionState::Mapping);
    assert_eq!(l.engine.call_count(&EngineCall::StartSession), 1);
}

#[tokio::test]
async fn test_status_change_after_reset_does_not_replay() {
    let dir = tempdir().unwrap();
    let config = config(&dir);
    let settings = seed_saved_session(&config, &[record(0.0, 0)]);
    let mut l = launch(config, settings, MockMappingEngine::new());
    l.controller.start().unwrap();
    download(&mut l).await;

    l.controller.reset();
    l.engine.emit_status(MappingStatus::Lost, MappingStatus::Running);
    l.controller.pump();

    assert_eq!(l.controller.state(), SessionState::Mapping);
    assert_eq!(l.renderer.instantiation_count(), 0);
}
