//! CLI Command Implementations
//!
//! Implements the actual logic for each CLI command.

use std::path::Path;
use std::sync::Arc;

use log::{info, warn};

use crate::config::SessionConfig;
use crate::error::{FurnishError, Result};
use crate::placement::{ModelCatalog, PlacementGateway, PlacementStore, Transform};
use crate::session::mock::{FixedReticle, MockMappingEngine};
use crate::session::{
    CameraFrame, MappingStatus, Renderer, SessionController, SessionPorts, SessionState,
    SettingsStore, TrackingQuality,
};
use crate::settings::JsonSettingsStore;

/// Print every stored placement.
pub fn inspect(config: &SessionConfig, store: Option<&Path>) -> Result<()> {
    let path = store.unwrap_or(config.store_path.as_path());
    info!("Inspecting placement store: {}", path.display());

    if !path.exists() {
        println!("No placement store at {}", path.display());
        return Ok(());
    }

    let store = PlacementStore::load_from(path)?;
    if store.is_empty() {
        println!("Placement store is empty.");
        return Ok(());
    }

    println!("Placements ({}):", store.len());
    println!("{:-<60}", "");
    for (i, record) in store.records().iter().enumerate() {
        let name = config
            .catalog
            .get(record.model_type)
            .map(|asset| asset.name.as_str())
            .unwrap_or("unknown");
        let [x, y, z] = record.transform.translation();
        println!(
            "{:>3}: {:<8} (type {}) at ({:.3}, {:.3}, {:.3})",
            i, name, record.model_type, x, y, z
        );
    }
    println!("{:-<60}", "");

    Ok(())
}

/// Remove local session state without contacting the mapping engine.
pub fn clear(config: &SessionConfig) -> Result<()> {
    info!("Clearing local session state");

    PlacementStore::remove_file(&config.store_path)?;
    let mut settings = JsonSettingsStore::open(&config.settings_path)?;
    if let Some(map_id) = settings.get(&config.map_id_key) {
        warn!("Remote map {} was not deleted", map_id);
        println!("Note: remote map {} is left on the mapping service.", map_id);
        settings.remove(&config.map_id_key)?;
    }

    println!("Session cleared.");
    Ok(())
}

/// Renderer that prints each instantiated model.
struct ConsoleRenderer {
    catalog: ModelCatalog,
}

impl Renderer for ConsoleRenderer {
    fn instantiate_model(&mut self, model_type: u32, transform: &Transform) {
        let name = self
            .catalog
            .get(model_type)
            .map(|asset| asset.name.as_str())
            .unwrap_or("unknown");
        let [x, y, z] = transform.translation();
        println!("  + {} at ({:.2}, {:.2}, {:.2})", name, x, y, z);
    }

    fn clear_models(&mut self) {}
}

fn launch(config: &SessionConfig, engine: Arc<MockMappingEngine>) -> Result<SessionController> {
    let settings = JsonSettingsStore::open(&config.settings_path)?;
    let mut controller = SessionController::new(
        config.clone(),
        SessionPorts {
            engine,
            settings: Box::new(settings),
            renderer: Box::new(ConsoleRenderer {
                catalog: config.catalog.clone(),
            }),
        },
    );
    controller.start()?;
    Ok(controller)
}

fn camera_frame() -> CameraFrame {
    CameraFrame {
        image: vec![0u8; 64],
        pose: Transform::IDENTITY,
        tracking: TrackingQuality::Normal { has_surfaces: true },
    }
}

/// Map the room, place models, save.
fn map_and_save(
    controller: &mut SessionController,
    engine: &MockMappingEngine,
    placements: usize,
) -> Result<()> {
    engine.set_initialized(true);
    controller.on_frame(&camera_frame());

    let mut gateway = PlacementGateway::new(FixedReticle::no_surface());
    for i in 0..placements {
        gateway
            .reticle_mut()
            .move_to(Some(Transform::from_translation(i as f32 * 0.75, 0.0, -1.0)));
        gateway.place_next(controller)?;
        controller.on_frame(&camera_frame());
    }
    if controller.state() == SessionState::Mapping {
        controller.finalize()?;
    }

    let map_id = uuid::Uuid::new_v4().to_string();
    engine.finish_save(Some(&map_id));
    controller.pump();

    match controller.last_error() {
        Some(e) if controller.state() != SessionState::Localized => {
            Err(FurnishError::EngineSaveFailed {
                reason: e.to_string(),
            })
        }
        _ => {
            println!("Saved map {}", map_id);
            Ok(())
        }
    }
}

/// Wait for the engine, download the saved map, relocalize and replay.
async fn relocalize(controller: &mut SessionController, engine: &MockMappingEngine) {
    println!("Waiting for the mapping engine...");
    engine.set_initialized(true);
    controller
        .run_until(|c| c.state() != SessionState::WaitingDownload || engine.has_pending_load())
        .await;

    engine.complete_download();
    controller.pump();
    controller.on_frame(&camera_frame());

    println!("Relocalized, restoring models:");
    engine.emit_status(MappingStatus::Lost, MappingStatus::Running);
    controller.pump();
}

/// Run a two-launch session against the simulated engine.
pub async fn simulate(dir: &Path, placements: usize) -> Result<()> {
    info!("Simulating session in: {}", dir.display());

    let mut config = SessionConfig::in_dir(dir);
    config.required_placements = Some(placements.max(1));
    config.validate()?;

    println!("Launch 1");
    let engine = Arc::new(MockMappingEngine::new());
    let mut controller = launch(&config, engine.clone())?;
    match controller.state() {
        SessionState::Mapping => map_and_save(&mut controller, &engine, placements.max(1))?,
        _ => relocalize(&mut controller, &engine).await,
    }
    drop(controller);

    println!("Launch 2");
    let engine = Arc::new(MockMappingEngine::new());
    let mut controller = launch(&config, engine.clone())?;
    if controller.state() == SessionState::WaitingDownload {
        relocalize(&mut controller, &engine).await;
    }

    println!(
        "Final state: {} ({} placements stored)",
        controller.state(),
        controller.store().len()
    );
    Ok(())
}
