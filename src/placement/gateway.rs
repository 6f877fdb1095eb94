//! Placement Gateway
//!
//! Turns a placement gesture into a record: reads the reticle pose, tags it
//! with a model type and hands it to the session controller, which stores
//! and shows it.

use tracing::debug;

use crate::error::{FurnishError, Result};
use crate::placement::catalog::ModelAsset;
use crate::placement::record::{PlacementRecord, Transform};
use crate::session::SessionController;

/// Where a model would land if placed now.
pub trait ReticleSource {
    /// Current placement transform, or `None` when no surface is in view.
    fn placement_transform(&self) -> Option<Transform>;
}

pub struct PlacementGateway<R: ReticleSource> {
    reticle: R,
}

impl<R: ReticleSource> PlacementGateway<R> {
    pub fn new(reticle: R) -> Self {
        Self { reticle }
    }

    pub fn reticle(&self) -> &R {
        &self.reticle
    }

    pub fn reticle_mut(&mut self) -> &mut R {
        &mut self.reticle
    }

    /// Place `model_type` at the reticle.
    ///
    /// Outside `Mapping` this fails with `NotAcceptingPlacements` and leaves
    /// the store untouched.
    pub fn place_model(
        &self,
        controller: &mut SessionController,
        model_type: u32,
    ) -> Result<PlacementRecord> {
        let state = controller.state();
        if !state.accepts_placements() {
            debug!(%state, model_type, "placement rejected");
            return Err(FurnishError::NotAcceptingPlacements { state });
        }

        if !controller.catalog().contains(model_type) {
            return Err(FurnishError::UnknownModelType {
                model_type,
                catalog_len: controller.catalog().len(),
            });
        }

        let transform = self
            .reticle
            .placement_transform()
            .ok_or(FurnishError::NoPlacementSurface)?;

        let record = PlacementRecord::new(transform, model_type);
        controller.append_placement(record)?;
        Ok(record)
    }

    /// Place whichever model is currently previewed.
    pub fn place_next(&self, controller: &mut SessionController) -> Result<PlacementRecord> {
        let state = controller.state();
        if !state.accepts_placements() {
            return Err(FurnishError::NotAcceptingPlacements { state });
        }
        let model_type = self.next_model_type(controller).ok_or_else(|| {
            FurnishError::ConfigError {
                reason: "model catalog is empty".to_string(),
            }
        })?;
        self.place_model(controller, model_type)
    }

    /// Model type the next placement would use; cycles through the catalog.
    pub fn next_model_type(&self, controller: &SessionController) -> Option<u32> {
        if !controller.state().accepts_placements() {
            return None;
        }
        controller.catalog().nth_cyclic(controller.store().len())
    }

    /// Asset to preview on the reticle, if placements are open.
    pub fn preview<'a>(&self, controller: &'a SessionController) -> Option<&'a ModelAsset> {
        self.next_model_type(controller)
            .and_then(|model_type| controller.catalog().get(model_type))
    }
}
