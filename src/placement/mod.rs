//! Placement Module
//!
//! Placement records, their fixed-layout binary codec, the persisted
//! placement store, the model catalog, and the gateway that turns UI
//! gestures into records.

pub mod catalog;
pub mod codec;
pub mod gateway;
pub mod record;
pub mod store;

pub use catalog::{ModelAsset, ModelCatalog};
pub use codec::{decode, encode, RECORD_WIDTH};
pub use gateway::{PlacementGateway, ReticleSource};
pub use record::{PlacementRecord, Transform};
pub use store::PlacementStore;
