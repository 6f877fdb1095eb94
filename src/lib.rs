//! Furnish - Persistent AR Furniture Placement
//!
//! Furnish lets a user drop virtual furniture into a physical room and have
//! it reappear in the same places on a later run, once the device has
//! relocalized against the saved map.
//!
//! # Architecture
//!
//! - Placement: fixed-layout records, their codec, and the on-disk store
//! - Session: the state machine that drives an external mapping engine
//!   through map, save, download, relocalize and replay
//! - Settings/Config: the saved map identifier and runtime configuration

pub mod cli;
pub mod config;
pub mod error;
pub mod placement;
pub mod session;
pub mod settings;

pub use config::SessionConfig;
pub use error::{FurnishError, Result};
pub use placement::{PlacementGateway, PlacementRecord, PlacementStore, Transform};
pub use session::{SessionController, SessionPorts, SessionState};
pub use settings::JsonSettingsStore;
