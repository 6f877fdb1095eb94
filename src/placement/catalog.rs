//! Model catalog
//!
//! The fixed, ordered list of placeable models. A record's `model_type` is an
//! index into this list. The catalog may change between runs, so records are
//! checked against it when they are loaded and replayed, never when saved.

use serde::{Deserialize, Serialize};

/// One placeable model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelAsset {
    /// Short display name (e.g., "Chair")
    pub name: String,
    /// Asset path relative to the renderer's asset root
    pub asset_path: String,
}

impl ModelAsset {
    pub fn new(name: &str, asset_path: &str) -> Self {
        Self {
            name: name.to_string(),
            asset_path: asset_path.to_string(),
        }
    }
}

/// Ordered catalog of placeable models.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelCatalog {
    models: Vec<ModelAsset>,
}

impl ModelCatalog {
    /// Create a catalog from an ordered list of assets
    pub fn new(models: Vec<ModelAsset>) -> Self {
        Self { models }
    }

    /// The furniture set shipped with the app
    pub fn furniture() -> Self {
        Self::new(vec![
            ModelAsset::new("Chair", "Chair/model.obj"),
            ModelAsset::new("Guitar", "Guitar/WashburnGuitar.obj"),
            ModelAsset::new("Light", "Light/model.obj"),
        ])
    }

    /// Look up a model by its type tag
    pub fn get(&self, model_type: u32) -> Option<&ModelAsset> {
        usize::try_from(model_type)
            .ok()
            .and_then(|index| self.models.get(index))
    }

    /// Check whether a type tag names a catalog entry
    pub fn contains(&self, model_type: u32) -> bool {
        self.get(model_type).is_some()
    }

    /// Type tag of the model that follows `placed` placements, cycling
    /// through the catalog. `None` for an empty catalog.
    pub fn nth_cyclic(&self, placed: usize) -> Option<u32> {
        if self.models.is_empty() {
            return None;
        }
        u32::try_from(placed % self.models.len()).ok()
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ModelAsset> {
        self.models.iter()
    }
}

impl Default for ModelCatalog {
    fn default() -> Self {
        Self::furniture()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_furniture_catalog() {
        let catalog = ModelCatalog::furniture();
        assert_eq!(catalog.len(), 3);
        assert_eq!(catalog.get(0).unwrap().name, "Chair");
        assert_eq!(catalog.get(2).unwrap().asset_path, "Light/model.obj");
        assert!(catalog.get(3).is_none());
        assert!(!catalog.contains(u32::MAX));
    }

    #[test]
    fn test_nth_cyclic_wraps() {
        let catalog = ModelCatalog::furniture();
        assert_eq!(catalog.nth_cyclic(0), Some(0));
        assert_eq!(catalog.nth_cyclic(2), Some(2));
        assert_eq!(catalog.nth_cyclic(4), Some(1));
        assert_eq!(ModelCatalog::new(Vec::new()).nth_cyclic(0), None);
    }

    #[test]
    fn test_catalog_json_roundtrip() {
        let catalog = ModelCatalog::furniture();
        let json = serde_json::to_string(&catalog).unwrap();
        let parsed: ModelCatalog = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, catalog);
    }
}
