//! Placement record types
//!
//! A placement record pairs an object pose in map coordinates with a tag
//! naming which catalog model sits there.

use std::fmt;

use serde::{Deserialize, Serialize};

/// 4x4 homogeneous transform, stored column-major as the renderer lays it out.
///
/// Element `(row, col)` lives at index `col * 4 + row`, so the translation
/// occupies indices 12, 13 and 14.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform([f32; 16]);

impl Transform {
    /// The identity pose.
    pub const IDENTITY: Transform = Transform([
        1.0, 0.0, 0.0, 0.0, //
        0.0, 1.0, 0.0, 0.0, //
        0.0, 0.0, 1.0, 0.0, //
        0.0, 0.0, 0.0, 1.0,
    ]);

    /// Build a transform from 16 column-major values.
    pub fn from_cols_array(values: [f32; 16]) -> Self {
        Self(values)
    }

    /// Pure translation.
    pub fn from_translation(x: f32, y: f32, z: f32) -> Self {
        let mut values = Self::IDENTITY.0;
        values[12] = x;
        values[13] = y;
        values[14] = z;
        Self(values)
    }

    /// The 16 column-major values.
    pub fn to_cols_array(&self) -> [f32; 16] {
        self.0
    }

    pub fn as_slice(&self) -> &[f32; 16] {
        &self.0
    }

    /// Element at `(row, col)`.
    pub fn get(&self, row: usize, col: usize) -> f32 {
        self.0[col * 4 + row]
    }

    /// Translation component `[x, y, z]`.
    pub fn translation(&self) -> [f32; 3] {
        [self.0[12], self.0[13], self.0[14]]
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// One placed virtual object.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlacementRecord {
    /// Object pose in map coordinates.
    pub transform: Transform,
    /// Index into the model catalog.
    pub model_type: u32,
}

impl PlacementRecord {
    pub fn new(transform: Transform, model_type: u32) -> Self {
        Self {
            transform,
            model_type,
        }
    }
}

impl fmt::Display for PlacementRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [x, y, z] = self.transform.translation();
        write!(
            f,
            "model {} at ({:.3}, {:.3}, {:.3})",
            self.model_type, x, y, z
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_translation_is_last_column() {
        let t = Transform::from_translation(1.5, -2.0, 3.25);
        assert_eq!(t.translation(), [1.5, -2.0, 3.25]);
        assert_eq!(t.get(0, 3), 1.5);
        assert_eq!(t.get(3, 3), 1.0);
        assert_eq!(t.get(3, 0), 0.0);
    }

    #[test]
    fn test_default_is_identity() {
        let t = Transform::default();
        for row in 0..4 {
            for col in 0..4 {
                let expected = if row == col { 1.0 } else { 0.0 };
                assert_eq!(t.get(row, col), expected);
            }
        }
    }

    #[test]
    fn test_display() {
        let record = PlacementRecord::new(Transform::from_translation(1.0, 0.0, -0.5), 2);
        assert_eq!(record.to_string(), "model 2 at (1.000, 0.000, -0.500)");
    }
}
