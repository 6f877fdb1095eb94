//! Fixed-layout placement record codec
//!
//! Each record is 16 transform floats followed by the model type, every field
//! 4 bytes wide in the producing machine's native byte order. There is no
//! header or version tag: the record count is the buffer length divided by
//! [`RECORD_WIDTH`].

use crate::error::{FurnishError, Result};
use crate::placement::record::{PlacementRecord, Transform};

/// Number of floats in a serialized transform.
const TRANSFORM_FLOATS: usize = 16;

/// Width of one field in bytes.
const FIELD_WIDTH: usize = 4;

/// Width of one serialized record in bytes.
pub const RECORD_WIDTH: usize = (TRANSFORM_FLOATS + 1) * FIELD_WIDTH;

/// Serialize records in order.
pub fn encode(records: &[PlacementRecord]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(records.len() * RECORD_WIDTH);
    for record in records {
        for value in record.transform.as_slice() {
            bytes.extend_from_slice(&value.to_ne_bytes());
        }
        bytes.extend_from_slice(&record.model_type.to_ne_bytes());
    }
    bytes
}

/// Deserialize a buffer produced by [`encode`].
///
/// Fails with [`FurnishError::MalformedStore`] when the length is not a
/// multiple of the record width; no partial result is returned.
pub fn decode(bytes: &[u8]) -> Result<Vec<PlacementRecord>> {
    if bytes.len() % RECORD_WIDTH != 0 {
        return Err(FurnishError::MalformedStore {
            len: bytes.len(),
            width: RECORD_WIDTH,
        });
    }

    let records = bytes
        .chunks_exact(RECORD_WIDTH)
        .map(|chunk| {
            let mut values = [0.0f32; TRANSFORM_FLOATS];
            for (i, value) in values.iter_mut().enumerate() {
                *value = f32::from_ne_bytes(field(chunk, i));
            }
            let model_type = u32::from_ne_bytes(field(chunk, TRANSFORM_FLOATS));
            PlacementRecord::new(Transform::from_cols_array(values), model_type)
        })
        .collect();

    Ok(records)
}

fn field(chunk: &[u8], index: usize) -> [u8; FIELD_WIDTH] {
    let start = index * FIELD_WIDTH;
    let mut buf = [0u8; FIELD_WIDTH];
    buf.copy_from_slice(&chunk[start..start + FIELD_WIDTH]);
    buf
}
