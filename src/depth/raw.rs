use crate::depth::sample::{DepthSample, validate_range};
use crate::foundation::core::Dimensions;
use crate::foundation::error::{OdsError, OdsResult};

/// Decode an uncompressed depth buffer: `width * height` little-endian `f32` values, row-major.
///
/// Raw buffers carry no header, so dimensions and clip range come from the caller. Values that are
/// non-finite, `<= 0` or `>= far` become the sentinel; the rest are clamped to `[near, far]`.
pub fn decode_raw_f32(bytes: &[u8], dims: Dimensions, near: f32, far: f32) -> OdsResult<DepthSample> {
    validate_range(near, far).map_err(OdsError::validation)?;
    let expected = dims
        .checked_pixel_count()
        .and_then(|n| n.checked_mul(4))
        .ok_or_else(|| OdsError::format("raw depth dimensions overflow usize"))?;
    if bytes.len() != expected {
        return Err(OdsError::format(format!(
            "raw depth buffer is {} bytes, expected {expected} for {}x{} f32 samples",
            bytes.len(),
            dims.width,
            dims.height
        )));
    }

    let values = bytes
        .chunks_exact(4)
        .map(|b| {
            let v = f32::from_le_bytes([b[0], b[1], b[2], b[3]]);
            if !v.is_finite() || v <= 0.0 || v >= far {
                far
            } else {
                v.clamp(near, far)
            }
        })
        .collect();

    Ok(DepthSample::from_parts_unchecked(dims, near, far, values))
}

/// Serialize a depth sample as raw little-endian `f32` values.
pub fn encode_raw_f32(sample: &DepthSample) -> Vec<u8> {
    sample
        .values()
        .iter()
        .flat_map(|v| v.to_le_bytes())
        .collect()
}

#[cfg(test)]
#[path = "../../tests/unit/depth/raw.rs"]
mod tests;
