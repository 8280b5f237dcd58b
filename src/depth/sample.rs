use crate::foundation::core::Dimensions;
use crate::foundation::error::{OdsError, OdsResult};

/// Largest 16-bit disparity value.
const DISPARITY_MAX: f64 = 65535.0;

/// Dense per-pixel scene depth for one reference view.
///
/// Every value lies in `[near, far]`; a value equal to `far` is the "no depth" sentinel. Produced
/// once by a depth decoder and immutable afterwards.
#[derive(Clone, Debug, PartialEq)]
pub struct DepthSample {
    dims: Dimensions,
    near: f32,
    far: f32,
    values: Vec<f32>,
}

impl DepthSample {
    /// Build a validated depth sample from row-major values.
    pub fn new(dims: Dimensions, near: f32, far: f32, values: Vec<f32>) -> OdsResult<Self> {
        validate_range(near, far).map_err(OdsError::validation)?;
        if Some(values.len()) != dims.checked_pixel_count() {
            return Err(OdsError::validation(format!(
                "depth sample has {} values, expected {}x{}",
                values.len(),
                dims.width,
                dims.height
            )));
        }
        if let Some((idx, v)) = values
            .iter()
            .enumerate()
            .find(|(_, v)| !(near..=far).contains(*v))
        {
            return Err(OdsError::validation(format!(
                "depth value {v} at index {idx} lies outside [{near}, {far}]"
            )));
        }
        Ok(Self {
            dims,
            near,
            far,
            values,
        })
    }

    /// Caller guarantees the invariants checked by [`DepthSample::new`].
    pub(crate) fn from_parts_unchecked(
        dims: Dimensions,
        near: f32,
        far: f32,
        values: Vec<f32>,
    ) -> Self {
        debug_assert_eq!(Some(values.len()), dims.checked_pixel_count());
        Self {
            dims,
            near,
            far,
            values,
        }
    }

    /// A sample where every pixel carries the sentinel.
    pub fn empty(dims: Dimensions, near: f32, far: f32) -> OdsResult<Self> {
        let n = dims
            .checked_pixel_count()
            .ok_or_else(|| OdsError::validation("depth dimensions overflow usize"))?;
        Self::new(dims, near, far, vec![far; n])
    }

    /// Near clipping distance.
    pub fn near(&self) -> f32 {
        self.near
    }

    /// Far clipping distance, also the "no depth" sentinel.
    pub fn far(&self) -> f32 {
        self.far
    }

    /// Image dimensions.
    pub fn dimensions(&self) -> Dimensions {
        self.dims
    }

    /// Row-major depth values.
    pub fn values(&self) -> &[f32] {
        &self.values
    }

    /// Raw value at `(x, y)`, including the sentinel.
    pub fn get(&self, x: u32, y: u32) -> f32 {
        self.values[self.dims.index(x, y)]
    }

    /// Depth at `(x, y)`, or `None` when the pixel holds the sentinel.
    pub fn depth_at(&self, x: u32, y: u32) -> Option<f32> {
        let v = self.get(x, y);
        (v < self.far).then_some(v)
    }

    /// Number of pixels that carry a real depth.
    pub fn valid_count(&self) -> usize {
        self.values.iter().filter(|v| **v < self.far).count()
    }

    /// Re-index onto a different grid: pixels present in both keep their value, the rest become
    /// the sentinel.
    pub fn reindexed(&self, dims: Dimensions) -> OdsResult<Self> {
        let mut out = Self::empty(dims, self.near, self.far)?;
        let w = dims.width.min(self.dims.width);
        let h = dims.height.min(self.dims.height);
        for y in 0..h {
            for x in 0..w {
                out.values[dims.index(x, y)] = self.get(x, y);
            }
        }
        Ok(out)
    }
}

pub(crate) fn validate_range(near: f32, far: f32) -> Result<(), String> {
    if !near.is_finite() || !far.is_finite() {
        return Err(format!("near/far must be finite (got {near}, {far})"));
    }
    if near >= far {
        return Err(format!("near must be < far (got {near} >= {far})"));
    }
    Ok(())
}

/// Back-project a 16-bit disparity to a metric depth in `[near, far]`.
///
/// Disparity `0` maps to `far`, `65535` to `near`.
pub fn disparity_to_depth(d16: u16, near: f32, far: f32) -> f32 {
    let (n, f) = (f64::from(near), f64::from(far));
    let norm = 1.0 - f64::from(d16) / DISPARITY_MAX;
    let depth = (2.0 * n * f) / (f + n - (2.0 * norm - 1.0) * (f - n));
    (depth as f32).clamp(near, far)
}

/// Quantize a metric depth to the nearest 16-bit disparity. Inverse of [`disparity_to_depth`].
pub fn depth_to_disparity(depth: f32, near: f32, far: f32) -> u16 {
    let (n, f) = (f64::from(near), f64::from(far));
    let z = f64::from(depth.clamp(near, far));
    let ndc = (f + n - 2.0 * n * f / z) / (f - n);
    let norm = 0.5 * (ndc + 1.0);
    ((1.0 - norm) * DISPARITY_MAX).round().clamp(0.0, DISPARITY_MAX) as u16
}

/// Upper bound on the depth error introduced by 16-bit disparity quantization.
///
/// Depth resolution is coarsest next to `far`, so one disparity step there bounds the error
/// everywhere.
pub fn quantization_error_bound(near: f32, far: f32) -> f32 {
    disparity_to_depth(0, near, far) - disparity_to_depth(1, near, far)
}

#[cfg(test)]
#[path = "../../tests/unit/depth/sample.rs"]
mod tests;
