use std::sync::Arc;

use crate::depth::sample::DepthSample;
use crate::foundation::core::{Dimensions, Rgba8, Vec3};
use crate::foundation::error::{OdsError, OdsResult};

/// One calibrated reference panorama: camera position, RGBA8 color and per-pixel depth.
///
/// Color and depth share the view's dimensions. Pixel buffers are reference counted so rigs and
/// views clone cheaply.
#[derive(Clone, Debug)]
pub struct ReferenceView {
    name: String,
    position: Vec3,
    dims: Dimensions,
    color: Arc<Vec<u8>>,
    depth: Arc<DepthSample>,
}

impl ReferenceView {
    /// Build a reference view.
    ///
    /// `color_rgba8` must hold `width * height` straight-alpha RGBA8 pixels. A depth sample with
    /// different dimensions is accepted with a warning and re-indexed onto the color grid.
    pub fn new(
        name: impl Into<String>,
        position: Vec3,
        dims: Dimensions,
        color_rgba8: Vec<u8>,
        depth: DepthSample,
    ) -> OdsResult<Self> {
        let name = name.into();
        if !position.is_finite() {
            return Err(OdsError::validation(format!(
                "view '{name}' position must be finite (got {position})"
            )));
        }
        let expected = dims
            .checked_pixel_count()
            .and_then(|n| n.checked_mul(4))
            .ok_or_else(|| OdsError::validation(format!("view '{name}' dimensions overflow")))?;
        if color_rgba8.len() != expected {
            return Err(OdsError::validation(format!(
                "view '{name}' color buffer is {} bytes, expected {expected} for {}x{} RGBA8",
                color_rgba8.len(),
                dims.width,
                dims.height
            )));
        }

        let depth_dims = depth.dimensions();
        let depth = if depth_dims != dims {
            tracing::warn!(
                view = %name,
                color_width = dims.width,
                color_height = dims.height,
                depth_width = depth_dims.width,
                depth_height = depth_dims.height,
                "width/height of color and depth images do not match; using color dimensions"
            );
            depth.reindexed(dims)?
        } else {
            depth
        };

        Ok(Self {
            name,
            position,
            dims,
            color: Arc::new(color_rgba8),
            depth: Arc::new(depth),
        })
    }

    /// Human-readable view name (used in logs).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// World-space camera position.
    pub fn position(&self) -> Vec3 {
        self.position
    }

    /// Pixel dimensions of color and depth.
    pub fn dimensions(&self) -> Dimensions {
        self.dims
    }

    /// Row-major RGBA8 color bytes.
    pub fn color_rgba8(&self) -> &[u8] {
        &self.color
    }

    /// Decoded depth.
    pub fn depth(&self) -> &DepthSample {
        &self.depth
    }

    /// Color of texel `(x, y)`.
    pub fn color_at(&self, x: u32, y: u32) -> Rgba8 {
        let i = self.dims.index(x, y) * 4;
        Rgba8::from_slice(&self.color[i..i + 4])
    }

    /// Squared distance from the camera to `p`.
    pub fn distance2_to(&self, p: Vec3) -> f32 {
        self.position.distance_squared(p)
    }
}

/// Ordered set of reference views sharing one panorama size.
///
/// Insertion order is calibration order; the first two entries double as the fixed stereo pair
/// of [`crate::SelectionStrategy::FixedPairFirst`].
#[derive(Clone, Debug)]
pub struct CameraRig {
    dims: Dimensions,
    views: Vec<ReferenceView>,
}

impl CameraRig {
    /// Build a rig from fully loaded views. The rig must be non-empty and every view must share
    /// the dimensions of the first one.
    pub fn new(views: Vec<ReferenceView>) -> OdsResult<Self> {
        let Some(first) = views.first() else {
            return Err(OdsError::validation("camera rig must contain at least one view"));
        };
        let dims = first.dimensions();
        if let Some(bad) = views.iter().find(|v| v.dimensions() != dims) {
            return Err(OdsError::validation(format!(
                "view '{}' is {}x{}, but the rig is {}x{}",
                bad.name(),
                bad.dimensions().width,
                bad.dimensions().height,
                dims.width,
                dims.height
            )));
        }
        Ok(Self { dims, views })
    }

    /// Panorama dimensions shared by every view (one eye of the output).
    pub fn dimensions(&self) -> Dimensions {
        self.dims
    }

    /// Number of views, always `> 0`.
    pub fn num_views(&self) -> usize {
        self.views.len()
    }

    /// All views in calibration order.
    pub fn views(&self) -> &[ReferenceView] {
        &self.views
    }

    /// View at `index`.
    pub fn view(&self, index: usize) -> OdsResult<&ReferenceView> {
        self.views.get(index).ok_or_else(|| {
            OdsError::invalid_argument(format!(
                "view index {index} out of range for rig of {} views",
                self.views.len()
            ))
        })
    }
}

#[cfg(test)]
#[path = "../../tests/unit/rig/model.rs"]
mod tests;
