use std::cell::Cell;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::foundation::core::{Dimensions, Eye, Rgba8};

/// Synthesized ODS frame: left eye stacked above right eye.
///
/// `color` is straight RGBA8 of size `width * 2 * eye_height * 4`; `depth` holds one `f32` per
/// pixel, `+∞` where nothing was written. Row `eye.index() * eye_height + y` holds row `y` of `eye`.
#[derive(Clone, Debug, PartialEq)]
pub struct StereoFrame {
    eye_dims: Dimensions,
    color: Vec<u8>,
    depth: Vec<f32>,
}

impl StereoFrame {
    /// A frame cleared to opaque black at infinite depth.
    pub fn cleared(eye_dims: Dimensions) -> Self {
        let n = eye_dims.pixel_count() * 2;
        let color = std::iter::repeat_n(Rgba8::BLACK.to_array(), n)
            .flatten()
            .collect();
        Self {
            eye_dims,
            color,
            depth: vec![f32::INFINITY; n],
        }
    }

    /// Assemble a frame from the winning cells and the exact depths resolved for them.
    ///
    /// `depths` holds `f32` bits per pixel, [`CLEAR_CELL`] where nothing won.
    pub(crate) fn from_cells(
        eye_dims: Dimensions,
        winners: &[u64],
        depths: impl ExactSizeIterator<Item = u64>,
    ) -> Self {
        let color = winners
            .iter()
            .flat_map(|&cell| cell_color(cell).to_array())
            .collect();
        let depth = depths
            .map(|bits| match bits {
                CLEAR_CELL => f32::INFINITY,
                bits => f32::from_bits(bits as u32),
            })
            .collect();
        Self {
            eye_dims,
            color,
            depth,
        }
    }

    /// Per-eye dimensions.
    pub fn eye_dimensions(&self) -> Dimensions {
        self.eye_dims
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.eye_dims.width
    }

    /// Height of one eye in pixels.
    pub fn eye_height(&self) -> u32 {
        self.eye_dims.height
    }

    /// Height of the stacked image (`2 * eye_height`).
    pub fn height(&self) -> u32 {
        self.eye_dims.height * 2
    }

    /// Stacked RGBA8 color.
    pub fn color_rgba8(&self) -> &[u8] {
        &self.color
    }

    /// Stacked depth, `+∞` for holes.
    pub fn depth(&self) -> &[f32] {
        &self.depth
    }

    /// RGBA8 color of one eye.
    pub fn eye_color(&self, eye: Eye) -> &[u8] {
        let len = self.eye_dims.pixel_count() * 4;
        &self.color[eye.index() * len..(eye.index() + 1) * len]
    }

    /// Depth of one eye.
    pub fn eye_depth(&self, eye: Eye) -> &[f32] {
        let len = self.eye_dims.pixel_count();
        &self.depth[eye.index() * len..(eye.index() + 1) * len]
    }

    /// Color and depth of pixel `(x, y)` of `eye`.
    pub fn pixel(&self, eye: Eye, x: u32, y: u32) -> (Rgba8, f32) {
        let i = cell_index(self.eye_dims, eye, x, y);
        (Rgba8::from_slice(&self.color[i * 4..i * 4 + 4]), self.depth[i])
    }

    /// Number of pixels that received a contribution, over both eyes.
    pub fn written_pixels(&self) -> usize {
        self.depth.iter().filter(|d| d.is_finite()).count()
    }
}

/// Linear index of pixel `(x, y)` of `eye` in the stacked layout.
pub(crate) fn cell_index(eye_dims: Dimensions, eye: Eye, x: u32, y: u32) -> usize {
    eye.index() * eye_dims.pixel_count() + eye_dims.index(x, y)
}

/// Value of a cell nothing was written to. Larger than any packed contribution.
pub(crate) const CLEAR_CELL: u64 = u64::MAX;

/// Pack a contribution so that the numerically smallest cell is the winner.
///
/// Layout: biased depth bits (high 32), view rank (8), RGB (low 24). Depth must be finite and
/// non-negative, which makes its bit pattern order like the value.
pub(crate) fn pack_cell(biased_depth: f32, rank: u8, color: Rgba8) -> u64 {
    let rgb = (u32::from(color.r) << 16) | (u32::from(color.g) << 8) | u32::from(color.b);
    (u64::from(biased_depth.to_bits()) << 32) | (u64::from(rank) << 24) | u64::from(rgb)
}

/// Color of a packed cell. Written pixels are opaque.
pub(crate) fn cell_color(cell: u64) -> Rgba8 {
    if cell == CLEAR_CELL {
        return Rgba8::BLACK;
    }
    let rgb = (cell & 0x00ff_ffff) as u32;
    Rgba8::new((rgb >> 16) as u8, (rgb >> 8) as u8, rgb as u8, 255)
}

/// Depth bits of a cell whose key holds the exact depth (no rank bias applied).
pub(crate) fn cell_depth_bits(cell: u64) -> u64 {
    if cell == CLEAR_CELL { CLEAR_CELL } else { cell >> 32 }
}

/// Per-pixel minimum store.
pub(crate) trait MinCells {
    /// Offer `value` to pixel `index`; the smaller value stays.
    fn store_min(&self, index: usize, value: u64);
}

/// Single-threaded minimum store.
pub(crate) struct SequentialCells(Vec<Cell<u64>>);

impl SequentialCells {
    pub(crate) fn new(len: usize) -> Self {
        Self(vec![Cell::new(CLEAR_CELL); len])
    }

    pub(crate) fn into_cells(self) -> impl ExactSizeIterator<Item = u64> {
        self.0.into_iter().map(Cell::into_inner)
    }
}

impl MinCells for SequentialCells {
    fn store_min(&self, index: usize, value: u64) {
        let slot = &self.0[index];
        if value < slot.get() {
            slot.set(value);
        }
    }
}

/// Minimum store shared by worker threads.
pub(crate) struct AtomicCells(Vec<AtomicU64>);

impl AtomicCells {
    pub(crate) fn new(len: usize) -> Self {
        Self((0..len).map(|_| AtomicU64::new(CLEAR_CELL)).collect())
    }

    pub(crate) fn into_cells(self) -> impl ExactSizeIterator<Item = u64> {
        self.0.into_iter().map(AtomicU64::into_inner)
    }
}

impl MinCells for AtomicCells {
    fn store_min(&self, index: usize, value: u64) {
        self.0[index].fetch_min(value, Ordering::Relaxed);
    }
}

/// Receiver of scattered contributions: a packed cell plus the exact query distance.
pub(crate) trait DepthScatter {
    /// Offer one contribution to pixel `index`.
    fn offer(&self, index: usize, cell: u64, depth: f32);
}

/// First pass: nearest-wins reduction over packed cells.
pub(crate) struct DepthTest<C>(pub(crate) C);

impl<C: MinCells> DepthScatter for DepthTest<C> {
    fn offer(&self, index: usize, cell: u64, _depth: f32) {
        self.0.store_min(index, cell);
    }
}

/// Second pass: records the depth of contributions equal to the winning cell.
///
/// Equal cells from different texels keep the smallest depth, so the result does not depend on
/// scatter order.
pub(crate) struct WinnerDepths<'a, C> {
    pub(crate) winners: &'a [u64],
    pub(crate) depths: C,
}

impl<C: MinCells> DepthScatter for WinnerDepths<'_, C> {
    fn offer(&self, index: usize, cell: u64, depth: f32) {
        if self.winners[index] == cell {
            self.depths.store_min(index, u64::from(depth.to_bits()));
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/buffer.rs"]
mod tests;
