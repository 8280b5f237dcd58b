use crate::foundation::error::{OdsError, OdsResult};

pub use glam::Vec3;

/// Pixel dimensions of one equirectangular image (one eye, or one reference view).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Dimensions {
    /// Width in pixels (azimuth axis).
    pub width: u32,
    /// Height in pixels (inclination axis).
    pub height: u32,
}

impl Dimensions {
    /// Create validated dimensions; both axes must be non-zero.
    pub fn new(width: u32, height: u32) -> OdsResult<Self> {
        if width == 0 || height == 0 {
            return Err(OdsError::validation(format!(
                "image dimensions must be non-zero (got {width}x{height})"
            )));
        }
        Ok(Self { width, height })
    }

    /// Number of pixels, or `None` if it does not fit in `usize`.
    pub fn checked_pixel_count(self) -> Option<usize> {
        usize::try_from(self.width)
            .ok()?
            .checked_mul(usize::try_from(self.height).ok()?)
    }

    /// Number of pixels. Callers must have validated the dimensions against `usize`.
    pub fn pixel_count(self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Row-major index of `(x, y)`.
    pub fn index(self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }
}

/// Stereo eye. `Left` occupies the top half of a stereo frame, `Right` the bottom half.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Eye {
    /// Eye 0, top half.
    Left,
    /// Eye 1, bottom half.
    Right,
}

impl Eye {
    /// Both eyes in stereo-frame order.
    pub const BOTH: [Eye; 2] = [Eye::Left, Eye::Right];

    /// Stereo-frame half index (0 = top, 1 = bottom).
    pub fn index(self) -> usize {
        match self {
            Eye::Left => 0,
            Eye::Right => 1,
        }
    }

    /// Rotation direction of the eye around the ODS viewing circle.
    pub fn sign(self) -> f32 {
        match self {
            Eye::Left => 1.0,
            Eye::Right => -1.0,
        }
    }
}

/// Straight-alpha RGBA8 color.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Rgba8 {
    /// Red channel.
    pub r: u8,
    /// Green channel.
    pub g: u8,
    /// Blue channel.
    pub b: u8,
    /// Alpha channel.
    pub a: u8,
}

impl Rgba8 {
    /// Opaque black, the clear color of a stereo frame.
    pub const BLACK: Rgba8 = Rgba8::new(0, 0, 0, 255);

    /// Build a color from channels.
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Read a color from the first four bytes of an RGBA8 pixel slice.
    pub fn from_slice(px: &[u8]) -> Self {
        Self::new(px[0], px[1], px[2], px[3])
    }

    /// Channels as an array.
    pub fn to_array(self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }

    /// `true` when red, green and blue are all zero (a hole in a synthesized frame).
    pub fn is_black_rgb(self) -> bool {
        self.r == 0 && self.g == 0 && self.b == 0
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/core.rs"]
mod tests;
