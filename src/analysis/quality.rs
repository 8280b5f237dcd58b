use std::f64::consts::PI;

use crate::foundation::core::Rgba8;
use crate::foundation::error::{OdsError, OdsResult};
use crate::foundation::math::sphere_area_quad;
use crate::render::buffer::StereoFrame;

/// PSNR reported for identical images.
pub const PSNR_IDENTICAL: f64 = 100.0;

fn check_pair(reference: &[u8], candidate: &[u8]) -> OdsResult<()> {
    if reference.len() != candidate.len() {
        return Err(OdsError::invalid_argument(format!(
            "image sizes differ ({} vs {} bytes)",
            reference.len(),
            candidate.len()
        )));
    }
    if reference.is_empty() || reference.len() % 4 != 0 {
        return Err(OdsError::invalid_argument(
            "images must be non-empty RGBA8 buffers",
        ));
    }
    Ok(())
}

fn psnr_from_mse(mse: f64) -> f64 {
    if mse == 0.0 {
        return PSNR_IDENTICAL;
    }
    20.0 * (255.0 / mse.sqrt()).log10()
}

fn squared_rgb_error(a: &[u8], b: &[u8]) -> u64 {
    a[..3]
        .iter()
        .zip(&b[..3])
        .map(|(&x, &y)| {
            let e = i64::from(x) - i64::from(y);
            (e * e) as u64
        })
        .sum()
}

/// Peak signal-to-noise ratio over the RGB channels of two RGBA8 images of equal size.
pub fn psnr(reference: &[u8], candidate: &[u8]) -> OdsResult<f64> {
    check_pair(reference, candidate)?;
    let sq: u64 = reference
        .chunks_exact(4)
        .zip(candidate.chunks_exact(4))
        .map(|(a, b)| squared_rgb_error(a, b))
        .sum();
    let samples = (reference.len() / 4 * 3) as f64;
    Ok(psnr_from_mse(sq as f64 / samples))
}

/// PSNR restricted to pixels the candidate actually covers (non-black RGB).
///
/// Returns `None` when the candidate has no covered pixel.
pub fn psnr_valid(reference: &[u8], candidate: &[u8]) -> OdsResult<Option<f64>> {
    check_pair(reference, candidate)?;
    let mut sq = 0u64;
    let mut valid = 0u64;
    for (a, b) in reference.chunks_exact(4).zip(candidate.chunks_exact(4)) {
        if Rgba8::from_slice(b).is_black_rgb() {
            continue;
        }
        sq += squared_rgb_error(a, b);
        valid += 1;
    }
    if valid == 0 {
        return Ok(None);
    }
    Ok(Some(psnr_from_mse(sq as f64 / (valid * 3) as f64)))
}

/// Share of a stereo frame left uncovered.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HoleCoverage {
    /// Fraction of pixels with black RGB.
    pub pixel_fraction: f64,
    /// Fraction of the viewing sphere those pixels cover: the mean of the two eyes' fractions,
    /// in `[0, 1]`. The sum over both eyes is twice this value.
    ///
    /// Equirectangular rows near the poles cover less solid angle, so this is usually below
    /// `pixel_fraction` when holes cluster at the poles.
    pub projected_area_fraction: f64,
}

/// Hole coverage of a stacked stereo RGBA8 image `width x (2 * eye_height)`.
pub fn hole_coverage_rgba8(width: u32, eye_height: u32, rgba: &[u8]) -> OdsResult<HoleCoverage> {
    let (w, h) = (width as usize, eye_height as usize);
    if w == 0 || h == 0 || rgba.len() != w * h * 2 * 4 {
        return Err(OdsError::invalid_argument(format!(
            "stereo image is {} bytes, expected {width}x{} RGBA8",
            rgba.len(),
            2 * eye_height
        )));
    }

    let mut holes = 0usize;
    let mut area = 0.0f64;
    for (i, row) in rgba.chunks_exact(w * 4).enumerate() {
        let black = row
            .chunks_exact(4)
            .filter(|px| Rgba8::from_slice(px).is_black_rgb())
            .count();
        holes += black;

        // Row r of an eye spans inclinations [r, r+1] * π / h.
        let r = (i % h) as f64;
        let lat1 = 0.5 * PI - PI * r / h as f64;
        let lat2 = 0.5 * PI - PI * (r + 1.0) / h as f64;
        let lon = 2.0 * PI * black as f64 / w as f64;
        area += sphere_area_quad(lat1, 0.0, lat2, lon);
    }

    Ok(HoleCoverage {
        pixel_fraction: holes as f64 / (w * h * 2) as f64,
        // Per-eye mean.
        projected_area_fraction: area / 2.0,
    })
}

/// Hole coverage of a synthesized frame.
pub fn hole_coverage(frame: &StereoFrame) -> HoleCoverage {
    hole_coverage_rgba8(frame.width(), frame.eye_height(), frame.color_rgba8()).unwrap_or(
        HoleCoverage {
            pixel_fraction: 0.0,
            projected_area_fraction: 0.0,
        },
    )
}

#[cfg(test)]
#[path = "../../tests/unit/analysis/quality.rs"]
mod tests;
