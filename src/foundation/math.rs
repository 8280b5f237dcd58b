//! Equirectangular and spherical helpers shared by the projector and the analysis code.
//!
//! Two frames are in play. World space is y-up (camera positions are given as `[x, y, z]` with `y`
//! the height). The spherical frame used for azimuth/inclination is z-up and relates to world space
//! by the swizzle `spherical = (world.z, world.x, world.y)`.

use std::f32::consts::{PI, TAU};

use crate::foundation::core::Vec3;

/// Threshold below which a direction is treated as lying on the polar axis.
pub(crate) const POLE_EPSILON: f32 = 1.0e-6;

/// World-space vector to the spherical (z-up) frame.
pub(crate) fn spherical_from_world(v: Vec3) -> Vec3 {
    Vec3::new(v.z, v.x, v.y)
}

/// Spherical-frame vector back to world space.
pub(crate) fn world_from_spherical(v: Vec3) -> Vec3 {
    Vec3::new(v.y, v.z, v.x)
}

/// Azimuth/inclination of the center of texel `(x, y)` in an equirectangular image.
///
/// Azimuth decreases left to right starting at `2π`; inclination grows top to bottom from `0`.
pub(crate) fn texel_angles(x: u32, y: u32, width: u32, height: u32) -> (f32, f32) {
    let norm_x = (x as f32 + 0.5) / width as f32;
    let norm_y = (y as f32 + 0.5) / height as f32;
    (TAU * (1.0 - norm_x), PI * norm_y)
}

/// Point at `radius` along the direction `(azimuth, inclination)`, in the spherical frame.
pub(crate) fn spherical_point(azimuth: f32, inclination: f32, radius: f32) -> Vec3 {
    let (sin_az, cos_az) = azimuth.sin_cos();
    let (sin_inc, cos_inc) = inclination.sin_cos();
    Vec3::new(
        radius * cos_az * sin_inc,
        radius * sin_az * sin_inc,
        radius * cos_inc,
    )
}

/// Floored modulo: result in `[0, div)` for positive `div`.
pub(crate) fn fmod(num: f32, div: f32) -> f32 {
    num - div * (num / div).floor()
}

/// Azimuth of a spherical-frame vector in `[0, 2π)`.
///
/// Directions on the polar axis have no defined azimuth; they are pinned to `π/2` (up) or
/// `3π/2` (down) so the result stays deterministic.
pub(crate) fn azimuth_of(v: Vec3) -> f32 {
    if v.x.abs() < POLE_EPSILON && v.y.abs() < POLE_EPSILON {
        return (1.0 - 0.5 * v.z.signum()) * PI;
    }
    fmod(v.y.atan2(v.x), TAU)
}

/// Inclination (angle from the +z pole) of a vector of length `len`, clamped to `[0, π]`.
pub(crate) fn inclination_of(z: f32, len: f32) -> f32 {
    if len <= 0.0 {
        return 0.0;
    }
    (z / len).clamp(-1.0, 1.0).acos()
}

/// Relative solid-angle height of an equirectangular row band centered on `inclination`.
pub(crate) fn spherical_pixel_size(inclination: f32, rows: u32) -> f32 {
    let latitude = inclination - 0.5 * PI;
    let delta_lat = 0.5 * PI / rows as f32;
    (latitude + delta_lat).sin() - (latitude - delta_lat).sin()
}

/// Fraction of the unit sphere bounded by two parallels and two meridians (radians).
pub(crate) fn sphere_area_quad(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let (lat1, lat2) = if lat2 < lat1 { (lat2, lat1) } else { (lat1, lat2) };
    let (lon1, lon2) = if lon2 < lon1 { (lon2, lon1) } else { (lon1, lon2) };
    let height = lat2.sin() - lat1.sin();
    height * (lon2 - lon1) / (4.0 * std::f64::consts::PI)
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/math.rs"]
mod tests;
