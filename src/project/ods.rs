use std::f32::consts::{FRAC_PI_2, PI, TAU};

use crate::foundation::core::{Dimensions, Eye, Vec3};
use crate::foundation::error::{OdsError, OdsResult};
use crate::foundation::math::{
    azimuth_of, inclination_of, spherical_from_world, spherical_point, texel_angles,
    world_from_spherical,
};
use crate::rig::model::ReferenceView;

/// Where a scene point lands in one eye of the ODS panorama.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OdsProjection {
    /// Destination azimuth in `[0, 2π)`.
    pub azimuth: f32,
    /// Destination inclination in `[0, π]`.
    pub inclination: f32,
    /// Distance from the query viewpoint to the point (the depth-test key).
    pub depth: f32,
    /// Distance from this eye's camera on the viewing circle to the point.
    pub eye_distance: f32,
    /// Point on the projection sphere, spherical frame, relative to the query.
    pub sphere_point: Vec3,
}

impl OdsProjection {
    /// Destination pixel `(column, row)` within one eye of size `dims`.
    ///
    /// Columns wrap around the azimuth seam. Returns `None` for non-finite angles or rows outside
    /// the eye.
    pub fn pixel(&self, dims: Dimensions) -> Option<(u32, u32)> {
        pixel_for_angles(self.azimuth, self.inclination, dims)
    }
}

/// Pixel containing the direction `(azimuth, inclination)` in an equirectangular image.
pub fn pixel_for_angles(azimuth: f32, inclination: f32, dims: Dimensions) -> Option<(u32, u32)> {
    let u = dims.width as f32 * (TAU - azimuth) / TAU;
    let v = dims.height as f32 * inclination / PI;
    if !u.is_finite() || !v.is_finite() {
        return None;
    }
    let col = (u.floor() as i64).rem_euclid(i64::from(dims.width));
    let mut row = v.floor() as i64;
    if row == i64::from(dims.height) && inclination <= PI {
        row -= 1;
    }
    if row < 0 || row >= i64::from(dims.height) {
        return None;
    }
    Some((col as u32, row as u32))
}

/// World-space position of texel `(x, y)` of `view`, or `None` for texels without depth.
pub fn back_project_texel(view: &ReferenceView, x: u32, y: u32) -> Option<Vec3> {
    let depth = view.depth().depth_at(x, y)?;
    let dims = view.dimensions();
    let (azimuth, inclination) = texel_angles(x, y, dims.width, dims.height);
    Some(view.position() + world_from_spherical(spherical_point(azimuth, inclination, depth)))
}

/// Projects world points onto the ODS sphere of a query camera.
///
/// Each eye sits on a viewing circle of diameter `ipd` around the query and looks tangentially
/// along it; the projection sphere has radius `focal_dist`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OdsProjector {
    ipd: f32,
    focal_dist: f32,
}

impl OdsProjector {
    /// Validate and build a projector. `ipd = 0` is allowed and collapses both eyes.
    pub fn new(ipd: f32, focal_dist: f32) -> OdsResult<Self> {
        if !ipd.is_finite() || ipd < 0.0 {
            return Err(OdsError::invalid_argument(format!(
                "ipd must be finite and >= 0 (got {ipd})"
            )));
        }
        if !focal_dist.is_finite() || focal_dist <= 0.0 {
            return Err(OdsError::invalid_argument(format!(
                "focal_dist must be finite and > 0 (got {focal_dist})"
            )));
        }
        Ok(Self { ipd, focal_dist })
    }

    /// Inter-pupillary distance.
    pub fn ipd(&self) -> f32 {
        self.ipd
    }

    /// Projection sphere radius.
    pub fn focal_dist(&self) -> f32 {
        self.focal_dist
    }

    /// Project world point `point` for `eye` of a camera at `query`.
    ///
    /// Returns `None` for points with no direction from the query or from the eye.
    pub fn project(&self, point: Vec3, query: Vec3, eye: Eye) -> Option<OdsProjection> {
        let vertex = spherical_from_world(point - query);
        let depth = vertex.length();
        if !(depth > 0.0 && depth.is_finite()) {
            return None;
        }

        let center_azimuth = azimuth_of(vertex);
        let center_inclination = inclination_of(vertex.z, depth);
        let camera_radius = 0.5 * self.ipd * (center_inclination - FRAC_PI_2).cos();
        let camera_azimuth =
            center_azimuth + eye.sign() * (camera_radius / depth).clamp(-1.0, 1.0).acos();
        let (sin_az, cos_az) = camera_azimuth.sin_cos();
        let camera = Vec3::new(camera_radius * cos_az, camera_radius * sin_az, 0.0);

        let ray = vertex - camera;
        let eye_distance = ray.length();
        if !(eye_distance > 0.0) {
            return None;
        }
        let sphere_dist = (self.focal_dist * self.focal_dist - camera_radius * camera_radius)
            .max(0.0)
            .sqrt();
        let sphere_point = camera + ray * (sphere_dist / eye_distance);

        Some(OdsProjection {
            azimuth: azimuth_of(sphere_point),
            inclination: inclination_of(sphere_point.z, self.focal_dist),
            depth,
            eye_distance,
            sphere_point,
        })
    }

    /// Back-project texel `(x, y)` of `view` and project it for `eye` of a camera at `query`.
    pub fn project_texel(
        &self,
        view: &ReferenceView,
        x: u32,
        y: u32,
        query: Vec3,
        eye: Eye,
    ) -> Option<OdsProjection> {
        self.project(back_project_texel(view, x, y)?, query, eye)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/project/ods.rs"]
mod tests;
