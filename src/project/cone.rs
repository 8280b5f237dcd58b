use crate::foundation::core::Vec3;
use crate::foundation::error::{OdsError, OdsResult};
use crate::foundation::math::world_from_spherical;

/// Angular slack added to the half vertical field of view before culling.
const FOV_MARGIN: f32 = 0.005;

/// Viewing cone of a head-mounted display, used to skip points that cannot be seen.
///
/// The cone's half-angle is the diagonal half field of view
/// `atan(tan(fovy / 2 + margin) * sqrt(aspect² + 1))`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewCone {
    view_dir: Vec3,
    cos_limit: f32,
}

impl ViewCone {
    /// Cone around world-space `view_dir` for a vertical field of view `fovy` (radians) and
    /// `aspect = width / height`.
    pub fn new(fovy: f32, aspect: f32, view_dir: Vec3) -> OdsResult<Self> {
        if !(fovy > 0.0 && fovy < std::f32::consts::PI) {
            return Err(OdsError::invalid_argument(format!(
                "view cone fovy must be in (0, π) (got {fovy})"
            )));
        }
        if !(aspect > 0.0 && aspect.is_finite()) {
            return Err(OdsError::invalid_argument(format!(
                "view cone aspect must be finite and > 0 (got {aspect})"
            )));
        }
        let view_dir = view_dir.try_normalize().ok_or_else(|| {
            OdsError::invalid_argument(format!("view cone direction must be non-zero (got {view_dir})"))
        })?;
        let half_angle = ((0.5 * fovy + FOV_MARGIN).tan() * (aspect * aspect + 1.0).sqrt()).atan();
        Ok(Self {
            view_dir,
            cos_limit: half_angle.cos(),
        })
    }

    /// Normalized world-space view direction.
    pub fn view_dir(&self) -> Vec3 {
        self.view_dir
    }

    /// Whether a world-space direction lies inside the cone.
    pub fn contains(&self, dir: Vec3) -> bool {
        dir.try_normalize()
            .is_some_and(|d| d.dot(self.view_dir) >= self.cos_limit)
    }

    /// Whether a projection-sphere point (spherical frame) lies inside the cone.
    pub(crate) fn contains_sphere_point(&self, sphere_point: Vec3) -> bool {
        self.contains(world_from_spherical(sphere_point))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/project/cone.rs"]
mod tests;
