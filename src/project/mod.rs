//! Reprojection of reference texels into the omnidirectional-stereo panorama of a query camera.

/// View-cone culling.
pub mod cone;
/// ODS projection math.
pub mod ods;
