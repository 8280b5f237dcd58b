use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::depth::sample::validate_range;
use crate::foundation::error::{OdsError, OdsResult};
use crate::select::selector::SelectionStrategy;

/// Default inter-pupillary distance in meters.
pub const DEFAULT_IPD: f32 = 0.065;
/// Default radius of the ODS projection sphere in meters.
pub const DEFAULT_FOCAL_DIST: f32 = 1.95;
/// Default number of reference views blended per synthesized frame.
pub const DEFAULT_MAX_VIEWS: usize = 3;

/// JSON description of a camera rig on disk.
///
/// Paths are relative to the directory holding the manifest. Loading pixels is done separately by
/// [`crate::CameraRig::load`].
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RigManifest {
    /// Reference views in calibration order.
    pub views: Vec<ViewEntry>,
    /// Near clip (meters). Required for raw `.depth` files, which carry no header.
    #[serde(default)]
    pub near: Option<f32>,
    /// Far clip (meters). Required for raw `.depth` files.
    #[serde(default)]
    pub far: Option<f32>,
    /// Synthesis defaults for this rig.
    #[serde(default)]
    pub synthesis: SynthesisDefaults,
}

/// One reference view entry of a [`RigManifest`].
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ViewEntry {
    /// Optional display name; defaults to the color file stem.
    #[serde(default)]
    pub name: Option<String>,
    /// World-space camera position `[x, y, z]`, y up.
    pub position: [f32; 3],
    /// File prefix: `<prefix>.png` plus `<prefix>.rvl` or `<prefix>.depth`.
    #[serde(default)]
    pub prefix: Option<String>,
    /// Color image path (overrides `prefix`).
    #[serde(default)]
    pub color: Option<String>,
    /// Depth file path (overrides `prefix`).
    #[serde(default)]
    pub depth: Option<String>,
}

/// Optional per-rig synthesis defaults.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct SynthesisDefaults {
    /// Views blended per frame; `None` means `min(3, num_views)`.
    pub max_views: Option<usize>,
    /// Inter-pupillary distance (meters).
    pub ipd: f32,
    /// Projection sphere radius (meters).
    pub focal_dist: f32,
    /// View selection strategy.
    pub strategy: SelectionStrategy,
}

impl Default for SynthesisDefaults {
    fn default() -> Self {
        Self {
            max_views: None,
            ipd: DEFAULT_IPD,
            focal_dist: DEFAULT_FOCAL_DIST,
            strategy: SelectionStrategy::default(),
        }
    }
}

impl SynthesisDefaults {
    /// Number of views to blend for a rig of `num_views`.
    pub fn max_views_for(&self, num_views: usize) -> usize {
        self.max_views
            .unwrap_or(DEFAULT_MAX_VIEWS)
            .min(num_views)
    }
}

/// Normalized relative paths of one view's files.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ViewPaths {
    /// Color image path.
    pub color: String,
    /// Depth candidates in preference order; the loader takes the first that exists.
    pub depth: Vec<String>,
}

impl RigManifest {
    /// Parse a manifest from a JSON reader.
    pub fn from_reader<R: std::io::Read>(r: R) -> OdsResult<Self> {
        serde_json::from_reader(r)
            .map_err(|e| OdsError::validation(format!("parse rig manifest JSON: {e}")))
    }

    /// Parse a manifest from a JSON file on disk.
    pub fn from_path(path: impl AsRef<Path>) -> OdsResult<Self> {
        let path = path.as_ref();
        let f = File::open(path).map_err(|e| {
            OdsError::validation(format!("open rig manifest '{}': {e}", path.display()))
        })?;
        Self::from_reader(BufReader::new(f))
    }

    /// Check structural invariants before any file is touched.
    pub fn validate(&self) -> OdsResult<()> {
        if self.views.is_empty() {
            return Err(OdsError::validation("rig manifest must list at least one view"));
        }
        match (self.near, self.far) {
            (Some(near), Some(far)) => validate_range(near, far).map_err(OdsError::validation)?,
            (None, None) => {}
            _ => {
                return Err(OdsError::validation(
                    "rig manifest must give both 'near' and 'far' or neither",
                ));
            }
        }
        for (i, view) in self.views.iter().enumerate() {
            if view.position.iter().any(|c| !c.is_finite()) {
                return Err(OdsError::validation(format!(
                    "views[{i}].position must be finite"
                )));
            }
            let paths = self.view_paths(i)?;
            let raw_only = paths.depth.iter().all(|d| d.ends_with(".depth"));
            if raw_only && self.near.is_none() {
                return Err(OdsError::validation(format!(
                    "views[{i}] uses raw .depth samples, which need 'near' and 'far' in the manifest"
                )));
            }
        }

        let s = &self.synthesis;
        if s.max_views == Some(0) {
            return Err(OdsError::validation("synthesis.max_views must be > 0"));
        }
        if !s.ipd.is_finite() || s.ipd < 0.0 {
            return Err(OdsError::validation("synthesis.ipd must be finite and >= 0"));
        }
        if !s.focal_dist.is_finite() || s.focal_dist <= 0.0 {
            return Err(OdsError::validation("synthesis.focal_dist must be finite and > 0"));
        }
        Ok(())
    }

    /// Resolve and normalize the file paths of view `index`.
    pub fn view_paths(&self, index: usize) -> OdsResult<ViewPaths> {
        let view = self.views.get(index).ok_or_else(|| {
            OdsError::validation(format!("view index {index} out of range"))
        })?;
        let prefix = view.prefix.as_deref().map(normalize_rel_path).transpose()?;

        let color = match (&view.color, &prefix) {
            (Some(c), _) => normalize_rel_path(c)?,
            (None, Some(p)) => format!("{p}.png"),
            (None, None) => {
                return Err(OdsError::validation(format!(
                    "views[{index}] needs 'color' or 'prefix'"
                )));
            }
        };
        let depth = match (&view.depth, &prefix) {
            (Some(d), _) => {
                let d = normalize_rel_path(d)?;
                if !(d.ends_with(".rvl") || d.ends_with(".depth")) {
                    return Err(OdsError::validation(format!(
                        "views[{index}].depth '{d}' must end in .rvl or .depth"
                    )));
                }
                vec![d]
            }
            (None, Some(p)) => vec![format!("{p}.rvl"), format!("{p}.depth")],
            (None, None) => {
                return Err(OdsError::validation(format!(
                    "views[{index}] needs 'depth' or 'prefix'"
                )));
            }
        };
        Ok(ViewPaths { color, depth })
    }
}

/// Normalize a manifest-relative path: forward slashes, no empty or `.` segments.
///
/// Absolute paths and `..` segments are rejected so a manifest can only reach files beside or
/// below itself.
pub fn normalize_rel_path(source: &str) -> OdsResult<String> {
    let s = source.replace('\\', "/");
    if s.starts_with('/') || s.as_bytes().get(1) == Some(&b':') {
        return Err(OdsError::validation(format!(
            "rig paths must be relative (got '{source}')"
        )));
    }
    let parts: Vec<&str> = s
        .split('/')
        .filter(|part| !part.is_empty() && *part != ".")
        .collect();
    if parts.contains(&"..") {
        return Err(OdsError::validation(format!(
            "rig paths must not contain '..' (got '{source}')"
        )));
    }
    if parts.is_empty() {
        return Err(OdsError::validation("rig path must name a file"));
    }
    Ok(parts.join("/"))
}

#[cfg(test)]
#[path = "../../tests/unit/rig/manifest.rs"]
mod tests;
