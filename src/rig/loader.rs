use std::path::{Path, PathBuf};

use anyhow::Context;

use crate::depth::sample::DepthSample;
use crate::depth::{raw, rvl};
use crate::foundation::core::{Dimensions, Vec3};
use crate::foundation::error::{OdsError, OdsResult};
use crate::rig::manifest::RigManifest;
use crate::rig::model::{CameraRig, ReferenceView};

/// Decoded color image: straight-alpha RGBA8, row-major.
#[derive(Clone, Debug)]
pub struct ColorImage {
    /// Image dimensions.
    pub dims: Dimensions,
    /// `width * height * 4` bytes.
    pub rgba8: Vec<u8>,
}

/// Decode an encoded color image (PNG, JPEG, ...) into RGBA8.
pub fn decode_color(bytes: &[u8]) -> OdsResult<ColorImage> {
    let dyn_img = image::load_from_memory(bytes).context("decode color image from memory")?;
    let rgba = dyn_img.to_rgba8();
    let (width, height) = rgba.dimensions();
    Ok(ColorImage {
        dims: Dimensions::new(width, height)?,
        rgba8: rgba.into_raw(),
    })
}

/// Decode depth bytes according to the file extension of `path`.
///
/// `.rvl` files are self-describing. `.depth` files are raw `f32` samples and need the color
/// dimensions plus a clip range from the caller.
pub fn decode_depth(
    path: &Path,
    bytes: &[u8],
    dims: Dimensions,
    range: Option<(f32, f32)>,
) -> OdsResult<DepthSample> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("rvl") => rvl::decode(bytes),
        Some("depth") => {
            let (near, far) = range.ok_or_else(|| {
                OdsError::validation(format!(
                    "raw depth '{}' needs a near/far range",
                    path.display()
                ))
            })?;
            raw::decode_raw_f32(bytes, dims, near, far)
        }
        _ => Err(OdsError::validation(format!(
            "unsupported depth file '{}' (expected .rvl or .depth)",
            path.display()
        ))),
    }
}

fn read_file(path: &Path) -> OdsResult<Vec<u8>> {
    let bytes =
        std::fs::read(path).with_context(|| format!("read '{}'", path.display()))?;
    Ok(bytes)
}

/// Load one reference view from `<prefix>.png` and `<prefix>.rvl` (or `<prefix>.depth`).
pub fn load_reference_view(
    prefix: impl AsRef<Path>,
    position: Vec3,
    range: Option<(f32, f32)>,
) -> OdsResult<ReferenceView> {
    let prefix = prefix.as_ref();
    let with_ext = |ext: &str| {
        let mut s = prefix.as_os_str().to_owned();
        s.push(ext);
        PathBuf::from(s)
    };
    let depth_candidates = [with_ext(".rvl"), with_ext(".depth")];
    let name = prefix
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    load_view_files(&name, &with_ext(".png"), &depth_candidates, position, range)
}

fn load_view_files(
    name: &str,
    color_path: &Path,
    depth_candidates: &[PathBuf],
    position: Vec3,
    range: Option<(f32, f32)>,
) -> OdsResult<ReferenceView> {
    let color = decode_color(&read_file(color_path)?)
        .map_err(|e| OdsError::validation(format!("view '{name}': {e}")))?;

    let depth_path = depth_candidates
        .iter()
        .find(|p| p.is_file())
        .or_else(|| depth_candidates.first())
        .ok_or_else(|| OdsError::validation(format!("view '{name}' has no depth file")))?;
    let depth = decode_depth(depth_path, &read_file(depth_path)?, color.dims, range)?;

    tracing::debug!(
        view = name,
        width = color.dims.width,
        height = color.dims.height,
        depth = %depth_path.display(),
        valid = depth.valid_count(),
        "loaded reference view"
    );
    ReferenceView::new(name, position, color.dims, color.rgba8, depth)
}

impl CameraRig {
    /// Load every view listed in `manifest`, resolving paths against `root`.
    #[tracing::instrument(skip(manifest), fields(views = manifest.views.len()))]
    pub fn load(manifest: &RigManifest, root: &Path) -> OdsResult<Self> {
        manifest.validate()?;
        let range = manifest.near.zip(manifest.far);

        let mut views = Vec::with_capacity(manifest.views.len());
        for (i, entry) in manifest.views.iter().enumerate() {
            let paths = manifest.view_paths(i)?;
            let name = entry.name.clone().unwrap_or_else(|| {
                Path::new(&paths.color)
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_else(|| format!("view{i}"))
            });
            let depth: Vec<PathBuf> = paths.depth.iter().map(|d| root.join(d)).collect();
            let [x, y, z] = entry.position;
            views.push(load_view_files(
                &name,
                &root.join(&paths.color),
                &depth,
                Vec3::new(x, y, z),
                range,
            )?);
        }
        Self::new(views)
    }

    /// Parse `path` as a manifest and load the rig it describes.
    pub fn load_from_path(path: impl AsRef<Path>) -> OdsResult<Self> {
        let path = path.as_ref();
        let manifest = RigManifest::from_path(path)?;
        let root = path.parent().unwrap_or_else(|| Path::new("."));
        Self::load(&manifest, root)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/rig/loader.rs"]
mod tests;
