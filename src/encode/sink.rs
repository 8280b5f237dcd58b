use std::path::{Path, PathBuf};

use anyhow::Context;

use crate::foundation::error::{OdsError, OdsResult};
use crate::render::buffer::StereoFrame;

/// Configuration provided to a [`FrameSink`] before the first frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkConfig {
    /// Frame width in pixels.
    pub width: u32,
    /// Height of one eye; stacked frames are twice as tall.
    pub eye_height: u32,
    /// Number of frames that will be pushed.
    pub frames: u64,
}

/// Sink contract for consuming synthesized frames.
///
/// `push_frame` is called with strictly increasing indices starting at 0.
pub trait FrameSink: Send {
    /// Called once before any frames are pushed.
    fn begin(&mut self, cfg: SinkConfig) -> OdsResult<()>;
    /// Push one frame.
    fn push_frame(&mut self, idx: u64, frame: &StereoFrame) -> OdsResult<()>;
    /// Called once after the last frame is pushed.
    fn end(&mut self) -> OdsResult<()>;
}

/// In-memory sink for tests and debugging.
#[derive(Debug, Default)]
pub struct InMemorySink {
    cfg: Option<SinkConfig>,
    frames: Vec<(u64, StereoFrame)>,
}

impl InMemorySink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configuration captured in `begin`, if any.
    pub fn config(&self) -> Option<&SinkConfig> {
        self.cfg.as_ref()
    }

    /// Captured frames in push order.
    pub fn frames(&self) -> &[(u64, StereoFrame)] {
        &self.frames
    }
}

impl FrameSink for InMemorySink {
    fn begin(&mut self, cfg: SinkConfig) -> OdsResult<()> {
        self.cfg = Some(cfg);
        self.frames.clear();
        Ok(())
    }

    fn push_frame(&mut self, idx: u64, frame: &StereoFrame) -> OdsResult<()> {
        self.frames.push((idx, frame.clone()));
        Ok(())
    }

    fn end(&mut self) -> OdsResult<()> {
        Ok(())
    }
}

/// Options for [`PngSink`].
#[derive(Debug, Clone)]
pub struct PngSinkOpts {
    /// Color output path. With more than one frame, `_00000`-style indices are appended to the
    /// file stem.
    pub color_path: PathBuf,
    /// Optional 16-bit grayscale depth output path, same naming rule.
    pub depth_path: Option<PathBuf>,
    /// Depth mapped to white. Holes are white as well.
    pub z_max: f32,
}

/// Writes each frame as a stacked stereo PNG (and optionally a depth PNG).
#[derive(Debug)]
pub struct PngSink {
    opts: PngSinkOpts,
    frames: u64,
    written: Vec<PathBuf>,
}

impl PngSink {
    /// Create a sink. `z_max` must be finite and positive.
    pub fn new(opts: PngSinkOpts) -> OdsResult<Self> {
        if !(opts.z_max > 0.0 && opts.z_max.is_finite()) {
            return Err(OdsError::invalid_argument(format!(
                "depth PNG z_max must be finite and > 0 (got {})",
                opts.z_max
            )));
        }
        Ok(Self {
            opts,
            frames: 0,
            written: Vec::new(),
        })
    }

    /// Files written so far.
    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }

    fn frame_path(&self, base: &Path, idx: u64) -> PathBuf {
        if self.frames <= 1 {
            return base.to_path_buf();
        }
        let stem = base
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let name = match base.extension() {
            Some(ext) => format!("{stem}_{idx:05}.{}", ext.to_string_lossy()),
            None => format!("{stem}_{idx:05}"),
        };
        base.with_file_name(name)
    }
}

impl FrameSink for PngSink {
    fn begin(&mut self, cfg: SinkConfig) -> OdsResult<()> {
        self.frames = cfg.frames;
        self.written.clear();
        for path in std::iter::once(&self.opts.color_path).chain(self.opts.depth_path.as_ref()) {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("create output dir '{}'", parent.display()))?;
            }
        }
        Ok(())
    }

    fn push_frame(&mut self, idx: u64, frame: &StereoFrame) -> OdsResult<()> {
        let color_path = self.frame_path(&self.opts.color_path, idx);
        write_stereo_png(frame, &color_path)?;
        self.written.push(color_path);
        if let Some(depth_base) = &self.opts.depth_path {
            let depth_path = self.frame_path(depth_base, idx);
            write_depth_png(frame, &depth_path, self.opts.z_max)?;
            self.written.push(depth_path);
        }
        Ok(())
    }

    fn end(&mut self) -> OdsResult<()> {
        tracing::info!(files = self.written.len(), "png sink finished");
        Ok(())
    }
}

/// Write the stacked RGBA8 color of `frame` as a PNG.
pub fn write_stereo_png(frame: &StereoFrame, path: &Path) -> OdsResult<()> {
    image::save_buffer_with_format(
        path,
        frame.color_rgba8(),
        frame.width(),
        frame.height(),
        image::ExtendedColorType::Rgba8,
        image::ImageFormat::Png,
    )
    .with_context(|| format!("write png '{}'", path.display()))?;
    Ok(())
}

/// Depth of `frame` quantized to 16 bits over `[0, z_max]`; holes map to `u16::MAX`.
pub fn depth_to_gray16(frame: &StereoFrame, z_max: f32) -> Vec<u16> {
    frame
        .depth()
        .iter()
        .map(|&d| ((d / z_max).clamp(0.0, 1.0) * f32::from(u16::MAX)).round() as u16)
        .collect()
}

/// Write the depth of `frame` as a 16-bit grayscale PNG.
pub fn write_depth_png(frame: &StereoFrame, path: &Path, z_max: f32) -> OdsResult<()> {
    let gray = depth_to_gray16(frame, z_max);
    let img = image::ImageBuffer::<image::Luma<u16>, Vec<u16>>::from_raw(
        frame.width(),
        frame.height(),
        gray,
    )
    .ok_or_else(|| OdsError::validation("depth buffer does not match frame dimensions"))?;
    img.save_with_format(path, image::ImageFormat::Png)
        .with_context(|| format!("write depth png '{}'", path.display()))?;
    Ok(())
}

#[cfg(test)]
#[path = "../../tests/unit/encode/sink.rs"]
mod tests;
