use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::encode::sink::{FrameSink, SinkConfig};
use crate::foundation::core::{Dimensions, Eye, Vec3};
use crate::foundation::error::{OdsError, OdsResult};
use crate::foundation::math::{spherical_pixel_size, texel_angles};
use crate::project::cone::ViewCone;
use crate::project::ods::{OdsProjection, OdsProjector, back_project_texel};
use crate::render::buffer::{
    AtomicCells, DepthScatter, DepthTest, SequentialCells, StereoFrame, WinnerDepths,
    cell_depth_bits, cell_index, pack_cell,
};
use crate::rig::model::{CameraRig, ReferenceView};
use crate::select::selector::{SelectionResult, SelectionStrategy, ViewSelector};

/// Default depth handicap per selection rank, in meters.
pub const DEFAULT_VIEW_DEPTH_BIAS: f32 = 0.015;
/// Largest square footprint of an adaptive splat, in pixels.
pub const MAX_SPLAT_SIZE: u32 = 7;

/// How many destination pixels one reference texel covers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointSplat {
    /// Exactly the pixel the texel projects to.
    #[default]
    Single,
    /// A square sized by the ratio of source to destination solid angle, up to
    /// [`MAX_SPLAT_SIZE`] pixels wide.
    Adaptive,
}

/// Threading controls for the scatter pass.
#[derive(Clone, Debug, Default)]
pub struct SynthesisThreading {
    /// Scatter on a rayon pool when `true`.
    pub parallel: bool,
    /// Optional explicit worker thread count.
    pub threads: Option<usize>,
}

/// Options fixed for the lifetime of a [`Synthesizer`].
#[derive(Clone, Debug)]
pub struct SynthesisOpts {
    /// View selection strategy.
    pub strategy: SelectionStrategy,
    /// Sequential or parallel scatter.
    pub threading: SynthesisThreading,
    /// Point splatting mode.
    pub splat: PointSplat,
    /// Depth added per selection rank in the depth test, so nearer reference views win near-ties.
    pub view_depth_bias: f32,
}

impl Default for SynthesisOpts {
    fn default() -> Self {
        Self {
            strategy: SelectionStrategy::default(),
            threading: SynthesisThreading::default(),
            splat: PointSplat::default(),
            view_depth_bias: DEFAULT_VIEW_DEPTH_BIAS,
        }
    }
}

/// Per-call synthesis parameters.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewParams {
    /// Number of reference views to blend, `1..=num_views`.
    pub k: usize,
    /// Inter-pupillary distance in meters, `>= 0`.
    pub ipd: f32,
    /// Projection sphere radius in meters, `> 0`.
    pub focal_dist: f32,
    /// Optional culling cone; points outside it are skipped.
    pub view_cone: Option<ViewCone>,
}

impl ViewParams {
    /// Parameters without view-cone culling.
    pub fn new(k: usize, ipd: f32, focal_dist: f32) -> Self {
        Self {
            k,
            ipd,
            focal_dist,
            view_cone: None,
        }
    }

    /// Restrict output to points inside `cone`.
    pub fn with_view_cone(mut self, cone: ViewCone) -> Self {
        self.view_cone = Some(cone);
        self
    }

    /// Check the parameters against a rig of `num_views` views and build the projector.
    pub fn validate(&self, num_views: usize) -> OdsResult<OdsProjector> {
        if self.k == 0 || self.k > num_views {
            return Err(OdsError::invalid_argument(format!(
                "k must be in [1, {num_views}] (got {})",
                self.k
            )));
        }
        OdsProjector::new(self.ipd, self.focal_dist)
    }
}

/// Counters gathered while synthesizing one frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SynthesisStats {
    /// Views used, in rank order.
    pub views: SelectionResult,
    /// Texels (per eye) that projected to a direction.
    pub texels_projected: u64,
    /// Texels (per eye) rejected by the view cone.
    pub texels_culled: u64,
    /// Output pixels, both eyes, that received a contribution.
    pub pixels_written: u64,
}

/// Renders ODS stereo frames of a fixed rig from arbitrary query viewpoints.
pub struct Synthesizer<'r> {
    rig: &'r CameraRig,
    opts: SynthesisOpts,
    selector: ViewSelector,
    pool: Option<rayon::ThreadPool>,
}

impl<'r> Synthesizer<'r> {
    /// Validate `opts` and prepare a synthesizer (including its worker pool when parallel).
    pub fn new(rig: &'r CameraRig, opts: SynthesisOpts) -> OdsResult<Self> {
        if !opts.view_depth_bias.is_finite() || opts.view_depth_bias < 0.0 {
            return Err(OdsError::invalid_argument(format!(
                "view_depth_bias must be finite and >= 0 (got {})",
                opts.view_depth_bias
            )));
        }
        let pool = if opts.threading.parallel {
            Some(build_thread_pool(opts.threading.threads)?)
        } else {
            None
        };
        Ok(Self {
            rig,
            selector: ViewSelector::new(opts.strategy),
            opts,
            pool,
        })
    }

    /// Rig being rendered.
    pub fn rig(&self) -> &CameraRig {
        self.rig
    }

    /// Options in effect.
    pub fn opts(&self) -> &SynthesisOpts {
        &self.opts
    }

    /// Synthesize the stereo frame seen from `query`.
    pub fn synthesize(&self, query: Vec3, params: &ViewParams) -> OdsResult<StereoFrame> {
        self.synthesize_with_stats(query, params)
            .map(|(frame, _)| frame)
    }

    /// Synthesize a frame and report what happened.
    #[tracing::instrument(skip(self, params), fields(k = params.k, parallel = self.pool.is_some()))]
    pub fn synthesize_with_stats(
        &self,
        query: Vec3,
        params: &ViewParams,
    ) -> OdsResult<(StereoFrame, SynthesisStats)> {
        let projector = params.validate(self.rig.num_views())?;
        let selection = self.selector.select(self.rig, query, params.k)?;
        let eye_dims = self.rig.dimensions();
        let ctx = ScatterContext {
            projector,
            query,
            eye_dims,
            splat: self.opts.splat,
            view_depth_bias: self.opts.view_depth_bias,
            cone: params.view_cone,
        };
        let jobs = scatter_jobs(self.rig, &selection);
        let cells = eye_dims.pixel_count() * 2;

        // Pass one picks the winning cell per pixel. With a rank bias the cell key no longer
        // holds the exact depth, so pass two replays the scatter and keeps the depth of the
        // contributions equal to the winner.
        let resolve = ctx.view_depth_bias > 0.0;
        let (frame, counts) = match &self.pool {
            None => {
                let test = DepthTest(SequentialCells::new(cells));
                let counts = ctx.scatter_sequential(&jobs, &test);
                let winners: Vec<u64> = test.0.into_cells().collect();
                let frame = if resolve {
                    let pass = WinnerDepths {
                        winners: &winners,
                        depths: SequentialCells::new(cells),
                    };
                    ctx.scatter_sequential(&jobs, &pass);
                    StereoFrame::from_cells(eye_dims, &winners, pass.depths.into_cells())
                } else {
                    let depths = winners.iter().map(|&c| cell_depth_bits(c));
                    StereoFrame::from_cells(eye_dims, &winners, depths)
                };
                (frame, counts)
            }
            Some(pool) => pool.install(|| {
                let test = DepthTest(AtomicCells::new(cells));
                let counts = ctx.scatter_parallel(&jobs, &test);
                let winners: Vec<u64> = test.0.into_cells().collect();
                let frame = if resolve {
                    let pass = WinnerDepths {
                        winners: &winners,
                        depths: AtomicCells::new(cells),
                    };
                    ctx.scatter_parallel(&jobs, &pass);
                    StereoFrame::from_cells(eye_dims, &winners, pass.depths.into_cells())
                } else {
                    let depths = winners.iter().map(|&c| cell_depth_bits(c));
                    StereoFrame::from_cells(eye_dims, &winners, depths)
                };
                (frame, counts)
            }),
        };

        let stats = SynthesisStats {
            views: selection,
            texels_projected: counts.projected,
            texels_culled: counts.culled,
            pixels_written: frame.written_pixels() as u64,
        };
        tracing::debug!(
            views = ?stats.views.indices(),
            projected = stats.texels_projected,
            culled = stats.texels_culled,
            written = stats.pixels_written,
            "synthesized stereo frame"
        );
        Ok((frame, stats))
    }

    /// Synthesize one frame per query position and stream them into `sink`, in order.
    ///
    /// Returns the number of frames pushed.
    pub fn synthesize_path(
        &self,
        queries: &[Vec3],
        params: &ViewParams,
        sink: &mut dyn FrameSink,
    ) -> OdsResult<u64> {
        if queries.is_empty() {
            return Err(OdsError::validation("camera path must contain at least one position"));
        }
        params.validate(self.rig.num_views())?;
        let dims = self.rig.dimensions();
        sink.begin(SinkConfig {
            width: dims.width,
            eye_height: dims.height,
            frames: queries.len() as u64,
        })?;
        for (i, &query) in queries.iter().enumerate() {
            let frame = self.synthesize(query, params)?;
            sink.push_frame(i as u64, &frame)?;
        }
        sink.end()?;
        Ok(queries.len() as u64)
    }
}

/// One-shot sequential synthesis with default options.
pub fn synthesize(rig: &CameraRig, query: Vec3, params: &ViewParams) -> OdsResult<StereoFrame> {
    Synthesizer::new(rig, SynthesisOpts::default())?.synthesize(query, params)
}

fn build_thread_pool(threads: Option<usize>) -> OdsResult<rayon::ThreadPool> {
    if threads == Some(0) {
        return Err(OdsError::invalid_argument(
            "synthesis threading 'threads' must be >= 1 when set",
        ));
    }
    let mut builder = rayon::ThreadPoolBuilder::new();
    if let Some(n) = threads {
        builder = builder.num_threads(n);
    }
    builder
        .build()
        .map_err(|e| OdsError::Other(anyhow::anyhow!("failed to build rayon thread pool: {e}")))
}

/// One (eye, view) pass of the scatter.
#[derive(Clone, Copy)]
pub(crate) struct ScatterJob<'r> {
    pub(crate) eye: Eye,
    pub(crate) rank: u8,
    pub(crate) view: &'r ReferenceView,
}

pub(crate) fn scatter_jobs<'r>(rig: &'r CameraRig, selection: &SelectionResult) -> Vec<ScatterJob<'r>> {
    Eye::BOTH
        .into_iter()
        .flat_map(|eye| {
            selection.ranked().map(move |(rank, index)| ScatterJob {
                eye,
                rank: u8::try_from(rank).unwrap_or(u8::MAX),
                view: &rig.views()[index],
            })
        })
        .collect()
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct ScatterCounts {
    pub(crate) projected: u64,
    pub(crate) culled: u64,
}

impl ScatterCounts {
    fn merge(self, other: Self) -> Self {
        Self {
            projected: self.projected + other.projected,
            culled: self.culled + other.culled,
        }
    }
}

pub(crate) struct ScatterContext {
    pub(crate) projector: OdsProjector,
    pub(crate) query: Vec3,
    pub(crate) eye_dims: Dimensions,
    pub(crate) splat: PointSplat,
    pub(crate) view_depth_bias: f32,
    pub(crate) cone: Option<ViewCone>,
}

/// What happened to one texel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum TexelOutcome {
    /// No depth, or no direction from the query.
    Skipped,
    /// Outside the view cone.
    Culled,
    /// Offered to the depth test.
    Projected,
}

impl ScatterContext {
    fn scatter_sequential<T: DepthScatter>(
        &self,
        jobs: &[ScatterJob<'_>],
        target: &T,
    ) -> ScatterCounts {
        let mut counts = ScatterCounts::default();
        for job in jobs {
            for y in 0..self.eye_dims.height {
                counts = counts.merge(self.scatter_row(job, y, target));
            }
        }
        counts
    }

    fn scatter_parallel<T: DepthScatter + Sync>(
        &self,
        jobs: &[ScatterJob<'_>],
        target: &T,
    ) -> ScatterCounts {
        jobs.par_iter()
            .map(|job| {
                (0..self.eye_dims.height)
                    .into_par_iter()
                    .map(|y| self.scatter_row(job, y, target))
                    .reduce(ScatterCounts::default, ScatterCounts::merge)
            })
            .reduce(ScatterCounts::default, ScatterCounts::merge)
    }

    fn scatter_row<T: DepthScatter + ?Sized>(
        &self,
        job: &ScatterJob<'_>,
        y: u32,
        target: &T,
    ) -> ScatterCounts {
        let mut counts = ScatterCounts::default();
        for x in 0..self.eye_dims.width {
            match self.scatter_texel(job, x, y, target) {
                TexelOutcome::Projected => counts.projected += 1,
                TexelOutcome::Culled => counts.culled += 1,
                TexelOutcome::Skipped => {}
            }
        }
        counts
    }

    pub(crate) fn scatter_texel<T: DepthScatter + ?Sized>(
        &self,
        job: &ScatterJob<'_>,
        x: u32,
        y: u32,
        target: &T,
    ) -> TexelOutcome {
        let Some(point) = back_project_texel(job.view, x, y) else {
            return TexelOutcome::Skipped;
        };
        let Some(p) = self.projector.project(point, self.query, job.eye) else {
            return TexelOutcome::Skipped;
        };
        if let Some(cone) = &self.cone
            && !cone.contains_sphere_point(p.sphere_point)
        {
            return TexelOutcome::Culled;
        }
        let biased = p.depth + f32::from(job.rank) * self.view_depth_bias;
        if !biased.is_finite() {
            return TexelOutcome::Skipped;
        }
        let Some((col, row)) = p.pixel(self.eye_dims) else {
            return TexelOutcome::Projected;
        };
        let cell = pack_cell(biased, job.rank, job.view.color_at(x, y));

        let size = match self.splat {
            PointSplat::Single => 1,
            PointSplat::Adaptive => self.splat_size(job.view, x, y, &p),
        };
        if size == 1 {
            target.offer(cell_index(self.eye_dims, job.eye, col, row), cell, p.depth);
            return TexelOutcome::Projected;
        }

        let (w, h) = (i64::from(self.eye_dims.width), i64::from(self.eye_dims.height));
        let lo = i64::from(size / 2);
        let hi = i64::from(size.div_ceil(2));
        for dy in -lo..hi {
            let r = i64::from(row) + dy;
            if r < 0 || r >= h {
                continue;
            }
            for dx in -lo..hi {
                let c = (i64::from(col) + dx).rem_euclid(w);
                target.offer(
                    cell_index(self.eye_dims, job.eye, c as u32, r as u32),
                    cell,
                    p.depth,
                );
            }
        }
        TexelOutcome::Projected
    }

    /// Footprint width in pixels for an adaptive splat.
    fn splat_size(&self, view: &ReferenceView, x: u32, y: u32, p: &OdsProjection) -> u32 {
        let rows = self.eye_dims.height;
        let (_, source_inclination) = texel_angles(x, y, view.dimensions().width, rows);
        let area_ratio = spherical_pixel_size(source_inclination, rows)
            / spherical_pixel_size(p.inclination, rows);
        let source_depth = view.depth().get(x, y);
        let ratio = area_ratio * (source_depth / p.eye_distance);
        if ratio.is_nan() {
            return 1;
        }
        ratio.clamp(1.0, MAX_SPLAT_SIZE as f32).round() as u32
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/synth.rs"]
mod tests;
