//! odsynth synthesizes omnidirectional-stereo (ODS) panoramas for arbitrary viewpoints from a
//! sparse rig of depth-annotated equirectangular captures.
//!
//! The pipeline is CPU-only and deterministic:
//!
//! - Load a [`CameraRig`] (color PNGs plus RVL or raw depth, described by a [`RigManifest`])
//! - Pick reference views for the query position with a [`ViewSelector`]
//! - Reproject every reference texel into both eyes with an [`OdsProjector`]
//! - Resolve overlaps with a depth test into a [`StereoFrame`] ([`Synthesizer`])
//! - Stream frames into a [`FrameSink`] or measure them with [`analysis::quality`]
#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod foundation;

/// Image-quality analysis.
pub mod analysis;
/// Depth samples and depth codecs.
pub mod depth;
/// Frame sinks.
pub mod encode;
/// ODS projection.
pub mod project;
/// Stereo frames and the synthesizer.
pub mod render;
/// Camera rigs, manifests and loading.
pub mod rig;
/// Reference view selection.
pub mod select;

pub use crate::foundation::core::{Dimensions, Eye, Rgba8, Vec3};
pub use crate::foundation::error::{OdsError, OdsResult};

pub use crate::analysis::quality::{HoleCoverage, hole_coverage, psnr, psnr_valid};
pub use crate::depth::sample::DepthSample;
pub use crate::encode::sink::{FrameSink, InMemorySink, PngSink, PngSinkOpts, SinkConfig};
pub use crate::project::cone::ViewCone;
pub use crate::project::ods::{OdsProjection, OdsProjector};
pub use crate::render::buffer::StereoFrame;
pub use crate::render::synth::{
    PointSplat, SynthesisOpts, SynthesisStats, SynthesisThreading, Synthesizer, ViewParams,
    synthesize,
};
pub use crate::rig::manifest::{RigManifest, SynthesisDefaults, ViewEntry};
pub use crate::rig::model::{CameraRig, ReferenceView};
pub use crate::select::selector::{SelectionResult, SelectionStrategy, ViewSelector};
