//! Stereo frame synthesis (CPU).

/// Stereo frame storage and the depth-test cell buffers.
pub mod buffer;
/// View selection, reprojection and compositing of a frame.
pub mod synth;
