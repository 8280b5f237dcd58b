//! Depth-map storage and codecs.

/// Headerless little-endian `f32` depth buffers.
pub mod raw;
/// RVL run-length/variable-length depth codec.
pub mod rvl;
/// Decoded depth samples and disparity conversion.
pub mod sample;
