//! Image-quality measurements for synthesized frames.

/// PSNR and disocclusion-hole coverage.
pub mod quality;
