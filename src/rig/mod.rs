//! Camera rigs: reference views, the JSON manifest describing them, and file loading.

/// Rig loading from disk (color images plus RVL or raw depth).
pub mod loader;
/// JSON rig manifest.
pub mod manifest;
/// In-memory reference views and rigs.
pub mod model;
