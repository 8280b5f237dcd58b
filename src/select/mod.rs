//! Reference view selection for a query viewpoint.

/// Selection strategies and the selector itself.
pub mod selector;
