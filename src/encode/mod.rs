//! Frame sinks.
//!
//! Sinks consume synthesized stereo frames in order; `Synthesizer::synthesize_path` drives them.

/// Sink contract and the in-memory and PNG sinks.
pub mod sink;
