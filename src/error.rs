//! Engine error taxonomy.
//!
//! None of these ever reach the host frame callback: the driver logs them
//! and degrades to the fallback decor or to drawing nothing.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum EngineError {
    /// The drawing surface exists but has no drawable area.
    #[error("drawing surface unavailable ({width}x{height})")]
    SurfaceUnavailable { width: f32, height: f32 },
    /// The host could not provide a drawing context at all.
    #[error("no drawing surface was provided")]
    MissingSurface,
    #[error("unknown particle type \"{0}\"")]
    UnknownParticleType(String),
    #[error("invalid color \"{0}\"")]
    InvalidColor(String),
}
