//! Theme-driven ambient particle effects.
//!
//! A [`SimulationDriver`] owns one surface and up to two bound themes. Each
//! theme names one of nine particle motifs; the driver spawns, ages, culls and
//! draws them, scales its own workload from measured frame rate, and falls back
//! to a few static glow points when it cannot draw.

pub mod config;
pub mod driver;
pub mod error;
pub mod particles;
pub mod presets;
pub mod render;
pub mod resolver;
pub mod spawner;
pub mod updater;

pub use config::{EngineConfig, ParticleType, ParticleTypeConfig, PerformanceMode, Side, ThemeDescriptor};
pub use driver::{DriverState, FallbackReason, FrameReport, SimulationDriver};
pub use error::EngineError;
pub use particles::Particle;
pub use render::{Canvas, EguiCanvas, FallbackGlow, RecordingCanvas};
pub use resolver::ConfigResolver;
