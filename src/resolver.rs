//! Config resolution: built-in defaults, then performance scaling, then the
//! theme's own overrides.
//!
//! Every call builds a fresh [`ParticleTypeConfig`] from the static defaults,
//! so resolving on every tick cannot leak one theme's adjustments into another.

use crate::config::{EngineConfig, ParticleType, ParticleTypeConfig, PerformanceMode, Side, ThemeDescriptor};
use crate::presets::{theme_profile, type_defaults, FieldScale};

/// Per-driver resolver. Holds only immutable engine settings.
#[derive(Clone, Debug)]
pub struct ConfigResolver {
    tick_rate_hz: f32,
    crossover_probability: f32,
    crossover_band: f32,
}

impl ConfigResolver {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            tick_rate_hz: config.tick_rate_hz,
            crossover_probability: config.crossover_probability,
            crossover_band: config.crossover_band,
        }
    }

    pub fn tick_rate_hz(&self) -> f32 {
        self.tick_rate_hz
    }

    pub fn resolve(
        &self,
        theme: Option<&ThemeDescriptor>,
        kind: ParticleType,
        mode: PerformanceMode,
        side: Option<Side>,
    ) -> ParticleTypeConfig {
        let d = type_defaults(kind);
        let scale = theme
            .and_then(|t| theme_profile(&t.id))
            .and_then(|p| p.scale_for(kind))
            .copied()
            .unwrap_or_else(|| FieldScale::identity(kind));
        let speed = theme.map_or(1.0, |t| t.speed());
        let intensity = theme.map_or(1.0, |t| t.intensity());

        // Each side is capped on its own at the full cap. Floor before
        // performance scaling so lower tiers stay proportional to the integer
        // high-tier cap.
        let full_cap = (d.max_population as f32 * scale.max_population.max(0.0)).floor() as usize;

        let per_tick = d.spawn_rate / self.tick_rate_hz;
        let spawn_probability = (per_tick * mode.factor() * scale.spawn_rate.max(0.0)).clamp(0.0, 1.0);

        let crossover_probability = match kind {
            // Rings need edge clearance and streaks start at the outer edge.
            ParticleType::Radio | ParticleType::Speed => 0.0,
            _ if side.is_some() => self.crossover_probability,
            _ => 0.0,
        };

        ParticleTypeConfig {
            kind,
            spawn_probability,
            max_population: mode.scale_count(full_cap),
            fade_in_ticks: d.fade_in_ticks,
            fade_out_ticks: d.fade_out_ticks,
            fade_start_delay_ticks: d.fade_start_delay_ticks,
            velocity_x: d.velocity_x.scaled(speed * scale.velocity),
            velocity_y: d.velocity_y.scaled(speed * scale.velocity),
            size: d.size.scaled(scale.size),
            opacity: d.opacity.scaled(intensity).clamped(0.0, 1.0),
            lifetime: d.lifetime.scaled(scale.lifetime).clamped(1.0, f32::MAX),
            wrap_edges: scale.wrap_edges.unwrap_or(d.wrap_edges),
            gravity: d.gravity * speed,
            drift: d.drift,
            crossover_probability,
            crossover_band: self.crossover_band,
        }
    }
}
