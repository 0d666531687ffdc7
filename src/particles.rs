//! Particle records and the particle factory
//! One record per live particle, built fully initialised from a resolved config

use crate::config::{ParticleType, ParticleTypeConfig, Side};
use egui::{Color32, Vec2};
use rand::Rng;
use std::f32::consts::TAU;

/// Keeps radar rings away from the surface edges at spawn.
const RADIO_EDGE_MARGIN: f32 = 80.0;
/// Fraction of the spawn area kept clear around point glyphs.
const POINT_INSET: f32 = 0.08;
/// Fraction of the width speed streaks start in, measured from their outer edge.
const SPEED_ENTRY_BAND: f32 = 0.1;
/// Drift may push horizontal speed this far past the sampled range.
const DRIFT_HEADROOM: f32 = 1.5;

/// Individual particle data
#[derive(Clone, Debug, PartialEq)]
pub struct Particle {
    pub kind: ParticleType,
    /// Unset for single-theme views.
    pub side: Option<Side>,
    pub pos: Vec2,
    pub vel: Vec2,
    pub size: f32,
    pub color: Color32,
    pub base_opacity: f32,
    pub opacity: f32,
    /// Ticks elapsed since spawn.
    pub age: u32,
    pub max_lifetime: u32,
    pub fade_in_ticks: u32,
    pub fade_out_ticks: u32,
    /// Tick at which flow particles begin fading out.
    pub fade_start_tick: u32,
    // Type-specific state
    pub rotation: f32,
    pub spin: f32,
    pub capsule: Vec2, // grain width/height
    pub sway_phase: f32,
    pub gravity: f32,
    pub drift: f32,
    /// Largest horizontal speed drift may reach.
    pub drift_limit: f32,
    pub wrap_edges: bool,
    /// Per-particle seed for deterministic jitter and bolt shapes.
    pub seed: u64,
}

impl Particle {
    /// Lifetime progress in `[0, 1]`.
    pub fn progress(&self) -> f32 {
        if self.max_lifetime == 0 {
            return 1.0;
        }
        (self.age as f32 / self.max_lifetime as f32).min(1.0)
    }

    pub fn remaining_ticks(&self) -> u32 {
        self.max_lifetime.saturating_sub(self.age)
    }
}

/// Build one particle of `config.kind` for `side`, placed inside `bounds`.
///
/// Returns `None` when the surface has no drawable area.
pub fn create(
    config: &ParticleTypeConfig,
    side: Option<Side>,
    bounds: Vec2,
    color: Color32,
    rng: &mut impl Rng,
) -> Option<Particle> {
    let (w, h) = (bounds.x, bounds.y);
    if !(w.is_finite() && h.is_finite() && w > 0.0 && h > 0.0) {
        return None;
    }

    let kind = config.kind;
    let size = config.size.sample(rng);
    let base_opacity = config.opacity.sample(rng).clamp(0.0, 1.0);
    let max_lifetime = config.lifetime.sample(rng).round().max(1.0) as u32;
    let mut vel = Vec2::new(config.velocity_x.sample(rng), config.velocity_y.sample(rng));

    let (lo, hi) = horizontal_span(config, side, w, rng);
    let mut rotation = 0.0;
    let mut spin = 0.0;
    let mut capsule = Vec2::ZERO;

    let pos = match kind {
        ParticleType::Flow => Vec2::new(between(rng, lo, hi), between(rng, h * 0.2, h)),
        ParticleType::Grain => {
            rotation = rng.gen_range(-0.5..0.5);
            capsule = Vec2::new(size, size * rng.gen_range(2.0..3.5));
            Vec2::new(between(rng, lo, hi), between(rng, 0.0, h * 0.3))
        }
        ParticleType::Radio => {
            let margin = RADIO_EDGE_MARGIN.min((hi - lo) / 4.0).min(h / 4.0);
            Vec2::new(
                between(rng, lo + margin, hi - margin),
                between(rng, margin, h - margin),
            )
        }
        ParticleType::Speed => {
            // Streaks enter from the outer edge of their half and travel inward.
            let from_left = match side {
                Some(Side::Left) => true,
                Some(Side::Right) => false,
                None => rng.gen_bool(0.5),
            };
            vel.x = if from_left { vel.x.abs() } else { -vel.x.abs() };
            let x = if from_left {
                between(rng, 0.0, w * SPEED_ENTRY_BAND)
            } else {
                between(rng, w * (1.0 - SPEED_ENTRY_BAND), w)
            };
            Vec2::new(x, between(rng, 0.0, h))
        }
        ParticleType::Lightning | ParticleType::Clock | ParticleType::Sparkle => {
            if kind != ParticleType::Lightning {
                rotation = rng.gen_range(0.0..TAU);
                let (min, max) = if kind == ParticleType::Clock {
                    (0.02, 0.05)
                } else {
                    (0.04, 0.1)
                };
                let magnitude: f32 = rng.gen_range(min..max);
                spin = if rng.gen_bool(0.5) { magnitude } else { -magnitude };
            }
            let inset_x = (hi - lo) * POINT_INSET;
            let inset_y = h * POINT_INSET;
            Vec2::new(
                between(rng, lo + inset_x, hi - inset_x),
                between(rng, inset_y, h - inset_y),
            )
        }
        ParticleType::CosmicWave | ParticleType::Stardust => {
            Vec2::new(between(rng, lo, hi), between(rng, 0.0, h))
        }
    };

    if kind.is_stationary() {
        vel = Vec2::ZERO;
    }

    Some(Particle {
        kind,
        side,
        pos: Vec2::new(pos.x.clamp(0.0, w), pos.y.clamp(0.0, h)),
        vel,
        size,
        color,
        base_opacity,
        opacity: if config.fade_in_ticks > 0 { 0.0 } else { base_opacity },
        age: 0,
        max_lifetime,
        fade_in_ticks: config.fade_in_ticks,
        fade_out_ticks: config.fade_out_ticks,
        fade_start_tick: config.fade_start_delay_ticks.min(max_lifetime * 3 / 4),
        rotation,
        spin,
        capsule,
        sway_phase: rng.gen_range(0.0..TAU),
        gravity: config.gravity,
        drift: config.drift,
        drift_limit: config.velocity_x.min.abs().max(config.velocity_x.max.abs()) * DRIFT_HEADROOM,
        wrap_edges: config.wrap_edges,
        seed: rng.gen(),
    })
}

/// Horizontal spawn span for a side: its own half, or with the configured
/// chance a narrow band just across the centre seam.
fn horizontal_span(
    config: &ParticleTypeConfig,
    side: Option<Side>,
    width: f32,
    rng: &mut impl Rng,
) -> (f32, f32) {
    let mid = width / 2.0;
    let Some(side) = side else {
        return (0.0, width);
    };

    let crossover = config.crossover_probability > 0.0 && rng.gen::<f32>() < config.crossover_probability;
    if !crossover {
        return half_span(side, width);
    }

    let band = config.crossover_band * width;
    match side.opposite() {
        Side::Left => ((mid - band).max(0.0), mid),
        Side::Right => (mid, (mid + band).min(width)),
    }
}

pub fn half_span(side: Side, width: f32) -> (f32, f32) {
    let mid = width / 2.0;
    match side {
        Side::Left => (0.0, mid),
        Side::Right => (mid, width),
    }
}

/// Uniform sample in `[lo, hi)`, collapsing to the midpoint when the span is empty.
fn between(rng: &mut impl Rng, lo: f32, hi: f32) -> f32 {
    if hi > lo {
        rng.gen_range(lo..hi)
    } else {
        (lo + hi) / 2.0
    }
}
