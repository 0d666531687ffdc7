//! Spawn decisions.
//!
//! Once per tick and per active side the driver asks [`Spawner::try_spawn`]
//! for at most one new particle. Sides are counted and capped on their own so
//! one theme's density can never starve the other.

use crate::config::{ParticleType, PerformanceMode, Side, ThemeDescriptor};
use crate::particles::{self, Particle};
use crate::presets::theme_profile;
use crate::resolver::ConfigResolver;
use egui::{Color32, Vec2};
use rand::Rng;

pub fn side_count(population: &[Particle], side: Option<Side>) -> usize {
    population.iter().filter(|p| p.side == side).count()
}

pub fn side_type_count(population: &[Particle], side: Option<Side>, kind: ParticleType) -> usize {
    population
        .iter()
        .filter(|p| p.side == side && p.kind == kind)
        .count()
}

/// Which particle type a theme emits next. Themes in the override table with
/// a mix draw from its fixed weights; everything else emits its own type.
pub fn spawn_type_for(theme: &ThemeDescriptor, rng: &mut impl Rng) -> Option<ParticleType> {
    let primary = theme.particle_type().ok()?;
    let Some(profile) = theme_profile(&theme.id) else {
        return Some(primary);
    };
    let total = profile.total_weight();
    if total == 0 {
        return Some(primary);
    }

    let mut roll = rng.gen_range(0..total);
    for &(kind, weight) in profile.mix {
        if roll < weight {
            return Some(kind);
        }
        roll -= weight;
    }
    Some(primary)
}

/// Spawn gate for one tick, bound to the driver's current mode and surface.
pub struct Spawner<'a> {
    resolver: &'a ConfigResolver,
    mode: PerformanceMode,
    bounds: Vec2,
}

impl<'a> Spawner<'a> {
    pub fn new(resolver: &'a ConfigResolver, mode: PerformanceMode, bounds: Vec2) -> Self {
        Self {
            resolver,
            mode,
            bounds,
        }
    }

    /// Probabilistic gate: refuses while the side is at the primary type's cap.
    pub fn should_spawn(
        &self,
        theme: &ThemeDescriptor,
        side: Option<Side>,
        population: &[Particle],
        rng: &mut impl Rng,
    ) -> bool {
        let Ok(primary) = theme.particle_type() else {
            return false;
        };
        let config = self.resolver.resolve(Some(theme), primary, self.mode, side);
        if side_count(population, side) >= config.max_population {
            return false;
        }
        rng.gen::<f32>() < config.spawn_probability
    }

    /// Gate, then [`spawn`](Self::spawn).
    pub fn try_spawn(
        &self,
        theme: &ThemeDescriptor,
        color: Color32,
        side: Option<Side>,
        population: &[Particle],
        rng: &mut impl Rng,
    ) -> Option<Particle> {
        if !self.should_spawn(theme, side, population, rng) {
            return None;
        }
        self.spawn(theme, color, side, population, rng)
    }

    /// Pick a type and build the particle without the probability draw.
    /// Caps still apply: the side's primary cap, and a mixed-in type's own cap.
    pub fn spawn(
        &self,
        theme: &ThemeDescriptor,
        color: Color32,
        side: Option<Side>,
        population: &[Particle],
        rng: &mut impl Rng,
    ) -> Option<Particle> {
        let primary = theme.particle_type().ok()?;
        let primary_cap = self.resolver.resolve(Some(theme), primary, self.mode, side).max_population;
        if side_count(population, side) >= primary_cap {
            return None;
        }
        let kind = spawn_type_for(theme, rng)?;
        let config = self.resolver.resolve(Some(theme), kind, self.mode, side);
        if side_type_count(population, side, kind) >= config.max_population {
            return None;
        }
        particles::create(&config, side, self.bounds, color, rng)
    }
}
