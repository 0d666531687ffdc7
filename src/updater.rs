//! Per-tick particle advancement.
//!
//! [`advance`] only mutates the particle it is given. Removal is the driver's
//! job: it filters the population with [`is_expired`] after every tick.

use crate::config::{ParticleType, Side};
use crate::particles::{half_span, Particle};
use egui::Vec2;

/// Grains never fall slower than this, whatever their sampled velocity.
pub const GRAIN_MIN_FALL: f32 = 0.4;
/// Share of a grain's life spent at full opacity.
const GRAIN_HOLD: f32 = 0.8;
const GRAIN_JITTER: f32 = 0.03;
/// Distance from the edge over which a radar ring fades out.
const RADIO_EDGE_BAND: f32 = 40.0;
const OFFSCREEN_MARGIN: f32 = 20.0;
const WAVE_SWAY_RATE: f32 = 0.03;
const TWINKLE_RATE: f32 = 0.12;

const JITTER_SALT: u64 = 0x5bd1_e995;

/// Advance one particle by `delta_ticks` simulation ticks.
pub fn advance(p: &mut Particle, delta_ticks: u32, bounds: Vec2) {
    if delta_ticks == 0 {
        return;
    }
    let dt = delta_ticks as f32;
    p.age = p.age.saturating_add(delta_ticks);
    let t = p.progress();

    p.opacity = match p.kind {
        ParticleType::Flow => {
            let prev_x = p.pos.x;
            drift_x(p, p.drift, dt);
            p.pos += p.vel * dt;
            keep_in_region(p, prev_x, bounds);
            p.base_opacity * fade_in(p) * hold_then_fade(p.age, p.fade_start_tick, p.max_lifetime)
        }
        ParticleType::Grain => {
            p.vel.y = (p.vel.y + p.gravity * dt).max(GRAIN_MIN_FALL);
            drift_x(p, p.drift * 0.1, dt);
            p.pos += p.vel * dt;
            p.rotation += hash_signed(p.seed ^ JITTER_SALT, p.age) * GRAIN_JITTER * dt;
            if p.wrap_edges && p.pos.y > bounds.y + p.capsule.y {
                p.pos.y = 0.0;
            }
            p.base_opacity * tail_fade(t, GRAIN_HOLD)
        }
        ParticleType::Radio => {
            let radius = radio_radius(p);
            let edge = edge_distance(p.pos, bounds);
            let edge_factor = ((edge - radius) / RADIO_EDGE_BAND).clamp(0.0, 1.0);
            p.base_opacity * (1.0 - t) * edge_factor
        }
        ParticleType::Speed => {
            p.pos += p.vel * dt;
            p.base_opacity * (1.0 - t)
        }
        ParticleType::Lightning => p.base_opacity * (1.0 - t),
        ParticleType::Clock | ParticleType::Sparkle => {
            p.rotation += p.spin * dt;
            p.base_opacity * (1.0 - t)
        }
        ParticleType::CosmicWave => {
            p.pos += p.vel * dt;
            p.pos.y += (p.sway_phase + p.age as f32 * WAVE_SWAY_RATE).sin() * p.drift * dt;
            p.base_opacity * envelope(p)
        }
        ParticleType::Stardust => {
            let wander = Vec2::new(
                hash_signed(p.seed, p.age),
                hash_signed(p.seed ^ JITTER_SALT, p.age),
            );
            p.pos += (p.vel + wander * p.drift) * dt;
            if p.wrap_edges {
                wrap(p, bounds);
            }
            p.base_opacity * envelope(p) * twinkle(p)
        }
    }
    .clamp(0.0, 1.0);
}

/// Whether the driver should drop this particle after the current tick.
pub fn is_expired(p: &Particle, bounds: Vec2) -> bool {
    if p.age >= p.max_lifetime {
        return true;
    }
    let (w, h) = (bounds.x, bounds.y);
    match p.kind {
        ParticleType::Grain => {
            let m = p.capsule.y.max(p.size) + OFFSCREEN_MARGIN;
            (!p.wrap_edges && p.pos.y > h + m) || p.pos.x < -m || p.pos.x > w + m
        }
        ParticleType::Radio => radio_radius(p) >= edge_distance(p.pos, bounds),
        ParticleType::Speed => match p.side {
            Some(Side::Left) => p.pos.x > w,
            Some(Side::Right) => p.pos.x < 0.0,
            None => p.pos.x < 0.0 || p.pos.x > w,
        },
        ParticleType::CosmicWave => outside(p.pos, bounds, p.size),
        ParticleType::Stardust => !p.wrap_edges && outside(p.pos, bounds, OFFSCREEN_MARGIN),
        ParticleType::Flow | ParticleType::Lightning | ParticleType::Clock | ParticleType::Sparkle => {
            false
        }
    }
}

/// Current ring radius; rings grow linearly to their size over their life.
pub fn radio_radius(p: &Particle) -> f32 {
    p.size * p.progress()
}

/// Distance from `pos` to the nearest surface edge (negative when outside).
pub fn edge_distance(pos: Vec2, bounds: Vec2) -> f32 {
    pos.x.min(bounds.x - pos.x).min(pos.y).min(bounds.y - pos.y)
}

/// Random-walk horizontal speed, held inside the particle's drift limit.
fn drift_x(p: &mut Particle, amount: f32, dt: f32) {
    let limit = p.drift_limit.max(0.0);
    p.vel.x = (p.vel.x + hash_signed(p.seed, p.age) * amount * dt).clamp(-limit, limit);
}

fn outside(pos: Vec2, bounds: Vec2, margin: f32) -> bool {
    pos.x < -margin || pos.x > bounds.x + margin || pos.y < -margin || pos.y > bounds.y + margin
}

/// Flow particles stay inside their half. Cross-over spawns may linger past
/// the seam but never drift further from home.
fn keep_in_region(p: &mut Particle, prev_x: f32, bounds: Vec2) {
    let (lo, hi) = match p.side {
        Some(side) => half_span(side, bounds.x),
        None => (0.0, bounds.x),
    };
    p.pos.x = if prev_x < lo {
        p.pos.x.clamp(prev_x.min(lo), hi)
    } else if prev_x > hi {
        p.pos.x.clamp(lo, prev_x.max(hi))
    } else {
        p.pos.x.clamp(lo, hi)
    };
    p.pos.y = p.pos.y.clamp(0.0, bounds.y.max(0.0));
}

fn wrap(p: &mut Particle, bounds: Vec2) {
    if bounds.x > 0.0 {
        p.pos.x = p.pos.x.rem_euclid(bounds.x);
    }
    if bounds.y > 0.0 {
        p.pos.y = p.pos.y.rem_euclid(bounds.y);
    }
}

/// 1 until `start`, then linear to 0 at `lifetime`.
fn hold_then_fade(age: u32, start: u32, lifetime: u32) -> f32 {
    if age <= start {
        return 1.0;
    }
    let span = lifetime.saturating_sub(start);
    if span == 0 {
        return 0.0;
    }
    1.0 - ((age - start) as f32 / span as f32).min(1.0)
}

/// 1 while `t <= hold`, then linear to 0 at `t = 1`.
fn tail_fade(t: f32, hold: f32) -> f32 {
    if t <= hold {
        1.0
    } else {
        ((1.0 - t) / (1.0 - hold)).clamp(0.0, 1.0)
    }
}

fn fade_in(p: &Particle) -> f32 {
    if p.fade_in_ticks == 0 {
        return 1.0;
    }
    (p.age as f32 / p.fade_in_ticks as f32).min(1.0)
}

fn envelope(p: &Particle) -> f32 {
    let fade_out = if p.fade_out_ticks == 0 {
        1.0
    } else {
        (p.remaining_ticks() as f32 / p.fade_out_ticks as f32).min(1.0)
    };
    fade_in(p) * fade_out
}

fn twinkle(p: &Particle) -> f32 {
    0.6 + 0.4 * (p.sway_phase + p.age as f32 * TWINKLE_RATE).sin()
}

/// Deterministic jitter in `[-1, 1]` for a particle at a given tick.
pub(crate) fn hash_signed(seed: u64, tick: u32) -> f32 {
    let mut x = (seed as u32) ^ ((seed >> 32) as u32);
    x = x.wrapping_add(tick.wrapping_mul(0x9e37_79b9));
    x = x.wrapping_mul(747_796_405).wrapping_add(2_891_336_453);
    x ^= x >> 16;
    x = x.wrapping_mul(2_246_822_519);
    x ^= x >> 13;
    (x as f32 / u32::MAX as f32) * 2.0 - 1.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use egui::Color32;

    const BOUNDS: Vec2 = Vec2::new(800.0, 600.0);

    fn particle(kind: ParticleType) -> Particle {
        Particle {
            kind,
            side: None,
            pos: Vec2::new(400.0, 300.0),
            vel: Vec2::ZERO,
            size: 4.0,
            color: Color32::WHITE,
            base_opacity: 0.8,
            opacity: 0.8,
            age: 0,
            max_lifetime: 100,
            fade_in_ticks: 0,
            fade_out_ticks: 0,
            fade_start_tick: 0,
            rotation: 0.0,
            spin: 0.0,
            capsule: Vec2::new(2.0, 6.0),
            sway_phase: 0.0,
            gravity: 0.0,
            drift: 0.0,
            drift_limit: 10.0,
            wrap_edges: false,
            seed: 42,
        }
    }

    #[test]
    fn zero_delta_is_a_no_op() {
        let mut p = particle(ParticleType::Speed);
        p.vel = Vec2::new(3.0, 0.0);
        let before = p.clone();
        advance(&mut p, 0, BOUNDS);
        assert_eq!(p, before);
    }

    #[test]
    fn flow_holds_then_fades() {
        let mut p = particle(ParticleType::Flow);
        p.fade_start_tick = 60;
        for _ in 0..60 {
            advance(&mut p, 1, BOUNDS);
        }
        assert!((p.opacity - 0.8).abs() < 1e-6);
        for _ in 0..20 {
            advance(&mut p, 1, BOUNDS);
        }
        // 20 of the 40 remaining ticks
        assert!((p.opacity - 0.4).abs() < 1e-5);
        for _ in 0..20 {
            advance(&mut p, 1, BOUNDS);
        }
        assert_eq!(p.opacity, 0.0);
        assert!(is_expired(&p, BOUNDS));
    }

    #[test]
    fn flow_stays_in_its_half() {
        let mut p = particle(ParticleType::Flow);
        p.side = Some(Side::Left);
        p.pos = Vec2::new(390.0, 300.0);
        p.vel = Vec2::new(5.0, 0.0);
        p.max_lifetime = 1000;
        for _ in 0..20 {
            advance(&mut p, 1, BOUNDS);
            assert!(p.pos.x <= 400.0);
        }
    }

    #[test]
    fn grain_fades_in_last_fifth() {
        let mut p = particle(ParticleType::Grain);
        p.vel = Vec2::new(0.0, 1.0);
        p.max_lifetime = 100;
        advance(&mut p, 80, BOUNDS);
        assert!((p.opacity - 0.8).abs() < 1e-6);
        advance(&mut p, 10, BOUNDS);
        assert!((p.opacity - 0.4).abs() < 1e-5);
    }

    #[test]
    fn grain_has_a_fall_floor_and_wraps() {
        let mut p = particle(ParticleType::Grain);
        p.vel = Vec2::new(0.0, -3.0);
        advance(&mut p, 1, BOUNDS);
        assert!(p.vel.y >= GRAIN_MIN_FALL);

        p.wrap_edges = true;
        p.pos.y = BOUNDS.y + 10.0;
        p.vel.y = 1.0;
        advance(&mut p, 1, BOUNDS);
        assert_eq!(p.pos.y, 0.0);
        assert!(!is_expired(&p, BOUNDS));

        p.wrap_edges = false;
        p.pos.y = BOUNDS.y + 100.0;
        assert!(is_expired(&p, BOUNDS));
    }

    #[test]
    fn radio_fades_faster_near_edges() {
        let mut centre = particle(ParticleType::Radio);
        centre.size = 100.0;
        let mut edge = centre.clone();
        edge.pos = Vec2::new(80.0, 300.0);
        advance(&mut centre, 50, BOUNDS);
        advance(&mut edge, 50, BOUNDS);
        assert!((centre.opacity - 0.4).abs() < 1e-5);
        assert!(edge.opacity < centre.opacity);

        edge.pos.x = 40.0;
        assert!(is_expired(&edge, BOUNDS));
        assert!(!is_expired(&centre, BOUNDS));
    }

    #[test]
    fn speed_is_culled_past_the_far_edge() {
        let mut p = particle(ParticleType::Speed);
        p.side = Some(Side::Left);
        p.pos.x = 795.0;
        p.vel = Vec2::new(8.0, 0.0);
        assert!(!is_expired(&p, BOUNDS));
        advance(&mut p, 1, BOUNDS);
        assert!(is_expired(&p, BOUNDS));

        let mut r = particle(ParticleType::Speed);
        r.side = Some(Side::Right);
        r.pos.x = 3.0;
        r.vel = Vec2::new(-8.0, 0.0);
        advance(&mut r, 1, BOUNDS);
        assert!(is_expired(&r, BOUNDS));
    }

    #[test]
    fn point_effects_are_stationary_and_rotate() {
        for kind in [ParticleType::Lightning, ParticleType::Clock, ParticleType::Sparkle] {
            let mut p = particle(kind);
            p.spin = 0.05;
            advance(&mut p, 40, BOUNDS);
            assert_eq!(p.pos, Vec2::new(400.0, 300.0));
            assert!((p.opacity - 0.8 * 0.6).abs() < 1e-5);
            if kind != ParticleType::Lightning {
                assert!((p.rotation - 2.0).abs() < 1e-5);
            }
        }
    }

    #[test]
    fn stardust_wraps_around() {
        let mut p = particle(ParticleType::Stardust);
        p.wrap_edges = true;
        p.pos = Vec2::new(799.0, 1.0);
        p.vel = Vec2::new(2.0, -2.0);
        advance(&mut p, 1, BOUNDS);
        assert!(p.pos.x >= 0.0 && p.pos.x < BOUNDS.x);
        assert!(p.pos.y >= 0.0 && p.pos.y < BOUNDS.y);
        assert!(!is_expired(&p, BOUNDS));
    }

    #[test]
    fn cosmic_wave_envelope() {
        let mut p = particle(ParticleType::CosmicWave);
        p.fade_in_ticks = 10;
        p.fade_out_ticks = 10;
        advance(&mut p, 5, BOUNDS);
        assert!((p.opacity - 0.4).abs() < 1e-5);
        advance(&mut p, 45, BOUNDS);
        assert!((p.opacity - 0.8).abs() < 1e-5);
        advance(&mut p, 45, BOUNDS);
        assert!((p.opacity - 0.4).abs() < 1e-5);
    }

    #[test]
    fn expiry_is_idempotent() {
        let mut population: Vec<Particle> = (0..10)
            .map(|i| {
                let mut p = particle(ParticleType::ALL[i % 9]);
                p.max_lifetime = 10 + i as u32 * 5;
                p
            })
            .collect();
        for _ in 0..30 {
            for p in population.iter_mut() {
                advance(p, 1, BOUNDS);
            }
        }
        population.retain(|p| !is_expired(p, BOUNDS));
        let once = population.clone();
        population.retain(|p| !is_expired(p, BOUNDS));
        assert_eq!(once, population);
        assert!(population.iter().all(|p| p.age < p.max_lifetime));
    }

    #[test]
    fn drift_never_runs_away() {
        for kind in [ParticleType::Flow, ParticleType::Grain] {
            let mut p = particle(kind);
            p.drift = 0.5;
            p.drift_limit = 0.3;
            p.max_lifetime = u32::MAX;
            let mut moved = false;
            for _ in 0..5000 {
                advance(&mut p, 1, BOUNDS);
                assert!(p.vel.x.abs() <= 0.3 + 1e-6, "{kind}: {}", p.vel.x);
                moved |= p.vel.x != 0.0;
            }
            assert!(moved, "{kind}");
        }
    }

    #[test]
    fn jitter_is_bounded_and_deterministic() {
        for tick in 0..1000 {
            let v = hash_signed(7, tick);
            assert!((-1.0..=1.0).contains(&v));
            assert_eq!(v, hash_signed(7, tick));
        }
    }
}
