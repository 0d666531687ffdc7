//! Particle drawing.
//!
//! Draw routines read particles and never mutate them. They paint through the
//! [`Canvas`] trait so the simulation runs the same against an egui painter,
//! a recording surface in tests, or nothing at all.

use crate::particles::Particle;
use crate::updater::{edge_distance, radio_radius};
use crate::config::ParticleType;
use egui::{Color32, Painter, Pos2, Rect, Shape, Stroke, Vec2};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use std::f32::consts::{FRAC_PI_2, PI, TAU};

/// Particles fainter than this are skipped entirely.
const MIN_VISIBLE_ALPHA: f32 = 0.01;
/// Streak length per pixel-per-tick of speed.
const STREAK_SCALE: f32 = 4.0;
/// Lightning reshapes its bolt every this many ticks.
const BOLT_FLICKER_TICKS: u32 = 3;
const WAVE_SEGMENTS: usize = 16;

/// 2D drawing surface in engine coordinates (origin at the surface's top left).
pub trait Canvas {
    fn fill_circle(&mut self, center: Pos2, radius: f32, color: Color32);
    fn stroke_circle(&mut self, center: Pos2, radius: f32, stroke: Stroke);
    fn line(&mut self, a: Pos2, b: Pos2, stroke: Stroke);
    fn polyline(&mut self, points: &[Pos2], stroke: Stroke);

    /// Surface-wide opacity the host composites with. Called before each render.
    fn set_opacity(&mut self, _opacity: f32) {}
}

// ============================================================================
// Surfaces
// ============================================================================

/// Paints onto an egui layer, offset to `rect` and multiplied by the
/// surface opacity.
pub struct EguiCanvas<'a> {
    painter: &'a Painter,
    origin: Vec2,
    opacity: f32,
}

impl<'a> EguiCanvas<'a> {
    pub fn new(painter: &'a Painter, rect: Rect) -> Self {
        Self {
            painter,
            origin: rect.min.to_vec2(),
            opacity: 1.0,
        }
    }

    fn at(&self, p: Pos2) -> Pos2 {
        p + self.origin
    }

    fn tint(&self, color: Color32) -> Color32 {
        color.gamma_multiply(self.opacity)
    }
}

impl Canvas for EguiCanvas<'_> {
    fn fill_circle(&mut self, center: Pos2, radius: f32, color: Color32) {
        self.painter.circle_filled(self.at(center), radius, self.tint(color));
    }

    fn stroke_circle(&mut self, center: Pos2, radius: f32, stroke: Stroke) {
        let stroke = Stroke::new(stroke.width, self.tint(stroke.color));
        self.painter.circle_stroke(self.at(center), radius, stroke);
    }

    fn line(&mut self, a: Pos2, b: Pos2, stroke: Stroke) {
        let stroke = Stroke::new(stroke.width, self.tint(stroke.color));
        self.painter.line_segment([self.at(a), self.at(b)], stroke);
    }

    fn polyline(&mut self, points: &[Pos2], stroke: Stroke) {
        if points.len() < 2 {
            return;
        }
        let stroke = Stroke::new(stroke.width, self.tint(stroke.color));
        let points = points.iter().map(|&p| self.at(p)).collect();
        self.painter.add(Shape::line(points, stroke));
    }

    fn set_opacity(&mut self, opacity: f32) {
        self.opacity = opacity.clamp(0.0, 1.0);
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum DrawCall {
    Circle { center: Pos2, radius: f32, color: Color32 },
    Ring { center: Pos2, radius: f32, stroke: Stroke },
    Line { a: Pos2, b: Pos2, stroke: Stroke },
    Polyline { points: Vec<Pos2>, stroke: Stroke },
}

/// Keeps every call instead of drawing; lets tests and headless hosts
/// inspect what a frame would have painted.
#[derive(Default, Debug)]
pub struct RecordingCanvas {
    pub calls: Vec<DrawCall>,
    pub opacity: Option<f32>,
}

impl RecordingCanvas {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.calls.clear();
    }
}

impl Canvas for RecordingCanvas {
    fn fill_circle(&mut self, center: Pos2, radius: f32, color: Color32) {
        self.calls.push(DrawCall::Circle { center, radius, color });
    }

    fn stroke_circle(&mut self, center: Pos2, radius: f32, stroke: Stroke) {
        self.calls.push(DrawCall::Ring { center, radius, stroke });
    }

    fn line(&mut self, a: Pos2, b: Pos2, stroke: Stroke) {
        self.calls.push(DrawCall::Line { a, b, stroke });
    }

    fn polyline(&mut self, points: &[Pos2], stroke: Stroke) {
        self.calls.push(DrawCall::Polyline {
            points: points.to_vec(),
            stroke,
        });
    }

    fn set_opacity(&mut self, opacity: f32) {
        self.opacity = Some(opacity);
    }
}

// ============================================================================
// Draw routines
// ============================================================================

fn fade(color: Color32, alpha: f32) -> Color32 {
    color.gamma_multiply(alpha.clamp(0.0, 1.0))
}

/// Draw every particle; returns how many were visible enough to paint.
pub fn render_population(canvas: &mut dyn Canvas, population: &[Particle], bounds: Vec2) -> usize {
    population.iter().filter(|p| draw(canvas, p, bounds)).count()
}

/// Draw one particle onto a surface of size `bounds`. Returns `false` when it
/// was too faint to paint.
pub fn draw(canvas: &mut dyn Canvas, p: &Particle, bounds: Vec2) -> bool {
    let alpha = p.opacity;
    if alpha.is_nan() || alpha < MIN_VISIBLE_ALPHA {
        return false;
    }
    let center = p.pos.to_pos2();
    let color = fade(p.color, alpha);

    match p.kind {
        ParticleType::Flow => glow_orb(canvas, center, p.size, p.color, alpha),
        ParticleType::Grain => draw_capsule(canvas, center, p.capsule, p.rotation, color),
        ParticleType::Radio => return draw_rings(canvas, p, alpha, bounds),
        ParticleType::Speed => {
            let len = p.vel.length();
            let dir = if len > 1e-3 { p.vel / len } else { Vec2::X };
            let tail = center - dir * (len * STREAK_SCALE + p.size * 2.0);
            canvas.line(tail, center, Stroke::new(p.size.max(0.5), color));
            canvas.fill_circle(center, p.size * 0.5, color);
        }
        ParticleType::Lightning => draw_bolt(canvas, p, alpha),
        ParticleType::Clock => draw_clock(canvas, center, p.size, p.rotation, color),
        ParticleType::Sparkle => {
            canvas.fill_circle(center, p.size * 1.5, fade(p.color, alpha / 4.0));
            draw_star(canvas, center, p.size, p.rotation, color);
        }
        ParticleType::CosmicWave => draw_wave(canvas, p, alpha),
        ParticleType::Stardust => {
            canvas.fill_circle(center, p.size, color);
            if p.size > 1.2 && alpha > 0.5 {
                let arm = p.size * 2.5;
                let thin = Stroke::new(0.5, fade(p.color, alpha * 0.5));
                canvas.line(center - Vec2::X * arm, center + Vec2::X * arm, thin);
                canvas.line(center - Vec2::Y * arm, center + Vec2::Y * arm, thin);
            }
        }
    }
    true
}

/// Layered soft glow: wide faint halo down to a bright core.
pub fn glow_orb(canvas: &mut dyn Canvas, center: Pos2, size: f32, color: Color32, alpha: f32) {
    // Layer 1: Outer soft glow
    canvas.fill_circle(center, size * 1.6, fade(color, alpha * 0.1));
    // Layer 2: Mid glow
    canvas.fill_circle(center, size * 1.2, fade(color, alpha * 0.17));
    // Layer 3: Core
    canvas.fill_circle(center, size * 0.7, fade(color, alpha * 0.5));
    // Layer 4: Bright center
    canvas.fill_circle(center, size * 0.35, fade(color, alpha.min(0.6)));
}

/// Rounded capsule: a thick segment along the tilted axis with round ends.
fn draw_capsule(canvas: &mut dyn Canvas, center: Pos2, capsule: Vec2, angle: f32, color: Color32) {
    let width = capsule.x.max(0.5);
    let half = ((capsule.y - width) / 2.0).max(0.0);
    let axis = Vec2::new(-angle.sin(), angle.cos());
    let a = center - axis * half;
    let b = center + axis * half;
    canvas.line(a, b, Stroke::new(width, color));
    canvas.fill_circle(a, width / 2.0, color);
    canvas.fill_circle(b, width / 2.0, color);
}

/// One or two rings, never wider than the distance to the nearest edge.
fn draw_rings(canvas: &mut dyn Canvas, p: &Particle, alpha: f32, bounds: Vec2) -> bool {
    let radius = radio_radius(p).min(edge_distance(p.pos, bounds));
    if radius <= 0.0 {
        return false;
    }
    let center = p.pos.to_pos2();
    canvas.stroke_circle(center, radius, Stroke::new(2.0, fade(p.color, alpha)));
    if p.progress() > 0.3 {
        canvas.stroke_circle(center, radius * 0.6, Stroke::new(1.0, fade(p.color, alpha * 0.5)));
    }
    true
}

/// Jagged bolt from the top of the strike area plus branches; both grow
/// with age. The shape is seeded so it only changes every few ticks.
fn draw_bolt(canvas: &mut dyn Canvas, p: &Particle, alpha: f32) {
    let t = p.progress();
    let flicker = p.age / BOLT_FLICKER_TICKS;
    let mut rng = SmallRng::seed_from_u64(p.seed ^ u64::from(flicker));
    let center = p.pos.to_pos2();

    // Shape parameters move in the same steps as the seed.
    let shape_t = if p.max_lifetime == 0 {
        1.0
    } else {
        ((flicker * BOLT_FLICKER_TICKS) as f32 / p.max_lifetime as f32).min(1.0)
    };

    let segments = 6 + (shape_t * 6.0) as usize;
    let jitter = 4.0 + shape_t * 10.0;
    let start = center - Vec2::Y * (p.size / 2.0);
    let heading = FRAC_PI_2 + rng.gen_range(-0.3..0.3);
    let main = jagged_path(&mut rng, start, heading, p.size, segments, jitter);

    canvas.fill_circle(center, p.size * 0.15 * (1.0 + t), fade(p.color, alpha * 0.3));
    canvas.polyline(&main, Stroke::new(2.0, fade(p.color, alpha)));

    let branches = ((shape_t * 3.0).ceil() as usize).min(3);
    for _ in 0..branches {
        let from = main[rng.gen_range(1..main.len())];
        let side = if rng.gen_bool(0.5) { 1.0 } else { -1.0 };
        let angle = heading + side * rng.gen_range(0.4..0.9);
        let len = p.size * rng.gen_range(0.2..0.45);
        let branch = jagged_path(&mut rng, from, angle, len, segments / 2 + 1, jitter * 0.6);
        canvas.polyline(&branch, Stroke::new(1.0, fade(p.color, alpha * 0.7)));
    }
}

fn jagged_path(
    rng: &mut SmallRng,
    start: Pos2,
    heading: f32,
    len: f32,
    segments: usize,
    jitter: f32,
) -> Vec<Pos2> {
    let segments = segments.max(1);
    let step = len / segments as f32;
    let mut pts = Vec::with_capacity(segments + 1);
    let mut at = start;
    pts.push(at);
    for _ in 0..segments {
        let dir = heading + rng.gen_range(-0.6..0.6);
        at += Vec2::angled(dir) * step;
        at += Vec2::new(rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0)) * (jitter * 0.25);
        pts.push(at);
    }
    pts
}

fn draw_clock(canvas: &mut dyn Canvas, center: Pos2, size: f32, angle: f32, color: Color32) {
    canvas.stroke_circle(center, size, Stroke::new(1.5, color));
    for i in 0..12 {
        let a = angle + i as f32 * TAU / 12.0;
        let inner = if i % 3 == 0 { 0.75 } else { 0.85 };
        let dir = Vec2::angled(a);
        canvas.line(center + dir * size * inner, center + dir * size, Stroke::new(1.0, color));
    }
    // Minute hand follows the spin, hour hand a twelfth of it.
    canvas.line(center, center + Vec2::angled(angle - FRAC_PI_2) * size * 0.8, Stroke::new(1.0, color));
    canvas.line(center, center + Vec2::angled(angle / 12.0 - FRAC_PI_2) * size * 0.5, Stroke::new(2.0, color));
    canvas.fill_circle(center, 1.5, color);
}

/// Four-point star outline with spokes.
fn draw_star(canvas: &mut dyn Canvas, center: Pos2, size: f32, angle: f32, color: Color32) {
    let points = 4;
    let outer_r = size;
    let inner_r = size * 0.35;

    let mut vertices = Vec::with_capacity(points * 2 + 1);
    for i in 0..(points * 2) {
        let a = angle + (i as f32 * PI / points as f32);
        let r = if i % 2 == 0 { outer_r } else { inner_r };
        vertices.push(center + Vec2::angled(a) * r);
    }

    for v in vertices.iter().step_by(2) {
        canvas.line(center, *v, Stroke::new(1.0, color));
    }
    vertices.push(vertices[0]);
    canvas.polyline(&vertices, Stroke::new(1.0, color));
}

fn draw_wave(canvas: &mut dyn Canvas, p: &Particle, alpha: f32) {
    let center = p.pos.to_pos2();
    let amplitude = p.size * 0.25;
    let phase = p.sway_phase + p.age as f32 * 0.05;
    let points: Vec<Pos2> = (0..=WAVE_SEGMENTS)
        .map(|i| {
            let u = i as f32 / WAVE_SEGMENTS as f32;
            let x = (u * 2.0 - 1.0) * p.size;
            let y = (phase + u * TAU).sin() * amplitude;
            center + Vec2::new(x, y)
        })
        .collect();

    canvas.polyline(&points, Stroke::new((p.size * 0.2).max(1.0), fade(p.color, alpha * 0.25)));
    canvas.polyline(&points, Stroke::new(1.5, fade(p.color, alpha)));
}

// ============================================================================
// Static fallback
// ============================================================================

/// Decorative glow point in normalized surface coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FallbackGlow {
    /// `[0, 1]` on both axes.
    pub center: Pos2,
    /// Fraction of the shorter surface dimension.
    pub radius: f32,
    pub color: Color32,
    pub alpha: f32,
}

pub fn draw_fallback(canvas: &mut dyn Canvas, glows: &[FallbackGlow], bounds: Vec2) -> usize {
    let scale = bounds.x.min(bounds.y).max(0.0);
    let mut drawn = 0;
    for glow in glows {
        let center = Pos2::new(glow.center.x * bounds.x, glow.center.y * bounds.y);
        let radius = glow.radius * scale;
        if radius <= 0.0 {
            continue;
        }
        glow_orb(canvas, center, radius, glow.color, glow.alpha);
        drawn += 1;
    }
    drawn
}
