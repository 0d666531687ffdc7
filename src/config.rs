//! Configuration and data model for the theme particle engine
//! Particle types, sides, performance tiers, resolved per-type configs and engine settings

use crate::error::EngineError;
use egui::Color32;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Enums
// ============================================================================

/// The nine supported particle motifs.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Debug)]
#[serde(rename_all = "kebab-case")]
pub enum ParticleType {
    Flow,
    Grain,
    Radio,
    Speed,
    Lightning,
    Clock,
    Sparkle,
    CosmicWave,
    Stardust,
}

impl ParticleType {
    pub const ALL: [ParticleType; 9] = [
        Self::Flow,
        Self::Grain,
        Self::Radio,
        Self::Speed,
        Self::Lightning,
        Self::Clock,
        Self::Sparkle,
        Self::CosmicWave,
        Self::Stardust,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Flow => "flow",
            Self::Grain => "grain",
            Self::Radio => "radio",
            Self::Speed => "speed",
            Self::Lightning => "lightning",
            Self::Clock => "clock",
            Self::Sparkle => "sparkle",
            Self::CosmicWave => "cosmic-wave",
            Self::Stardust => "stardust",
        }
    }

    /// Point effects that never move after spawning.
    pub fn is_stationary(&self) -> bool {
        matches!(
            self,
            Self::Radio | Self::Lightning | Self::Clock | Self::Sparkle
        )
    }
}

impl fmt::Display for ParticleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ParticleType {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('_', "-");
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.name() == normalized)
            .ok_or_else(|| EngineError::UnknownParticleType(s.to_string()))
    }
}

/// Half of the surface a theme owns in comparison view.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Debug)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub fn opposite(self) -> Self {
        match self {
            Self::Left => Self::Right,
            Self::Right => Self::Left,
        }
    }
}

/// Coarse quality tier picked by the driver from measured frame rate.
/// Ordered from cheapest to most expensive.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Debug)]
#[serde(rename_all = "lowercase")]
pub enum PerformanceMode {
    Low,
    Medium,
    High,
}

impl Default for PerformanceMode {
    fn default() -> Self {
        Self::High
    }
}

impl PerformanceMode {
    /// Multiplier applied to spawn probability and population caps.
    pub fn factor(self) -> f32 {
        match self {
            Self::High => 1.0,
            Self::Medium => 0.7,
            Self::Low => 0.4,
        }
    }

    /// Scale an integer population cap, rounding down.
    pub fn scale_count(self, count: usize) -> usize {
        (count as f32 * self.factor()).floor() as usize
    }

    pub fn step_up(self) -> Self {
        match self {
            Self::Low => Self::Medium,
            Self::Medium | Self::High => Self::High,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

// ============================================================================
// Ranges
// ============================================================================

/// Closed `[min, max]` sampling range. Construction keeps `min <= max`.
#[derive(Clone, Copy, PartialEq, Serialize, Deserialize, Debug)]
pub struct Range {
    pub min: f32,
    pub max: f32,
}

impl Range {
    pub const ZERO: Range = Range { min: 0.0, max: 0.0 };

    pub fn new(a: f32, b: f32) -> Self {
        if a <= b {
            Self { min: a, max: b }
        } else {
            Self { min: b, max: a }
        }
    }

    pub const fn fixed(v: f32) -> Self {
        Self { min: v, max: v }
    }

    pub fn sample(&self, rng: &mut impl Rng) -> f32 {
        if self.max > self.min {
            rng.gen_range(self.min..self.max)
        } else {
            self.min
        }
    }

    /// Multiply both ends by a non-negative factor.
    pub fn scaled(&self, factor: f32) -> Self {
        let factor = factor.max(0.0);
        Self::new(self.min * factor, self.max * factor)
    }

    pub fn clamped(&self, lo: f32, hi: f32) -> Self {
        Self::new(self.min.clamp(lo, hi), self.max.clamp(lo, hi))
    }

    pub fn is_ordered(&self) -> bool {
        self.min <= self.max
    }
}

// ============================================================================
// Resolved particle configuration
// ============================================================================

/// Fully resolved parameters for one particle type in one context
/// (theme, performance mode, side). Produced fresh by the resolver on every call.
#[derive(Clone, PartialEq, Serialize, Deserialize, Debug)]
pub struct ParticleTypeConfig {
    pub kind: ParticleType,
    /// Chance of a spawn on a single simulation tick, in `[0, 1]`.
    pub spawn_probability: f32,
    pub max_population: usize,
    pub fade_in_ticks: u32,
    pub fade_out_ticks: u32,
    pub fade_start_delay_ticks: u32,
    pub velocity_x: Range,
    pub velocity_y: Range,
    pub size: Range,
    pub opacity: Range,
    /// Lifetime in simulation ticks.
    pub lifetime: Range,
    pub wrap_edges: bool,
    pub gravity: f32,
    pub drift: f32,
    /// Chance a side-tagged particle spawns just across the centre seam.
    pub crossover_probability: f32,
    /// Width of the cross-over band as a fraction of surface width.
    pub crossover_band: f32,
}

impl ParticleTypeConfig {
    /// Checks every invariant a resolved config has to satisfy.
    pub fn is_valid(&self) -> bool {
        (0.0..=1.0).contains(&self.spawn_probability)
            && (0.0..=1.0).contains(&self.crossover_probability)
            && self.velocity_x.is_ordered()
            && self.velocity_y.is_ordered()
            && self.size.is_ordered()
            && self.opacity.is_ordered()
            && self.lifetime.is_ordered()
            && self.lifetime.min >= 1.0
    }
}

// ============================================================================
// Theme descriptor (external input)
// ============================================================================

/// Visual motif of one character, supplied by the wiki's theme lookup.
#[derive(Clone, PartialEq, Serialize, Deserialize, Debug)]
pub struct ThemeDescriptor {
    pub id: String,
    pub particles: ParticleStyle,
}

#[derive(Clone, PartialEq, Serialize, Deserialize, Debug)]
pub struct ParticleStyle {
    /// Raw particle type name; unknown names produce no particles.
    #[serde(rename = "type")]
    pub kind: String,
    pub color: String,
    #[serde(default = "default_unit")]
    pub intensity: f32,
    #[serde(default = "default_unit")]
    pub speed: f32,
}

fn default_unit() -> f32 {
    1.0
}

impl ThemeDescriptor {
    pub fn new(id: &str, kind: &str, color: &str, intensity: f32, speed: f32) -> Self {
        Self {
            id: id.to_string(),
            particles: ParticleStyle {
                kind: kind.to_string(),
                color: color.to_string(),
                intensity,
                speed,
            },
        }
    }

    pub fn particle_type(&self) -> Result<ParticleType, EngineError> {
        self.particles.kind.parse()
    }

    pub fn color(&self) -> Result<Color32, EngineError> {
        parse_hex_color(&self.particles.color)
    }

    /// Intensity clamped to `[0, 1]`; non-finite values count as full intensity.
    pub fn intensity(&self) -> f32 {
        let i = self.particles.intensity;
        if i.is_finite() {
            i.clamp(0.0, 1.0)
        } else {
            1.0
        }
    }

    /// Speed multiplier, never negative; non-finite values count as 1.
    pub fn speed(&self) -> f32 {
        let s = self.particles.speed;
        if s.is_finite() {
            s.max(0.0)
        } else {
            1.0
        }
    }
}

/// Parse `#rgb`, `#rrggbb` or `#rrggbbaa` (leading `#` optional).
pub fn parse_hex_color(s: &str) -> Result<Color32, EngineError> {
    let invalid = || EngineError::InvalidColor(s.to_string());
    let hex = s.trim().trim_start_matches('#');
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(invalid());
    }

    let channel = |i: usize, len: usize| -> Result<u8, EngineError> {
        let digits = &hex[i * len..i * len + len];
        let v = u8::from_str_radix(digits, 16).map_err(|_| invalid())?;
        Ok(if len == 1 { v * 17 } else { v })
    };

    match hex.len() {
        3 => Ok(Color32::from_rgb(channel(0, 1)?, channel(1, 1)?, channel(2, 1)?)),
        6 => Ok(Color32::from_rgb(channel(0, 2)?, channel(1, 2)?, channel(2, 2)?)),
        8 => Ok(Color32::from_rgba_unmultiplied(
            channel(0, 2)?,
            channel(1, 2)?,
            channel(2, 2)?,
            channel(3, 2)?,
        )),
        _ => Err(invalid()),
    }
}

// ============================================================================
// Engine Configuration
// ============================================================================

#[derive(Clone, Serialize, Deserialize, Debug)]
#[serde(default)]
pub struct EngineConfig {
    pub tick_rate_hz: f32,
    pub max_steps_per_frame: u32,
    // Opacity transitions
    pub activation_delay_secs: f32,
    pub fade_in_secs: f32,
    pub empty_population_timeout_secs: f32,
    // Frame-rate sampling
    pub sample_window_secs: f32,
    pub fps_medium_threshold: f32,
    pub fps_low_threshold: f32,
    pub fps_recover_threshold: f32,
    // Side placement
    pub crossover_probability: f32,
    pub crossover_band: f32,
    pub seed: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_rate_hz: 60.0,
            max_steps_per_frame: 8,
            activation_delay_secs: 0.3,
            fade_in_secs: 0.8,
            empty_population_timeout_secs: 3.0,
            sample_window_secs: 1.0,
            fps_medium_threshold: 30.0,
            fps_low_threshold: 20.0,
            fps_recover_threshold: 50.0,
            crossover_probability: 0.08,
            crossover_band: 0.12,
            seed: None,
        }
    }
}

impl EngineConfig {
    pub fn save(&self, path: &str) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn load(path: &str) -> anyhow::Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&json)?;
        Ok(config.sanitized())
    }

    /// Clamp user-supplied values into ranges the driver can work with.
    pub fn sanitized(mut self) -> Self {
        let defaults = Self::default();
        if !(self.tick_rate_hz.is_finite() && self.tick_rate_hz > 0.0) {
            self.tick_rate_hz = defaults.tick_rate_hz;
        }
        self.max_steps_per_frame = self.max_steps_per_frame.max(1);
        self.activation_delay_secs = non_negative(self.activation_delay_secs);
        self.fade_in_secs = non_negative(self.fade_in_secs);
        self.empty_population_timeout_secs = non_negative(self.empty_population_timeout_secs);
        if !(self.sample_window_secs.is_finite() && self.sample_window_secs > 0.0) {
            self.sample_window_secs = defaults.sample_window_secs;
        }
        if self.fps_low_threshold > self.fps_medium_threshold {
            std::mem::swap(&mut self.fps_low_threshold, &mut self.fps_medium_threshold);
        }
        self.crossover_probability = unit(self.crossover_probability);
        self.crossover_band = unit(self.crossover_band).min(0.5);
        self
    }

    pub fn fixed_dt(&self) -> f32 {
        1.0 / self.tick_rate_hz
    }
}

fn non_negative(v: f32) -> f32 {
    if v.is_finite() {
        v.max(0.0)
    } else {
        0.0
    }
}

fn unit(v: f32) -> f32 {
    if v.is_finite() {
        v.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Load a JSON array of theme descriptors.
pub fn load_themes(path: &str) -> anyhow::Result<Vec<ThemeDescriptor>> {
    let json = std::fs::read_to_string(path)?;
    let themes = serde_json::from_str(&json)?;
    Ok(themes)
}
