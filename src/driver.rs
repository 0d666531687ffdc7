//! Simulation driver.
//!
//! One driver owns one surface: its theme slots, its particle population, its
//! RNG and its performance mode. The host calls [`SimulationDriver::frame`]
//! once per rendered frame; the driver turns host time into fixed simulation
//! ticks, runs spawn, update and cull for each tick, then draws.

use crate::config::{EngineConfig, PerformanceMode, Side, ThemeDescriptor};
use crate::error::EngineError;
use crate::particles::{half_span, Particle};
use crate::render::{draw_fallback, render_population, Canvas, FallbackGlow};
use crate::resolver::ConfigResolver;
use crate::spawner::{side_count, Spawner};
use crate::updater;
use egui::{Color32, Pos2, Vec2};
use log::{debug, info, trace, warn};
use rand::rngs::SmallRng;
use rand::SeedableRng;

// ============================================================================
// States and reports
// ============================================================================

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum DriverState {
    /// No theme bound and nothing left to draw.
    Idle,
    FadingIn,
    Active,
    /// Every theme cleared; leftover particles finish their own fade.
    FadingOut,
    /// Static glow points instead of a simulation.
    Fallback,
}

impl DriverState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::FadingIn => "fading-in",
            Self::Active => "active",
            Self::FadingOut => "fading-out",
            Self::Fallback => "fallback",
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum FallbackReason {
    SurfaceUnavailable,
    EmptyPopulation,
}

/// What one host frame did.
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct FrameReport {
    /// Surface opacity the host composites with, in `[0, 1]`.
    pub opacity: f32,
    pub state: DriverState,
    pub mode: PerformanceMode,
    pub ticks: u32,
    pub drawn: usize,
    pub population: usize,
}

// ============================================================================
// Fixed-step clock
// ============================================================================

/// Converts variable host frame time into whole simulation ticks.
#[derive(Debug, Clone, Copy)]
pub struct SimulationClock {
    pub fixed_dt_seconds: f32,
    max_steps: u32,
    accumulator_seconds: f32,
}

impl SimulationClock {
    pub fn new(fixed_dt_seconds: f32, max_steps: u32) -> Self {
        Self {
            fixed_dt_seconds,
            max_steps: max_steps.max(1),
            accumulator_seconds: 0.0,
        }
    }

    /// Ticks owed for a frame of `frame_dt_seconds`. Long stalls are dropped
    /// instead of replayed.
    pub fn consume_steps(&mut self, frame_dt_seconds: f32) -> u32 {
        self.accumulator_seconds += frame_dt_seconds.max(0.0);
        let mut steps = 0u32;
        while self.accumulator_seconds >= self.fixed_dt_seconds {
            self.accumulator_seconds -= self.fixed_dt_seconds;
            steps += 1;
            if steps >= self.max_steps {
                self.accumulator_seconds = 0.0;
                break;
            }
        }
        steps
    }

    pub fn reset(&mut self) {
        self.accumulator_seconds = 0.0;
    }
}

// ============================================================================
// Frame-rate sampling
// ============================================================================

/// Averages host frame rate over fixed windows.
#[derive(Debug, Clone)]
pub struct FrameRateSampler {
    window_secs: f32,
    elapsed: f32,
    frames: u32,
}

impl FrameRateSampler {
    pub fn new(window_secs: f32) -> Self {
        Self {
            window_secs,
            elapsed: 0.0,
            frames: 0,
        }
    }

    /// Record one frame; yields the window's average FPS when a window closes.
    pub fn record(&mut self, dt: f32) -> Option<f32> {
        self.elapsed += dt;
        self.frames += 1;
        if self.elapsed < self.window_secs {
            return None;
        }
        let fps = self.frames as f32 / self.elapsed;
        self.reset();
        Some(fps)
    }

    /// Drop the open window.
    pub fn reset(&mut self) {
        self.elapsed = 0.0;
        self.frames = 0;
    }
}

/// Mode after a window averaging `fps`. Drops can skip tiers, recovery climbs
/// one tier per window.
pub fn next_mode(current: PerformanceMode, fps: f32, config: &EngineConfig) -> PerformanceMode {
    if fps < config.fps_low_threshold {
        PerformanceMode::Low
    } else if fps < config.fps_medium_threshold {
        current.min(PerformanceMode::Medium)
    } else if fps >= config.fps_recover_threshold {
        current.step_up()
    } else {
        current
    }
}

// ============================================================================
// Driver
// ============================================================================

/// One bound theme. `primed` stays false until the slot's first particle
/// exists, and that first spawn skips the probability draw.
#[derive(Clone, Debug)]
struct ThemeSlot {
    side: Option<Side>,
    theme: Option<ThemeDescriptor>,
    color: Color32,
    primed: bool,
}

impl ThemeSlot {
    fn new(side: Option<Side>) -> Self {
        Self {
            side,
            theme: None,
            color: Color32::WHITE,
            primed: false,
        }
    }
}

/// Glow layout for the static fallback: x within the slot's span, y, radius, alpha.
const FALLBACK_LAYOUT: [(f32, f32, f32, f32); 3] = [
    (0.25, 0.3, 0.12, 0.35),
    (0.55, 0.65, 0.08, 0.25),
    (0.8, 0.4, 0.1, 0.3),
];

pub struct SimulationDriver {
    config: EngineConfig,
    resolver: ConfigResolver,
    rng: SmallRng,
    slots: Vec<ThemeSlot>,
    population: Vec<Particle>,
    bounds: Vec2,

    state: DriverState,
    fallback: Option<FallbackReason>,
    mode: PerformanceMode,
    clock: SimulationClock,
    sampler: FrameRateSampler,

    opacity: f32,
    /// Host seconds seen by `frame`, each frame clamped to one sample window.
    elapsed: f32,
    state_since: f32,
    fade_from: f32,
    /// Set when the simulation restarts after idle or fallback. The next
    /// frame's dt covers the host's pause and is not counted.
    resuming: bool,
    empty_check_at: Option<f32>,
    spawned_since_bind: usize,
    /// Tick by which every particle alive at the clear has reached its lifetime.
    fade_out_deadline: Option<u64>,
    tick_count: u64,
    running: bool,
}

impl SimulationDriver {
    /// Driver for a single theme spread over the whole surface.
    pub fn single(config: EngineConfig) -> Self {
        Self::with_slots(config, vec![ThemeSlot::new(None)])
    }

    /// Driver for two themes sharing a surface, one per half.
    pub fn comparison(config: EngineConfig) -> Self {
        Self::with_slots(
            config,
            vec![ThemeSlot::new(Some(Side::Left)), ThemeSlot::new(Some(Side::Right))],
        )
    }

    fn with_slots(config: EngineConfig, slots: Vec<ThemeSlot>) -> Self {
        let config = config.sanitized();
        let rng = match config.seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => SmallRng::from_entropy(),
        };
        Self {
            resolver: ConfigResolver::new(&config),
            rng,
            slots,
            population: Vec::new(),
            bounds: Vec2::ZERO,
            state: DriverState::Idle,
            fallback: None,
            mode: PerformanceMode::High,
            clock: SimulationClock::new(config.fixed_dt(), config.max_steps_per_frame),
            sampler: FrameRateSampler::new(config.sample_window_secs),
            opacity: 0.0,
            elapsed: 0.0,
            state_since: 0.0,
            fade_from: 0.0,
            resuming: false,
            empty_check_at: None,
            spawned_since_bind: 0,
            fade_out_deadline: None,
            tick_count: 0,
            running: true,
            config,
        }
    }

    // ------------------------------------------------------------------------
    // Theme binding
    // ------------------------------------------------------------------------

    /// Bind, replace or clear (`None`) the theme of one slot. Particles that
    /// already exist are never removed here.
    ///
    /// A new theme on a live surface re-runs the activation delay and fade-in.
    /// Opacity belongs to the surface, so in comparison view a change on one
    /// side dims and restores both sides together.
    pub fn set_theme(&mut self, side: Option<Side>, theme: Option<ThemeDescriptor>) {
        if !self.running {
            return;
        }
        let Some(slot) = self.slots.iter_mut().find(|s| s.side == side) else {
            warn!("No theme slot for side {side:?} on this driver");
            return;
        };
        if slot.theme == theme {
            return;
        }

        if let Some(t) = &theme {
            slot.color = t.color().unwrap_or_else(|e| {
                warn!("Theme '{}': {e}, using white", t.id);
                Color32::WHITE
            });
            if let Err(e) = t.particle_type() {
                warn!("Theme '{}': {e}, no particles will spawn", t.id);
            }
            debug!("Bound theme '{}' to {side:?}", t.id);
        } else {
            debug!("Cleared theme on {side:?}");
        }
        let binding = theme.is_some();
        slot.theme = theme;
        slot.primed = false;

        if self.has_active_theme() {
            self.empty_check_at = Some(self.elapsed + self.config.empty_population_timeout_secs);
            self.spawned_since_bind = 0;
            match self.state {
                DriverState::Idle | DriverState::FadingOut | DriverState::Fallback => {
                    self.fallback = None;
                    self.enter(DriverState::FadingIn);
                }
                DriverState::FadingIn | DriverState::Active if binding => self.enter(DriverState::FadingIn),
                DriverState::FadingIn | DriverState::Active => {}
            }
        } else {
            self.empty_check_at = None;
            if self.state == DriverState::Fallback || self.population.is_empty() {
                self.population.clear();
                self.fallback = None;
                self.enter(DriverState::Idle);
            } else {
                self.enter(DriverState::FadingOut);
            }
        }
    }

    pub fn theme(&self, side: Option<Side>) -> Option<&ThemeDescriptor> {
        self.slots.iter().find(|s| s.side == side)?.theme.as_ref()
    }

    fn has_active_theme(&self) -> bool {
        self.slots.iter().any(|s| s.theme.is_some())
    }

    fn enter(&mut self, state: DriverState) {
        if self.state != state {
            debug!("Driver {} -> {}", self.state.name(), state.name());
        }
        let was_simulating = self.is_simulating();
        self.state = state;
        self.state_since = self.elapsed;
        self.fade_from = self.opacity;
        self.fade_out_deadline = None;
        match state {
            DriverState::Idle => {
                self.opacity = 0.0;
                self.clock.reset();
            }
            DriverState::Fallback => self.opacity = 1.0,
            DriverState::FadingIn if !was_simulating => {
                self.resuming = true;
                self.sampler.reset();
                self.clock.reset();
            }
            DriverState::FadingOut => {
                let longest = self.population.iter().map(Particle::remaining_ticks).max().unwrap_or(0);
                self.fade_out_deadline = Some(self.tick_count + u64::from(longest));
            }
            DriverState::FadingIn | DriverState::Active => {}
        }
    }

    fn enter_fallback(&mut self, reason: FallbackReason) {
        info!("Switching to static fallback: {reason:?}");
        self.population.clear();
        self.fallback = Some(reason);
        self.empty_check_at = None;
        self.enter(DriverState::Fallback);
    }

    // ------------------------------------------------------------------------
    // Per-frame loop
    // ------------------------------------------------------------------------

    /// One host frame: track the viewport, sample FPS, run the ticks owed,
    /// advance transitions and draw. `surface` is `None` when no drawing
    /// context could be created. Frame time is clamped to one sample window.
    pub fn frame(&mut self, dt: f32, viewport: Vec2, surface: Option<&mut dyn Canvas>) -> FrameReport {
        if !self.running {
            return self.report(0, 0);
        }
        self.resize(viewport);
        self.check_surface(surface.is_some());

        let dt = if std::mem::take(&mut self.resuming) || !dt.is_finite() {
            0.0
        } else {
            dt.clamp(0.0, self.config.sample_window_secs)
        };
        self.elapsed += dt;
        if self.is_simulating() && dt > 0.0 {
            self.sample_frame_rate(dt);
        }

        let ticks = if self.is_simulating() {
            self.clock.consume_steps(dt)
        } else {
            0
        };
        for _ in 0..ticks {
            self.tick();
        }
        self.update_transitions();

        let drawn = match surface {
            Some(canvas) => self.render(canvas),
            None => 0,
        };
        self.report(ticks, drawn)
    }

    fn sample_frame_rate(&mut self, dt: f32) {
        let Some(fps) = self.sampler.record(dt) else {
            return;
        };
        let mode = next_mode(self.mode, fps, &self.config);
        if mode != self.mode {
            info!("Performance mode {} -> {} ({fps:.1} fps)", self.mode.name(), mode.name());
            self.mode = mode;
        }
    }

    /// Track the host viewport. Particles outside a shrunken surface are left
    /// to their own culling rules.
    pub fn resize(&mut self, viewport: Vec2) {
        let viewport = if viewport.x.is_finite() && viewport.y.is_finite() {
            viewport.max(Vec2::ZERO)
        } else {
            Vec2::ZERO
        };
        if viewport != self.bounds {
            debug!("Surface resized to {}x{}", viewport.x, viewport.y);
            self.bounds = viewport;
        }
    }

    fn surface_status(&self, has_canvas: bool) -> Result<(), EngineError> {
        if !has_canvas {
            return Err(EngineError::MissingSurface);
        }
        if self.bounds.x > 0.0 && self.bounds.y > 0.0 {
            Ok(())
        } else {
            Err(EngineError::SurfaceUnavailable {
                width: self.bounds.x,
                height: self.bounds.y,
            })
        }
    }

    fn check_surface(&mut self, has_canvas: bool) {
        let lost = self.fallback == Some(FallbackReason::SurfaceUnavailable);
        match self.surface_status(has_canvas) {
            Err(_) if lost => {}
            Err(e) => {
                if self.state != DriverState::Idle && self.has_active_theme() {
                    warn!("{e}");
                    self.enter_fallback(FallbackReason::SurfaceUnavailable);
                }
            }
            Ok(()) if lost => {
                debug!("Surface available again");
                self.fallback = None;
                self.empty_check_at = Some(self.elapsed + self.config.empty_population_timeout_secs);
                self.spawned_since_bind = 0;
                for slot in &mut self.slots {
                    slot.primed = false;
                }
                self.enter(DriverState::FadingIn);
            }
            Ok(()) => {}
        }
    }

    fn is_simulating(&self) -> bool {
        matches!(
            self.state,
            DriverState::FadingIn | DriverState::Active | DriverState::FadingOut
        )
    }

    fn update_transitions(&mut self) {
        let since = self.elapsed - self.state_since;
        match self.state {
            DriverState::FadingIn => {
                let delay = self.config.activation_delay_secs;
                let ramp = since - delay;
                if since < delay {
                    // Whatever was showing dims out while the new theme waits.
                    self.opacity = self.fade_from * (1.0 - since / delay);
                } else if ramp >= self.config.fade_in_secs {
                    self.opacity = 1.0;
                    self.enter(DriverState::Active);
                } else {
                    self.opacity = ramp / self.config.fade_in_secs;
                }
            }
            DriverState::Active => self.opacity = 1.0,
            DriverState::FadingOut => {
                if self.population.is_empty() {
                    self.enter(DriverState::Idle);
                }
            }
            DriverState::Idle | DriverState::Fallback => {}
        }

        if let Some(at) = self.empty_check_at {
            if self.elapsed >= at {
                self.empty_check_at = None;
                if self.population.is_empty() && self.spawned_since_bind == 0 && self.has_active_theme() {
                    self.enter_fallback(FallbackReason::EmptyPopulation);
                }
            }
        }
    }

    /// One fixed simulation step: spawn for each bound slot, advance every
    /// particle, drop the expired ones. Mode changes apply from the next call.
    pub fn tick(&mut self) {
        if !self.running || !self.is_simulating() {
            return;
        }

        let spawner = Spawner::new(&self.resolver, self.mode, self.bounds);
        let mut spawned = 0;
        for slot in self.slots.iter_mut() {
            let Some(theme) = slot.theme.as_ref() else {
                continue;
            };
            let particle = if slot.primed {
                spawner.try_spawn(theme, slot.color, slot.side, &self.population, &mut self.rng)
            } else {
                spawner.spawn(theme, slot.color, slot.side, &self.population, &mut self.rng)
            };
            if let Some(p) = particle {
                slot.primed = true;
                self.population.push(p);
                spawned += 1;
            }
        }
        self.spawned_since_bind += spawned;

        for p in self.population.iter_mut() {
            updater::advance(p, 1, self.bounds);
        }
        let bounds = self.bounds;
        let before = self.population.len();
        self.population.retain(|p| !updater::is_expired(p, bounds));
        trace!(
            "tick {}: +{spawned} -{} = {}",
            self.tick_count,
            before - self.population.len(),
            self.population.len()
        );
        self.tick_count += 1;

        if self.state != DriverState::FadingOut {
            return;
        }
        if !self.population.is_empty() && self.fade_out_deadline.is_some_and(|at| self.tick_count >= at) {
            warn!(
                "Fade-out passed its deadline with {} particles left, dropping them",
                self.population.len()
            );
            self.population.clear();
        }
        if self.population.is_empty() {
            self.enter(DriverState::Idle);
        }
    }

    /// Draw the current frame; returns the number of shapes painted
    /// (particles, or glow points in fallback).
    pub fn render(&self, canvas: &mut dyn Canvas) -> usize {
        canvas.set_opacity(self.opacity);
        match self.state {
            DriverState::Idle => 0,
            DriverState::Fallback => draw_fallback(canvas, &self.fallback_glows(), self.bounds),
            _ => render_population(canvas, &self.population, self.bounds),
        }
    }

    /// Teardown: no more ticks or frames, and the host should stop scheduling.
    pub fn stop(&mut self) {
        if !self.running {
            return;
        }
        debug!("Driver stopped after {} ticks", self.tick_count);
        self.running = false;
        self.population.clear();
        self.empty_check_at = None;
        self.enter(DriverState::Idle);
    }

    fn report(&self, ticks: u32, drawn: usize) -> FrameReport {
        FrameReport {
            opacity: self.opacity,
            state: self.state,
            mode: self.mode,
            ticks,
            drawn,
            population: self.population.len(),
        }
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    pub fn state(&self) -> DriverState {
        self.state
    }

    pub fn fallback_reason(&self) -> Option<FallbackReason> {
        self.fallback
    }

    pub fn opacity(&self) -> f32 {
        self.opacity
    }

    pub fn performance_mode(&self) -> PerformanceMode {
        self.mode
    }

    pub fn population(&self) -> &[Particle] {
        &self.population
    }

    pub fn side_population(&self, side: Option<Side>) -> usize {
        side_count(&self.population, side)
    }

    pub fn bounds(&self) -> Vec2 {
        self.bounds
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn resolver(&self) -> &ConfigResolver {
        &self.resolver
    }

    /// The host should keep scheduling frames while this is true.
    pub fn is_animating(&self) -> bool {
        self.running && self.is_simulating()
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Static glow points, three per bound theme, in normalized coordinates.
    /// Empty unless the driver is in fallback.
    pub fn fallback_glows(&self) -> Vec<FallbackGlow> {
        if self.state != DriverState::Fallback {
            return Vec::new();
        }
        let mut glows = Vec::new();
        for slot in &self.slots {
            let Some(theme) = &slot.theme else {
                continue;
            };
            let (lo, hi) = match slot.side {
                Some(side) => half_span(side, 1.0),
                None => (0.0, 1.0),
            };
            for (x, y, radius, alpha) in FALLBACK_LAYOUT {
                glows.push(FallbackGlow {
                    center: Pos2::new(lo + (hi - lo) * x, y),
                    radius,
                    color: slot.color,
                    alpha: alpha * theme.intensity().max(0.3),
                });
            }
        }
        glows
    }
}

impl Drop for SimulationDriver {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ParticleType;
    use crate::render::RecordingCanvas;

    const VIEW: Vec2 = Vec2::new(800.0, 600.0);
    const DT: f32 = 1.0 / 60.0;

    fn seeded(seed: u64) -> EngineConfig {
        EngineConfig {
            seed: Some(seed),
            ..EngineConfig::default()
        }
    }

    fn t1() -> ThemeDescriptor {
        ThemeDescriptor::new("t1", "grain", "#ccc", 0.8, 1.0)
    }

    #[test]
    fn clock_counts_whole_steps_and_caps_stalls() {
        let mut clock = SimulationClock::new(1.0 / 60.0, 8);
        assert_eq!(clock.consume_steps(0.01), 0);
        assert_eq!(clock.consume_steps(0.01), 1);
        assert_eq!(clock.consume_steps(0.05), 3);
        assert_eq!(clock.consume_steps(5.0), 8);
        assert_eq!(clock.consume_steps(0.0), 0);
        assert_eq!(clock.consume_steps(-1.0), 0);
    }

    #[test]
    fn sampler_reports_once_per_window() {
        let mut sampler = FrameRateSampler::new(1.0);
        let reports: Vec<f32> = (0..125).filter_map(|_| sampler.record(0.02)).collect();
        assert_eq!(reports.len(), 2);
        assert!((reports[0] - 50.0).abs() < 1.0);
    }

    #[test]
    fn mode_follows_fps() {
        let cfg = EngineConfig::default();
        use PerformanceMode::*;
        assert_eq!(next_mode(High, 15.0, &cfg), Low);
        assert_eq!(next_mode(High, 25.0, &cfg), Medium);
        assert_eq!(next_mode(Low, 25.0, &cfg), Low);
        assert_eq!(next_mode(Medium, 40.0, &cfg), Medium);
        assert_eq!(next_mode(Low, 60.0, &cfg), Medium);
        assert_eq!(next_mode(Medium, 60.0, &cfg), High);
        assert_eq!(next_mode(High, 60.0, &cfg), High);
    }

    #[test]
    fn grain_on_left_only() {
        let mut driver = SimulationDriver::comparison(seeded(1));
        driver.resize(VIEW);
        driver.set_theme(Some(Side::Left), Some(t1()));
        driver.set_theme(Some(Side::Right), None);
        for _ in 0..120 {
            driver.tick();
        }
        let cap = driver
            .resolver()
            .resolve(Some(&t1()), ParticleType::Grain, PerformanceMode::High, Some(Side::Left))
            .max_population;
        let population = driver.population();
        assert!(!population.is_empty());
        assert!(population.len() <= cap);
        assert!(population
            .iter()
            .all(|p| p.side == Some(Side::Left) && p.kind == ParticleType::Grain));
        assert_eq!(driver.side_population(Some(Side::Right)), 0);
    }

    #[test]
    fn clearing_lets_particles_decay() {
        let mut driver = SimulationDriver::single(seeded(2));
        driver.resize(VIEW);
        driver.set_theme(None, Some(t1()));
        for _ in 0..120 {
            driver.tick();
        }
        let at_clear = driver.population().len();
        assert!(at_clear > 0);

        driver.set_theme(None, None);
        assert_eq!(driver.state(), DriverState::FadingOut);
        assert_eq!(driver.population().len(), at_clear);

        let mut last = at_clear;
        for _ in 0..1000 {
            driver.tick();
            assert!(driver.population().len() <= last);
            last = driver.population().len();
        }
        assert_eq!(last, 0);
        assert_eq!(driver.state(), DriverState::Idle);
    }

    /// Ticks a driver already in `Low` and checks every type's count and the
    /// draw count after each tick.
    fn assert_low_mode_bounds(mut driver: SimulationDriver, bound: &[(Option<Side>, ThemeDescriptor)]) {
        driver.mode = PerformanceMode::Low;
        driver.resize(VIEW);
        for (side, theme) in bound {
            driver.set_theme(*side, Some(theme.clone()));
        }
        let mut canvas = RecordingCanvas::new();
        let mut peak = 0;
        for tick in 0..1000 {
            driver.tick();
            assert_eq!(driver.performance_mode(), PerformanceMode::Low);
            canvas.clear();
            let drawn = driver.render(&mut canvas);
            let mut allowed = 0.0;
            for (side, theme) in bound {
                for kind in ParticleType::ALL {
                    let high = driver
                        .resolver()
                        .resolve(Some(theme), kind, PerformanceMode::High, *side)
                        .max_population as f32;
                    let count = driver
                        .population()
                        .iter()
                        .filter(|p| p.side == *side && p.kind == kind)
                        .count();
                    assert!(count as f32 <= 0.4 * high, "tick {tick} {} {kind}: {count}", theme.id);
                    if count > 0 {
                        allowed += 0.4 * high;
                    }
                }
            }
            assert!(drawn as f32 <= allowed, "tick {tick}: drew {drawn}");
            peak = peak.max(drawn);
        }
        assert!(peak > 0);
    }

    #[test]
    fn low_mode_bounds_every_type() {
        let chronos = ThemeDescriptor::new("chronos", "clock", "#e6c36a", 0.8, 1.0);
        for theme in [t1(), chronos.clone()] {
            assert_low_mode_bounds(SimulationDriver::single(seeded(3)), &[(None, theme)]);
        }
        assert_low_mode_bounds(
            SimulationDriver::comparison(seeded(3)),
            &[(Some(Side::Left), t1()), (Some(Side::Right), chronos)],
        );
    }

    #[test]
    fn low_rate_types_keep_spawning_on_a_side_in_medium() {
        let mut driver = SimulationDriver::comparison(seeded(13));
        driver.set_theme(Some(Side::Left), Some(ThemeDescriptor::new("x", "lightning", "#fff", 1.0, 1.0)));
        let mut canvas = RecordingCanvas::new();
        let mut frames_with_particles = 0;
        for frame in 0..750 {
            canvas.clear();
            let report = driver.frame(0.04, VIEW, Some(&mut canvas));
            if frame > 50 && report.population > 0 {
                frames_with_particles += 1;
            }
        }
        assert_eq!(driver.performance_mode(), PerformanceMode::Medium);
        assert_ne!(driver.state(), DriverState::Fallback);
        assert!(frames_with_particles > 0);
    }

    #[test]
    fn unknown_type_falls_back_after_timeout() {
        let mut driver = SimulationDriver::single(seeded(4));
        driver.set_theme(None, Some(ThemeDescriptor::new("t2", "plasma", "#fff", 1.0, 1.0)));
        let mut canvas = RecordingCanvas::new();
        let mut report = driver.frame(DT, VIEW, Some(&mut canvas));
        for _ in 0..200 {
            assert_eq!(driver.population().len(), 0);
            canvas.clear();
            report = driver.frame(DT, VIEW, Some(&mut canvas));
        }
        assert_eq!(report.state, DriverState::Fallback);
        assert_eq!(driver.fallback_reason(), Some(FallbackReason::EmptyPopulation));
        assert_eq!(driver.fallback_glows().len(), 3);
        assert_eq!(report.drawn, 3);
        assert_eq!(report.ticks, 0);
        assert!(!driver.is_animating());
    }

    #[test]
    fn valid_theme_never_trips_empty_fallback() {
        // Rare-spawning types still get a first particle straight away.
        for kind in ["lightning", "radio"] {
            let mut driver = SimulationDriver::single(seeded(5));
            driver.set_theme(None, Some(ThemeDescriptor::new("x", kind, "#fff", 1.0, 1.0)));
            let mut canvas = RecordingCanvas::new();
            for _ in 0..240 {
                driver.frame(DT, VIEW, Some(&mut canvas));
            }
            assert_ne!(driver.state(), DriverState::Fallback, "{kind}");
        }
    }

    #[test]
    fn missing_or_empty_surface_falls_back() {
        let mut driver = SimulationDriver::single(seeded(6));
        driver.set_theme(None, Some(t1()));
        let report = driver.frame(DT, VIEW, None);
        assert_eq!(report.state, DriverState::Fallback);
        assert_eq!(report.ticks, 0);
        assert_eq!(driver.fallback_reason(), Some(FallbackReason::SurfaceUnavailable));

        let mut canvas = RecordingCanvas::new();
        let report = driver.frame(DT, VIEW, Some(&mut canvas));
        assert_eq!(report.state, DriverState::FadingIn);

        let report = driver.frame(DT, Vec2::new(0.0, 600.0), Some(&mut canvas));
        assert_eq!(report.state, DriverState::Fallback);
        assert_eq!(report.population, 0);
    }

    #[test]
    fn idle_without_surface_stays_idle() {
        let mut driver = SimulationDriver::single(seeded(7));
        let report = driver.frame(DT, Vec2::ZERO, None);
        assert_eq!(report.state, DriverState::Idle);
        assert_eq!(report.opacity, 0.0);
    }

    #[test]
    fn opacity_waits_then_ramps() {
        let mut driver = SimulationDriver::single(seeded(8));
        driver.set_theme(None, Some(t1()));
        let mut canvas = RecordingCanvas::new();

        // The first frame after binding carries the host's idle gap.
        let report = driver.frame(0.2, VIEW, Some(&mut canvas));
        assert_eq!(report.state, DriverState::FadingIn);
        assert_eq!(report.opacity, 0.0);
        assert_eq!(report.ticks, 0);

        let report = driver.frame(0.3, VIEW, Some(&mut canvas));
        assert_eq!(report.state, DriverState::FadingIn);
        assert!(report.opacity < 1e-3);

        let report = driver.frame(0.4, VIEW, Some(&mut canvas));
        assert!((report.opacity - 0.5).abs() < 1e-3);
        assert_eq!(canvas.opacity, Some(report.opacity));

        let report = driver.frame(1.0, VIEW, Some(&mut canvas));
        assert_eq!(report.state, DriverState::Active);
        assert_eq!(report.opacity, 1.0);
    }

    #[test]
    fn idle_gap_does_not_skip_the_fade_or_drop_the_mode() {
        let mut driver = SimulationDriver::single(seeded(14));
        let mut canvas = RecordingCanvas::new();
        for _ in 0..30 {
            driver.frame(DT, VIEW, Some(&mut canvas));
        }
        assert_eq!(driver.state(), DriverState::Idle);

        driver.set_theme(None, Some(t1()));
        let report = driver.frame(4.0, VIEW, Some(&mut canvas));
        assert_eq!(report.mode, PerformanceMode::High);
        assert_eq!(report.state, DriverState::FadingIn);
        assert_eq!(report.opacity, 0.0);

        let mut report = report;
        for _ in 0..90 {
            report = driver.frame(DT, VIEW, Some(&mut canvas));
        }
        assert_eq!(report.mode, PerformanceMode::High);
        assert_eq!(report.state, DriverState::Active);
    }

    #[test]
    fn long_host_stalls_are_clamped() {
        let mut driver = SimulationDriver::single(seeded(15));
        driver.set_theme(None, Some(t1()));
        let mut canvas = RecordingCanvas::new();
        driver.frame(DT, VIEW, Some(&mut canvas));
        let report = driver.frame(30.0, VIEW, Some(&mut canvas));
        assert_eq!(report.state, DriverState::FadingIn);
        assert!(report.opacity < 1.0);
        assert_eq!(report.ticks, 8);
        assert!((driver.elapsed - 1.0).abs() < 1e-5);
    }

    #[test]
    fn swapping_keeps_old_particles() {
        let mut driver = SimulationDriver::comparison(seeded(9));
        driver.resize(VIEW);
        driver.set_theme(Some(Side::Left), Some(t1()));
        for _ in 0..60 {
            driver.tick();
        }
        let grains = driver.population().len();
        assert!(grains > 0);

        let drifter = ThemeDescriptor::new("drifter", "stardust", "#cfd8ff", 0.9, 1.0);
        driver.set_theme(Some(Side::Left), Some(drifter));
        assert_ne!(driver.state(), DriverState::FadingOut);
        driver.tick();
        let kinds = |k| driver.population().iter().filter(|p| p.kind == k).count();
        assert!(kinds(ParticleType::Grain) > 0);
        assert!(kinds(ParticleType::Stardust) > 0);
    }

    fn run_until_active(driver: &mut SimulationDriver, canvas: &mut RecordingCanvas) {
        for _ in 0..120 {
            driver.frame(DT, VIEW, Some(&mut *canvas));
        }
        assert_eq!(driver.state(), DriverState::Active);
    }

    #[test]
    fn swapping_reruns_delay_and_fade() {
        let mut driver = SimulationDriver::single(seeded(16));
        let mut canvas = RecordingCanvas::new();
        driver.set_theme(None, Some(t1()));
        run_until_active(&mut driver, &mut canvas);
        let grains = driver.population().len();
        assert!(grains > 0);

        driver.set_theme(None, Some(ThemeDescriptor::new("blitz", "speed", "#ffd23f", 1.0, 1.4)));
        assert_eq!(driver.state(), DriverState::FadingIn);
        let report = driver.frame(DT, VIEW, Some(&mut canvas));
        assert_eq!(report.state, DriverState::FadingIn);
        assert!(report.opacity < 1.0);
        assert!(driver.population().iter().any(|p| p.kind == ParticleType::Grain));

        // Dimmed out by the end of the delay, then back up.
        for _ in 0..17 {
            driver.frame(DT, VIEW, Some(&mut canvas));
        }
        assert!(driver.opacity() < 0.1, "{}", driver.opacity());
        let mut report = report;
        for _ in 0..60 {
            report = driver.frame(DT, VIEW, Some(&mut canvas));
        }
        assert_eq!(report.state, DriverState::Active);
        assert_eq!(report.opacity, 1.0);
    }

    #[test]
    fn comparison_swap_fades_the_shared_surface() {
        let mut driver = SimulationDriver::comparison(seeded(17));
        let mut canvas = RecordingCanvas::new();
        driver.set_theme(Some(Side::Left), Some(t1()));
        driver.set_theme(Some(Side::Right), Some(ThemeDescriptor::new("pixie", "sparkle", "#ff9de2", 0.9, 1.0)));
        run_until_active(&mut driver, &mut canvas);

        driver.set_theme(Some(Side::Right), Some(ThemeDescriptor::new("drifter", "stardust", "#cfd8ff", 0.9, 1.0)));
        let report = driver.frame(DT, VIEW, Some(&mut canvas));
        assert_eq!(report.state, DriverState::FadingIn);
        assert!(report.opacity < 1.0);
        assert_eq!(canvas.opacity, Some(report.opacity));
        assert!(driver.side_population(Some(Side::Left)) > 0);

        // Clearing one side while the other stays bound leaves the fade alone.
        run_until_active(&mut driver, &mut canvas);
        driver.set_theme(Some(Side::Right), None);
        assert_eq!(driver.state(), DriverState::Active);
        assert_eq!(driver.frame(DT, VIEW, Some(&mut canvas)).opacity, 1.0);
    }

    #[test]
    fn fade_out_outlasts_slow_hosts() {
        let mut driver = SimulationDriver::single(seeded(18));
        let mut canvas = RecordingCanvas::new();
        driver.set_theme(None, Some(ThemeDescriptor::new("drifter", "stardust", "#cfd8ff", 0.9, 1.0)));
        run_until_active(&mut driver, &mut canvas);
        driver.set_theme(None, None);
        assert_eq!(driver.state(), DriverState::FadingOut);
        let longest = driver.population().iter().map(Particle::remaining_ticks).max().unwrap();
        let cleared_at = driver.tick_count();

        // One frame a second, eight ticks each: 13 s of host time is only
        // 104 ticks, well inside the youngest particle's remaining life.
        for _ in 0..13 {
            driver.frame(1.0, VIEW, Some(&mut canvas));
        }
        assert_eq!(driver.state(), DriverState::FadingOut);
        assert!(!driver.population().is_empty());

        while driver.state() == DriverState::FadingOut {
            driver.frame(1.0, VIEW, Some(&mut canvas));
        }
        assert_eq!(driver.state(), DriverState::Idle);
        assert!(driver.tick_count() - cleared_at <= u64::from(longest) + 8);
    }

    #[test]
    fn resize_tracks_the_viewport() {
        let mut driver = SimulationDriver::single(seeded(19));
        driver.resize(VIEW);
        assert_eq!(driver.bounds(), VIEW);
        driver.resize(Vec2::new(f32::NAN, 10.0));
        assert_eq!(driver.bounds(), Vec2::ZERO);
        driver.frame(DT, Vec2::new(1024.0, -5.0), None);
        assert_eq!(driver.bounds(), Vec2::new(1024.0, 0.0));
    }

    #[test]
    fn unknown_side_is_ignored() {
        let mut driver = SimulationDriver::single(seeded(10));
        driver.set_theme(Some(Side::Left), Some(t1()));
        assert_eq!(driver.state(), DriverState::Idle);
        assert!(driver.theme(Some(Side::Left)).is_none());
    }

    #[test]
    fn stop_halts_everything() {
        let mut driver = SimulationDriver::single(seeded(11));
        driver.resize(VIEW);
        driver.set_theme(None, Some(t1()));
        for _ in 0..10 {
            driver.tick();
        }
        assert!(driver.is_animating());
        assert!(driver.is_running());
        driver.stop();
        let ticks = driver.tick_count();
        driver.tick();
        let report = driver.frame(DT, VIEW, Some(&mut RecordingCanvas::new()));
        assert_eq!(driver.tick_count(), ticks);
        assert_eq!(report.ticks, 0);
        assert_eq!(report.population, 0);
        assert!(!driver.is_animating());
        assert!(!driver.is_running());
        driver.set_theme(None, Some(t1()));
        assert_eq!(driver.state(), DriverState::Idle);
    }

    #[test]
    fn drivers_do_not_share_state() {
        let mut a = SimulationDriver::single(seeded(12));
        let mut b = SimulationDriver::single(seeded(12));
        a.resize(VIEW);
        b.resize(VIEW);
        a.set_theme(None, Some(t1()));
        b.set_theme(None, Some(t1()));
        for _ in 0..100 {
            a.tick();
        }
        assert!(!a.population().is_empty());
        assert!(b.population().is_empty());
        assert_eq!(b.tick_count(), 0);
    }
}
