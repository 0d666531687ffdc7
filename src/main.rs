//! Theme Particles - viewer
//! Hosts the particle engine behind a single-theme or side-by-side comparison view

use anyhow::Context;
use clap::Parser;
use eframe::egui;
use log::{info, warn};
use std::time::Instant;
use theme_particles::config::load_themes;
use theme_particles::presets::demo_themes;
use theme_particles::{EguiCanvas, EngineConfig, FrameReport, Side, SimulationDriver, ThemeDescriptor};

const BACKGROUND: egui::Color32 = egui::Color32::from_rgb(12, 12, 22);

#[derive(Parser, Debug)]
#[command(name = "theme-particles", version, about = "Ambient theme particle viewer")]
struct Args {
    /// Engine settings as JSON
    #[arg(long)]
    config: Option<String>,
    /// JSON array of extra theme descriptors
    #[arg(long)]
    themes: Option<String>,
    /// RNG seed for reproducible runs
    #[arg(long)]
    seed: Option<u64>,
    /// Start in the side-by-side comparison view
    #[arg(long)]
    compare: bool,
    /// Write the effective engine settings to this path and exit
    #[arg(long)]
    save_config: Option<String>,
}

#[derive(Clone, Copy, PartialEq)]
enum ViewMode {
    Single,
    Comparison,
}

/// Main application state
struct ThemeViewerApp {
    roster: Vec<ThemeDescriptor>,
    single: SimulationDriver,
    comparison: SimulationDriver,
    view: ViewMode,

    // Picks index into the roster; `None` clears the slot
    single_pick: Option<usize>,
    left_pick: Option<usize>,
    right_pick: Option<usize>,

    last_update: Instant,
    last_dt: f32,
    last_report: Option<FrameReport>,
    show_settings: bool,
}

impl ThemeViewerApp {
    fn new(cc: &eframe::CreationContext<'_>, config: EngineConfig, roster: Vec<ThemeDescriptor>, compare: bool) -> Self {
        // Setup dark theme
        let mut visuals = egui::Visuals::dark();
        visuals.panel_fill = egui::Color32::from_rgba_unmultiplied(20, 20, 35, 240);
        cc.egui_ctx.set_visuals(visuals);

        let mut app = Self {
            single: SimulationDriver::single(config.clone()),
            comparison: SimulationDriver::comparison(config),
            view: if compare { ViewMode::Comparison } else { ViewMode::Single },
            single_pick: (!roster.is_empty()).then_some(0),
            left_pick: (!roster.is_empty()).then_some(0),
            right_pick: (roster.len() > 1).then_some(1),
            roster,
            last_update: Instant::now(),
            last_dt: 1.0 / 60.0,
            last_report: None,
            show_settings: true,
        };
        let (single, left, right) = (
            app.pick(app.single_pick),
            app.pick(app.left_pick),
            app.pick(app.right_pick),
        );
        app.single.set_theme(None, single);
        app.comparison.set_theme(Some(Side::Left), left);
        app.comparison.set_theme(Some(Side::Right), right);
        app
    }

    fn pick(&self, index: Option<usize>) -> Option<ThemeDescriptor> {
        index.and_then(|i| self.roster.get(i)).cloned()
    }

    fn active_driver(&self) -> &SimulationDriver {
        match self.view {
            ViewMode::Single => &self.single,
            ViewMode::Comparison => &self.comparison,
        }
    }
}

impl eframe::App for ThemeViewerApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let now = Instant::now();
        let dt = now.duration_since(self.last_update).as_secs_f32();
        self.last_update = now;
        self.last_dt = dt;

        if self.show_settings {
            self.render_settings_panel(ctx);
        }
        self.render_canvas(ctx, dt);

        // Only keep the frame loop alive while something moves
        if self.active_driver().is_animating() {
            ctx.request_repaint();
        }
    }

    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        info!("Shutting down drivers");
        self.single.stop();
        self.comparison.stop();
    }
}

impl ThemeViewerApp {
    fn render_settings_panel(&mut self, ctx: &egui::Context) {
        egui::SidePanel::right("settings_panel")
            .min_width(260.0)
            .show(ctx, |ui| {
                ui.heading("Theme Particles");
                ui.separator();

                ui.horizontal(|ui| {
                    ui.selectable_value(&mut self.view, ViewMode::Single, "Single");
                    ui.selectable_value(&mut self.view, ViewMode::Comparison, "Comparison");
                });
                ui.separator();

                match self.view {
                    ViewMode::Single => {
                        ui.label("Theme");
                        if theme_picker(ui, "single_theme", &self.roster, &mut self.single_pick) {
                            let theme = self.pick(self.single_pick);
                            self.single.set_theme(None, theme);
                        }
                    }
                    ViewMode::Comparison => {
                        ui.label("Left");
                        if theme_picker(ui, "left_theme", &self.roster, &mut self.left_pick) {
                            let theme = self.pick(self.left_pick);
                            self.comparison.set_theme(Some(Side::Left), theme);
                        }
                        ui.label("Right");
                        if theme_picker(ui, "right_theme", &self.roster, &mut self.right_pick) {
                            let theme = self.pick(self.right_pick);
                            self.comparison.set_theme(Some(Side::Right), theme);
                        }
                    }
                }

                ui.separator();
                ui.heading("Stats");
                let fps = 1.0 / self.last_dt.max(0.001);
                ui.label(format!("FPS: {:.0}", fps));
                let driver = self.active_driver();
                ui.label(format!("Mode: {}", driver.performance_mode().name()));
                ui.label(format!("State: {}", driver.state().name()));
                ui.label(format!("Opacity: {:.2}", driver.opacity()));
                match self.view {
                    ViewMode::Single => {
                        ui.label(format!("Particles: {}", driver.population().len()));
                    }
                    ViewMode::Comparison => {
                        ui.label(format!(
                            "Particles: {} left / {} right",
                            driver.side_population(Some(Side::Left)),
                            driver.side_population(Some(Side::Right)),
                        ));
                    }
                }
                if let Some(report) = &self.last_report {
                    ui.label(format!("Ticks: {}  Drawn: {}", report.ticks, report.drawn));
                }
                let bounds = driver.bounds();
                ui.label(format!("Surface: {:.0}x{:.0}", bounds.x, bounds.y));
                ui.label(format!("Tick rate: {:.0} Hz", driver.resolver().tick_rate_hz()));
            });
    }

    fn render_canvas(&mut self, ctx: &egui::Context, dt: f32) {
        egui::CentralPanel::default()
            .frame(egui::Frame::none().fill(BACKGROUND))
            .show(ctx, |ui| {
                let (rect, _) = ui.allocate_exact_size(ui.available_size(), egui::Sense::hover());
                let painter = ui.painter_at(rect);

                if self.view == ViewMode::Comparison {
                    let x = rect.center().x;
                    painter.line_segment(
                        [egui::pos2(x, rect.top()), egui::pos2(x, rect.bottom())],
                        egui::Stroke::new(1.0, egui::Color32::from_white_alpha(16)),
                    );
                }

                let mut canvas = EguiCanvas::new(&painter, rect);
                let driver = match self.view {
                    ViewMode::Single => &mut self.single,
                    ViewMode::Comparison => &mut self.comparison,
                };
                self.last_report = Some(driver.frame(dt, rect.size(), Some(&mut canvas)));
            });
    }
}

/// Combo box over the roster plus a "None" entry. Returns true when the pick changed.
fn theme_picker(ui: &mut egui::Ui, id: &str, roster: &[ThemeDescriptor], pick: &mut Option<usize>) -> bool {
    let selected = pick
        .and_then(|i| roster.get(i))
        .map_or("None".to_string(), |t| t.id.clone());
    let mut changed = false;
    egui::ComboBox::from_id_source(id)
        .selected_text(selected)
        .show_ui(ui, |ui| {
            changed |= ui.selectable_value(pick, None, "None").changed();
            for (i, theme) in roster.iter().enumerate() {
                let label = format!("{} ({})", theme.id, theme.particles.kind);
                changed |= ui.selectable_value(pick, Some(i), label).changed();
            }
        });
    changed
}

/// Demo roster with any user themes merged in; same id replaces.
fn build_roster(extra: Vec<ThemeDescriptor>) -> Vec<ThemeDescriptor> {
    let mut roster = demo_themes();
    for theme in extra {
        if let Err(e) = theme.particle_type() {
            warn!("Theme '{}': {e}", theme.id);
        }
        match roster.iter_mut().find(|t| t.id == theme.id) {
            Some(existing) => *existing = theme,
            None => roster.push(theme),
        }
    }
    roster
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => EngineConfig::load(path).with_context(|| format!("loading config {path}"))?,
        None => EngineConfig::default(),
    };
    if args.seed.is_some() {
        config.seed = args.seed;
    }
    if let Some(path) = &args.save_config {
        config
            .sanitized()
            .save(path)
            .with_context(|| format!("saving config {path}"))?;
        info!("Wrote engine settings to {path}");
        return Ok(());
    }
    let extra = match &args.themes {
        Some(path) => load_themes(path).with_context(|| format!("loading themes {path}"))?,
        None => Vec::new(),
    };
    let roster = build_roster(extra);
    info!("Loaded {} themes", roster.len());

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1280.0, 760.0])
            .with_title("Theme Particles")
            .with_min_inner_size([640.0, 400.0]),
        ..Default::default()
    };

    let compare = args.compare;
    eframe::run_native(
        "Theme Particles",
        options,
        Box::new(move |cc| Box::new(ThemeViewerApp::new(cc, config, roster, compare))),
    )
    .map_err(|e| anyhow::anyhow!("viewer failed: {e}"))
}
