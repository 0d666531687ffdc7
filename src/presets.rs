//! Built-in particle presets
//! Per-type defaults, the theme-keyed override table and the demo theme roster

use crate::config::{ParticleType, Range, ThemeDescriptor};

/// Base tuning for one particle type before any scaling.
#[derive(Clone, Copy, Debug)]
pub struct TypeDefaults {
    /// Expected spawns per second at the full performance tier.
    pub spawn_rate: f32,
    pub max_population: usize,
    /// Pixels per tick.
    pub velocity_x: Range,
    pub velocity_y: Range,
    pub size: Range,
    pub opacity: Range,
    /// Ticks.
    pub lifetime: Range,
    pub fade_in_ticks: u32,
    pub fade_out_ticks: u32,
    pub fade_start_delay_ticks: u32,
    pub wrap_edges: bool,
    pub gravity: f32,
    pub drift: f32,
}

const fn span(min: f32, max: f32) -> Range {
    Range { min, max }
}

const STILL: Range = Range::ZERO;

const BASE: TypeDefaults = TypeDefaults {
    spawn_rate: 1.0,
    max_population: 10,
    velocity_x: STILL,
    velocity_y: STILL,
    size: span(2.0, 4.0),
    opacity: span(0.5, 1.0),
    lifetime: span(60.0, 120.0),
    fade_in_ticks: 0,
    fade_out_ticks: 0,
    fade_start_delay_ticks: 0,
    wrap_edges: false,
    gravity: 0.0,
    drift: 0.0,
};

pub fn type_defaults(kind: ParticleType) -> TypeDefaults {
    match kind {
        // Soft orbs rising slowly through their half
        ParticleType::Flow => TypeDefaults {
            spawn_rate: 6.0,
            max_population: 40,
            velocity_x: span(-0.3, 0.3),
            velocity_y: span(-0.6, -0.15),
            size: span(3.0, 8.0),
            opacity: span(0.3, 0.7),
            lifetime: span(180.0, 360.0),
            fade_in_ticks: 30,
            fade_out_ticks: 60,
            fade_start_delay_ticks: 120,
            drift: 0.02,
            ..BASE
        },
        // Tilted capsules falling like sand
        ParticleType::Grain => TypeDefaults {
            spawn_rate: 12.0,
            max_population: 80,
            velocity_x: span(-0.2, 0.2),
            velocity_y: span(0.8, 1.8),
            size: span(1.5, 3.5),
            opacity: span(0.4, 0.8),
            lifetime: span(240.0, 420.0),
            gravity: 0.02,
            drift: 0.05,
            ..BASE
        },
        // Expanding radar rings
        ParticleType::Radio => TypeDefaults {
            spawn_rate: 0.8,
            max_population: 4,
            size: span(40.0, 120.0),
            opacity: span(0.5, 0.8),
            lifetime: span(120.0, 180.0),
            ..BASE
        },
        // Streaks racing toward the centre
        ParticleType::Speed => TypeDefaults {
            spawn_rate: 10.0,
            max_population: 30,
            velocity_x: span(4.0, 9.0),
            velocity_y: span(-0.2, 0.2),
            size: span(1.0, 2.0),
            opacity: span(0.4, 0.9),
            lifetime: span(40.0, 90.0),
            ..BASE
        },
        ParticleType::Lightning => TypeDefaults {
            spawn_rate: 0.5,
            max_population: 3,
            size: span(60.0, 140.0),
            opacity: span(0.7, 1.0),
            lifetime: span(20.0, 40.0),
            ..BASE
        },
        ParticleType::Clock => TypeDefaults {
            spawn_rate: 0.6,
            max_population: 6,
            size: span(14.0, 30.0),
            opacity: span(0.3, 0.6),
            lifetime: span(180.0, 300.0),
            ..BASE
        },
        ParticleType::Sparkle => TypeDefaults {
            spawn_rate: 3.0,
            max_population: 20,
            size: span(3.0, 7.0),
            opacity: span(0.5, 1.0),
            lifetime: span(40.0, 90.0),
            ..BASE
        },
        // Wide, faint swaying bands
        ParticleType::CosmicWave => TypeDefaults {
            spawn_rate: 1.5,
            max_population: 12,
            velocity_x: span(-0.4, 0.4),
            velocity_y: span(-0.2, 0.2),
            size: span(30.0, 70.0),
            opacity: span(0.15, 0.35),
            lifetime: span(240.0, 400.0),
            fade_in_ticks: 60,
            fade_out_ticks: 90,
            drift: 0.3,
            ..BASE
        },
        ParticleType::Stardust => TypeDefaults {
            spawn_rate: 8.0,
            max_population: 60,
            velocity_x: span(-0.15, 0.15),
            velocity_y: span(-0.15, 0.15),
            size: span(0.8, 2.2),
            opacity: span(0.3, 0.9),
            lifetime: span(200.0, 400.0),
            fade_in_ticks: 20,
            fade_out_ticks: 40,
            wrap_edges: true,
            drift: 0.02,
            ..BASE
        },
    }
}

// ============================================================================
// Theme override table
// ============================================================================

/// Multipliers one theme applies to one particle type's defaults.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FieldScale {
    pub kind: ParticleType,
    pub spawn_rate: f32,
    pub max_population: f32,
    pub lifetime: f32,
    pub size: f32,
    pub velocity: f32,
    pub wrap_edges: Option<bool>,
}

impl FieldScale {
    pub const fn identity(kind: ParticleType) -> Self {
        Self {
            kind,
            spawn_rate: 1.0,
            max_population: 1.0,
            lifetime: 1.0,
            size: 1.0,
            velocity: 1.0,
            wrap_edges: None,
        }
    }
}

/// Everything a theme id customises. New themes are new table rows.
#[derive(Debug)]
pub struct ThemeProfile {
    pub id: &'static str,
    /// Weighted sub-type draw; empty means "use the descriptor's type".
    pub mix: &'static [(ParticleType, u32)],
    pub scales: &'static [FieldScale],
}

impl ThemeProfile {
    pub fn scale_for(&self, kind: ParticleType) -> Option<&FieldScale> {
        self.scales.iter().find(|s| s.kind == kind)
    }

    pub fn total_weight(&self) -> u32 {
        self.mix.iter().map(|(_, w)| w).sum()
    }
}

static THEME_PROFILES: &[ThemeProfile] = &[
    ThemeProfile {
        id: "sandman",
        mix: &[],
        scales: &[FieldScale {
            spawn_rate: 1.5,
            wrap_edges: Some(true),
            ..FieldScale::identity(ParticleType::Grain)
        }],
    },
    ThemeProfile {
        id: "sentinel",
        mix: &[],
        scales: &[FieldScale {
            max_population: 1.5,
            lifetime: 1.2,
            ..FieldScale::identity(ParticleType::Radio)
        }],
    },
    ThemeProfile {
        id: "blitz",
        mix: &[(ParticleType::Speed, 70), (ParticleType::Sparkle, 30)],
        scales: &[
            FieldScale {
                spawn_rate: 3.0,
                ..FieldScale::identity(ParticleType::Speed)
            },
            FieldScale {
                max_population: 0.5,
                ..FieldScale::identity(ParticleType::Sparkle)
            },
        ],
    },
    ThemeProfile {
        id: "tempest",
        mix: &[(ParticleType::Lightning, 70), (ParticleType::Sparkle, 30)],
        scales: &[FieldScale {
            spawn_rate: 2.0,
            max_population: 2.0,
            ..FieldScale::identity(ParticleType::Lightning)
        }],
    },
    ThemeProfile {
        id: "chronos",
        mix: &[
            (ParticleType::Clock, 60),
            (ParticleType::Sparkle, 20),
            (ParticleType::Stardust, 20),
        ],
        scales: &[
            FieldScale {
                spawn_rate: 1.5,
                max_population: 3.0,
                ..FieldScale::identity(ParticleType::Clock)
            },
            FieldScale {
                max_population: 0.5,
                ..FieldScale::identity(ParticleType::Sparkle)
            },
        ],
    },
    ThemeProfile {
        id: "nova",
        mix: &[(ParticleType::CosmicWave, 70), (ParticleType::Stardust, 30)],
        scales: &[
            FieldScale {
                max_population: 2.0,
                ..FieldScale::identity(ParticleType::CosmicWave)
            },
            FieldScale {
                max_population: 0.6,
                size: 1.3,
                ..FieldScale::identity(ParticleType::Stardust)
            },
        ],
    },
];

pub fn theme_profile(id: &str) -> Option<&'static ThemeProfile> {
    THEME_PROFILES.iter().find(|p| p.id == id)
}

pub fn theme_profiles() -> &'static [ThemeProfile] {
    THEME_PROFILES
}

// ============================================================================
// Demo roster
// ============================================================================

/// Theme descriptors for the bundled characters, in display order.
pub fn demo_themes() -> Vec<ThemeDescriptor> {
    vec![
        ThemeDescriptor::new("sandman", "grain", "#d8c7a0", 0.8, 1.0),
        ThemeDescriptor::new("sentinel", "radio", "#4fd1ff", 0.9, 1.0),
        ThemeDescriptor::new("blitz", "speed", "#ffd23f", 1.0, 1.4),
        ThemeDescriptor::new("wanderer", "flow", "#5ef2c2", 0.7, 1.0),
        ThemeDescriptor::new("tempest", "lightning", "#9ab8ff", 1.0, 1.0),
        ThemeDescriptor::new("chronos", "clock", "#e6c36a", 0.8, 1.0),
        ThemeDescriptor::new("pixie", "sparkle", "#ff9de2", 0.9, 1.0),
        ThemeDescriptor::new("nova", "cosmic-wave", "#b26bff", 0.8, 0.8),
        ThemeDescriptor::new("drifter", "stardust", "#cfd8ff", 0.9, 1.0),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_well_formed() {
        for kind in ParticleType::ALL {
            let d = type_defaults(kind);
            assert!(d.spawn_rate >= 0.0, "{kind}");
            for r in [d.velocity_x, d.velocity_y, d.size, d.opacity, d.lifetime] {
                assert!(r.is_ordered(), "{kind}: {r:?}");
            }
            assert!(d.lifetime.min >= 1.0, "{kind}");
            assert!(d.opacity.max <= 1.0, "{kind}");
        }
    }

    #[test]
    fn stationary_types_have_no_velocity() {
        for kind in ParticleType::ALL.into_iter().filter(|k| k.is_stationary()) {
            let d = type_defaults(kind);
            assert_eq!(d.velocity_x, Range::ZERO);
            assert_eq!(d.velocity_y, Range::ZERO);
        }
    }

    #[test]
    fn profiles_are_unique_and_weighted() {
        let profiles = theme_profiles();
        for (i, p) in profiles.iter().enumerate() {
            assert!(profiles[i + 1..].iter().all(|q| q.id != p.id), "duplicate {}", p.id);
            assert!(p.mix.is_empty() || p.total_weight() > 0);
        }
        assert!(theme_profile("nobody").is_none());
        assert_eq!(theme_profile("chronos").map(|p| p.total_weight()), Some(100));
    }

    #[test]
    fn every_demo_theme_parses() {
        for theme in demo_themes() {
            assert!(theme.particle_type().is_ok(), "{}", theme.id);
            assert!(theme.color().is_ok(), "{}", theme.id);
        }
    }
}
