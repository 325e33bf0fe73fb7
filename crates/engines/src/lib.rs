#![deny(unsafe_code)]
//! Preset registry: maps preset names to scene configurations, plus the
//! headless pieces (raster surface, manual scheduler, PNG snapshot) used to
//! render scenes without a browser.
//!
//! Both the CLI and the WASM binding go through [`PresetKind`] so preset
//! dispatch lives in one place.

pub mod headless;
pub mod raster;
pub mod scheduler;

#[cfg(feature = "png")]
pub mod snapshot;

pub use headless::{render_headless, HeadlessDriver, HeadlessOptions, PointerPath};
pub use raster::RasterSurface;
pub use scheduler::ManualScheduler;

use fieldglow_core::config::FieldConfig;
use fieldglow_core::error::EngineError;
use fieldglow_core::{
    AdvectionPolicy, BoundaryPolicy, FlowScene, Rgba, SpringFlowParams, TargetSelection, Viewport,
};
use serde_json::Value;

/// All available preset names.
const PRESET_NAMES: &[&str] = &["attention", "gentle-song", "resonance"];

/// The named scene variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresetKind {
    /// Field-following particles with pointer-spawned attention lines.
    Attention,
    /// Slow spring/flow particles on a dotted grid, no effects.
    GentleSong,
    /// Attention lines biased toward aligned flow, with halos and a pointer glow.
    Resonance,
}

impl PresetKind {
    /// Looks a preset up by name.
    ///
    /// Returns `EngineError::UnknownPreset` if the name is not recognized.
    pub fn from_name(name: &str) -> Result<Self, EngineError> {
        match name {
            "attention" => Ok(PresetKind::Attention),
            "gentle-song" => Ok(PresetKind::GentleSong),
            "resonance" => Ok(PresetKind::Resonance),
            _ => Err(EngineError::UnknownPreset(name.to_string())),
        }
    }

    /// Returns a slice of all recognized preset names.
    pub fn list_presets() -> &'static [&'static str] {
        PRESET_NAMES
    }

    pub fn name(self) -> &'static str {
        match self {
            PresetKind::Attention => "attention",
            PresetKind::GentleSong => "gentle-song",
            PresetKind::Resonance => "resonance",
        }
    }

    /// The preset's configuration before any overrides.
    pub fn config(self) -> FieldConfig {
        let mut c = FieldConfig::default();
        match self {
            PresetKind::Attention => {
                c.advection = AdvectionPolicy::FieldFollowing { speed: 1.0 };
                c.particles.boundary = BoundaryPolicy::Respawn;
                c.effects.selection = TargetSelection::Uniform;
            }
            PresetKind::GentleSong => {
                c.grid.spacing = 36.0;
                c.grid.draw_vectors = false;
                c.grid.dot_radius = 1.2;
                c.particles.count = 110;
                c.particles.radius = 1.1;
                c.particles.margin = 20.0;
                c.particles.hover_parallax = 8.0;
                c.particles.boundary = BoundaryPolicy::Wrap;
                c.particles.color = Rgba::from_rgb8(210, 225, 255, 0.55);
                c.advection = AdvectionPolicy::SpringFlow(SpringFlowParams::default());
                c.effects.enabled = false;
                c.render.grain_density = 0.0015;
                c.render.vignette_alpha = 0.35;
                c.render.gradient = true;
                c.render.connection_nodes = 26;
                c.particles.alpha_base = 0.6;
                c.particles.alpha_variation = 0.3;
                c.grid.drift_alpha = 0.05;
            }
            PresetKind::Resonance => {
                c.advection = AdvectionPolicy::FieldFollowing { speed: 0.8 };
                c.particles.boundary = BoundaryPolicy::Respawn;
                c.effects.selection = TargetSelection::AngleSimilarity { temperature: 0.35 };
                c.effects.halo_radius = 36.0;
                c.effects.target_count = 4;
                c.render.highlight = true;
                c.render.scanline_spacing = 3.0;
            }
        }
        c
    }

    /// Builds a scene from this preset with `seed` and flat JSON overrides applied.
    ///
    /// An explicit `noise_seed` in `params` wins over `seed`.
    pub fn build(
        self,
        viewport: Viewport,
        seed: u64,
        params: &Value,
    ) -> Result<FlowScene, EngineError> {
        let mut config = self.config();
        config.noise.seed = seed;
        FlowScene::new(config.with_overrides(params), viewport)
    }
}
