//! Scene configuration.
//!
//! Every tunable is a named field on one of the sub-structs of
//! [`FieldConfig`]. The whole tree (de)serializes with serde and missing
//! fields take their defaults. For hosts that pass loose JSON, [`FieldConfig::with_overrides`]
//! applies a flat object of `section_field` keys, and [`FieldConfig::params`]
//! / [`FieldConfig::param_schema`] describe the same flat namespace.

use crate::color::Rgba;
use crate::effect::{EffectConfig, TargetSelection};
use crate::error::EngineError;
use crate::noise::NoiseKind;
use crate::params::{
    param_bool, param_color, param_f64, param_mistyped, param_string, param_u64, param_usize,
};
use crate::particle::{AdvectionPolicy, BoundaryPolicy, SpringFlowParams};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::warn;

/// Lattice spacing in logical pixels.
const DEFAULT_SPACING: f64 = 28.0;
/// Pixel length of a drawn flow vector.
const DEFAULT_VECTOR_LENGTH: f64 = 5.0;
const DEFAULT_VECTOR_DRAW_EVERY: u64 = 8;
const DEFAULT_PARTICLE_COUNT: usize = 200;
const DEFAULT_PARTICLE_RADIUS: f64 = 0.65;
/// Outward slack before a particle counts as off-canvas.
const DEFAULT_PARTICLE_MARGIN: f64 = 10.0;
/// Ceiling on the integration step after a slow or backgrounded frame.
const DEFAULT_MAX_DT_MS: f64 = 40.0;
const DEFAULT_FIELD_UPDATE_EVERY: u64 = 5;
const DEFAULT_TARGET_FPS: f64 = 60.0;
const DEFAULT_NOISE_SCALE: f64 = 0.009;
/// Field time advance per frame.
const DEFAULT_EVOLUTION_SPEED: f64 = 0.00045;
const DEFAULT_NOISE_SEED: u64 = 0x5eed;
const DEFAULT_MAX_DPR: f64 = 2.0;
/// Quiet window before a burst of resize events is applied.
const DEFAULT_RESIZE_DEBOUNCE_MS: f64 = 120.0;
/// Backdrop motion time per millisecond of host time.
const DEFAULT_MOTION_TIME_SCALE: f64 = 0.000045;
const DEFAULT_GRADIENT_EVERY: u64 = 4;
const DEFAULT_CONNECTION_LOOKAHEAD: usize = 5;
/// Link cutoff as a fraction of the shorter viewport side.
const DEFAULT_CONNECTION_DISTANCE: f64 = 0.18;
const DEFAULT_DRIFT_SCALE: f64 = 0.001;

/// Lattice geometry and the grid layer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    pub spacing: f64,
    /// Stroke the flow vectors on the grid layer.
    pub draw_vectors: bool,
    pub vector_length: f64,
    /// Vectors are stroked on frames where `frame % vector_draw_every == 0`.
    pub vector_draw_every: u64,
    pub vector_color: Rgba,
    /// Radius of the baked static dots; 0 disables the dot bitmap.
    pub dot_radius: f64,
    pub dot_alpha: f64,
    pub dot_color: Rgba,
    /// Opacity of the noise-jittered live dots drawn over the baked grid; 0 disables them.
    pub drift_alpha: f64,
    /// Coordinate scale of the drift noise.
    pub drift_scale: f64,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            spacing: DEFAULT_SPACING,
            draw_vectors: true,
            vector_length: DEFAULT_VECTOR_LENGTH,
            vector_draw_every: DEFAULT_VECTOR_DRAW_EVERY,
            vector_color: Rgba::from_rgb8(128, 128, 128, 0.16),
            dot_radius: 0.0,
            dot_alpha: 0.14,
            dot_color: Rgba::from_rgb8(190, 200, 210, 1.0),
            drift_alpha: 0.0,
            drift_scale: DEFAULT_DRIFT_SCALE,
        }
    }
}

/// Particle pool shape and appearance. Motion lives in [`AdvectionPolicy`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParticleConfig {
    pub count: usize,
    pub radius: f64,
    pub color: Rgba,
    pub margin: f64,
    pub max_dt_ms: f64,
    pub boundary: BoundaryPolicy,
    /// Maximum draw offset toward the pointer; 0 disables parallax.
    pub hover_parallax: f64,
    /// Alpha multiplier is `alpha_base + alpha_variation * sin(..)`, a slow wave over position and time.
    pub alpha_base: f64,
    pub alpha_variation: f64,
}

impl Default for ParticleConfig {
    fn default() -> Self {
        Self {
            count: DEFAULT_PARTICLE_COUNT,
            radius: DEFAULT_PARTICLE_RADIUS,
            color: Rgba::from_rgb8(0, 200, 255, 0.72),
            margin: DEFAULT_PARTICLE_MARGIN,
            max_dt_ms: DEFAULT_MAX_DT_MS,
            boundary: BoundaryPolicy::Respawn,
            hover_parallax: 0.0,
            alpha_base: 1.0,
            alpha_variation: 0.0,
        }
    }
}

/// Frame pacing, background treatment and host-facing knobs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Frame-rate ceiling; 0 means render on every host callback.
    pub target_fps: f64,
    /// Field angles are recomputed on frames where `frame % field_update_every == 0`.
    pub field_update_every: u64,
    pub background: Rgba,
    pub background_dim_alpha: f64,
    /// Horizontal scanline pitch; 0 disables scanlines.
    pub scanline_spacing: f64,
    pub scanline_alpha: f64,
    /// Vignette darkness at the rim; 0 disables it.
    pub vignette_alpha: f64,
    /// Grain pixels per square logical pixel; 0 disables the grain bitmap.
    pub grain_density: f64,
    pub grain_alpha: f64,
    pub highlight: bool,
    pub highlight_radius: f64,
    pub highlight_color: Rgba,
    /// Freeze the field and suppress spawning.
    pub reduced_motion: bool,
    pub max_dpr: f64,
    pub resize_debounce_ms: f64,
    /// Replace the flat dim fill with a diagonal two-tone gradient.
    pub gradient: bool,
    /// The first stop swings between `gradient_start_a` and `gradient_start_b`
    /// with `sin(time)`, the second between the end pair with `cos(time)`.
    pub gradient_start_a: Rgba,
    pub gradient_start_b: Rgba,
    pub gradient_end_a: Rgba,
    pub gradient_end_b: Rgba,
    /// Gradient tones are refreshed on frames where `frame % gradient_every == 0`.
    pub gradient_every: u64,
    /// Backdrop time per millisecond; drives the gradient and the link mesh.
    pub motion_time_scale: f64,
    /// Nodes in the drifting link mesh; 0 disables it.
    pub connection_nodes: usize,
    /// Successors (by x) each node is tested against.
    pub connection_lookahead: usize,
    pub connection_distance: f64,
    pub connection_alpha: f64,
    pub connection_color: Rgba,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            target_fps: DEFAULT_TARGET_FPS,
            field_update_every: DEFAULT_FIELD_UPDATE_EVERY,
            background: Rgba::BLACK,
            background_dim_alpha: 0.18,
            scanline_spacing: 0.0,
            scanline_alpha: 0.03,
            vignette_alpha: 0.0,
            grain_density: 0.0,
            grain_alpha: 0.065,
            highlight: false,
            highlight_radius: 140.0,
            highlight_color: Rgba::from_rgb8(0, 255, 230, 0.12),
            reduced_motion: false,
            max_dpr: DEFAULT_MAX_DPR,
            resize_debounce_ms: DEFAULT_RESIZE_DEBOUNCE_MS,
            gradient: false,
            gradient_start_a: Rgba::from_rgb8(16, 18, 22, 1.0),
            gradient_start_b: Rgba::from_rgb8(12, 14, 18, 1.0),
            gradient_end_a: Rgba::from_rgb8(10, 12, 15, 1.0),
            gradient_end_b: Rgba::from_rgb8(18, 20, 24, 1.0),
            gradient_every: DEFAULT_GRADIENT_EVERY,
            motion_time_scale: DEFAULT_MOTION_TIME_SCALE,
            connection_nodes: 0,
            connection_lookahead: DEFAULT_CONNECTION_LOOKAHEAD,
            connection_distance: DEFAULT_CONNECTION_DISTANCE,
            connection_alpha: 0.095,
            connection_color: Rgba::from_rgb8(45, 225, 242, 0.32),
        }
    }
}

/// Noise source selection and sampling scale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoiseConfig {
    pub kind: NoiseKind,
    pub seed: u64,
    /// Lattice coordinates are multiplied by this before sampling.
    pub scale: f64,
    pub evolution_speed: f64,
}

impl Default for NoiseConfig {
    fn default() -> Self {
        Self {
            kind: NoiseKind::Permutation,
            seed: DEFAULT_NOISE_SEED,
            scale: DEFAULT_NOISE_SCALE,
            evolution_speed: DEFAULT_EVOLUTION_SPEED,
        }
    }
}

/// The complete configuration of one flow-field scene.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldConfig {
    pub grid: GridConfig,
    pub particles: ParticleConfig,
    pub advection: AdvectionPolicy,
    pub effects: EffectConfig,
    pub render: RenderConfig,
    pub noise: NoiseConfig,
}

#[derive(Debug, Clone, Copy)]
enum ParamKind {
    Number { min: f64, max: f64 },
    Integer { min: u64, max: u64 },
    Bool,
    Color,
    Choice(&'static [&'static str]),
}

impl ParamKind {
    fn accepts(self) -> fn(&Value) -> bool {
        match self {
            ParamKind::Number { .. } => Value::is_number,
            ParamKind::Integer { .. } => Value::is_u64,
            ParamKind::Bool => Value::is_boolean,
            ParamKind::Color | ParamKind::Choice(_) => Value::is_string,
        }
    }
}

struct ParamSpec {
    name: &'static str,
    kind: ParamKind,
    description: &'static str,
}

const fn num(name: &'static str, min: f64, max: f64, description: &'static str) -> ParamSpec {
    ParamSpec {
        name,
        kind: ParamKind::Number { min, max },
        description,
    }
}

const fn int(name: &'static str, min: u64, max: u64, description: &'static str) -> ParamSpec {
    ParamSpec {
        name,
        kind: ParamKind::Integer { min, max },
        description,
    }
}

const fn flag(name: &'static str, description: &'static str) -> ParamSpec {
    ParamSpec {
        name,
        kind: ParamKind::Bool,
        description,
    }
}

const fn color(name: &'static str, description: &'static str) -> ParamSpec {
    ParamSpec {
        name,
        kind: ParamKind::Color,
        description,
    }
}

const fn choice(
    name: &'static str,
    options: &'static [&'static str],
    description: &'static str,
) -> ParamSpec {
    ParamSpec {
        name,
        kind: ParamKind::Choice(options),
        description,
    }
}

const ADVECTION_KINDS: &[&str] = &["field_following", "spring_flow"];
const BOUNDARY_KINDS: &[&str] = &["wrap", "respawn"];
const SELECTION_KINDS: &[&str] = &["uniform", "angle_similarity"];
const NOISE_KINDS: &[&str] = &["permutation", "simplex"];
const DEFAULT_TEMPERATURE: f64 = 0.35;

/// The flat override namespace, in schema order.
const PARAMS: &[ParamSpec] = &[
    num("grid_spacing", 4.0, 400.0, "Distance between lattice points in logical pixels"),
    flag("grid_draw_vectors", "Stroke flow vectors on the grid layer"),
    num("grid_vector_length", 0.0, 100.0, "Length of each drawn flow vector"),
    int("grid_vector_draw_every", 1, 600, "Draw vectors on every Nth frame"),
    color("grid_vector_color", "Flow vector stroke color"),
    num("grid_dot_radius", 0.0, 20.0, "Radius of baked grid dots (0 disables)"),
    num("grid_dot_alpha", 0.0, 1.0, "Opacity of baked grid dots"),
    color("grid_dot_color", "Baked grid dot color"),
    num("grid_drift_alpha", 0.0, 1.0, "Opacity of the drifting live dots (0 disables)"),
    num("grid_drift_scale", 0.0, 1.0, "Coordinate scale of the dot drift noise"),
    int("particle_count", 0, 20_000, "Number of particles in the pool"),
    num("particle_radius", 0.0, 20.0, "Base particle radius"),
    color("particle_color", "Particle fill color"),
    num("particle_margin", 0.0, 200.0, "Off-canvas slack before wrap or respawn"),
    num("particle_max_dt_ms", 1.0, 1000.0, "Ceiling on the integration step in milliseconds"),
    choice("particle_boundary", BOUNDARY_KINDS, "What happens to particles leaving the canvas"),
    num("particle_hover_parallax", 0.0, 100.0, "Maximum parallax offset toward the pointer"),
    num("particle_alpha_base", 0.0, 1.0, "Particle alpha multiplier"),
    num("particle_alpha_variation", 0.0, 1.0, "Amplitude of the particle alpha wave"),
    choice("advection", ADVECTION_KINDS, "Particle advection policy"),
    num("particle_speed", 0.0, 50.0, "Field-following speed in pixels per reference frame"),
    num("spring_k", 0.0, 1.0, "Spring constant toward the nearest lattice point"),
    num("spring_damping", 0.0, 1.0, "Velocity damping per step"),
    num("spring_speed_limit", 0.0, 50.0, "Hard speed clamp"),
    num("spring_repulsion_radius", 0.0, 200.0, "Neighbour repulsion radius"),
    num("spring_repulsion_strength", 0.0, 5.0, "Neighbour repulsion strength"),
    num("spring_flow_strength", 0.0, 1.0, "Per-particle sine flow strength"),
    num("spring_wave_amplitude", 0.0, 1.0, "Global wave drift amplitude"),
    num("spring_noise_strength", 0.0, 1.0, "Noise jitter strength"),
    num("spring_breathing_amplitude", 0.0, 1.0, "Relative size breathing amplitude"),
    flag("effect_enabled", "Spawn attention effects from the pointer"),
    int("effect_target_count", 0, 64, "Lines created per spawn"),
    num("effect_duration_ms", 0.0, 60_000.0, "Effect lifetime in milliseconds"),
    num("effect_cooldown_ms", 0.0, 60_000.0, "Minimum time between spawns"),
    num("effect_activate_distance", 0.0, 1000.0, "Pointer must be this close to a lattice point"),
    int("effect_max", 0, 100_000, "Hard cap on live effects"),
    num("effect_line_width", 0.0, 20.0, "Initial line width"),
    num("effect_glow_blur", 0.0, 200.0, "Initial glow blur"),
    num("effect_spark_radius", 0.0, 20.0, "Radius of the travelling spark"),
    num("effect_halo_radius", 0.0, 500.0, "Halo ring radius (0 disables halos)"),
    color("effect_color", "Effect stroke color"),
    choice("effect_selection", SELECTION_KINDS, "Target selection strategy"),
    num("effect_temperature", 0.001, 10.0, "Softness of similarity-weighted selection"),
    num("render_target_fps", 0.0, 240.0, "Frame-rate ceiling (0 = uncapped)"),
    int("render_field_update_every", 1, 600, "Recompute the field every Nth frame"),
    color("render_background", "Background dim fill color"),
    num("render_background_dim_alpha", 0.0, 1.0, "Opacity of the per-frame dim fill"),
    num("render_scanline_spacing", 0.0, 100.0, "Scanline pitch (0 disables)"),
    num("render_scanline_alpha", 0.0, 1.0, "Scanline opacity"),
    num("render_vignette_alpha", 0.0, 1.0, "Vignette darkness at the rim"),
    num("render_grain_density", 0.0, 0.01, "Grain pixels per square pixel"),
    num("render_grain_alpha", 0.0, 1.0, "Grain opacity"),
    flag("render_highlight", "Draw a glow under the pointer"),
    num("render_highlight_radius", 0.0, 1000.0, "Pointer glow radius"),
    color("render_highlight_color", "Pointer glow color"),
    flag("render_reduced_motion", "Freeze the field and disable spawning"),
    num("render_max_dpr", 1.0, 4.0, "Device pixel ratio ceiling"),
    num("render_resize_debounce_ms", 0.0, 2000.0, "Resize quiet window in milliseconds"),
    flag("render_gradient", "Animated two-tone gradient instead of the flat dim fill"),
    color("render_gradient_start_a", "First gradient stop, low swing"),
    color("render_gradient_start_b", "First gradient stop, high swing"),
    color("render_gradient_end_a", "Second gradient stop, low swing"),
    color("render_gradient_end_b", "Second gradient stop, high swing"),
    int("render_gradient_every", 1, 600, "Refresh gradient tones every Nth frame"),
    num("render_motion_time_scale", 0.0, 0.01, "Backdrop time per millisecond"),
    int("render_connection_nodes", 0, 256, "Nodes in the link mesh (0 disables)"),
    int("render_connection_lookahead", 1, 64, "Neighbours tested per node"),
    num("render_connection_distance", 0.0, 1.0, "Link cutoff as a fraction of the shorter side"),
    num("render_connection_alpha", 0.0, 1.0, "Peak link opacity"),
    color("render_connection_color", "Link stroke color"),
    choice("noise_kind", NOISE_KINDS, "Gradient noise implementation"),
    int("noise_seed", 0, u64::MAX, "Noise permutation seed"),
    num("noise_scale", 0.0, 1.0, "Lattice-to-noise coordinate scale"),
    num("noise_evolution_speed", 0.0, 1.0, "Field time advance per frame"),
];

impl FieldConfig {
    /// Returns a copy with every recognised key in `overrides` applied.
    ///
    /// Unknown keys and wrongly typed values are logged and ignored.
    pub fn with_overrides(&self, overrides: &Value) -> FieldConfig {
        if let Some(map) = overrides.as_object() {
            for key in map.keys() {
                if !PARAMS.iter().any(|p| p.name == key) {
                    warn!(key = %key, "ignoring unknown parameter");
                }
            }
        }
        for spec in PARAMS {
            if param_mistyped(overrides, spec.name, spec.kind.accepts()) {
                warn!(key = spec.name, "ignoring parameter of the wrong type");
            }
        }

        let o = overrides;
        let mut c = *self;

        let g = &mut c.grid;
        g.spacing = param_f64(o, "grid_spacing", g.spacing);
        g.draw_vectors = param_bool(o, "grid_draw_vectors", g.draw_vectors);
        g.vector_length = param_f64(o, "grid_vector_length", g.vector_length);
        g.vector_draw_every = param_u64(o, "grid_vector_draw_every", g.vector_draw_every);
        g.vector_color = param_color(o, "grid_vector_color", g.vector_color);
        g.dot_radius = param_f64(o, "grid_dot_radius", g.dot_radius);
        g.dot_alpha = param_f64(o, "grid_dot_alpha", g.dot_alpha);
        g.dot_color = param_color(o, "grid_dot_color", g.dot_color);
        g.drift_alpha = param_f64(o, "grid_drift_alpha", g.drift_alpha);
        g.drift_scale = param_f64(o, "grid_drift_scale", g.drift_scale);

        let p = &mut c.particles;
        p.count = param_usize(o, "particle_count", p.count);
        p.radius = param_f64(o, "particle_radius", p.radius);
        p.color = param_color(o, "particle_color", p.color);
        p.margin = param_f64(o, "particle_margin", p.margin);
        p.max_dt_ms = param_f64(o, "particle_max_dt_ms", p.max_dt_ms);
        p.boundary = match param_string(o, "particle_boundary", "").as_str() {
            "wrap" => BoundaryPolicy::Wrap,
            "respawn" => BoundaryPolicy::Respawn,
            _ => p.boundary,
        };
        p.hover_parallax = param_f64(o, "particle_hover_parallax", p.hover_parallax);
        p.alpha_base = param_f64(o, "particle_alpha_base", p.alpha_base);
        p.alpha_variation = param_f64(o, "particle_alpha_variation", p.alpha_variation);

        c.advection = match param_string(o, "advection", "").as_str() {
            "field_following" => match c.advection {
                AdvectionPolicy::FieldFollowing { .. } => c.advection,
                AdvectionPolicy::SpringFlow(_) => AdvectionPolicy::default(),
            },
            "spring_flow" => match c.advection {
                AdvectionPolicy::SpringFlow(_) => c.advection,
                AdvectionPolicy::FieldFollowing { .. } => {
                    AdvectionPolicy::SpringFlow(SpringFlowParams::default())
                }
            },
            _ => c.advection,
        };
        match &mut c.advection {
            AdvectionPolicy::FieldFollowing { speed } => {
                *speed = param_f64(o, "particle_speed", *speed);
            }
            AdvectionPolicy::SpringFlow(s) => {
                s.spring_k = param_f64(o, "spring_k", s.spring_k);
                s.damping = param_f64(o, "spring_damping", s.damping);
                s.speed_limit = param_f64(o, "spring_speed_limit", s.speed_limit);
                s.repulsion_radius = param_f64(o, "spring_repulsion_radius", s.repulsion_radius);
                s.repulsion_strength =
                    param_f64(o, "spring_repulsion_strength", s.repulsion_strength);
                s.flow_strength = param_f64(o, "spring_flow_strength", s.flow_strength);
                s.wave_amplitude = param_f64(o, "spring_wave_amplitude", s.wave_amplitude);
                s.noise_strength = param_f64(o, "spring_noise_strength", s.noise_strength);
                s.breathing_amplitude =
                    param_f64(o, "spring_breathing_amplitude", s.breathing_amplitude);
            }
        }

        let e = &mut c.effects;
        e.enabled = param_bool(o, "effect_enabled", e.enabled);
        e.target_count = param_usize(o, "effect_target_count", e.target_count);
        e.duration_ms = param_f64(o, "effect_duration_ms", e.duration_ms);
        e.cooldown_ms = param_f64(o, "effect_cooldown_ms", e.cooldown_ms);
        e.activate_distance = param_f64(o, "effect_activate_distance", e.activate_distance);
        e.max_effects = param_usize(o, "effect_max", e.max_effects);
        e.line_width = param_f64(o, "effect_line_width", e.line_width);
        e.glow_blur = param_f64(o, "effect_glow_blur", e.glow_blur);
        e.spark_radius = param_f64(o, "effect_spark_radius", e.spark_radius);
        e.halo_radius = param_f64(o, "effect_halo_radius", e.halo_radius);
        e.color = param_color(o, "effect_color", e.color);
        let temperature = match e.selection {
            TargetSelection::AngleSimilarity { temperature } => temperature,
            TargetSelection::Uniform => DEFAULT_TEMPERATURE,
        };
        let temperature = param_f64(o, "effect_temperature", temperature);
        e.selection = match param_string(o, "effect_selection", "").as_str() {
            "uniform" => TargetSelection::Uniform,
            "angle_similarity" => TargetSelection::AngleSimilarity { temperature },
            _ => match e.selection {
                TargetSelection::AngleSimilarity { .. } => {
                    TargetSelection::AngleSimilarity { temperature }
                }
                TargetSelection::Uniform => TargetSelection::Uniform,
            },
        };

        let r = &mut c.render;
        r.target_fps = param_f64(o, "render_target_fps", r.target_fps);
        r.field_update_every = param_u64(o, "render_field_update_every", r.field_update_every);
        r.background = param_color(o, "render_background", r.background);
        r.background_dim_alpha =
            param_f64(o, "render_background_dim_alpha", r.background_dim_alpha);
        r.scanline_spacing = param_f64(o, "render_scanline_spacing", r.scanline_spacing);
        r.scanline_alpha = param_f64(o, "render_scanline_alpha", r.scanline_alpha);
        r.vignette_alpha = param_f64(o, "render_vignette_alpha", r.vignette_alpha);
        r.grain_density = param_f64(o, "render_grain_density", r.grain_density);
        r.grain_alpha = param_f64(o, "render_grain_alpha", r.grain_alpha);
        r.highlight = param_bool(o, "render_highlight", r.highlight);
        r.highlight_radius = param_f64(o, "render_highlight_radius", r.highlight_radius);
        r.highlight_color = param_color(o, "render_highlight_color", r.highlight_color);
        r.reduced_motion = param_bool(o, "render_reduced_motion", r.reduced_motion);
        r.max_dpr = param_f64(o, "render_max_dpr", r.max_dpr);
        r.resize_debounce_ms = param_f64(o, "render_resize_debounce_ms", r.resize_debounce_ms);
        r.gradient = param_bool(o, "render_gradient", r.gradient);
        r.gradient_start_a = param_color(o, "render_gradient_start_a", r.gradient_start_a);
        r.gradient_start_b = param_color(o, "render_gradient_start_b", r.gradient_start_b);
        r.gradient_end_a = param_color(o, "render_gradient_end_a", r.gradient_end_a);
        r.gradient_end_b = param_color(o, "render_gradient_end_b", r.gradient_end_b);
        r.gradient_every = param_u64(o, "render_gradient_every", r.gradient_every);
        r.motion_time_scale = param_f64(o, "render_motion_time_scale", r.motion_time_scale);
        r.connection_nodes = param_usize(o, "render_connection_nodes", r.connection_nodes);
        r.connection_lookahead =
            param_usize(o, "render_connection_lookahead", r.connection_lookahead);
        r.connection_distance = param_f64(o, "render_connection_distance", r.connection_distance);
        r.connection_alpha = param_f64(o, "render_connection_alpha", r.connection_alpha);
        r.connection_color = param_color(o, "render_connection_color", r.connection_color);

        let n = &mut c.noise;
        n.kind = match param_string(o, "noise_kind", "").as_str() {
            "permutation" => NoiseKind::Permutation,
            "simplex" => NoiseKind::Simplex,
            _ => n.kind,
        };
        n.seed = param_u64(o, "noise_seed", n.seed);
        n.scale = param_f64(o, "noise_scale", n.scale);
        n.evolution_speed = param_f64(o, "noise_evolution_speed", n.evolution_speed);

        c
    }

    /// Rejects values that would break an engine invariant.
    ///
    /// Every numeric parameter must be finite and inside the range published
    /// by [`param_schema`](Self::param_schema).
    pub fn validate(&self) -> Result<(), EngineError> {
        let current = self.params();
        for spec in PARAMS {
            let value = &current[spec.name];
            match spec.kind {
                ParamKind::Number { min, max } => match value.as_f64() {
                    Some(v) if v.is_finite() && (min..=max).contains(&v) => {}
                    _ => {
                        return Err(EngineError::InvalidConfig(format!(
                            "{} must be a finite number in [{min}, {max}], got {value}",
                            spec.name
                        )))
                    }
                },
                ParamKind::Integer { min, max } => match value.as_u64() {
                    Some(v) if (min..=max).contains(&v) => {}
                    _ => {
                        return Err(EngineError::InvalidConfig(format!(
                            "{} must be an integer in [{min}, {max}], got {value}",
                            spec.name
                        )))
                    }
                },
                ParamKind::Bool | ParamKind::Color | ParamKind::Choice(_) => {}
            }
        }
        if self.effects.enabled && self.effects.max_effects == 0 {
            return Err(EngineError::InvalidConfig(
                "effect_max must be at least 1 while effects are enabled".into(),
            ));
        }
        Ok(())
    }

    /// Current values in the flat override namespace.
    pub fn params(&self) -> Value {
        let g = &self.grid;
        let p = &self.particles;
        let e = &self.effects;
        let r = &self.render;
        let n = &self.noise;
        let (advection, speed, spring) = match self.advection {
            AdvectionPolicy::FieldFollowing { speed } => {
                ("field_following", speed, SpringFlowParams::default())
            }
            AdvectionPolicy::SpringFlow(s) => ("spring_flow", 1.0, s),
        };
        let (selection, temperature) = match e.selection {
            TargetSelection::Uniform => ("uniform", DEFAULT_TEMPERATURE),
            TargetSelection::AngleSimilarity { temperature } => ("angle_similarity", temperature),
        };
        let boundary = match p.boundary {
            BoundaryPolicy::Wrap => "wrap",
            BoundaryPolicy::Respawn => "respawn",
        };
        let noise_kind = match n.kind {
            NoiseKind::Permutation => "permutation",
            NoiseKind::Simplex => "simplex",
        };
        let entries: Vec<(&str, Value)> = vec![
            ("grid_spacing", json!(g.spacing)),
            ("grid_draw_vectors", json!(g.draw_vectors)),
            ("grid_vector_length", json!(g.vector_length)),
            ("grid_vector_draw_every", json!(g.vector_draw_every)),
            ("grid_vector_color", json!(g.vector_color)),
            ("grid_dot_radius", json!(g.dot_radius)),
            ("grid_dot_alpha", json!(g.dot_alpha)),
            ("grid_dot_color", json!(g.dot_color)),
            ("grid_drift_alpha", json!(g.drift_alpha)),
            ("grid_drift_scale", json!(g.drift_scale)),
            ("particle_count", json!(p.count)),
            ("particle_radius", json!(p.radius)),
            ("particle_color", json!(p.color)),
            ("particle_margin", json!(p.margin)),
            ("particle_max_dt_ms", json!(p.max_dt_ms)),
            ("particle_boundary", json!(boundary)),
            ("particle_hover_parallax", json!(p.hover_parallax)),
            ("particle_alpha_base", json!(p.alpha_base)),
            ("particle_alpha_variation", json!(p.alpha_variation)),
            ("advection", json!(advection)),
            ("particle_speed", json!(speed)),
            ("spring_k", json!(spring.spring_k)),
            ("spring_damping", json!(spring.damping)),
            ("spring_speed_limit", json!(spring.speed_limit)),
            ("spring_repulsion_radius", json!(spring.repulsion_radius)),
            ("spring_repulsion_strength", json!(spring.repulsion_strength)),
            ("spring_flow_strength", json!(spring.flow_strength)),
            ("spring_wave_amplitude", json!(spring.wave_amplitude)),
            ("spring_noise_strength", json!(spring.noise_strength)),
            ("spring_breathing_amplitude", json!(spring.breathing_amplitude)),
            ("effect_enabled", json!(e.enabled)),
            ("effect_target_count", json!(e.target_count)),
            ("effect_duration_ms", json!(e.duration_ms)),
            ("effect_cooldown_ms", json!(e.cooldown_ms)),
            ("effect_activate_distance", json!(e.activate_distance)),
            ("effect_max", json!(e.max_effects)),
            ("effect_line_width", json!(e.line_width)),
            ("effect_glow_blur", json!(e.glow_blur)),
            ("effect_spark_radius", json!(e.spark_radius)),
            ("effect_halo_radius", json!(e.halo_radius)),
            ("effect_color", json!(e.color)),
            ("effect_selection", json!(selection)),
            ("effect_temperature", json!(temperature)),
            ("render_target_fps", json!(r.target_fps)),
            ("render_field_update_every", json!(r.field_update_every)),
            ("render_background", json!(r.background)),
            ("render_background_dim_alpha", json!(r.background_dim_alpha)),
            ("render_scanline_spacing", json!(r.scanline_spacing)),
            ("render_scanline_alpha", json!(r.scanline_alpha)),
            ("render_vignette_alpha", json!(r.vignette_alpha)),
            ("render_grain_density", json!(r.grain_density)),
            ("render_grain_alpha", json!(r.grain_alpha)),
            ("render_highlight", json!(r.highlight)),
            ("render_highlight_radius", json!(r.highlight_radius)),
            ("render_highlight_color", json!(r.highlight_color)),
            ("render_reduced_motion", json!(r.reduced_motion)),
            ("render_max_dpr", json!(r.max_dpr)),
            ("render_resize_debounce_ms", json!(r.resize_debounce_ms)),
            ("render_gradient", json!(r.gradient)),
            ("render_gradient_start_a", json!(r.gradient_start_a)),
            ("render_gradient_start_b", json!(r.gradient_start_b)),
            ("render_gradient_end_a", json!(r.gradient_end_a)),
            ("render_gradient_end_b", json!(r.gradient_end_b)),
            ("render_gradient_every", json!(r.gradient_every)),
            ("render_motion_time_scale", json!(r.motion_time_scale)),
            ("render_connection_nodes", json!(r.connection_nodes)),
            ("render_connection_lookahead", json!(r.connection_lookahead)),
            ("render_connection_distance", json!(r.connection_distance)),
            ("render_connection_alpha", json!(r.connection_alpha)),
            ("render_connection_color", json!(r.connection_color)),
            ("noise_kind", json!(noise_kind)),
            ("noise_seed", json!(n.seed)),
            ("noise_scale", json!(n.scale)),
            ("noise_evolution_speed", json!(n.evolution_speed)),
        ];
        Value::Object(
            entries
                .into_iter()
                .map(|(key, value)| (key.to_owned(), value))
                .collect(),
        )
    }

    /// Type, range, default and description of every flat parameter.
    ///
    /// Defaults are taken from `self`, so a preset reports its own values.
    pub fn param_schema(&self) -> Value {
        let current = self.params();
        let mut schema = Map::new();
        for spec in PARAMS {
            let mut entry = match spec.kind {
                ParamKind::Number { min, max } => json!({"type": "number", "min": min, "max": max}),
                ParamKind::Integer { min, max } => {
                    json!({"type": "integer", "min": min, "max": max})
                }
                ParamKind::Bool => json!({"type": "boolean"}),
                ParamKind::Color => json!({"type": "color"}),
                ParamKind::Choice(options) => json!({"type": "string", "options": options}),
            };
            if let Some(obj) = entry.as_object_mut() {
                obj.insert("default".into(), current[spec.name].clone());
                obj.insert("description".into(), Value::from(spec.description));
            }
            schema.insert(spec.name.into(), entry);
        }
        Value::Object(schema)
    }
}
