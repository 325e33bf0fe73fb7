//! The flow-field scene: one configurable [`Engine`] composed of a noise
//! source, a lattice, a particle pool and the transient effect overlay.
//!
//! Per tick the order is fixed: field update, particle advance, pointer
//! spawn, prune. Compositing then walks the [`LayerStack`] bottom to top.
//! The scene exclusively owns its baked bitmaps; they are rebuilt on resize
//! and never shared.

use crate::backdrop::{gradient_tones, mesh_links, mesh_nodes};
use crate::color::Rgba;
use crate::config::FieldConfig;
use crate::effect::{EffectKind, EffectOverlay};
use crate::engine::{Engine, FrameContext};
use crate::error::EngineError;
use crate::field::FlowField;
use crate::layers::{LayerKind, LayerStack};
use crate::noise::NoiseSource;
use crate::particle::{AdvanceContext, ParticleSystem};
use crate::prng::Xorshift64;
use crate::surface::{Bitmap, GradientStop, Paint, Surface};
use crate::viewport::Viewport;
use glam::DVec2;
use serde_json::Value;
use tracing::{debug, warn};

/// Mixed into the noise seed so particles and grain draw from their own streams.
const PARTICLE_SEED_SALT: u64 = 0x9e37_79b9_7f4a_7c15;
const GRAIN_SEED_SALT: u64 = 0xd1b5_4a32_d192_ed03;
/// Baked layers larger than this are skipped rather than allocated.
const MAX_BAKED_PIXELS: usize = 1 << 26;
/// Grain shades are drawn from `GRAIN_SHADE_MIN..GRAIN_SHADE_MIN + GRAIN_SHADE_SPAN`.
const GRAIN_SHADE_MIN: u8 = 230;
const GRAIN_SHADE_SPAN: usize = 15;
/// Vignette radius as a fraction of the larger viewport side.
const VIGNETTE_EXTENT: f64 = 0.8;
/// Particle alpha wave: `sin(t * RATE + x * KX + y * KY)` with `t` in seconds.
const ALPHA_WAVE_RATE: f64 = 0.5;
const ALPHA_WAVE_KX: f64 = 0.01;
const ALPHA_WAVE_KY: f64 = 0.008;
/// Drift dots: pixels per second the noise window slides, per axis.
const DRIFT_VELOCITY_X: DVec2 = DVec2::new(25.0, 20.0);
const DRIFT_VELOCITY_Y: DVec2 = DVec2::new(18.0, 24.0);
const DRIFT_OFFSET_Y: f64 = 500.0;
const DRIFT_AMPLITUDE: DVec2 = DVec2::new(0.8, 0.6);
/// Noise slice the drift samples, away from the integer lattice planes.
const DRIFT_NOISE_Z: f64 = 0.5;

/// A complete, self-contained background animation.
#[derive(Debug, Clone)]
pub struct FlowScene {
    config: FieldConfig,
    viewport: Viewport,
    noise: NoiseSource,
    field: FlowField,
    particles: ParticleSystem,
    overlay: EffectOverlay,
    rng: Xorshift64,
    layers: LayerStack,
    dots: Option<Bitmap>,
    grain: Option<Bitmap>,
    pointer: Option<DVec2>,
    field_time: f64,
    tones: [Rgba; 2],
}

impl FlowScene {
    /// Builds a scene for `viewport`. The config is validated first.
    pub fn new(config: FieldConfig, viewport: Viewport) -> Result<Self, EngineError> {
        config.validate()?;
        let viewport = Viewport::new(
            viewport.width,
            viewport.height,
            viewport.dpr,
            config.render.max_dpr,
        );
        let noise = NoiseSource::new(config.noise.kind, config.noise.seed);
        let mut rng = Xorshift64::new(config.noise.seed ^ PARTICLE_SEED_SALT);

        let mut field = FlowField::new(viewport.width, viewport.height, config.grid.spacing);
        field.recompute(&noise, config.noise.scale, 0.0);

        let p = &config.particles;
        let particles = ParticleSystem::new(
            p.count,
            p.radius,
            viewport.width,
            viewport.height,
            p.margin,
            p.max_dt_ms,
            config.advection,
            p.boundary,
            &mut rng,
        );

        let mut layers = LayerStack::standard();
        layers
            .layer_mut(LayerKind::Grid)
            .set_visible(config.grid.draw_vectors || config.grid.dot_radius > 0.0);
        layers
            .layer_mut(LayerKind::Overlay)
            .set_visible(config.effects.enabled);
        layers
            .layer_mut(LayerKind::Highlight)
            .set_visible(config.render.highlight);

        let mut scene = Self {
            config,
            viewport,
            noise,
            field,
            particles,
            overlay: EffectOverlay::new(config.effects),
            rng,
            layers,
            dots: None,
            grain: None,
            pointer: None,
            field_time: 0.0,
            tones: gradient_tones(&config.render, 0.0),
        };
        scene.bake();
        debug!(
            width = viewport.width,
            height = viewport.height,
            points = scene.field.len(),
            particles = scene.particles.len(),
            "scene built"
        );
        Ok(scene)
    }

    /// Default config with flat JSON overrides applied.
    pub fn from_json(params: &Value, viewport: Viewport) -> Result<Self, EngineError> {
        Self::new(FieldConfig::default().with_overrides(params), viewport)
    }

    pub fn config(&self) -> &FieldConfig {
        &self.config
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn field(&self) -> &FlowField {
        &self.field
    }

    pub fn particles(&self) -> &ParticleSystem {
        &self.particles
    }

    pub fn overlay(&self) -> &EffectOverlay {
        &self.overlay
    }

    pub fn overlay_mut(&mut self) -> &mut EffectOverlay {
        &mut self.overlay
    }

    pub fn layers(&self) -> &LayerStack {
        &self.layers
    }

    pub fn layers_mut(&mut self) -> &mut LayerStack {
        &mut self.layers
    }

    pub fn noise(&self) -> &NoiseSource {
        &self.noise
    }

    /// Pointer position sampled by the latest tick.
    pub fn pointer(&self) -> Option<DVec2> {
        self.pointer
    }

    /// Time parameter of the most recent field recompute.
    pub fn field_time(&self) -> f64 {
        self.field_time
    }

    /// Gradient stop colors as of the latest refresh.
    pub fn gradient_tones(&self) -> [Rgba; 2] {
        self.tones
    }

    /// Backdrop time at host timestamp `now` (ms); frozen at 0 under reduced motion.
    pub fn backdrop_time(&self, now: f64) -> f64 {
        let render = &self.config.render;
        if render.reduced_motion || !now.is_finite() {
            0.0
        } else {
            now * render.motion_time_scale
        }
    }

    /// Alpha multiplier for a particle at `pos` at time `seconds`, in [0, 1].
    pub fn particle_alpha(&self, pos: DVec2, seconds: f64) -> f64 {
        let p = &self.config.particles;
        let wave = if p.alpha_variation > 0.0 {
            p.alpha_variation
                * (seconds * ALPHA_WAVE_RATE + pos.x * ALPHA_WAVE_KX + pos.y * ALPHA_WAVE_KY).sin()
        } else {
            0.0
        };
        (p.alpha_base + wave).clamp(0.0, 1.0)
    }

    pub fn dot_bitmap(&self) -> Option<&Bitmap> {
        self.dots.as_ref()
    }

    pub fn grain_bitmap(&self) -> Option<&Bitmap> {
        self.grain.as_ref()
    }

    /// Fully reshuffles the noise source and re-derives the field.
    pub fn reseed(&mut self, seed: u64) {
        self.noise.reseed(seed);
        self.field
            .recompute(&self.noise, self.config.noise.scale, self.field_time);
        debug!(seed, "noise reseeded");
    }

    /// Bakes the dot grid and grain at backing resolution. Grain density is
    /// per logical pixel, so the grain count does not depend on the dpr.
    fn bake(&mut self) {
        self.dots = None;
        self.grain = None;
        let (bw, bh) = self.viewport.backing_size();
        let (w, h) = (bw as usize, bh as usize);
        if w == 0 || h == 0 {
            return;
        }
        if w.checked_mul(h).map_or(true, |area| area > MAX_BAKED_PIXELS) {
            warn!(width = w, height = h, "viewport too large to bake offscreen layers");
            return;
        }
        let dpr = self.viewport.dpr;

        let grid = &self.config.grid;
        if grid.dot_radius > 0.0 {
            if let Ok(mut bitmap) = Bitmap::new(w, h) {
                let color = grid.dot_color.with_alpha(grid.dot_alpha);
                for p in self.field.points() {
                    bitmap.fill_disc(DVec2::new(p.x, p.y) * dpr, grid.dot_radius * dpr, color);
                }
                self.dots = Some(bitmap);
            }
        }

        let render = &self.config.render;
        if render.grain_density > 0.0 {
            if let Ok(mut bitmap) = Bitmap::new(w, h) {
                let logical_area = self.viewport.width * self.viewport.height;
                let count = (render.grain_density * logical_area).round() as usize;
                let mut rng = Xorshift64::new(self.config.noise.seed ^ GRAIN_SEED_SALT);
                for _ in 0..count {
                    let x = rng.next_usize(w);
                    let y = rng.next_usize(h);
                    let shade = GRAIN_SHADE_MIN + rng.next_usize(GRAIN_SHADE_SPAN) as u8;
                    bitmap.set(x, y, Rgba::from_rgb8(shade, shade, shade, 1.0));
                }
                self.grain = Some(bitmap);
            }
        }
        debug!(
            width = w,
            height = h,
            dots = self.dots.is_some(),
            grain = self.grain.is_some(),
            "offscreen layers baked"
        );
    }

    /// Draw offset for particles: `((pointer - centre) / size) * hover_parallax`.
    pub fn parallax_offset(&self, pointer: Option<DVec2>) -> DVec2 {
        let amount = self.config.particles.hover_parallax;
        match pointer {
            Some(p) if amount > 0.0 && !self.viewport.is_empty() => {
                let size = DVec2::new(self.viewport.width, self.viewport.height);
                (p - size * 0.5) / size * amount
            }
            _ => DVec2::ZERO,
        }
    }

    fn draw_background(&self, surface: &mut dyn Surface, size: DVec2, now: f64, opacity: f64) {
        let render = &self.config.render;
        let fill = if render.gradient {
            let [start, end] = self.tones;
            Paint::Linear {
                from: DVec2::ZERO,
                to: size,
                stops: vec![
                    GradientStop::new(0.0, start.fade(render.background_dim_alpha)),
                    GradientStop::new(1.0, end.fade(render.background_dim_alpha)),
                ],
            }
        } else {
            Paint::Solid(render.background.with_alpha(render.background_dim_alpha))
        };
        surface.fill_rect(DVec2::ZERO, size, &fill);
        if render.scanline_spacing > 0.0 && render.scanline_alpha > 0.0 {
            let line = Paint::Solid(Rgba::WHITE.with_alpha(render.scanline_alpha));
            let mut y = 0.0;
            while y < size.y {
                surface.fill_rect(DVec2::new(0.0, y), DVec2::new(size.x, 1.0), &line);
                y += render.scanline_spacing;
            }
        }
        if render.vignette_alpha > 0.0 {
            surface.fill_rect(
                DVec2::ZERO,
                size,
                &Paint::Radial {
                    center: size * 0.5,
                    inner_radius: 0.0,
                    outer_radius: size.max_element() * VIGNETTE_EXTENT,
                    stops: vec![
                        GradientStop::new(0.0, Rgba::TRANSPARENT),
                        GradientStop::new(1.0, Rgba::BLACK.with_alpha(render.vignette_alpha)),
                    ],
                },
            );
        }
        if render.connection_nodes > 0 && !render.reduced_motion {
            let nodes = mesh_nodes(render.connection_nodes, self.backdrop_time(now), size);
            let cutoff = size.min_element() * render.connection_distance;
            for link in mesh_links(nodes, render.connection_lookahead, cutoff) {
                surface.set_global_alpha(opacity * render.connection_alpha * link.strength);
                surface.stroke_line(link.from, link.to, 1.0, render.connection_color);
            }
            surface.set_global_alpha(opacity);
        }
        if let Some(grain) = &self.grain {
            surface.draw_bitmap(grain, render.grain_alpha);
        }
    }

    fn draw_grid(&self, surface: &mut dyn Surface, frame: u64, seconds: f64, offset: DVec2) {
        let grid = &self.config.grid;
        if let Some(dots) = &self.dots {
            surface.draw_bitmap(dots, 1.0);
        }
        if grid.draw_vectors && frame % grid.vector_draw_every.max(1) == 0 {
            let half = grid.vector_length * 0.5;
            for (p, angle) in self.field.iter() {
                let center = DVec2::new(p.x, p.y);
                let arm = DVec2::from_angle(angle) * half;
                surface.stroke_line(center - arm, center + arm, 1.0, grid.vector_color);
            }
        }
        if grid.drift_alpha > 0.0 && grid.dot_radius > 0.0 {
            let paint = Paint::Solid(grid.dot_color.with_alpha(grid.drift_alpha));
            for p in self.drift_points(seconds) {
                surface.fill_circle(p + offset, grid.dot_radius, &paint);
            }
        }
    }

    /// Lattice points inside the viewport, nudged by slowly sliding noise.
    pub fn drift_points(&self, seconds: f64) -> Vec<DVec2> {
        let scale = self.config.grid.drift_scale;
        let spacing = self.config.grid.spacing;
        let mut out = Vec::new();
        if spacing <= 0.0 || !spacing.is_finite() {
            return out;
        }
        let mut y = 0.0;
        while y < self.viewport.height {
            let mut x = 0.0;
            while x < self.viewport.width {
                let p = DVec2::new(x, y);
                let a = (p + DRIFT_VELOCITY_X * seconds) * scale;
                let b = (p + DRIFT_VELOCITY_Y * seconds + DVec2::splat(DRIFT_OFFSET_Y)) * scale;
                let jitter = DVec2::new(
                    self.noise.sample(a.x, a.y, DRIFT_NOISE_Z),
                    self.noise.sample(b.x, b.y, DRIFT_NOISE_Z),
                )
                .clamp(DVec2::NEG_ONE, DVec2::ONE);
                out.push(p + jitter * DRIFT_AMPLITUDE);
                x += spacing;
            }
            y += spacing;
        }
        out
    }

    fn draw_particles(&self, surface: &mut dyn Surface, pointer: Option<DVec2>, seconds: f64) {
        let offset = self.parallax_offset(pointer);
        let p = &self.config.particles;
        if p.alpha_variation > 0.0 {
            for particle in self.particles.particles() {
                let paint = Paint::Solid(p.color.fade(self.particle_alpha(particle.pos, seconds)));
                surface.fill_circle(particle.pos + offset, particle.size, &paint);
            }
        } else {
            let paint = Paint::Solid(p.color.fade(p.alpha_base));
            for particle in self.particles.particles() {
                surface.fill_circle(particle.pos + offset, particle.size, &paint);
            }
        }
    }

    fn draw_overlay(&self, surface: &mut dyn Surface, now: f64, opacity: f64) {
        let fx = self.overlay.config();
        let spark = Paint::Solid(fx.color);
        for (effect, visual) in self.overlay.visuals(now) {
            surface.set_global_alpha(opacity * visual.alpha);
            surface.set_shadow(visual.glow, fx.color);
            match effect.kind {
                EffectKind::Line { to } => {
                    surface.stroke_line(effect.from, to, visual.width, fx.color);
                    surface.fill_circle(visual.spark, fx.spark_radius, &spark);
                }
                EffectKind::Halo { .. } => {
                    surface.stroke_circle(effect.from, visual.ring_radius, visual.width, fx.color);
                }
            }
        }
        surface.set_shadow(0.0, Rgba::TRANSPARENT);
    }

    fn draw_highlight(&self, surface: &mut dyn Surface, pointer: Option<DVec2>) {
        let Some(center) = pointer else {
            return;
        };
        let render = &self.config.render;
        surface.fill_circle(
            center,
            render.highlight_radius,
            &Paint::Radial {
                center,
                inner_radius: 0.0,
                outer_radius: render.highlight_radius,
                stops: vec![
                    GradientStop::new(0.0, render.highlight_color),
                    GradientStop::new(1.0, render.highlight_color.with_alpha(0.0)),
                ],
            },
        );
    }
}

impl Engine for FlowScene {
    fn tick(&mut self, ctx: &FrameContext) {
        let reduced = self.config.render.reduced_motion;
        self.pointer = ctx.pointer.filter(|p| p.is_finite());

        if ctx.frame % self.config.render.gradient_every.max(1) == 0 {
            self.tones = gradient_tones(&self.config.render, self.backdrop_time(ctx.timestamp));
        }

        if ctx.frame % self.config.render.field_update_every.max(1) == 0 {
            self.field_time = if reduced {
                0.0
            } else {
                ctx.frame as f64 * self.config.noise.evolution_speed
            };
            self.field
                .recompute(&self.noise, self.config.noise.scale, self.field_time);
        }

        let advance = AdvanceContext {
            dt_ms: ctx.dt_ms,
            time: ctx.timestamp / 1000.0,
            field: &self.field,
            noise: &self.noise,
        };
        self.particles.advance(&advance, &mut self.rng);

        if !reduced {
            if let Some(p) = self.pointer {
                self.overlay
                    .try_spawn(p, ctx.timestamp, &self.field, &mut self.rng);
            }
        }
        self.overlay.prune(ctx.timestamp);
    }

    fn draw(&self, surface: &mut dyn Surface, ctx: &FrameContext) {
        surface.clear();
        if self.viewport.is_empty() {
            return;
        }
        let size = DVec2::new(self.viewport.width, self.viewport.height);
        let pointer = ctx.pointer.filter(|p| p.is_finite());
        let seconds = ctx.timestamp / 1000.0;
        let offset = self.parallax_offset(pointer);
        for layer in self.layers.drawn() {
            surface.save();
            surface.set_blend_mode(layer.blend_mode());
            surface.set_global_alpha(layer.opacity());
            match layer.kind() {
                LayerKind::Background => {
                    self.draw_background(surface, size, ctx.timestamp, layer.opacity())
                }
                LayerKind::Grid => self.draw_grid(surface, ctx.frame, seconds, offset),
                LayerKind::Particles => self.draw_particles(surface, pointer, seconds),
                LayerKind::Overlay => self.draw_overlay(surface, ctx.timestamp, layer.opacity()),
                LayerKind::Highlight => self.draw_highlight(surface, pointer),
            }
            surface.restore();
        }
    }

    fn resize(&mut self, viewport: Viewport) {
        self.viewport = Viewport::new(
            viewport.width,
            viewport.height,
            viewport.dpr,
            self.config.render.max_dpr,
        );
        let (w, h) = (self.viewport.width, self.viewport.height);
        self.field.rebuild(w, h);
        self.field
            .recompute(&self.noise, self.config.noise.scale, self.field_time);
        self.particles.resize(w, h, &mut self.rng);
        self.overlay.clear();
        self.bake();
        debug!(
            width = w,
            height = h,
            generation = self.field.generation(),
            points = self.field.len(),
            "lattice rebuilt"
        );
    }

    fn params(&self) -> Value {
        self.config.params()
    }

    fn param_schema(&self) -> Value {
        self.config.param_schema()
    }
}
