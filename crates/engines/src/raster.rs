//! CPU implementation of the [`Surface`] seam.
//!
//! Pixels are premultiplied `f32` RGBA at the device resolution
//! (`floor(logical * dpr)`). Every primitive is rasterised from a signed
//! distance function, which gives one pixel of antialiasing on all edges.
//! Shadows are approximated by a soft falloff pass drawn under the shape.
//!
//! This module is always available (no feature gate) so the `png` snapshot
//! path and tests share the same rasteriser.

use fieldglow_core::color::Rgba;
use fieldglow_core::layers::BlendMode;
use fieldglow_core::surface::{Bitmap, Paint, Surface};
use fieldglow_core::viewport::Viewport;
use glam::DVec2;
use tracing::warn;

/// Backing stores larger than this are refused rather than allocated.
const MAX_PIXELS: usize = 1 << 26;
/// Peak opacity of the glow pass relative to the shadow colour's alpha.
const GLOW_STRENGTH: f64 = 0.35;

#[derive(Debug, Clone, Copy, PartialEq)]
struct DrawState {
    blend: BlendMode,
    alpha: f64,
    shadow_blur: f64,
    shadow_color: Rgba,
}

impl Default for DrawState {
    fn default() -> Self {
        Self {
            blend: BlendMode::Normal,
            alpha: 1.0,
            shadow_blur: 0.0,
            shadow_color: Rgba::TRANSPARENT,
        }
    }
}

/// A software-rendered drawing surface.
#[derive(Debug, Clone)]
pub struct RasterSurface {
    viewport: Viewport,
    width: usize,
    height: usize,
    pixels: Vec<[f32; 4]>,
    state: DrawState,
    stack: Vec<DrawState>,
}

impl RasterSurface {
    pub fn new(viewport: Viewport) -> Self {
        let mut surface = Self {
            viewport,
            width: 0,
            height: 0,
            pixels: Vec::new(),
            state: DrawState::default(),
            stack: Vec::new(),
        };
        surface.resize(viewport);
        surface
    }

    /// Backing width in device pixels.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Backing height in device pixels.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Straight-alpha colour of a device pixel.
    pub fn pixel(&self, x: usize, y: usize) -> Option<Rgba> {
        if x >= self.width || y >= self.height {
            return None;
        }
        Some(unpremultiply(self.pixels[y * self.width + x]))
    }

    /// Straight-alpha RGBA8 bytes, row-major, `width * height * 4` long.
    pub fn to_rgba8(&self) -> Vec<u8> {
        self.pixels
            .iter()
            .flat_map(|&px| unpremultiply(px).to_rgba8())
            .collect()
    }

    /// Opaque RGBA8 bytes: the surface composited over a solid `backdrop`.
    pub fn flatten_rgba8(&self, backdrop: Rgba) -> Vec<u8> {
        self.pixels
            .iter()
            .flat_map(|&[r, g, b, a]| {
                let keep = 1.0 - a as f64;
                Rgba::new(
                    r as f64 + backdrop.r * keep,
                    g as f64 + backdrop.g * keep,
                    b as f64 + backdrop.b * keep,
                    1.0,
                )
                .to_rgba8()
            })
            .collect()
    }

    fn dpr(&self) -> f64 {
        self.viewport.dpr
    }

    fn blend(&mut self, idx: usize, color: Rgba, coverage: f64) {
        let a = color.a * coverage * self.state.alpha;
        if a <= 0.0 || !a.is_finite() {
            return;
        }
        let a = a.min(1.0);
        let src = [
            (color.r * a) as f32,
            (color.g * a) as f32,
            (color.b * a) as f32,
            a as f32,
        ];
        let dst = &mut self.pixels[idx];
        match self.state.blend {
            BlendMode::Normal => {
                let keep = 1.0 - src[3];
                for (d, s) in dst.iter_mut().zip(src) {
                    *d = s + *d * keep;
                }
            }
            BlendMode::Additive => {
                for (d, s) in dst.iter_mut().zip(src) {
                    *d = (s + *d).min(1.0);
                }
            }
            BlendMode::Screen => {
                for (d, s) in dst.iter_mut().zip(src) {
                    *d = s + *d - s * *d;
                }
            }
        }
    }

    /// Rasterises a shape given in device space by its signed distance.
    ///
    /// `min`/`max` bound the shape in device pixels; `paint` receives
    /// logical coordinates.
    fn raster(
        &mut self,
        min: DVec2,
        max: DVec2,
        sd: impl Fn(DVec2) -> f64,
        paint: impl Fn(DVec2) -> Rgba,
        opacity: f64,
    ) {
        if self.pixels.is_empty() || opacity <= 0.0 {
            return;
        }
        let glow = self.state.shadow_blur * self.dpr();
        let shadow = self.state.shadow_color;
        let glowing = glow > 0.0 && shadow.a > 0.0;
        let pad = 1.0 + if glowing { glow } else { 0.0 };

        let x0 = (min.x - pad).floor().max(0.0) as usize;
        let y0 = (min.y - pad).floor().max(0.0) as usize;
        let x1 = ((max.x + pad).ceil().max(0.0) as usize).min(self.width);
        let y1 = ((max.y + pad).ceil().max(0.0) as usize).min(self.height);
        let dpr = self.dpr();

        for y in y0..y1 {
            for x in x0..x1 {
                let center = DVec2::new(x as f64 + 0.5, y as f64 + 0.5);
                let d = sd(center);
                let idx = y * self.width + x;
                if glowing && d > -0.5 {
                    let falloff = (1.0 - d.max(0.0) / glow).clamp(0.0, 1.0);
                    self.blend(idx, shadow, falloff * falloff * GLOW_STRENGTH * opacity);
                }
                let coverage = (0.5 - d).clamp(0.0, 1.0);
                if coverage > 0.0 {
                    self.blend(idx, paint(center / dpr), coverage * opacity);
                }
            }
        }
    }
}

fn unpremultiply([r, g, b, a]: [f32; 4]) -> Rgba {
    if a <= 0.0 {
        return Rgba::TRANSPARENT;
    }
    let a = a as f64;
    Rgba::new(r as f64 / a, g as f64 / a, b as f64 / a, a)
}

fn segment_distance(p: DVec2, a: DVec2, b: DVec2) -> f64 {
    let ab = b - a;
    let len2 = ab.length_squared();
    let t = if len2 > 0.0 {
        ((p - a).dot(ab) / len2).clamp(0.0, 1.0)
    } else {
        0.0
    };
    p.distance(a + ab * t)
}

/// Sub-pixel strokes are widened to one pixel and faded instead.
fn stroke_profile(width_px: f64) -> (f64, f64) {
    if width_px >= 1.0 {
        (width_px * 0.5, 1.0)
    } else {
        (0.5, width_px.max(0.0))
    }
}

impl Surface for RasterSurface {
    fn viewport(&self) -> Viewport {
        self.viewport
    }

    fn resize(&mut self, viewport: Viewport) {
        let (w, h) = viewport.backing_size();
        let (w, h) = (w as usize, h as usize);
        self.viewport = viewport;
        self.state = DrawState::default();
        self.stack.clear();
        match w.checked_mul(h) {
            Some(area) if area <= MAX_PIXELS => {
                self.width = w;
                self.height = h;
                self.pixels = vec![[0.0; 4]; area];
            }
            _ => {
                warn!(width = w, height = h, "backing store too large; surface left empty");
                self.width = 0;
                self.height = 0;
                self.pixels = Vec::new();
            }
        }
    }

    fn clear(&mut self) {
        self.pixels.fill([0.0; 4]);
    }

    fn fill_rect(&mut self, origin: DVec2, size: DVec2, paint: &Paint) {
        let dpr = self.dpr();
        let a = origin * dpr;
        let b = (origin + size) * dpr;
        let (min, max) = (a.min(b), a.max(b));
        let center = (min + max) * 0.5;
        let half = (max - min) * 0.5;
        self.raster(
            min,
            max,
            |p| {
                let q = (p - center).abs() - half;
                q.max(DVec2::ZERO).length() + q.x.max(q.y).min(0.0)
            },
            |p| paint.color_at(p),
            1.0,
        );
    }

    fn stroke_line(&mut self, from: DVec2, to: DVec2, width: f64, color: Rgba) {
        let dpr = self.dpr();
        let (a, b) = (from * dpr, to * dpr);
        let (half, opacity) = stroke_profile(width * dpr);
        self.raster(
            a.min(b) - half,
            a.max(b) + half,
            |p| segment_distance(p, a, b) - half,
            |_| color,
            opacity,
        );
    }

    fn fill_circle(&mut self, center: DVec2, radius: f64, paint: &Paint) {
        if !(radius.is_finite() && radius > 0.0) {
            return;
        }
        let dpr = self.dpr();
        let c = center * dpr;
        let r = radius * dpr;
        self.raster(
            c - r,
            c + r,
            |p| p.distance(c) - r,
            |p| paint.color_at(p),
            1.0,
        );
    }

    fn stroke_circle(&mut self, center: DVec2, radius: f64, width: f64, color: Rgba) {
        if !(radius.is_finite() && radius >= 0.0) {
            return;
        }
        let dpr = self.dpr();
        let c = center * dpr;
        let r = radius * dpr;
        let (half, opacity) = stroke_profile(width * dpr);
        let reach = r + half;
        self.raster(
            c - reach,
            c + reach,
            |p| (p.distance(c) - r).abs() - half,
            |_| color,
            opacity,
        );
    }

    fn draw_bitmap(&mut self, bitmap: &Bitmap, alpha: f64) {
        if bitmap.is_empty() || self.pixels.is_empty() {
            return;
        }
        let (bw, bh) = (bitmap.width(), bitmap.height());
        let src = bitmap.pixels();
        for y in 0..self.height {
            let by = (y * bh / self.height).min(bh - 1);
            for x in 0..self.width {
                let bx = (x * bw / self.width).min(bw - 1);
                let px = src[by * bw + bx];
                if px[3] == 0 {
                    continue;
                }
                self.blend(y * self.width + x, Rgba::from_rgba8(px), alpha);
            }
        }
    }

    fn set_blend_mode(&mut self, mode: BlendMode) {
        self.state.blend = mode;
    }

    fn set_global_alpha(&mut self, alpha: f64) {
        if alpha.is_finite() {
            self.state.alpha = alpha.clamp(0.0, 1.0);
        }
    }

    fn set_shadow(&mut self, blur: f64, color: Rgba) {
        self.state.shadow_blur = if blur.is_finite() { blur.max(0.0) } else { 0.0 };
        self.state.shadow_color = color;
    }

    fn save(&mut self) {
        self.stack.push(self.state);
    }

    fn restore(&mut self) {
        if let Some(state) = self.stack.pop() {
            self.state = state;
        }
    }
}
