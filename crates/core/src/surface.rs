//! The immediate-mode 2D drawing seam.
//!
//! A scene never touches a host API directly: it issues calls on a
//! [`Surface`], which a browser canvas, a CPU raster buffer or a test
//! recorder implements. Coordinates are logical pixels; the surface owns the
//! device-pixel-ratio scaling of its backing store.

use crate::color::Rgba;
use crate::error::EngineError;
use crate::layers::BlendMode;
use crate::viewport::Viewport;
use glam::DVec2;
use std::sync::atomic::{AtomicU64, Ordering};

/// One colour stop of a gradient. `offset` is in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GradientStop {
    pub offset: f64,
    pub color: Rgba,
}

impl GradientStop {
    pub fn new(offset: f64, color: Rgba) -> Self {
        Self { offset, color }
    }
}

/// Fill style for rectangles and circles.
#[derive(Debug, Clone, PartialEq)]
pub enum Paint {
    Solid(Rgba),
    Linear {
        from: DVec2,
        to: DVec2,
        stops: Vec<GradientStop>,
    },
    /// Two-circle radial gradient sharing one centre.
    Radial {
        center: DVec2,
        inner_radius: f64,
        outer_radius: f64,
        stops: Vec<GradientStop>,
    },
}

impl Paint {
    /// Colour at a logical point. Hosts with native gradients never call this.
    pub fn color_at(&self, p: DVec2) -> Rgba {
        match self {
            Paint::Solid(c) => *c,
            Paint::Linear { from, to, stops } => {
                let axis = *to - *from;
                let len2 = axis.length_squared();
                let t = if len2 > 0.0 {
                    (p - *from).dot(axis) / len2
                } else {
                    0.0
                };
                sample_stops(stops, t)
            }
            Paint::Radial {
                center,
                inner_radius,
                outer_radius,
                stops,
            } => {
                let span = outer_radius - inner_radius;
                let t = if span > 0.0 {
                    (p.distance(*center) - inner_radius) / span
                } else {
                    0.0
                };
                sample_stops(stops, t)
            }
        }
    }
}

/// Stops are expected in ascending offset order; `t` is clamped.
fn sample_stops(stops: &[GradientStop], t: f64) -> Rgba {
    let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) };
    let (Some(first), Some(last)) = (stops.first(), stops.last()) else {
        return Rgba::TRANSPARENT;
    };
    if t <= first.offset {
        return first.color;
    }
    for pair in stops.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        if t <= b.offset {
            let span = b.offset - a.offset;
            let local = if span > 0.0 { (t - a.offset) / span } else { 1.0 };
            return a.color.lerp(b.color, local);
        }
    }
    last.color
}

/// CPU-side RGBA8 image used for baked offscreen layers.
///
/// Stored row-major in straight alpha at logical resolution, the same layout
/// as canvas `ImageData`. Drawn stretched over the whole surface by
/// [`Surface::draw_bitmap`].
#[derive(Debug, Clone)]
pub struct Bitmap {
    width: usize,
    height: usize,
    pixels: Vec<[u8; 4]>,
    key: u64,
}

static NEXT_BITMAP_KEY: AtomicU64 = AtomicU64::new(1);

fn next_bitmap_key() -> u64 {
    NEXT_BITMAP_KEY.fetch_add(1, Ordering::Relaxed)
}

impl PartialEq for Bitmap {
    fn eq(&self, other: &Self) -> bool {
        self.width == other.width && self.height == other.height && self.pixels == other.pixels
    }
}

impl Bitmap {
    /// Transparent bitmap. Zero sizes are allowed and yield an empty bitmap.
    ///
    /// Returns `EngineError::InvalidDimensions` if `width * height` overflows.
    pub fn new(width: usize, height: usize) -> Result<Self, EngineError> {
        let len = width
            .checked_mul(height)
            .ok_or(EngineError::InvalidDimensions)?;
        Ok(Self {
            width,
            height,
            pixels: vec![[0; 4]; len],
            key: next_bitmap_key(),
        })
    }

    /// Process-unique content key, refreshed by every mutation.
    ///
    /// Hosts that upload bitmaps to a GPU or an offscreen canvas can cache on it.
    pub fn key(&self) -> u64 {
        self.key
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }

    pub fn pixels(&self) -> &[[u8; 4]] {
        &self.pixels
    }

    /// Flat `r, g, b, a` bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.pixels.iter().flatten().copied().collect()
    }

    /// Pixel at `(x, y)`, or `None` outside the bitmap.
    pub fn get(&self, x: usize, y: usize) -> Option<Rgba> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.pixels
            .get(y * self.width + x)
            .map(|px| Rgba::from_rgba8(*px))
    }

    /// Overwrites one pixel. Out-of-range writes are ignored.
    pub fn set(&mut self, x: usize, y: usize, color: Rgba) {
        if x < self.width && y < self.height {
            self.pixels[y * self.width + x] = color.to_rgba8();
            self.key = next_bitmap_key();
        }
    }

    /// Fills a disc with a solid colour. Pixels whose centre lies inside are set.
    pub fn fill_disc(&mut self, center: DVec2, radius: f64, color: Rgba) {
        if self.is_empty() || radius.is_nan() || radius <= 0.0 || !center.is_finite() {
            return;
        }
        let px = color.to_rgba8();
        let clamp_x = |v: f64| v.clamp(0.0, (self.width - 1) as f64) as usize;
        let clamp_y = |v: f64| v.clamp(0.0, (self.height - 1) as f64) as usize;
        let (x0, x1) = (clamp_x(center.x - radius), clamp_x(center.x + radius));
        let (y0, y1) = (clamp_y(center.y - radius), clamp_y(center.y + radius));
        let r2 = radius * radius;
        self.key = next_bitmap_key();
        for y in y0..=y1 {
            for x in x0..=x1 {
                let d = DVec2::new(x as f64 + 0.5, y as f64 + 0.5) - center;
                if d.length_squared() <= r2 {
                    self.pixels[y * self.width + x] = px;
                }
            }
        }
    }
}

/// Host 2D drawing context.
///
/// Mirrors the subset of an HTML canvas 2D context the scene needs. State
/// (`blend`, `global_alpha`, `shadow`) persists until changed or restored.
pub trait Surface {
    /// Logical size currently bound.
    fn viewport(&self) -> Viewport;

    /// Rebinds the backing store to `floor(logical * dpr)` device pixels.
    /// Contents are discarded.
    fn resize(&mut self, viewport: Viewport);

    /// Clears every pixel to transparent, ignoring blend state.
    fn clear(&mut self);

    fn fill_rect(&mut self, origin: DVec2, size: DVec2, paint: &Paint);

    fn stroke_line(&mut self, from: DVec2, to: DVec2, width: f64, color: Rgba);

    fn fill_circle(&mut self, center: DVec2, radius: f64, paint: &Paint);

    fn stroke_circle(&mut self, center: DVec2, radius: f64, width: f64, color: Rgba);

    /// Composites a baked bitmap stretched over the whole surface.
    fn draw_bitmap(&mut self, bitmap: &Bitmap, alpha: f64);

    fn set_blend_mode(&mut self, mode: BlendMode);

    fn set_global_alpha(&mut self, alpha: f64);

    /// Glow around subsequent strokes and fills; `blur == 0` disables it.
    fn set_shadow(&mut self, blur: f64, color: Rgba);

    /// Pushes the current drawing state.
    fn save(&mut self);

    /// Pops the drawing state; unbalanced calls are ignored.
    fn restore(&mut self);
}

/// A single recorded [`Surface`] call.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    Resize(Viewport),
    Clear,
    FillRect { origin: DVec2, size: DVec2, paint: Paint },
    StrokeLine { from: DVec2, to: DVec2, width: f64, color: Rgba },
    FillCircle { center: DVec2, radius: f64, paint: Paint },
    StrokeCircle { center: DVec2, radius: f64, width: f64, color: Rgba },
    DrawBitmap { width: usize, height: usize, alpha: f64 },
    SetBlendMode(BlendMode),
    SetGlobalAlpha(f64),
    SetShadow { blur: f64, color: Rgba },
    Save,
    Restore,
}

/// A [`Surface`] that only records calls. Handy for inspecting frame output.
#[derive(Debug, Clone, Default)]
pub struct RecordingSurface {
    viewport: Option<Viewport>,
    commands: Vec<DrawCommand>,
}

impl RecordingSurface {
    pub fn new(viewport: Viewport) -> Self {
        Self {
            viewport: Some(viewport),
            commands: Vec::new(),
        }
    }

    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    /// Returns and forgets everything recorded so far.
    pub fn take_commands(&mut self) -> Vec<DrawCommand> {
        std::mem::take(&mut self.commands)
    }

    pub fn count(&self, pred: impl Fn(&DrawCommand) -> bool) -> usize {
        self.commands.iter().filter(|c| pred(c)).count()
    }
}

impl Surface for RecordingSurface {
    fn viewport(&self) -> Viewport {
        self.viewport.unwrap_or_else(|| Viewport::logical(0.0, 0.0))
    }

    fn resize(&mut self, viewport: Viewport) {
        self.viewport = Some(viewport);
        self.commands.push(DrawCommand::Resize(viewport));
    }

    fn clear(&mut self) {
        self.commands.push(DrawCommand::Clear);
    }

    fn fill_rect(&mut self, origin: DVec2, size: DVec2, paint: &Paint) {
        self.commands.push(DrawCommand::FillRect {
            origin,
            size,
            paint: paint.clone(),
        });
    }

    fn stroke_line(&mut self, from: DVec2, to: DVec2, width: f64, color: Rgba) {
        self.commands.push(DrawCommand::StrokeLine {
            from,
            to,
            width,
            color,
        });
    }

    fn fill_circle(&mut self, center: DVec2, radius: f64, paint: &Paint) {
        self.commands.push(DrawCommand::FillCircle {
            center,
            radius,
            paint: paint.clone(),
        });
    }

    fn stroke_circle(&mut self, center: DVec2, radius: f64, width: f64, color: Rgba) {
        self.commands.push(DrawCommand::StrokeCircle {
            center,
            radius,
            width,
            color,
        });
    }

    fn draw_bitmap(&mut self, bitmap: &Bitmap, alpha: f64) {
        self.commands.push(DrawCommand::DrawBitmap {
            width: bitmap.width(),
            height: bitmap.height(),
            alpha,
        });
    }

    fn set_blend_mode(&mut self, mode: BlendMode) {
        self.commands.push(DrawCommand::SetBlendMode(mode));
    }

    fn set_global_alpha(&mut self, alpha: f64) {
        self.commands.push(DrawCommand::SetGlobalAlpha(alpha));
    }

    fn set_shadow(&mut self, blur: f64, color: Rgba) {
        self.commands.push(DrawCommand::SetShadow { blur, color });
    }

    fn save(&mut self) {
        self.commands.push(DrawCommand::Save);
    }

    fn restore(&mut self) {
        self.commands.push(DrawCommand::Restore);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp() -> Vec<GradientStop> {
        vec![
            GradientStop::new(0.0, Rgba::BLACK),
            GradientStop::new(1.0, Rgba::WHITE),
        ]
    }

    #[test]
    fn linear_gradient_interpolates_along_axis() {
        let paint = Paint::Linear {
            from: DVec2::ZERO,
            to: DVec2::new(100.0, 0.0),
            stops: ramp(),
        };
        assert_eq!(paint.color_at(DVec2::new(-10.0, 5.0)), Rgba::BLACK);
        assert_eq!(paint.color_at(DVec2::new(500.0, 5.0)), Rgba::WHITE);
        let mid = paint.color_at(DVec2::new(50.0, 40.0));
        assert!((mid.r - 0.5).abs() < 1e-12);
    }

    #[test]
    fn radial_gradient_measures_from_inner_radius() {
        let paint = Paint::Radial {
            center: DVec2::new(50.0, 50.0),
            inner_radius: 10.0,
            outer_radius: 30.0,
            stops: ramp(),
        };
        assert_eq!(paint.color_at(DVec2::new(50.0, 55.0)), Rgba::BLACK);
        let mid = paint.color_at(DVec2::new(70.0, 50.0));
        assert!((mid.g - 0.5).abs() < 1e-12);
        assert_eq!(paint.color_at(DVec2::new(0.0, 0.0)), Rgba::WHITE);
    }

    #[test]
    fn degenerate_gradients_do_not_divide_by_zero() {
        let flat = Paint::Linear {
            from: DVec2::ONE,
            to: DVec2::ONE,
            stops: ramp(),
        };
        assert_eq!(flat.color_at(DVec2::new(9.0, 9.0)), Rgba::BLACK);
        let empty = Paint::Radial {
            center: DVec2::ZERO,
            inner_radius: 0.0,
            outer_radius: 5.0,
            stops: Vec::new(),
        };
        assert_eq!(empty.color_at(DVec2::ONE), Rgba::TRANSPARENT);
    }

    #[test]
    fn bitmap_rejects_overflowing_area() {
        assert!(matches!(
            Bitmap::new(usize::MAX, 2),
            Err(EngineError::InvalidDimensions)
        ));
        assert!(Bitmap::new(0, 10).unwrap().is_empty());
    }

    #[test]
    fn bitmap_set_and_get_ignore_out_of_range() {
        let mut bmp = Bitmap::new(4, 3).unwrap();
        bmp.set(3, 2, Rgba::WHITE);
        bmp.set(4, 0, Rgba::WHITE);
        assert_eq!(bmp.get(3, 2), Some(Rgba::WHITE));
        assert_eq!(bmp.get(4, 0), None);
        assert_eq!(bmp.pixels().iter().filter(|p| p[3] > 0).count(), 1);
        assert_eq!(bmp.to_bytes().len(), 4 * 3 * 4);
    }

    #[test]
    fn fill_disc_covers_centre_and_clips_at_edges() {
        let mut bmp = Bitmap::new(10, 10).unwrap();
        bmp.fill_disc(DVec2::new(0.0, 0.0), 2.0, Rgba::WHITE);
        assert_eq!(bmp.get(0, 0), Some(Rgba::WHITE));
        assert_eq!(bmp.get(5, 5), Some(Rgba::TRANSPARENT));
        bmp.fill_disc(DVec2::new(5.0, 5.0), 0.0, Rgba::WHITE);
        assert_eq!(bmp.get(5, 5), Some(Rgba::TRANSPARENT));
    }

    #[test]
    fn key_changes_on_mutation_but_not_on_clone() {
        let mut bmp = Bitmap::new(4, 4).unwrap();
        let copy = bmp.clone();
        assert_eq!(copy.key(), bmp.key());
        assert_ne!(Bitmap::new(4, 4).unwrap().key(), bmp.key());

        let before = bmp.key();
        bmp.set(1, 1, Rgba::WHITE);
        assert_ne!(bmp.key(), before);
        assert_ne!(bmp, copy);

        let mut other = copy.clone();
        other.set(1, 1, Rgba::WHITE);
        assert_eq!(other, bmp);
        assert_ne!(other.key(), bmp.key());
    }

    #[test]
    fn recording_surface_keeps_call_order() {
        let mut s = RecordingSurface::new(Viewport::logical(10.0, 10.0));
        s.save();
        s.set_blend_mode(BlendMode::Additive);
        s.clear();
        s.restore();
        assert_eq!(
            s.commands(),
            &[
                DrawCommand::Save,
                DrawCommand::SetBlendMode(BlendMode::Additive),
                DrawCommand::Clear,
                DrawCommand::Restore,
            ]
        );
        assert_eq!(s.take_commands().len(), 4);
        assert!(s.commands().is_empty());
    }
}
