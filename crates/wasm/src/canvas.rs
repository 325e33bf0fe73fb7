//! [`Surface`] over an HTML canvas 2D context.
//!
//! Drawing happens in logical coordinates: the context transform is set to
//! the device pixel ratio on every resize. Baked bitmaps are uploaded once
//! into offscreen canvases keyed by [`Bitmap::key`].

use fieldglow_core::color::Rgba;
use fieldglow_core::layers::BlendMode;
use fieldglow_core::surface::{Bitmap, GradientStop, Paint, Surface};
use fieldglow_core::viewport::Viewport;
use glam::DVec2;
use std::f64::consts::TAU;
use tracing::warn;
use wasm_bindgen::{Clamped, JsCast, JsValue};
use web_sys::{CanvasGradient, CanvasRenderingContext2d, Document, HtmlCanvasElement, ImageData};

/// Offscreen uploads kept alive at once (dots and grain, plus slack for a resize).
const BITMAP_CACHE: usize = 4;

fn log_js_error(what: &str, result: Result<(), JsValue>) {
    if let Err(e) = result {
        warn!(error = ?e, "{what} failed");
    }
}

pub(crate) fn context_2d(canvas: &HtmlCanvasElement) -> Option<CanvasRenderingContext2d> {
    canvas
        .get_context("2d")
        .ok()
        .flatten()
        .and_then(|ctx| ctx.dyn_into::<CanvasRenderingContext2d>().ok())
}

struct Upload {
    key: u64,
    canvas: HtmlCanvasElement,
}

pub struct CanvasSurface {
    document: Document,
    canvas: HtmlCanvasElement,
    ctx: CanvasRenderingContext2d,
    viewport: Viewport,
    uploads: Vec<Upload>,
}

impl CanvasSurface {
    /// Returns `None` when the canvas cannot provide a 2D context.
    pub fn new(document: Document, canvas: HtmlCanvasElement) -> Option<Self> {
        let ctx = context_2d(&canvas)?;
        Some(Self {
            document,
            canvas,
            ctx,
            viewport: Viewport::logical(0.0, 0.0),
            uploads: Vec::new(),
        })
    }

    pub fn canvas(&self) -> &HtmlCanvasElement {
        &self.canvas
    }

    fn gradient(&self, paint: &Paint) -> Option<CanvasGradient> {
        let (gradient, stops) = match paint {
            Paint::Solid(_) => return None,
            Paint::Linear { from, to, stops } => (
                self.ctx.create_linear_gradient(from.x, from.y, to.x, to.y),
                stops,
            ),
            Paint::Radial {
                center,
                inner_radius,
                outer_radius,
                stops,
            } => (
                self.ctx
                    .create_radial_gradient(
                        center.x,
                        center.y,
                        inner_radius.max(0.0),
                        center.x,
                        center.y,
                        outer_radius.max(0.0),
                    )
                    .ok()?,
                stops,
            ),
        };
        for GradientStop { offset, color } in stops {
            log_js_error(
                "gradient stop",
                gradient.add_color_stop(offset.clamp(0.0, 1.0) as f32, &color.to_css()),
            );
        }
        Some(gradient)
    }

    fn set_fill(&self, paint: &Paint) {
        match (paint, self.gradient(paint)) {
            (Paint::Solid(color), _) => self.ctx.set_fill_style_str(&color.to_css()),
            (_, Some(gradient)) => self.ctx.set_fill_style_canvas_gradient(&gradient),
            (_, None) => self.ctx.set_fill_style_str(&Rgba::TRANSPARENT.to_css()),
        }
    }

    fn upload(&mut self, bitmap: &Bitmap) -> Option<HtmlCanvasElement> {
        if let Some(hit) = self.uploads.iter().find(|u| u.key == bitmap.key()) {
            return Some(hit.canvas.clone());
        }
        let w = u32::try_from(bitmap.width()).ok()?;
        let h = u32::try_from(bitmap.height()).ok()?;
        let offscreen = self
            .document
            .create_element("canvas")
            .ok()?
            .dyn_into::<HtmlCanvasElement>()
            .ok()?;
        offscreen.set_width(w);
        offscreen.set_height(h);
        let ctx = context_2d(&offscreen)?;
        let bytes = bitmap.to_bytes();
        let data = ImageData::new_with_u8_clamped_array_and_sh(Clamped(&bytes), w, h).ok()?;
        log_js_error("bitmap upload", ctx.put_image_data(&data, 0.0, 0.0));

        if self.uploads.len() >= BITMAP_CACHE {
            self.uploads.remove(0);
        }
        self.uploads.push(Upload {
            key: bitmap.key(),
            canvas: offscreen.clone(),
        });
        Some(offscreen)
    }
}

impl Surface for CanvasSurface {
    fn viewport(&self) -> Viewport {
        self.viewport
    }

    fn resize(&mut self, viewport: Viewport) {
        let (bw, bh) = viewport.backing_size();
        self.viewport = viewport;
        self.canvas.set_width(bw);
        self.canvas.set_height(bh);
        let style = self.canvas.style();
        log_js_error(
            "canvas width style",
            style.set_property("width", &format!("{}px", viewport.width)),
        );
        log_js_error(
            "canvas height style",
            style.set_property("height", &format!("{}px", viewport.height)),
        );
        log_js_error(
            "dpr transform",
            self.ctx
                .set_transform(viewport.dpr, 0.0, 0.0, viewport.dpr, 0.0, 0.0),
        );
        self.uploads.clear();
    }

    fn clear(&mut self) {
        self.ctx.save();
        log_js_error("identity transform", self.ctx.set_transform(1.0, 0.0, 0.0, 1.0, 0.0, 0.0));
        self.ctx.clear_rect(
            0.0,
            0.0,
            f64::from(self.canvas.width()),
            f64::from(self.canvas.height()),
        );
        self.ctx.restore();
    }

    fn fill_rect(&mut self, origin: DVec2, size: DVec2, paint: &Paint) {
        self.set_fill(paint);
        self.ctx.fill_rect(origin.x, origin.y, size.x, size.y);
    }

    fn stroke_line(&mut self, from: DVec2, to: DVec2, width: f64, color: Rgba) {
        self.ctx.begin_path();
        self.ctx.move_to(from.x, from.y);
        self.ctx.line_to(to.x, to.y);
        self.ctx.set_line_width(width);
        self.ctx.set_stroke_style_str(&color.to_css());
        self.ctx.stroke();
    }

    fn fill_circle(&mut self, center: DVec2, radius: f64, paint: &Paint) {
        if !(radius.is_finite() && radius > 0.0) {
            return;
        }
        self.set_fill(paint);
        self.ctx.begin_path();
        log_js_error("arc", self.ctx.arc(center.x, center.y, radius, 0.0, TAU));
        self.ctx.fill();
    }

    fn stroke_circle(&mut self, center: DVec2, radius: f64, width: f64, color: Rgba) {
        if !(radius.is_finite() && radius >= 0.0) {
            return;
        }
        self.ctx.begin_path();
        log_js_error("arc", self.ctx.arc(center.x, center.y, radius, 0.0, TAU));
        self.ctx.set_line_width(width);
        self.ctx.set_stroke_style_str(&color.to_css());
        self.ctx.stroke();
    }

    fn draw_bitmap(&mut self, bitmap: &Bitmap, alpha: f64) {
        if bitmap.is_empty() {
            return;
        }
        let Some(offscreen) = self.upload(bitmap) else {
            return;
        };
        self.ctx.save();
        self.ctx
            .set_global_alpha(self.ctx.global_alpha() * alpha.clamp(0.0, 1.0));
        log_js_error(
            "draw bitmap",
            self.ctx.draw_image_with_html_canvas_element_and_dw_and_dh(
                &offscreen,
                0.0,
                0.0,
                self.viewport.width,
                self.viewport.height,
            ),
        );
        self.ctx.restore();
    }

    fn set_blend_mode(&mut self, mode: BlendMode) {
        log_js_error(
            "composite operation",
            self.ctx
                .set_global_composite_operation(mode.composite_operation()),
        );
    }

    fn set_global_alpha(&mut self, alpha: f64) {
        if alpha.is_finite() {
            self.ctx.set_global_alpha(alpha.clamp(0.0, 1.0));
        }
    }

    fn set_shadow(&mut self, blur: f64, color: Rgba) {
        self.ctx.set_shadow_blur(if blur.is_finite() { blur.max(0.0) } else { 0.0 });
        self.ctx.set_shadow_color(&color.to_css());
    }

    fn save(&mut self) {
        self.ctx.save();
    }

    fn restore(&mut self) {
        self.ctx.restore();
    }
}
