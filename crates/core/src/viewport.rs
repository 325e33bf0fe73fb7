//! Logical viewport size plus device pixel ratio.

use serde::{Deserialize, Serialize};

/// Logical (CSS pixel) size of the rendering surface and its device pixel ratio.
///
/// Zero-sized viewports are valid and produce blank frames.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
    pub dpr: f64,
}

impl Viewport {
    /// Builds a viewport, sanitising every input.
    ///
    /// Negative or non-finite sizes become 0; `dpr` is clamped to `[1, max_dpr]`
    /// (a non-finite `dpr` becomes 1).
    pub fn new(width: f64, height: f64, dpr: f64, max_dpr: f64) -> Self {
        let size = |v: f64| if v.is_finite() { v.max(0.0) } else { 0.0 };
        let max_dpr = if max_dpr.is_finite() { max_dpr.max(1.0) } else { 1.0 };
        let dpr = if dpr.is_finite() { dpr.clamp(1.0, max_dpr) } else { 1.0 };
        Self {
            width: size(width),
            height: size(height),
            dpr,
        }
    }

    /// Viewport at device pixel ratio 1.
    pub fn logical(width: f64, height: f64) -> Self {
        Self::new(width, height, 1.0, 1.0)
    }

    /// Physical backing-store size, `floor(logical * dpr)`.
    pub fn backing_size(&self) -> (u32, u32) {
        let px = |v: f64| (v * self.dpr).floor().min(u32::MAX as f64) as u32;
        (px(self.width), px(self.height))
    }

    /// True when either side is zero, i.e. nothing can be drawn.
    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }

    /// Centre point in logical coordinates.
    pub fn center(&self) -> (f64, f64) {
        (self.width * 0.5, self.height * 0.5)
    }
}
