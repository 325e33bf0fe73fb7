//! The `Engine` trait driven by the render loop.
//!
//! The trait is object-safe so scenes can be used as `dyn Engine` when a host
//! switches between presets at runtime.

use crate::surface::Surface;
use crate::viewport::Viewport;
use glam::DVec2;
use serde_json::Value;

/// Per-frame inputs handed to an engine by the render driver.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameContext {
    /// Host timestamp of this frame in milliseconds. Monotonic.
    pub timestamp: f64,
    /// Milliseconds since the previous rendered frame; 0 on the first frame
    /// and after a visibility resume.
    pub dt_ms: f64,
    /// Count of rendered frames before this one.
    pub frame: u64,
    /// Latest sampled pointer position, `None` once the pointer has left.
    pub pointer: Option<DVec2>,
}

/// A real-time scene advanced and drawn once per rendered frame.
///
/// The driver calls [`tick`](Engine::tick) and then [`draw`](Engine::draw)
/// for the same [`FrameContext`]; simulation state must be fully updated
/// before compositing starts.
pub trait Engine {
    /// Advances simulation state for one frame. Never fails: faults degrade
    /// to a skipped update.
    fn tick(&mut self, ctx: &FrameContext);

    /// Composites the current state onto `surface`.
    fn draw(&self, surface: &mut dyn Surface, ctx: &FrameContext);

    /// Rebuilds everything derived from the viewport size.
    fn resize(&mut self, viewport: Viewport);

    /// Current parameter values as a JSON object.
    fn params(&self) -> Value;

    /// Schema describing all available parameters, their types, ranges, and defaults.
    fn param_schema(&self) -> Value;
}
