//! Renders a scene without a display: the render driver runs against a
//! [`RasterSurface`] and a [`ManualScheduler`] fired at a fixed frame rate.

use crate::raster::RasterSurface;
use crate::scheduler::ManualScheduler;
use fieldglow_core::error::EngineError;
use fieldglow_core::{DriverConfig, FlowScene, RenderDriver, Viewport};
use std::f64::consts::TAU;
use tracing::{debug, info};

pub type HeadlessDriver = RenderDriver<FlowScene, RasterSurface, ManualScheduler>;

/// Synthetic pointer input for a headless run.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub enum PointerPath {
    #[default]
    None,
    /// Left-to-right pass over the whole run along a gentle sine.
    Sweep,
    /// Resting at a fixed logical position.
    Fixed { x: f64, y: f64 },
}

impl PointerPath {
    /// Pointer position at `frame` of `frames`, or `None` when absent.
    pub fn at(self, frame: usize, frames: usize, viewport: Viewport) -> Option<(f64, f64)> {
        match self {
            PointerPath::None => None,
            PointerPath::Fixed { x, y } => Some((x, y)),
            PointerPath::Sweep => {
                let t = (frame as f64 + 0.5) / frames.max(1) as f64;
                let x = viewport.width * (0.05 + 0.9 * t);
                let y = viewport.height * (0.5 + 0.25 * (t * TAU).sin());
                Some((x, y))
            }
        }
    }
}

/// Settings for [`render_headless`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeadlessOptions {
    pub width: f64,
    pub height: f64,
    pub dpr: f64,
    pub frames: usize,
    /// Simulated display refresh rate.
    pub fps: f64,
    pub pointer: PointerPath,
}

impl Default for HeadlessOptions {
    fn default() -> Self {
        Self {
            width: 640.0,
            height: 360.0,
            dpr: 1.0,
            frames: 120,
            fps: 60.0,
            pointer: PointerPath::None,
        }
    }
}

/// Mounts `scene` and renders `options.frames` host callbacks.
///
/// The returned driver still owns the surface holding the last frame.
pub fn render_headless(
    scene: FlowScene,
    options: &HeadlessOptions,
) -> Result<HeadlessDriver, EngineError> {
    if !(options.fps.is_finite() && options.fps > 0.0) {
        return Err(EngineError::InvalidConfig(format!(
            "fps must be positive, got {}",
            options.fps
        )));
    }
    let render = scene.config().render;
    let viewport = Viewport::new(options.width, options.height, options.dpr, render.max_dpr);
    let mut config = DriverConfig::from_render(&render, viewport);
    // Callbacks already arrive at the simulated rate; pacing again would drop
    // frames to floating-point jitter in the timestamps.
    config.target_fps = 0.0;

    let surface = RasterSurface::new(viewport);
    let mut driver = RenderDriver::mount(scene, Some(surface), ManualScheduler::new(), config)
        .ok_or(EngineError::InvalidDimensions)?;
    driver.start();

    let interval = 1000.0 / options.fps;
    let mut rendered = 0;
    for frame in 0..options.frames {
        match options.pointer.at(frame, options.frames, driver.viewport()) {
            Some((x, y)) => driver.on_pointer_move(x, y),
            None => driver.on_pointer_leave(),
        }
        if driver.scheduler_mut().fire() && driver.on_frame(frame as f64 * interval) {
            rendered += 1;
        }
    }
    debug!(
        effects = driver.engine().overlay().len(),
        "headless run finished"
    );
    info!(
        frames = rendered,
        width = viewport.width,
        height = viewport.height,
        "headless render complete"
    );
    Ok(driver)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PresetKind;
    use serde_json::json;

    fn scene(preset: PresetKind, width: f64, height: f64) -> FlowScene {
        preset
            .build(Viewport::logical(width, height), 3, &json!({}))
            .unwrap()
    }

    #[test]
    fn renders_every_requested_frame() {
        let options = HeadlessOptions {
            width: 64.0,
            height: 48.0,
            frames: 12,
            ..HeadlessOptions::default()
        };
        let driver = render_headless(scene(PresetKind::Attention, 64.0, 48.0), &options).unwrap();
        assert_eq!(driver.frames_rendered(), 12);
        assert_eq!(driver.scheduler().pending(), 1);
        assert_eq!(driver.surface().width(), 64);
    }

    #[test]
    fn output_is_not_blank() {
        let options = HeadlessOptions {
            width: 64.0,
            height: 48.0,
            frames: 4,
            ..HeadlessOptions::default()
        };
        let driver = render_headless(scene(PresetKind::GentleSong, 64.0, 48.0), &options).unwrap();
        assert!(driver.surface().to_rgba8().iter().any(|&b| b > 0));
    }

    #[test]
    fn sweep_spawns_effects() {
        let options = HeadlessOptions {
            width: 200.0,
            height: 120.0,
            frames: 30,
            pointer: PointerPath::Sweep,
            ..HeadlessOptions::default()
        };
        let driver = render_headless(scene(PresetKind::Attention, 200.0, 120.0), &options).unwrap();
        assert!(driver.engine().overlay().last_spawn().is_some());
    }

    #[test]
    fn sweep_stays_inside_viewport() {
        let viewport = Viewport::logical(300.0, 200.0);
        for frame in 0..50 {
            let (x, y) = PointerPath::Sweep.at(frame, 50, viewport).unwrap();
            assert!((0.0..=300.0).contains(&x));
            assert!((0.0..=200.0).contains(&y));
        }
        assert_eq!(PointerPath::None.at(3, 50, viewport), None);
    }

    #[test]
    fn dpr_scales_backing_store() {
        let options = HeadlessOptions {
            width: 40.0,
            height: 30.0,
            dpr: 2.0,
            frames: 1,
            ..HeadlessOptions::default()
        };
        let driver = render_headless(scene(PresetKind::Attention, 40.0, 30.0), &options).unwrap();
        assert_eq!((driver.surface().width(), driver.surface().height()), (80, 60));
    }

    #[test]
    fn rejects_non_positive_fps() {
        let options = HeadlessOptions {
            fps: 0.0,
            ..HeadlessOptions::default()
        };
        let result = render_headless(scene(PresetKind::Attention, 10.0, 10.0), &options);
        assert!(matches!(result, Err(EngineError::InvalidConfig(_))));
    }
}
