//! The render driver: owns the animation loop around an [`Engine`].
//!
//! The host forwards four kinds of events (frame callbacks, pointer samples,
//! visibility changes and resizes) and the driver turns them into ticks and
//! draws. It exclusively owns the surface handle, keeps at most one frame
//! callback pending, and cancels it on stop, teardown, hide and drop.
//!
//! Everything runs on the host's single event loop. Pointer and resize
//! handlers only record state; it is consumed by the next frame.

use crate::config::RenderConfig;
use crate::debounce::Debouncer;
use crate::engine::{Engine, FrameContext};
use crate::surface::Surface;
use crate::viewport::Viewport;
use glam::DVec2;
use tracing::{debug, info, trace, warn};

/// Identifies a scheduled frame callback so it can be cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameHandle(pub u64);

/// A "call me once before the next repaint" primitive.
///
/// When the callback fires, the host calls [`RenderDriver::on_frame`] with a
/// monotonically increasing timestamp in milliseconds.
pub trait FrameScheduler {
    fn request_frame(&mut self) -> FrameHandle;

    /// Cancelling an already fired or unknown handle is a no-op.
    fn cancel_frame(&mut self, handle: FrameHandle);
}

/// Driver settings taken from the host and [`RenderConfig`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DriverConfig {
    pub viewport: Viewport,
    /// Frame-rate ceiling; 0 renders on every callback.
    pub target_fps: f64,
    pub resize_debounce_ms: f64,
    pub max_dpr: f64,
}

impl DriverConfig {
    pub fn from_render(render: &RenderConfig, viewport: Viewport) -> Self {
        Self {
            viewport,
            target_fps: render.target_fps,
            resize_debounce_ms: render.resize_debounce_ms,
            max_dpr: render.max_dpr,
        }
    }

    /// Minimum milliseconds between rendered frames, 0 when uncapped.
    pub fn min_frame_interval(&self) -> f64 {
        if self.target_fps.is_finite() && self.target_fps > 0.0 {
            1000.0 / self.target_fps
        } else {
            0.0
        }
    }
}

/// Drives an engine onto a surface using a host frame scheduler.
pub struct RenderDriver<E: Engine, S: Surface, F: FrameScheduler> {
    engine: E,
    surface: S,
    scheduler: F,
    config: DriverConfig,
    viewport: Viewport,
    pending: Option<FrameHandle>,
    running: bool,
    visible: bool,
    torn_down: bool,
    last_rendered: Option<f64>,
    frames: u64,
    pointer: Option<DVec2>,
    resize: Debouncer<Viewport>,
}

impl<E: Engine, S: Surface, F: FrameScheduler> RenderDriver<E, S, F> {
    /// Binds an engine to a surface.
    ///
    /// Returns `None` when the host could not provide a drawing context; the
    /// caller then skips animation entirely.
    pub fn mount(
        mut engine: E,
        surface: Option<S>,
        scheduler: F,
        config: DriverConfig,
    ) -> Option<Self> {
        let Some(mut surface) = surface else {
            warn!("rendering context unavailable; background disabled");
            return None;
        };
        let viewport = Viewport::new(
            config.viewport.width,
            config.viewport.height,
            config.viewport.dpr,
            config.max_dpr,
        );
        surface.resize(viewport);
        engine.resize(viewport);
        info!(
            width = viewport.width,
            height = viewport.height,
            dpr = viewport.dpr,
            "render driver mounted"
        );
        Some(Self {
            engine,
            surface,
            scheduler,
            config,
            viewport,
            pending: None,
            running: false,
            visible: true,
            torn_down: false,
            last_rendered: None,
            frames: 0,
            pointer: None,
            resize: Debouncer::new(config.resize_debounce_ms),
        })
    }

    /// Begins the callback chain. No-op if already running or torn down.
    pub fn start(&mut self) {
        if self.torn_down || self.running {
            return;
        }
        self.running = true;
        if self.visible {
            self.schedule();
        }
        info!("render driver started");
    }

    /// Cancels the pending callback. Idempotent.
    pub fn stop(&mut self) {
        self.cancel_pending();
        if self.running {
            self.running = false;
            info!(frames = self.frames, "render driver stopped");
        }
    }

    /// Stops the loop for good; every later event is ignored.
    pub fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.stop();
        self.resize.cancel();
        self.pointer = None;
        self.torn_down = true;
        info!("render driver torn down");
    }

    /// Host frame callback. Returns true if a frame was rendered.
    pub fn on_frame(&mut self, timestamp: f64) -> bool {
        self.pending = None;
        if self.torn_down || !self.running || !self.visible {
            return false;
        }
        if let Some(viewport) = self.resize.poll(timestamp) {
            self.apply_resize(viewport);
        }

        let interval = self.config.min_frame_interval();
        if let Some(last) = self.last_rendered {
            if interval > 0.0 && timestamp - last < interval {
                trace!(timestamp, last, "frame skipped by pacing");
                self.schedule();
                return false;
            }
        }

        let dt_ms = self
            .last_rendered
            .map_or(0.0, |last| (timestamp - last).max(0.0));
        let ctx = FrameContext {
            timestamp,
            dt_ms,
            frame: self.frames,
            pointer: self.pointer,
        };
        self.engine.tick(&ctx);
        self.engine.draw(&mut self.surface, &ctx);
        self.frames += 1;
        self.last_rendered = Some(timestamp);
        self.schedule();
        true
    }

    /// Records the pointer position for the next frame.
    pub fn on_pointer_move(&mut self, x: f64, y: f64) {
        if self.torn_down {
            return;
        }
        let p = DVec2::new(x, y);
        self.pointer = p.is_finite().then_some(p);
    }

    pub fn on_pointer_leave(&mut self) {
        self.pointer = None;
    }

    /// Suspends scheduling while hidden and resumes cleanly when shown.
    ///
    /// The dt baseline is dropped on hide so the first frame after resume
    /// does not integrate the time spent hidden.
    pub fn on_visibility(&mut self, visible: bool) {
        if self.torn_down || visible == self.visible {
            return;
        }
        self.visible = visible;
        self.last_rendered = None;
        if visible {
            if self.running {
                self.schedule();
            }
            debug!("surface visible; resuming");
        } else {
            self.cancel_pending();
            debug!("surface hidden; suspended");
        }
    }

    /// Queues a viewport change. It is applied once no further resize has
    /// arrived for the debounce window.
    pub fn on_resize(&mut self, width: f64, height: f64, dpr: f64, now: f64) {
        if self.torn_down {
            return;
        }
        let viewport = Viewport::new(width, height, dpr, self.config.max_dpr);
        self.resize.push(viewport, now);
    }

    /// Applies a queued resize if its quiet window has elapsed at `now`.
    ///
    /// Lets a host timer apply resizes while no frames are firing.
    pub fn flush_resize(&mut self, now: f64) -> bool {
        if self.torn_down {
            return false;
        }
        match self.resize.poll(now) {
            Some(viewport) => {
                self.apply_resize(viewport);
                true
            }
            None => false,
        }
    }

    fn apply_resize(&mut self, viewport: Viewport) {
        if viewport == self.viewport {
            return;
        }
        self.viewport = viewport;
        self.surface.resize(viewport);
        self.engine.resize(viewport);
        let (bw, bh) = viewport.backing_size();
        info!(
            width = viewport.width,
            height = viewport.height,
            backing_width = bw,
            backing_height = bh,
            "resize applied"
        );
    }

    fn schedule(&mut self) {
        if self.pending.is_none() {
            self.pending = Some(self.scheduler.request_frame());
        }
    }

    fn cancel_pending(&mut self) {
        if let Some(handle) = self.pending.take() {
            self.scheduler.cancel_frame(handle);
        }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    pub fn scheduler(&self) -> &F {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut F {
        &mut self.scheduler
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    /// Handle of the callback currently scheduled, if any.
    pub fn pending_frame(&self) -> Option<FrameHandle> {
        self.pending
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames
    }

    pub fn pointer(&self) -> Option<DVec2> {
        self.pointer
    }

    pub fn has_pending_resize(&self) -> bool {
        self.resize.is_pending()
    }
}

impl<E: Engine, S: Surface, F: FrameScheduler> Drop for RenderDriver<E, S, F> {
    fn drop(&mut self) {
        self.cancel_pending();
    }
}
