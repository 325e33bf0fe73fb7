#![deny(unsafe_code)]
//! Browser binding: mounts a preset as a full-window background on an HTML
//! canvas.
//!
//! ```js
//! const bg = FlowBackground.mount(canvas, "attention", "{}", 42);
//! // `bg` is undefined when the canvas has no 2D context.
//! bg?.unmount();
//! ```

mod canvas;
mod events;
mod frame;

use canvas::CanvasSurface;
use events::Listener;
use fieldglow_core::{DriverConfig, Engine, FlowScene, RenderDriver, Viewport};
use fieldglow_engines::PresetKind;
use frame::{AnimationFrameScheduler, FrameCallback};
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use tracing::{info, warn};
use wasm_bindgen::closure::Closure;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{Event, HtmlCanvasElement, MouseEvent, Window};

type WebDriver = RenderDriver<FlowScene, CanvasSurface, AnimationFrameScheduler>;
type TimerCallback = Rc<RefCell<Option<Closure<dyn FnMut()>>>>;

fn to_js(e: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&e.to_string())
}

fn now(window: &Window) -> f64 {
    window.performance().map_or(0.0, |p| p.now())
}

fn window_size(window: &Window) -> (f64, f64) {
    let read = |v: Result<JsValue, JsValue>| v.ok().and_then(|v| v.as_f64()).unwrap_or(0.0);
    (read(window.inner_width()), read(window.inner_height()))
}

fn prefers_reduced_motion(window: &Window) -> bool {
    window
        .match_media("(prefers-reduced-motion: reduce)")
        .ok()
        .flatten()
        .is_some_and(|q| q.matches())
}

/// Runs `f` on the driver unless it is gone or already borrowed.
fn with_driver(driver: &Weak<RefCell<WebDriver>>, f: impl FnOnce(&mut WebDriver)) {
    if let Some(driver) = driver.upgrade() {
        if let Ok(mut driver) = driver.try_borrow_mut() {
            f(&mut driver);
        }
    }
}

/// A mounted background. Dropping it or calling [`unmount`](Self::unmount)
/// cancels the pending frame and removes every listener.
#[wasm_bindgen]
pub struct FlowBackground {
    driver: Rc<RefCell<WebDriver>>,
    frame: FrameCallback,
    flush: TimerCallback,
    /// Handle of the armed resize timeout, if any.
    pending_flush: Rc<Cell<Option<i32>>>,
    window: Window,
    listeners: Vec<Listener>,
}

#[wasm_bindgen]
impl FlowBackground {
    /// Builds `preset` with flat JSON overrides and starts animating.
    ///
    /// Returns `undefined` when no 2D context is available and throws on an
    /// unknown preset or invalid parameters.
    pub fn mount(
        canvas: HtmlCanvasElement,
        preset: &str,
        params_json: &str,
        seed: u32,
    ) -> Result<Option<FlowBackground>, JsValue> {
        let window = web_sys::window().ok_or_else(|| to_js("no window"))?;
        let document = window.document().ok_or_else(|| to_js("no document"))?;
        let params: serde_json::Value = serde_json::from_str(params_json).map_err(to_js)?;
        let kind = PresetKind::from_name(preset).map_err(to_js)?;

        let mut config = kind.config();
        config.noise.seed = u64::from(seed);
        let mut config = config.with_overrides(&params);
        if prefers_reduced_motion(&window) {
            config.render.reduced_motion = true;
        }
        let (w, h) = window_size(&window);
        let viewport = Viewport::new(w, h, window.device_pixel_ratio(), config.render.max_dpr);
        let scene = FlowScene::new(config, viewport).map_err(to_js)?;

        let frame: FrameCallback = Rc::new(RefCell::new(None));
        let scheduler = AnimationFrameScheduler::new(window.clone(), Rc::clone(&frame));
        let surface = CanvasSurface::new(document.clone(), canvas.clone());
        let Some(driver) = RenderDriver::mount(
            scene,
            surface,
            scheduler,
            DriverConfig::from_render(&config.render, viewport),
        ) else {
            return Ok(None);
        };
        let driver = Rc::new(RefCell::new(driver));

        let weak = Rc::downgrade(&driver);
        *frame.borrow_mut() = Some(Closure::new(move |ts: f64| {
            with_driver(&weak, |d| {
                d.on_frame(ts);
            });
        }));

        let flush: TimerCallback = Rc::new(RefCell::new(None));
        let pending_flush: Rc<Cell<Option<i32>>> = Rc::new(Cell::new(None));
        let weak = Rc::downgrade(&driver);
        let timer_window = window.clone();
        let fired = Rc::clone(&pending_flush);
        *flush.borrow_mut() = Some(Closure::new(move || {
            fired.set(None);
            with_driver(&weak, |d| {
                d.flush_resize(now(&timer_window));
            });
        }));

        let mut listeners = Vec::new();
        let weak = Rc::downgrade(&driver);
        let target = canvas.clone();
        listeners.extend(Listener::attach(&window, "pointermove", move |e: Event| {
            if let Some(m) = e.dyn_ref::<MouseEvent>() {
                let rect = target.get_bounding_client_rect();
                let x = f64::from(m.client_x()) - rect.left();
                let y = f64::from(m.client_y()) - rect.top();
                with_driver(&weak, |d| d.on_pointer_move(x, y));
            }
        }));

        let weak = Rc::downgrade(&driver);
        listeners.extend(Listener::attach(&window, "pointerout", move |e: Event| {
            let left_window = e
                .dyn_ref::<MouseEvent>()
                .is_some_and(|m| m.related_target().is_none());
            if left_window {
                with_driver(&weak, |d| d.on_pointer_leave());
            }
        }));

        let weak = Rc::downgrade(&driver);
        let doc = document.clone();
        listeners.extend(Listener::attach(&document, "visibilitychange", move |_| {
            let visible = !doc.hidden();
            with_driver(&weak, |d| d.on_visibility(visible));
        }));

        let weak = Rc::downgrade(&driver);
        let resize_window = window.clone();
        let timer = Rc::clone(&flush);
        let pending = Rc::clone(&pending_flush);
        let debounce_ms = config.render.resize_debounce_ms;
        listeners.extend(Listener::attach(&window, "resize", move |_| {
            let (w, h) = window_size(&resize_window);
            let dpr = resize_window.device_pixel_ratio();
            let t = now(&resize_window);
            with_driver(&weak, |d| d.on_resize(w, h, dpr, t));
            if let Some(cb) = timer.borrow().as_ref() {
                if let Some(id) = pending.take() {
                    resize_window.clear_timeout_with_handle(id);
                }
                let delay = (debounce_ms.ceil() as i32).saturating_add(1);
                match resize_window.set_timeout_with_callback_and_timeout_and_arguments_0(
                    cb.as_ref().unchecked_ref(),
                    delay,
                ) {
                    Ok(id) => pending.set(Some(id)),
                    Err(e) => warn!(error = ?e, "setTimeout failed; resize applies on next frame"),
                }
            }
        }));

        driver.borrow_mut().start();
        info!(preset = kind.name(), "background mounted");
        Ok(Some(FlowBackground {
            driver,
            frame,
            flush,
            pending_flush,
            window,
            listeners,
        }))
    }

    pub fn start(&self) {
        if let Ok(mut d) = self.driver.try_borrow_mut() {
            d.start();
        }
    }

    pub fn stop(&self) {
        if let Ok(mut d) = self.driver.try_borrow_mut() {
            d.stop();
        }
    }

    /// Stops the loop for good and detaches from the page. Idempotent.
    pub fn unmount(&mut self) {
        if let Ok(mut d) = self.driver.try_borrow_mut() {
            d.teardown();
        }
        self.listeners.clear();
        if let Some(id) = self.pending_flush.take() {
            self.window.clear_timeout_with_handle(id);
        }
        self.frame.borrow_mut().take();
        self.flush.borrow_mut().take();
    }

    /// Current parameters as a JSON string.
    pub fn params(&self) -> String {
        self.driver.borrow().engine().params().to_string()
    }

    /// Parameter schema as a JSON string.
    #[wasm_bindgen(js_name = paramSchema)]
    pub fn param_schema(&self) -> String {
        self.driver.borrow().engine().param_schema().to_string()
    }

    /// Registered preset names as a JSON array string.
    pub fn presets() -> String {
        serde_json::Value::from(PresetKind::list_presets().to_vec()).to_string()
    }
}

impl Drop for FlowBackground {
    fn drop(&mut self) {
        self.unmount();
    }
}
