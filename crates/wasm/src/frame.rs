//! `requestAnimationFrame` as a [`FrameScheduler`].

use fieldglow_core::{FrameHandle, FrameScheduler};
use std::cell::RefCell;
use std::rc::Rc;
use tracing::warn;
use wasm_bindgen::closure::Closure;
use wasm_bindgen::JsCast;
use web_sys::Window;

/// Slot for the frame callback. Filled after the driver exists, since the
/// callback needs a handle back to it.
pub type FrameCallback = Rc<RefCell<Option<Closure<dyn FnMut(f64)>>>>;

pub struct AnimationFrameScheduler {
    window: Window,
    callback: FrameCallback,
}

impl AnimationFrameScheduler {
    pub fn new(window: Window, callback: FrameCallback) -> Self {
        Self { window, callback }
    }
}

impl FrameScheduler for AnimationFrameScheduler {
    fn request_frame(&mut self) -> FrameHandle {
        let slot = self.callback.borrow();
        let Some(closure) = slot.as_ref() else {
            return FrameHandle(0);
        };
        match self
            .window
            .request_animation_frame(closure.as_ref().unchecked_ref())
        {
            Ok(id) => FrameHandle(id as u32 as u64),
            Err(e) => {
                warn!(error = ?e, "requestAnimationFrame failed");
                FrameHandle(0)
            }
        }
    }

    fn cancel_frame(&mut self, handle: FrameHandle) {
        if handle.0 == 0 {
            return;
        }
        if let Err(e) = self.window.cancel_animation_frame(handle.0 as u32 as i32) {
            warn!(error = ?e, "cancelAnimationFrame failed");
        }
    }
}
