//! Compositing layers for a scene.
//!
//! A [`LayerStack`] always holds exactly one [`Layer`] per [`LayerKind`], in
//! the fixed order `Background → Grid → Particles → Overlay → Highlight`
//! (index 0 = bottom). Individual layers can be hidden, faded or given a
//! different blend mode, but never reordered.

use serde::{Deserialize, Serialize};

/// How a layer's pixels combine with what is already on the surface.
///
/// `Additive` makes overlapping strokes brighten rather than occlude.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlendMode {
    #[default]
    Normal,
    Additive,
    Screen,
}

impl BlendMode {
    /// Equivalent 2D-canvas `globalCompositeOperation`.
    pub fn composite_operation(self) -> &'static str {
        match self {
            BlendMode::Normal => "source-over",
            BlendMode::Additive => "lighter",
            BlendMode::Screen => "screen",
        }
    }
}

/// The content a layer draws. Declaration order is compositing order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerKind {
    /// Dim fill, scanlines, vignette and grain.
    Background,
    /// Baked dot grid and the periodic flow-vector strokes.
    Grid,
    Particles,
    /// Transient attention effects.
    Overlay,
    /// Soft glow under the pointer.
    Highlight,
}

impl LayerKind {
    pub const ALL: [LayerKind; 5] = [
        LayerKind::Background,
        LayerKind::Grid,
        LayerKind::Particles,
        LayerKind::Overlay,
        LayerKind::Highlight,
    ];

    pub fn name(self) -> &'static str {
        match self {
            LayerKind::Background => "background",
            LayerKind::Grid => "grid",
            LayerKind::Particles => "particles",
            LayerKind::Overlay => "overlay",
            LayerKind::Highlight => "highlight",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// A single layer in the stack.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Layer {
    kind: LayerKind,
    blend_mode: BlendMode,
    opacity: f64,
    visible: bool,
}

impl Layer {
    /// Defaults: `BlendMode::Normal`, opacity `1.0`, visible.
    pub fn new(kind: LayerKind) -> Self {
        Self {
            kind,
            blend_mode: BlendMode::Normal,
            opacity: 1.0,
            visible: true,
        }
    }

    pub fn kind(&self) -> LayerKind {
        self.kind
    }

    pub fn blend_mode(&self) -> BlendMode {
        self.blend_mode
    }

    pub fn set_blend_mode(&mut self, mode: BlendMode) {
        self.blend_mode = mode;
    }

    /// Opacity in [0.0, 1.0].
    pub fn opacity(&self) -> f64 {
        self.opacity
    }

    /// Sets the opacity, clamping to [0.0, 1.0]. NaN becomes 0.
    pub fn set_opacity(&mut self, opacity: f64) {
        self.opacity = clamp_unit(opacity);
    }

    pub fn visible(&self) -> bool {
        self.visible
    }

    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    pub fn with_blend_mode(mut self, mode: BlendMode) -> Self {
        self.blend_mode = mode;
        self
    }

    pub fn with_opacity(mut self, opacity: f64) -> Self {
        self.opacity = clamp_unit(opacity);
        self
    }

    pub fn with_visible(mut self, visible: bool) -> Self {
        self.visible = visible;
        self
    }

    /// Visible with non-zero opacity.
    pub fn is_drawn(&self) -> bool {
        self.visible && self.opacity > 0.0
    }
}

fn clamp_unit(v: f64) -> f64 {
    if v.is_nan() {
        0.0
    } else {
        v.clamp(0.0, 1.0)
    }
}

/// The fixed five-layer compositing stack.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LayerStack {
    layers: [Layer; 5],
}

impl LayerStack {
    /// Particles and overlay composite additively; everything else is normal.
    pub fn standard() -> Self {
        Self {
            layers: LayerKind::ALL.map(|kind| {
                let layer = Layer::new(kind);
                match kind {
                    LayerKind::Particles | LayerKind::Overlay => {
                        layer.with_blend_mode(BlendMode::Additive)
                    }
                    _ => layer,
                }
            }),
        }
    }

    pub fn layer(&self, kind: LayerKind) -> &Layer {
        &self.layers[kind.index()]
    }

    pub fn layer_mut(&mut self, kind: LayerKind) -> &mut Layer {
        &mut self.layers[kind.index()]
    }

    /// All layers bottom to top.
    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    /// Layers that will actually be composited, bottom to top.
    pub fn drawn(&self) -> impl Iterator<Item = &Layer> {
        self.layers.iter().filter(|l| l.is_drawn())
    }
}

impl Default for LayerStack {
    fn default() -> Self {
        Self::standard()
    }
}
