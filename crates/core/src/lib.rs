#![deny(unsafe_code)]
//! Core of the fieldglow flow-field background engine.
//!
//! Provides gradient noise (`PermutationNoise`, `NoiseSource`), the
//! `FlowField` lattice, the `ParticleSystem` with its advection and boundary
//! policies, the `SpatialHash` neighbour index, the transient `EffectOverlay`,
//! the `FlowScene` engine, and the `RenderDriver` that runs it against the
//! host `Surface` and `FrameScheduler` seams. Nothing here performs I/O.

pub mod backdrop;
pub mod color;
pub mod config;
pub mod debounce;
pub mod driver;
pub mod effect;
pub mod engine;
pub mod error;
pub mod field;
pub mod layers;
pub mod noise;
pub mod params;
pub mod particle;
pub mod prng;
pub mod scene;
pub mod spatial;
pub mod surface;
pub mod viewport;

pub use color::Rgba;
pub use config::{FieldConfig, GridConfig, NoiseConfig, ParticleConfig, RenderConfig};
pub use driver::{DriverConfig, FrameHandle, FrameScheduler, RenderDriver};
pub use effect::{
    EffectConfig, EffectKind, EffectOverlay, EffectVisual, TargetScorer, TargetSelection,
    TransientEffect,
};
pub use engine::{Engine, FrameContext};
pub use error::EngineError;
pub use field::{FlowField, GridPoint};
pub use layers::{BlendMode, Layer, LayerKind, LayerStack};
pub use noise::{NoiseKind, NoiseSource, PermutationNoise};
pub use particle::{AdvectionPolicy, BoundaryPolicy, Particle, ParticleSystem, SpringFlowParams};
pub use prng::Xorshift64;
pub use scene::FlowScene;
pub use spatial::SpatialHash;
pub use surface::{Bitmap, DrawCommand, GradientStop, Paint, RecordingSurface, Surface};
pub use viewport::Viewport;
