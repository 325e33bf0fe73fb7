//! End-to-end checks: a scene mounted in the render driver, fed host events,
//! drawing into a recording surface.

use fieldglow_core::{
    DrawCommand, DriverConfig, EffectConfig, EffectKind, EffectOverlay, FieldConfig, FlowField,
    FlowScene, FrameHandle, FrameScheduler, LayerKind, PermutationNoise, RecordingSurface,
    RenderDriver, Viewport, Xorshift64,
};
use glam::DVec2;
use serde_json::{json, Value};

/// Hands out sequential handles and remembers what is outstanding.
#[derive(Debug, Default)]
struct TestScheduler {
    next: u64,
    outstanding: Vec<FrameHandle>,
    cancelled: usize,
}

impl FrameScheduler for TestScheduler {
    fn request_frame(&mut self) -> FrameHandle {
        self.next += 1;
        let handle = FrameHandle(self.next);
        self.outstanding.push(handle);
        handle
    }

    fn cancel_frame(&mut self, handle: FrameHandle) {
        let before = self.outstanding.len();
        self.outstanding.retain(|h| *h != handle);
        if self.outstanding.len() < before {
            self.cancelled += 1;
        }
    }
}

type Driver = RenderDriver<FlowScene, RecordingSurface, TestScheduler>;

fn mount(overrides: Value, width: f64, height: f64) -> Driver {
    let config = FieldConfig::default().with_overrides(&overrides);
    let viewport = Viewport::logical(width, height);
    let scene = FlowScene::new(config, viewport).unwrap();
    let driver_config = DriverConfig::from_render(&config.render, viewport);
    RenderDriver::mount(
        scene,
        Some(RecordingSurface::new(viewport)),
        TestScheduler::default(),
        driver_config,
    )
    .unwrap()
}

/// Fires the pending callback, mimicking the host, and reports whether it drew.
fn fire(driver: &mut Driver, timestamp: f64) -> bool {
    if let Some(handle) = driver.pending_frame() {
        driver.scheduler_mut().outstanding.retain(|h| *h != handle);
    }
    driver.on_frame(timestamp)
}

#[test]
fn lattice_for_800_by_600_at_spacing_40() {
    let field = FlowField::new(800.0, 600.0, 40.0);
    assert_eq!(field.cols(), 21);
    assert_eq!(field.rows(), 16);
    assert_eq!(field.len(), 21 * 16);
    for p in field.points() {
        assert_eq!(p.x % 40.0, 0.0);
        assert_eq!(p.y % 40.0, 0.0);
        assert!(p.x <= 800.0 && p.y <= 600.0);
    }
    let last = field.points()[field.len() - 1];
    assert_eq!((last.x, last.y), (800.0, 600.0));
}

#[test]
fn effect_at_lattice_point_decays_and_expires() {
    let mut field = FlowField::new(800.0, 600.0, 40.0);
    field.recompute(&PermutationNoise::from_seed(7), 0.009, 0.0);
    let mut overlay = EffectOverlay::new(EffectConfig {
        duration_ms: 700.0,
        ..EffectConfig::default()
    });
    let mut rng = Xorshift64::new(7);

    let created = overlay.try_spawn(DVec2::new(200.0, 200.0), 1000.0, &field, &mut rng);
    assert!(created > 0);
    for effect in overlay.effects() {
        assert_eq!(effect.from, DVec2::new(200.0, 200.0));
        assert!((effect.decay_ratio(1350.0) - 0.5).abs() <= 0.01);
        assert!(effect.decay_ratio(1350.0) < effect.decay_ratio(1630.0));
    }

    assert_eq!(overlay.visuals(1700.0).count(), 0);
    overlay.prune(1700.0);
    assert!(overlay.is_empty());
}

#[test]
fn burst_of_resizes_rebuilds_lattice_once() {
    let mut driver = mount(json!({"render_resize_debounce_ms": 120}), 800.0, 600.0);
    driver.start();
    let generation = driver.engine().field().generation();
    let old_points = driver.engine().field().points().to_vec();

    driver.on_resize(400.0, 300.0, 1.0, 100.0);
    driver.on_resize(400.0, 300.0, 1.0, 150.0);
    assert!(!driver.flush_resize(200.0));
    assert_eq!(driver.engine().field().generation(), generation);
    assert!(driver.flush_resize(270.0));
    assert!(!driver.flush_resize(400.0));

    let field = driver.engine().field();
    assert_eq!(field.generation(), generation + 1);
    let spacing = field.spacing();
    assert_eq!(field.cols(), (400.0_f64 / spacing).ceil() as usize + 1);
    assert_eq!(field.rows(), (300.0_f64 / spacing).ceil() as usize + 1);
    assert!(field.len() < old_points.len());
    assert!(field
        .points()
        .iter()
        .all(|p| p.x <= 400.0 + spacing && p.y <= 300.0 + spacing));
    assert_eq!(driver.viewport(), Viewport::logical(400.0, 300.0));
    assert!(driver
        .engine()
        .particles()
        .particles()
        .iter()
        .all(|p| p.pos.x <= 400.0 && p.pos.y <= 300.0));
}

#[test]
fn frames_draw_layers_in_order() {
    let mut driver = mount(
        json!({"grid_draw_vectors": true, "render_highlight": true, "render_target_fps": 0}),
        320.0,
        240.0,
    );
    driver.start();
    driver.on_pointer_move(100.0, 100.0);
    assert!(fire(&mut driver, 16.0));

    let commands = driver.surface().commands();
    let first_clear = commands
        .iter()
        .position(|c| *c == DrawCommand::Clear)
        .unwrap();
    let saves = commands.iter().filter(|c| **c == DrawCommand::Save).count();
    let drawn = driver.engine().layers().drawn().count();
    assert_eq!(saves, drawn);
    assert!(commands[first_clear..]
        .iter()
        .any(|c| matches!(c, DrawCommand::FillRect { .. })));
    assert!(commands
        .iter()
        .any(|c| matches!(c, DrawCommand::StrokeLine { .. })));
    assert_eq!(
        driver
            .surface()
            .count(|c| matches!(c, DrawCommand::FillCircle { .. })),
        driver.engine().particles().len() + 1 + effect_sparks(&driver)
    );
    assert!(driver.engine().layers().layer(LayerKind::Highlight).is_drawn());
}

fn effect_sparks(driver: &Driver) -> usize {
    driver
        .engine()
        .overlay()
        .effects()
        .iter()
        .filter(|e| matches!(e.kind, EffectKind::Line { .. }))
        .count()
}

#[test]
fn pointer_over_lattice_spawns_effects_through_the_driver() {
    let mut driver = mount(json!({"render_target_fps": 0}), 400.0, 400.0);
    driver.start();
    driver.on_pointer_move(56.0, 56.0);
    fire(&mut driver, 1000.0);
    let live = driver.engine().overlay().len();
    assert!(live > 0);

    driver.on_pointer_leave();
    fire(&mut driver, 1100.0);
    assert_eq!(driver.engine().overlay().len(), live);
    assert_eq!(driver.engine().pointer(), None);

    fire(&mut driver, 2000.0);
    assert!(driver.engine().overlay().is_empty());
}

#[test]
fn hidden_surface_suspends_then_resumes() {
    let mut driver = mount(json!({"render_target_fps": 0}), 200.0, 200.0);
    driver.start();
    fire(&mut driver, 0.0);
    fire(&mut driver, 16.0);
    let frames = driver.frames_rendered();

    driver.on_visibility(false);
    assert!(driver.pending_frame().is_none());
    assert!(driver.scheduler().outstanding.is_empty());
    assert!(!driver.on_frame(5_000.0));
    assert_eq!(driver.frames_rendered(), frames);

    driver.on_visibility(true);
    assert!(driver.pending_frame().is_some());
    assert!(fire(&mut driver, 60_000.0));
    assert_eq!(driver.frames_rendered(), frames + 1);
}

#[test]
fn teardown_cancels_and_ignores_later_events() {
    let mut driver = mount(json!({}), 200.0, 200.0);
    driver.start();
    assert_eq!(driver.scheduler().outstanding.len(), 1);

    driver.teardown();
    driver.teardown();
    assert!(driver.scheduler().outstanding.is_empty());
    assert_eq!(driver.scheduler().cancelled, 1);

    driver.start();
    driver.on_pointer_move(10.0, 10.0);
    driver.on_resize(50.0, 50.0, 1.0, 0.0);
    assert!(!driver.on_frame(100.0));
    assert!(!driver.flush_resize(10_000.0));
    assert!(driver.pending_frame().is_none());
    assert_eq!(driver.pointer(), None);
    assert_eq!(driver.viewport(), Viewport::logical(200.0, 200.0));
}

#[test]
fn unavailable_context_skips_setup() {
    let config = FieldConfig::default();
    let viewport = Viewport::logical(100.0, 100.0);
    let scene = FlowScene::new(config, viewport).unwrap();
    let driver: Option<Driver> = RenderDriver::mount(
        scene,
        None,
        TestScheduler::default(),
        DriverConfig::from_render(&config.render, viewport),
    );
    assert!(driver.is_none());
}

#[test]
fn zero_sized_viewport_draws_blank_frames() {
    let mut driver = mount(json!({"render_target_fps": 0}), 0.0, 0.0);
    driver.start();
    driver.on_pointer_move(0.0, 0.0);
    assert!(fire(&mut driver, 16.0));
    assert!(driver.engine().field().is_empty());
    let commands = driver.surface().commands();
    assert_eq!(commands.last(), Some(&DrawCommand::Clear));
}

#[test]
fn same_seed_and_events_reproduce_the_same_frame() {
    let run = || {
        let mut driver = mount(json!({"noise_seed": 99, "render_target_fps": 0}), 300.0, 200.0);
        driver.start();
        for i in 0..20 {
            driver.on_pointer_move(20.0 + i as f64 * 12.0, 100.0);
            fire(&mut driver, i as f64 * 16.0);
        }
        driver.surface_mut().take_commands()
    };
    assert_eq!(run(), run());
}
