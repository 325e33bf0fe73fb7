//! Fixed-size particle pool advected through the flow field.
//!
//! Two interchangeable advection policies are supported, selected once at
//! construction:
//!
//! - [`AdvectionPolicy::FieldFollowing`]: move at a fixed speed along the
//!   nearest lattice angle. No persistent velocity.
//! - [`AdvectionPolicy::SpringFlow`]: integrate a persistent velocity from a
//!   spring toward the nearest lattice point, sine drift terms, noise jitter
//!   and neighbour repulsion, then damp and clamp it.
//!
//! Particles are never destroyed. A particle that leaves the margin-extended
//! canvas is wrapped or respawned according to [`BoundaryPolicy`], so the
//! population is constant.

use crate::field::FlowField;
use crate::noise::NoiseSource;
use crate::prng::Xorshift64;
use crate::spatial::SpatialHash;
use glam::DVec2;
use serde::{Deserialize, Serialize};
use std::f64::consts::TAU;

/// Frames-per-second the per-step constants were tuned at.
const REFERENCE_FPS: f64 = 60.0;

/// What happens to a particle that leaves the canvas plus margin.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundaryPolicy {
    /// Teleport to the opposite edge, just outside the canvas.
    Wrap,
    /// Re-randomise inside the canvas.
    #[default]
    Respawn,
}

/// Tunables for the spring/flow/noise composite.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpringFlowParams {
    /// Pull toward the nearest lattice point, per pixel of offset.
    pub spring_k: f64,
    /// Fraction of velocity removed every step.
    pub damping: f64,
    /// Hard cap on speed, in pixels per reference frame.
    pub speed_limit: f64,
    pub repulsion_radius: f64,
    pub repulsion_strength: f64,
    /// Amplitude of each particle's own sine drift.
    pub flow_strength: f64,
    /// Amplitude of the field-wide wave.
    pub wave_amplitude: f64,
    /// Phase speed of the per-particle drift, radians per second.
    pub drift_speed: f64,
    pub wave_frequency: f64,
    /// Relative size oscillation; 0 disables breathing.
    pub breathing_amplitude: f64,
    pub breathing_speed: f64,
    pub noise_strength: f64,
    pub noise_speed: f64,
    /// Spatial frequency of the jitter noise.
    pub ripple_scale: f64,
}

impl Default for SpringFlowParams {
    fn default() -> Self {
        Self {
            spring_k: 0.003,
            damping: 0.08,
            speed_limit: 1.8,
            repulsion_radius: 16.0,
            repulsion_strength: 0.02,
            flow_strength: 0.025,
            wave_amplitude: 0.035,
            drift_speed: 0.15,
            wave_frequency: 0.3,
            breathing_amplitude: 0.18,
            breathing_speed: 0.4,
            noise_strength: 0.015,
            noise_speed: 0.08,
            ripple_scale: 0.001,
        }
    }
}

/// How particle positions are advanced each frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AdvectionPolicy {
    /// Fixed-speed motion along the nearest lattice angle.
    FieldFollowing {
        /// Pixels per reference frame.
        speed: f64,
    },
    /// Persistent velocity integrated from a sum of forces.
    SpringFlow(SpringFlowParams),
}

impl Default for AdvectionPolicy {
    fn default() -> Self {
        AdvectionPolicy::FieldFollowing { speed: 1.0 }
    }
}

/// A single point mass. Recycled in place, never removed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Particle {
    pub pos: DVec2,
    pub vel: DVec2,
    pub base_size: f64,
    /// Current draw radius, after breathing.
    pub size: f64,
    pub flow_phase: f64,
    pub breath_phase: f64,
}

/// Per-frame inputs to [`ParticleSystem::advance`].
pub struct AdvanceContext<'a> {
    /// Milliseconds since the previous tick; clamped before use.
    pub dt_ms: f64,
    /// Scene time in seconds, used by the periodic drift terms.
    pub time: f64,
    pub field: &'a FlowField,
    pub noise: &'a NoiseSource,
}

/// The particle pool plus the state needed to advance it.
#[derive(Debug, Clone)]
pub struct ParticleSystem {
    particles: Vec<Particle>,
    count: usize,
    radius: f64,
    width: f64,
    height: f64,
    margin: f64,
    max_dt_ms: f64,
    policy: AdvectionPolicy,
    boundary: BoundaryPolicy,
    spatial: SpatialHash,
    forces: Vec<DVec2>,
}

impl ParticleSystem {
    /// Creates `count` particles uniformly distributed over the canvas.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        count: usize,
        radius: f64,
        width: f64,
        height: f64,
        margin: f64,
        max_dt_ms: f64,
        policy: AdvectionPolicy,
        boundary: BoundaryPolicy,
        rng: &mut Xorshift64,
    ) -> Self {
        let cell = match policy {
            AdvectionPolicy::SpringFlow(p) => p.repulsion_radius,
            AdvectionPolicy::FieldFollowing { .. } => 1.0,
        };
        let mut system = Self {
            particles: Vec::with_capacity(count),
            count,
            radius,
            width: width.max(0.0),
            height: height.max(0.0),
            margin: margin.max(0.0),
            max_dt_ms: max_dt_ms.max(0.0),
            policy,
            boundary,
            spatial: SpatialHash::new(cell),
            forces: Vec::with_capacity(count),
        };
        system.populate(rng);
        system
    }

    /// Rebuilds the whole pool for new canvas dimensions.
    pub fn resize(&mut self, width: f64, height: f64, rng: &mut Xorshift64) {
        self.width = width.max(0.0);
        self.height = height.max(0.0);
        self.populate(rng);
    }

    fn populate(&mut self, rng: &mut Xorshift64) {
        self.particles.clear();
        for _ in 0..self.count {
            let particle = self.spawn(rng);
            self.particles.push(particle);
        }
    }

    fn spawn(&self, rng: &mut Xorshift64) -> Particle {
        let pos = DVec2::new(rng.next_range(0.0, self.width), rng.next_range(0.0, self.height));
        let heading = rng.next_angle();
        let base_size = match self.policy {
            AdvectionPolicy::SpringFlow(_) => self.radius * rng.next_range(0.75, 1.55),
            AdvectionPolicy::FieldFollowing { .. } => self.radius,
        };
        let vel = match self.policy {
            AdvectionPolicy::SpringFlow(_) => DVec2::from_angle(heading) * 0.2,
            AdvectionPolicy::FieldFollowing { .. } => DVec2::ZERO,
        };
        Particle {
            pos,
            vel,
            base_size,
            size: base_size,
            flow_phase: rng.next_angle(),
            breath_phase: rng.next_angle(),
        }
    }

    /// Advances every particle one tick, then resolves the boundary.
    ///
    /// Cost is O(n) for field-following and O(n·k) for the composite, where k
    /// is the neighbour count inside the repulsion radius.
    pub fn advance(&mut self, ctx: &AdvanceContext<'_>, rng: &mut Xorshift64) {
        if self.particles.is_empty() {
            return;
        }
        let dt_ms = if ctx.dt_ms.is_finite() {
            ctx.dt_ms.clamp(0.0, self.max_dt_ms)
        } else {
            0.0
        };
        let dt = dt_ms / 1000.0;
        let step = dt * REFERENCE_FPS;

        match self.policy {
            AdvectionPolicy::FieldFollowing { speed } => {
                for p in &mut self.particles {
                    let angle = ctx.field.angle_at(p.pos.x, p.pos.y);
                    p.vel = DVec2::from_angle(angle) * speed;
                    p.pos += p.vel * step;
                }
            }
            AdvectionPolicy::SpringFlow(params) => self.advance_composite(&params, ctx, dt, step),
        }

        for i in 0..self.particles.len() {
            self.resolve_boundary(i, rng);
        }
    }

    fn advance_composite(
        &mut self,
        params: &SpringFlowParams,
        ctx: &AdvanceContext<'_>,
        dt: f64,
        step: f64,
    ) {
        let time = ctx.time;
        let repel = params.repulsion_radius > 0.0 && params.repulsion_strength != 0.0;
        if repel {
            self.spatial.rebuild(self.particles.iter().map(|p| p.pos));
        }

        let global_wave = DVec2::new(
            (time * params.wave_frequency).sin() * params.wave_amplitude,
            (time * params.wave_frequency * 0.8 + 1.2).cos() * params.wave_amplitude,
        );

        for p in &mut self.particles {
            p.flow_phase += params.drift_speed * dt;
            p.breath_phase += params.breathing_speed * dt;
        }

        // Forces are computed from frame-start positions, then applied.
        self.forces.clear();
        for (i, p) in self.particles.iter().enumerate() {
            let mut f = DVec2::ZERO;

            if let Some(anchor) = ctx.field.snap(p.pos.x, p.pos.y) {
                f += (DVec2::new(anchor.x, anchor.y) - p.pos) * params.spring_k;
            }

            f.x += (p.flow_phase + p.pos.x * 0.008).sin() * params.flow_strength;
            f.y += (p.flow_phase * 0.7 + p.pos.y * 0.006 + 2.1).cos() * params.flow_strength;
            f += global_wave;

            let cross = (time * 0.25 + (p.pos.x + p.pos.y) * 0.005).sin() * params.flow_strength * 0.6;
            f.x += cross * (time * 0.18).cos();
            f.y += cross * (time * 0.22).sin();

            let rs = params.ripple_scale;
            let ns = params.noise_speed;
            let n1 = ctx
                .noise
                .sample(p.pos.x * rs + time * ns, p.pos.y * rs + time * ns * 0.8, 0.0);
            let n2 = ctx.noise.sample(
                p.pos.x * rs + time * ns * 1.3 + 100.0,
                p.pos.y * rs + time * ns * 0.9 + 200.0,
                0.0,
            );
            f.x += (n1 * TAU).cos() * params.noise_strength;
            f.y += (n2 * TAU).sin() * params.noise_strength;

            if repel {
                let radius = params.repulsion_radius;
                let particles = &self.particles;
                self.spatial.for_each_neighbor(p.pos, |j| {
                    if j == i {
                        return;
                    }
                    let offset = p.pos - particles[j].pos;
                    let r = offset.length() + 1e-6;
                    if r < radius {
                        let push = (1.0 - r / radius) * params.repulsion_strength;
                        f += offset / r * push;
                    }
                });
            }

            self.forces.push(f);
        }

        let keep = 1.0 - params.damping.clamp(0.0, 1.0);
        for (p, f) in self.particles.iter_mut().zip(&self.forces) {
            p.vel = (p.vel + *f * step) * keep;
            p.vel = p.vel.clamp_length_max(params.speed_limit.max(0.0));
            p.pos += p.vel * step;
            p.size = p.base_size * (1.0 + p.breath_phase.sin() * params.breathing_amplitude);
        }
    }

    fn resolve_boundary(&mut self, i: usize, rng: &mut Xorshift64) {
        let (w, h, m) = (self.width, self.height, self.margin);
        let p = self.particles[i].pos;
        if !p.x.is_finite() || !p.y.is_finite() {
            let fresh = self.spawn(rng);
            self.particles[i] = fresh;
            return;
        }
        match self.boundary {
            BoundaryPolicy::Wrap => {
                let particle = &mut self.particles[i];
                if particle.pos.x < -m {
                    particle.pos.x = w + m;
                } else if particle.pos.x > w + m {
                    particle.pos.x = -m;
                }
                if particle.pos.y < -m {
                    particle.pos.y = h + m;
                } else if particle.pos.y > h + m {
                    particle.pos.y = -m;
                }
            }
            BoundaryPolicy::Respawn => {
                if p.x < -m || p.x > w + m || p.y < -m || p.y > h + m {
                    let particle = &mut self.particles[i];
                    particle.pos = DVec2::new(rng.next_range(0.0, w), rng.next_range(0.0, h));
                    particle.vel = DVec2::ZERO;
                }
            }
        }
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    pub fn len(&self) -> usize {
        self.particles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    pub fn policy(&self) -> AdvectionPolicy {
        self.policy
    }

    pub fn boundary(&self) -> BoundaryPolicy {
        self.boundary
    }

    pub fn margin(&self) -> f64 {
        self.margin
    }

    /// True when `p` lies in `[-margin, width + margin] x [-margin, height + margin]`.
    pub fn contains(&self, p: DVec2) -> bool {
        let m = self.margin;
        p.x >= -m && p.x <= self.width + m && p.y >= -m && p.y <= self.height + m
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::noise::NoiseKind;

    fn field(w: f64, h: f64) -> FlowField {
        let mut f = FlowField::new(w, h, 28.0);
        f.recompute(&NoiseSource::new(NoiseKind::Permutation, 3), 0.009, 0.0);
        f
    }

    fn system(policy: AdvectionPolicy, boundary: BoundaryPolicy, count: usize) -> ParticleSystem {
        let mut rng = Xorshift64::new(42);
        ParticleSystem::new(count, 1.0, 800.0, 600.0, 10.0, 40.0, policy, boundary, &mut rng)
    }

    fn run(sys: &mut ParticleSystem, frames: usize, dt_ms: f64) {
        let field = field(800.0, 600.0);
        let noise = NoiseSource::new(NoiseKind::Permutation, 3);
        let mut rng = Xorshift64::new(9);
        for frame in 0..frames {
            let ctx = AdvanceContext {
                dt_ms,
                time: frame as f64 / 60.0,
                field: &field,
                noise: &noise,
            };
            sys.advance(&ctx, &mut rng);
        }
    }

    #[test]
    fn initial_particles_lie_inside_canvas() {
        let sys = system(AdvectionPolicy::default(), BoundaryPolicy::Respawn, 200);
        assert_eq!(sys.len(), 200);
        assert!(sys
            .particles()
            .iter()
            .all(|p| (0.0..=800.0).contains(&p.pos.x) && (0.0..=600.0).contains(&p.pos.y)));
    }

    #[test]
    fn population_is_constant_for_every_policy() {
        for policy in [
            AdvectionPolicy::FieldFollowing { speed: 3.0 },
            AdvectionPolicy::SpringFlow(SpringFlowParams::default()),
        ] {
            for boundary in [BoundaryPolicy::Wrap, BoundaryPolicy::Respawn] {
                let mut sys = system(policy, boundary, 150);
                run(&mut sys, 600, 16.7);
                assert_eq!(sys.len(), 150, "{policy:?} / {boundary:?}");
            }
        }
    }

    #[test]
    fn particles_stay_within_margin_bounds() {
        for boundary in [BoundaryPolicy::Wrap, BoundaryPolicy::Respawn] {
            let mut sys = system(AdvectionPolicy::FieldFollowing { speed: 25.0 }, boundary, 100);
            let field = field(800.0, 600.0);
            let noise = NoiseSource::new(NoiseKind::Permutation, 3);
            let mut rng = Xorshift64::new(1);
            for frame in 0..400 {
                let ctx = AdvanceContext {
                    dt_ms: 40.0,
                    time: frame as f64,
                    field: &field,
                    noise: &noise,
                };
                sys.advance(&ctx, &mut rng);
                for p in sys.particles() {
                    assert!(sys.contains(p.pos), "{boundary:?} escaped: {:?}", p.pos);
                }
            }
        }
    }

    #[test]
    fn large_dt_is_clamped() {
        let mut slow = system(AdvectionPolicy::FieldFollowing { speed: 1.0 }, BoundaryPolicy::Wrap, 20);
        let mut fast = slow.clone();
        run(&mut slow, 1, 40.0);
        run(&mut fast, 1, 5_000.0);
        assert_eq!(slow.particles(), fast.particles());
    }

    #[test]
    fn non_finite_or_negative_dt_does_not_move() {
        let mut sys = system(AdvectionPolicy::FieldFollowing { speed: 1.0 }, BoundaryPolicy::Wrap, 20);
        let before: Vec<DVec2> = sys.particles().iter().map(|p| p.pos).collect();
        run(&mut sys, 1, f64::NAN);
        run(&mut sys, 1, -30.0);
        let after: Vec<DVec2> = sys.particles().iter().map(|p| p.pos).collect();
        assert_eq!(before, after);
    }

    #[test]
    fn field_following_moves_along_lattice_angle() {
        let mut sys = system(AdvectionPolicy::FieldFollowing { speed: 2.0 }, BoundaryPolicy::Wrap, 5);
        let field = field(800.0, 600.0);
        let start: Vec<DVec2> = sys.particles().iter().map(|p| p.pos).collect();
        let noise = NoiseSource::new(NoiseKind::Permutation, 3);
        let ctx = AdvanceContext {
            dt_ms: 1000.0 / 60.0,
            time: 0.0,
            field: &field,
            noise: &noise,
        };
        sys.advance(&ctx, &mut Xorshift64::new(1));
        for (p, s) in sys.particles().iter().zip(start) {
            let expected = s + DVec2::from_angle(field.angle_at(s.x, s.y)) * 2.0;
            assert!(p.pos.distance(expected) < 1e-9, "{:?} vs {expected:?}", p.pos);
        }
    }

    #[test]
    fn wrap_teleports_to_opposite_edge() {
        let mut sys = system(AdvectionPolicy::FieldFollowing { speed: 0.0 }, BoundaryPolicy::Wrap, 1);
        sys.particles[0].pos = DVec2::new(-10.5, 300.0);
        sys.resolve_boundary(0, &mut Xorshift64::new(1));
        assert_eq!(sys.particles()[0].pos, DVec2::new(810.0, 300.0));
        sys.particles[0].pos = DVec2::new(400.0, 611.0);
        sys.resolve_boundary(0, &mut Xorshift64::new(1));
        assert_eq!(sys.particles()[0].pos, DVec2::new(400.0, -10.0));
    }

    #[test]
    fn respawn_places_particle_inside_canvas() {
        let mut sys = system(AdvectionPolicy::FieldFollowing { speed: 0.0 }, BoundaryPolicy::Respawn, 1);
        sys.particles[0].pos = DVec2::new(-50.0, -50.0);
        sys.resolve_boundary(0, &mut Xorshift64::new(5));
        let p = sys.particles()[0].pos;
        assert!((0.0..=800.0).contains(&p.x) && (0.0..=600.0).contains(&p.y));
    }

    #[test]
    fn non_finite_position_is_recycled() {
        let mut sys = system(AdvectionPolicy::FieldFollowing { speed: 0.0 }, BoundaryPolicy::Wrap, 1);
        sys.particles[0].pos = DVec2::new(f64::NAN, 1.0);
        sys.resolve_boundary(0, &mut Xorshift64::new(5));
        assert!(sys.contains(sys.particles()[0].pos));
    }

    #[test]
    fn composite_respects_speed_limit() {
        let params = SpringFlowParams {
            speed_limit: 0.5,
            flow_strength: 5.0,
            ..SpringFlowParams::default()
        };
        let mut sys = system(AdvectionPolicy::SpringFlow(params), BoundaryPolicy::Wrap, 80);
        run(&mut sys, 120, 16.0);
        for p in sys.particles() {
            assert!(p.vel.length() <= 0.5 + 1e-9, "speed {}", p.vel.length());
        }
    }

    #[test]
    fn repulsion_pushes_close_particles_apart() {
        let params = SpringFlowParams {
            spring_k: 0.0,
            flow_strength: 0.0,
            wave_amplitude: 0.0,
            noise_strength: 0.0,
            damping: 0.0,
            repulsion_strength: 0.5,
            ..SpringFlowParams::default()
        };
        let mut sys = system(AdvectionPolicy::SpringFlow(params), BoundaryPolicy::Wrap, 2);
        sys.particles[0].pos = DVec2::new(400.0, 300.0);
        sys.particles[1].pos = DVec2::new(404.0, 300.0);
        for p in &mut sys.particles {
            p.vel = DVec2::ZERO;
        }
        run(&mut sys, 1, 16.0);
        let gap = sys.particles()[1].pos.x - sys.particles()[0].pos.x;
        assert!(gap > 4.0, "gap shrank or stayed: {gap}");
    }

    #[test]
    fn breathing_changes_size_around_base() {
        let mut sys = system(
            AdvectionPolicy::SpringFlow(SpringFlowParams::default()),
            BoundaryPolicy::Wrap,
            10,
        );
        run(&mut sys, 30, 16.0);
        for p in sys.particles() {
            let ratio = p.size / p.base_size;
            assert!((0.82 - 1e-9..=1.18 + 1e-9).contains(&ratio), "ratio {ratio}");
        }
    }

    #[test]
    fn zero_particles_and_zero_canvas_are_valid() {
        let mut empty = system(AdvectionPolicy::default(), BoundaryPolicy::Respawn, 0);
        run(&mut empty, 5, 16.0);
        assert!(empty.is_empty());

        let mut rng = Xorshift64::new(1);
        let mut flat = ParticleSystem::new(
            10,
            1.0,
            0.0,
            0.0,
            10.0,
            40.0,
            AdvectionPolicy::FieldFollowing { speed: 3.0 },
            BoundaryPolicy::Respawn,
            &mut rng,
        );
        let field = FlowField::new(0.0, 0.0, 28.0);
        let noise = NoiseSource::new(NoiseKind::Permutation, 1);
        for _ in 0..50 {
            let ctx = AdvanceContext {
                dt_ms: 16.0,
                time: 0.0,
                field: &field,
                noise: &noise,
            };
            flat.advance(&ctx, &mut rng);
        }
        assert_eq!(flat.len(), 10);
        assert!(flat.particles().iter().all(|p| flat.contains(p.pos)));
    }

    #[test]
    fn resize_rebuilds_pool_at_configured_count() {
        let mut sys = system(AdvectionPolicy::default(), BoundaryPolicy::Respawn, 64);
        sys.resize(100.0, 50.0, &mut Xorshift64::new(2));
        assert_eq!(sys.len(), 64);
        assert!(sys
            .particles()
            .iter()
            .all(|p| p.pos.x <= 100.0 && p.pos.y <= 50.0));
    }

    #[test]
    fn policy_serde_uses_kind_tag() {
        let json = serde_json::to_value(AdvectionPolicy::FieldFollowing { speed: 1.5 }).unwrap();
        assert_eq!(json["kind"], "field_following");
        let back: AdvectionPolicy =
            serde_json::from_value(serde_json::json!({"kind": "spring_flow", "damping": 0.2})).unwrap();
        match back {
            AdvectionPolicy::SpringFlow(p) => {
                assert_eq!(p.damping, 0.2);
                assert_eq!(p.spring_k, SpringFlowParams::default().spring_k);
            }
            other => panic!("unexpected policy {other:?}"),
        }
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn containment_holds_for_any_dt_sequence(
                seed: u64,
                dts in prop::collection::vec(-100.0_f64..500.0, 1..60),
                wrap: bool,
                speed in 0.0_f64..40.0,
            ) {
                let boundary = if wrap { BoundaryPolicy::Wrap } else { BoundaryPolicy::Respawn };
                let mut rng = Xorshift64::new(seed);
                let mut sys = ParticleSystem::new(
                    40, 1.0, 320.0, 240.0, 10.0, 40.0,
                    AdvectionPolicy::FieldFollowing { speed },
                    boundary,
                    &mut rng,
                );
                let field = field(320.0, 240.0);
                let noise = NoiseSource::new(NoiseKind::Permutation, seed);
                for (i, dt_ms) in dts.iter().enumerate() {
                    let ctx = AdvanceContext { dt_ms: *dt_ms, time: i as f64, field: &field, noise: &noise };
                    sys.advance(&ctx, &mut rng);
                    prop_assert_eq!(sys.len(), 40);
                    for p in sys.particles() {
                        prop_assert!(sys.contains(p.pos), "escaped: {:?}", p.pos);
                    }
                }
            }
        }
    }
}
