//! Pointer-triggered transient effects ("attention" lines and halos).
//!
//! Each effect is born already decaying: its intensity is a pure function of
//! `(now - start) / duration`, and once that ratio reaches 1 it is removed
//! and never drawn again. The overlay enforces a spawn cooldown and a hard
//! capacity cap. At capacity new spawns are rejected; the oldest entries are
//! never displaced.

use crate::color::Rgba;
use crate::field::FlowField;
use crate::prng::Xorshift64;
use glam::DVec2;
use serde::{Deserialize, Serialize};
use tracing::trace;

/// Scores how strongly a candidate lattice point attracts an effect from the origin.
///
/// Scores are relative sampling weights; non-positive scores exclude a candidate.
pub trait TargetScorer {
    fn score(&self, origin_angle: f64, candidate_angle: f64) -> f64;
}

/// Built-in target scoring strategies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TargetSelection {
    /// Every candidate equally likely.
    #[default]
    Uniform,
    /// Softmax over the cosine of the angle difference; low temperatures
    /// concentrate on points flowing the same way as the origin.
    AngleSimilarity { temperature: f64 },
}

impl TargetScorer for TargetSelection {
    fn score(&self, origin_angle: f64, candidate_angle: f64) -> f64 {
        match *self {
            TargetSelection::Uniform => 1.0,
            TargetSelection::AngleSimilarity { temperature } => {
                let similarity = (origin_angle - candidate_angle).cos();
                (similarity / temperature.max(1e-3)).exp()
            }
        }
    }
}

/// Tunables for the overlay.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EffectConfig {
    pub enabled: bool,
    /// Lines created per successful spawn.
    pub target_count: usize,
    pub duration_ms: f64,
    pub cooldown_ms: f64,
    /// Pointer must be this close to its nearest lattice point.
    pub activate_distance: f64,
    /// Hard cap on simultaneously live effects.
    pub max_effects: usize,
    pub line_width: f64,
    pub glow_blur: f64,
    pub spark_radius: f64,
    /// Radius of the halo ring at the origin; 0 disables halos.
    pub halo_radius: f64,
    pub color: Rgba,
    pub selection: TargetSelection,
}

impl Default for EffectConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            target_count: 6,
            duration_ms: 700.0,
            cooldown_ms: 60.0,
            activate_distance: 80.0,
            max_effects: 300,
            line_width: 1.6,
            glow_blur: 26.0,
            spark_radius: 1.8,
            halo_radius: 0.0,
            color: Rgba::from_rgb8(0, 255, 230, 1.0),
            selection: TargetSelection::Uniform,
        }
    }
}

/// Shape of an effect.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EffectKind {
    /// Directed line from the origin to `to`, with a spark travelling along it.
    Line { to: DVec2 },
    /// Expanding ring centred on the origin.
    Halo { radius: f64 },
}

/// Where an effect is in its life. There is no held plateau: spawn goes
/// straight to `Decaying`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectPhase {
    Decaying,
    Expired,
}

/// An ephemeral visual event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransientEffect {
    pub from: DVec2,
    pub kind: EffectKind,
    /// Birth timestamp in milliseconds.
    pub start: f64,
    pub duration: f64,
}

impl TransientEffect {
    pub fn line(from: DVec2, to: DVec2, start: f64, duration: f64) -> Self {
        Self {
            from,
            kind: EffectKind::Line { to },
            start,
            duration,
        }
    }

    pub fn halo(center: DVec2, radius: f64, start: f64, duration: f64) -> Self {
        Self {
            from: center,
            kind: EffectKind::Halo { radius },
            start,
            duration,
        }
    }

    /// `clamp((now - start) / duration, 0, 1)`. Degenerate durations count as finished.
    pub fn decay_ratio(&self, now: f64) -> f64 {
        if !(self.duration.is_finite() && self.duration > 0.0) {
            return 1.0;
        }
        let t = (now - self.start) / self.duration;
        if t.is_nan() {
            1.0
        } else {
            t.clamp(0.0, 1.0)
        }
    }

    pub fn phase(&self, now: f64) -> EffectPhase {
        if self.decay_ratio(now) >= 1.0 {
            EffectPhase::Expired
        } else {
            EffectPhase::Decaying
        }
    }

    pub fn is_expired(&self, now: f64) -> bool {
        self.phase(now) == EffectPhase::Expired
    }
}

/// Drawing parameters of an effect at one instant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EffectVisual {
    /// Decay ratio in [0, 1).
    pub t: f64,
    /// Cubic ease-out of `t`.
    pub ease: f64,
    pub alpha: f64,
    pub width: f64,
    pub glow: f64,
    /// Spark position on a line, or the ring radius centre for a halo.
    pub spark: DVec2,
    /// Ring radius for halos, 0 for lines.
    pub ring_radius: f64,
}

impl EffectVisual {
    /// Alpha, width and glow all fall monotonically with `t`.
    pub fn at(effect: &TransientEffect, t: f64, config: &EffectConfig) -> Self {
        let t = t.clamp(0.0, 1.0);
        let ease = 1.0 - (1.0 - t).powi(3);
        let (spark, ring_radius) = match effect.kind {
            EffectKind::Line { to } => (effect.from + (to - effect.from) * ease, 0.0),
            EffectKind::Halo { radius } => (effect.from, radius * (0.4 + 0.6 * ease)),
        };
        Self {
            t,
            ease,
            alpha: 1.0 - ease,
            width: config.line_width * (1.0 - 0.6 * ease),
            glow: config.glow_blur * (1.0 - t),
            spark,
            ring_radius,
        }
    }
}

/// The live effect collection plus its spawn policy.
#[derive(Debug, Clone)]
pub struct EffectOverlay {
    config: EffectConfig,
    effects: Vec<TransientEffect>,
    last_spawn: Option<f64>,
}

impl EffectOverlay {
    pub fn new(config: EffectConfig) -> Self {
        Self {
            config,
            effects: Vec::with_capacity(config.max_effects.min(1024)),
            last_spawn: None,
        }
    }

    pub fn config(&self) -> &EffectConfig {
        &self.config
    }

    /// Attempts a spawn from the pointer position. Returns how many effects were created.
    ///
    /// Requires the cooldown to have elapsed since the last successful spawn
    /// and the pointer to be within `activate_distance` of a lattice point.
    /// Targets are sampled without replacement, weighted by the configured
    /// [`TargetSelection`].
    pub fn try_spawn(
        &mut self,
        pointer: DVec2,
        now: f64,
        field: &FlowField,
        rng: &mut Xorshift64,
    ) -> usize {
        let selection = self.config.selection;
        self.try_spawn_with(pointer, now, field, rng, &selection)
    }

    /// Same as [`try_spawn`](Self::try_spawn) with an explicit scorer.
    pub fn try_spawn_with<S: TargetScorer + ?Sized>(
        &mut self,
        pointer: DVec2,
        now: f64,
        field: &FlowField,
        rng: &mut Xorshift64,
        scorer: &S,
    ) -> usize {
        if !self.config.enabled {
            return 0;
        }
        if let Some(last) = self.last_spawn {
            if now - last < self.config.cooldown_ms {
                trace!(now, last, "spawn suppressed by cooldown");
                return 0;
            }
        }
        let Some((origin_idx, origin)) = field.nearest_point(pointer.x, pointer.y) else {
            return 0;
        };
        let origin = DVec2::new(origin.x, origin.y);
        if origin.distance(pointer) > self.config.activate_distance {
            return 0;
        }

        self.prune(now);
        let room = self.config.max_effects.saturating_sub(self.effects.len());
        if room == 0 {
            trace!(live = self.effects.len(), "spawn rejected at capacity");
            return 0;
        }

        let targets = select_targets(field, origin_idx, self.config.target_count, rng, scorer);
        let duration = self.config.duration_ms;
        let mut created = 0;
        for idx in targets.into_iter().take(room) {
            let p = field.points()[idx];
            self.effects
                .push(TransientEffect::line(origin, DVec2::new(p.x, p.y), now, duration));
            created += 1;
        }
        if self.config.halo_radius > 0.0 && created < room {
            self.effects.push(TransientEffect::halo(
                origin,
                self.config.halo_radius,
                now,
                duration,
            ));
            created += 1;
        }
        if created > 0 {
            self.last_spawn = Some(now);
        }
        created
    }

    /// Adds an effect directly, subject to the capacity cap. Returns false if rejected.
    pub fn push(&mut self, effect: TransientEffect) -> bool {
        if self.effects.len() >= self.config.max_effects {
            return false;
        }
        self.effects.push(effect);
        true
    }

    /// Removes every expired effect. Returns how many were removed.
    pub fn prune(&mut self, now: f64) -> usize {
        let before = self.effects.len();
        self.effects.retain(|e| !e.is_expired(now));
        before - self.effects.len()
    }

    /// Live effects with their visuals at `now`, skipping any already expired.
    pub fn visuals(&self, now: f64) -> impl Iterator<Item = (&TransientEffect, EffectVisual)> + '_ {
        self.effects.iter().filter_map(move |e| {
            let t = e.decay_ratio(now);
            (t < 1.0).then(|| (e, EffectVisual::at(e, t, &self.config)))
        })
    }

    pub fn effects(&self) -> &[TransientEffect] {
        &self.effects
    }

    pub fn len(&self) -> usize {
        self.effects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }

    pub fn last_spawn(&self) -> Option<f64> {
        self.last_spawn
    }

    /// Drops every live effect; the cooldown clock is kept.
    pub fn clear(&mut self) {
        self.effects.clear();
    }
}

/// Weighted sampling without replacement (Efraimidis-Spirakis keys `ln(u) / w`).
///
/// The origin is never its own target; points without a populated angle are skipped.
fn select_targets<S: TargetScorer + ?Sized>(
    field: &FlowField,
    origin_idx: usize,
    count: usize,
    rng: &mut Xorshift64,
    scorer: &S,
) -> Vec<usize> {
    if count == 0 {
        return Vec::new();
    }
    let Some(origin_angle) = field.angle(origin_idx) else {
        return Vec::new();
    };
    let mut keyed: Vec<(f64, usize)> = (0..field.len())
        .filter(|&i| i != origin_idx)
        .filter_map(|i| {
            let angle = field.angle(i)?;
            let w = scorer.score(origin_angle, angle);
            if !(w.is_finite() && w > 0.0) {
                return None;
            }
            Some((rng.next_f64().ln() / w, i))
        })
        .collect();
    keyed.sort_unstable_by(|a, b| b.0.total_cmp(&a.0));
    keyed.truncate(count);
    keyed.into_iter().map(|(_, i)| i).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::noise::PermutationNoise;

    fn lattice() -> FlowField {
        let mut field = FlowField::new(800.0, 600.0, 40.0);
        field.recompute(&PermutationNoise::from_seed(4), 0.009, 0.0);
        field
    }

    fn overlay(config: EffectConfig) -> EffectOverlay {
        EffectOverlay::new(config)
    }

    #[test]
    fn decay_ratio_is_monotonic_and_expires_at_duration() {
        let e = TransientEffect::line(DVec2::ZERO, DVec2::ONE, 1000.0, 700.0);
        assert!(e.decay_ratio(1350.0) < e.decay_ratio(1630.0));
        assert!((e.decay_ratio(1350.0) - 0.5).abs() < 0.01);
        assert_eq!(e.phase(1699.0), EffectPhase::Decaying);
        assert_eq!(e.phase(1700.0), EffectPhase::Expired);
        assert_eq!(e.decay_ratio(900.0), 0.0);
    }

    #[test]
    fn zero_duration_is_immediately_expired() {
        let e = TransientEffect::line(DVec2::ZERO, DVec2::ONE, 10.0, 0.0);
        assert!(e.is_expired(10.0));
    }

    #[test]
    fn visuals_decrease_monotonically() {
        let e = TransientEffect::line(DVec2::ZERO, DVec2::new(100.0, 0.0), 0.0, 100.0);
        let config = EffectConfig::default();
        let mut prev = EffectVisual::at(&e, 0.0, &config);
        assert_eq!(prev.alpha, 1.0);
        assert_eq!(prev.spark, DVec2::ZERO);
        for step in 1..100 {
            let v = EffectVisual::at(&e, step as f64 / 100.0, &config);
            assert!(v.alpha < prev.alpha);
            assert!(v.width < prev.width);
            assert!(v.glow < prev.glow);
            assert!(v.spark.x > prev.spark.x, "spark must advance along the line");
            prev = v;
        }
    }

    #[test]
    fn halo_ring_grows() {
        let e = TransientEffect::halo(DVec2::new(5.0, 5.0), 30.0, 0.0, 100.0);
        let config = EffectConfig::default();
        let early = EffectVisual::at(&e, 0.1, &config);
        let late = EffectVisual::at(&e, 0.9, &config);
        assert!(late.ring_radius > early.ring_radius);
        assert!(late.ring_radius <= 30.0);
        assert_eq!(early.spark, e.from);
    }

    #[test]
    fn spawn_near_lattice_point_creates_target_lines() {
        let field = lattice();
        let mut fx = overlay(EffectConfig::default());
        let mut rng = Xorshift64::new(3);
        let n = fx.try_spawn(DVec2::new(203.0, 198.0), 1000.0, &field, &mut rng);
        assert_eq!(n, 6);
        for e in fx.effects() {
            assert_eq!(e.from, DVec2::new(200.0, 200.0));
            match e.kind {
                EffectKind::Line { to } => assert_ne!(to, e.from, "origin targeted itself"),
                EffectKind::Halo { .. } => panic!("halos are disabled by default"),
            }
        }
        let mut targets: Vec<(i64, i64)> = fx
            .effects()
            .iter()
            .filter_map(|e| match e.kind {
                EffectKind::Line { to } => Some((to.x as i64, to.y as i64)),
                EffectKind::Halo { .. } => None,
            })
            .collect();
        targets.sort_unstable();
        targets.dedup();
        assert_eq!(targets.len(), 6, "targets must be distinct");
    }

    #[test]
    fn spawn_outside_canvas_or_far_from_points_is_ignored() {
        let field = lattice();
        let mut fx = overlay(EffectConfig {
            activate_distance: 5.0,
            ..EffectConfig::default()
        });
        let mut rng = Xorshift64::new(3);
        assert_eq!(fx.try_spawn(DVec2::new(-100.0, 50.0), 0.0, &field, &mut rng), 0);
        assert_eq!(fx.try_spawn(DVec2::new(20.0, 20.0), 0.0, &field, &mut rng), 0);
        assert!(fx.last_spawn().is_none(), "failed spawns must not start the cooldown");
    }

    #[test]
    fn cooldown_collapses_rapid_triggers() {
        let field = lattice();
        let mut fx = overlay(EffectConfig::default());
        let mut rng = Xorshift64::new(3);
        let p = DVec2::new(200.0, 200.0);
        assert!(fx.try_spawn(p, 1000.0, &field, &mut rng) > 0);
        assert_eq!(fx.try_spawn(p, 1059.0, &field, &mut rng), 0);
        assert_eq!(fx.len(), 6);
        assert!(fx.try_spawn(p, 1060.0, &field, &mut rng) > 0);
        assert_eq!(fx.len(), 12);
    }

    #[test]
    fn capacity_is_never_exceeded() {
        let field = lattice();
        let mut fx = overlay(EffectConfig {
            max_effects: 20,
            duration_ms: 10_000.0,
            halo_radius: 12.0,
            ..EffectConfig::default()
        });
        let mut rng = Xorshift64::new(8);
        for i in 0..200 {
            let now = i as f64 * 100.0;
            fx.try_spawn(DVec2::new(400.0, 320.0), now, &field, &mut rng);
            assert!(fx.len() <= 20, "live effects {} over cap", fx.len());
        }
        assert_eq!(fx.len(), 20);
    }

    #[test]
    fn capacity_frees_up_after_expiry() {
        let field = lattice();
        let mut fx = overlay(EffectConfig {
            max_effects: 6,
            ..EffectConfig::default()
        });
        let mut rng = Xorshift64::new(8);
        let p = DVec2::new(400.0, 320.0);
        assert_eq!(fx.try_spawn(p, 0.0, &field, &mut rng), 6);
        assert_eq!(fx.try_spawn(p, 100.0, &field, &mut rng), 0);
        assert_eq!(fx.try_spawn(p, 700.0, &field, &mut rng), 6);
        assert!(fx.effects().iter().all(|e| e.start == 700.0));
    }

    #[test]
    fn push_rejects_at_capacity() {
        let mut fx = overlay(EffectConfig {
            max_effects: 1,
            ..EffectConfig::default()
        });
        let e = TransientEffect::line(DVec2::ZERO, DVec2::ONE, 0.0, 10.0);
        assert!(fx.push(e));
        assert!(!fx.push(e));
        assert_eq!(fx.len(), 1);
    }

    #[test]
    fn prune_removes_only_expired() {
        let mut fx = overlay(EffectConfig::default());
        fx.push(TransientEffect::line(DVec2::ZERO, DVec2::ONE, 0.0, 100.0));
        fx.push(TransientEffect::line(DVec2::ZERO, DVec2::ONE, 50.0, 100.0));
        assert_eq!(fx.prune(100.0), 1);
        assert_eq!(fx.len(), 1);
        assert_eq!(fx.visuals(120.0).count(), 1);
        assert_eq!(fx.visuals(150.0).count(), 0);
    }

    #[test]
    fn halo_accompanies_lines_when_enabled() {
        let field = lattice();
        let mut fx = overlay(EffectConfig {
            halo_radius: 20.0,
            ..EffectConfig::default()
        });
        let n = fx.try_spawn(DVec2::new(200.0, 200.0), 0.0, &field, &mut Xorshift64::new(1));
        assert_eq!(n, 7);
        let halos = fx
            .effects()
            .iter()
            .filter(|e| matches!(e.kind, EffectKind::Halo { .. }))
            .count();
        assert_eq!(halos, 1);
    }

    #[test]
    fn disabled_overlay_never_spawns() {
        let field = lattice();
        let mut fx = overlay(EffectConfig {
            enabled: false,
            ..EffectConfig::default()
        });
        assert_eq!(
            fx.try_spawn(DVec2::new(200.0, 200.0), 0.0, &field, &mut Xorshift64::new(1)),
            0
        );
    }

    #[test]
    fn similarity_prefers_aligned_directions() {
        let sharp = TargetSelection::AngleSimilarity { temperature: 0.1 };
        assert!(sharp.score(0.0, 0.1) > sharp.score(0.0, 3.0));
        assert_eq!(TargetSelection::Uniform.score(0.0, 3.0), 1.0);

        let field = lattice();
        let origin_idx = field.nearest_point(400.0, 320.0).unwrap().0;
        let origin_angle = field.angle(origin_idx).unwrap();
        let mut rng = Xorshift64::new(12);
        let mut aligned = 0.0;
        let mut uniform = 0.0;
        for _ in 0..50 {
            for i in select_targets(&field, origin_idx, 6, &mut rng, &sharp) {
                aligned += (field.angle(i).unwrap() - origin_angle).cos();
            }
            for i in select_targets(&field, origin_idx, 6, &mut rng, &TargetSelection::Uniform) {
                uniform += (field.angle(i).unwrap() - origin_angle).cos();
            }
        }
        assert!(aligned > uniform, "aligned {aligned} vs uniform {uniform}");
    }

    #[test]
    fn custom_scorer_can_exclude_everything() {
        struct Nothing;
        impl TargetScorer for Nothing {
            fn score(&self, _: f64, _: f64) -> f64 {
                0.0
            }
        }
        let field = lattice();
        let mut fx = overlay(EffectConfig::default());
        let n = fx.try_spawn_with(
            DVec2::new(200.0, 200.0),
            0.0,
            &field,
            &mut Xorshift64::new(1),
            &Nothing,
        );
        assert_eq!(n, 0);
        assert!(fx.last_spawn().is_none());
    }

    #[test]
    fn selection_serde_round_trip() {
        let s = TargetSelection::AngleSimilarity { temperature: 0.35 };
        let json = serde_json::to_value(s).unwrap();
        assert_eq!(json["kind"], "angle_similarity");
        let back: TargetSelection = serde_json::from_value(json).unwrap();
        assert_eq!(back, s);
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn live_count_never_exceeds_cap(
                seed: u64,
                cap in 1_usize..40,
                steps in prop::collection::vec((0.0_f64..800.0, 0.0_f64..600.0, 0.0_f64..200.0), 1..80),
            ) {
                let field = lattice();
                let mut fx = overlay(EffectConfig { max_effects: cap, halo_radius: 8.0, ..EffectConfig::default() });
                let mut rng = Xorshift64::new(seed);
                let mut now = 0.0;
                for (x, y, dt) in steps {
                    now += dt;
                    fx.try_spawn(DVec2::new(x, y), now, &field, &mut rng);
                    prop_assert!(fx.len() <= cap);
                }
            }
        }
    }
}
