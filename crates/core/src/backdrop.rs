//! Animated pieces of the background layer: the slowly swinging two-tone
//! gradient and the drifting link mesh.
//!
//! Both are pure functions of a backdrop time value, so the scene only has
//! to decide when to sample them.

use crate::color::Rgba;
use crate::config::RenderConfig;
use glam::DVec2;

/// Angular rates and per-node phase steps of the mesh nodes.
const NODE_RATE_X: f64 = 5.2;
const NODE_RATE_Y: f64 = 3.8;
const NODE_PHASE_X: f64 = 0.8;
const NODE_PHASE_Y: f64 = 1.1;

/// Colors of the two diagonal gradient stops at `time`.
pub fn gradient_tones(render: &RenderConfig, time: f64) -> [Rgba; 2] {
    let start = (time.sin() + 1.0) * 0.5;
    let end = (time.cos() + 1.0) * 0.5;
    [
        render.gradient_start_a.lerp(render.gradient_start_b, start),
        render.gradient_end_a.lerp(render.gradient_end_b, end),
    ]
}

/// Mesh node positions inside `size`. Each node traces its own Lissajous path.
pub fn mesh_nodes(count: usize, time: f64, size: DVec2) -> Vec<DVec2> {
    (0..count)
        .map(|i| {
            let i = i as f64;
            let x = (time * NODE_RATE_X + i * NODE_PHASE_X).sin() * 0.5 + 0.5;
            let y = (time * NODE_RATE_Y + i * NODE_PHASE_Y).cos() * 0.5 + 0.5;
            DVec2::new(x * size.x, y * size.y)
        })
        .collect()
}

/// A mesh segment; `strength` falls from 1 at zero length to 0 at the cutoff.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeshLink {
    pub from: DVec2,
    pub to: DVec2,
    pub strength: f64,
}

/// Links between nodes closer than `max_dist`.
///
/// Nodes are ordered by x and each is tested only against its next
/// `lookahead` neighbours, so at most `n * lookahead` pairs are examined.
pub fn mesh_links(mut nodes: Vec<DVec2>, lookahead: usize, max_dist: f64) -> Vec<MeshLink> {
    if !(max_dist.is_finite() && max_dist > 0.0) {
        return Vec::new();
    }
    nodes.sort_by(|a, b| a.x.total_cmp(&b.x));
    let mut links = Vec::new();
    for (i, &from) in nodes.iter().enumerate() {
        for &to in nodes.iter().skip(i + 1).take(lookahead) {
            let d = from.distance(to);
            if d < max_dist {
                links.push(MeshLink {
                    from,
                    to,
                    strength: 1.0 - d / max_dist,
                });
            }
        }
    }
    links
}
