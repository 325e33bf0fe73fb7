//! Gradient noise used to drive the flow field.
//!
//! [`PermutationNoise`] is classic improved Perlin noise over a shuffled
//! 256-entry permutation table (duplicated to 512 entries so corner lookups
//! never wrap). [`NoiseSource`] lets a scene swap it for the `noise` crate's
//! OpenSimplex; both are consumed through [`noise::NoiseFn`].

use crate::prng::Xorshift64;
use noise::{NoiseFn, OpenSimplex};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Permutation-table gradient noise. Deterministic for a fixed table.
#[derive(Clone)]
pub struct PermutationNoise {
    perm: [u8; 512],
    seed: u64,
}

impl PermutationNoise {
    /// Builds a table from a Fisher-Yates shuffle of `0..256` seeded by `seed`.
    pub fn from_seed(seed: u64) -> Self {
        let mut noise = Self {
            perm: [0; 512],
            seed,
        };
        noise.reseed(seed);
        noise
    }

    /// Fully reshuffles the table. Never a partial update.
    pub fn reseed(&mut self, seed: u64) {
        let mut base: [u8; 256] = std::array::from_fn(|i| i as u8);
        Xorshift64::new(seed).shuffle(&mut base);
        for (i, slot) in self.perm.iter_mut().enumerate() {
            *slot = base[i & 255];
        }
        self.seed = seed;
    }

    /// The seed the current table was shuffled from.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// The doubled permutation table.
    pub fn permutation(&self) -> &[u8; 512] {
        &self.perm
    }

    /// 3D gradient noise in approximately [-1, 1].
    ///
    /// Total over all inputs: non-finite coordinates yield 0.
    pub fn noise3(&self, x: f64, y: f64, z: f64) -> f64 {
        if !(x.is_finite() && y.is_finite() && z.is_finite()) {
            return 0.0;
        }
        let (xi, xf) = split(x);
        let (yi, yf) = split(y);
        let (zi, zf) = split(z);
        let u = fade(xf);
        let v = fade(yf);
        let w = fade(zf);

        let p = &self.perm;
        let a = p[xi] as usize + yi;
        let aa = p[a] as usize + zi;
        let ab = p[a + 1] as usize + zi;
        let b = p[xi + 1] as usize + yi;
        let ba = p[b] as usize + zi;
        let bb = p[b + 1] as usize + zi;

        lerp(
            w,
            lerp(
                v,
                lerp(u, grad(p[aa], xf, yf, zf), grad(p[ba], xf - 1.0, yf, zf)),
                lerp(
                    u,
                    grad(p[ab], xf, yf - 1.0, zf),
                    grad(p[bb], xf - 1.0, yf - 1.0, zf),
                ),
            ),
            lerp(
                v,
                lerp(
                    u,
                    grad(p[aa + 1], xf, yf, zf - 1.0),
                    grad(p[ba + 1], xf - 1.0, yf, zf - 1.0),
                ),
                lerp(
                    u,
                    grad(p[ab + 1], xf, yf - 1.0, zf - 1.0),
                    grad(p[bb + 1], xf - 1.0, yf - 1.0, zf - 1.0),
                ),
            ),
        )
    }

    /// 2D slice of [`noise3`](Self::noise3) at `z = 0`.
    pub fn noise2(&self, x: f64, y: f64) -> f64 {
        self.noise3(x, y, 0.0)
    }
}

impl fmt::Debug for PermutationNoise {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PermutationNoise")
            .field("seed", &self.seed)
            .finish_non_exhaustive()
    }
}

impl NoiseFn<f64, 3> for PermutationNoise {
    fn get(&self, point: [f64; 3]) -> f64 {
        self.noise3(point[0], point[1], point[2])
    }
}

impl NoiseFn<f64, 2> for PermutationNoise {
    fn get(&self, point: [f64; 2]) -> f64 {
        self.noise2(point[0], point[1])
    }
}

/// Integer cell (masked into the table) and fractional offset of one axis.
fn split(v: f64) -> (usize, f64) {
    let floor = v.floor();
    ((floor as i64 & 255) as usize, v - floor)
}

/// Smootherstep `6t^5 - 15t^4 + 10t^3`; C2 at the cell edges.
fn fade(t: f64) -> f64 {
    t * t * t * (t * (t * 6.0 - 15.0) + 10.0)
}

fn lerp(t: f64, a: f64, b: f64) -> f64 {
    a + t * (b - a)
}

/// Dot product with one of 12 edge gradients (16 hashed cases).
fn grad(hash: u8, x: f64, y: f64, z: f64) -> f64 {
    let h = hash & 15;
    let u = if h < 8 { x } else { y };
    let v = if h < 4 {
        y
    } else if h == 12 || h == 14 {
        x
    } else {
        z
    };
    (if h & 1 == 0 { u } else { -u }) + (if h & 2 == 0 { v } else { -v })
}

/// Which gradient noise a scene samples.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoiseKind {
    #[default]
    Permutation,
    Simplex,
}

/// Owned noise generator, selected by [`NoiseKind`].
#[derive(Clone)]
pub enum NoiseSource {
    Permutation(PermutationNoise),
    Simplex(OpenSimplex),
}

impl NoiseSource {
    pub fn new(kind: NoiseKind, seed: u64) -> Self {
        match kind {
            NoiseKind::Permutation => NoiseSource::Permutation(PermutationNoise::from_seed(seed)),
            NoiseKind::Simplex => NoiseSource::Simplex(OpenSimplex::new(fold_seed(seed))),
        }
    }

    pub fn kind(&self) -> NoiseKind {
        match self {
            NoiseSource::Permutation(_) => NoiseKind::Permutation,
            NoiseSource::Simplex(_) => NoiseKind::Simplex,
        }
    }

    /// Re-seeds in place. Explicit; nothing re-seeds implicitly.
    pub fn reseed(&mut self, seed: u64) {
        match self {
            NoiseSource::Permutation(n) => n.reseed(seed),
            NoiseSource::Simplex(n) => *n = OpenSimplex::new(fold_seed(seed)),
        }
    }

    pub fn sample(&self, x: f64, y: f64, z: f64) -> f64 {
        match self {
            NoiseSource::Permutation(n) => n.noise3(x, y, z),
            NoiseSource::Simplex(n) => {
                if x.is_finite() && y.is_finite() && z.is_finite() {
                    n.get([x, y, z])
                } else {
                    0.0
                }
            }
        }
    }
}

impl fmt::Debug for NoiseSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NoiseSource::Permutation(n) => f.debug_tuple("Permutation").field(n).finish(),
            NoiseSource::Simplex(_) => f.write_str("Simplex"),
        }
    }
}

impl NoiseFn<f64, 3> for NoiseSource {
    fn get(&self, point: [f64; 3]) -> f64 {
        self.sample(point[0], point[1], point[2])
    }
}

/// `noise` seeds are 32-bit; fold both halves so high seed bits still matter.
fn fold_seed(seed: u64) -> u32 {
    (seed ^ (seed >> 32)) as u32
}
