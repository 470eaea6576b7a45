//! Noise sources for the synthesis.
//!
//! The glottal wobble uses a 1-D gradient noise ("simplex") with a seeded
//! permutation table, so that every voice can own an uncorrelated, fully
//! deterministic noise stream. White noise is drawn from a caller-supplied
//! [`rand::Rng`] so tests can substitute a mock generator.

use crate::math::floor;
use rand::Rng;

/// Returns a random number within the range -1 .. 1.
pub fn white_noise<R: Rng>(rng: &mut R) -> f64 {
    rng.random_range(-1.0..=1.0)
}

/// 1-D gradient noise with a permutation table shuffled from a seeded RNG.
///
/// Output is smooth, deterministic per seed, has approximately zero mean and
/// stays within -1 .. 1 (the 0.395 factor scales the two-corner contribution
/// `8 * (3/4)^4` down to unity).
pub struct Simplex {
    perm: [u8; 512],
}

impl Simplex {
    pub fn new<R: Rng>(rng: &mut R) -> Self {
        let mut p: [u8; 256] = core::array::from_fn(|i| i as u8);
        for i in (1..p.len()).rev() {
            let j = rng.random_range(0..=i);
            p.swap(i, j);
        }
        let mut perm = [0_u8; 512];
        for (i, slot) in perm.iter_mut().enumerate() {
            *slot = p[i & 255];
        }
        Simplex { perm }
    }

    /// Evaluates the noise at position `x`.
    pub fn noise1(&self, x: f64) -> f64 {
        let i0 = floor(x);
        let x0 = x - i0;
        let x1 = x0 - 1.0;

        let mut t0 = 1.0 - x0 * x0;
        t0 *= t0;
        let n0 = t0 * t0 * self.grad(i0 as i64, x0);

        let mut t1 = 1.0 - x1 * x1;
        t1 *= t1;
        let n1 = t1 * t1 * self.grad(i0 as i64 + 1, x1);

        0.395 * (n0 + n1)
    }

    fn grad(&self, i: i64, x: f64) -> f64 {
        let h = self.perm[(i & 255) as usize] & 15;
        let mut g = 1.0 + f64::from(h & 7);
        if h & 8 != 0 {
            g = -g;
        }
        g * x
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    #[test]
    fn noise_stays_in_range_and_is_roughly_centered() {
        let mut rng = SmallRng::seed_from_u64(7);
        let noise = Simplex::new(&mut rng);
        let mut sum = 0.0;
        let steps = 100_000;
        for i in 0..steps {
            let v = noise.noise1(f64::from(i) * 0.013);
            assert!((-1.0..=1.0).contains(&v), "{v} is out of range");
            sum += v;
        }
        let mean = sum / f64::from(steps);
        assert!(mean.abs() < 0.05, "mean {mean} is too far from zero");
    }

    #[test]
    fn same_seed_gives_same_noise() {
        let a = Simplex::new(&mut SmallRng::seed_from_u64(3));
        let b = Simplex::new(&mut SmallRng::seed_from_u64(3));
        for i in 0..1000 {
            let x = f64::from(i) * 0.7;
            assert_eq!(a.noise1(x), b.noise1(x));
        }
    }

    #[test]
    fn different_seeds_decorrelate() {
        let a = Simplex::new(&mut SmallRng::seed_from_u64(1));
        let b = Simplex::new(&mut SmallRng::seed_from_u64(2));
        let mut differing = 0;
        for i in 0..1000 {
            let x = f64::from(i) * 0.7;
            if (a.noise1(x) - b.noise1(x)).abs() > 1e-12 {
                differing += 1;
            }
        }
        assert!(differing > 900);
    }
}
