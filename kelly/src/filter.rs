//! Input-conditioning filters for hosts.
//!
//! The engine expects its two noise inputs to be band-passed before they
//! reach the voice (aspiration around 500 Hz, frication around 1000 Hz, both
//! with Q = 0.5). Hosts with their own audio graph will usually do that
//! themselves; these blocks exist so the demo binary, the examples and the
//! tests can condition raw white noise without one.

use crate::math::{cos, exp};
use crate::noise::white_noise;
use core::f64::consts::PI;
use rand::Rng;

/// A second order IIR band-pass resonator with unity peak gain.
///
/// # Formulas:
/// ## Variables:
/// ```text
///    x = input samples
///    y = output samples
///    a/b/c = filter coefficients
///    f0 = resonator frequency in Hz
///    w0 = 2 * PI * f0 / sampleRate
///    bw = bandwidth in Hz
///    r = exp(- PI * bw / sampleRate)
/// ```
/// ## Filter function:
/// ```text
///    y[n] = a * x[n] + b * y[n-1] + c * y[n-2]
/// ```
/// ## Gain at the resonance frequency:
/// ```text
///    |H(f0)| = a / (1 - r)
/// ```
/// so `a = 1 - r` pins the peak to unity.
pub struct Bandpass {
    sample_rate: usize,
    /// filter coefficient a
    a: f64,
    /// filter coefficient b
    b: f64,
    /// filter coefficient c
    c: f64,
    /// y[n-1], last output value
    y1: f64,
    /// y[n-2], second-last output value
    y2: f64,
}

impl Bandpass {
    /// ### params
    /// ```text
    /// sample_rate = Sample rate in Hz.
    /// ```
    pub fn new(sample_rate: usize) -> Self {
        Bandpass {
            sample_rate,
            a: 1.0,
            b: 0.0,
            c: 0.0,
            y1: 0.0,
            y2: 0.0,
        }
    }

    /// Adjusts the filter parameters without resetting the inner state.
    /// ### params
    /// ```text
    /// f = Center frequency in Hz.
    /// bw = Bandwidth in Hz (f / Q).
    /// ```
    ///
    /// # Errors
    ///
    /// Returns a static str if `f` is outside (0, sampleRate/2) or `bw` is
    /// not a positive finite number.
    pub fn set(&mut self, f: f64, bw: f64) -> Result<(), &'static str> {
        if f <= 0.0
            || f >= self.sample_rate as f64 / 2.0
            || bw <= 0.0
            || f.is_infinite()
            || bw.is_infinite()
        {
            return Err("Invalid band-pass parameters.");
        }
        let r = exp(-PI * bw / (self.sample_rate as f64));
        let w = 2.0 * PI * f / (self.sample_rate as f64);
        self.c = -(r * r);
        self.b = 2.0 * r * cos(w);
        self.a = 1.0 - r;
        Ok(())
    }

    /// Performs a filter step.
    pub fn step(&mut self, x: f64) -> f64 {
        let y = self.a * x + self.b * self.y1 + self.c * self.y2;
        self.y2 = self.y1;
        self.y1 = y;
        y
    }
}

/// A band-pass filtered white noise source.
pub struct NoiseSource<R> {
    filter: Bandpass,
    rng: R,
}

impl<R: Rng> NoiseSource<R> {
    /// Creates a source producing white noise band-passed at `f` Hz with the
    /// given quality factor.
    ///
    /// # Errors
    ///
    /// Returns a static str if the derived filter parameters are invalid.
    pub fn new(sample_rate: usize, f: f64, q: f64, rng: R) -> Result<Self, &'static str> {
        if q <= 0.0 {
            return Err("Invalid noise source Q.");
        }
        let mut filter = Bandpass::new(sample_rate);
        filter.set(f, f / q)?;
        Ok(NoiseSource { filter, rng })
    }

    /// Returns a band-passed random number.
    pub fn get_next(&mut self) -> f64 {
        let x = white_noise(&mut self.rng);
        self.filter.step(x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::{sin, sqrt};
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    /// Measures the filter gain at `f` Hz by driving it with a sine.
    fn gain_at(filter: &mut Bandpass, sample_rate: usize, f: f64) -> f64 {
        let steps = sample_rate; // one second, enough to settle
        let mut sum_sq = 0.0;
        for i in 0..steps {
            let x = sin(2.0 * PI * f * i as f64 / sample_rate as f64);
            let y = filter.step(x);
            if i >= steps / 2 {
                sum_sq += y * y;
            }
        }
        // RMS of a unit sine is 1/sqrt(2)
        sqrt(sum_sq / (steps / 2) as f64) * sqrt(2.0)
    }

    #[test]
    fn peak_gain_is_near_unity() {
        let mut filter = Bandpass::new(44100);
        filter.set(500.0, 1000.0).unwrap();
        let g = gain_at(&mut filter, 44100, 500.0);
        assert!((g - 1.0).abs() < 0.1, "peak gain {g}");
    }

    #[test]
    fn far_off_band_is_attenuated() {
        let mut filter = Bandpass::new(44100);
        filter.set(500.0, 250.0).unwrap();
        let g = gain_at(&mut filter, 44100, 8000.0);
        assert!(g < 0.25, "stop-band gain {g}");
    }

    #[test]
    fn rejects_bad_parameters() {
        let mut filter = Bandpass::new(44100);
        assert!(filter.set(0.0, 100.0).is_err());
        assert!(filter.set(30000.0, 100.0).is_err());
        assert!(filter.set(500.0, -1.0).is_err());
    }

    #[test]
    fn noise_source_is_deterministic_per_seed() {
        let mut a = NoiseSource::new(44100, 1000.0, 0.5, SmallRng::seed_from_u64(5)).unwrap();
        let mut b = NoiseSource::new(44100, 1000.0, 0.5, SmallRng::seed_from_u64(5)).unwrap();
        for _ in 0..1000 {
            assert_eq!(a.get_next(), b.get_next());
        }
    }
}
