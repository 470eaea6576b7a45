//! The glottal source.
//!
//! One pitch period of glottal flow derivative is modeled with the
//! Liljencrants-Fant waveform, whose shape follows a single tension
//! parameter. Aspiration noise is mixed in under a voicing-synchronous
//! modulator, and the modulator itself is published so the tract can gate its
//! turbulence with the same signal.

use crate::math::{exp, log, pow, sin, sqrt};
use crate::noise::Simplex;
use core::f64::consts::PI;

/// Output of one glottal step: the voiced waveform sample, the aspiration
/// sample, and the noise modulator the tract applies to turbulence.
#[derive(Clone, Copy, Debug, Default)]
pub struct GlottalFrame {
    pub voiced: f64,
    pub aspiration: f64,
    pub noise_mod: f64,
}

/// The LF-model pulse generator.
///
/// Control fields are written by the owning voice (or directly, when the
/// generator is used standalone) and read per sample. Frequency and tension
/// only reach the waveform through an old/new pair interpolated at the block
/// fraction of each period boundary, so per-block control changes never step
/// mid-period.
pub struct Glottis {
    sample_rate: f64,

    // Control inputs for the current sample:
    /// F0 target in Hz, after pitch bend, before vibrato.
    pub ui_frequency: f64,
    /// Tension of the vocal folds, 0 breathy .. 1 pressed.
    pub ui_tenseness: f64,
    /// Voiced-component gain.
    pub intensity: f64,
    /// Output scale, conventionally tenseness^0.25.
    pub loudness: f64,
    /// Depth of F0 modulation.
    pub vibrato_amount: f64,
    /// Rate of F0 modulation in Hz.
    pub vibrato_frequency: f64,

    // Phase timing:
    time_in_waveform: f64,
    total_time: f64,
    waveform_length: f64,

    // Smoothed control state:
    old_frequency: f64,
    new_frequency: f64,
    smooth_frequency: f64,
    old_tenseness: f64,
    new_tenseness: f64,

    // LF shape parameters, recomputed at each period boundary:
    rd: f64,
    alpha: f64,
    e0: f64,
    epsilon: f64,
    shift: f64,
    delta: f64,
    te: f64,
    omega: f64,

    /// Per-voice wobble source; a distinct seed per voice desynchronizes the
    /// natural drift between voices.
    wobble: Simplex,
}

impl Glottis {
    pub fn new(sample_rate: usize, wobble: Simplex) -> Self {
        let frequency = 140.0;
        let tenseness = 0.6;
        let mut glottis = Glottis {
            sample_rate: sample_rate as f64,
            ui_frequency: frequency,
            ui_tenseness: tenseness,
            intensity: 1.0,
            loudness: pow(tenseness, 0.25),
            vibrato_amount: 0.005,
            vibrato_frequency: 6.0,
            time_in_waveform: 0.0,
            total_time: 0.0,
            waveform_length: 1.0 / frequency,
            old_frequency: frequency,
            new_frequency: frequency,
            smooth_frequency: frequency,
            old_tenseness: tenseness,
            new_tenseness: tenseness,
            rd: 0.0,
            alpha: 0.0,
            e0: 0.0,
            epsilon: 0.0,
            shift: 0.0,
            delta: 0.0,
            te: 0.0,
            omega: 0.0,
            wobble,
        };
        glottis.setup_waveform(0.0);
        glottis
    }

    /// Advances one sample. `aspiration_noise` is one pre-band-passed noise
    /// sample; `lambda` is the sample's fraction through the current block,
    /// used to interpolate control values at period boundaries.
    pub fn run_step(&mut self, aspiration_noise: f64, lambda: f64) -> GlottalFrame {
        let time_step = 1.0 / self.sample_rate;
        self.time_in_waveform += time_step;
        self.total_time += time_step;
        if self.time_in_waveform > self.waveform_length {
            self.time_in_waveform -= self.waveform_length;
            self.setup_waveform(lambda);
        }

        let t = self.time_in_waveform / self.waveform_length;
        let voiced = self.normalized_lf_waveform(t) * self.intensity * self.loudness;

        let noise_mod = self.noise_modulator();
        let aspiration = self.intensity
            * (1.0 - sqrt(self.ui_tenseness))
            * noise_mod
            * aspiration_noise
            * 8.0
            * (0.2 + 0.02 * self.wobble.noise1(self.total_time * 1.99));

        GlottalFrame { voiced, aspiration, noise_mod }
    }

    /// The modulator applied to aspiration and to tract turbulence: strongest
    /// in the open phase of the period, never fully closed down.
    pub fn noise_modulator(&self) -> f64 {
        let voiced =
            0.1 + 0.2 * f64::max(0.0, sin(2.0 * PI * self.time_in_waveform / self.waveform_length));
        self.ui_tenseness * self.intensity * voiced
            + (1.0 - self.ui_tenseness * self.intensity) * 0.3
    }

    /// End-of-block bookkeeping: vibrato, asymmetric frequency smoothing, and
    /// rolling the old/new control pairs forward.
    pub fn finish_block(&mut self) {
        let mut vibrato =
            self.vibrato_amount * sin(2.0 * PI * self.total_time * self.vibrato_frequency);
        vibrato += 0.02 * self.wobble.noise1(self.total_time * 4.07);

        if self.ui_frequency > self.smooth_frequency {
            self.smooth_frequency = f64::min(self.smooth_frequency * 1.1, self.ui_frequency);
        }
        if self.ui_frequency < self.smooth_frequency {
            self.smooth_frequency = f64::max(self.smooth_frequency / 1.1, self.ui_frequency);
        }
        self.old_frequency = self.new_frequency;
        // full-depth vibrato can push the target through zero; the period
        // length must stay positive
        self.new_frequency = f64::max(self.smooth_frequency * (1.0 + vibrato), 1.0);

        self.old_tenseness = self.new_tenseness;
        self.new_tenseness = self.ui_tenseness
            + 0.1 * self.wobble.noise1(self.total_time * 0.46)
            + 0.05 * self.wobble.noise1(self.total_time * 0.36);
    }

    /// Processes one block: consumes `aspiration_noise_in` and fills the
    /// three output streams. `voiced_out` defines the block length; short
    /// inputs are read as zero.
    pub fn process_block(
        &mut self,
        aspiration_noise_in: &[f64],
        voiced_out: &mut [f64],
        aspiration_out: &mut [f64],
        noise_mod_out: &mut [f64],
    ) {
        let len = voiced_out.len();
        if len == 0 {
            return;
        }
        for j in 0..len {
            let noise = aspiration_noise_in.get(j).copied().unwrap_or(0.0);
            let lambda = j as f64 / len as f64;
            let frame = self.run_step(noise, lambda);
            voiced_out[j] = frame.voiced;
            if let Some(out) = aspiration_out.get_mut(j) {
                *out = frame.aspiration;
            }
            if let Some(out) = noise_mod_out.get_mut(j) {
                *out = frame.noise_mod;
            }
        }
        self.finish_block();
    }

    /// Recomputes the LF coefficients from a linear blend of the old and new
    /// frequency and tension, `lambda` deep into the block.
    ///
    /// The derivation follows Fant's transformed-parameter fit: `Rd` positions
    /// the return phase, `Ra`/`Rk`/`Rg` locate the timing landmarks `Ta`,
    /// `Tp`, `Te`, and `alpha`/`E0` are solved so the open-phase sinusoid
    /// meets the return exponential with zero net flow over the period.
    fn setup_waveform(&mut self, lambda: f64) {
        let frequency = self.old_frequency * (1.0 - lambda) + self.new_frequency * lambda;
        let tenseness = self.old_tenseness * (1.0 - lambda) + self.new_tenseness * lambda;
        self.waveform_length = 1.0 / frequency;

        self.rd = (3.0 * (1.0 - tenseness)).clamp(0.5, 2.7);
        let rd = self.rd;

        let ra = -0.01 + 0.048 * rd;
        let rk = 0.224 + 0.118 * rd;
        let rg = (rk / 4.0) * (0.5 + 1.2 * rk) / (0.11 * rd - ra * (0.5 + 1.2 * rk));

        let ta = ra;
        let tp = 1.0 / (2.0 * rg);
        let te = tp + tp * rk;

        self.epsilon = 1.0 / ta;
        self.shift = exp(-self.epsilon * (1.0 - te));
        self.delta = 1.0 - self.shift;

        let rhs_integral =
            ((1.0 / self.epsilon) * (self.shift - 1.0) + (1.0 - te) * self.shift) / self.delta;
        let total_lower_integral = -(te - tp) / 2.0 + rhs_integral;
        let total_upper_integral = -total_lower_integral;

        self.omega = PI / tp;
        let s = sin(self.omega * te);
        // The amplitude of the open-phase sinusoid grows as exp(alpha * t);
        // alpha is solved so the areas above and below the axis cancel.
        let y = -PI * s * total_upper_integral / (tp * 2.0);
        let z = log(y);
        self.alpha = z / (tp / 2.0 - te);
        self.e0 = -1.0 / (s * exp(self.alpha * te));

        self.te = te;
    }

    /// Evaluates the normalized LF waveform at phase `t` in 0..1.
    fn normalized_lf_waveform(&self, t: f64) -> f64 {
        if t > self.te {
            (-exp(-self.epsilon * (t - self.te)) + self.shift) / self.delta
        } else {
            self.e0 * exp(self.alpha * t) * sin(self.omega * t)
        }
    }
}
