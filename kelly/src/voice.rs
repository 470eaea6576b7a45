//! One independent voice: a glottal source feeding a vocal-tract waveguide,
//! driven block by block from the host audio callback.

use crate::glottis::Glottis;
use crate::math::pow;
use crate::noise::Simplex;
use crate::params::Controls;
use crate::tract::Tract;
use alloc::sync::Arc;
use rand::SeedableRng;
use rand::rngs::SmallRng;

/// Read-only configuration shared by nothing; each voice owns a copy.
#[derive(Clone, Copy, Debug)]
pub struct VoiceConfig {
    /// Sample rate in Hz.
    pub sample_rate: usize,
    /// Internal block length. Larger host buffers are processed in chunks of
    /// this size so control smoothing keeps its cadence.
    pub block_len: usize,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        VoiceConfig { sample_rate: 48000, block_len: 128 }
    }
}

/// A complete voice. Voices are fully independent: each owns its processors,
/// its parameter block and its wobble generator, so any number can run
/// concurrently (serially on one audio thread, or one thread per voice).
pub struct Voice {
    glottis: Glottis,
    tract: Tract,
    controls: Arc<Controls>,
    config: VoiceConfig,
}

impl Voice {
    /// Creates a voice. `seed` keys the per-voice noise generator; give every
    /// voice its own seed so their natural drift is uncorrelated.
    pub fn new(config: VoiceConfig, seed: u64) -> Self {
        let mut rng = SmallRng::seed_from_u64(seed);
        let wobble = Simplex::new(&mut rng);
        Voice {
            glottis: Glottis::new(config.sample_rate, wobble),
            tract: Tract::new(config.sample_rate, 44),
            controls: Arc::new(Controls::new()),
            config,
        }
    }

    /// A shareable handle to this voice's parameters. Clone it into control
    /// threads; the audio thread only ever reads.
    pub fn controls(&self) -> Arc<Controls> {
        Arc::clone(&self.controls)
    }

    pub fn config(&self) -> VoiceConfig {
        self.config
    }

    /// The tract, for geometry inspection.
    pub fn tract(&self) -> &Tract {
        &self.tract
    }

    /// Renders `out.len()` mono samples. The two noise inputs are expected
    /// pre-band-passed (see [`crate::filter`]); where they run short, missing
    /// samples are read as zero. Output never carries NaN or infinity.
    pub fn process_block(
        &mut self,
        aspiration_noise: &[f64],
        fricative_noise: &[f64],
        out: &mut [f64],
    ) {
        let block_len = self.config.block_len.max(1);
        let mut offset = 0;
        while offset < out.len() {
            let end = usize::min(offset + block_len, out.len());
            self.process_chunk(aspiration_noise, fricative_noise, out, offset, end);
            offset = end;
        }
        #[cfg(feature = "std")]
        self.controls.push_snapshot(self.tract.snapshot());
    }

    /// One block of at most `block_len` samples: read block parameters, run
    /// glottis and tract sample by sample, then let both settle their
    /// end-of-block state.
    fn process_chunk(
        &mut self,
        aspiration_noise: &[f64],
        fricative_noise: &[f64],
        out: &mut [f64],
        offset: usize,
        end: usize,
    ) {
        let block = self.controls.block_params();

        // Tract resizes only happen here, at a block boundary.
        let n = block.tract_length.round() as usize;
        if n != self.tract.segment_count() {
            self.tract.init(n);
        }

        self.glottis.vibrato_amount = block.vibrato_amount;
        self.glottis.vibrato_frequency = block.vibrato_frequency;
        self.tract.movement_speed = block.movement_speed;
        self.tract.transient_strength = block.transient_strength;
        self.tract.tongue_diameter = block.tongue_diameter;
        let (tongue_lo, tongue_hi) = self.tract.tongue_range();
        self.tract.tongue_index = tongue_lo + block.tongue_index * (tongue_hi - tongue_lo);

        let len = end - offset;
        for j in 0..len {
            let sample = self.controls.sample_params();

            self.glottis.ui_frequency = block.frequency * pow(2.0, sample.pitchbend / 12.0);
            let tenseness = sample.tenseness * sample.tenseness_mult;
            self.glottis.ui_tenseness = tenseness;
            self.glottis.loudness = pow(tenseness, 0.25);
            self.glottis.intensity = sample.intensity;

            self.tract.velum_target = sample.velum_target;
            self.tract.constriction_index =
                f64::min(sample.constriction_index, self.tract.segment_count() as f64);
            self.tract.constriction_diameter = sample.constriction_diameter;
            self.tract.lip_diameter = sample.lip_diameter;
            self.tract.fricative_strength = sample.fricative_strength;

            let aspiration = aspiration_noise.get(offset + j).copied().unwrap_or(0.0);
            let fricative = fricative_noise.get(offset + j).copied().unwrap_or(0.0);
            let lambda1 = j as f64 / len as f64;
            let lambda2 = (j as f64 + 0.5) / len as f64;

            let frame = self.glottis.run_step(aspiration, lambda1);
            let glottal = frame.voiced + frame.aspiration;

            self.tract.run_step(glottal, fricative, lambda1, frame.noise_mod);
            let mut output = self.tract.step_output();
            self.tract.run_step(glottal, fricative, lambda2, frame.noise_mod);
            output += self.tract.step_output();
            output *= 0.125;

            out[offset + j] = if output.is_finite() { output } else { 0.0 };
        }

        self.glottis.finish_block();
        self.tract.finish_block(len as f64 / self.config.sample_rate as f64);
    }
}
