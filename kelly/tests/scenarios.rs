//! End-to-end listening scenarios: rest, a hummed vowel, nasalization, a
//! plosive release and a fricative, measured with a small DFT.

use kelly::filter::NoiseSource;
use kelly::{Param, Voice, VoiceConfig};
use rand::SeedableRng;
use rand::rngs::SmallRng;
use std::f64::consts::PI;

const SAMPLE_RATE: usize = 44100;
const BLOCK: usize = 128;

struct Bench {
    voice: Voice,
    aspiration: NoiseSource<SmallRng>,
    fricative: NoiseSource<SmallRng>,
}

impl Bench {
    fn new(seed: u64) -> Self {
        Bench {
            voice: Voice::new(VoiceConfig { sample_rate: SAMPLE_RATE, block_len: BLOCK }, seed),
            aspiration: NoiseSource::new(
                SAMPLE_RATE,
                500.0,
                0.5,
                SmallRng::seed_from_u64(seed.wrapping_mul(31) + 1),
            )
            .unwrap(),
            fricative: NoiseSource::new(
                SAMPLE_RATE,
                1000.0,
                0.5,
                SmallRng::seed_from_u64(seed.wrapping_mul(37) + 2),
            )
            .unwrap(),
        }
    }

    fn render(&mut self, samples: usize) -> Vec<f64> {
        let mut out = vec![0.0; samples];
        let mut asp = [0.0; BLOCK];
        let mut fric = [0.0; BLOCK];
        for chunk in out.chunks_mut(BLOCK) {
            for j in 0..chunk.len() {
                asp[j] = self.aspiration.get_next();
                fric[j] = self.fricative.get_next();
            }
            self.voice.process_block(&asp[..chunk.len()], &fric[..chunk.len()], chunk);
        }
        out
    }
}

fn rms(x: &[f64]) -> f64 {
    (x.iter().map(|v| v * v).sum::<f64>() / x.len() as f64).sqrt()
}

fn db(level: f64) -> f64 {
    20.0 * level.max(1e-12).log10()
}

/// Hann-windowed DFT magnitudes of one frame, bins 1..len/2.
fn spectrum(frame: &[f64]) -> Vec<f64> {
    let len = frame.len();
    let mut magnitudes = Vec::with_capacity(len / 2);
    for bin in 1..len / 2 {
        let mut re = 0.0;
        let mut im = 0.0;
        for (i, x) in frame.iter().enumerate() {
            let window = 0.5 - 0.5 * (2.0 * PI * i as f64 / len as f64).cos();
            let phase = 2.0 * PI * bin as f64 * i as f64 / len as f64;
            re += x * window * phase.cos();
            im -= x * window * phase.sin();
        }
        magnitudes.push((re * re + im * im).sqrt());
    }
    magnitudes
}

/// Power-weighted mean frequency in Hz, averaged over a few frames.
fn spectral_centroid(x: &[f64]) -> f64 {
    let frame_len = 1024;
    let mut weighted = 0.0;
    let mut total = 0.0;
    for frame in x.chunks_exact(frame_len).take(4) {
        for (k, magnitude) in spectrum(frame).iter().enumerate() {
            let freq = (k + 1) as f64 * SAMPLE_RATE as f64 / frame_len as f64;
            weighted += freq * magnitude * magnitude;
            total += magnitude * magnitude;
        }
    }
    weighted / total
}

/// Fundamental period in samples, from the autocorrelation peak around the
/// given guess.
fn dominant_period(x: &[f64], guess: f64) -> f64 {
    let mut best_lag = 0;
    let mut best = f64::MIN;
    for lag in (guess * 0.8) as usize..(guess * 1.2) as usize {
        let r: f64 = x.iter().zip(&x[lag..]).map(|(a, b)| a * b).sum();
        if r > best {
            best = r;
            best_lag = lag;
        }
    }
    best_lag as f64
}

/// Scenario: all defaults but zero intensity. The voice must be numerically
/// silent once the first block has passed.
#[test]
fn silent_rest() {
    let mut bench = Bench::new(10);
    bench.voice.controls().set(Param::Intensity, 0.0);
    let out = bench.render(SAMPLE_RATE);
    for (i, v) in out.iter().enumerate().skip(256) {
        assert!(v.abs() < 1e-6, "sample {i} = {v}");
    }
}

/// Scenario: a hummed schwa at 140 Hz. Expect a strong periodic component at
/// the fundamental and a centroid in the first-formant region.
#[test]
fn schwa_hum() {
    let mut bench = Bench::new(11);
    let out = bench.render(SAMPLE_RATE);
    let tail = &out[SAMPLE_RATE / 4..];

    assert!(rms(tail) > 0.005, "hum too quiet: {}", rms(tail));

    let expected = SAMPLE_RATE as f64 / 140.0;
    let period = dominant_period(tail, expected);
    let hz = SAMPLE_RATE as f64 / period;
    assert!((hz - 140.0).abs() < 1.5, "fundamental {hz} Hz");

    let centroid = spectral_centroid(tail);
    assert!((400.0..900.0).contains(&centroid), "centroid {centroid} Hz");
}

/// Scenario: opening the velum moves energy from the lips into the nasal
/// branch.
#[test]
fn nasalize() {
    let mut bench = Bench::new(12);
    let controls = bench.voice.controls();

    let mut lip_closed = 0.0;
    let mut nose_closed = 0.0;
    let blocks = SAMPLE_RATE / BLOCK;
    for _ in 0..blocks {
        let out = bench.render(BLOCK);
        assert!(out.iter().all(|v| v.is_finite()));
        lip_closed += bench.voice.tract().last_lip_output().abs();
        nose_closed += bench.voice.tract().last_nose_output().abs();
    }

    // sweep the velum open over 500 ms, then hold
    let sweep_blocks = SAMPLE_RATE / 2 / BLOCK;
    for step in 0..sweep_blocks {
        let target = 0.01 + (0.4 - 0.01) * step as f64 / sweep_blocks as f64;
        controls.set(Param::VelumTarget, target);
        let _ = bench.render(BLOCK);
    }
    controls.set(Param::VelumTarget, 0.4);

    let mut lip_open = 0.0;
    let mut nose_open = 0.0;
    for _ in 0..blocks {
        let out = bench.render(BLOCK);
        assert!(out.iter().all(|v| v.is_finite()));
        lip_open += bench.voice.tract().last_lip_output().abs();
        nose_open += bench.voice.tract().last_nose_output().abs();
    }

    assert!(
        nose_open > nose_closed * 5.0,
        "nasal branch did not engage: {nose_closed} -> {nose_open}"
    );
    assert!(
        lip_open < lip_closed,
        "lip output did not drop: {lip_closed} -> {lip_open}"
    );
}

/// Scenario: a full closure at the alveolar ridge, held 100 ms, then
/// released. Output collapses during the closure and releases a short click.
#[test]
fn plosive_click() {
    let mut bench = Bench::new(13);
    let controls = bench.voice.controls();
    controls.set(Param::ConstrictionIndex, 36.0);

    let pre = bench.render(SAMPLE_RATE / 4);
    let pre_rms = rms(&pre[SAMPLE_RATE / 8..]);

    controls.set(Param::ConstrictionDiameter, 0.0);
    let closed = bench.render(SAMPLE_RATE / 10);
    // judge the tail of the closure, once the tract has sealed
    let closed_rms = rms(&closed[closed.len() - SAMPLE_RATE / 50..]);
    assert!(db(closed_rms) < -30.0, "closure level {} dB", db(closed_rms));
    assert!(closed_rms < pre_rms / 10.0);

    controls.set(Param::ConstrictionDiameter, 3.0);
    let released = bench.render(3 * SAMPLE_RATE / 100);
    let peak = released.iter().fold(0.0_f64, |m, v| m.max(v.abs()));
    assert!(
        db(peak) > db(pre_rms) + 6.0,
        "release click {} dB over hum RMS {} dB",
        db(peak),
        db(pre_rms)
    );
}

/// Scenario: an unvoiced fricative at a narrow constriction. Expect hissy
/// output: moderate level, centroid well above the vowel formants.
#[test]
fn fricative() {
    let mut bench = Bench::new(14);
    let controls = bench.voice.controls();
    controls.set(Param::Intensity, 0.0);
    controls.set(Param::ConstrictionIndex, 36.0);
    controls.set(Param::ConstrictionDiameter, 0.5);
    controls.set(Param::FricativeStrength, 1.0);

    let out = bench.render(SAMPLE_RATE);
    let tail = &out[SAMPLE_RATE / 4..];
    let level = rms(tail);
    assert!((0.02..0.3).contains(&level), "fricative RMS {level}");

    let centroid = spectral_centroid(tail);
    assert!(centroid > 2000.0, "centroid {centroid} Hz");
}

/// Scenario: four voices with distinct seeds drift apart even under
/// identical parameters and inputs.
#[test]
fn multi_voice_independence() {
    let outputs: Vec<Vec<f64>> = (0..4)
        .map(|seed| {
            let mut voice =
                Voice::new(VoiceConfig { sample_rate: SAMPLE_RATE, block_len: BLOCK }, seed);
            // identical *input* noise for every voice: only the per-voice
            // wobble seed differs
            let mut aspiration =
                NoiseSource::new(SAMPLE_RATE, 500.0, 0.5, SmallRng::seed_from_u64(77)).unwrap();
            let mut fricative =
                NoiseSource::new(SAMPLE_RATE, 1000.0, 0.5, SmallRng::seed_from_u64(78)).unwrap();
            let mut out = vec![0.0; 3 * SAMPLE_RATE / 2];
            let mut asp = [0.0; BLOCK];
            let mut fric = [0.0; BLOCK];
            for chunk in out.chunks_mut(BLOCK) {
                for j in 0..chunk.len() {
                    asp[j] = aspiration.get_next();
                    fric[j] = fricative.get_next();
                }
                voice.process_block(&asp[..chunk.len()], &fric[..chunk.len()], chunk);
            }
            out
        })
        .collect();

    for a in 0..4 {
        for b in (a + 1)..4 {
            let x = &outputs[a][SAMPLE_RATE / 2..];
            let y = &outputs[b][SAMPLE_RATE / 2..];
            let dot: f64 = x.iter().zip(y).map(|(p, q)| p * q).sum();
            let correlation = dot / (rms(x) * rms(y) * x.len() as f64);
            assert!(correlation.abs() < 0.2, "voices {a}/{b} correlate at {correlation}");

            let mean_abs_diff: f64 =
                x.iter().zip(y).map(|(p, q)| (p - q).abs()).sum::<f64>() / x.len() as f64;
            assert!(mean_abs_diff > 0.01, "voices {a}/{b} differ by only {mean_abs_diff}");
        }
    }
}
