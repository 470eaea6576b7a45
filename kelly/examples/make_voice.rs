use hound::{SampleFormat, WavSpec, WavWriter};
use kelly::filter::NoiseSource;
use kelly::{Param, Voice, VoiceConfig};
use rand::SeedableRng;
use rand::rngs::SmallRng;

/// Renders one second of a hummed vowel to `vowel.wav`.
fn main() {
    let sample_rate = 44100;
    let block = 128;
    let mut voice = Voice::new(VoiceConfig { sample_rate, block_len: block }, 69);
    voice.controls().set(Param::Frequency, 140.0);

    let mut aspiration =
        NoiseSource::new(sample_rate, 500.0, 0.5, SmallRng::seed_from_u64(1)).unwrap();
    let mut fricative =
        NoiseSource::new(sample_rate, 1000.0, 0.5, SmallRng::seed_from_u64(2)).unwrap();

    let mut wav = WavWriter::create(
        "vowel.wav",
        WavSpec {
            channels: 1,
            sample_rate: sample_rate as u32,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        },
    )
    .unwrap();

    let mut asp = vec![0.0; block];
    let mut fric = vec![0.0; block];
    let mut out = vec![0.0; block];
    for _ in 0..(sample_rate / block) {
        for j in 0..block {
            asp[j] = aspiration.get_next();
            fric[j] = fricative.get_next();
        }
        voice.process_block(&asp, &fric, &mut out);
        for sample in &out {
            wav.write_sample(*sample as f32).unwrap();
        }
    }
    wav.finalize().unwrap();
}
