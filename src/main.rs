use hound::{SampleFormat, WavSpec, WavWriter};
use kelly::filter::NoiseSource;
use kelly::presets;
use kelly::{Param, Voice, VoiceConfig};
use rand::SeedableRng;
use rand::rngs::SmallRng;

const SAMPLE_RATE: usize = 48000;
const BLOCK: usize = 128;

/// One scripted articulation move.
struct Gesture {
    at: f64,
    param: Param,
    value: f64,
}

/// A short tour through the things the voice can do: two vowels, a
/// nasalized stretch, a plosive and a fricative.
fn script() -> Vec<Gesture> {
    let mut gestures = vec![
        Gesture { at: 0.0, param: Param::Frequency, value: 110.0 },
        Gesture { at: 0.0, param: Param::TongueIndex, value: presets::AH.tongue_index },
        Gesture { at: 0.0, param: Param::TongueDiameter, value: presets::AH.tongue_diameter },
        // glide /a/ -> /i/
        Gesture { at: 0.8, param: Param::TongueIndex, value: presets::EE.tongue_index },
        Gesture { at: 0.8, param: Param::TongueDiameter, value: presets::EE.tongue_diameter },
        // nasalize the vowel
        Gesture { at: 1.4, param: Param::VelumTarget, value: 0.4 },
        Gesture { at: 1.9, param: Param::VelumTarget, value: 0.01 },
        // a plosive: full closure at the alveolar ridge, then release
        Gesture { at: 2.1, param: Param::ConstrictionIndex, value: 36.0 },
        Gesture { at: 2.1, param: Param::ConstrictionDiameter, value: 0.0 },
        Gesture { at: 2.3, param: Param::ConstrictionDiameter, value: 3.0 },
        // an unvoiced fricative to finish
        Gesture { at: 2.7, param: Param::Intensity, value: 0.0 },
        Gesture { at: 2.7, param: Param::ConstrictionDiameter, value: 0.5 },
    ];
    gestures.sort_by(|a, b| a.at.total_cmp(&b.at));
    gestures
}

fn main() {
    let mut voice = Voice::new(VoiceConfig { sample_rate: SAMPLE_RATE, block_len: BLOCK }, 1);
    let controls = voice.controls();

    let mut aspiration =
        NoiseSource::new(SAMPLE_RATE, 500.0, 0.5, SmallRng::seed_from_u64(10)).unwrap();
    let mut fricative =
        NoiseSource::new(SAMPLE_RATE, 1000.0, 0.5, SmallRng::seed_from_u64(11)).unwrap();

    let mut wav = WavWriter::create(
        "out.wav",
        WavSpec {
            channels: 1,
            sample_rate: SAMPLE_RATE as u32,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        },
    )
    .unwrap();

    let gestures = script();
    let mut next_gesture = 0;
    let total_samples = 3 * SAMPLE_RATE;
    let mut asp = [0.0; BLOCK];
    let mut fric = [0.0; BLOCK];
    let mut out = [0.0; BLOCK];

    let mut position = 0;
    while position < total_samples {
        let now = position as f64 / SAMPLE_RATE as f64;
        while next_gesture < gestures.len() && gestures[next_gesture].at <= now {
            let gesture = &gestures[next_gesture];
            controls.set(gesture.param, gesture.value);
            next_gesture += 1;
        }
        for j in 0..BLOCK {
            asp[j] = aspiration.get_next();
            fric[j] = fricative.get_next();
        }
        voice.process_block(&asp, &fric, &mut out);
        for sample in out {
            wav.write_sample(sample as f32).unwrap();
        }
        position += BLOCK;
    }
    wav.finalize().unwrap();
    println!("wrote out.wav");
}
