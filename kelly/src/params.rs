//! The control plane of a voice.
//!
//! Parameters flow one way: any number of control threads store values, the
//! audio thread loads them. Every parameter lives in one atomic slot holding
//! `f64` bits, so writes never block and the audio callback never takes a
//! lock. Values are coerced at load time: NaN falls back to the declared
//! default, everything else is clamped into the declared range.
//!
//! Telemetry runs the other way (audio writes, control reads) over a bounded
//! channel; see [`TractSnapshot`].

use core::sync::atomic::{AtomicU64, Ordering};

/// Upper bound on the tract length `n`, used to size telemetry snapshots.
pub const MAX_TRACT_LENGTH: usize = 60;

/// Declared range and default of one parameter.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ParamSpec {
    pub min: f64,
    pub max: f64,
    pub default: f64,
}

/// Every control parameter a voice understands.
///
/// Block-scope parameters are read once at block start; sample-scope
/// parameters are read again for every output sample. See [`Param::spec`]
/// for ranges and defaults.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(usize)]
pub enum Param {
    /// Fundamental frequency target in Hz, before vibrato. Block scope.
    Frequency,
    /// Voiced-component gain, 0 for unvoiced consonants. Sample scope.
    Intensity,
    /// LF waveform shape: 0 breathy, 1 pressed. Sample scope.
    Tenseness,
    /// Final tenseness scaler; also sets loudness = (mult * tenseness)^0.25.
    /// Sample scope.
    TensenessMult,
    /// Depth of F0 modulation. Block scope.
    VibratoAmount,
    /// Rate of F0 modulation in Hz. Block scope.
    VibratoFrequency,
    /// Pitch bend in semitones, multiplies frequency by 2^(bend/12).
    /// Sample scope.
    Pitchbend,
    /// Tract length in segments; a change re-initializes the waveguide at the
    /// next block boundary. Block scope.
    TractLength,
    /// Target velum opening (nose diameter at the coupling) in cm.
    /// Sample scope.
    VelumTarget,
    /// Position of the tongue-tip constriction, in segments. Sample scope.
    ConstrictionIndex,
    /// Aperture at the constriction in cm. Negative values reach the
    /// nasal-context region of the shape rules. Sample scope.
    ConstrictionDiameter,
    /// Tongue-body horizontal position as a fraction 0..1 of the blade-to-tip
    /// span. Block scope.
    TongueIndex,
    /// Tongue-body vertical diameter in cm. Block scope.
    TongueDiameter,
    /// Lip aperture in cm. Sample scope.
    LipDiameter,
    /// Easing rate toward target diameters in cm/s; negative snaps instantly.
    /// Block scope.
    MovementSpeed,
    /// Turbulence-noise gain. Sample scope.
    FricativeStrength,
    /// Release-click gain. Block scope.
    TransientStrength,
}

pub const PARAM_COUNT: usize = 17;

const ALL_PARAMS: [Param; PARAM_COUNT] = [
    Param::Frequency,
    Param::Intensity,
    Param::Tenseness,
    Param::TensenessMult,
    Param::VibratoAmount,
    Param::VibratoFrequency,
    Param::Pitchbend,
    Param::TractLength,
    Param::VelumTarget,
    Param::ConstrictionIndex,
    Param::ConstrictionDiameter,
    Param::TongueIndex,
    Param::TongueDiameter,
    Param::LipDiameter,
    Param::MovementSpeed,
    Param::FricativeStrength,
    Param::TransientStrength,
];

impl Param {
    /// The declared range and default of this parameter.
    ///
    /// `ConstrictionDiameter` admits [-1.6, 5] rather than the nominal
    /// [0, 5]: the shape rules treat apertures below -0.8 at a position past
    /// the nose coupling as nasal context, and stop applying the constriction
    /// below -1.6 entirely.
    pub const fn spec(self) -> ParamSpec {
        match self {
            Param::Frequency => ParamSpec { min: 20.0, max: 2000.0, default: 140.0 },
            Param::Intensity => ParamSpec { min: 0.0, max: 1.0, default: 1.0 },
            Param::Tenseness => ParamSpec { min: 0.0, max: 1.0, default: 0.6 },
            Param::TensenessMult => ParamSpec { min: 0.0, max: 1.0, default: 1.0 },
            Param::VibratoAmount => ParamSpec { min: 0.0, max: 1.0, default: 0.005 },
            Param::VibratoFrequency => ParamSpec { min: 0.0, max: 100.0, default: 6.0 },
            Param::Pitchbend => ParamSpec { min: -24.0, max: 24.0, default: 0.0 },
            Param::TractLength => ParamSpec { min: 30.0, max: 60.0, default: 44.0 },
            Param::VelumTarget => ParamSpec { min: 0.0, max: 0.4, default: 0.01 },
            Param::ConstrictionIndex => {
                ParamSpec { min: 0.0, max: MAX_TRACT_LENGTH as f64, default: 0.0 }
            }
            Param::ConstrictionDiameter => ParamSpec { min: -1.6, max: 5.0, default: 3.0 },
            Param::TongueIndex => ParamSpec { min: 0.0, max: 1.0, default: 0.5 },
            Param::TongueDiameter => ParamSpec { min: 2.05, max: 3.5, default: 2.43 },
            Param::LipDiameter => ParamSpec { min: 0.0, max: 1.5, default: 1.5 },
            Param::MovementSpeed => ParamSpec { min: -1.0, max: 500.0, default: 15.0 },
            Param::FricativeStrength => ParamSpec { min: 0.0, max: 1.0, default: 1.0 },
            Param::TransientStrength => ParamSpec { min: 0.0, max: 1.0, default: 1.0 },
        }
    }
}

/// One `f64` parameter stored as atomic bits.
struct Slot(AtomicU64);

impl Slot {
    fn new(value: f64) -> Self {
        Slot(AtomicU64::new(value.to_bits()))
    }

    fn store(&self, value: f64) {
        self.0.store(value.to_bits(), Ordering::Relaxed);
    }

    fn load(&self, spec: ParamSpec) -> f64 {
        let raw = f64::from_bits(self.0.load(Ordering::Relaxed));
        if raw.is_nan() { spec.default } else { raw.clamp(spec.min, spec.max) }
    }
}

/// Parameters read once at the start of a block.
#[derive(Clone, Copy, Debug)]
pub(crate) struct BlockParams {
    pub frequency: f64,
    pub vibrato_amount: f64,
    pub vibrato_frequency: f64,
    pub tract_length: f64,
    pub tongue_index: f64,
    pub tongue_diameter: f64,
    pub movement_speed: f64,
    pub transient_strength: f64,
}

/// Parameters re-read for every output sample.
#[derive(Clone, Copy, Debug)]
pub(crate) struct SampleParams {
    pub intensity: f64,
    pub tenseness: f64,
    pub tenseness_mult: f64,
    pub pitchbend: f64,
    pub velum_target: f64,
    pub constriction_index: f64,
    pub constriction_diameter: f64,
    pub lip_diameter: f64,
    pub fricative_strength: f64,
}

/// End-of-block tract geometry, for UI rendering or logging.
///
/// Fixed size and `Copy` so the audio thread can hand it over without
/// allocating; only the first `n` diameters are meaningful.
#[derive(Clone, Copy, Debug)]
pub struct TractSnapshot {
    pub n: usize,
    pub diameter: [f64; MAX_TRACT_LENGTH],
    pub nose_diameter_0: f64,
}

/// The shared parameter block of one voice.
///
/// The voice keeps one `Arc<Controls>` and hands out clones; all methods take
/// `&self` and are safe to call from any thread.
pub struct Controls {
    slots: [Slot; PARAM_COUNT],
    #[cfg(feature = "std")]
    telemetry_tx: crossbeam_channel::Sender<TractSnapshot>,
    #[cfg(feature = "std")]
    telemetry_rx: crossbeam_channel::Receiver<TractSnapshot>,
}

impl Controls {
    pub(crate) fn new() -> Self {
        #[cfg(feature = "std")]
        let (telemetry_tx, telemetry_rx) = crossbeam_channel::bounded(8);
        Controls {
            slots: core::array::from_fn(|i| Slot::new(ALL_PARAMS[i].spec().default)),
            #[cfg(feature = "std")]
            telemetry_tx,
            #[cfg(feature = "std")]
            telemetry_rx,
        }
    }

    /// Stores a parameter value. Never blocks; the value is coerced into its
    /// declared range when the audio thread reads it.
    pub fn set(&self, param: Param, value: f64) {
        self.slots[param as usize].store(value);
    }

    /// Loads a parameter value, coerced into its declared range
    /// (NaN becomes the default).
    pub fn get(&self, param: Param) -> f64 {
        self.slots[param as usize].load(param.spec())
    }

    /// Resets every parameter to its default.
    pub fn reset(&self) {
        for param in ALL_PARAMS {
            self.set(param, param.spec().default);
        }
    }

    pub(crate) fn block_params(&self) -> BlockParams {
        BlockParams {
            frequency: self.get(Param::Frequency),
            vibrato_amount: self.get(Param::VibratoAmount),
            vibrato_frequency: self.get(Param::VibratoFrequency),
            tract_length: self.get(Param::TractLength),
            tongue_index: self.get(Param::TongueIndex),
            tongue_diameter: self.get(Param::TongueDiameter),
            movement_speed: self.get(Param::MovementSpeed),
            transient_strength: self.get(Param::TransientStrength),
        }
    }

    pub(crate) fn sample_params(&self) -> SampleParams {
        SampleParams {
            intensity: self.get(Param::Intensity),
            tenseness: self.get(Param::Tenseness),
            tenseness_mult: self.get(Param::TensenessMult),
            pitchbend: self.get(Param::Pitchbend),
            velum_target: self.get(Param::VelumTarget),
            constriction_index: self.get(Param::ConstrictionIndex),
            constriction_diameter: self.get(Param::ConstrictionDiameter),
            lip_diameter: self.get(Param::LipDiameter),
            fricative_strength: self.get(Param::FricativeStrength),
        }
    }

    /// Drops a snapshot into the telemetry channel. Never blocks; snapshots
    /// are discarded when the reader falls behind.
    #[cfg(feature = "std")]
    pub(crate) fn push_snapshot(&self, snapshot: TractSnapshot) {
        let _ = self.telemetry_tx.try_send(snapshot);
    }

    /// Takes the next pending telemetry snapshot, if any.
    #[cfg(feature = "std")]
    pub fn poll_snapshot(&self) -> Option<TractSnapshot> {
        self.telemetry_rx.try_recv().ok()
    }
}
