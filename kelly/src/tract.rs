//! The vocal-tract waveguide.
//!
//! Sound propagation through the mouth is modeled as a one-dimensional
//! digital waveguide: right- and left-travelling wave components scatter at
//! Kelly-Lochbaum junctions whose reflection coefficients follow the
//! cross-sectional area of each segment. A shorter side branch for the nasal
//! cavity couples in at a three-port junction behind the velum. The network
//! is advanced twice per output sample, which keeps the scattering stable at
//! common audio rates while tract areas move.

use crate::math::{cos, fabs, floor, pow, round};
use crate::params::{MAX_TRACT_LENGTH, TractSnapshot};
use alloc::vec;
use alloc::vec::Vec;
use core::f64::consts::PI;

/// Minimum supported tract length in segments.
pub const MIN_TRACT_LENGTH: usize = 30;

/// Upper bound on simultaneously live transients. Each one lives 0.2 s and
/// requires a full closure before it, so the cap is never reached in
/// practice.
const MAX_TRANSIENTS: usize = 32;

/// An impulsive release added to the waveguide where a full closure has just
/// reopened: the burst of a plosive.
struct Transient {
    position: usize,
    time_alive: f64,
    life_time: f64,
    strength: f64,
    exponent: f64,
}

//--- Waveguide ----------------------------------------------------------------

/// The oral waveguide, its nasal side branch, and the shape controller that
/// moves both.
///
/// Control fields are written by the owning voice (or directly, when the
/// tract is used standalone). Geometry changes only reach the scattering
/// network through `target_diameter` easing and the old/new reflection pairs,
/// both advanced once per block.
pub struct Tract {
    sample_rate: f64,
    n: usize,

    // Landmark indices derived from n:
    blade_start: usize,
    tip_start: usize,
    lip_start: usize,
    nose_length: usize,
    nose_start: usize,

    // Area function:
    diameter: Vec<f64>,
    rest_diameter: Vec<f64>,
    target_diameter: Vec<f64>,
    area: Vec<f64>,

    // Waveguide state:
    right: Vec<f64>,
    left: Vec<f64>,
    junction_output_right: Vec<f64>,
    junction_output_left: Vec<f64>,
    reflection: Vec<f64>,
    new_reflection: Vec<f64>,

    // Nasal side branch:
    nose_right: Vec<f64>,
    nose_left: Vec<f64>,
    nose_junction_output_right: Vec<f64>,
    nose_junction_output_left: Vec<f64>,
    nose_reflection: Vec<f64>,
    nose_diameter: Vec<f64>,
    nose_area: Vec<f64>,

    // Three-port junction coefficients, old/new pairs:
    reflection_left: f64,
    reflection_right: f64,
    reflection_nose: f64,
    new_reflection_left: f64,
    new_reflection_right: f64,
    new_reflection_nose: f64,

    glottal_reflection: f64,
    lip_reflection: f64,
    fade: f64,

    // Live control, written per block or per sample by the driver:
    /// Easing rate toward target diameters in cm/s; negative snaps instantly.
    pub movement_speed: f64,
    /// Target nose diameter at the velum in cm.
    pub velum_target: f64,
    /// Position of the tongue-tip constriction in segments.
    pub constriction_index: f64,
    /// Aperture at the constriction in cm.
    pub constriction_diameter: f64,
    /// Tongue-body horizontal position in segments.
    pub tongue_index: f64,
    /// Tongue-body vertical diameter in cm.
    pub tongue_diameter: f64,
    /// Lip aperture in cm.
    pub lip_diameter: f64,
    /// Turbulence-noise gain.
    pub fricative_strength: f64,
    /// Release-click gain.
    pub transient_strength: f64,

    /// Velum opening the reshape pass eases toward; the shape rules may pin
    /// it open in nasal context regardless of `velum_target`.
    velum_goal: f64,
    /// Segment index of the most recent fully-closed point, or -1.
    last_obstruction: isize,
    transients: Vec<Transient>,

    lip_output: f64,
    nose_output: f64,
}

impl Tract {
    pub fn new(sample_rate: usize, n: usize) -> Self {
        let mut tract = Tract {
            sample_rate: sample_rate as f64,
            n: 0,
            blade_start: 0,
            tip_start: 0,
            lip_start: 0,
            nose_length: 0,
            nose_start: 0,
            diameter: Vec::new(),
            rest_diameter: Vec::new(),
            target_diameter: Vec::new(),
            area: Vec::new(),
            right: Vec::new(),
            left: Vec::new(),
            junction_output_right: Vec::new(),
            junction_output_left: Vec::new(),
            reflection: Vec::new(),
            new_reflection: Vec::new(),
            nose_right: Vec::new(),
            nose_left: Vec::new(),
            nose_junction_output_right: Vec::new(),
            nose_junction_output_left: Vec::new(),
            nose_reflection: Vec::new(),
            nose_diameter: Vec::new(),
            nose_area: Vec::new(),
            reflection_left: 0.0,
            reflection_right: 0.0,
            reflection_nose: 0.0,
            new_reflection_left: 0.0,
            new_reflection_right: 0.0,
            new_reflection_nose: 0.0,
            glottal_reflection: 0.75,
            lip_reflection: -0.85,
            fade: 0.999,
            movement_speed: 15.0,
            velum_target: 0.01,
            constriction_index: 0.0,
            constriction_diameter: 3.0,
            tongue_index: 0.0,
            tongue_diameter: 2.43,
            lip_diameter: 1.5,
            fricative_strength: 1.0,
            transient_strength: 1.0,
            velum_goal: 0.01,
            last_obstruction: -1,
            transients: Vec::with_capacity(MAX_TRANSIENTS),
            lip_output: 0.0,
            nose_output: 0.0,
        };
        tract.init(n);
        tract
    }

    /// Reallocates and reseeds the whole waveguide for a tract of `n`
    /// segments (clamped to the supported range). Must only be called at a
    /// block boundary; mid-stream calls may click.
    pub fn init(&mut self, n: usize) {
        let n = n.clamp(MIN_TRACT_LENGTH, MAX_TRACT_LENGTH);
        self.n = n;
        self.blade_start = 10 * n / 44;
        self.tip_start = 32 * n / 44;
        self.lip_start = 39 * n / 44;
        self.nose_length = 28 * n / 44;
        self.nose_start = n - self.nose_length + 1;
        self.tongue_index =
            ((self.blade_start + 2) as f64 + (self.tip_start - 3) as f64) / 2.0;

        self.diameter = vec![0.0; n];
        self.rest_diameter = vec![0.0; n];
        self.target_diameter = vec![0.0; n];
        self.area = vec![0.0; n];
        self.right = vec![0.0; n];
        self.left = vec![0.0; n];
        self.junction_output_right = vec![0.0; n + 1];
        self.junction_output_left = vec![0.0; n + 1];
        self.reflection = vec![0.0; n + 1];
        self.new_reflection = vec![0.0; n + 1];

        for i in 0..n {
            let position = i as f64;
            let diameter = if position < 7.0 * n as f64 / 44.0 - 0.5 {
                0.6
            } else if position < 12.0 * n as f64 / 44.0 {
                1.1
            } else {
                1.5
            };
            self.diameter[i] = diameter;
            self.rest_diameter[i] = diameter;
            self.target_diameter[i] = diameter;
        }

        let m = self.nose_length;
        self.nose_right = vec![0.0; m];
        self.nose_left = vec![0.0; m];
        self.nose_junction_output_right = vec![0.0; m + 1];
        self.nose_junction_output_left = vec![0.0; m + 1];
        self.nose_reflection = vec![0.0; m + 1];
        self.nose_diameter = vec![0.0; m];
        self.nose_area = vec![0.0; m];
        for i in 0..m {
            let d = 2.0 * i as f64 / m as f64;
            let diameter = if d < 1.0 { 0.4 + 1.6 * d } else { 0.5 + 1.5 * (2.0 - d) };
            self.nose_diameter[i] = f64::min(diameter, 1.9);
        }

        self.calculate_nose_reflections();
        self.calculate_reflections();
        // Start with settled coefficients so the first block does not
        // interpolate from zero.
        self.reflection.copy_from_slice(&self.new_reflection);
        self.reflection_left = self.new_reflection_left;
        self.reflection_right = self.new_reflection_right;
        self.reflection_nose = self.new_reflection_nose;

        self.nose_diameter[0] = self.velum_target;
        self.nose_area[0] = self.nose_diameter[0] * self.nose_diameter[0];

        self.last_obstruction = -1;
        self.transients.clear();
        self.lip_output = 0.0;
        self.nose_output = 0.0;
    }

    /// Current tract length in segments.
    pub fn segment_count(&self) -> usize {
        self.n
    }

    /// Segment range the tongue body can occupy.
    pub fn tongue_range(&self) -> (f64, f64) {
        ((self.blade_start + 2) as f64, (self.tip_start - 3) as f64)
    }

    /// Sum of the lip and nose outputs of the last run step.
    pub fn step_output(&self) -> f64 {
        self.lip_output + self.nose_output
    }

    /// Lip-radiated component of the last run step.
    pub fn last_lip_output(&self) -> f64 {
        self.lip_output
    }

    /// Nose-radiated component of the last run step.
    pub fn last_nose_output(&self) -> f64 {
        self.nose_output
    }

    /// Number of live transients.
    pub fn transient_count(&self) -> usize {
        self.transients.len()
    }

    /// End-of-block geometry for UI rendering.
    pub fn snapshot(&self) -> TractSnapshot {
        let mut diameter = [0.0; MAX_TRACT_LENGTH];
        diameter[..self.n].copy_from_slice(&self.diameter);
        TractSnapshot { n: self.n, diameter, nose_diameter_0: self.nose_diameter[0] }
    }

    //--- Per-sample scattering ------------------------------------------------

    /// Advances the scattering network by one half-sample step. `lambda` is
    /// the position of this step within the block, used to interpolate
    /// between the old and new reflection coefficients.
    pub fn run_step(
        &mut self,
        glottal_output: f64,
        turbulence_noise: f64,
        lambda: f64,
        noise_mod: f64,
    ) {
        self.process_transients();
        self.add_turbulence_noise(turbulence_noise, noise_mod);

        let n = self.n;
        self.junction_output_right[0] = self.left[0] * self.glottal_reflection + glottal_output;
        self.junction_output_left[n] = self.right[n - 1] * self.lip_reflection;

        for i in 1..n {
            let r = self.reflection[i] * (1.0 - lambda) + self.new_reflection[i] * lambda;
            let w = r * (self.right[i - 1] + self.left[i]);
            self.junction_output_right[i] = self.right[i - 1] - w;
            self.junction_output_left[i] = self.left[i] + w;
        }

        // Three-port junction where the nasal branch couples in.
        let i = self.nose_start;
        let r = self.reflection_left * (1.0 - lambda) + self.new_reflection_left * lambda;
        self.junction_output_left[i] =
            r * self.right[i - 1] + (1.0 + r) * (self.nose_left[0] + self.left[i]);
        let r = self.reflection_right * (1.0 - lambda) + self.new_reflection_right * lambda;
        self.junction_output_right[i] =
            r * self.left[i] + (1.0 + r) * (self.right[i - 1] + self.nose_left[0]);
        let r = self.reflection_nose * (1.0 - lambda) + self.new_reflection_nose * lambda;
        self.nose_junction_output_right[0] =
            r * self.nose_left[0] + (1.0 + r) * (self.left[i] + self.right[i - 1]);

        for i in 0..n {
            self.right[i] = self.junction_output_right[i] * self.fade;
            self.left[i] = self.junction_output_left[i + 1] * self.fade;
        }
        self.lip_output = self.right[n - 1];

        let m = self.nose_length;
        self.nose_junction_output_left[m] = self.nose_right[m - 1] * self.lip_reflection;
        for i in 1..m {
            let w = self.nose_reflection[i] * (self.nose_right[i - 1] + self.nose_left[i]);
            self.nose_junction_output_right[i] = self.nose_right[i - 1] - w;
            self.nose_junction_output_left[i] = self.nose_left[i] + w;
        }
        for i in 0..m {
            self.nose_right[i] = self.nose_junction_output_right[i] * self.fade;
            self.nose_left[i] = self.nose_junction_output_left[i + 1] * self.fade;
        }
        self.nose_output = self.nose_right[m - 1];
    }

    /// Processes one block: filters `glottal_in` through the waveguide with
    /// turbulence from `fricative_in` gated by `noise_mod_in`, then advances
    /// the tract shape. `out` defines the block length; short inputs are read
    /// as zero.
    pub fn process_block(
        &mut self,
        glottal_in: &[f64],
        fricative_in: &[f64],
        noise_mod_in: &[f64],
        out: &mut [f64],
    ) {
        let len = out.len();
        if len == 0 {
            return;
        }
        for (j, sample) in out.iter_mut().enumerate() {
            let glottal = glottal_in.get(j).copied().unwrap_or(0.0);
            let fricative = fricative_in.get(j).copied().unwrap_or(0.0);
            let noise_mod = noise_mod_in.get(j).copied().unwrap_or(0.0);
            let lambda1 = j as f64 / len as f64;
            let lambda2 = (j as f64 + 0.5) / len as f64;

            self.run_step(glottal, fricative, lambda1, noise_mod);
            let mut output = self.lip_output + self.nose_output;
            self.run_step(glottal, fricative, lambda2, noise_mod);
            output += self.lip_output + self.nose_output;
            *sample = output * 0.125;
        }
        self.finish_block(len as f64 / self.sample_rate);
    }

    fn process_transients(&mut self) {
        // Transients age half a sample per run step, so one output sample
        // per sample of real time; the tract itself steps twice per sample.
        let time_step = 1.0 / (2.0 * self.sample_rate);
        for transient in &mut self.transients {
            let amplitude = transient.strength * pow(2.0, -transient.exponent * transient.time_alive);
            self.right[transient.position] += amplitude / 2.0;
            self.left[transient.position] += amplitude / 2.0;
            transient.time_alive += time_step;
        }
        self.transients.retain(|transient| transient.time_alive <= transient.life_time);
    }

    fn add_transient(&mut self, position: usize) {
        if self.transients.len() < MAX_TRANSIENTS {
            self.transients.push(Transient {
                position,
                time_alive: 0.0,
                life_time: 0.2,
                strength: 0.3 * self.transient_strength,
                exponent: 200.0,
            });
        }
    }

    fn add_turbulence_noise(&mut self, turbulence_noise: f64, noise_mod: f64) {
        let index = self.constriction_index;
        let diameter = self.constriction_diameter;
        if index < 2.0 || index > self.n as f64 {
            return;
        }
        if diameter <= 0.0 {
            return;
        }
        let intensity = self.fricative_strength * 2.0;
        self.add_turbulence_noise_at_index(intensity * turbulence_noise, index, diameter, noise_mod);
    }

    fn add_turbulence_noise_at_index(
        &mut self,
        turbulence_noise: f64,
        index: f64,
        diameter: f64,
        noise_mod: f64,
    ) {
        let i = floor(index) as usize;
        let delta = index - i as f64;
        let noise = turbulence_noise * noise_mod;
        // Turbulence only sounds for narrow-but-open constrictions: it fades
        // out above 0.7 cm and below 0.3 cm of opening.
        let thinness = (8.0 * (0.7 - diameter)).clamp(0.0, 1.0);
        let openness = (30.0 * (diameter - 0.3)).clamp(0.0, 1.0);
        let noise0 = noise * (1.0 - delta) * thinness * openness;
        let noise1 = noise * delta * thinness * openness;
        if i + 1 < self.n {
            self.right[i + 1] += noise0 / 2.0;
            self.left[i + 1] += noise0 / 2.0;
        }
        if i + 2 < self.n {
            self.right[i + 2] += noise1 / 2.0;
            self.left[i + 2] += noise1 / 2.0;
        }
    }

    //--- Shape controller -----------------------------------------------------

    /// Rebuilds `target_diameter` from the rest profile, the tongue body, the
    /// tongue-tip constriction and the lip aperture, in that order, and
    /// decides the velum goal for this block.
    pub fn set_target_diameters(&mut self) {
        self.set_rest_diameter();
        self.target_diameter.copy_from_slice(&self.rest_diameter);
        self.velum_goal = self.velum_target;

        if self.constriction_index > 0.0 && self.constriction_diameter > -1.6 {
            if self.constriction_index > self.nose_start as f64
                && self.constriction_diameter < -0.8
            {
                self.velum_goal = 0.4;
            }
            let diameter = f64::max(0.0, self.constriction_diameter - 0.3);
            let width = self.constriction_width(self.constriction_index);
            self.apply_constriction(self.constriction_index, diameter, width);
        }

        self.apply_constriction((self.n - 2) as f64, self.lip_diameter, 5.0);
    }

    /// Overlays the tongue-body curve onto the rest profile between the blade
    /// and the lips.
    fn set_rest_diameter(&mut self) {
        for i in self.blade_start..self.lip_start {
            let t = 1.1 * PI * (self.tongue_index - i as f64)
                / ((self.tip_start - self.blade_start) as f64);
            let fixed_tongue_diameter = 2.0 + (self.tongue_diameter - 2.0) / 1.5;
            let mut curve = (1.5 - fixed_tongue_diameter + 1.7) * cos(t);
            if i == self.blade_start - 2 || i == self.lip_start - 1 {
                curve *= 0.8;
            }
            if i == self.blade_start || i == self.lip_start - 2 {
                curve *= 0.94;
            }
            self.rest_diameter[i] = 1.5 - curve;
        }
    }

    /// Width of the tongue-tip constriction in segments: 10 towards the
    /// palate, narrowing to 5 at the tongue tip, scaled with tract length.
    fn constriction_width(&self, index: f64) -> f64 {
        let scale = self.n as f64 / 44.0;
        let lower = 25.0 * scale;
        let upper = self.tip_start as f64;
        let width = if index < lower {
            10.0
        } else if index >= upper {
            5.0
        } else {
            10.0 - 5.0 * (index - lower) / (upper - lower)
        };
        width * scale
    }

    /// Shrinks `target_diameter` toward `diameter` in a raised-cosine window
    /// of `width` segments around `index`. Segments the window misses keep
    /// their target; segments already narrower are left alone.
    fn apply_constriction(&mut self, index: f64, diameter: f64, width: f64) {
        let int_index = round(index);
        let fractional = index - int_index;
        let ceil_width = if floor(width) < width { floor(width) + 1.0 } else { floor(width) };
        // The window runs from -ceil(width) - 1 up to the last integer below
        // width + 1.
        let mut k = -(ceil_width as i64) - 1;
        while (k as f64) < width + 1.0 {
            let position = int_index as i64 + k;
            if position >= 0 && position < self.n as i64 {
                let position = position as usize;
                let relative = fabs(k as f64 - fractional) - 0.5;
                let shrink = if relative <= 0.0 {
                    0.0
                } else if relative > width {
                    1.0
                } else {
                    0.5 * (1.0 - cos(PI * relative / width))
                };
                if diameter < self.target_diameter[position] {
                    self.target_diameter[position] =
                        diameter + (self.target_diameter[position] - diameter) * shrink;
                }
            }
            k += 1;
        }
    }

    //--- Block finalization ---------------------------------------------------

    /// Recomputes targets, eases the area function toward them, and refreshes
    /// the reflection coefficients for the next block.
    pub fn finish_block(&mut self, block_time: f64) {
        self.set_target_diameters();
        self.reshape(block_time);
        self.calculate_reflections();
    }

    /// Eases `diameter` toward `target_diameter` at position-dependent rates
    /// and tracks full closures for transient generation.
    fn reshape(&mut self, delta_time: f64) {
        let amount = delta_time * self.movement_speed;
        let instant = self.movement_speed < 0.0;
        let mut new_last_obstruction: isize = -1;

        for i in 0..self.n {
            let current = self.diameter[i];
            let target = self.target_diameter[i];
            if current <= 0.0 {
                new_last_obstruction = i as isize;
            }
            let slow_return = if i < self.nose_start {
                0.6
            } else if i >= self.tip_start {
                1.0
            } else {
                0.6 + 0.4 * (i - self.nose_start) as f64
                    / ((self.tip_start - self.nose_start) as f64)
            };
            self.diameter[i] = if instant {
                target
            } else {
                move_towards(current, target, slow_return * amount, 2.0 * amount)
            };
        }

        if self.last_obstruction > -1
            && new_last_obstruction == -1
            && self.nose_area[0] < 0.05
            && self.fricative_strength > 0.0
        {
            self.add_transient(self.last_obstruction as usize);
        }
        self.last_obstruction = new_last_obstruction;

        self.nose_diameter[0] = if instant {
            self.velum_goal
        } else {
            move_towards(self.nose_diameter[0], self.velum_goal, amount * 0.25, amount * 0.1)
        };
        self.nose_area[0] = self.nose_diameter[0] * self.nose_diameter[0];
    }

    /// Derives the next set of reflection coefficients from the area
    /// function. A closed segment reflects 0.999 rather than 1.0 so no
    /// junction can sustain energy indefinitely.
    fn calculate_reflections(&mut self) {
        for i in 0..self.n {
            self.area[i] = self.diameter[i] * self.diameter[i];
        }
        for i in 1..self.n {
            self.reflection[i] = self.new_reflection[i];
            self.new_reflection[i] = if self.area[i] == 0.0 {
                0.999
            } else {
                (self.area[i - 1] - self.area[i]) / (self.area[i - 1] + self.area[i])
            };
        }

        self.reflection_left = self.new_reflection_left;
        self.reflection_right = self.new_reflection_right;
        self.reflection_nose = self.new_reflection_nose;
        let sum = self.area[self.nose_start] + self.area[self.nose_start + 1] + self.nose_area[0];
        // A junction sealed on all three ports (closure over the coupling
        // with the velum shut) keeps its last coefficients; the fade
        // dissipates whatever is trapped behind it.
        if sum > 0.0 {
            self.new_reflection_left = (2.0 * self.area[self.nose_start] - sum) / sum;
            self.new_reflection_right = (2.0 * self.area[self.nose_start + 1] - sum) / sum;
            self.new_reflection_nose = (2.0 * self.nose_area[0] - sum) / sum;
        }
    }

    /// Nasal-branch reflections depend only on the fixed nose profile, so
    /// they are computed once at init.
    fn calculate_nose_reflections(&mut self) {
        for i in 0..self.nose_length {
            self.nose_area[i] = self.nose_diameter[i] * self.nose_diameter[i];
        }
        for i in 1..self.nose_length {
            self.nose_reflection[i] = (self.nose_area[i - 1] - self.nose_area[i])
                / (self.nose_area[i - 1] + self.nose_area[i]);
        }
    }
}

/// Moves `current` toward `target`, rising at most `up` and falling at most
/// `down`.
fn move_towards(current: f64, target: f64, up: f64, down: f64) -> f64 {
    if current < target {
        f64::min(current + up, target)
    } else {
        f64::max(current - down, target)
    }
}
