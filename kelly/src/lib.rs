//! Articulatory speech synthesis in Rust.
//!
//! A voice is built from two sample-rate processors: a Liljencrants-Fant
//! glottal pulse generator ([`Glottis`]) and a Kelly-Lochbaum vocal-tract
//! waveguide ([`Tract`]). Feeding the tract a continuously updated set of
//! physical articulation parameters (tongue position, constriction, lip
//! aperture, velum opening) produces vowels, consonants and the transitions
//! between them.
//!
//! *NOTE*: This is _not_ a text-to-speech engine.
//! This is only synthesis from physical parameter trajectories.
//! See examples on how to use this.
//!
//! The host audio graph stays outside: it supplies two band-passed noise
//! streams (see [`filter`] for the conditioning blocks) and receives one mono
//! stream per voice. Parameters travel through the lock-free block in
//! [`params`]; the audio hot path takes no locks and performs no heap
//! allocation.
//!
//! ## `no_std`
//!
//! The crate is `no_std` compatible (with `alloc`). Math comes either from
//! std or from `libm`, selected by feature.

#![cfg_attr(not(feature = "std"), no_std)]
#![deny(
    clippy::all,
    clippy::cargo,
    clippy::pedantic,
    unsafe_code,
    rustdoc::all
)]
// fine for us since loss of precision/sign is not that important, as long as it's the same every time.
#![allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_possible_wrap,
    clippy::must_use_candidate,
    clippy::module_name_repetitions,
    clippy::similar_names,
    clippy::many_single_char_names,
    clippy::doc_markdown
)]

#[cfg(all(feature = "std", feature = "libm"))]
compile_error!("Features \"std\" and \"libm\" are mutually exclusive.");

#[cfg(not(any(feature = "std", feature = "libm")))]
compile_error!("Must specify a math feature: either \"std\" or \"libm\".");

extern crate alloc;

mod math;

pub mod filter;
pub mod glottis;
pub mod noise;
pub mod params;
pub mod presets;
pub mod tract;
pub mod voice;

pub use glottis::{GlottalFrame, Glottis};
pub use params::{Controls, MAX_TRACT_LENGTH, Param, ParamSpec, TractSnapshot};
pub use tract::{MIN_TRACT_LENGTH, Tract};
pub use voice::{Voice, VoiceConfig};
