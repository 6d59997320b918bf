//! Core data model for the bytesonic playback engine.
//!
//! Defines the byte source, the mutable settings bag, the derived mapping
//! coefficients and the playback status shared between the engine and
//! whatever drives it. No I/O happens here.
//!
//! Designed to be `no_std` compatible with the `alloc` crate.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

mod bit_width;
mod change;
mod coefficients;
mod command;
mod settings;
mod source;
mod status;

pub use bit_width::BitWidth;
pub use change::{ParamChange, ReplanClass};
pub use coefficients::FrequencyCoefficients;
pub use command::{Command, PITCH_BEND_CENTER, PITCH_BEND_SPAN};
pub use settings::{
    Fragment, FrequencyMode, FrequencyRange, MidiSettings, NoteRange, Settings, TransitionCurve,
    MIN_READING_SPEED,
};
pub use source::ByteSource;
pub use status::{BlockRange, PlaybackStatus};
