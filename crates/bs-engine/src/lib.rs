//! Playback scheduling engine for bytesonic.
//!
//! Maps source words to oscillator or MIDI commands, schedules them one
//! block at a time on a timer queue, and supervises play/stop/loop and live
//! reconfiguration.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub mod automation;
pub mod block_planner;
pub mod controller;
mod lattice;
pub mod mapper;
pub mod midi;
pub mod scheduler;
mod sink;
mod timer_queue;
mod tone;

pub use automation::ParamTimeline;
pub use block_planner::{block_size, next_block_end, PlanError, MAX_BLOCK_SIZE};
pub use controller::PlaybackController;
pub use lattice::{NoteLattice, NOTE_COUNT};
pub use mapper::CommandMapper;
pub use midi::{MidiMessage, MidiSink, NullMidi};
pub use scheduler::{EventScheduler, PlanId, TimerEvent};
pub use sink::{NullOscillator, OscillatorSink};
pub use timer_queue::{TimerKey, TimerQueue};
pub use tone::{Frame, ToneGenerator};
