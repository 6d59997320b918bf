//! Parameter change notifications.

use crate::bit_width::BitWidth;
use crate::settings::{Fragment, FrequencyMode, FrequencyRange, NoteRange, TransitionCurve};

/// A new value for one named parameter.
///
/// The same type carries the old value when [`Settings::apply`] hands back
/// what it replaced.
///
/// [`Settings::apply`]: crate::Settings::apply
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ParamChange {
    ReadingSpeed(f64),
    Transition(TransitionCurve),
    RandomGap(bool),
    FrequencyRange(FrequencyRange),
    NoteRange(NoteRange),
    FrequencyMode(FrequencyMode),
    BitWidth(BitWidth),
    Fragment(Fragment),
    MidiMode(bool),
    SampleRate(u32),
    Gain(f64),
    MidiChannel(u8),
    Velocity(u8),
    Modulation(u8),
    SolidMode(bool),
    Loop(bool),
    FilterCutoff(f64),
    LfoRate(f64),
}

/// What a running playback has to redo after a change.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReplanClass {
    /// Command times move: cancel and reschedule the rest of the block.
    Timing,
    /// Command values move: recompute values in place, keep every timer.
    Range,
    /// Block layout or sink moves: restart planning at the current position.
    Topology,
    /// Applied to the output right away, nothing is rescheduled.
    Output,
    /// Read lazily at the next block boundary or command.
    Passive,
}

impl ParamChange {
    pub fn class(&self) -> ReplanClass {
        match self {
            ParamChange::ReadingSpeed(_) | ParamChange::Transition(_) | ParamChange::RandomGap(_) => {
                ReplanClass::Timing
            }
            ParamChange::FrequencyRange(_)
            | ParamChange::NoteRange(_)
            | ParamChange::FrequencyMode(_) => ReplanClass::Range,
            ParamChange::BitWidth(_)
            | ParamChange::Fragment(_)
            | ParamChange::MidiMode(_)
            | ParamChange::SampleRate(_) => ReplanClass::Topology,
            ParamChange::Gain(_)
            | ParamChange::MidiChannel(_)
            | ParamChange::Velocity(_)
            | ParamChange::Modulation(_)
            | ParamChange::FilterCutoff(_)
            | ParamChange::LfoRate(_) => ReplanClass::Output,
            ParamChange::SolidMode(_) | ParamChange::Loop(_) => ReplanClass::Passive,
        }
    }
}
