//! Commands derived from source words.

/// Neutral 14-bit pitch bend. All bends are computed around this value.
pub const PITCH_BEND_CENTER: u16 = 8191;

/// Bend units covering the distance between two neighbouring lattice notes.
pub const PITCH_BEND_SPAN: u16 = 4096;

/// What a single word asks the output to do. Never stored past the block
/// it was planned for; recomputed from the word and the current
/// coefficients on demand.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Command {
    /// Oscillator frequency in Hz. `None` when the word maps outside the
    /// note lattice.
    Frequency(Option<f64>),
    /// Tempered MIDI note.
    Note(u8),
    /// Continuous MIDI: nearest lower note plus a pitch bend toward the next.
    BentNote { note: u8, bend: u16 },
}

impl Command {
    /// MIDI note number, if this is a MIDI command.
    pub fn note(&self) -> Option<u8> {
        match self {
            Command::Frequency(_) => None,
            Command::Note(note) | Command::BentNote { note, .. } => Some(*note),
        }
    }

    pub fn bend(&self) -> Option<u16> {
        match self {
            Command::BentNote { bend, .. } => Some(*bend),
            _ => None,
        }
    }
}
