//! Word-to-command mapping.
//!
//! Pure functions: a word plus the coefficient snapshot give a frequency or
//! a note. Nothing is clamped here; ranges are the settings' business.

use bs_core::{BitWidth, Command, FrequencyCoefficients, FrequencyMode, Settings};

use crate::lattice::NoteLattice;

/// Offset added to the lowest frequency so word 0 never maps to a zero or
/// denormal target, which exponential ramps reject.
pub const FREQUENCY_EPSILON: f64 = 0.01;

/// Continuous mapping: `coeff * word + min_frequency`, word 0 lifted by
/// [`FREQUENCY_EPSILON`].
pub fn map_continuous(
    word: u16,
    width: BitWidth,
    coefficients: &FrequencyCoefficients,
    min_frequency: f64,
) -> f64 {
    if word == 0 {
        return min_frequency + FREQUENCY_EPSILON;
    }
    coefficients.continuous(width) * word as f64 + min_frequency
}

/// Tempered mapping: lattice index `floor(coeff * word) + round(min_note)`.
pub fn map_tempered(
    word: u16,
    width: BitWidth,
    coefficients: &FrequencyCoefficients,
    min_note: f64,
) -> i32 {
    libm::floor(coefficients.tempered(width) * word as f64) as i32 + libm::round(min_note) as i32
}

/// A mapper bound to one `{bit width, mode}` pair and a coefficient snapshot.
#[derive(Clone, Copy, Debug)]
pub struct CommandMapper<'a> {
    width: BitWidth,
    mode: FrequencyMode,
    min_frequency: f64,
    min_note: f64,
    coefficients: &'a FrequencyCoefficients,
    lattice: &'a NoteLattice,
}

impl<'a> CommandMapper<'a> {
    pub fn new(
        settings: &Settings,
        coefficients: &'a FrequencyCoefficients,
        lattice: &'a NoteLattice,
    ) -> Self {
        Self {
            width: settings.bit_width,
            mode: settings.frequency_mode,
            min_frequency: settings.frequency_range.from,
            min_note: settings.note_range.from as f64,
            coefficients,
            lattice,
        }
    }

    /// Oscillator command: a frequency in either mode.
    pub fn oscillator(&self, word: u16) -> Command {
        let frequency = match self.mode {
            FrequencyMode::Continuous => Some(map_continuous(
                word,
                self.width,
                self.coefficients,
                self.min_frequency,
            )),
            FrequencyMode::Tempered => self.lattice.frequency(self.tempered_index(word)),
        };
        Command::Frequency(frequency)
    }

    /// MIDI command: a bent note in continuous mode, a plain note in tempered mode.
    pub fn midi(&self, word: u16) -> Command {
        match self.mode {
            FrequencyMode::Continuous => {
                let frequency =
                    map_continuous(word, self.width, self.coefficients, self.min_frequency);
                let (note, bend) = self.lattice.quantize(frequency);
                Command::BentNote { note, bend }
            }
            FrequencyMode::Tempered => Command::Note(self.tempered_index(word).clamp(0, 127) as u8),
        }
    }

    pub fn command(&self, word: u16, midi: bool) -> Command {
        if midi {
            self.midi(word)
        } else {
            self.oscillator(word)
        }
    }

    fn tempered_index(&self, word: u16) -> i32 {
        map_tempered(word, self.width, self.coefficients, self.min_note)
    }
}
