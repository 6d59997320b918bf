//! Linear word-to-pitch coefficients.

use crate::bit_width::BitWidth;
use crate::settings::{FrequencyRange, NoteRange, Settings};

/// Slopes mapping a raw word onto a frequency offset (continuous) or a
/// fractional note offset (tempered), one per bit width.
///
/// Must be rebuilt whenever the frequency range, note range or sample rate
/// changes, before any command is mapped again.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrequencyCoefficients {
    pub continuous8: f64,
    pub continuous16: f64,
    pub tempered8: f64,
    pub tempered16: f64,
}

impl FrequencyCoefficients {
    /// Continuous: the largest word lands exactly on `range.to`.
    /// Tempered: the word space is split into equal bins, one per note of
    /// the inclusive note range.
    pub fn derive(range: FrequencyRange, notes: NoteRange) -> Self {
        let span = range.to - range.from;
        let note_count = notes.to as f64 - notes.from as f64 + 1.0;
        let continuous = |w: BitWidth| span / w.max_value() as f64;
        let tempered = |w: BitWidth| note_count / (w.max_value() as f64 + 1.0);
        Self {
            continuous8: continuous(BitWidth::Eight),
            continuous16: continuous(BitWidth::Sixteen),
            tempered8: tempered(BitWidth::Eight),
            tempered16: tempered(BitWidth::Sixteen),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::derive(settings.frequency_range, settings.note_range)
    }

    pub fn continuous(&self, width: BitWidth) -> f64 {
        match width {
            BitWidth::Eight => self.continuous8,
            BitWidth::Sixteen => self.continuous16,
        }
    }

    pub fn tempered(&self, width: BitWidth) -> f64 {
        match width {
            BitWidth::Eight => self.tempered8,
            BitWidth::Sixteen => self.tempered16,
        }
    }
}

impl Default for FrequencyCoefficients {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}
