//! Tempered note lattice.
//!
//! A fixed table of 12-TET frequencies indexed by MIDI note number, used to
//! look up tempered notes and to snap continuous frequencies onto the
//! nearest lower note plus a pitch bend.

use bs_core::{PITCH_BEND_CENTER, PITCH_BEND_SPAN};

/// Number of lattice entries (MIDI notes 0-127).
pub const NOTE_COUNT: usize = 128;

/// Tuning reference: A4.
const REFERENCE_NOTE: i32 = 69;
const REFERENCE_FREQUENCY: f64 = 440.0;

/// Sorted table of note frequencies.
#[derive(Clone, Debug)]
pub struct NoteLattice {
    notes: [f64; NOTE_COUNT],
}

impl NoteLattice {
    /// Standard equal temperament, A4 = 440 Hz.
    pub fn equal_temperament() -> Self {
        let mut notes = [0.0; NOTE_COUNT];
        for (i, slot) in notes.iter_mut().enumerate() {
            let semitones = i as i32 - REFERENCE_NOTE;
            *slot = REFERENCE_FREQUENCY * libm::pow(2.0, semitones as f64 / 12.0);
        }
        Self { notes }
    }

    /// Frequency of note `index`, if it is on the lattice.
    pub fn frequency(&self, index: i32) -> Option<f64> {
        usize::try_from(index).ok().and_then(|i| self.notes.get(i).copied())
    }

    pub fn notes(&self) -> &[f64] {
        &self.notes
    }

    /// Snap `frequency` to `(lower note, pitch bend)`.
    ///
    /// The lower note is the greatest entry strictly below `frequency`; the
    /// bend moves from the center toward the smallest entry strictly above
    /// it. Below the lattice the lower bound is 0 Hz and the note is 0.
    pub fn quantize(&self, frequency: f64) -> (u8, u16) {
        if !frequency.is_finite() {
            return (0, PITCH_BEND_CENTER);
        }

        let below = self.notes.partition_point(|&n| n < frequency);
        let not_above = self.notes.partition_point(|&n| n <= frequency);

        let lower = if below > 0 { self.notes[below - 1] } else { 0.0 };
        let percent = match self.notes.get(not_above) {
            Some(&upper) => round_to((frequency - lower) / (upper - lower) * 100.0, 1),
            None => 0.0,
        };

        let shift = libm::floor(percent / 100.0 * PITCH_BEND_SPAN as f64) as i32;
        let bend = (PITCH_BEND_CENTER as i32 + shift).clamp(
            (PITCH_BEND_CENTER - PITCH_BEND_SPAN) as i32,
            (PITCH_BEND_CENTER + PITCH_BEND_SPAN) as i32,
        ) as u16;

        let note = if below > 0 { (below - 1) as u8 } else { 0 };
        (note, bend)
    }
}

impl Default for NoteLattice {
    fn default() -> Self {
        Self::equal_temperament()
    }
}

/// Round half up to `digits` decimals. Non-finite input rounds to 0.
fn round_to(value: f64, digits: i32) -> f64 {
    if !value.is_finite() {
        return 0.0;
    }
    let pow = libm::pow(10.0, digits as f64);
    libm::floor(value * pow + 0.5) / pow
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn a4_is_440() {
        let lattice = NoteLattice::equal_temperament();
        assert!((lattice.frequency(69).unwrap() - 440.0).abs() < 1e-9);
        assert!((lattice.frequency(81).unwrap() - 880.0).abs() < 1e-9);
    }

    #[test]
    fn lattice_is_sorted() {
        let lattice = NoteLattice::equal_temperament();
        assert!(lattice.notes().windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn frequency_outside_lattice_is_none() {
        let lattice = NoteLattice::equal_temperament();
        assert_eq!(lattice.frequency(-1), None);
        assert_eq!(lattice.frequency(128), None);
    }

    #[test]
    fn quantize_between_notes_picks_lower_and_bends_up() {
        let lattice = NoteLattice::equal_temperament();
        let a4 = lattice.frequency(69).unwrap();
        let bb4 = lattice.frequency(70).unwrap();
        let (note, bend) = lattice.quantize((a4 + bb4) / 2.0);
        assert_eq!(note, 69);
        assert_eq!(bend, PITCH_BEND_CENTER + PITCH_BEND_SPAN / 2);
    }

    #[test]
    fn quantize_bend_stays_in_window_across_lattice() {
        let lattice = NoteLattice::equal_temperament();
        let low = lattice.frequency(0).unwrap();
        let high = lattice.frequency(127).unwrap();
        let mut f = low * 1.0001;
        while f < high {
            let (note, bend) = lattice.quantize(f);
            assert!(bend >= PITCH_BEND_CENTER - PITCH_BEND_SPAN);
            assert!(bend <= PITCH_BEND_CENTER + PITCH_BEND_SPAN);
            // greatest entry strictly below f
            let expected = lattice.notes().iter().rposition(|&n| n < f).unwrap();
            assert_eq!(note as usize, expected);
            f *= 1.013;
        }
    }

    #[test]
    fn exact_lattice_value_snaps_to_previous_note() {
        let lattice = NoteLattice::equal_temperament();
        let (note, bend) = lattice.quantize(440.0);
        assert_eq!(note, 68);
        assert!(bend > PITCH_BEND_CENTER);
    }

    #[test]
    fn below_lattice_reports_note_zero() {
        let lattice = NoteLattice::equal_temperament();
        let (note, bend) = lattice.quantize(1.0);
        assert_eq!(note, 0);
        assert!(bend >= PITCH_BEND_CENTER);
    }

    #[test]
    fn above_lattice_is_unbent() {
        let lattice = NoteLattice::equal_temperament();
        assert_eq!(lattice.quantize(20000.0), (127, PITCH_BEND_CENTER));
    }

    #[test]
    fn non_finite_is_neutral() {
        let lattice = NoteLattice::equal_temperament();
        assert_eq!(lattice.quantize(f64::NAN), (0, PITCH_BEND_CENTER));
    }

    #[test]
    fn round_to_one_decimal() {
        assert_eq!(round_to(12.34, 1), 12.3);
        assert_eq!(round_to(12.36, 1), 12.4);
        assert_eq!(round_to(f64::INFINITY, 1), 0.0);
    }
}
