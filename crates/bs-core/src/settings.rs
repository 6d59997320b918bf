//! The mutable parameter bag the engine reads while scheduling.

use crate::bit_width::BitWidth;
use crate::change::ParamChange;

/// Shortest reading step the engine will schedule with. Zero or negative
/// steps would make a looping block advance without ever yielding.
pub const MIN_READING_SPEED: f64 = 0.001;

/// How the oscillator moves from one command to the next.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "lowercase")
)]
pub enum TransitionCurve {
    /// Jump to the new value at the command's time.
    #[default]
    Immediate,
    /// Linear ramp ending at the command's time.
    Linear,
    /// Exponential ramp ending at the command's time. Targets must be positive.
    Exponential,
}

/// How a word becomes a pitch.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "lowercase")
)]
pub enum FrequencyMode {
    /// Linear map onto a frequency range.
    #[default]
    Continuous,
    /// Linear map onto a range of tempered notes.
    Tempered,
}

/// Frequency range in Hz used by continuous mode.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FrequencyRange {
    pub from: f64,
    pub to: f64,
}

/// Note range (MIDI note numbers) used by tempered mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NoteRange {
    pub from: u8,
    pub to: u8,
}

/// Inclusive range of word indices to play.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Fragment {
    pub from: usize,
    pub to: usize,
}

impl Fragment {
    /// Clamp both bounds to a view of `len` words. `None` for an empty view.
    pub fn clamp_to(self, len: usize) -> Option<Fragment> {
        let last = len.checked_sub(1)?;
        let to = self.to.min(last);
        let from = self.from.min(to);
        Some(Fragment { from, to })
    }

    pub fn contains(&self, index: usize) -> bool {
        (self.from..=self.to).contains(&index)
    }
}

/// MIDI routing and performance options.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct MidiSettings {
    /// Channel 0-15.
    pub channel: u8,
    pub velocity: u8,
    /// CC1 value.
    pub modulation: u8,
    /// Hold repeated identical commands instead of retriggering them.
    pub solid_mode: bool,
}

impl Default for MidiSettings {
    fn default() -> Self {
        Self {
            channel: 0,
            velocity: 120,
            modulation: 50,
            solid_mode: false,
        }
    }
}

/// All parameters the playback engine reacts to.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct Settings {
    /// Seconds per word.
    pub reading_speed: f64,
    pub transition: TransitionCurve,
    pub frequency_mode: FrequencyMode,
    pub frequency_range: FrequencyRange,
    pub note_range: NoteRange,
    pub fragment: Fragment,
    pub bit_width: BitWidth,
    #[cfg_attr(feature = "serde", serde(rename = "loop"))]
    pub looping: bool,
    pub random_gap: bool,
    pub midi_mode: bool,
    pub midi: MidiSettings,
    pub gain: f64,
    pub sample_rate: u32,
    pub filter_cutoff: f64,
    pub lfo_rate: f64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            reading_speed: 0.01,
            transition: TransitionCurve::Immediate,
            frequency_mode: FrequencyMode::Continuous,
            frequency_range: FrequencyRange { from: 50.0, to: 256.0 },
            note_range: NoteRange { from: 36, to: 48 },
            fragment: Fragment { from: 0, to: 499 },
            bit_width: BitWidth::Eight,
            looping: true,
            random_gap: true,
            midi_mode: false,
            midi: MidiSettings::default(),
            gain: 1.0,
            sample_rate: 44100,
            filter_cutoff: 10000.0,
            lfo_rate: 1.0,
        }
    }
}

impl Settings {
    /// Reading step actually used for scheduling.
    pub fn step_seconds(&self) -> f64 {
        if self.reading_speed.is_finite() && self.reading_speed > MIN_READING_SPEED {
            self.reading_speed
        } else {
            MIN_READING_SPEED
        }
    }

    pub fn nyquist(&self) -> f64 {
        self.sample_rate as f64 / 2.0
    }

    /// Pull every sample-rate dependent value under the Nyquist limit.
    pub fn clamp_to_nyquist(&mut self) {
        let nyquist = self.nyquist();
        self.filter_cutoff = self.filter_cutoff.min(nyquist);
        self.lfo_rate = self.lfo_rate.min(nyquist);
        self.frequency_range.to = self.frequency_range.to.min(nyquist);
        self.frequency_range.from = self.frequency_range.from.min(self.frequency_range.to);
    }

    /// Store `change`, returning the value it replaced, or `None` when the
    /// bag already held that value once masked and clamped.
    pub fn apply(&mut self, change: ParamChange) -> Option<ParamChange> {
        let change = self.normalize(change);
        let old = self.current(&change);
        if old == change {
            return None;
        }
        match change {
            ParamChange::ReadingSpeed(v) => self.reading_speed = v,
            ParamChange::Transition(v) => self.transition = v,
            ParamChange::RandomGap(v) => self.random_gap = v,
            ParamChange::FrequencyRange(v) => self.frequency_range = v,
            ParamChange::NoteRange(v) => self.note_range = v,
            ParamChange::FrequencyMode(v) => self.frequency_mode = v,
            ParamChange::BitWidth(v) => self.bit_width = v,
            ParamChange::Fragment(v) => self.fragment = v,
            ParamChange::MidiMode(v) => self.midi_mode = v,
            ParamChange::SampleRate(v) => self.sample_rate = v,
            ParamChange::Gain(v) => self.gain = v,
            ParamChange::MidiChannel(v) => self.midi.channel = v,
            ParamChange::Velocity(v) => self.midi.velocity = v,
            ParamChange::Modulation(v) => self.midi.modulation = v,
            ParamChange::SolidMode(v) => self.midi.solid_mode = v,
            ParamChange::Loop(v) => self.looping = v,
            ParamChange::FilterCutoff(v) => self.filter_cutoff = v,
            ParamChange::LfoRate(v) => self.lfo_rate = v,
        }
        Some(old)
    }

    /// `change` as it would be stored: MIDI bytes masked to their wire
    /// width, filter and LFO rates clamped to Nyquist.
    fn normalize(&self, change: ParamChange) -> ParamChange {
        match change {
            ParamChange::MidiChannel(v) => ParamChange::MidiChannel(v & 0x0f),
            ParamChange::Velocity(v) => ParamChange::Velocity(v & 0x7f),
            ParamChange::Modulation(v) => ParamChange::Modulation(v & 0x7f),
            ParamChange::FilterCutoff(v) => ParamChange::FilterCutoff(v.min(self.nyquist())),
            ParamChange::LfoRate(v) => ParamChange::LfoRate(v.min(self.nyquist())),
            other => other,
        }
    }

    /// The current value of whichever parameter `like` names.
    pub fn current(&self, like: &ParamChange) -> ParamChange {
        match like {
            ParamChange::ReadingSpeed(_) => ParamChange::ReadingSpeed(self.reading_speed),
            ParamChange::Transition(_) => ParamChange::Transition(self.transition),
            ParamChange::RandomGap(_) => ParamChange::RandomGap(self.random_gap),
            ParamChange::FrequencyRange(_) => ParamChange::FrequencyRange(self.frequency_range),
            ParamChange::NoteRange(_) => ParamChange::NoteRange(self.note_range),
            ParamChange::FrequencyMode(_) => ParamChange::FrequencyMode(self.frequency_mode),
            ParamChange::BitWidth(_) => ParamChange::BitWidth(self.bit_width),
            ParamChange::Fragment(_) => ParamChange::Fragment(self.fragment),
            ParamChange::MidiMode(_) => ParamChange::MidiMode(self.midi_mode),
            ParamChange::SampleRate(_) => ParamChange::SampleRate(self.sample_rate),
            ParamChange::Gain(_) => ParamChange::Gain(self.gain),
            ParamChange::MidiChannel(_) => ParamChange::MidiChannel(self.midi.channel),
            ParamChange::Velocity(_) => ParamChange::Velocity(self.midi.velocity),
            ParamChange::Modulation(_) => ParamChange::Modulation(self.midi.modulation),
            ParamChange::SolidMode(_) => ParamChange::SolidMode(self.midi.solid_mode),
            ParamChange::Loop(_) => ParamChange::Loop(self.looping),
            ParamChange::FilterCutoff(_) => ParamChange::FilterCutoff(self.filter_cutoff),
            ParamChange::LfoRate(_) => ParamChange::LfoRate(self.lfo_rate),
        }
    }
}
