//! Sine tone generator driven by a [`ParamTimeline`].

use core::f64::consts::TAU;

use crate::automation::ParamTimeline;

/// One rendered stereo sample pair.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Frame {
    pub left: i16,
    pub right: i16,
}

impl Frame {
    pub const fn silence() -> Self {
        Self::mono(0)
    }

    pub const fn mono(value: i16) -> Self {
        Self { left: value, right: value }
    }

    /// Scale a sample in [-1, 1] to full range; anything outside clips.
    pub fn from_f32(sample: f32) -> Self {
        Self::mono((sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)
    }

    pub fn is_silent(&self) -> bool {
        *self == Self::silence()
    }
}

/// Peak level of the generated tone before gain.
const AMPLITUDE: f64 = 0.5;

/// Renders the oscillator the engine automates.
#[derive(Clone, Debug)]
pub struct ToneGenerator {
    sample_rate: u32,
    /// Phase in cycles, kept in [0, 1).
    phase: f64,
}

impl ToneGenerator {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate: sample_rate.max(1),
            phase: 0.0,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Change the rate; the phase carries over.
    pub fn set_sample_rate(&mut self, sample_rate: u32) {
        self.sample_rate = sample_rate.max(1);
    }

    /// Seconds covered by `frames` frames.
    pub fn duration(&self, frames: usize) -> f64 {
        frames as f64 / self.sample_rate as f64
    }

    /// One frame at absolute time `time`.
    pub fn next_frame(&mut self, timeline: &ParamTimeline, time: f64) -> Frame {
        if !timeline.is_running(time) {
            self.phase = 0.0;
            return Frame::silence();
        }

        let nyquist = self.sample_rate as f64 / 2.0;
        let frequency = timeline.value_at(time).clamp(0.0, nyquist);
        let gain = timeline.gain_at(time).clamp(0.0, 1.0);
        let sample = libm::sin(TAU * self.phase) * gain * AMPLITUDE;

        self.phase += frequency / self.sample_rate as f64;
        self.phase -= libm::floor(self.phase);
        Frame::from_f32(sample as f32)
    }

    /// Fill `out` with consecutive frames starting at `start`.
    pub fn render(&mut self, timeline: &ParamTimeline, start: f64, out: &mut [Frame]) {
        let dt = 1.0 / self.sample_rate as f64;
        for (i, frame) in out.iter_mut().enumerate() {
            *frame = self.next_frame(timeline, start + i as f64 * dt);
        }
    }
}
