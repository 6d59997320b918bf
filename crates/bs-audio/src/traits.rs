//! Output contract and errors shared by the audio and MIDI backends.

use bs_engine::Frame;

/// Why an output could not be opened or driven.
#[derive(Debug)]
pub enum AudioError {
    NoDevice,
    DeviceInit(String),
    StreamCreate(String),
    Playback(String),
    /// The MIDI client could not be created
    MidiInit(String),
    /// The MIDI port is missing or refused the connection
    MidiPort(String),
}

impl std::fmt::Display for AudioError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AudioError::NoDevice => write!(f, "no audio output device"),
            AudioError::DeviceInit(msg) => write!(f, "audio device: {}", msg),
            AudioError::StreamCreate(msg) => write!(f, "audio stream: {}", msg),
            AudioError::Playback(msg) => write!(f, "audio playback: {}", msg),
            AudioError::MidiInit(msg) => write!(f, "MIDI client: {}", msg),
            AudioError::MidiPort(msg) => write!(f, "MIDI port: {}", msg),
        }
    }
}

impl std::error::Error for AudioError {}

/// A device that plays rendered frames.
pub trait AudioOutput {
    fn sample_rate(&self) -> u32;

    /// Queue as many of `frames` as fit; returns how many were taken.
    fn write(&mut self, frames: &[Frame]) -> Result<usize, AudioError>;

    fn start(&mut self) -> Result<(), AudioError>;

    fn stop(&mut self) -> Result<(), AudioError>;
}
