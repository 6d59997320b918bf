//! Audio and MIDI output backends for bytesonic.

mod cpal_backend;
mod midi_output;
mod traits;

pub use cpal_backend::CpalOutput;
pub use midi_output::{list_ports, MidiPortInfo, MidirOutput};
pub use traits::{AudioError, AudioOutput};
