//! MIDI channel messages and the byte-send contract.

use arrayvec::ArrayVec;

const NOTE_OFF: u8 = 0x80;
const NOTE_ON: u8 = 0x90;
const CONTROL_CHANGE: u8 = 0xB0;
const PITCH_BEND: u8 = 0xE0;

const CC_MODULATION: u8 = 0x01;
const CC_ALL_SOUND_OFF: u8 = 0x78;

/// A channel voice message, without its channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MidiMessage {
    NoteOn { note: u8, velocity: u8 },
    NoteOff { note: u8, velocity: u8 },
    /// 14-bit value. Bends are centered on [`bs_core::PITCH_BEND_CENTER`] (8191).
    PitchBend(u16),
    /// CC1.
    Modulation(u8),
    /// CC120.
    AllSoundOff,
}

impl MidiMessage {
    /// Wire bytes for `channel` (low four bits used).
    pub fn encode(&self, channel: u8) -> ArrayVec<u8, 3> {
        let ch = channel & 0x0f;
        let bytes = match *self {
            MidiMessage::NoteOn { note, velocity } => [NOTE_ON | ch, note & 0x7f, velocity & 0x7f],
            MidiMessage::NoteOff { note, velocity } => [NOTE_OFF | ch, note & 0x7f, velocity & 0x7f],
            MidiMessage::PitchBend(value) => {
                let value = value.min(0x3fff);
                [PITCH_BEND | ch, (value & 0x7f) as u8, (value >> 7) as u8]
            }
            MidiMessage::Modulation(value) => [CONTROL_CHANGE | ch, CC_MODULATION, value & 0x7f],
            MidiMessage::AllSoundOff => [CONTROL_CHANGE | ch, CC_ALL_SOUND_OFF, 0],
        };
        ArrayVec::from(bytes)
    }
}

/// Raw byte transport to a MIDI device.
pub trait MidiSink {
    fn send(&mut self, message: &[u8]);

    fn send_message(&mut self, message: MidiMessage, channel: u8) {
        self.send(&message.encode(channel));
    }
}

/// An absent port drops every message.
impl<M: MidiSink> MidiSink for Option<M> {
    fn send(&mut self, message: &[u8]) {
        if let Some(sink) = self {
            sink.send(message);
        }
    }
}

/// Sink that discards everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullMidi;

impl MidiSink for NullMidi {
    fn send(&mut self, _message: &[u8]) {}
}
