//! MIDI output over midir.
//!
//! Enumerates output ports and implements the engine's byte-send contract
//! on top of a midir connection.

use bs_engine::MidiSink;
use midir::{MidiOutput, MidiOutputConnection};

use crate::traits::AudioError;

const CLIENT_NAME: &str = "bytesonic";

/// Information about a MIDI output port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MidiPortInfo {
    /// Port index (for connection)
    pub index: usize,
    pub name: String,
}

/// List available MIDI output ports.
pub fn list_ports() -> Result<Vec<MidiPortInfo>, AudioError> {
    let midi_out = MidiOutput::new(CLIENT_NAME).map_err(|e| AudioError::MidiInit(e.to_string()))?;

    let ports = midi_out.ports();
    let mut infos = Vec::with_capacity(ports.len());
    for (index, port) in ports.iter().enumerate() {
        let name = midi_out
            .port_name(port)
            .unwrap_or_else(|_| format!("Unknown Port {}", index));
        infos.push(MidiPortInfo { index, name });
    }
    Ok(infos)
}

/// A connected MIDI output port.
pub struct MidirOutput {
    connection: MidiOutputConnection,
    port_name: String,
}

impl MidirOutput {
    /// Connect to the output port at `index`.
    pub fn connect(index: usize) -> Result<Self, AudioError> {
        let midi_out = MidiOutput::new(CLIENT_NAME).map_err(|e| AudioError::MidiInit(e.to_string()))?;

        let ports = midi_out.ports();
        let port = ports
            .get(index)
            .ok_or_else(|| AudioError::MidiPort(format!("port index {} not found", index)))?;
        let port_name = midi_out
            .port_name(port)
            .unwrap_or_else(|_| format!("Port {}", index));

        log::info!("connecting to MIDI port: {}", port_name);
        let connection = midi_out
            .connect(port, "bytesonic-out")
            .map_err(|e| AudioError::MidiPort(e.to_string()))?;

        Ok(Self {
            connection,
            port_name,
        })
    }
}

impl MidiSink for MidirOutput {
    fn send(&mut self, message: &[u8]) {
        if let Err(e) = self.connection.send(message) {
            // the engine never sees transport errors
            log::warn!("MIDI send to {} failed: {}", self.port_name, e);
        }
    }
}

impl Drop for MidirOutput {
    fn drop(&mut self) {
        log::info!("disconnecting from MIDI port: {}", self.port_name);
    }
}
