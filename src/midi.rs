//! MIDI actuator transport.
//!
//! The fixture is driven with plain NOTE_ON messages, one note per color
//! component. The transport is deliberately forgiving: a missing device turns
//! every send into a no-op and a failing send drops that tick's batch, so the
//! ramp loop never stalls on hardware trouble.

use midir::{MidiOutput, MidiOutputConnection};
use tracing::{info, trace, warn};

const NOTE_ON: u8 = 0x90;

/// A single note/value pair sent to the fixture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MidiNote {
    pub note: u8,
    /// Protocol value in 0..=127.
    pub value: u8,
}

impl MidiNote {
    pub fn new(note: u8, value: u8) -> Self {
        Self { note, value }
    }
}

/// MIDI output that tolerates an absent or failing device.
pub struct MidiSink {
    connection: Option<MidiOutputConnection>,
}

impl MidiSink {
    /// Connects to the first output port whose name contains `device_name`.
    /// An absent device is not an error; sends become no-ops.
    pub fn connect(device_name: &str) -> Self {
        let output = match MidiOutput::new("hueflow") {
            Ok(output) => output,
            Err(err) => {
                warn!(%err, "MIDI subsystem unavailable, running without output");
                return Self { connection: None };
            }
        };
        let port = output.ports().into_iter().find(|port| {
            output
                .port_name(port)
                .map(|name| name.contains(device_name))
                .unwrap_or(false)
        });
        let connection = match port {
            Some(port) => match output.connect(&port, "hueflow-out") {
                Ok(connection) => {
                    info!(device = device_name, "MIDI output connected");
                    Some(connection)
                }
                Err(err) => {
                    warn!(%err, "failed to open MIDI output, running without output");
                    None
                }
            },
            None => {
                warn!(
                    device = device_name,
                    "no matching MIDI output port, running without output"
                );
                None
            }
        };
        Self { connection }
    }

    /// A sink that never emits. Used by tests and when running headless.
    pub fn disabled() -> Self {
        Self { connection: None }
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    /// Sends a batch of notes. A send failure is transient: it is logged, the
    /// rest of the batch is dropped, and the caller carries on.
    pub fn send(&mut self, notes: &[MidiNote]) {
        let Some(connection) = self.connection.as_mut() else {
            return;
        };
        for note in notes {
            trace!(note.note, note.value, "MIDI note");
            if let Err(err) = connection.send(&[NOTE_ON, note.note, note.value.min(127)]) {
                warn!(%err, "MIDI send failed, skipping the rest of this tick");
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_sink_swallows_sends() {
        let mut sink = MidiSink::disabled();
        assert!(!sink.is_connected());
        sink.send(&[MidiNote::new(1, 64), MidiNote::new(2, 127)]);
    }
}
