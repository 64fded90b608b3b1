//! Native MIDI inputs over `midir` (ALSA, CoreMIDI, WinMM).
//!
//! Each granted [`MidirInput`] remembers its port by name and opens its own `midir`
//! client when attached. The midir callback runs on the backend's thread and only
//! pushes raw bytes into a channel; decoding happens when the panel pumps.
//!
//! Dropping the connection closes the port, so `detach` just takes it and drains
//! whatever was already queued.

use crate::error::{Error, Result};
use crate::midi::{MidiAccess, MidiInput};
use flume::{Receiver, Sender};
use midir::{Ignore, MidiInputConnection};

pub struct MidirAccess {
    client_name: String,
}

impl MidirAccess {
    pub fn new(client_name: impl Into<String>) -> Self {
        Self {
            client_name: client_name.into(),
        }
    }
}

impl Default for MidirAccess {
    fn default() -> Self {
        Self::new("sketchbridge")
    }
}

impl MidiAccess for MidirAccess {
    fn request_access(&mut self) -> Result<Vec<Box<dyn MidiInput>>> {
        let midi_in = midir::MidiInput::new(&format!("{}-enumerate", self.client_name))
            .map_err(|e| Error::Midi(format!("failed to create MIDI input: {e}")))?;

        let ports = midi_in.ports();
        let mut inputs: Vec<Box<dyn MidiInput>> = Vec::with_capacity(ports.len());
        for (index, port) in ports.iter().enumerate() {
            let name = midi_in
                .port_name(port)
                .unwrap_or_else(|_| format!("MIDI Input {index}"));
            inputs.push(Box::new(MidirInput::new(&self.client_name, name)));
        }
        log::debug!("midi: {} input(s) available", inputs.len());
        Ok(inputs)
    }
}

pub struct MidirInput {
    client_name: String,
    name: String,
    connection: Option<MidiInputConnection<Sender<Vec<u8>>>>,
    tx: Sender<Vec<u8>>,
    rx: Receiver<Vec<u8>>,
}

impl MidirInput {
    fn new(client_name: &str, name: String) -> Self {
        let (tx, rx) = flume::unbounded();
        Self {
            client_name: client_name.to_string(),
            name,
            connection: None,
            tx,
            rx,
        }
    }
}

impl MidiInput for MidirInput {
    fn name(&self) -> &str {
        &self.name
    }

    fn attach(&mut self) -> Result<()> {
        if self.connection.is_some() {
            return Ok(());
        }
        let mut midi_in = midir::MidiInput::new(&format!("{}-input", self.client_name))
            .map_err(|e| Error::Midi(format!("failed to create MIDI input: {e}")))?;
        midi_in.ignore(Ignore::All);

        // Ports are looked up again by name; indices shift when devices come and go.
        let port = midi_in
            .ports()
            .into_iter()
            .find(|p| midi_in.port_name(p).is_ok_and(|n| n == self.name))
            .ok_or_else(|| Error::UnknownDevice(self.name.clone()))?;

        let connection = midi_in
            .connect(
                &port,
                "sketchbridge-in",
                |_stamp, message, tx| {
                    let _ = tx.send(message.to_vec());
                },
                self.tx.clone(),
            )
            .map_err(|e| Error::Midi(format!("failed to connect to `{}`: {e}", self.name)))?;

        log::info!("midi: attached `{}`", self.name);
        self.connection = Some(connection);
        Ok(())
    }

    fn detach(&mut self) {
        if let Some(connection) = self.connection.take() {
            connection.close();
            log::info!("midi: detached `{}`", self.name);
        }
        let discarded = self.rx.drain().count();
        if discarded > 0 {
            log::debug!("midi: discarded {discarded} queued message(s) from `{}`", self.name);
        }
    }

    fn close(&mut self) {
        self.detach();
    }

    fn poll(&mut self) -> Vec<Vec<u8>> {
        self.rx.try_iter().collect()
    }
}

impl Drop for MidirInput {
    fn drop(&mut self) {
        self.detach();
    }
}
