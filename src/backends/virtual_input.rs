//! In-memory transports.
//!
//! Used for running a panel without hardware (demos, tests, UI development). Each
//! virtual transport comes with a cloneable handle sharing its state: the handle plays
//! the role of the device/host side, pushing events and inspecting what was requested.

use crate::device::DeviceDescriptor;
use crate::error::{Error, Result};
use crate::metadata::DeviceMeta;
use crate::midi::{MidiAccess, MidiInput};
use crate::osc::{OscMessage, OscSink};
use crate::serial::{SerialBridge, SerialEvent};
use crate::settings::SerialConfig;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

#[derive(Debug)]
struct SerialState {
    ports: Vec<String>,
    auto_ack: bool,
    fail_listing: Option<String>,
    open: bool,
    pending: VecDeque<SerialEvent>,
    connects: Vec<SerialConfig>,
    disconnects: usize,
    writes: Vec<String>,
}

/// Serial bridge backed by a list of fake port paths.
///
/// With auto-ack on (the default) it answers `connect` with `Opened` when the path is
/// one of its ports and `Error` otherwise, and `disconnect` with `Closed`, like a host
/// bridge would. With auto-ack off, lifecycle events only appear when pushed through
/// the handle.
pub struct VirtualSerial {
    state: Arc<Mutex<SerialState>>,
}

#[derive(Clone)]
pub struct VirtualSerialHandle {
    state: Arc<Mutex<SerialState>>,
}

impl VirtualSerial {
    pub fn new(ports: &[&str]) -> (Self, VirtualSerialHandle) {
        let state = Arc::new(Mutex::new(SerialState {
            ports: ports.iter().map(|p| p.to_string()).collect(),
            auto_ack: true,
            fail_listing: None,
            open: false,
            pending: VecDeque::new(),
            connects: Vec::new(),
            disconnects: 0,
            writes: Vec::new(),
        }));
        (
            Self {
                state: state.clone(),
            },
            VirtualSerialHandle { state },
        )
    }
}

impl SerialBridge for VirtualSerial {
    fn list_ports(&mut self) -> Result<Vec<DeviceDescriptor>> {
        let state = self.state.lock();
        if let Some(message) = &state.fail_listing {
            return Err(Error::Serial(message.clone()));
        }
        Ok(state
            .ports
            .iter()
            .map(|p| {
                DeviceDescriptor::new(p.as_str(), p.as_str())
                    .with_meta(DeviceMeta::with_bus("virtual", Some(p.as_str())))
            })
            .collect())
    }

    fn connect(&mut self, config: &SerialConfig) -> Result<()> {
        let mut state = self.state.lock();
        state.connects.push(config.clone());
        if state.auto_ack {
            if state.ports.contains(&config.path) {
                state.open = true;
                state.pending.push_back(SerialEvent::Opened);
            } else {
                let message = format!("no such port: `{}`", config.path);
                state.pending.push_back(SerialEvent::Error(message));
            }
        }
        Ok(())
    }

    fn disconnect(&mut self) -> Result<()> {
        let mut state = self.state.lock();
        state.disconnects += 1;
        if state.auto_ack {
            state.open = false;
            state.pending.push_back(SerialEvent::Closed);
        }
        Ok(())
    }

    fn write(&mut self, value: &str) -> Result<()> {
        self.state.lock().writes.push(value.to_string());
        Ok(())
    }

    fn poll(&mut self) -> Vec<SerialEvent> {
        self.state.lock().pending.drain(..).collect()
    }
}

impl VirtualSerialHandle {
    /// Push an event as if the host reported it.
    pub fn push(&self, event: SerialEvent) {
        let mut state = self.state.lock();
        match &event {
            SerialEvent::Opened => state.open = true,
            SerialEvent::Closed | SerialEvent::Error(_) => state.open = false,
            SerialEvent::Data(_) => {}
        }
        state.pending.push_back(event);
    }

    pub fn set_auto_ack(&self, on: bool) {
        self.state.lock().auto_ack = on;
    }

    pub fn fail_listing(&self, message: &str) {
        self.state.lock().fail_listing = Some(message.to_string());
    }

    pub fn is_open(&self) -> bool {
        self.state.lock().open
    }

    pub fn connects(&self) -> Vec<SerialConfig> {
        self.state.lock().connects.clone()
    }

    pub fn disconnects(&self) -> usize {
        self.state.lock().disconnects
    }

    pub fn writes(&self) -> Vec<String> {
        self.state.lock().writes.clone()
    }
}

#[derive(Debug, Default)]
struct MidiPortState {
    attached: bool,
    queue: VecDeque<Vec<u8>>,
}

type Journal = Arc<Mutex<Vec<String>>>;

/// MIDI input that only receives while attached, like a real port without a handler.
pub struct VirtualMidiInput {
    name: String,
    port: Arc<Mutex<MidiPortState>>,
    journal: Journal,
}

impl MidiInput for VirtualMidiInput {
    fn name(&self) -> &str {
        &self.name
    }

    fn attach(&mut self) -> Result<()> {
        self.port.lock().attached = true;
        self.journal.lock().push(format!("attach:{}", self.name));
        Ok(())
    }

    fn detach(&mut self) {
        let mut port = self.port.lock();
        port.attached = false;
        port.queue.clear();
        self.journal.lock().push(format!("detach:{}", self.name));
    }

    fn close(&mut self) {
        self.journal.lock().push(format!("close:{}", self.name));
    }

    fn poll(&mut self) -> Vec<Vec<u8>> {
        self.port.lock().queue.drain(..).collect()
    }
}

/// Device side of a [`VirtualMidiInput`].
#[derive(Clone)]
pub struct VirtualMidiHandle {
    port: Arc<Mutex<MidiPortState>>,
}

impl VirtualMidiHandle {
    /// Send a message from the device. Dropped unless the input is attached.
    pub fn send(&self, raw: &[u8]) -> bool {
        let mut port = self.port.lock();
        if !port.attached {
            return false;
        }
        port.queue.push_back(raw.to_vec());
        true
    }
}

/// MIDI access granting a fixed set of virtual inputs.
///
/// All inputs share one journal of `attach:`/`detach:`/`close:` entries so callers can
/// check the order in which inputs were switched.
pub struct VirtualMidiAccess {
    ports: Vec<(String, Arc<Mutex<MidiPortState>>)>,
    journal: Journal,
    failure: Option<String>,
}

impl VirtualMidiAccess {
    pub fn new(names: &[&str]) -> Self {
        Self {
            ports: names
                .iter()
                .map(|n| (n.to_string(), Arc::new(Mutex::new(MidiPortState::default()))))
                .collect(),
            journal: Arc::new(Mutex::new(Vec::new())),
            failure: None,
        }
    }

    pub fn handle(&self, name: &str) -> Option<VirtualMidiHandle> {
        self.ports
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, port)| VirtualMidiHandle { port: port.clone() })
    }

    /// Make the next `request_access` calls fail.
    pub fn fail_with(&mut self, message: &str) {
        self.failure = Some(message.to_string());
    }

    pub fn journal(&self) -> Vec<String> {
        self.journal.lock().clone()
    }
}

impl MidiAccess for VirtualMidiAccess {
    fn request_access(&mut self) -> Result<Vec<Box<dyn MidiInput>>> {
        if let Some(message) = &self.failure {
            return Err(Error::Midi(message.clone()));
        }
        Ok(self
            .ports
            .iter()
            .map(|(name, port)| {
                Box::new(VirtualMidiInput {
                    name: name.clone(),
                    port: port.clone(),
                    journal: self.journal.clone(),
                }) as Box<dyn MidiInput>
            })
            .collect())
    }
}

/// OSC sink that records what would have been sent.
#[derive(Clone, Default)]
pub struct VirtualOscSink {
    sent: Arc<Mutex<Vec<OscMessage>>>,
}

impl VirtualOscSink {
    pub fn sent(&self) -> Vec<OscMessage> {
        self.sent.lock().clone()
    }
}

impl OscSink for VirtualOscSink {
    fn send(&mut self, message: &OscMessage) -> Result<()> {
        self.sent.lock().push(message.clone());
        Ok(())
    }
}
