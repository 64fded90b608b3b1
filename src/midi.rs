//! MIDI input panel.
//!
//! [`MidiPanel`] binds a device selector to the inputs granted by a [`MidiAccess`]
//! implementation and forwards decoded [`MidiMessage`]s to listeners.
//!
//! Exactly one input is active at a time. Selecting another device first detaches and
//! closes the active input (discarding anything it had queued), then attaches the new
//! one, so nothing the old device sends after the switch can reach a listener.
//!
//! ## Decoding
//! Channel voice messages are three bytes: status, data1, data2.
//! - `cmd      = status >> 4`
//! - `channel  = status & 0x0F`
//! - `kind     = status & 0xF0`
//! - `note     = data1`
//! - `velocity = data2` (the control value for CC, 0/127 for buttons on most controllers)
//!
//! Shorter messages decode missing data bytes as `0`; an empty payload is an error.

use crate::binding::{ControlType, FieldBinding, PanelLayout, Section};
use crate::device::{DeviceDescriptor, DeviceList};
use crate::error::{Error, Result};
use crate::eventbus::{EventFilter, EventKind, ListenerId, MessageListener};
use crate::forwarder::{DebugRecord, Decode, EventForwarder};
use crate::lifecycle::{ConnectionStatus, LifecycleEvent, LifecycleTracker};
use crate::settings::MidiConfig;
use serde::{Deserialize, Serialize};

/// Status-byte high nibbles (`kind`) of channel voice messages.
pub mod kind {
    pub const NOTE_OFF: u8 = 0x80;
    pub const NOTE_ON: u8 = 0x90;
    pub const POLY_PRESSURE: u8 = 0xA0;
    pub const CONTROL_CHANGE: u8 = 0xB0;
    pub const PROGRAM_CHANGE: u8 = 0xC0;
    pub const CHANNEL_PRESSURE: u8 = 0xD0;
    pub const PITCH_BEND: u8 = 0xE0;
    pub const SYSTEM: u8 = 0xF0;
}

/// Decoded MIDI message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MidiMessage {
    pub cmd: u8,
    pub channel: u8,
    #[serde(rename = "type")]
    pub kind: u8,
    pub note: u8,
    pub velocity: u8,
}

impl MidiMessage {
    pub fn decode(raw: &[u8]) -> Result<Self> {
        let status = *raw.first().ok_or(Error::EmptyMessage)?;
        Ok(Self {
            cmd: status >> 4,
            channel: status & 0x0F,
            kind: status & 0xF0,
            note: raw.get(1).copied().unwrap_or(0),
            velocity: raw.get(2).copied().unwrap_or(0),
        })
    }

    /// Note-on with non-zero velocity.
    pub fn is_note_on(&self) -> bool {
        self.kind == kind::NOTE_ON && self.velocity > 0
    }

    /// Note-off, including the note-on-with-zero-velocity form.
    pub fn is_note_off(&self) -> bool {
        self.kind == kind::NOTE_OFF || (self.kind == kind::NOTE_ON && self.velocity == 0)
    }

    pub fn is_control_change(&self) -> bool {
        self.kind == kind::CONTROL_CHANGE
    }
}

impl Decode for MidiMessage {
    fn decode(raw: &[u8]) -> Result<Self> {
        MidiMessage::decode(raw)
    }
}

impl EventKind for MidiMessage {
    fn event_kind(&self) -> Option<u8> {
        Some(self.kind)
    }
}

impl DebugRecord for MidiMessage {
    fn debug_text(&self) -> String {
        format!(
            "cmd: {}\nchannel: {}\ntype: {}\nnote: {}\nvelocity: {}\n",
            self.cmd, self.channel, self.kind, self.note, self.velocity
        )
    }
}

/// One MIDI input granted by the platform.
pub trait MidiInput: Send {
    fn name(&self) -> &str;
    /// Start delivering messages into this input's queue.
    fn attach(&mut self) -> Result<()>;
    /// Stop delivering and discard anything queued.
    fn detach(&mut self);
    fn close(&mut self);
    /// Drain messages received since the last poll, oldest first.
    fn poll(&mut self) -> Vec<Vec<u8>>;
}

/// Platform MIDI access (`requestMIDIAccess` on the web, ALSA/CoreMIDI/WinMM natively).
pub trait MidiAccess {
    fn request_access(&mut self) -> Result<Vec<Box<dyn MidiInput>>>;
}

pub struct MidiPanel {
    device_name: String,
    enabled: bool,
    inputs: Vec<Box<dyn MidiInput>>,
    devices: DeviceList,
    active: Option<usize>,
    tracker: LifecycleTracker,
    forwarder: EventForwarder<MidiMessage>,
}

impl MidiPanel {
    pub fn new(config: &MidiConfig, enabled: bool) -> Self {
        Self {
            device_name: config.device_name.clone(),
            enabled,
            inputs: Vec::new(),
            devices: DeviceList::default(),
            active: None,
            tracker: LifecycleTracker::new("midi"),
            forwarder: EventForwarder::new(),
        }
    }

    /// Enumerate inputs and restore the saved device if it is still present.
    ///
    /// Access failure is logged and leaves the panel with no devices. A saved name that
    /// is no longer present falls back to unset.
    pub fn setup(&mut self, access: &mut dyn MidiAccess) {
        self.release();

        let inputs = match access.request_access() {
            Ok(inputs) => inputs,
            Err(e) => {
                log::error!("midi: access request failed: {e}");
                Vec::new()
            }
        };
        self.devices = DeviceList::new(
            inputs
                .iter()
                .map(|i| DeviceDescriptor::new(i.name(), i.name())),
        );
        self.inputs = inputs;

        if self.device_name.is_empty() {
            return;
        }
        match self.index_of(&self.device_name) {
            Some(idx) => {
                if let Err(e) = self.activate(idx) {
                    log::warn!("midi: could not restore `{}`: {e}", self.device_name);
                }
            }
            None => {
                log::info!("midi: saved device `{}` not present", self.device_name);
                self.device_name.clear();
            }
        }
    }

    /// Switch the active input. An empty name just releases the current one.
    ///
    /// Returns `Ok(true)` when the selection changed (the caller should persist it), and
    /// `Ok(false)` on a disabled panel.
    pub fn select(&mut self, name: &str) -> Result<bool> {
        if !self.enabled {
            log::debug!("midi: disabled, not selecting `{name}`");
            return Ok(false);
        }
        if self.active.is_some() && self.device_name == name {
            return Ok(false);
        }
        let idx = if name.is_empty() {
            None
        } else {
            Some(
                self.index_of(name)
                    .ok_or_else(|| Error::UnknownDevice(name.to_string()))?,
            )
        };

        self.release();
        self.device_name = name.to_string();
        if let Some(idx) = idx {
            self.activate(idx)?;
        }
        Ok(true)
    }

    /// Deliver queued messages of the active input. Returns how many were decoded.
    pub fn pump(&mut self) -> usize {
        let Some(idx) = self.active else {
            return 0;
        };
        let mut decoded = 0;
        for raw in self.inputs[idx].poll() {
            match self.forwarder.on_message(&raw) {
                Ok(msg) => {
                    log::trace!("midi: {msg:?}");
                    decoded += 1;
                }
                Err(e) => log::warn!("midi: dropped malformed message {raw:02x?}: {e}"),
            }
        }
        decoded
    }

    pub fn add_listener(
        &mut self,
        listener: impl MessageListener<MidiMessage> + 'static,
        filter: EventFilter<MidiMessage>,
    ) -> ListenerId {
        self.forwarder.add_listener(listener, filter)
    }

    pub fn config(&self) -> MidiConfig {
        MidiConfig {
            device_name: self.device_name.clone(),
        }
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    pub fn devices(&self) -> &DeviceList {
        &self.devices
    }

    pub fn status(&self) -> ConnectionStatus {
        self.tracker.status()
    }

    pub fn tracker(&self) -> &LifecycleTracker {
        &self.tracker
    }

    pub fn tracker_mut(&mut self) -> &mut LifecycleTracker {
        &mut self.tracker
    }

    /// Text for the debug area: the last decoded message.
    pub fn debug(&self) -> &str {
        self.forwarder.debug()
    }

    pub fn forwarder(&self) -> &EventForwarder<MidiMessage> {
        &self.forwarder
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn layout(&self) -> PanelLayout {
        let mut device = FieldBinding::new("deviceName", "Device", ControlType::Select)
            .with_options(self.devices.options());
        // Nothing to pick from.
        if self.devices.is_empty() {
            device = device.readonly();
        }
        PanelLayout {
            title: "MIDI Config".into(),
            hidden: !self.enabled,
            gated_hidden: self.tracker.sections_hidden(),
            fields: vec![
                device,
                FieldBinding::new("status", "Status", ControlType::Monitor),
                FieldBinding::new("debug", "Debug", ControlType::Monitor)
                    .in_section(Section::Read)
                    .multiline(6),
            ],
        }
    }

    /// Detach and close the active input, if any.
    pub fn release(&mut self) {
        if let Some(idx) = self.active.take() {
            let input = &mut self.inputs[idx];
            log::info!("midi: releasing `{}`", input.name());
            input.detach();
            input.close();
            self.tracker.handle(&LifecycleEvent::Closed);
        }
    }

    fn index_of(&self, name: &str) -> Option<usize> {
        self.inputs.iter().position(|i| i.name() == name)
    }

    fn activate(&mut self, idx: usize) -> Result<()> {
        let input = &mut self.inputs[idx];
        if self.tracker.request_connect(|| input.attach())? {
            self.active = Some(idx);
            self.tracker.handle(&LifecycleEvent::Opened);
        }
        Ok(())
    }
}

impl Drop for MidiPanel {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::virtual_input::VirtualMidiAccess;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[test]
    fn decodes_note_on_channel_two() {
        let msg = MidiMessage::decode(&[0x91, 0x3C, 0x40]).unwrap();
        assert_eq!(msg.cmd, 9);
        assert_eq!(msg.channel, 1);
        assert_eq!(msg.kind, 0x90);
        assert_eq!(msg.note, 60);
        assert_eq!(msg.velocity, 64);
        assert!(msg.is_note_on());
        assert_eq!(
            msg.debug_text(),
            "cmd: 9\nchannel: 1\ntype: 144\nnote: 60\nvelocity: 64\n"
        );
    }

    #[test]
    fn short_and_empty_payloads() {
        let pc = MidiMessage::decode(&[0xC5, 12]).unwrap();
        assert_eq!((pc.kind, pc.channel, pc.note, pc.velocity), (kind::PROGRAM_CHANGE, 5, 12, 0));
        assert!(MidiMessage::decode(&[0x90, 60, 0]).unwrap().is_note_off());
        assert!(matches!(MidiMessage::decode(&[]), Err(Error::EmptyMessage)));
    }

    #[test]
    fn saved_device_is_restored_or_cleared() {
        let mut access = VirtualMidiAccess::new(&["Keys", "Pads"]);

        let mut panel = MidiPanel::new(&MidiConfig { device_name: "Pads".into() }, true);
        panel.setup(&mut access);
        assert_eq!(panel.status(), ConnectionStatus::Open);
        assert_eq!(panel.device_name(), "Pads");

        let mut gone = MidiPanel::new(&MidiConfig { device_name: "Drums".into() }, true);
        gone.setup(&mut access);
        assert_eq!(gone.status(), ConnectionStatus::Closed);
        assert_eq!(gone.device_name(), "");
    }

    #[test]
    fn failed_access_leaves_empty_selector() {
        let mut access = VirtualMidiAccess::new(&["Keys"]);
        access.fail_with("permission denied");

        let mut panel = MidiPanel::new(&MidiConfig { device_name: "Keys".into() }, true);
        panel.setup(&mut access);
        assert!(panel.devices().is_empty());
        assert!(panel.layout().field("deviceName").unwrap().readonly);
        assert_eq!(panel.device_name(), "");
        assert_eq!(panel.pump(), 0);
        assert!(panel.select("Keys").is_err());
    }

    #[test]
    fn reassignment_detaches_before_attaching() {
        let mut access = VirtualMidiAccess::new(&["Keys", "Pads"]);
        let keys = access.handle("Keys").unwrap();
        let pads = access.handle("Pads").unwrap();

        let notes = Arc::new(Mutex::new(Vec::new()));
        let sink = notes.clone();
        let mut panel = MidiPanel::new(&MidiConfig::default(), true);
        panel.setup(&mut access);
        panel.add_listener(move |m: &MidiMessage| sink.lock().push(m.note), EventFilter::All);

        assert!(panel.select("Keys").unwrap());
        keys.send(&[0x90, 1, 100]);
        // Queued on the old device but not yet pumped when the user switches.
        keys.send(&[0x90, 2, 100]);
        assert!(panel.select("Pads").unwrap());
        keys.send(&[0x90, 3, 100]);
        pads.send(&[0x90, 4, 100]);
        panel.pump();

        assert_eq!(*notes.lock(), vec![4]);
        assert_eq!(
            access.journal(),
            vec!["attach:Keys", "detach:Keys", "close:Keys", "attach:Pads"]
        );
        assert_eq!(panel.status(), ConnectionStatus::Open);
        assert!(!panel.select("Pads").unwrap());
    }

    #[test]
    fn first_message_before_reassignment_is_delivered() {
        let mut access = VirtualMidiAccess::new(&["Keys"]);
        let keys = access.handle("Keys").unwrap();
        let mut panel = MidiPanel::new(&MidiConfig::default(), true);
        panel.setup(&mut access);
        panel.select("Keys").unwrap();

        keys.send(&[0x91, 0x3C, 0x40]);
        assert_eq!(panel.pump(), 1);
        assert!(panel.debug().starts_with("cmd: 9\nchannel: 1\n"));

        panel.select("").unwrap();
        assert_eq!(panel.status(), ConnectionStatus::Closed);
        assert!(panel.layout().gated_hidden);
    }

    #[test]
    fn disabled_panel_does_not_attach() {
        let mut access = VirtualMidiAccess::new(&["Keys"]);
        let mut panel = MidiPanel::new(&MidiConfig::default(), false);
        panel.setup(&mut access);
        assert!(!panel.select("Keys").unwrap());
        assert!(access.journal().is_empty());
        assert_eq!(panel.status(), ConnectionStatus::Closed);
    }

    #[test]
    fn kind_filter_separates_notes_from_cc() {
        let mut access = VirtualMidiAccess::new(&["Keys"]);
        let keys = access.handle("Keys").unwrap();
        let mut panel = MidiPanel::new(&MidiConfig::default(), true);
        panel.setup(&mut access);
        panel.select("Keys").unwrap();

        let notes = Arc::new(Mutex::new(Vec::new()));
        let ccs = Arc::new(Mutex::new(Vec::new()));
        let (n, c) = (notes.clone(), ccs.clone());
        panel.add_listener(
            move |m: &MidiMessage| n.lock().push(m.note),
            EventFilter::Kind(kind::NOTE_ON),
        );
        panel.add_listener(
            move |m: &MidiMessage| c.lock().push(m.velocity),
            EventFilter::Kind(kind::CONTROL_CHANGE),
        );

        keys.send(&[0x90, 60, 100]);
        keys.send(&[0xB2, 7, 90]);
        keys.send(&[0x91, 62, 80]);
        keys.send(&[0x80, 60, 0]);
        assert_eq!(panel.pump(), 4);

        assert_eq!(*notes.lock(), vec![60, 62]);
        assert_eq!(*ccs.lock(), vec![90]);
        assert_eq!(panel.forwarder().dropped(), 1);
    }
}
