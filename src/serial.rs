//! Serial port panel.
//!
//! [`SerialPanel`] owns the serial config (`path`, `baud_rate`), a [`SerialBridge`] to the
//! transport, and a [`LifecycleTracker`]. The connect button toggles between connect and
//! disconnect requests; the status only changes when the bridge reports back through
//! [`SerialBridge::poll`], which the manager drains once per loop iteration.
//!
//! Incoming data lines become the panel's read value and are forwarded to listeners.
//! Writes are best-effort and unacknowledged.

use crate::binding::{ControlType, FieldBinding, PanelLayout, Section};
use crate::device::{DeviceDescriptor, DeviceList};
use crate::error::{Error, Result};
use crate::eventbus::{EventFilter, ListenerId, MessageListener};
use crate::forwarder::EventForwarder;
use crate::lifecycle::{ConnectionStatus, LifecycleEvent, LifecycleTracker};
use crate::settings::SerialConfig;

/// Notification pushed by a serial bridge.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SerialEvent {
    Opened,
    Closed,
    Error(String),
    Data(String),
}

impl SerialEvent {
    /// The lifecycle part of this event, if any.
    pub fn lifecycle(&self) -> Option<LifecycleEvent> {
        match self {
            SerialEvent::Opened => Some(LifecycleEvent::Opened),
            SerialEvent::Closed => Some(LifecycleEvent::Closed),
            SerialEvent::Error(message) => Some(LifecycleEvent::Error(message.clone())),
            SerialEvent::Data(_) => None,
        }
    }
}

/// Host side of the serial connection.
///
/// `connect`/`disconnect` only *issue* requests; outcomes arrive as [`SerialEvent`]s.
pub trait SerialBridge: Send {
    fn list_ports(&mut self) -> Result<Vec<DeviceDescriptor>>;
    fn connect(&mut self, config: &SerialConfig) -> Result<()>;
    fn disconnect(&mut self) -> Result<()>;
    fn write(&mut self, value: &str) -> Result<()>;
    /// Drain events pushed since the last poll, oldest first.
    fn poll(&mut self) -> Vec<SerialEvent>;
}

pub struct SerialPanel {
    config: SerialConfig,
    enabled: bool,
    bridge: Box<dyn SerialBridge>,
    ports: DeviceList,
    tracker: LifecycleTracker,
    write_value: String,
    forwarder: EventForwarder<String>,
}

impl SerialPanel {
    pub fn new(bridge: Box<dyn SerialBridge>, config: &SerialConfig, enabled: bool) -> Self {
        Self {
            config: config.clone(),
            enabled,
            bridge,
            ports: DeviceList::default(),
            tracker: LifecycleTracker::new("serial"),
            write_value: String::new(),
            forwarder: EventForwarder::new(),
        }
    }

    /// Enumerate ports. A configured path that is not present falls back to unset.
    pub fn setup(&mut self) {
        self.refresh_ports();
        if !self.config.path.is_empty() && !self.ports.contains(&self.config.path) {
            log::info!("serial: configured path `{}` not present", self.config.path);
            self.config.path.clear();
        }
    }

    pub fn refresh_ports(&mut self) -> &DeviceList {
        self.ports = DeviceList::from_result("serial", self.bridge.list_ports());
        &self.ports
    }

    /// Returns `true` if the value changed.
    pub fn set_path(&mut self, path: &str) -> bool {
        if self.config.path == path {
            return false;
        }
        self.config.path = path.to_string();
        true
    }

    /// Returns `true` if the value changed. Takes effect on the next connect.
    pub fn set_baud_rate(&mut self, baud_rate: u32) -> bool {
        if self.config.baud_rate == baud_rate {
            return false;
        }
        self.config.baud_rate = baud_rate;
        true
    }

    pub fn set_write_value(&mut self, value: &str) {
        self.write_value = value.to_string();
    }

    /// The connect button: disconnect when open, connect otherwise.
    pub fn toggle(&mut self) -> Result<bool> {
        if self.tracker.is_open() {
            self.disconnect()
        } else {
            self.connect()
        }
    }

    /// Returns `Ok(false)` when nothing was issued (already open, or channel disabled).
    pub fn connect(&mut self) -> Result<bool> {
        if !self.enabled {
            log::debug!("serial: disabled, not connecting");
            return Ok(false);
        }
        let bridge = &mut self.bridge;
        let config = &self.config;
        self.tracker.request_connect(|| bridge.connect(config))
    }

    pub fn disconnect(&mut self) -> Result<bool> {
        let bridge = &mut self.bridge;
        self.tracker.request_disconnect(|| bridge.disconnect())
    }

    /// Send the current write value.
    pub fn write(&mut self) -> Result<()> {
        if !self.tracker.is_open() {
            return Err(Error::NotConnected("serial"));
        }
        let value = self.write_value.clone();
        self.send(&value)
    }

    /// Send `value` to the open port.
    pub fn send(&mut self, value: &str) -> Result<()> {
        if !self.tracker.is_open() {
            return Err(Error::NotConnected("serial"));
        }
        self.bridge.write(value).inspect_err(|e| {
            log::warn!("serial: write failed: {e}");
        })
    }

    /// Apply every event the bridge has pushed. Returns how many were handled.
    pub fn pump(&mut self) -> usize {
        let events = self.bridge.poll();
        let n = events.len();
        for event in events {
            self.handle_event(event);
        }
        n
    }

    pub fn handle_event(&mut self, event: SerialEvent) {
        match event {
            SerialEvent::Data(value) => {
                log::trace!("serial: read {value:?}");
                self.forwarder.forward(&value);
            }
            other => {
                if let Some(lifecycle) = other.lifecycle() {
                    self.tracker.handle(&lifecycle);
                }
            }
        }
    }

    pub fn add_listener(
        &mut self,
        listener: impl MessageListener<String> + 'static,
        filter: EventFilter<String>,
    ) -> ListenerId {
        self.forwarder.add_listener(listener, filter)
    }

    pub fn config(&self) -> &SerialConfig {
        &self.config
    }

    pub fn ports(&self) -> &DeviceList {
        &self.ports
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

    pub fn write_value(&self) -> &str {
        &self.write_value
    }

    /// Last line received.
    pub fn read_value(&self) -> &str {
        self.forwarder.debug()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn layout(&self) -> PanelLayout {
        PanelLayout {
            title: "Serial Config".into(),
            hidden: !self.enabled,
            gated_hidden: self.tracker.sections_hidden(),
            fields: vec![
                FieldBinding::new("path", "Path", ControlType::Select)
                    .with_options(self.ports.options()),
                FieldBinding::new("baudRate", "BaudRate", ControlType::Number),
                FieldBinding::new("status", "Status", ControlType::Monitor),
                FieldBinding::new("connect", self.tracker.button_title(), ControlType::Button),
                FieldBinding::new("writeValue", "Value", ControlType::Text)
                    .in_section(Section::Write),
                FieldBinding::new("write", "SerialWrite", ControlType::Button)
                    .in_section(Section::Write),
                FieldBinding::new("readValue", "Value", ControlType::Monitor)
                    .in_section(Section::Read)
                    .multiline(2),
            ],
        }
    }
}
