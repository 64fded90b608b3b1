//! Sketchbridge: device lifecycle and message bridging for creative-coding panels.
//!
//! Connects a sketch's control panel to serial ports, MIDI inputs and OSC. Each device
//! channel has a [`LifecycleTracker`] driven by events the transport reports, an
//! [`EventForwarder`] that decodes incoming payloads and notifies listeners in
//! registration order, and a [`PanelLayout`] describing the fields the UI binds.
//! Settings changes are saved through a [`ConfigStore`] on a 100 ms trailing debounce.
//!
//! The [`Manager`] owns all of it; the host calls [`Manager::pump`] from its loop.

pub mod backends;
pub mod binding;
pub mod debounce;
pub mod device;
pub mod error;
pub mod eventbus;
pub mod filtered_listener;
pub mod forwarder;
pub mod lifecycle;
pub mod logger;
pub mod manager;
pub mod metadata;
pub mod midi;
pub mod osc;
pub mod serial;
pub mod settings;
pub mod snapshot;

pub use binding::{ControlType, FieldBinding, PanelLayout, Section};
pub use device::{DeviceDescriptor, DeviceList};
pub use error::{Error, Result};
pub use eventbus::{EventFilter, EventKind, ListenerId, MessageBus, MessageListener};
pub use filtered_listener::FilteredListener;
pub use forwarder::EventForwarder;
pub use lifecycle::{ConnectionStatus, LifecycleEvent, LifecycleObserver, LifecycleTracker};
pub use logger::LogListener;
pub use manager::{Backends, HostControl, Manager};
pub use metadata::DeviceMeta;
pub use midi::{MidiAccess, MidiInput, MidiMessage, MidiPanel};
pub use osc::{OscArg, OscChannel, OscMessage, OscSink};
pub use serial::{SerialBridge, SerialEvent, SerialPanel};
pub use settings::{AppSettings, ConfigStore, DebouncedSaver, FileStore, MemoryStore};
pub use snapshot::{ChannelSnapshot, Snapshot};
